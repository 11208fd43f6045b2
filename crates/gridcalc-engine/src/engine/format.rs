//! Display formatting for numbers and values.

/// Format a number the way formula text and `&` concatenation expect:
/// integers without a fractional part, everything else in shortest form.
pub fn format_number(n: f64) -> String {
    if !n.is_finite() {
        "#NUM!".to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

/// Fixed number of decimal places (always prints trailing zeros).
pub fn format_fixed(n: f64, decimals: usize) -> String {
    if !n.is_finite() {
        return "#NUM!".to_string();
    }
    format!("{:.*}", decimals, n)
}

/// Currency form without thousands separators: `-$2.50`.
pub fn format_money(n: f64, symbol: &str, decimals: usize) -> String {
    if !n.is_finite() {
        return "#NUM!".to_string();
    }
    let sign = if n.is_sign_negative() && n != 0.0 { "-" } else { "" };
    format!("{}{}{}", sign, symbol, format_fixed(n.abs(), decimals))
}
