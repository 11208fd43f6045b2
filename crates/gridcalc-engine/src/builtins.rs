//! Built-in spreadsheet functions and their metadata.
//!
//! Conventions:
//! - Spreadsheet-facing names are ALL CAPS (`SUM`, `AVERAGE`); lookup is
//!   case-insensitive.
//! - Each built-in is a row in [`BUILTINS`]: declared parameters plus a plain
//!   `fn(&Args) -> CellValue` body. Arguments arrive already converted, so
//!   bodies only see the kinds they asked for.
//! - If you add a built-in, add its row to `BUILTINS` (and `ALIASES` for
//!   alternate names); `register_builtins` picks it up.

use chrono::{Local, Months, NaiveDate, NaiveTime, TimeDelta};
use rand::Rng;

use crate::engine::{
    Arg, Args, CellValue, ErrorKind, Function, FunctionRegistry, Parameter, ParameterKind,
    format_fixed, format_money,
};

#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: &'static [Parameter],
    pub accepts_errors: bool,
    pub body: fn(&Args) -> CellValue,
}

impl Function for Builtin {
    fn parameters(&self) -> &[Parameter] {
        self.parameters
    }

    fn accepts_errors(&self) -> bool {
        self.accepts_errors
    }

    fn call(&self, args: &Args) -> CellValue {
        (self.body)(args)
    }
}

impl std::fmt::Debug for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builtin").field("name", &self.name).finish()
    }
}

use ParameterKind::{Any, Logical, LogicalSequence, Number, NumberSequence, Reference, Text};

const NUMBERS: &[Parameter] = &[Parameter::required("number", NumberSequence).repeating()];
const LOGICALS: &[Parameter] = &[Parameter::required("logical", LogicalSequence).repeating()];
const VALUES: &[Parameter] = &[Parameter::required("value", Any).repeating()];
const ONE_NUMBER: &[Parameter] = &[Parameter::required("number", Number)];
const ONE_VALUE: &[Parameter] = &[Parameter::required("value", Any)];
const ONE_TEXT: &[Parameter] = &[Parameter::required("text", Text)];
const ONE_REFERENCE: &[Parameter] = &[Parameter::required("reference", Reference)];
const NONE: &[Parameter] = &[];

/// Decimal places accepted by ROUND, FIXED and MONEY.
const MAX_DECIMALS: f64 = 12.0;

pub const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "SUM",
        description: "Sum of numbers and numeric cells in ranges",
        parameters: NUMBERS,
        accepts_errors: false,
        body: sum,
    },
    Builtin {
        name: "AVERAGE",
        description: "Arithmetic mean of numbers and numeric cells",
        parameters: NUMBERS,
        accepts_errors: false,
        body: average,
    },
    Builtin {
        name: "COUNT",
        description: "Count of numeric values",
        parameters: VALUES,
        accepts_errors: true,
        body: count,
    },
    Builtin {
        name: "MIN",
        description: "Smallest number (0 when there are none)",
        parameters: NUMBERS,
        accepts_errors: false,
        body: min,
    },
    Builtin {
        name: "MAX",
        description: "Largest number (0 when there are none)",
        parameters: NUMBERS,
        accepts_errors: false,
        body: max,
    },
    Builtin {
        name: "IF",
        description: "Choose a value by condition",
        parameters: &[
            Parameter::required("condition", Logical),
            Parameter::required("then", Any),
            Parameter::optional("otherwise", Any),
        ],
        accepts_errors: true,
        body: if_,
    },
    Builtin {
        name: "AND",
        description: "TRUE when every logical is TRUE",
        parameters: LOGICALS,
        accepts_errors: false,
        body: and,
    },
    Builtin {
        name: "OR",
        description: "TRUE when any logical is TRUE",
        parameters: LOGICALS,
        accepts_errors: false,
        body: or,
    },
    Builtin {
        name: "NOT",
        description: "Logical negation",
        parameters: &[Parameter::required("logical", Logical)],
        accepts_errors: false,
        body: not,
    },
    Builtin {
        name: "IFERROR",
        description: "The value, or a fallback when it is an error",
        parameters: &[
            Parameter::required("value", Any),
            Parameter::required("fallback", Any),
        ],
        accepts_errors: true,
        body: iferror,
    },
    Builtin {
        name: "ISERROR",
        description: "TRUE when the value is an error",
        parameters: ONE_VALUE,
        accepts_errors: true,
        body: iserror,
    },
    Builtin {
        name: "ISNUMBER",
        description: "TRUE when the value is a number",
        parameters: ONE_VALUE,
        accepts_errors: true,
        body: isnumber,
    },
    Builtin {
        name: "ABS",
        description: "Absolute value",
        parameters: ONE_NUMBER,
        accepts_errors: false,
        body: abs,
    },
    Builtin {
        name: "ROUND",
        description: "Round to a number of decimal places",
        parameters: &[
            Parameter::required("number", Number),
            Parameter::optional("decimals", Number),
        ],
        accepts_errors: false,
        body: round,
    },
    Builtin {
        name: "SQRT",
        description: "Square root",
        parameters: ONE_NUMBER,
        accepts_errors: false,
        body: sqrt,
    },
    Builtin {
        name: "POWER",
        description: "Base raised to an exponent",
        parameters: &[
            Parameter::required("base", Number),
            Parameter::required("exponent", Number),
        ],
        accepts_errors: false,
        body: power,
    },
    Builtin {
        name: "RAND",
        description: "Random number in [0, 1)",
        parameters: NONE,
        accepts_errors: false,
        body: rand_,
    },
    Builtin {
        name: "RANDINT",
        description: "Random integer between two bounds (inclusive)",
        parameters: &[
            Parameter::required("low", Number),
            Parameter::required("high", Number),
        ],
        accepts_errors: false,
        body: randint,
    },
    Builtin {
        name: "FIXED",
        description: "Format a number with fixed decimals",
        parameters: &[
            Parameter::required("number", Number),
            Parameter::optional("decimals", Number),
        ],
        accepts_errors: false,
        body: fixed,
    },
    Builtin {
        name: "MONEY",
        description: "Format a number as currency",
        parameters: &[
            Parameter::required("number", Number),
            Parameter::optional("symbol", Text),
            Parameter::optional("decimals", Number),
        ],
        accepts_errors: false,
        body: money,
    },
    Builtin {
        name: "LEN",
        description: "Number of characters in text",
        parameters: ONE_TEXT,
        accepts_errors: false,
        body: len,
    },
    Builtin {
        name: "UPPER",
        description: "Text in upper case",
        parameters: ONE_TEXT,
        accepts_errors: false,
        body: upper,
    },
    Builtin {
        name: "LOWER",
        description: "Text in lower case",
        parameters: ONE_TEXT,
        accepts_errors: false,
        body: lower,
    },
    Builtin {
        name: "CONCAT",
        description: "Join values (and range contents) as text",
        parameters: VALUES,
        accepts_errors: false,
        body: concat,
    },
    Builtin {
        name: "TODAY",
        description: "Current local date",
        parameters: NONE,
        accepts_errors: false,
        body: today,
    },
    Builtin {
        name: "NOW",
        description: "Current local date and time",
        parameters: NONE,
        accepts_errors: false,
        body: now,
    },
    Builtin {
        name: "DATE",
        description: "Date from year, month and day (months and days may overflow)",
        parameters: &[
            Parameter::required("year", Number),
            Parameter::required("month", Number),
            Parameter::required("day", Number),
        ],
        accepts_errors: false,
        body: date,
    },
    Builtin {
        name: "ROW",
        description: "Row number (1-based) of a reference",
        parameters: ONE_REFERENCE,
        accepts_errors: false,
        body: row,
    },
    Builtin {
        name: "COLUMN",
        description: "Column number (1-based) of a reference",
        parameters: ONE_REFERENCE,
        accepts_errors: false,
        body: column,
    },
];

/// Alternate names: (alias, target).
pub const ALIASES: &[(&str, &str)] = &[("AVG", "AVERAGE"), ("POW", "POWER")];

pub fn register_builtins(registry: &mut FunctionRegistry) {
    for builtin in BUILTINS {
        if let Err(e) = registry.register(builtin.name, *builtin) {
            log::error!("built-in {} not registered: {}", builtin.name, e);
        }
    }
    for (alias, target) in ALIASES {
        if let Err(e) = registry.alias(alias, target) {
            log::error!("alias {} not registered: {}", alias, e);
        }
    }
}

/// A registry holding every built-in.
pub fn builtin_registry() -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();
    register_builtins(&mut registry);
    registry
}

fn number(result: Result<f64, ErrorKind>) -> CellValue {
    match result {
        Ok(n) if n.is_finite() => CellValue::Number(n),
        Ok(_) => CellValue::Error(ErrorKind::Num),
        Err(e) => CellValue::Error(e),
    }
}

fn text(result: Result<String, ErrorKind>) -> CellValue {
    match result {
        Ok(s) => CellValue::Text(s),
        Err(e) => CellValue::Error(e),
    }
}

fn logical(result: Result<bool, ErrorKind>) -> CellValue {
    match result {
        Ok(b) => CellValue::Logical(b),
        Err(e) => CellValue::Error(e),
    }
}

fn decimals(args: &Args, index: usize, default: f64) -> Result<usize, ErrorKind> {
    let places = args.number_or(index, default)?.trunc();
    if !(0.0..=MAX_DECIMALS).contains(&places) {
        return Err(ErrorKind::Value);
    }
    Ok(places as usize)
}

fn sum(args: &Args) -> CellValue {
    number(args.numbers_from(0).map(|ns| ns.iter().sum()))
}

fn average(args: &Args) -> CellValue {
    number(args.numbers_from(0).and_then(|ns| {
        if ns.is_empty() {
            Err(ErrorKind::Div0)
        } else {
            Ok(ns.iter().sum::<f64>() / ns.len() as f64)
        }
    }))
}

fn count(args: &Args) -> CellValue {
    let n = args
        .iter()
        .filter_map(|arg| match arg {
            Arg::Value(v) => Some(
                v.flatten()
                    .into_iter()
                    .filter(|v| matches!(v, CellValue::Number(_) | CellValue::Date(_)))
                    .count(),
            ),
            _ => None,
        })
        .sum::<usize>();
    CellValue::Number(n as f64)
}

fn min(args: &Args) -> CellValue {
    number(
        args.numbers_from(0)
            .map(|ns| ns.into_iter().reduce(f64::min).unwrap_or(0.0)),
    )
}

fn max(args: &Args) -> CellValue {
    number(
        args.numbers_from(0)
            .map(|ns| ns.into_iter().reduce(f64::max).unwrap_or(0.0)),
    )
}

fn if_(args: &Args) -> CellValue {
    match args.logical(0) {
        Ok(true) => args.value(1),
        Ok(false) => match args.get(2) {
            None | Some(Arg::Missing) => CellValue::Logical(false),
            Some(_) => args.value(2),
        },
        Err(e) => CellValue::Error(e),
    }
}

fn and(args: &Args) -> CellValue {
    logical(args.logicals_from(0).and_then(|bs| {
        if bs.is_empty() {
            Err(ErrorKind::Value)
        } else {
            Ok(bs.iter().all(|b| *b))
        }
    }))
}

fn or(args: &Args) -> CellValue {
    logical(args.logicals_from(0).and_then(|bs| {
        if bs.is_empty() {
            Err(ErrorKind::Value)
        } else {
            Ok(bs.iter().any(|b| *b))
        }
    }))
}

fn not(args: &Args) -> CellValue {
    logical(args.logical(0).map(|b| !b))
}

fn iferror(args: &Args) -> CellValue {
    match args.get(0) {
        Some(Arg::Error(_)) => args.value(1),
        _ => args.value(0),
    }
}

fn iserror(args: &Args) -> CellValue {
    CellValue::Logical(matches!(args.get(0), Some(Arg::Error(_))))
}

fn isnumber(args: &Args) -> CellValue {
    CellValue::Logical(matches!(
        args.get(0),
        Some(Arg::Value(CellValue::Number(_) | CellValue::Date(_)))
    ))
}

fn abs(args: &Args) -> CellValue {
    number(args.number(0).map(f64::abs))
}

fn round(args: &Args) -> CellValue {
    let n = match args.number(0) {
        Ok(n) => n,
        Err(e) => return CellValue::Error(e),
    };
    // Negative places round to tens, hundreds and so on.
    let places = match args.number_or(1, 0.0) {
        Ok(p) if (-MAX_DECIMALS..=MAX_DECIMALS).contains(&p.trunc()) => p.trunc() as i32,
        Ok(_) => return CellValue::Error(ErrorKind::Value),
        Err(e) => return CellValue::Error(e),
    };
    if places >= 0 {
        let factor = 10f64.powi(places);
        number(Ok((n * factor).round() / factor))
    } else {
        let factor = 10f64.powi(-places);
        number(Ok((n / factor).round() * factor))
    }
}

fn sqrt(args: &Args) -> CellValue {
    number(args.number(0).and_then(|n| {
        if n < 0.0 {
            Err(ErrorKind::Num)
        } else {
            Ok(n.sqrt())
        }
    }))
}

fn power(args: &Args) -> CellValue {
    number(args.number(0).and_then(|base| Ok(base.powf(args.number(1)?))))
}

fn rand_(_args: &Args) -> CellValue {
    CellValue::Number(rand::thread_rng().r#gen::<f64>())
}

fn randint(args: &Args) -> CellValue {
    let bounds = args
        .number(0)
        .and_then(|low| Ok((low.ceil(), args.number(1)?.floor())));
    match bounds {
        Ok((low, high)) if low <= high => {
            let n = rand::thread_rng().gen_range(low as i64..=high as i64);
            CellValue::Number(n as f64)
        }
        Ok(_) => CellValue::Error(ErrorKind::Num),
        Err(e) => CellValue::Error(e),
    }
}

fn fixed(args: &Args) -> CellValue {
    text(args.number(0).and_then(|n| Ok(format_fixed(n, decimals(args, 1, 2.0)?))))
}

fn money(args: &Args) -> CellValue {
    text(args.number(0).and_then(|n| {
        let symbol = args.text_or(1, "$")?;
        Ok(format_money(n, symbol, decimals(args, 2, 2.0)?))
    }))
}

fn len(args: &Args) -> CellValue {
    number(args.text(0).map(|s| s.chars().count() as f64))
}

fn upper(args: &Args) -> CellValue {
    text(args.text(0).map(str::to_uppercase))
}

fn lower(args: &Args) -> CellValue {
    text(args.text(0).map(str::to_lowercase))
}

fn concat(args: &Args) -> CellValue {
    let mut out = String::new();
    for arg in args.iter() {
        if let Arg::Value(v) = arg {
            for item in v.flatten() {
                match item.to_text() {
                    Ok(s) => out.push_str(&s),
                    Err(e) => return CellValue::Error(e),
                }
            }
        }
    }
    CellValue::Text(out)
}

fn today(_args: &Args) -> CellValue {
    CellValue::Date(Local::now().date_naive().and_time(NaiveTime::MIN))
}

fn now(_args: &Args) -> CellValue {
    CellValue::Date(Local::now().naive_local())
}

fn date(args: &Args) -> CellValue {
    let parts = args.number(0).and_then(|y| Ok((y, args.number(1)?, args.number(2)?)));
    let (year, month, day) = match parts {
        Ok(parts) => parts,
        Err(e) => return CellValue::Error(e),
    };
    let months = year.trunc() * 12.0 + month.trunc() - 1.0;
    if !(0.0..=9999.0 * 12.0).contains(&months) {
        return CellValue::Error(ErrorKind::Num);
    }
    let start = NaiveDate::from_ymd_opt(0, 1, 1)
        .and_then(|d| d.checked_add_months(Months::new(months as u32)))
        .and_then(|d| d.checked_add_signed(TimeDelta::try_days(day.trunc() as i64 - 1)?));
    match start {
        Some(d) => CellValue::Date(d.and_time(NaiveTime::MIN)),
        None => CellValue::Error(ErrorKind::Num),
    }
}

fn row(args: &Args) -> CellValue {
    match args.reference(0).map(|r| r.to_region()) {
        Ok(Some(region)) => CellValue::Number(region.top as f64 + 1.0),
        Ok(None) => CellValue::Error(ErrorKind::Ref),
        Err(e) => CellValue::Error(e),
    }
}

fn column(args: &Args) -> CellValue {
    match args.reference(0).map(|r| r.to_region()) {
        Ok(Some(region)) => CellValue::Number(region.left as f64 + 1.0),
        Ok(None) => CellValue::Error(ErrorKind::Ref),
        Err(e) => CellValue::Error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Function, Reference};
    use pretty_assertions::assert_eq;

    fn call(name: &str, args: Vec<Arg>) -> CellValue {
        let registry = builtin_registry();
        let f = registry.get(name).expect("builtin exists");
        f.call(&Args::new(args))
    }

    #[test]
    fn test_all_builtins_register() {
        let registry = builtin_registry();
        for builtin in BUILTINS {
            assert!(registry.contains(builtin.name), "{}", builtin.name);
        }
        assert!(registry.contains("avg"));
        assert!(registry.contains("pow"));
    }

    #[test]
    fn test_aggregates() {
        let nums = || vec![Arg::Numbers(vec![1.0, 2.0, 3.0]), Arg::Number(6.0)];
        assert_eq!(call("SUM", nums()), CellValue::Number(12.0));
        assert_eq!(call("AVERAGE", nums()), CellValue::Number(3.0));
        assert_eq!(call("MIN", nums()), CellValue::Number(1.0));
        assert_eq!(call("MAX", nums()), CellValue::Number(6.0));
        assert_eq!(call("AVG", vec![Arg::Numbers(vec![])]), CellValue::Error(ErrorKind::Div0));
        assert_eq!(call("MAX", vec![Arg::Numbers(vec![])]), CellValue::Number(0.0));
    }

    #[test]
    fn test_count_only_numbers() {
        let block = CellValue::Array(vec![vec![
            CellValue::Number(1.0),
            CellValue::Text("x".into()),
            CellValue::Empty,
        ]]);
        assert_eq!(
            call("COUNT", vec![Arg::Value(block), Arg::Error(ErrorKind::NA)]),
            CellValue::Number(1.0)
        );
    }

    #[test]
    fn test_rounding_and_formatting() {
        assert_eq!(
            call("ROUND", vec![Arg::Number(2.346), Arg::Number(2.0)]),
            CellValue::Number(2.35)
        );
        assert_eq!(call("ROUND", vec![Arg::Number(2.5)]), CellValue::Number(3.0));
        assert_eq!(
            call("ROUND", vec![Arg::Number(1234.5), Arg::Number(-2.0)]),
            CellValue::Number(1200.0)
        );
        assert_eq!(
            call("ROUND", vec![Arg::Number(-1250.0), Arg::Number(-2.0)]),
            CellValue::Number(-1300.0)
        );
        assert_eq!(
            call("ROUND", vec![Arg::Number(1.0), Arg::Number(-13.0)]),
            CellValue::Error(ErrorKind::Value)
        );
        assert_eq!(
            call("FIXED", vec![Arg::Number(3.14159), Arg::Number(2.0)]),
            CellValue::Text("3.14".into())
        );
        assert_eq!(
            call("MONEY", vec![Arg::Number(-2.5)]),
            CellValue::Text("-$2.50".into())
        );
        assert_eq!(
            call("FIXED", vec![Arg::Number(1.0), Arg::Number(20.0)]),
            CellValue::Error(ErrorKind::Value)
        );
        assert_eq!(call("SQRT", vec![Arg::Number(-1.0)]), CellValue::Error(ErrorKind::Num));
    }

    #[test]
    fn test_randint_bounds() {
        for _ in 0..50 {
            let CellValue::Number(n) = call("RANDINT", vec![Arg::Number(1.0), Arg::Number(3.0)])
            else {
                panic!("expected number");
            };
            assert!((1.0..=3.0).contains(&n) && n.fract() == 0.0);
        }
        assert_eq!(
            call("RANDINT", vec![Arg::Number(3.0), Arg::Number(1.0)]),
            CellValue::Error(ErrorKind::Num)
        );
    }

    #[test]
    fn test_date_overflows_months() {
        let expected = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap().and_time(NaiveTime::MIN);
        assert_eq!(
            call("DATE", vec![Arg::Number(2024.0), Arg::Number(14.0), Arg::Number(1.0)]),
            CellValue::Date(expected)
        );
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_time(NaiveTime::MIN);
        assert_eq!(
            call("DATE", vec![Arg::Number(2024.0), Arg::Number(2.0), Arg::Number(30.0)]),
            CellValue::Date(expected)
        );
    }

    #[test]
    fn test_row_and_column() {
        let r = Reference::parse("C5:D9").unwrap();
        assert_eq!(call("ROW", vec![Arg::Reference(r.clone())]), CellValue::Number(5.0));
        assert_eq!(call("COLUMN", vec![Arg::Reference(r)]), CellValue::Number(3.0));
    }

    #[test]
    fn test_text_functions() {
        assert_eq!(call("LEN", vec![Arg::Text("héllo".into())]), CellValue::Number(5.0));
        assert_eq!(call("UPPER", vec![Arg::Text("abc".into())]), CellValue::Text("ABC".into()));
        assert_eq!(
            call(
                "CONCAT",
                vec![Arg::Value(CellValue::Text("a".into())), Arg::Value(CellValue::Number(1.0))]
            ),
            CellValue::Text("a1".into())
        );
    }
}
