//! Runtime cell values and the scalar coercion table.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::format::format_number;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Div0,
    Value,
    Ref,
    Name,
    Num,
    NA,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::Div0,
        ErrorKind::Value,
        ErrorKind::Ref,
        ErrorKind::Name,
        ErrorKind::Num,
        ErrorKind::NA,
    ];

    pub fn as_code(self) -> &'static str {
        match self {
            ErrorKind::Div0 => "#DIV/0!",
            ErrorKind::Value => "#VALUE!",
            ErrorKind::Ref => "#REF!",
            ErrorKind::Name => "#NAME?",
            ErrorKind::Num => "#NUM!",
            ErrorKind::NA => "#N/A",
        }
    }

    pub fn from_code(code: &str) -> Option<ErrorKind> {
        ErrorKind::ALL
            .into_iter()
            .find(|kind| kind.as_code().eq_ignore_ascii_case(code))
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// Tag of a [`CellValue`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Empty,
    Text,
    Number,
    Logical,
    Date,
    Error,
    Array,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Logical(bool),
    Date(NaiveDateTime),
    Error(ErrorKind),
    /// A rectangular block of values (ranges and array constants), row-major.
    Array(Vec<Vec<CellValue>>),
}

/// Day zero of the serial date system.
fn date_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .unwrap_or_default()
        .and_time(NaiveTime::MIN)
}

/// Formats tried, in order, when coercing text to a date.
pub const DEFAULT_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];
const DEFAULT_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

impl CellValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            CellValue::Empty => ValueKind::Empty,
            CellValue::Text(_) => ValueKind::Text,
            CellValue::Number(_) => ValueKind::Number,
            CellValue::Logical(_) => ValueKind::Logical,
            CellValue::Date(_) => ValueKind::Date,
            CellValue::Error(_) => ValueKind::Error,
            CellValue::Array(_) => ValueKind::Array,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CellValue::Error(_))
    }

    pub fn error(&self) -> Option<ErrorKind> {
        match self {
            CellValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Build a value from raw text, inferring its tag:
    /// number, then date, then logical, falling back to text.
    /// `""` is `Empty`; whitespace-only text stays text.
    pub fn infer(raw: &str) -> CellValue {
        CellValue::infer_with_formats(raw, DEFAULT_DATE_FORMATS)
    }

    pub fn infer_with_formats<S: AsRef<str>>(raw: &str, date_formats: &[S]) -> CellValue {
        if raw.is_empty() {
            return CellValue::Empty;
        }
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Text(raw.to_string());
        }
        if let Some(n) = parse_number(trimmed) {
            return CellValue::Number(n);
        }
        if let Some(date) = parse_date(trimmed, date_formats) {
            return CellValue::Date(date);
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return CellValue::Logical(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return CellValue::Logical(false);
        }
        CellValue::Text(raw.to_string())
    }

    /// Serial day number of a date (days since 1899-12-30, fractional for times).
    pub fn date_to_serial(date: &NaiveDateTime) -> f64 {
        let delta = *date - date_epoch();
        delta.num_milliseconds() as f64 / 86_400_000.0
    }

    pub fn serial_to_date(serial: f64) -> Option<NaiveDateTime> {
        if !serial.is_finite() {
            return None;
        }
        let millis = (serial * 86_400_000.0).round() as i64;
        date_epoch().checked_add_signed(chrono::TimeDelta::try_milliseconds(millis)?)
    }

    /// Coerce to a number: logical -> 1/0, empty -> 0, date -> serial,
    /// numeric text -> its value. Anything else is `#VALUE!`.
    pub fn to_number(&self) -> Result<f64, ErrorKind> {
        match self {
            CellValue::Number(n) => Ok(*n),
            CellValue::Logical(b) => Ok(if *b { 1.0 } else { 0.0 }),
            CellValue::Empty => Ok(0.0),
            CellValue::Date(d) => Ok(CellValue::date_to_serial(d)),
            CellValue::Text(s) => parse_number(s.trim()).ok_or(ErrorKind::Value),
            CellValue::Error(e) => Err(*e),
            CellValue::Array(rows) => match single_item(rows) {
                Some(v) => v.to_number(),
                None => Err(ErrorKind::Value),
            },
        }
    }

    pub fn to_text(&self) -> Result<String, ErrorKind> {
        match self {
            CellValue::Empty => Ok(String::new()),
            CellValue::Text(s) => Ok(s.clone()),
            CellValue::Number(n) => Ok(format_number(*n)),
            CellValue::Logical(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
            CellValue::Date(d) => Ok(format_date(d)),
            CellValue::Error(e) => Err(*e),
            CellValue::Array(rows) => match single_item(rows) {
                Some(v) => v.to_text(),
                None => Err(ErrorKind::Value),
            },
        }
    }

    pub fn to_logical(&self) -> Result<bool, ErrorKind> {
        match self {
            CellValue::Logical(b) => Ok(*b),
            CellValue::Number(n) => Ok(*n != 0.0),
            CellValue::Empty => Ok(false),
            CellValue::Date(d) => Ok(CellValue::date_to_serial(d) != 0.0),
            CellValue::Text(s) => {
                let s = s.trim();
                if s.eq_ignore_ascii_case("true") {
                    Ok(true)
                } else if s.eq_ignore_ascii_case("false") {
                    Ok(false)
                } else {
                    Err(ErrorKind::Value)
                }
            }
            CellValue::Error(e) => Err(*e),
            CellValue::Array(rows) => match single_item(rows) {
                Some(v) => v.to_logical(),
                None => Err(ErrorKind::Value),
            },
        }
    }

    /// Type rank for mixed-type comparison: Date/Number > Logical > Text.
    fn rank(&self) -> u8 {
        match self {
            CellValue::Number(_) | CellValue::Date(_) => 3,
            CellValue::Logical(_) => 2,
            _ => 1,
        }
    }

    /// Compare two scalars. Empty adopts the other operand's type (0, FALSE or "").
    /// Errors propagate; arrays that are not a single item are `#VALUE!`.
    pub fn compare(&self, other: &CellValue) -> Result<Ordering, ErrorKind> {
        let left = self.scalar()?;
        let right = other.scalar()?;
        if let Some(e) = left.error().or(right.error()) {
            return Err(e);
        }
        let (left, right) = match (&left, &right) {
            (CellValue::Empty, CellValue::Empty) => return Ok(Ordering::Equal),
            (CellValue::Empty, r) => (r.blank_like(), right.clone()),
            (l, CellValue::Empty) => (left.clone(), l.blank_like()),
            _ => (left.clone(), right.clone()),
        };
        let (lr, rr) = (left.rank(), right.rank());
        if lr != rr {
            return Ok(lr.cmp(&rr));
        }
        Ok(match lr {
            3 => {
                let a = left.to_number()?;
                let b = right.to_number()?;
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
            2 => left.to_logical()?.cmp(&right.to_logical()?),
            _ => {
                let a = left.to_text()?.to_lowercase();
                let b = right.to_text()?.to_lowercase();
                a.cmp(&b)
            }
        })
    }

    /// Equality by tag then value (dates equal numbers with the same serial).
    pub fn equals(&self, other: &CellValue) -> Result<bool, ErrorKind> {
        Ok(self.compare(other)? == Ordering::Equal)
    }

    fn blank_like(&self) -> CellValue {
        match self {
            CellValue::Number(_) | CellValue::Date(_) => CellValue::Number(0.0),
            CellValue::Logical(_) => CellValue::Logical(false),
            _ => CellValue::Text(String::new()),
        }
    }

    /// Collapse a single-item array to its item; multi-item arrays are `#VALUE!`.
    pub fn scalar(&self) -> Result<CellValue, ErrorKind> {
        match self {
            CellValue::Array(rows) => single_item(rows).cloned().ok_or(ErrorKind::Value),
            other => Ok(other.clone()),
        }
    }

    /// Iterate over every item, flattening arrays row by row.
    pub fn flatten(&self) -> Vec<&CellValue> {
        match self {
            CellValue::Array(rows) => rows.iter().flatten().collect(),
            other => vec![other],
        }
    }
}

fn single_item(rows: &[Vec<CellValue>]) -> Option<&CellValue> {
    match rows {
        [row] => match row.as_slice() {
            [item] => Some(item),
            _ => None,
        },
        _ => None,
    }
}

fn parse_number(text: &str) -> Option<f64> {
    // Reject things Rust accepts but spreadsheets do not ("inf", "nan").
    if !text.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_date<S: AsRef<str>>(text: &str, date_formats: &[S]) -> Option<NaiveDateTime> {
    for fmt in DEFAULT_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }
    date_formats.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(text, fmt.as_ref())
            .ok()
            .map(|d| d.and_time(NaiveTime::MIN))
    })
}

pub fn format_date(date: &NaiveDateTime) -> String {
    if date.time() == NaiveTime::MIN {
        date.format("%Y-%m-%d").to_string()
    } else {
        date.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Empty, CellValue::Empty) => true,
            (CellValue::Text(a), CellValue::Text(b)) => a == b,
            (CellValue::Number(a), CellValue::Number(b)) => a == b,
            (CellValue::Logical(a), CellValue::Logical(b)) => a == b,
            (CellValue::Date(a), CellValue::Date(b)) => a == b,
            (CellValue::Date(d), CellValue::Number(n)) | (CellValue::Number(n), CellValue::Date(d)) => {
                CellValue::date_to_serial(d) == *n
            }
            (CellValue::Error(a), CellValue::Error(b)) => a == b,
            (CellValue::Array(a), CellValue::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Logical(value)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        CellValue::Date(value)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(value: NaiveDate) -> Self {
        CellValue::Date(value.and_time(NaiveTime::MIN))
    }
}

impl From<ErrorKind> for CellValue {
    fn from(value: ErrorKind) -> Self {
        CellValue::Error(value)
    }
}

/// Raw text is coerced; use `CellValue::Text` directly to keep it verbatim.
impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::infer(value)
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::infer(&value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) => f.write_str(&format_number(*n)),
            CellValue::Logical(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            CellValue::Date(d) => f.write_str(&format_date(d)),
            CellValue::Error(e) => write!(f, "{e}"),
            CellValue::Array(rows) => {
                let text = rows
                    .iter()
                    .map(|row| row.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(","))
                    .collect::<Vec<_>>()
                    .join(";");
                write!(f, "{{{text}}}")
            }
        }
    }
}
