use serde::Serialize;
use serde_json::{Map, Number, Value};

/// A single parsed cell.
pub type Cell = Value;

/// Key under which fields beyond the header width are collected.
pub const PARSED_EXTRA_KEY: &str = "__parsed_extra";

/// Largest integer that survives a round trip through an `f64`.
/// Integer text beyond this is left as a string rather than rounded.
const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// One parsed record.
///
/// ```text
///   header = true   →  Record({"id": 1, "val": "a"})
///   header = false  →  Fields([1, "a"])
/// ```
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Row {
    /// Keyed by header name, in header order.
    Record(Map<String, Cell>),
    /// Positional cells.
    Fields(Vec<Cell>),
}

impl Row {
    /// Look up a cell by header name. Always `None` for positional rows.
    pub fn get(&self, key: &str) -> Option<&Cell> {
        match self {
            Self::Record(map) => map.get(key),
            Self::Fields(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Record(map) => map.len(),
            Self::Fields(cells) => cells.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The rows produced by parsing one block, in source order.
///
/// Ownership passes to the consumer with the event that carries it.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RowSet {
    pub rows: Vec<Row>,
}

impl RowSet {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl IntoIterator for RowSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a RowSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Convert raw field text into a cell.
///
/// Without dynamic typing every field is a string. With it:
///
/// ```text
/// ┌─────────────────────────────┬──────────────┐
/// │ Text                        │ Cell         │
/// ├─────────────────────────────┼──────────────┤
/// │ ""                          │ null         │
/// │ true / TRUE / True          │ true         │
/// │ false / FALSE / False       │ false        │
/// │ 42, -7, 3.5, .5, 1e3        │ number       │
/// │ 9007199254740993 (> 2^53)   │ string       │
/// │ anything else               │ string       │
/// └─────────────────────────────┴──────────────┘
/// ```
pub fn type_cell(raw: &str, dynamic: bool) -> Cell {
    if !dynamic {
        return Value::String(raw.to_owned());
    }
    match raw {
        "" => Value::Null,
        "true" | "TRUE" | "True" => Value::Bool(true),
        "false" | "FALSE" | "False" => Value::Bool(false),
        _ => parse_number(raw).unwrap_or_else(|| Value::String(raw.to_owned())),
    }
}

fn parse_number(raw: &str) -> Option<Value> {
    let text = raw.trim();
    if !looks_numeric(text) {
        return None;
    }
    if let Ok(int) = text.parse::<i64>() {
        return (int.abs() <= MAX_SAFE_INTEGER).then(|| Value::from(int));
    }
    let float = text.parse::<f64>().ok()?;
    Number::from_f64(float).map(Value::Number)
}

/// Accepts `-?(digits[.digits?] | .digits)([eE][+-]?digits)?`.
///
/// Rejects forms `f64::from_str` would take but a CSV author would not
/// mean as a number (`inf`, `NaN`, `+5`).
fn looks_numeric(text: &str) -> bool {
    let body = text.strip_prefix('-').unwrap_or(text);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(at) => (&body[..at], Some(&body[at + 1..])),
        None => (body, None),
    };

    let mut parts = mantissa.splitn(2, '.');
    let int_part = parts.next().unwrap_or_default();
    let frac_part = parts.next();
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    let mantissa_ok = match frac_part {
        None => !int_part.is_empty() && all_digits(int_part),
        Some(frac) => {
            all_digits(int_part) && all_digits(frac) && !(int_part.is_empty() && frac.is_empty())
        }
    };

    let exponent_ok = exponent.is_none_or(|exp| {
        let digits = exp.strip_prefix(['+', '-']).unwrap_or(exp);
        !digits.is_empty() && all_digits(digits)
    });

    mantissa_ok && exponent_ok
}
