//! Value coercion.
//!
//! Every scalar that reaches SQL text goes through [`SqlValue`]: inline
//! compilation renders [`SqlValue::to_literal`], parameterized compilation
//! binds [`SqlValue::to_param`]. Text is escaped with backslashes for the
//! three characters MySQL treats specially inside a quoted literal.

use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;

use crate::error::{WeaveError, WeaveResult};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A dynamically typed value destined for a predicate or a written column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    /// Raw bytes; rendered as text after lossy UTF-8 normalisation.
    Bytes(Vec<u8>),
    /// List-like value, decomposed for IN / BETWEEN.
    List(Vec<SqlValue>),
    /// Structured value with no SQL scalar form; rendered as its JSON text.
    Json(serde_json::Value),
}

/// Escape backslash, single quote and double quote with a backslash.
///
/// Borrows the input when nothing needs escaping.
pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.contains(|c| matches!(c, '\\' | '\'' | '"')) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        if matches!(c, '\\' | '\'' | '"') {
            out.push('\\');
        }
        out.push(c);
    }
    Cow::Owned(out)
}

fn quoted(s: &str) -> String {
    format!("'{}'", escape(s))
}

fn float_text(f: f64) -> String {
    // Display never switches to exponent notation, so this is plain decimal.
    format!("{}", f)
}

impl SqlValue {
    /// Wrap raw bytes.
    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        SqlValue::Bytes(b.into())
    }

    /// Render as an inline SQL literal.
    ///
    /// Numbers are bare decimals, booleans are `1`/`0`, `Null` is `NULL`.
    /// Everything else is normalised to text, escaped and single-quoted.
    pub fn to_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            SqlValue::Int(n) => n.to_string(),
            SqlValue::UInt(n) => n.to_string(),
            SqlValue::Float(f) if f.is_finite() => float_text(*f),
            SqlValue::Float(_) => "NULL".to_string(),
            SqlValue::Text(s) => quoted(s),
            other => quoted(&other.to_string()),
        }
    }

    /// Canonical form bound to a `?` placeholder.
    ///
    /// The driver does the quoting, so text stays unescaped here. Booleans
    /// bind as `0`/`1` to match the inline form.
    pub fn to_param(&self) -> SqlValue {
        match self {
            SqlValue::Null
            | SqlValue::Int(_)
            | SqlValue::UInt(_)
            | SqlValue::Text(_) => self.clone(),
            SqlValue::Float(f) if f.is_finite() => self.clone(),
            SqlValue::Float(_) => SqlValue::Null,
            SqlValue::Bool(b) => SqlValue::Int(i64::from(*b)),
            other => SqlValue::Text(other.to_string()),
        }
    }

    /// Ordered scalars of a list-like value, for IN / BETWEEN.
    pub fn decompose(&self) -> WeaveResult<Vec<SqlValue>> {
        match self {
            SqlValue::List(items) => Ok(items.clone()),
            other => Err(WeaveError::InvalidValue(format!(
                "expected a list of values, got {}",
                other.kind()
            ))),
        }
    }

    /// Short type name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "bool",
            SqlValue::Int(_) => "int",
            SqlValue::UInt(_) => "uint",
            SqlValue::Float(_) => "float",
            SqlValue::Text(_) => "text",
            SqlValue::Bytes(_) => "bytes",
            SqlValue::List(_) => "list",
            SqlValue::Json(_) => "json",
        }
    }
}

/// Plain text form: unquoted and unescaped.
impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => Ok(()),
            SqlValue::Bool(b) => write!(f, "{}", b),
            SqlValue::Int(n) => write!(f, "{}", n),
            SqlValue::UInt(n) => write!(f, "{}", n),
            SqlValue::Float(v) => write!(f, "{}", float_text(*v)),
            SqlValue::Text(s) => f.write_str(s),
            SqlValue::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            SqlValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            SqlValue::Json(v) => write!(f, "{}", v),
        }
    }
}

macro_rules! from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for SqlValue {
            fn from(v: $t) -> Self {
                SqlValue::Int(v as i64)
            }
        })*
    };
}

macro_rules! from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for SqlValue {
            fn from(v: $t) -> Self {
                SqlValue::UInt(v as u64)
            }
        })*
    };
}

from_signed!(i8, i16, i32, i64, isize);
from_unsigned!(u8, u16, u32, u64, usize);

impl From<f32> for SqlValue {
    fn from(v: f32) -> Self {
        // Go through the shortest f32 text so 0.1f32 stays 0.1.
        SqlValue::Float(v.to_string().parse().unwrap_or(v as f64))
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<char> for SqlValue {
    fn from(v: char) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        SqlValue::Text(v.clone())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Cow<'_, str>> for SqlValue {
    fn from(v: Cow<'_, str>) -> Self {
        SqlValue::Text(v.into_owned())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

impl<T: Into<SqlValue>> From<Vec<T>> for SqlValue {
    fn from(v: Vec<T>) -> Self {
        SqlValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<SqlValue>, const N: usize> From<[T; N]> for SqlValue {
    fn from(v: [T; N]) -> Self {
        SqlValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::Text(v.format(DATETIME_FORMAT).to_string())
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Text(v.naive_utc().format(DATETIME_FORMAT).to_string())
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Text(v.format("%Y-%m-%d").to_string())
    }
}

impl From<NaiveTime> for SqlValue {
    fn from(v: NaiveTime) -> Self {
        SqlValue::Text(v.format("%H:%M:%S").to_string())
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    SqlValue::UInt(u)
                } else {
                    SqlValue::Float(n.as_f64().unwrap_or_default())
                }
            }
            Value::String(s) => SqlValue::Text(s),
            Value::Array(items) => SqlValue::List(items.into_iter().map(SqlValue::from).collect()),
            obj @ Value::Object(_) => SqlValue::Json(obj),
        }
    }
}
