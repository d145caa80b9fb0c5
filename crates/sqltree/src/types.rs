//! Declared column types and bound literal values.
//!
//! Types here only steer which node an operator produces (see
//! [`crate::expression`]); value coercion for bound parameters is left to the
//! execution layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared SQL type of a column or expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlType {
    /// No type information.
    #[default]
    Null,
    Integer,
    BigInteger,
    Numeric,
    Float,
    String,
    Text,
    Boolean,
    Date,
    DateTime,
    Json,
}

impl SqlType {
    /// `true` for the "no type" marker.
    pub fn is_null(self) -> bool {
        matches!(self, SqlType::Null)
    }

    /// String-like types turn `+` into concatenation.
    pub fn is_string(self) -> bool {
        matches!(self, SqlType::String | SqlType::Text)
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            SqlType::Integer | SqlType::BigInteger | SqlType::Numeric | SqlType::Float
        )
    }

    /// Pick the first non-null type, as used for function and arithmetic results.
    pub fn coalesce(self, other: SqlType) -> SqlType {
        if self.is_null() { other } else { self }
    }

    /// Type name used by `CAST(... AS <name>)` in the diagnostic renderer.
    pub fn sql_name(self) -> &'static str {
        match self {
            SqlType::Null => "NULL",
            SqlType::Integer => "INTEGER",
            SqlType::BigInteger => "BIGINT",
            SqlType::Numeric => "NUMERIC",
            SqlType::Float => "FLOAT",
            SqlType::String => "VARCHAR",
            SqlType::Text => "TEXT",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Date => "DATE",
            SqlType::DateTime => "TIMESTAMP",
            SqlType::Json => "JSON",
        }
    }
}

/// A literal value carried by a bind parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    /// The type a literal implies when nothing better is known.
    pub fn implied_type(&self) -> SqlType {
        match self {
            Value::Null => SqlType::Null,
            Value::Bool(_) => SqlType::Boolean,
            Value::Int(_) => SqlType::Integer,
            Value::Float(_) => SqlType::Float,
            Value::Str(_) => SqlType::String,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => Int,
    u16 => Int,
    u32 => Int,
    f32 => Float,
    f64 => Float,
    String => Str,
    &str => Str,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
