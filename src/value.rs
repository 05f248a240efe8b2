//! Typed values exchanged with sqinn.
//!
//! `Value` is used in both directions: as a bind parameter, where its wire
//! tag follows from the variant, and as a decoded column, where the caller
//! declares the expected `ValueType` up front because the protocol carries
//! no schema.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::codec::{
    decode_blob, decode_bool, decode_f64, decode_i32, decode_i64, decode_string, encode_blob,
    encode_f64, encode_i32, encode_i64, encode_str,
};
use crate::error::{Result, SqinnError};

/// Value type tag, as sent on the wire.
///
/// Used as the bind tag and as the column type declaration for
/// `Column` and `Query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    Null = 0,
    Int = 1,
    Int64 = 2,
    Double = 3,
    Text = 4,
    Blob = 5,
}

impl ValueType {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(ValueType::Null),
            1 => Some(ValueType::Int),
            2 => Some(ValueType::Int64),
            3 => Some(ValueType::Double),
            4 => Some(ValueType::Text),
            5 => Some(ValueType::Blob),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::Null => "null",
            ValueType::Int => "int",
            ValueType::Int64 => "int64",
            ValueType::Double => "double",
            ValueType::Text => "text",
            ValueType::Blob => "blob",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "null" => Ok(ValueType::Null),
            "int" | "int32" | "integer" => Ok(ValueType::Int),
            "int64" | "bigint" => Ok(ValueType::Int64),
            "double" | "real" | "float" => Ok(ValueType::Double),
            "text" | "string" => Ok(ValueType::Text),
            "blob" => Ok(ValueType::Blob),
            other => Err(format!("unknown value type '{}'", other)),
        }
    }
}

/// A single SQL value: NULL or one of the five storage shapes.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// SQL NULL, or a column that was not set.
    #[default]
    Null,
    Int(i32),
    Int64(i64),
    Double(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// The wire tag this value binds as.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Int(_) => ValueType::Int,
            Value::Int64(_) => ValueType::Int64,
            Value::Double(_) => ValueType::Double,
            Value::Text(_) => ValueType::Text,
            Value::Blob(_) => ValueType::Blob,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as i64; also widens `Int`.
    pub fn as_int64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(v) => Some(v),
            _ => None,
        }
    }

    /// Append the bind encoding: tag byte followed by the value.
    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.value_type().as_byte());
        match self {
            Value::Null => {}
            Value::Int(v) => encode_i32(buf, *v),
            Value::Int64(v) => encode_i64(buf, *v),
            Value::Double(v) => encode_f64(buf, *v),
            Value::Text(v) => encode_str(buf, v),
            Value::Blob(v) => encode_blob(buf, v),
        }
    }

    /// Decode a presence flag and, if set, a value of the declared type.
    ///
    /// A declared type of `Null` consumes only the flag and yields `Null`.
    pub(crate) fn decode(buf: &[u8], col_type: ValueType) -> Result<(Value, &[u8])> {
        let (set, rest) = decode_bool(buf)?;
        if !set {
            return Ok((Value::Null, rest));
        }
        Ok(match col_type {
            ValueType::Null => (Value::Null, rest),
            ValueType::Int => {
                let (v, rest) = decode_i32(rest)?;
                (Value::Int(v), rest)
            }
            ValueType::Int64 => {
                let (v, rest) = decode_i64(rest)?;
                (Value::Int64(v), rest)
            }
            ValueType::Double => {
                let (v, rest) = decode_f64(rest)?;
                (Value::Double(v), rest)
            }
            ValueType::Text => {
                let (v, rest) = decode_string(rest)?;
                (Value::Text(v), rest)
            }
            ValueType::Blob => {
                let (v, rest) = decode_blob(rest)?;
                (Value::Blob(v), rest)
            }
        })
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Int(v) => serializer.serialize_i32(*v),
            Value::Int64(v) => serializer.serialize_i64(*v),
            Value::Double(v) => serializer.serialize_f64(*v),
            Value::Text(v) => serializer.serialize_str(v),
            Value::Blob(v) => v.serialize(serializer),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Infer a bind value from a dynamically typed JSON value.
///
/// Integers that fit 32 bits bind as `Int`, larger ones as `Int64`.
/// Booleans, arrays and objects have no storage class and fail with
/// `CannotBind`.
impl TryFrom<serde_json::Value> for Value {
    type Error = SqinnError;

    fn try_from(v: serde_json::Value) -> Result<Self> {
        use serde_json::Value as Json;

        match v {
            Json::Null => Ok(Value::Null),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(i32::try_from(i).map_or(Value::Int64(i), Value::Int))
                } else if let Some(f) = n.as_f64() {
                    if n.is_u64() {
                        // u64 beyond i64::MAX
                        return Err(SqinnError::CannotBind("u64"));
                    }
                    Ok(Value::Double(f))
                } else {
                    Err(SqinnError::CannotBind("number"))
                }
            }
            Json::String(s) => Ok(Value::Text(s)),
            Json::Bool(_) => Err(SqinnError::CannotBind("bool")),
            Json::Array(_) => Err(SqinnError::CannotBind("array")),
            Json::Object(_) => Err(SqinnError::CannotBind("object")),
        }
    }
}

/// One result row, values in declared column order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The value at column `icol`, if the row has that many columns.
    pub fn get(&self, icol: usize) -> Option<&Value> {
        self.values.get(icol)
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl std::ops::Index<usize> for Row {
    type Output = Value;

    fn index(&self, icol: usize) -> &Value {
        &self.values[icol]
    }
}
