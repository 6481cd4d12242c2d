//! # Local Values
//!
//! The host-side twin of the Wire Value union: what proxy operations accept as
//! arguments and return as results.
//!
//! Typed access goes through `FromValue`. A null converts to `None` for any
//! `Option<T>`, never to an error.

use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::Utc;

use crate::array::ArrayProxy;
use crate::error::Error;
use crate::error::Result;
use crate::proxy::ObjectProxy;

/// Named arguments of a remote call.
pub type Kwargs = BTreeMap<String, Value>;

/// A value on the host side of the bridge.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<Value>),
    Dict(BTreeMap<String, Value>),
    Object(ObjectProxy),
}

impl Value {
    /// Short name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Date(_) => "date",
            Self::Array(_) => "array",
            Self::Dict(_) => "dict",
            Self::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Converts into any `FromValue` type.
    pub fn extract<T: FromValue>(self) -> Result<T> {
        T::from_value(self)
    }
}

/// Builds named arguments, skipping absent ones the way the remote side
/// expects optional parameters to be left out.
pub fn kwargs<const N: usize>(pairs: [(&str, Option<Value>); N]) -> Kwargs {
    pairs
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
        .collect()
}

// ============================================================================
//  INTO VALUE
// ============================================================================

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Date(v)
    }
}

impl From<ObjectProxy> for Value {
    fn from(v: ObjectProxy) -> Self {
        Self::Object(v)
    }
}

impl From<&ObjectProxy> for Value {
    fn from(v: &ObjectProxy) -> Self {
        Self::Object(v.clone())
    }
}

impl From<ArrayProxy> for Value {
    fn from(v: ArrayProxy) -> Self {
        Self::Object(v.into_proxy())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(v: BTreeMap<String, T>) -> Self {
        Self::Dict(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

// ============================================================================
//  FROM VALUE
// ============================================================================

/// Typed extraction from a decoded value.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

pub(crate) fn unexpected(expected: &'static str, found: &Value) -> Error {
    Error::UnexpectedValue { expected, found: found.type_name().to_string() }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl FromValue for () {
    fn from_value(_: Value) -> Result<Self> {
        Ok(())
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        value.as_bool().ok_or_else(|| unexpected("bool", &value))
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self> {
        value.as_i64().ok_or_else(|| unexpected("integer", &value))
    }
}

impl FromValue for usize {
    fn from_value(value: Value) -> Result<Self> {
        value
            .as_i64()
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| unexpected("non-negative integer", &value))
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| unexpected("number", &value))
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(unexpected("string", &other)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Date(d) => Ok(d),
            other => Err(unexpected("date", &other)),
        }
    }
}

impl FromValue for ObjectProxy {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(p) => Ok(p),
            other => Err(unexpected("object", &other)),
        }
    }
}

impl FromValue for ArrayProxy {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(p) => ArrayProxy::try_from_proxy(p)
                .map_err(|p| Error::UnexpectedValue {
                    expected: "array object",
                    found: p.proxy_class().name().to_string(),
                }),
            other => Err(unexpected("array object", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(unexpected("array", &other)),
        }
    }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Dict(entries) => entries
                .into_iter()
                .map(|(k, v)| T::from_value(v).map(|v| (k, v)))
                .collect(),
            other => Err(unexpected("dict", &other)),
        }
    }
}
