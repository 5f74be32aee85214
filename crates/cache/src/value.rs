use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// A value read back from the cache.
///
/// Any JSON value can be written, but only booleans and strings are ever
/// handed back to callers. Anything else found in the store is a contract
/// violation and is reported as
/// [`UnsupportedValue`](crate::error::ErrorKind::UnsupportedValue) instead of
/// being coerced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CacheValue {
    Bool(bool),
    Text(String),
}

impl CacheValue {
    /// Decode a stored JSON body.
    pub(crate) fn from_json(key: &str, body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body).or_raise(|| ErrorKind::Deserialize(key.to_string()))?;
        match value {
            Value::Bool(b) => Ok(Self::Bool(b)),
            Value::String(s) => Ok(Self::Text(s)),
            other => exn::bail!(ErrorKind::UnsupportedValue {
                key: key.to_string(),
                found: json_type(&other),
            }),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Bool(_) => None,
        }
    }

    /// String form, booleans rendered as `"true"`/`"false"`.
    pub fn into_string(self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Text(s) => s,
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl fmt::Display for CacheValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for CacheValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<String> for CacheValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for CacheValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}
