//! HTTP request parameter resolution.
//!
//! A parameter is looked up in the query string first, then in the JSON
//! request body. Booleans accept `t`/`true`/`y`/`yes`/`1` and
//! `f`/`false`/`n`/`no`/`0` (case-insensitive); anything else is an error
//! rather than a silent default.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// A parameter that was present but could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamError {
    pub key: String,
    pub message: String,
}

impl ParamError {
    fn new(key: &str, message: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parameter '{}': {}", self.key, self.message)
    }
}

impl std::error::Error for ParamError {}

#[derive(Debug, Default)]
pub struct ParamResolver {
    query: HashMap<String, String>,
    body: Option<serde_json::Map<String, Value>>,
}

impl ParamResolver {
    /// `body` may be empty. A non-empty body must be a JSON object.
    pub fn new(query: HashMap<String, String>, body: &[u8]) -> Result<Self, ParamError> {
        let body = if body.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            match serde_json::from_slice::<Value>(body) {
                Ok(Value::Object(map)) => Some(map),
                Ok(_) => return Err(ParamError::new("body", "request body must be a JSON object")),
                Err(e) => return Err(ParamError::new("body", format!("invalid JSON: {}", e))),
            }
        };
        Ok(Self { query, body })
    }

    fn from_body(&self, key: &str) -> Option<&Value> {
        self.body.as_ref().and_then(|b| b.get(key)).filter(|v| !v.is_null())
    }

    /// A string parameter. Empty query values fall through to the body.
    pub fn string(&self, key: &str) -> Result<Option<String>, ParamError> {
        if let Some(v) = self.query.get(key).filter(|v| !v.is_empty()) {
            return Ok(Some(v.clone()));
        }
        match self.from_body(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(_) => Err(ParamError::new(key, "expected a string")),
        }
    }

    pub fn bool(&self, key: &str) -> Result<Option<bool>, ParamError> {
        if let Some(v) = self.query.get(key).filter(|v| !v.is_empty()) {
            return parse_bool(v).map(Some).ok_or_else(|| not_bool(key, v));
        }
        match self.from_body(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) => parse_bool(s).map(Some).ok_or_else(|| not_bool(key, s)),
            Some(Value::Number(n)) => parse_bool(&n.to_string())
                .map(Some)
                .ok_or_else(|| not_bool(key, &n.to_string())),
            Some(_) => Err(ParamError::new(key, "expected a boolean")),
        }
    }

    pub fn int(&self, key: &str) -> Result<Option<i64>, ParamError> {
        if let Some(v) = self.query.get(key).filter(|v| !v.is_empty()) {
            return v
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ParamError::new(key, format!("'{}' is not an integer", v)));
        }
        match self.from_body(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| ParamError::new(key, "expected an integer")),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ParamError::new(key, format!("'{}' is not an integer", s))),
            Some(_) => Err(ParamError::new(key, "expected an integer")),
        }
    }

    /// A comma-separated list. The body may also carry a JSON array of
    /// strings. Empty items are dropped.
    pub fn list(&self, key: &str) -> Result<Vec<String>, ParamError> {
        if let Some(Value::Array(items)) = self.from_body(key) {
            if !self.query.get(key).is_some_and(|v| !v.is_empty()) {
                return items
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => Ok(s.trim().to_string()),
                        _ => Err(ParamError::new(key, "expected an array of strings")),
                    })
                    .filter(|r| !matches!(r, Ok(s) if s.is_empty()))
                    .collect();
            }
        }
        Ok(self
            .string(key)?
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Parse a lenient boolean. `None` means uninterpretable.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "1" => Some(true),
        "f" | "false" | "n" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn not_bool(key: &str, value: &str) -> ParamError {
    ParamError::new(key, format!("'{}' is not interpretable as a boolean", value))
}
