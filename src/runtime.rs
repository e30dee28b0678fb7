//! Support code linked into generated entry points.
//!
//! Generated `main.rs` files call these helpers to coerce raw path and query values and to
//! build JSON error bodies, so the emitted programs stay short.

use serde::{de::DeserializeOwned, Deserialize};
use std::fmt;
use std::str::FromStr;

/// Re-exported so generated crates do not need their own `serde` dependency
pub use serde::Serialize;

/// JSON body returned for every failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
    pub error: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            message: message.into(),
            error: error.to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.message, self.error)
    }
}

impl std::error::Error for ApiError {}

/// A raw request value that could not be converted to the declared field type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot convert `{value}` to {target}")]
pub struct CoercionError {
    pub value: String,
    pub target: &'static str,
}

pub fn coerce_string(raw: &str) -> Result<String, CoercionError> {
    Ok(raw.to_string())
}

/// Strict base-10 integer conversion; surrounding whitespace is not accepted.
pub fn coerce_integer<T: FromStr>(raw: &str) -> Result<T, CoercionError> {
    raw.parse::<T>().map_err(|_| CoercionError {
        value: raw.to_string(),
        target: std::any::type_name::<T>(),
    })
}

/// Accepts `1 t T TRUE true True` and `0 f F FALSE false False`.
pub fn coerce_bool(raw: &str) -> Result<bool, CoercionError> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(CoercionError {
            value: raw.to_string(),
            target: "bool",
        }),
    }
}

pub fn to_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(value)
}

/// Decodes a request body. An empty body decodes as JSON `null`.
pub fn from_json<T: DeserializeOwned>(body: &[u8]) -> serde_json::Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return serde_json::from_slice(b"null");
    }
    serde_json::from_slice(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_coerce_integer() {
        assert_eq!(coerce_integer::<u64>("42"), Ok(42));
        assert_eq!(coerce_integer::<i32>("-7"), Ok(-7));

        let err = coerce_integer::<u64>("abc").unwrap_err();
        assert_eq!(err.value, "abc");
        assert_eq!(err.target, "u64");
        assert_eq!(err.to_string(), "cannot convert `abc` to u64");

        assert!(coerce_integer::<u8>("256").is_err());
        assert!(coerce_integer::<u32>(" 1").is_err());
        assert!(coerce_integer::<u32>("0x10").is_err());
        assert!(coerce_integer::<u32>("").is_err());
    }

    #[test]
    fn test_coerce_bool() {
        for raw in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(coerce_bool(raw), Ok(true), "{}", raw);
        }
        for raw in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(coerce_bool(raw), Ok(false), "{}", raw);
        }
        for raw in ["yes", "tRuE", "", "2"] {
            assert!(coerce_bool(raw).is_err(), "{}", raw);
        }
    }

    #[test]
    fn test_coerce_string_passes_through() {
        assert_eq!(coerce_string(""), Ok(String::new()));
        assert_eq!(coerce_string("Jane Doe"), Ok("Jane Doe".to_string()));
    }

    #[test]
    fn test_api_error_body() {
        let err = ApiError::new("failed to create service", "connection refused");
        assert_eq!(
            to_json(&err).unwrap(),
            r#"{"message":"failed to create service","error":"connection refused"}"#
        );
    }

    #[test]
    fn test_from_json() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct NewEmployee {
            name: String,
        }

        let parsed: NewEmployee = from_json(br#"{"name":"Ada"}"#).unwrap();
        assert_eq!(parsed.name, "Ada");

        let empty: Option<NewEmployee> = from_json(b"").unwrap();
        assert_eq!(empty, None);

        assert!(from_json::<NewEmployee>(b"{").is_err());
    }
}
