//! String forms of typed field values
//!
//! The external config store speaks strings. Booleans serialize as
//! `true`/`false` and integers in plain decimal; parsing is forgiving about
//! the usual boolean spellings found in hand-edited documents.

use thiserror::Error;

/// A document value that cannot be parsed into the field's type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid value '{value}': {reason}")]
pub struct ValueError {
    pub value: String,
    pub reason: String,
}

impl ValueError {
    pub fn new(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Parse a boolean document value
pub fn parse_bool(value: &str) -> Result<bool, ValueError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(ValueError::new(value, "expected a boolean")),
    }
}

/// Parse a non-negative integer document value
pub fn parse_u32(value: &str) -> Result<u32, ValueError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| ValueError::new(value, "expected a non-negative integer"))
}
