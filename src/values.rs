//! Line-oriented config file vocabulary
//!
//! The file-backed store holds one `Name=Value` pair per line. Anything that
//! does not parse as a pair (comments, blank lines, free text) is passed
//! through reconciliation untouched.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One entry in the external configuration store. Values are always carried
/// in string form; typed fields serialize on the way in and out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValue {
    pub name: String,
    pub value: String,
}

impl ConfigValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// The config file line form of this entry
    pub fn to_line(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

/// Classification of one input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLine {
    /// Not a key/value pair; written through verbatim
    PassThrough,
    /// A parsed `Name=Value` pair
    Pair(ConfigValue),
}

/// A line with a separator but no key, e.g. `=Value`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("missing config value name")]
pub struct MissingValueName;

/// Classify a config file line.
///
/// Lines without a `=` separator pass through. The key and value are trimmed;
/// an empty key is an error since silently skipping it could corrupt the
/// patched output.
pub fn parse_config_line(input: &str) -> Result<ConfigLine, MissingValueName> {
    let Some((name, value)) = input.split_once('=') else {
        return Ok(ConfigLine::PassThrough);
    };

    let name = name.trim();
    if name.is_empty() {
        return Err(MissingValueName);
    }

    Ok(ConfigLine::Pair(ConfigValue::new(name, value.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pair() {
        let line = parse_config_line("Encryption=AlwaysOn").unwrap();
        assert_eq!(
            line,
            ConfigLine::Pair(ConfigValue::new("Encryption", "AlwaysOn"))
        );
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let line = parse_config_line("  IdleTimeout = 3600 ").unwrap();
        assert_eq!(
            line,
            ConfigLine::Pair(ConfigValue::new("IdleTimeout", "3600"))
        );
    }

    #[test]
    fn test_value_keeps_later_separators() {
        let line = parse_config_line("Log=*:file:10,Connections:file:100").unwrap();
        assert_eq!(
            line,
            ConfigLine::Pair(ConfigValue::new("Log", "*:file:10,Connections:file:100"))
        );
    }

    #[test]
    fn test_non_pair_lines_pass_through() {
        assert_eq!(parse_config_line("").unwrap(), ConfigLine::PassThrough);
        assert_eq!(
            parse_config_line("# a comment").unwrap(),
            ConfigLine::PassThrough
        );
        assert_eq!(
            parse_config_line("free text line").unwrap(),
            ConfigLine::PassThrough
        );
    }

    #[test]
    fn test_missing_name_is_an_error() {
        assert_eq!(parse_config_line("=orphan").unwrap_err(), MissingValueName);
        assert_eq!(
            parse_config_line("   =orphan").unwrap_err(),
            MissingValueName
        );
    }

    #[test]
    fn test_to_line() {
        let value = ConfigValue::new("BlankScreen", "true");
        assert_eq!(value.to_line(), "BlankScreen=true");
    }
}
