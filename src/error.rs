//! Error types for server-config reconciliation

use fieldtrack::{TrackerError, ValueError};
use thiserror::Error;

/// Errors from building or querying a server-config resource
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No config file path was supplied or resolvable for a file-backed
    /// reconciliation
    #[error("a config file path must be specified when updating the server config on linux or macos")]
    MissingConfigFile,

    /// A document value could not be parsed into the field's type
    #[error("invalid value for '{field}': {source}")]
    InvalidValue {
        field: String,
        #[source]
        source: ValueError,
    },

    /// Server mode string not recognized
    #[error("unknown server mode '{0}'")]
    UnknownServerMode(String),

    /// A tracked field has no entry in the resource's field registry.
    /// Integration error: the tracker and the registry are built from the
    /// same table, so this cannot happen for well-formed resources.
    #[error("config field '{0}' is not declared by the resource")]
    UnknownField(String),

    /// Status mutation on an unregistered field
    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

/// Accumulated validation failures, reported together
#[derive(Error, Debug)]
#[error("{}", .issues.join(", "))]
pub struct ValidationError {
    pub issues: Vec<String>,
}

/// Errors from patching the line-oriented config file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// A line looked like a key/value pair but carries no key. Aborts the
    /// reconciliation rather than risking a corrupted patch.
    #[error("failed to parse config file line {line}: missing config value name")]
    MalformedLine { line: usize },
}
