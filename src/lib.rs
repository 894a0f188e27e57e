//! # Vnckit
//!
//! Declarative RealVNC Server configuration reconciliation.
//!
//! A desired-state document names only the config parameters it wants
//! changed. This crate tracks exactly which fields were supplied, diffs that
//! partial state against the live configuration store - a line-oriented
//! `Name=Value` file on Linux and macOS, a registry hive on Windows - and
//! applies the minimal patch: changed entries are rewritten, removals
//! dropped, new entries appended, and every other byte preserved. The patch
//! commits atomically with a backup of the original.
//!
//! ## Core Concepts
//!
//! - **ServerConfig**: the resource - pending parameter values plus the
//!   task settings steering the reconciliation
//! - **FieldTracker** (from `fieldtrack`): per-field change intent - was a
//!   value supplied, is it a removal, has it been applied
//! - **Backend**: the platform store strategy ([`FileBackend`] or
//!   [`RegistryBackend`])
//! - **Reconciler**: drives the backend and reports the outcome
//!
//! ## Example
//!
//! ```no_run
//! use vnckit::{Platform, Reconciler, ServerConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut config = ServerConfig::new();
//! config.set_document_value("config_file", "/etc/vnc/config.d/vncserver-x11")?;
//! config.set_document_value("encryption", "AlwaysOn")?;
//! config.set_document_value("blank_screen", "true")?;
//! config.validate(Platform::current())?;
//!
//! let outcome = Reconciler::for_platform(&config)?.run(&mut config)?;
//! if outcome.updated {
//!     println!("{}", outcome.change_summary().unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Provider Traits
//!
//! - [`ConfigReloader`]: how the server is told to re-read its config;
//!   defaults to the platform's reload command
//! - [`RegistryStore`]: the registry substrate, so the Windows backend is
//!   testable without a live hive

pub mod backend;
pub mod config;
pub mod error;
pub mod platform;
pub mod reconcile;
pub mod reload;
pub mod validate;
pub mod values;

// Re-export main types at crate root
#[cfg(windows)]
pub use backend::WinRegistry;
pub use backend::{
    Backend, ChangeCounts, FileBackend, RegistryBackend, RegistryStore, ValueChange,
    base_key_for_mode,
};
pub use config::{DEFAULT_BACKUP_EXTENSION, ServerConfig, ServerMode, UNSET_VALUE};
pub use error::{ConfigError, PatchError, ValidationError};
pub use fieldtrack::{FieldSpec, FieldStatus, FieldTracker, TrackerError};
pub use platform::Platform;
pub use reconcile::{Outcome, Reconciler};
pub use reload::{CommandReloader, ConfigReloader, reload_command};
pub use values::{ConfigLine, ConfigValue, parse_config_line};
