//! Reconciliation backends
//!
//! One capability, two mechanics: the live configuration is a line-oriented
//! text file on Linux and macOS and a registry hive on Windows. Both
//! backends honor the same contract - update existing entries first, then
//! add genuinely new ones, touching only fields the tracker marks as
//! supplied.

pub mod file;
pub mod registry;

pub use file::FileBackend;
#[cfg(windows)]
pub use registry::WinRegistry;
pub use registry::{RegistryBackend, RegistryStore, ValueChange, base_key_for_mode};

use crate::config::ServerConfig;
use serde::{Deserialize, Serialize};

/// How many entries a reconciliation added and updated (removals count as
/// updates). Both zero means the live configuration already matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCounts {
    pub added: usize,
    pub updated: usize,
}

impl ChangeCounts {
    pub fn total(&self) -> usize {
        self.added + self.updated
    }

    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Platform-specific mechanism that applies a resource's pending field
/// changes to the live configuration store
pub trait Backend {
    /// Reconcile the live store against the resource's pending changes.
    ///
    /// Walks the resource's tracker, applies updates before additions, and
    /// marks every applied field. Returns the change counts; an error means
    /// the live store was left as it was.
    fn apply(&mut self, config: &mut ServerConfig) -> anyhow::Result<ChangeCounts>;
}
