//! Reconciliation executor
//!
//! Drives a platform backend against a validated resource and wraps the
//! change counts in the outcome the surrounding task framework reports.
//! Updates to existing entries always resolve before additions; the
//! counters rely on that ordering.

use crate::backend::{Backend, ChangeCounts};
#[cfg(not(windows))]
use crate::backend::FileBackend;
#[cfg(windows)]
use crate::backend::{RegistryBackend, WinRegistry};
use crate::config::ServerConfig;
use crate::error::ConfigError;
use crate::reload::{CommandReloader, ConfigReloader};
use anyhow::Context;
use serde::{Deserialize, Serialize};

/// What a reconciliation did, in the shape the task framework reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    /// Whether the live configuration was changed
    pub updated: bool,
    /// `"Config updated"` or `"Config not changed"`
    pub comment: String,
    pub counts: ChangeCounts,
}

impl Outcome {
    fn changed(counts: ChangeCounts) -> Self {
        Self {
            updated: true,
            comment: "Config updated".to_string(),
            counts,
        }
    }

    fn unchanged() -> Self {
        Self {
            updated: false,
            comment: "Config not changed".to_string(),
            counts: ChangeCounts::default(),
        }
    }

    /// Human-readable change detail; `None` when nothing changed
    pub fn change_summary(&self) -> Option<String> {
        self.counts.has_changes().then(|| {
            format!("{} config value change(s) applied", self.counts.total())
        })
    }
}

/// Applies a resource's pending changes through a platform backend and
/// triggers the config reload when anything changed.
pub struct Reconciler {
    backend: Box<dyn Backend>,
    reloader: Box<dyn ConfigReloader>,
}

impl Reconciler {
    /// A reconciler over an explicit backend, with the default command-based
    /// reloader
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            reloader: Box::new(CommandReloader::new()),
        }
    }

    /// Replace the reload hook, e.g. with a custom reload mechanism
    pub fn with_reloader(mut self, reloader: Box<dyn ConfigReloader>) -> Self {
        self.reloader = reloader;
        self
    }

    /// The standard backend for the build target: the config-file patcher
    /// everywhere except Windows, where the configuration lives in the
    /// registry
    pub fn for_platform(config: &ServerConfig) -> Result<Self, ConfigError> {
        #[cfg(windows)]
        {
            Ok(Self::new(Box::new(RegistryBackend::for_server_mode(
                WinRegistry,
                config.server_mode,
            ))))
        }
        #[cfg(not(windows))]
        {
            Ok(Self::new(Box::new(FileBackend::from_config(config)?)))
        }
    }

    /// Reconcile without reporting or reloading; returns the raw counts
    pub fn apply(&mut self, config: &mut ServerConfig) -> anyhow::Result<ChangeCounts> {
        self.backend.apply(config)
    }

    /// Reconcile, then reload the server if anything changed (unless the
    /// resource opts out) and report the outcome
    pub fn run(&mut self, config: &mut ServerConfig) -> anyhow::Result<Outcome> {
        let counts = self.backend.apply(config)?;

        if !counts.has_changes() {
            log::debug!("config not changed");
            return Ok(Outcome::unchanged());
        }

        if config.skip_reload {
            log::debug!("config reload skipped");
        } else {
            self.reloader
                .reload(config)
                .context("config was updated but the reload failed")?;
        }

        Ok(Outcome::changed(counts))
    }
}
