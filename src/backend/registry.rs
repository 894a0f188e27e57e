//! Registry-backed config store (Windows)
//!
//! The Windows server keeps its configuration in a registry hive rather
//! than a text file, so there is nothing to scan: the tracker's pending
//! fields are applied directly as value writes and removals. The hive
//! substrate sits behind [`RegistryStore`] so the reconciliation logic is
//! testable everywhere; the `winreg`-backed implementation only exists on
//! Windows builds.

use crate::backend::{Backend, ChangeCounts};
use crate::config::{ServerConfig, ServerMode};
use crate::error::ConfigError;
use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Service-mode configuration lives machine-wide
pub const HKLM_BASE_KEY: &str = r"HKLM:\SOFTWARE\RealVNC\vncserver";
/// User-mode configuration lives in the per-user hive
pub const HKCU_BASE_KEY: &str = r"HKCU:\Software\RealVNC\vncserver";

/// Which hive a server mode's configuration lives under
pub fn base_key_for_mode(mode: ServerMode) -> &'static str {
    match mode {
        ServerMode::User => HKCU_BASE_KEY,
        ServerMode::Service | ServerMode::Virtual => HKLM_BASE_KEY,
    }
}

/// What a registry write or removal actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueChange {
    Added,
    Updated,
    Removed,
    /// The store already held the requested state
    Unchanged,
}

/// Minimal registry capability the backend reconciles against.
///
/// Key paths carry their hive prefix (`HKLM:\` or `HKCU:\`). Every
/// operation reports what structurally changed, so the caller never has to
/// infer the outcome.
pub trait RegistryStore {
    /// Read a string value; `None` when the key or value does not exist
    fn value(&self, key: &str, name: &str) -> anyhow::Result<Option<String>>;

    /// Write a string value, creating the key as needed
    fn set_value(&mut self, key: &str, name: &str, value: &str) -> anyhow::Result<ValueChange>;

    /// Remove a single value; removing an absent value is `Unchanged`
    fn remove_value(&mut self, key: &str, name: &str) -> anyhow::Result<ValueChange>;

    /// Remove a key and everything beneath it
    fn remove_key(&mut self, key: &str) -> anyhow::Result<ValueChange>;
}

/// Reconciles a resource against a registry hive.
///
/// The base key is injected at construction; use
/// [`for_server_mode`](Self::for_server_mode) for the standard locations.
#[derive(Debug)]
pub struct RegistryBackend<S> {
    base_key: String,
    store: S,
}

impl<S: RegistryStore> RegistryBackend<S> {
    pub fn new(store: S, base_key: impl Into<String>) -> Self {
        Self {
            base_key: base_key.into(),
            store,
        }
    }

    pub fn for_server_mode(store: S, mode: ServerMode) -> Self {
        Self::new(store, base_key_for_mode(mode))
    }

    pub fn base_key(&self) -> &str {
        &self.base_key
    }

    /// The store, for inspecting what a reconciliation wrote
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: RegistryStore> Backend for RegistryBackend<S> {
    fn apply(&mut self, config: &mut ServerConfig) -> anyhow::Result<ChangeCounts> {
        let mut counts = ChangeCounts::default();

        for status in config.tracker().new_values() {
            let name = status.name.as_str();

            if status.clear {
                if self.store.remove_value(&self.base_key, name)? == ValueChange::Removed {
                    counts.updated += 1;
                    log::debug!(r"removed value {}\{}", self.base_key, name);
                }
            } else {
                let value = config
                    .field_value(name)
                    .ok_or_else(|| ConfigError::UnknownField(name.to_string()))?;

                match self.store.set_value(&self.base_key, name, &value)? {
                    ValueChange::Added => {
                        counts.added += 1;
                        log::debug!(r"added value {}\{} with {}", self.base_key, name, value);
                    }
                    ValueChange::Updated => {
                        counts.updated += 1;
                        log::debug!(r"updated value {}\{} with {}", self.base_key, name, value);
                    }
                    ValueChange::Removed | ValueChange::Unchanged => {}
                }
            }

            config
                .tracker_mut()
                .set_change_applied(name)
                .with_context(|| format!("failed to update change status for {name}"))?;
        }

        Ok(counts)
    }
}

#[cfg(windows)]
mod win {
    use super::{RegistryStore, ValueChange};
    use anyhow::{Context, bail};
    use std::io;
    use winreg::RegKey;
    use winreg::enums::{HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_ALL_ACCESS};

    /// [`RegistryStore`] over the live Windows registry
    #[derive(Debug, Default)]
    pub struct WinRegistry;

    fn split_hive(key: &str) -> anyhow::Result<(RegKey, &str)> {
        if let Some(path) = key.strip_prefix(r"HKLM:\") {
            Ok((RegKey::predef(HKEY_LOCAL_MACHINE), path))
        } else if let Some(path) = key.strip_prefix(r"HKCU:\") {
            Ok((RegKey::predef(HKEY_CURRENT_USER), path))
        } else {
            bail!("unsupported registry hive in '{key}'")
        }
    }

    fn is_not_found(err: &io::Error) -> bool {
        err.kind() == io::ErrorKind::NotFound
    }

    impl RegistryStore for WinRegistry {
        fn value(&self, key: &str, name: &str) -> anyhow::Result<Option<String>> {
            let (hive, path) = split_hive(key)?;
            let subkey = match hive.open_subkey(path) {
                Ok(subkey) => subkey,
                Err(err) if is_not_found(&err) => return Ok(None),
                Err(err) => return Err(err).with_context(|| format!("failed to open {key}")),
            };

            match subkey.get_value::<String, _>(name) {
                Ok(value) => Ok(Some(value)),
                Err(err) if is_not_found(&err) => Ok(None),
                Err(err) => Err(err).with_context(|| format!(r"failed to read {key}\{name}")),
            }
        }

        fn set_value(&mut self, key: &str, name: &str, value: &str) -> anyhow::Result<ValueChange> {
            let existing = self.value(key, name)?;
            if existing.as_deref() == Some(value) {
                return Ok(ValueChange::Unchanged);
            }

            let (hive, path) = split_hive(key)?;
            let (subkey, _) = hive
                .create_subkey(path)
                .with_context(|| format!("failed to create {key}"))?;
            subkey
                .set_value(name, &value.to_string())
                .with_context(|| format!(r"failed to write {key}\{name}"))?;

            Ok(if existing.is_some() {
                ValueChange::Updated
            } else {
                ValueChange::Added
            })
        }

        fn remove_value(&mut self, key: &str, name: &str) -> anyhow::Result<ValueChange> {
            let (hive, path) = split_hive(key)?;
            let subkey = match hive.open_subkey_with_flags(path, KEY_ALL_ACCESS) {
                Ok(subkey) => subkey,
                Err(err) if is_not_found(&err) => return Ok(ValueChange::Unchanged),
                Err(err) => return Err(err).with_context(|| format!("failed to open {key}")),
            };

            match subkey.delete_value(name) {
                Ok(()) => Ok(ValueChange::Removed),
                Err(err) if is_not_found(&err) => Ok(ValueChange::Unchanged),
                Err(err) => Err(err).with_context(|| format!(r"failed to remove {key}\{name}")),
            }
        }

        fn remove_key(&mut self, key: &str) -> anyhow::Result<ValueChange> {
            let (hive, path) = split_hive(key)?;
            match hive.delete_subkey_all(path) {
                Ok(()) => Ok(ValueChange::Removed),
                Err(err) if is_not_found(&err) => Ok(ValueChange::Unchanged),
                Err(err) => Err(err).with_context(|| format!("failed to remove {key}")),
            }
        }
    }
}

#[cfg(windows)]
pub use win::WinRegistry;
