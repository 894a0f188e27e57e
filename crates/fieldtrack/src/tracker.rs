//! Combined field-name mapping and status tracking
//!
//! One tracker instance belongs to one resource instance. It is not designed
//! for concurrent mutation; reconciliation of a resource is a single-threaded
//! pipeline.

use crate::status::FieldStatus;
use std::collections::HashMap;
use thiserror::Error;

/// Errors from status mutations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    /// A status mutator was invoked on a field that was never registered.
    /// This is an integration error: the reconciliation loop must only ever
    /// patch fields the resource type declared.
    #[error("field '{0}' not found in tracker")]
    FieldNotFound(String),
}

/// Key-to-name mapping plus insertion-ordered per-field statuses.
///
/// The double mapping exists because the desired-state document vocabulary
/// (`blank_screen`) differs from the external config store's vocabulary
/// (`BlankScreen`). Statuses are stored in registration order, so
/// [`with_new_values`](Self::with_new_values) and the derived patch output
/// are deterministic.
#[derive(Debug, Clone, Default)]
pub struct FieldTracker {
    names: HashMap<String, String>,
    statuses: Vec<FieldStatus>,
}

impl FieldTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a field: map its document key to the canonical name and
    /// create an untouched status for it
    pub fn register(&mut self, key: &str, name: &str) {
        self.set_field_name(key, name);
        self.set_field_status(FieldStatus::new(name));
    }

    /// Record the document key for a canonical field name
    pub fn set_field_name(&mut self, key: &str, name: &str) {
        self.names.insert(key.to_string(), name.to_string());
    }

    /// Canonical field name for a document key. `None` for unknown keys,
    /// which are legal and ignored by callers.
    pub fn field_name(&self, key: &str) -> Option<&str> {
        self.names.get(key).map(String::as_str)
    }

    /// Insert or replace the status for `status.name`. A replacement keeps
    /// the field's original position in the iteration order.
    pub fn set_field_status(&mut self, status: FieldStatus) {
        match self.position(&status.name) {
            Some(idx) => self.statuses[idx] = status,
            None => self.statuses.push(status),
        }
    }

    /// Status for a canonical field name
    pub fn field_status(&self, name: &str) -> Option<&FieldStatus> {
        self.statuses.iter().find(|status| status.name == name)
    }

    /// Whether the user supplied a value for the field
    pub fn has_new_value(&self, name: &str) -> bool {
        self.field_status(name).is_some_and(|s| s.has_new_value)
    }

    /// Whether the user asked for the field to be removed
    pub fn should_clear(&self, name: &str) -> bool {
        self.field_status(name).is_some_and(|s| s.clear)
    }

    /// Mark that the user supplied a value for the field
    pub fn set_has_new_value(&mut self, name: &str) -> Result<(), TrackerError> {
        let status = self.status_mut(name)?;
        status.has_new_value = true;
        Ok(())
    }

    /// Mark the field as an explicit removal request. A removal also counts
    /// as having a new value.
    pub fn set_clear(&mut self, name: &str) -> Result<(), TrackerError> {
        let status = self.status_mut(name)?;
        status.has_new_value = true;
        status.clear = true;
        Ok(())
    }

    /// Mark that reconciliation has applied the field's change
    pub fn set_change_applied(&mut self, name: &str) -> Result<(), TrackerError> {
        let status = self.status_mut(name)?;
        status.change_applied = true;
        Ok(())
    }

    /// Invoke `f` for every field with a pending new value, in registration
    /// order, stopping at the first error
    pub fn with_new_values<E>(
        &self,
        mut f: impl FnMut(&FieldStatus) -> Result<(), E>,
    ) -> Result<(), E> {
        for status in self.statuses.iter().filter(|s| s.has_new_value) {
            f(status)?;
        }
        Ok(())
    }

    /// Snapshot of every field with a pending new value, in registration
    /// order. For callers that need to mutate the tracker while walking.
    pub fn new_values(&self) -> Vec<FieldStatus> {
        self.statuses
            .iter()
            .filter(|s| s.has_new_value)
            .cloned()
            .collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.statuses.iter().position(|status| status.name == name)
    }

    fn status_mut(&mut self, name: &str) -> Result<&mut FieldStatus, TrackerError> {
        let idx = self
            .position(name)
            .ok_or_else(|| TrackerError::FieldNotFound(name.to_string()))?;
        Ok(&mut self.statuses[idx])
    }
}
