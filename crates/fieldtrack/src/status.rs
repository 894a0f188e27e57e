//! Change-intent record for a single field

use serde::{Deserialize, Serialize};

/// Per-field record of what reconciliation should do with one field.
///
/// A status is created for every field the resource type declares, and
/// mutated as the desired-state document is ingested and the reconciliation
/// runs. It is a transient execution-time structure, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldStatus {
    /// Canonical field name (the external config store's vocabulary)
    pub name: String,
    /// The user supplied a value for this field, so it should be applied
    pub has_new_value: bool,
    /// Reconciliation has already applied this field's change
    pub change_applied: bool,
    /// The user asked for the field's value to be removed entirely.
    /// Implies `has_new_value`: a removal is itself a new value, the new
    /// value being "absent".
    pub clear: bool,
}

impl FieldStatus {
    /// A freshly registered field: nothing requested, nothing applied
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            has_new_value: false,
            change_applied: false,
            clear: false,
        }
    }

    /// Whether this field still needs to be appended as a new entry:
    /// it has a pending value, the update pass never encountered it, and
    /// it is not a removal
    pub fn is_pending_addition(&self) -> bool {
        self.has_new_value && !self.change_applied && !self.clear
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_status_is_untouched() {
        let status = FieldStatus::new("Encryption");
        assert_eq!(status.name, "Encryption");
        assert!(!status.has_new_value);
        assert!(!status.change_applied);
        assert!(!status.clear);
        assert!(!status.is_pending_addition());
    }

    #[test]
    fn test_pending_addition() {
        let mut status = FieldStatus::new("BlankScreen");
        status.has_new_value = true;
        assert!(status.is_pending_addition());

        status.change_applied = true;
        assert!(!status.is_pending_addition());

        status.change_applied = false;
        status.clear = true;
        assert!(!status.is_pending_addition());
    }
}
