//! # Fieldtrack
//!
//! Per-field change-intent tracking for partial desired-state reconciliation.
//!
//! A desired-state document rarely mentions every field a resource supports.
//! This crate records, per field, whether the user actually supplied a value
//! (`has_new_value`), whether that value is an explicit removal request
//! (`clear`), and whether reconciliation has already applied the change
//! (`change_applied`). A reconciliation backend walks the tracker to decide
//! what to touch and leaves everything else alone.
//!
//! ## Core Concepts
//!
//! - [`FieldStatus`]: the change-intent record for one field
//! - [`FieldTracker`]: combined key-to-name mapping and insertion-ordered
//!   status storage, one instance per resource instance
//! - [`FieldSpec`]: a compile-time registry entry pairing a document key and
//!   canonical field name with typed getter/setter function pointers
//!
//! ## Example
//!
//! ```
//! use fieldtrack::{FieldSpec, FieldTracker, parse_bool};
//!
//! struct Settings {
//!     banner: String,
//!     enabled: bool,
//! }
//!
//! const FIELDS: &[FieldSpec<Settings>] = &[
//!     FieldSpec::new(
//!         "banner",
//!         "Banner",
//!         |s| s.banner.clone(),
//!         |s, v| {
//!             s.banner = v.to_string();
//!             Ok(())
//!         },
//!     ),
//!     FieldSpec::new(
//!         "enabled",
//!         "Enabled",
//!         |s| s.enabled.to_string(),
//!         |s, v| {
//!             s.enabled = parse_bool(v)?;
//!             Ok(())
//!         },
//!     ),
//! ];
//!
//! let mut tracker = FieldTracker::new();
//! for field in FIELDS {
//!     tracker.register(field.key, field.name);
//! }
//!
//! tracker.set_has_new_value("Banner").unwrap();
//! assert!(tracker.has_new_value("Banner"));
//! assert!(!tracker.has_new_value("Enabled"));
//! ```

pub mod status;
pub mod tracker;
pub mod value;

pub use status::FieldStatus;
pub use tracker::{FieldTracker, TrackerError};
pub use value::{ValueError, parse_bool, parse_u32};

/// One entry in a resource type's field registry.
///
/// Pairs the document-facing key (e.g. `"blank_screen"`) and the canonical
/// field name used by the external configuration store (e.g. `"BlankScreen"`)
/// with typed accessor function pointers. Built once per resource type as a
/// `const` table, so there is no runtime type inspection anywhere: a field
/// that cannot round-trip through a string cannot appear in the table.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec<R> {
    /// Document key, the vocabulary of the desired-state document
    pub key: &'static str,
    /// Canonical field name, the vocabulary of the external config store
    pub name: &'static str,
    /// Serialize the field's current value to its string form
    pub get: fn(&R) -> String,
    /// Parse a document value into the field
    pub set: fn(&mut R, &str) -> Result<(), ValueError>,
}

impl<R> FieldSpec<R> {
    pub const fn new(
        key: &'static str,
        name: &'static str,
        get: fn(&R) -> String,
        set: fn(&mut R, &str) -> Result<(), ValueError>,
    ) -> Self {
        Self {
            key,
            name,
            get,
            set,
        }
    }

    /// Current value of the field on `resource`, in string form
    pub fn current_value(&self, resource: &R) -> String {
        (self.get)(resource)
    }
}

/// Find a registry entry by document key
pub fn spec_for_key<'a, R>(specs: &'a [FieldSpec<R>], key: &str) -> Option<&'a FieldSpec<R>> {
    specs.iter().find(|spec| spec.key == key)
}

/// Find a registry entry by canonical field name
pub fn spec_for_name<'a, R>(specs: &'a [FieldSpec<R>], name: &str) -> Option<&'a FieldSpec<R>> {
    specs.iter().find(|spec| spec.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sample {
        label: String,
        limit: u32,
    }

    const FIELDS: &[FieldSpec<Sample>] = &[
        FieldSpec::new(
            "label",
            "Label",
            |s| s.label.clone(),
            |s, v| {
                s.label = v.to_string();
                Ok(())
            },
        ),
        FieldSpec::new(
            "limit",
            "Limit",
            |s| s.limit.to_string(),
            |s, v| {
                s.limit = parse_u32(v)?;
                Ok(())
            },
        ),
    ];

    #[test]
    fn test_spec_lookup_by_key_and_name() {
        assert_eq!(spec_for_key(FIELDS, "limit").unwrap().name, "Limit");
        assert_eq!(spec_for_name(FIELDS, "Label").unwrap().key, "label");
        assert!(spec_for_key(FIELDS, "Label").is_none());
        assert!(spec_for_name(FIELDS, "nope").is_none());
    }

    #[test]
    fn test_spec_accessors_round_trip() {
        let mut sample = Sample {
            label: String::new(),
            limit: 0,
        };

        let spec = spec_for_key(FIELDS, "limit").unwrap();
        (spec.set)(&mut sample, "3600").unwrap();
        assert_eq!(sample.limit, 3600);
        assert_eq!(spec.current_value(&sample), "3600");

        assert!((spec.set)(&mut sample, "not a number").is_err());
    }
}
