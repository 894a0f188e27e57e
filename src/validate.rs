//! Server parameter validation
//!
//! Allowable values follow the published VNC Server parameter reference.
//! Each check reports a short issue string; the resource collects them so a
//! document with several bad values fails with every problem listed at once.

/// Allowable `Encryption` parameter values
pub const ALLOWED_ENCRYPTION_VALUES: &[&str] = &[
    "AlwaysOn",
    "PreferOn",
    "AlwaysMaximum",
    "PreferOff",
    "AlwaysOff",
];

/// Allowable `Authentication` schemes; compound values join schemes with `+`
/// and fallbacks with `,`
pub const ALLOWED_AUTHENTICATION_VALUES: &[&str] = &[
    "VncAuth",
    "SystemAuth",
    "InteractiveSystemAuth",
    "SingleSignOn",
    "Certificate",
    "Radius",
    "None",
];

/// Feature characters accepted in a `Permissions` entry
pub const ALLOWED_PERMISSION_FEATURES: &str = "!-svkpctrhwdqf";

/// Allowable `Log` targets
pub const ALLOWED_LOG_TARGETS: &[&str] = &["stderr", "file", "EventLog", "syslog"];

/// Allowable `Log` levels
pub const ALLOWED_LOG_LEVELS: &[u32] = &[0, 10, 30, 100];

/// Highest valid `CaptureMethod` value
pub const MAX_CAPTURE_METHOD: u32 = 2;

pub(crate) fn validate_encryption(value: &str) -> Result<(), String> {
    if ALLOWED_ENCRYPTION_VALUES.contains(&value) {
        Ok(())
    } else {
        Err("invalid encryption value".to_string())
    }
}

/// An authentication value is a `,`-separated fallback list where each entry
/// joins one or more schemes with `+`, e.g. `SystemAuth+Radius,VncAuth`
pub(crate) fn validate_authentication(value: &str) -> Result<(), String> {
    for part in value.split(',') {
        for scheme in part.split('+') {
            let scheme = scheme.trim();
            if scheme.is_empty() {
                return Err("authentication value cannot be empty".to_string());
            }
            if !ALLOWED_AUTHENTICATION_VALUES.contains(&scheme) {
                return Err("invalid authentication value".to_string());
            }
        }
    }
    Ok(())
}

/// A permissions value is a `,`-separated list of `user:features` pairs where
/// every feature character comes from the allowed set
pub(crate) fn validate_permissions(value: &str) -> Result<(), String> {
    for pair in value.split(',') {
        let mut parts = pair.split(':');
        let (Some(_user), Some(features), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err("invalid permissions value".to_string());
        };

        for feature in features.trim().chars() {
            if !ALLOWED_PERMISSION_FEATURES.contains(feature) {
                return Err("invalid permissions value".to_string());
            }
        }
    }
    Ok(())
}

/// A log value is a `,`-separated list of `area:target:level` triples
pub(crate) fn validate_log(value: &str) -> Result<(), String> {
    for triple in value.split(',') {
        let mut parts = triple.split(':');
        let (Some(area), Some(target), Some(level), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err("invalid log value".to_string());
        };

        if area.trim().is_empty() {
            return Err("invalid log value".to_string());
        }

        if !ALLOWED_LOG_TARGETS.contains(&target.trim()) {
            return Err("invalid log value".to_string());
        }

        let Ok(level) = level.trim().parse::<u32>() else {
            return Err("invalid log value".to_string());
        };
        if !ALLOWED_LOG_LEVELS.contains(&level) {
            return Err("invalid log value".to_string());
        }
    }
    Ok(())
}

pub(crate) fn validate_capture_method(value: u32) -> Result<(), String> {
    if value > MAX_CAPTURE_METHOD {
        return Err("invalid capture method value".to_string());
    }
    Ok(())
}
