//! The RealVNC Server configuration resource
//!
//! A `ServerConfig` is built fresh per task from the desired-state document,
//! validated, then handed to a [`Reconciler`](crate::reconcile::Reconciler).
//! Only the fields the document actually touched are ever written to the
//! live configuration; the field tracker records that intent.

use crate::error::{ConfigError, ValidationError};
use crate::platform::Platform;
use crate::validate;
use fieldtrack::{FieldSpec, FieldTracker, parse_bool, parse_u32, spec_for_key, spec_for_name};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Document value that requests removal of a field instead of setting it
pub const UNSET_VALUE: &str = "!UNSET!";

/// Backup extension used when the document does not choose one
pub const DEFAULT_BACKUP_EXTENSION: &str = "bak";

/// Default config file locations for Service server mode
pub const DEFAULT_LINUX_SERVICE_CONFIG_FILE: &str = "/root/.vnc/config.d/vncserver-x11";
pub const DEFAULT_MACOS_SERVICE_CONFIG_FILE: &str = "/var/root/.vnc/config.d/vncserver";

// User and Virtual mode config files live under the user's home directory
const USER_CONFIG_FILE: &str = ".vnc/config.d/vncserver-x11";
const VIRTUAL_CONFIG_FILE: &str = ".vnc/config.d/vncserver-x11-virtual";

/// How the VNC server is run, which decides where its configuration lives
/// (service-wide vs per-user) and how it is reloaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ServerMode {
    #[default]
    Service,
    User,
    Virtual,
}

impl FromStr for ServerMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "service" => Ok(Self::Service),
            "user" => Ok(Self::User),
            "virtual" => Ok(Self::Virtual),
            _ => Err(ConfigError::UnknownServerMode(s.to_string())),
        }
    }
}

impl fmt::Display for ServerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Service => "Service",
            Self::User => "User",
            Self::Virtual => "Virtual",
        };
        write!(f, "{name}")
    }
}

/// Desired state for a VNC server configuration plus the task-level settings
/// steering how it is applied.
///
/// The config parameters (everything in [`ServerConfig::FIELDS`]) only reach
/// the live configuration when the document supplied them; the struct values
/// themselves are just parking space for pending values. The task settings
/// (`config_file`, `server_mode`, backup and reload controls) steer the
/// reconciliation itself and are never written anywhere.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // config parameters
    pub encryption: String,
    pub authentication: String,
    /// Multiple `user:features` pairs delimited by commas
    pub permissions: String,
    pub query_connect: bool,
    pub query_only_if_logged_on: bool,
    /// Seconds
    pub query_connect_timeout: u32,
    pub blank_screen: bool,
    /// Seconds
    pub conn_notify_timeout: u32,
    pub conn_notify_always: bool,
    /// Seconds
    pub idle_timeout: u32,
    pub log: String,
    pub capture_method: u32,

    // task settings
    /// Config file path for file-backed platforms; defaulted by `validate`
    /// from the server mode when absent
    pub config_file: Option<PathBuf>,
    pub server_mode: ServerMode,
    pub reload_exec_path: Option<PathBuf>,
    pub skip_reload: bool,
    pub use_vnclicense_reload: bool,
    pub backup_extension: String,
    pub skip_backup: bool,

    tracker: FieldTracker,
}

impl ServerConfig {
    /// The config parameter registry: document key, config parameter name,
    /// and typed accessors for every field this resource can reconcile
    pub const FIELDS: &'static [FieldSpec<Self>] = &[
        FieldSpec::new(
            "encryption",
            "Encryption",
            |c| c.encryption.clone(),
            |c, v| {
                c.encryption = v.to_string();
                Ok(())
            },
        ),
        FieldSpec::new(
            "authentication",
            "Authentication",
            |c| c.authentication.clone(),
            |c, v| {
                c.authentication = v.to_string();
                Ok(())
            },
        ),
        FieldSpec::new(
            "permissions",
            "Permissions",
            |c| c.permissions.clone(),
            |c, v| {
                c.permissions = v.to_string();
                Ok(())
            },
        ),
        FieldSpec::new(
            "query_connect",
            "QueryConnect",
            |c| c.query_connect.to_string(),
            |c, v| {
                c.query_connect = parse_bool(v)?;
                Ok(())
            },
        ),
        FieldSpec::new(
            "query_only_if_logged_on",
            "QueryOnlyIfLoggedOn",
            |c| c.query_only_if_logged_on.to_string(),
            |c, v| {
                c.query_only_if_logged_on = parse_bool(v)?;
                Ok(())
            },
        ),
        FieldSpec::new(
            "query_connect_timeout",
            "QueryConnectTimeout",
            |c| c.query_connect_timeout.to_string(),
            |c, v| {
                c.query_connect_timeout = parse_u32(v)?;
                Ok(())
            },
        ),
        FieldSpec::new(
            "blank_screen",
            "BlankScreen",
            |c| c.blank_screen.to_string(),
            |c, v| {
                c.blank_screen = parse_bool(v)?;
                Ok(())
            },
        ),
        FieldSpec::new(
            "conn_notify_timeout",
            "ConnNotifyTimeout",
            |c| c.conn_notify_timeout.to_string(),
            |c, v| {
                c.conn_notify_timeout = parse_u32(v)?;
                Ok(())
            },
        ),
        FieldSpec::new(
            "conn_notify_always",
            "ConnNotifyAlways",
            |c| c.conn_notify_always.to_string(),
            |c, v| {
                c.conn_notify_always = parse_bool(v)?;
                Ok(())
            },
        ),
        FieldSpec::new(
            "idle_timeout",
            "IdleTimeout",
            |c| c.idle_timeout.to_string(),
            |c, v| {
                c.idle_timeout = parse_u32(v)?;
                Ok(())
            },
        ),
        FieldSpec::new(
            "log",
            "Log",
            |c| c.log.clone(),
            |c, v| {
                c.log = v.to_string();
                Ok(())
            },
        ),
        FieldSpec::new(
            "capture_method",
            "CaptureMethod",
            |c| c.capture_method.to_string(),
            |c, v| {
                c.capture_method = parse_u32(v)?;
                Ok(())
            },
        ),
    ];

    /// A resource with no pending changes; every config parameter is
    /// registered in the tracker as untouched
    pub fn new() -> Self {
        let mut tracker = FieldTracker::new();
        for field in Self::FIELDS {
            tracker.register(field.key, field.name);
        }

        Self {
            encryption: String::new(),
            authentication: String::new(),
            permissions: String::new(),
            query_connect: false,
            query_only_if_logged_on: false,
            query_connect_timeout: 0,
            blank_screen: false,
            conn_notify_timeout: 0,
            conn_notify_always: false,
            idle_timeout: 0,
            log: String::new(),
            capture_method: 0,
            config_file: None,
            server_mode: ServerMode::default(),
            reload_exec_path: None,
            skip_reload: false,
            use_vnclicense_reload: false,
            backup_extension: String::new(),
            skip_backup: false,
            tracker,
        }
    }

    /// Ingest one `key: value` pair from the parsed desired-state document.
    ///
    /// Task-setting keys configure the reconciliation itself; config
    /// parameter keys store the pending value and mark the field in the
    /// tracker. The [`UNSET_VALUE`] sentinel marks the field for removal
    /// instead. Unknown keys are legal and ignored.
    pub fn set_document_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "config_file" => {
                self.config_file = Some(PathBuf::from(value));
                return Ok(());
            }
            "server_mode" => {
                self.server_mode = value.parse()?;
                return Ok(());
            }
            "reload_exec_path" => {
                self.reload_exec_path = Some(PathBuf::from(value));
                return Ok(());
            }
            "skip_reload" => {
                self.skip_reload = parse_setting_bool(key, value)?;
                return Ok(());
            }
            "use_vnclicense_reload" => {
                self.use_vnclicense_reload = parse_setting_bool(key, value)?;
                return Ok(());
            }
            "backup" => {
                self.backup_extension = value.to_string();
                return Ok(());
            }
            "skip_backup" => {
                self.skip_backup = parse_setting_bool(key, value)?;
                return Ok(());
            }
            _ => {}
        }

        let Some(field) = spec_for_key(Self::FIELDS, key) else {
            log::debug!("ignoring unknown config key '{key}'");
            return Ok(());
        };

        if value == UNSET_VALUE {
            self.tracker.set_clear(field.name)?;
            return Ok(());
        }

        (field.set)(self, value).map_err(|source| ConfigError::InvalidValue {
            field: key.to_string(),
            source,
        })?;
        self.tracker.set_has_new_value(field.name)?;
        Ok(())
    }

    /// Current value of a config parameter by its canonical name, in the
    /// string form the external store uses. `None` when the name is not a
    /// declared config parameter.
    pub fn field_value(&self, name: &str) -> Option<String> {
        spec_for_name(Self::FIELDS, name).map(|field| field.current_value(self))
    }

    /// The change-intent tracker for this resource instance
    pub fn tracker(&self) -> &FieldTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut FieldTracker {
        &mut self.tracker
    }

    /// Normalize and check the resource before reconciliation.
    ///
    /// Applies the server-mode constraints, resolves the default config file
    /// path when none was supplied, validates every config parameter the
    /// document set (removal requests skip value validation), and defaults
    /// the backup extension. Failures are collected and reported in one
    /// error.
    pub fn validate(&mut self, platform: Platform) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.server_mode == ServerMode::Virtual {
            if platform == Platform::Linux {
                self.use_vnclicense_reload = true;
            } else {
                issues.push("server mode cannot be Virtual when not running linux".to_string());
            }
        }

        if !platform.is_windows() && self.config_file.is_none() {
            match self.default_config_file(platform) {
                Ok(path) => self.config_file = Some(path),
                Err(issue) => issues.push(issue),
            }
        }

        if self.wants_validation("Encryption") {
            if let Err(issue) = validate::validate_encryption(&self.encryption) {
                issues.push(issue);
            }
        }

        if self.wants_validation("Authentication") {
            if let Err(issue) = validate::validate_authentication(&self.authentication) {
                issues.push(issue);
            }
        }

        if self.wants_validation("Permissions") {
            if let Err(issue) = validate::validate_permissions(&self.permissions) {
                issues.push(issue);
            }
        }

        if self.wants_validation("Log") {
            if let Err(issue) = validate::validate_log(&self.log) {
                issues.push(issue);
            }
        }

        if self.wants_validation("CaptureMethod") {
            if let Err(issue) = validate::validate_capture_method(self.capture_method) {
                issues.push(issue);
            }
        }

        if self.backup_extension.is_empty() {
            self.backup_extension = DEFAULT_BACKUP_EXTENSION.to_string();
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// A parameter value is validated only when the document supplied one
    /// and it is not a removal request
    fn wants_validation(&self, name: &str) -> bool {
        self.tracker.has_new_value(name) && !self.tracker.should_clear(name)
    }

    fn default_config_file(&self, platform: Platform) -> Result<PathBuf, String> {
        match self.server_mode {
            ServerMode::Service => Ok(if platform == Platform::MacOs {
                PathBuf::from(DEFAULT_MACOS_SERVICE_CONFIG_FILE)
            } else {
                PathBuf::from(DEFAULT_LINUX_SERVICE_CONFIG_FILE)
            }),
            ServerMode::User => Ok(home_dir()?.join(USER_CONFIG_FILE)),
            ServerMode::Virtual => Ok(home_dir()?.join(VIRTUAL_CONFIG_FILE)),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_setting_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).map_err(|source| ConfigError::InvalidValue {
        field: key.to_string(),
        source,
    })
}

fn home_dir() -> Result<PathBuf, String> {
    dirs::home_dir().ok_or_else(|| "could not determine home directory".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registers_every_config_parameter() {
        let config = ServerConfig::new();
        for field in ServerConfig::FIELDS {
            let status = config.tracker().field_status(field.name).unwrap();
            assert!(
                !status.has_new_value,
                "{} should start untouched",
                field.name
            );
        }
        assert_eq!(
            config.tracker().field_name("encryption"),
            Some("Encryption")
        );
    }

    #[test]
    fn test_document_value_sets_field_and_tracker() {
        let mut config = ServerConfig::new();
        config.set_document_value("encryption", "AlwaysOn").unwrap();

        assert_eq!(config.encryption, "AlwaysOn");
        assert!(config.tracker().has_new_value("Encryption"));
        assert!(!config.tracker().should_clear("Encryption"));
        assert!(!config.tracker().has_new_value("BlankScreen"));
    }

    #[test]
    fn test_document_value_parses_typed_fields() {
        let mut config = ServerConfig::new();
        config.set_document_value("blank_screen", "true").unwrap();
        config.set_document_value("idle_timeout", "3600").unwrap();

        assert!(config.blank_screen);
        assert_eq!(config.idle_timeout, 3600);
        assert_eq!(config.field_value("BlankScreen").unwrap(), "true");
        assert_eq!(config.field_value("IdleTimeout").unwrap(), "3600");
    }

    #[test]
    fn test_document_value_rejects_bad_typed_values() {
        let mut config = ServerConfig::new();
        let err = config
            .set_document_value("idle_timeout", "soon")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert!(!config.tracker().has_new_value("IdleTimeout"));
    }

    #[test]
    fn test_unset_sentinel_marks_clear() {
        let mut config = ServerConfig::new();
        config.set_document_value("encryption", UNSET_VALUE).unwrap();

        assert!(config.tracker().has_new_value("Encryption"));
        assert!(config.tracker().should_clear("Encryption"));
        // the sentinel never lands in the field itself
        assert_eq!(config.encryption, "");
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let mut config = ServerConfig::new();
        config
            .set_document_value("no_such_key", "whatever")
            .unwrap();
    }

    #[test]
    fn test_task_setting_keys() {
        let mut config = ServerConfig::new();
        config
            .set_document_value("config_file", "/tmp/vnc.conf")
            .unwrap();
        config.set_document_value("server_mode", "User").unwrap();
        config.set_document_value("skip_reload", "true").unwrap();
        config.set_document_value("skip_backup", "true").unwrap();
        config.set_document_value("backup", "orig").unwrap();

        assert_eq!(
            config.config_file.as_deref(),
            Some("/tmp/vnc.conf".as_ref())
        );
        assert_eq!(config.server_mode, ServerMode::User);
        assert!(config.skip_reload);
        assert!(config.skip_backup);
        assert_eq!(config.backup_extension, "orig");
        // settings are not config parameters and never enter the tracker
        assert!(config.tracker().field_name("config_file").is_none());
    }

    #[test]
    fn test_server_mode_parse_is_case_insensitive() {
        assert_eq!(
            "service".parse::<ServerMode>().unwrap(),
            ServerMode::Service
        );
        assert_eq!("USER".parse::<ServerMode>().unwrap(), ServerMode::User);
        assert_eq!(
            "Virtual".parse::<ServerMode>().unwrap(),
            ServerMode::Virtual
        );
        assert!("cluster".parse::<ServerMode>().is_err());
    }

    #[test]
    fn test_validate_defaults_config_file_for_service_mode() {
        let mut config = ServerConfig::new();
        config.validate(Platform::Linux).unwrap();
        assert_eq!(
            config.config_file.as_deref(),
            Some(DEFAULT_LINUX_SERVICE_CONFIG_FILE.as_ref())
        );

        let mut config = ServerConfig::new();
        config.validate(Platform::MacOs).unwrap();
        assert_eq!(
            config.config_file.as_deref(),
            Some(DEFAULT_MACOS_SERVICE_CONFIG_FILE.as_ref())
        );
    }

    #[test]
    fn test_validate_keeps_supplied_config_file() {
        let mut config = ServerConfig::new();
        config.config_file = Some(PathBuf::from("/etc/vnc/custom.conf"));
        config.validate(Platform::Linux).unwrap();
        assert_eq!(
            config.config_file.as_deref(),
            Some("/etc/vnc/custom.conf".as_ref())
        );
    }

    #[test]
    fn test_validate_defaults_backup_extension() {
        let mut config = ServerConfig::new();
        config.validate(Platform::Linux).unwrap();
        assert_eq!(config.backup_extension, DEFAULT_BACKUP_EXTENSION);

        let mut config = ServerConfig::new();
        config.backup_extension = "orig".to_string();
        config.validate(Platform::Linux).unwrap();
        assert_eq!(config.backup_extension, "orig");
    }

    #[test]
    fn test_validate_rejects_bad_parameter_values() {
        let mut config = ServerConfig::new();
        config.set_document_value("encryption", "BadValue").unwrap();
        config.set_document_value("log", "*:nowhere:10").unwrap();

        let err = config.validate(Platform::Linux).unwrap_err();
        assert_eq!(err.issues.len(), 2);
        assert!(err.to_string().contains("invalid encryption value"));
        assert!(err.to_string().contains("invalid log value"));
    }

    #[test]
    fn test_validate_skips_untouched_and_cleared_parameters() {
        // encryption holds an invalid value but was never supplied
        let mut config = ServerConfig::new();
        config.encryption = "BadValue".to_string();
        config.validate(Platform::Linux).unwrap();

        // a removal request skips value validation entirely
        let mut config = ServerConfig::new();
        config.set_document_value("encryption", UNSET_VALUE).unwrap();
        config.validate(Platform::Linux).unwrap();
    }

    #[test]
    fn test_validate_virtual_mode_requires_linux() {
        let mut config = ServerConfig::new();
        config.server_mode = ServerMode::Virtual;
        assert!(config.validate(Platform::MacOs).is_err());

        let mut config = ServerConfig::new();
        config.server_mode = ServerMode::Virtual;
        config.config_file = Some(PathBuf::from("/tmp/vnc.conf"));
        config.validate(Platform::Linux).unwrap();
        assert!(config.use_vnclicense_reload);
    }
}
