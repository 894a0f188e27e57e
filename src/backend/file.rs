//! Line-oriented config file backend
//!
//! Streams the existing config file line by line into a staged temp file,
//! rewriting only the lines whose fields carry a pending change, passing
//! everything else through byte-for-byte, and appending genuinely new
//! entries at the end. The staged file is committed with an atomic
//! rename-over, so the target config is never absent or half-written, and
//! the original is preserved as `<path>.<extension>` unless backups are
//! skipped.

use crate::backend::{Backend, ChangeCounts};
use crate::config::{DEFAULT_BACKUP_EXTENSION, ServerConfig};
use crate::error::{ConfigError, PatchError};
use crate::values::{ConfigLine, ConfigValue, parse_config_line};
use anyhow::Context;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Mode bits for a config file created from scratch
pub const DEFAULT_CONFIG_FILE_MODE: u32 = 0o644;

/// Reconciles a resource against a `Name=Value`-per-line config file.
///
/// A missing file is not an error: reconciliation starts from an empty
/// baseline and the addition pass creates the file.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
    backup_extension: String,
    skip_backup: bool,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup_extension: DEFAULT_BACKUP_EXTENSION.to_string(),
            skip_backup: false,
        }
    }

    /// Build a backend from the resource's task settings. Fails when no
    /// config file path has been supplied or resolved.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        let path = config
            .config_file
            .clone()
            .ok_or(ConfigError::MissingConfigFile)?;

        let mut backend = Self::new(path);
        if !config.backup_extension.is_empty() {
            backend.backup_extension = config.backup_extension.clone();
        }
        backend.skip_backup = config.skip_backup;
        Ok(backend)
    }

    /// Where the pre-change file is preserved: `<path>.<extension>`
    pub fn backup_path(&self) -> PathBuf {
        let mut raw = self.path.clone().into_os_string();
        raw.push(".");
        raw.push(&self.backup_extension);
        PathBuf::from(raw)
    }

    /// Install the staged output: copy the original aside if wanted, rename
    /// the staged file over the target, then fix up permissions.
    ///
    /// The backup is a copy and the install is an atomic rename, so the
    /// target path always holds either the old or the new content - there
    /// is no window where it is absent.
    fn commit(&self, staged: NamedTempFile) -> anyhow::Result<()> {
        let existing = match fs::metadata(&self.path) {
            Ok(meta) => Some(meta),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to stat {}", self.path.display()));
            }
        };

        if existing.is_some() && !self.skip_backup {
            let backup = self.backup_path();
            fs::copy(&self.path, &backup).with_context(|| {
                format!("failed to write backup config file {}", backup.display())
            })?;
            log::debug!("wrote backup config file at {}", backup.display());
        }

        staged
            .persist(&self.path)
            .with_context(|| format!("failed to install config file {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = existing
                .as_ref()
                .map_or(DEFAULT_CONFIG_FILE_MODE, |meta| {
                    meta.permissions().mode() & 0o777
                });
            fs::set_permissions(&self.path, fs::Permissions::from_mode(mode)).with_context(
                || format!("failed to set permissions on {}", self.path.display()),
            )?;
        }

        log::debug!("wrote config file at {}", self.path.display());
        Ok(())
    }
}

impl Backend for FileBackend {
    fn apply(&mut self, config: &mut ServerConfig) -> anyhow::Result<ChangeCounts> {
        log::debug!("reading config values from {}", self.path.display());
        let source = match File::open(&self.path) {
            Ok(file) => Some(BufReader::new(file)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to open config file {}", self.path.display()));
            }
        };

        let dir = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut staged = NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to stage config file in {}", dir.display()))?;

        let mut counts = ChangeCounts::default();
        {
            let mut out = BufWriter::new(staged.as_file_mut());

            if let Some(reader) = source {
                counts.updated = update_existing_values(config, reader, &mut out)?;
            }
            counts.added = add_new_values(config, &mut out)?;

            out.flush().context("failed to flush staged config file")?;
        }

        // nothing changed: drop the staged file and leave the target alone
        if counts.has_changes() {
            self.commit(staged)?;
        }

        Ok(counts)
    }
}

/// Update pass: stream every existing line, rewriting or omitting only the
/// lines whose field the tracker marks as supplied. Returns the number of
/// entries whose value actually changed or was removed.
fn update_existing_values<R: BufRead, W: Write>(
    config: &mut ServerConfig,
    reader: R,
    out: &mut W,
) -> anyhow::Result<usize> {
    log::debug!("checking for config values to update");
    let mut updated = 0;

    for (idx, line) in reader.lines().enumerate() {
        let line_num = idx + 1;
        let line =
            line.with_context(|| format!("failed to read config file line {line_num}"))?;

        let parsed = parse_config_line(&line)
            .map_err(|_| PatchError::MalformedLine { line: line_num })?;

        let ConfigLine::Pair(existing) = parsed else {
            write_line(out, &line, line_num)?;
            continue;
        };

        let Some(status) = config.tracker().field_status(&existing.name).cloned() else {
            // not a field this resource declares: pass through untouched
            write_line(out, &line, line_num)?;
            continue;
        };

        if !status.has_new_value {
            write_line(out, &line, line_num)?;
            continue;
        }

        if status.clear {
            // omitting the line deletes the entry
            updated += 1;
            log::debug!("removed {}", existing.name);
        } else {
            let value = config
                .field_value(&existing.name)
                .ok_or_else(|| ConfigError::UnknownField(existing.name.clone()))?;
            let replacement = ConfigValue::new(&existing.name, &value);
            write_line(out, &replacement.to_line(), line_num)?;

            if value != existing.value {
                updated += 1;
                log::debug!("updated {} with {}", replacement.name, replacement.value);
            }
        }

        config
            .tracker_mut()
            .set_change_applied(&existing.name)
            .with_context(|| format!("failed to update change status for {}", existing.name))?;
    }

    Ok(updated)
}

/// Addition pass: append one line per supplied field the update pass never
/// encountered. Removal requests have nothing to append.
fn add_new_values<W: Write>(config: &ServerConfig, out: &mut W) -> anyhow::Result<usize> {
    log::debug!("checking for new config values");
    let mut added = 0;

    config.tracker().with_new_values(|status| -> anyhow::Result<()> {
        if !status.is_pending_addition() {
            return Ok(());
        }

        let value = config
            .field_value(&status.name)
            .ok_or_else(|| ConfigError::UnknownField(status.name.clone()))?;
        let entry = ConfigValue::new(&status.name, &value);
        writeln!(out, "{}", entry.to_line())
            .with_context(|| format!("failed to append config value {}", entry.name))?;
        log::debug!("added {} with {}", entry.name, entry.value);

        added += 1;
        Ok(())
    })?;

    Ok(added)
}

fn write_line<W: Write>(out: &mut W, line: &str, line_num: usize) -> anyhow::Result<()> {
    writeln!(out, "{line}")
        .with_context(|| format!("failed to write config file line {line_num}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ORIG_CONFIG: &str = "\
# RealVNC Server settings
Encryption=BadValue
Authentication=SystemAuth

IdleTimeout=3600
";

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("vncserver-x11");
        fs::write(&path, contents).unwrap();
        path
    }

    fn config_for(path: &Path) -> ServerConfig {
        let mut config = ServerConfig::new();
        config.config_file = Some(path.to_path_buf());
        config
    }

    #[test]
    fn test_updates_existing_value_and_writes_backup() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, ORIG_CONFIG);

        let mut config = config_for(&path);
        config.set_document_value("encryption", "AlwaysOn").unwrap();

        let mut backend = FileBackend::from_config(&config).unwrap();
        let counts = backend.apply(&mut config).unwrap();

        assert_eq!(counts, ChangeCounts { added: 0, updated: 1 });

        let patched = fs::read_to_string(&path).unwrap();
        assert!(patched.contains("Encryption=AlwaysOn"));
        assert!(!patched.contains("BadValue"));

        let backup = fs::read_to_string(backend.backup_path()).unwrap();
        assert_eq!(backup, ORIG_CONFIG);

        let status = config.tracker().field_status("Encryption").unwrap();
        assert!(status.change_applied);
    }

    #[test]
    fn test_preserves_untouched_lines_byte_for_byte() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, ORIG_CONFIG);

        let mut config = config_for(&path);
        config.set_document_value("encryption", "AlwaysOn").unwrap();

        let mut backend = FileBackend::from_config(&config).unwrap();
        backend.apply(&mut config).unwrap();

        let patched = fs::read_to_string(&path).unwrap();
        let expected = ORIG_CONFIG.replace("Encryption=BadValue", "Encryption=AlwaysOn");
        assert_eq!(patched, expected);
    }

    #[test]
    fn test_adds_new_value_with_backups_skipped() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, ORIG_CONFIG);

        let mut config = config_for(&path);
        config.skip_backup = true;
        config.set_document_value("blank_screen", "true").unwrap();

        let mut backend = FileBackend::from_config(&config).unwrap();
        let counts = backend.apply(&mut config).unwrap();

        assert_eq!(counts, ChangeCounts { added: 1, updated: 0 });

        let patched = fs::read_to_string(&path).unwrap();
        assert!(patched.ends_with("BlankScreen=true\n"));
        assert!(!backend.backup_path().exists());
    }

    #[test]
    fn test_missing_config_file_starts_from_empty_baseline() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("vncserver-x11");

        let mut config = config_for(&path);
        config.set_document_value("idle_timeout", "3600").unwrap();

        let mut backend = FileBackend::from_config(&config).unwrap();
        let counts = backend.apply(&mut config).unwrap();

        assert_eq!(counts, ChangeCounts { added: 1, updated: 0 });
        assert_eq!(fs::read_to_string(&path).unwrap(), "IdleTimeout=3600\n");
        assert!(!backend.backup_path().exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, DEFAULT_CONFIG_FILE_MODE);
        }
    }

    #[test]
    fn test_clear_removes_the_entry() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, ORIG_CONFIG);

        let mut config = config_for(&path);
        config
            .set_document_value("encryption", crate::config::UNSET_VALUE)
            .unwrap();

        let mut backend = FileBackend::from_config(&config).unwrap();
        let counts = backend.apply(&mut config).unwrap();

        assert_eq!(counts, ChangeCounts { added: 0, updated: 1 });

        let patched = fs::read_to_string(&path).unwrap();
        assert!(!patched.contains("Encryption"));
        // a removal is never re-added by the addition pass
        assert!(patched.contains("Authentication=SystemAuth"));
    }

    #[test]
    fn test_unchanged_value_touches_nothing() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, ORIG_CONFIG);

        let mut config = config_for(&path);
        config.set_document_value("idle_timeout", "3600").unwrap();

        let mut backend = FileBackend::from_config(&config).unwrap();
        let counts = backend.apply(&mut config).unwrap();

        assert_eq!(counts, ChangeCounts::default());
        assert_eq!(fs::read_to_string(&path).unwrap(), ORIG_CONFIG);
        assert!(!backend.backup_path().exists());
    }

    #[test]
    fn test_second_run_of_same_desired_state_changes_nothing() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, ORIG_CONFIG);

        let desired = |path: &Path| {
            let mut config = config_for(path);
            config.set_document_value("encryption", "AlwaysOn").unwrap();
            config.set_document_value("blank_screen", "true").unwrap();
            config
        };

        let mut config = desired(&path);
        let mut backend = FileBackend::from_config(&config).unwrap();
        let first = backend.apply(&mut config).unwrap();
        assert_eq!(first, ChangeCounts { added: 1, updated: 1 });

        fs::remove_file(backend.backup_path()).unwrap();

        let mut config = desired(&path);
        let second = backend.apply(&mut config).unwrap();
        assert_eq!(second, ChangeCounts::default());
        // no commit on the second run, so no fresh backup either
        assert!(!backend.backup_path().exists());
    }

    #[test]
    fn test_custom_backup_extension() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, ORIG_CONFIG);

        let mut config = config_for(&path);
        config.backup_extension = "orig".to_string();
        config.set_document_value("encryption", "AlwaysOn").unwrap();

        let mut backend = FileBackend::from_config(&config).unwrap();
        backend.apply(&mut config).unwrap();

        assert!(backend.backup_path().to_string_lossy().ends_with(".orig"));
        assert_eq!(
            fs::read_to_string(backend.backup_path()).unwrap(),
            ORIG_CONFIG
        );
    }

    #[test]
    fn test_malformed_line_aborts_with_line_number() {
        let tmp = TempDir::new().unwrap();
        let contents = "Encryption=BadValue\n=orphan\n";
        let path = write_config(&tmp, contents);

        let mut config = config_for(&path);
        config.set_document_value("encryption", "AlwaysOn").unwrap();

        let mut backend = FileBackend::from_config(&config).unwrap();
        let err = backend.apply(&mut config).unwrap_err();

        assert!(err.to_string().contains("line 2"));
        // the abort leaves the target exactly as it was
        assert_eq!(fs::read_to_string(&path).unwrap(), contents);
        assert!(!backend.backup_path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_carries_over_existing_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, ORIG_CONFIG);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

        let mut config = config_for(&path);
        config.set_document_value("encryption", "AlwaysOn").unwrap();

        let mut backend = FileBackend::from_config(&config).unwrap();
        backend.apply(&mut config).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        // the backup is a plain copy, keeping the original's permissions
        let backup_mode = fs::metadata(backend.backup_path())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(backup_mode, 0o600);
    }

    #[test]
    fn test_from_config_requires_a_path() {
        let config = ServerConfig::new();
        assert!(matches!(
            FileBackend::from_config(&config),
            Err(ConfigError::MissingConfigFile)
        ));
    }

    #[test]
    fn test_additions_follow_tracker_registration_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("vncserver-x11");

        let mut config = config_for(&path);
        // supplied out of registration order
        config.set_document_value("log", "*:file:10").unwrap();
        config.set_document_value("blank_screen", "true").unwrap();

        let mut backend = FileBackend::from_config(&config).unwrap();
        backend.apply(&mut config).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "BlankScreen=true\nLog=*:file:10\n"
        );
    }
}
