//! Config reload triggering
//!
//! A successful reconciliation only takes effect once the server re-reads
//! its configuration. The command line depends on platform and server mode;
//! [`reload_command`] builds it and [`CommandReloader`] runs it. Callers
//! with their own reload mechanism implement [`ConfigReloader`] instead.

use crate::config::{ServerConfig, ServerMode};
use crate::platform::Platform;
use anyhow::{Context, bail};
use std::process::Command;

pub const DEFAULT_MACOS_RELOAD_EXEC: &str = "/Library/vnc/vncserver";
pub const DEFAULT_LINUX_RELOAD_EXEC: &str = "/usr/bin/vncserver-x11";
/// Virtual-mode servers reload through the license tool
pub const DEFAULT_LINUX_LICENSE_RELOAD_EXEC: &str = "/usr/bin/vnclicense";
pub const DEFAULT_WINDOWS_RELOAD_EXEC: &str = r"C:\Program Files\RealVNC\VNC Server\vncserver.exe";

/// Hook invoked after a reconciliation that changed something
pub trait ConfigReloader {
    fn reload(&self, config: &ServerConfig) -> anyhow::Result<()>;
}

/// The reload command line for a resource: program plus argument list.
///
/// `reload_exec_path` overrides the per-platform default executable. Service
/// mode reloads the service-wide server; user mode and license-based reloads
/// drop the `-service` argument. On Windows the server executable is driven
/// through `Start-Process` so no console window flashes up.
pub fn reload_command(config: &ServerConfig, platform: Platform) -> (String, Vec<String>) {
    if platform.is_windows() {
        return windows_reload_command(config);
    }

    let program = match &config.reload_exec_path {
        Some(path) => {
            log::debug!("user specified reload exec path {}", path.display());
            path.to_string_lossy().into_owned()
        }
        None => {
            if platform == Platform::MacOs {
                DEFAULT_MACOS_RELOAD_EXEC.to_string()
            } else if config.use_vnclicense_reload {
                DEFAULT_LINUX_LICENSE_RELOAD_EXEC.to_string()
            } else {
                DEFAULT_LINUX_RELOAD_EXEC.to_string()
            }
        }
    };

    let args = if config.server_mode == ServerMode::User
        || (platform != Platform::MacOs && config.use_vnclicense_reload)
    {
        vec!["-reload".to_string()]
    } else {
        vec!["-service".to_string(), "-reload".to_string()]
    };

    (program, args)
}

fn windows_reload_command(config: &ServerConfig) -> (String, Vec<String>) {
    let exec = match &config.reload_exec_path {
        Some(path) => {
            log::debug!("user specified reload exec path {}", path.display());
            path.to_string_lossy().into_owned()
        }
        None => DEFAULT_WINDOWS_RELOAD_EXEC.to_string(),
    };

    let argument_list = if config.server_mode == ServerMode::User {
        "-reload"
    } else {
        "service -reload"
    };

    let cmd_line = format!(
        "Start-Process -FilePath '{exec}' -WindowStyle Hidden -ArgumentList '{argument_list}'"
    );
    ("powershell".to_string(), vec![cmd_line])
}

/// Default reloader: spawns the platform's reload command and waits for it
#[derive(Debug)]
pub struct CommandReloader {
    platform: Platform,
}

impl CommandReloader {
    pub fn new() -> Self {
        Self {
            platform: Platform::current(),
        }
    }
}

impl Default for CommandReloader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigReloader for CommandReloader {
    fn reload(&self, config: &ServerConfig) -> anyhow::Result<()> {
        let (program, args) = reload_command(config, self.platform);

        let output = Command::new(&program)
            .args(&args)
            .output()
            .with_context(|| format!("failed to run config reload command {program}"))?;

        if !output.status.success() {
            log::debug!(
                "reload stderr = {}",
                String::from_utf8_lossy(&output.stderr)
            );
            bail!(
                "failed reloading vnc server configuration: {program} exited with {}",
                output.status
            );
        }

        log::debug!("config reloaded successfully");
        Ok(())
    }
}
