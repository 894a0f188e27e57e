//! Target platform selection

use serde::{Deserialize, Serialize};

/// Platforms with distinct reconciliation behavior.
///
/// Linux and macOS share the file-backed store but differ in default config
/// file locations and reload commands; Windows stores the configuration in
/// the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    /// The platform this build targets
    pub const fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Linux
        }
    }

    pub const fn is_windows(self) -> bool {
        matches!(self, Self::Windows)
    }
}
