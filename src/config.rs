//! Device configuration
//!
//! Paths the bind server owns and the knobs that shape its behaviour.

use bind_shared::{files, limits};
use std::path::{Path, PathBuf};

/// Default directory holding the resident config and credentials
pub const DEFAULT_CONFIG_DIR: &str = "/etc";

/// Location of every file the device provisions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    config_dir: PathBuf,
}

impl Layout {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Resident runtime configuration
    pub fn config_path(&self) -> PathBuf {
        self.path_of(files::CONFIG)
    }

    /// Drone credential key
    pub fn key_path(&self) -> PathBuf {
        self.path_of(files::DRONE_KEY)
    }

    /// Target path of a provisioned file
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.config_dir.join(name)
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_DIR)
    }
}

/// Configuration for the bind server
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Where provisioned files live
    pub layout: Layout,
    /// Config section replaced on BIND
    pub section: String,
    /// External program reporting the software version (program + args).
    /// `None` reports this crate's version.
    pub version_command: Option<Vec<String>>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            layout: Layout::default(),
            section: limits::MERGED_SECTION.into(),
            version_command: None,
        }
    }
}
