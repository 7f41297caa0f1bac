//! User configuration
//!
//! Optional defaults read from `config.toml` in the platform configuration
//! directory. Command-line arguments and environment variables take precedence
//! over anything found here.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LyDroidError, Result};

/// Android Gradle plugin used when neither the CLI nor the config names one
pub const DEFAULT_ANDROID_GRADLE_PLUGIN: &str = "8.1.0";

/// Platform API level used when neither the CLI nor the config names one
pub const DEFAULT_PLATFORM_SDK_API_LEVEL: u32 = 33;

/// Sub-folder of the build directory for native intermediates
pub const DEFAULT_NATIVE_BUILD_PATH: &str = "o3de";

/// Defaults for `generate`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UserConfig {
    pub android_sdk_root: Option<PathBuf>,
    pub gradle_home: Option<PathBuf>,
    pub cmake_home: Option<PathBuf>,
    pub ninja_home: Option<PathBuf>,
    pub ndk_version: Option<String>,
    pub android_gradle_plugin: String,
    pub platform_sdk_api_level: u32,
    pub native_build_path: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            android_sdk_root: None,
            gradle_home: None,
            cmake_home: None,
            ninja_home: None,
            ndk_version: None,
            android_gradle_plugin: DEFAULT_ANDROID_GRADLE_PLUGIN.to_string(),
            platform_sdk_api_level: DEFAULT_PLATFORM_SDK_API_LEVEL,
            native_build_path: DEFAULT_NATIVE_BUILD_PATH.to_string(),
        }
    }
}

impl UserConfig {
    /// Location of the user config file, if the platform has a config directory
    pub fn config_file() -> Option<PathBuf> {
        ProjectDirs::from("dev", "lydroid", "lydroid").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from the default location; a missing file yields the defaults
    pub fn load() -> Result<Self> {
        match Self::config_file() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from an explicit path; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.is_file() {
            debug!("No user config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        debug!("Loading user config from {:?}", path);
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| {
            LyDroidError::invalid_argument(format!("Invalid configuration file {}: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = UserConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, UserConfig::default());
        assert_eq!(config.android_gradle_plugin, "8.1.0");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "gradle_home = \"/opt/gradle\"\nplatform_sdk_api_level = 31\n").unwrap();

        let config = UserConfig::load_from(&path).unwrap();
        assert_eq!(config.gradle_home, Some(PathBuf::from("/opt/gradle")));
        assert_eq!(config.platform_sdk_api_level, 31);
        assert_eq!(config.native_build_path, "o3de");
    }

    #[test]
    fn test_malformed_file_is_invalid_argument() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "platform_sdk_api_level = \"many\"").unwrap();

        let err = UserConfig::load_from(&path).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument);
    }
}
