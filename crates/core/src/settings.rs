//! Platform settings
//!
//! `platform.settings` is the INI record `generate` leaves in the build directory.
//! `deploy` and `launch-test` read it back to learn how the project was generated.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use configparser::ini::Ini;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LyDroidError, Result};

/// File name of the settings record inside the build directory
pub const PLATFORM_SETTINGS_FILE: &str = "platform.settings";

const SETTINGS_SECTION: &str = "settings";
const ANDROID_SECTION: &str = "android";

/// How the asset payload is laid out for the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetMode {
    Loose,
    Pak,
    Vfs,
}

impl AssetMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetMode::Loose => "LOOSE",
            AssetMode::Pak => "PAK",
            AssetMode::Vfs => "VFS",
        }
    }
}

impl fmt::Display for AssetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetMode {
    type Err = LyDroidError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOOSE" => Ok(AssetMode::Loose),
            "PAK" => Ok(AssetMode::Pak),
            "VFS" => Ok(AssetMode::Vfs),
            other => Err(LyDroidError::invalid_argument(format!(
                "Invalid asset mode '{}'. Expected one of LOOSE, PAK, VFS",
                other
            ))),
        }
    }
}

/// Native build configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildConfiguration {
    Debug,
    Profile,
    Release,
}

impl BuildConfiguration {
    pub const ALL: [BuildConfiguration; 3] = [
        BuildConfiguration::Debug,
        BuildConfiguration::Profile,
        BuildConfiguration::Release,
    ];

    /// Capitalized name, as used in Gradle task names
    pub fn name(&self) -> &'static str {
        match self {
            BuildConfiguration::Debug => "Debug",
            BuildConfiguration::Profile => "Profile",
            BuildConfiguration::Release => "Release",
        }
    }

    /// Lower-case name, as used in Gradle build types and output paths
    pub fn lower(&self) -> &'static str {
        match self {
            BuildConfiguration::Debug => "debug",
            BuildConfiguration::Profile => "profile",
            BuildConfiguration::Release => "release",
        }
    }
}

impl fmt::Display for BuildConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.lower())
    }
}

impl FromStr for BuildConfiguration {
    type Err = LyDroidError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(BuildConfiguration::Debug),
            "profile" => Ok(BuildConfiguration::Profile),
            "release" => Ok(BuildConfiguration::Release),
            other => Err(LyDroidError::invalid_argument(format!(
                "Invalid build configuration '{}'. Expected one of debug, profile, release",
                other
            ))),
        }
    }
}

/// What `deploy` pushes to a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentType {
    Apk,
    Assets,
    Both,
}

impl DeploymentType {
    pub fn includes_apk(&self) -> bool {
        matches!(self, DeploymentType::Apk | DeploymentType::Both)
    }

    pub fn includes_assets(&self) -> bool {
        matches!(self, DeploymentType::Assets | DeploymentType::Both)
    }
}

impl fmt::Display for DeploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeploymentType::Apk => "APK",
            DeploymentType::Assets => "ASSETS",
            DeploymentType::Both => "BOTH",
        })
    }
}

impl FromStr for DeploymentType {
    type Err = LyDroidError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "APK" => Ok(DeploymentType::Apk),
            "ASSETS" => Ok(DeploymentType::Assets),
            "BOTH" => Ok(DeploymentType::Both),
            other => Err(LyDroidError::invalid_argument(format!(
                "Invalid deployment type '{}'. Expected one of APK, ASSETS, BOTH",
                other
            ))),
        }
    }
}

/// Contents of `platform.settings`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSettings {
    pub platform: String,
    pub game_projects: Vec<PathBuf>,
    /// Absent for unit-test builds
    pub asset_deploy_mode: Option<AssetMode>,
    pub asset_deploy_type: String,
    pub android_sdk_path: PathBuf,
    pub embed_assets_in_apk: bool,
    pub is_unit_test: bool,
    pub android_gradle_plugin: String,
}

impl PlatformSettings {
    /// Render the INI text with a fixed key order
    pub fn render(&self) -> String {
        let projects: Vec<String> = self
            .game_projects
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();

        format!(
            "# Generated by lydroid generate\n\
             [{settings}]\n\
             platform={platform}\n\
             game_projects={projects}\n\
             asset_deploy_mode={mode}\n\
             asset_deploy_type={asset_type}\n\
             \n\
             [{android}]\n\
             android_sdk_path={sdk}\n\
             embed_assets_in_apk={embed}\n\
             is_unit_test={unit_test}\n\
             android_gradle_plugin={agp}\n",
            settings = SETTINGS_SECTION,
            platform = self.platform,
            projects = projects.join(";"),
            mode = self.asset_deploy_mode.map(|m| m.as_str()).unwrap_or(""),
            asset_type = self.asset_deploy_type,
            android = ANDROID_SECTION,
            sdk = self.android_sdk_path.to_string_lossy(),
            embed = ini_bool(self.embed_assets_in_apk),
            unit_test = ini_bool(self.is_unit_test),
            agp = self.android_gradle_plugin,
        )
    }

    /// Parse INI text
    pub fn parse(text: &str) -> Result<Self> {
        // game_projects is a ';' list, so only '#' starts a comment
        let mut defaults = Ini::new().defaults();
        defaults.comment_symbols = vec!['#'];
        let mut ini = Ini::new_from_defaults(defaults);
        ini.read(text.to_string()).map_err(|e| {
            LyDroidError::generic(format!("Unable to parse {}: {}", PLATFORM_SETTINGS_FILE, e))
        })?;

        let required = |section: &str, key: &str| -> Result<String> {
            ini.get(section, key).ok_or_else(|| {
                LyDroidError::generic(format!(
                    "{} is missing '{}' in section [{}]",
                    PLATFORM_SETTINGS_FILE, key, section
                ))
            })
        };
        let boolean = |section: &str, key: &str| -> Result<bool> {
            ini.getbool(section, key)
                .map_err(|e| LyDroidError::generic(format!("Invalid value for '{}': {}", key, e)))
                .map(|v| v.unwrap_or(false))
        };

        let mode = required(SETTINGS_SECTION, "asset_deploy_mode")?;
        let asset_deploy_mode = if mode.trim().is_empty() {
            None
        } else {
            Some(mode.parse()?)
        };

        Ok(Self {
            platform: required(SETTINGS_SECTION, "platform")?,
            game_projects: required(SETTINGS_SECTION, "game_projects")?
                .split(';')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .collect(),
            asset_deploy_mode,
            asset_deploy_type: required(SETTINGS_SECTION, "asset_deploy_type")?,
            android_sdk_path: PathBuf::from(required(ANDROID_SECTION, "android_sdk_path")?),
            embed_assets_in_apk: boolean(ANDROID_SECTION, "embed_assets_in_apk")?,
            is_unit_test: boolean(ANDROID_SECTION, "is_unit_test")?,
            android_gradle_plugin: required(ANDROID_SECTION, "android_gradle_plugin")?,
        })
    }

    /// Load `platform.settings` from a build directory
    pub fn load(build_dir: &Path) -> Result<Self> {
        let path = build_dir.join(PLATFORM_SETTINGS_FILE);
        if !path.is_file() {
            return Err(LyDroidError::file_not_found(format!(
                "Unable to find {}. Was the project generated into {}?",
                path.display(),
                build_dir.display()
            )));
        }
        debug!("Reading {:?}", path);
        let text = std::fs::read_to_string(&path)?;
        Self::parse(&text)
    }

    /// Write into the build directory unless identical content is already there.
    /// Returns whether the file was written.
    pub fn store(&self, build_dir: &Path) -> Result<bool> {
        let path = build_dir.join(PLATFORM_SETTINGS_FILE);
        let rendered = self.render();
        if let Ok(existing) = std::fs::read_to_string(&path) {
            if existing == rendered {
                debug!("{:?} is up to date", path);
                return Ok(false);
            }
        }
        std::fs::write(&path, rendered)?;
        Ok(true)
    }
}

fn ini_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PlatformSettings {
        PlatformSettings {
            platform: "android".into(),
            game_projects: vec![PathBuf::from("/work/MyGame"), PathBuf::from("/work/Other")],
            asset_deploy_mode: Some(AssetMode::Loose),
            asset_deploy_type: "android".into(),
            android_sdk_path: PathBuf::from("/opt/android-sdk"),
            embed_assets_in_apk: false,
            is_unit_test: false,
            android_gradle_plugin: "4.2.2".into(),
        }
    }

    #[test]
    fn test_render_then_parse() {
        let settings = sample();
        let parsed = PlatformSettings::parse(&settings.render()).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_rendered_keys_present() {
        let text = sample().render();
        for key in [
            "[settings]",
            "platform=android",
            "game_projects=/work/MyGame;/work/Other",
            "asset_deploy_mode=LOOSE",
            "asset_deploy_type=android",
            "[android]",
            "android_sdk_path=/opt/android-sdk",
            "embed_assets_in_apk=False",
            "is_unit_test=False",
            "android_gradle_plugin=4.2.2",
        ] {
            assert!(text.contains(key), "missing {key}");
        }
    }

    #[test]
    fn test_unit_test_settings_have_no_asset_mode() {
        let mut settings = sample();
        settings.asset_deploy_mode = None;
        settings.game_projects.clear();
        settings.is_unit_test = true;
        let parsed = PlatformSettings::parse(&settings.render()).unwrap();
        assert_eq!(parsed.asset_deploy_mode, None);
        assert!(parsed.game_projects.is_empty());
        assert!(parsed.is_unit_test);
    }

    #[test]
    fn test_parse_accepts_lowercase_booleans() {
        let text = "[settings]\nplatform=android\ngame_projects=/p\nasset_deploy_mode=pak\n\
                    asset_deploy_type=android\n[android]\nandroid_sdk_path=/sdk\n\
                    embed_assets_in_apk=true\nis_unit_test=false\nandroid_gradle_plugin=8.1.0\n";
        let parsed = PlatformSettings::parse(text).unwrap();
        assert!(parsed.embed_assets_in_apk);
        assert_eq!(parsed.asset_deploy_mode, Some(AssetMode::Pak));
    }

    #[test]
    fn test_missing_key_is_reported() {
        let err = PlatformSettings::parse("[settings]\nplatform=android\n").unwrap_err();
        assert!(err.to_string().contains("game_projects"));
    }

    #[test]
    fn test_store_skips_identical_content() {
        let dir = tempfile::tempdir().unwrap();
        let settings = sample();
        assert!(settings.store(dir.path()).unwrap());
        assert!(!settings.store(dir.path()).unwrap());

        let mut changed = settings.clone();
        changed.android_gradle_plugin = "7.3.1".into();
        assert!(changed.store(dir.path()).unwrap());
        assert_eq!(PlatformSettings::load(dir.path()).unwrap().android_gradle_plugin, "7.3.1");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = PlatformSettings::load(dir.path()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::FileNotFound);
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("Profile".parse::<BuildConfiguration>().unwrap(), BuildConfiguration::Profile);
        assert_eq!("both".parse::<DeploymentType>().unwrap(), DeploymentType::Both);
        assert!("zip".parse::<AssetMode>().is_err());
        assert_eq!(BuildConfiguration::Release.name(), "Release");
    }
}
