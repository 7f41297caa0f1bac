//! Project settings
//!
//! `project.json` carries the project and product names. The Android section
//! lives in `Platform/Android/android_project.json` under `android_settings`;
//! older projects keep it in `project.json` itself.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::ManifestError;

pub const PROJECT_JSON: &str = "project.json";

/// `Platform/Android/android_project.json` relative to a project
pub fn android_project_json(project_path: &Path) -> PathBuf {
    project_path.join("Platform").join("Android").join("android_project.json")
}

/// The subset of `project.json` the Android pipeline reads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectSettings {
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub android_settings: Option<AndroidSettings>,
}

/// Per-density overrides, plus an optional `default` entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct DensityOverrides(pub IndexMap<String, String>);

impl DensityOverrides {
    pub fn default_image(&self) -> Option<&str> {
        self.get("default")
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|v| v.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SamsungDexSettings {
    #[serde(default)]
    pub launch_in_fullscreen: bool,
    #[serde(default)]
    pub launch_width: Option<Value>,
    #[serde(default)]
    pub launch_height: Option<Value>,
    #[serde(default)]
    pub keep_alive: Option<Value>,
}

/// `multi_window_options` block. Numeric fields stay untyped so bad values can be
/// reported and dropped instead of failing the whole file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MultiWindowSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub default_width: Option<Value>,
    #[serde(default)]
    pub default_height: Option<Value>,
    #[serde(default)]
    pub min_width: Option<Value>,
    #[serde(default)]
    pub min_height: Option<Value>,
    #[serde(default)]
    pub gravity: Option<String>,
    #[serde(default)]
    pub samsung_dex_options: Option<SamsungDexSettings>,
}

/// `android_settings` block
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AndroidSettings {
    #[serde(default)]
    pub package_name: Option<String>,
    #[serde(default)]
    pub version_number: Option<Value>,
    #[serde(default)]
    pub version_name: Option<String>,
    #[serde(default)]
    pub orientation: Option<String>,
    #[serde(default)]
    pub app_public_key: Option<String>,
    #[serde(default)]
    pub app_obfuscator_salt: Option<String>,
    #[serde(default)]
    pub use_main_obb: Option<Value>,
    #[serde(default)]
    pub use_patch_obb: Option<Value>,
    #[serde(default)]
    pub enable_keep_screen_on: Option<Value>,
    #[serde(default)]
    pub disable_immersive_mode: Option<Value>,
    #[serde(default)]
    pub icons: Option<DensityOverrides>,
    /// Keyed by `land` / `port`
    #[serde(default)]
    pub splash_screen: Option<IndexMap<String, DensityOverrides>>,
    #[serde(default)]
    pub multi_window_options: Option<MultiWindowSettings>,
}

/// Render a JSON scalar the way it should appear in an XML attribute
pub(crate) fn scalar_text(value: Option<&Value>, fallback: &str) -> String {
    match value {
        None | Some(Value::Null) => fallback.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ManifestError> {
    let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ManifestError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Deserialize)]
struct AndroidProjectFile {
    #[serde(default)]
    android_settings: Option<AndroidSettings>,
}

/// Read `project.json` of the project at `project_path`
pub fn read_project_settings(project_path: &Path) -> Result<ProjectSettings, ManifestError> {
    let project_json = project_path.join(PROJECT_JSON);
    if !project_json.is_file() {
        return Err(ManifestError::MissingFile(project_json));
    }
    read_json(&project_json)
}

/// Read `project.json` and the Android settings of the project at `project_path`
pub fn load_project(project_path: &Path) -> Result<(ProjectSettings, AndroidSettings), ManifestError> {
    if !project_path.is_dir() {
        return Err(ManifestError::ProjectNotFound(project_path.to_path_buf()));
    }

    let project_json = project_path.join(PROJECT_JSON);
    let mut project = read_project_settings(project_path)?;

    let android_json = android_project_json(project_path);
    let android = if android_json.is_file() {
        debug!("Reading Android settings from {}", android_json.display());
        read_json::<AndroidProjectFile>(&android_json)?
            .android_settings
            .ok_or_else(|| ManifestError::MissingAndroidSettings(android_json.clone()))?
    } else {
        let legacy = project
            .android_settings
            .take()
            .ok_or_else(|| ManifestError::MissingAndroidSettings(android_json.clone()))?;
        warn!(
            "{} not found, falling back to the 'android_settings' in {}",
            android_json.display(),
            project_json.display()
        );
        legacy
    };

    Ok((project, android))
}

/// Read the Android settings file of the unit-test runner, if the engine has one
pub fn load_test_runner(engine_root: &Path) -> Result<Option<AndroidSettings>, ManifestError> {
    let path = engine_root
        .join("Code")
        .join("Tools")
        .join(lydroid_core::TEST_RUNNER_PROJECT)
        .join("Platform")
        .join("Android")
        .join("android_project.json");
    if !path.is_file() {
        return Ok(None);
    }
    Ok(read_json::<AndroidProjectFile>(&path)?.android_settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, text: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn test_android_project_json_preferred() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("project.json"),
            r#"{"project_name": "Jack", "android_settings": {"package_name": "org.legacy"}}"#,
        );
        write(
            &android_project_json(dir.path()),
            r#"{"android_settings": {"package_name": "org.o3de.jack", "version_number": 3}}"#,
        );

        let (project, android) = load_project(dir.path()).unwrap();
        assert_eq!(project.project_name.as_deref(), Some("Jack"));
        assert_eq!(android.package_name.as_deref(), Some("org.o3de.jack"));
        assert_eq!(scalar_text(android.version_number.as_ref(), "1"), "3");
    }

    #[test]
    fn test_legacy_settings_fallback() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("project.json"),
            r#"{"project_name": "Jack", "android_settings": {"package_name": "org.legacy"}}"#,
        );
        let (_, android) = load_project(dir.path()).unwrap();
        assert_eq!(android.package_name.as_deref(), Some("org.legacy"));
    }

    #[test]
    fn test_missing_android_settings() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("project.json"), r#"{"project_name": "Jack"}"#);
        assert!(matches!(
            load_project(dir.path()),
            Err(ManifestError::MissingAndroidSettings(_))
        ));
    }

    #[test]
    fn test_icon_overrides_ignore_empty_entries() {
        let icons: DensityOverrides = serde_json::from_str(r#"{"default": "", "mdpi": "icons/m.png"}"#).unwrap();
        assert_eq!(icons.default_image(), None);
        assert_eq!(icons.get("mdpi"), Some("icons/m.png"));
        assert!(!icons.is_empty());
    }
}
