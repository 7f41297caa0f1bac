//! Manifest environment
//!
//! [`ManifestEnv`] is the closed record substituted into `AndroidManifest.xml`
//! and the other app-level templates. Every key listed in
//! [`ManifestEnv::KEYS`](TemplateEnv::KEYS) always has a value, possibly empty.

use std::borrow::Cow;
use std::path::Path;

use lydroid_core::{TemplateEnv, TEST_RUNNER_PACKAGE_NAME, TEST_RUNNER_PROJECT};

use crate::multi_window::MultiWindowOptions;
use crate::orientation::Orientation;
use crate::project::{self, scalar_text, AndroidSettings, DensityOverrides, ProjectSettings};
use crate::{xml_escape, ManifestError};

const OCULUS_INTENT_FILTER_CATEGORY: &str = "<category android:name=\"com.oculus.intent.category.VR\" />";

/// Values that come from the command line rather than the project files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestOptions {
    pub target_sdk_version: u32,
    pub min_sdk_version: u32,
    pub oculus_project: bool,
}

/// Substitution record for the app templates
#[derive(Debug, Clone)]
pub struct ManifestEnv {
    pub package_name: String,
    pub version_number: String,
    pub version_name: String,
    pub screen_orientation: String,
    pub app_name: String,
    pub project_name: String,
    pub project_activity: String,
    pub launcher_name: String,
    pub app_public_key: String,
    pub app_obfuscator_salt: String,
    pub use_main_obb: String,
    pub use_patch_obb: String,
    pub enable_keep_screen_on: String,
    pub disable_immersive_mode: String,
    pub min_sdk_version: u32,
    pub target_sdk_version: u32,
    pub orientation: Orientation,
    pub multi_window: MultiWindowOptions,
    pub oculus_intent_filter_category: String,
    pub icons: Option<DensityOverrides>,
    pub splash_screen: Option<indexmap::IndexMap<String, DensityOverrides>>,
}

impl ManifestEnv {
    /// Build the environment for a game project
    pub fn new(
        project_path: &Path,
        project: &ProjectSettings,
        android: &AndroidSettings,
        options: ManifestOptions,
    ) -> Result<Self, ManifestError> {
        let project_name = project
            .project_name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ManifestError::MissingKey {
                path: project_path.to_path_buf(),
                key: "project_name",
            })?;
        let product_name = project.product_name.clone().unwrap_or_else(|| project_name.clone());
        Self::build(
            project_path,
            project_name.clone(),
            product_name,
            format!("{}Activity", project_name),
            format!("{}.GameLauncher", project_name),
            android,
            options,
        )
    }

    /// Read the project files under `project_path` and build the environment
    pub fn load(project_path: &Path, options: ManifestOptions) -> Result<Self, ManifestError> {
        let (project, android) = project::load_project(project_path)?;
        Self::new(project_path, &project, &android, options)
    }

    /// Environment for the unit-test runner application. Uses the engine's runner
    /// settings when present, otherwise a landscape runner with no overrides.
    pub fn unit_test(engine_root: &Path, options: ManifestOptions) -> Result<Self, ManifestError> {
        let android = project::load_test_runner(engine_root)?.unwrap_or_else(|| AndroidSettings {
            package_name: Some(TEST_RUNNER_PACKAGE_NAME.to_string()),
            version_name: Some("1.0.0.0".to_string()),
            orientation: Some("landscape".to_string()),
            ..Default::default()
        });
        Self::build(
            engine_root,
            TEST_RUNNER_PROJECT.to_string(),
            TEST_RUNNER_PROJECT.to_string(),
            format!("{}Activity", TEST_RUNNER_PROJECT),
            TEST_RUNNER_PROJECT.to_string(),
            &android,
            options,
        )
    }

    fn build(
        project_path: &Path,
        project_name: String,
        app_name: String,
        project_activity: String,
        launcher_name: String,
        android: &AndroidSettings,
        options: ManifestOptions,
    ) -> Result<Self, ManifestError> {
        let package_name = android
            .package_name
            .clone()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ManifestError::MissingKey {
                path: project_path.to_path_buf(),
                key: "package_name",
            })?;

        let screen_orientation = android.orientation.clone().unwrap_or_else(|| "landscape".to_string());

        Ok(Self {
            package_name,
            version_number: scalar_text(android.version_number.as_ref(), "1"),
            version_name: android.version_name.clone().unwrap_or_else(|| "1.0.0.0".to_string()),
            orientation: Orientation::from_screen_orientation(&screen_orientation),
            screen_orientation,
            app_name,
            project_name,
            project_activity,
            launcher_name,
            app_public_key: android.app_public_key.clone().unwrap_or_else(|| "NoKey".to_string()),
            app_obfuscator_salt: android.app_obfuscator_salt.clone().unwrap_or_default(),
            use_main_obb: scalar_text(android.use_main_obb.as_ref(), "false"),
            use_patch_obb: scalar_text(android.use_patch_obb.as_ref(), "false"),
            enable_keep_screen_on: scalar_text(android.enable_keep_screen_on.as_ref(), "false"),
            disable_immersive_mode: scalar_text(android.disable_immersive_mode.as_ref(), "false"),
            min_sdk_version: options.min_sdk_version,
            target_sdk_version: options.target_sdk_version,
            multi_window: MultiWindowOptions::from_settings(android.multi_window_options.as_ref()),
            oculus_intent_filter_category: if options.oculus_project {
                OCULUS_INTENT_FILTER_CATEGORY.to_string()
            } else {
                String::new()
            },
            icons: android.icons.clone().filter(|i| !i.is_empty()),
            splash_screen: android.splash_screen.clone().filter(|s| !s.is_empty()),
        })
    }

    /// Package path with `/` separators, e.g. `org/o3de/game`
    pub fn package_path(&self) -> String {
        self.package_name.replace('.', "/")
    }
}

impl TemplateEnv for ManifestEnv {
    const KEYS: &'static [&'static str] = &[
        "ANDROID_PACKAGE",
        "ANDROID_PACKAGE_PATH",
        "ANDROID_VERSION_NUMBER",
        "ANDROID_VERSION_NAME",
        "ANDROID_SCREEN_ORIENTATION",
        "ORIENTATION",
        "ANDROID_APP_NAME",
        "ANDROID_PROJECT_NAME",
        "ANDROID_PROJECT_ACTIVITY",
        "ANDROID_LAUNCHER_NAME",
        "ANDROID_CONFIG_CHANGES",
        "ANDROID_APP_PUBLIC_KEY",
        "ANDROID_APP_OBFUSCATOR_SALT",
        "ANDROID_USE_MAIN_OBB",
        "ANDROID_USE_PATCH_OBB",
        "ANDROID_ENABLE_KEEP_SCREEN_ON",
        "ANDROID_DISABLE_IMMERSIVE_MODE",
        "ANDROID_MIN_SDK_VERSION",
        "ANDROID_TARGET_SDK_VERSION",
        "ANDROID_MULTI_WINDOW",
        "ANDROID_MULTI_WINDOW_PROPERTIES",
        "SAMSUNG_DEX_KEEP_ALIVE",
        "SAMSUNG_DEX_LAUNCH_WIDTH",
        "SAMSUNG_DEX_LAUNCH_HEIGHT",
        "OCULUS_INTENT_FILTER_CATEGORY",
    ];

    fn value(&self, key: &str) -> Option<Cow<'_, str>> {
        let value = match key {
            "ANDROID_PACKAGE" => Cow::Borrowed(self.package_name.as_str()),
            "ANDROID_PACKAGE_PATH" => Cow::Owned(self.package_path()),
            "ANDROID_VERSION_NUMBER" => xml_escape(&self.version_number),
            "ANDROID_VERSION_NAME" => xml_escape(&self.version_name),
            "ANDROID_SCREEN_ORIENTATION" => xml_escape(&self.screen_orientation),
            "ORIENTATION" => Cow::Borrowed(self.orientation.as_str()),
            "ANDROID_APP_NAME" => xml_escape(&self.app_name),
            "ANDROID_PROJECT_NAME" => xml_escape(&self.project_name),
            "ANDROID_PROJECT_ACTIVITY" => xml_escape(&self.project_activity),
            "ANDROID_LAUNCHER_NAME" => xml_escape(&self.launcher_name),
            "ANDROID_CONFIG_CHANGES" => Cow::Borrowed(self.multi_window.config_changes.as_str()),
            "ANDROID_APP_PUBLIC_KEY" => xml_escape(&self.app_public_key),
            "ANDROID_APP_OBFUSCATOR_SALT" => xml_escape(&self.app_obfuscator_salt),
            "ANDROID_USE_MAIN_OBB" => xml_escape(&self.use_main_obb),
            "ANDROID_USE_PATCH_OBB" => xml_escape(&self.use_patch_obb),
            "ANDROID_ENABLE_KEEP_SCREEN_ON" => xml_escape(&self.enable_keep_screen_on),
            "ANDROID_DISABLE_IMMERSIVE_MODE" => xml_escape(&self.disable_immersive_mode),
            "ANDROID_MIN_SDK_VERSION" => Cow::Owned(self.min_sdk_version.to_string()),
            "ANDROID_TARGET_SDK_VERSION" => Cow::Owned(self.target_sdk_version.to_string()),
            "ANDROID_MULTI_WINDOW" => Cow::Borrowed(self.multi_window.multi_window.as_str()),
            "ANDROID_MULTI_WINDOW_PROPERTIES" => Cow::Borrowed(self.multi_window.multi_window_properties.as_str()),
            "SAMSUNG_DEX_KEEP_ALIVE" => Cow::Borrowed(self.multi_window.samsung_dex_keep_alive.as_str()),
            "SAMSUNG_DEX_LAUNCH_WIDTH" => Cow::Borrowed(self.multi_window.samsung_dex_launch_width.as_str()),
            "SAMSUNG_DEX_LAUNCH_HEIGHT" => Cow::Borrowed(self.multi_window.samsung_dex_launch_height.as_str()),
            "OCULUS_INTENT_FILTER_CATEGORY" => Cow::Borrowed(self.oculus_intent_filter_category.as_str()),
            _ => return None,
        };
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lydroid_core::Template;

    use crate::parser::ManifestSummary;
    use crate::ANDROID_MANIFEST_TEMPLATE;

    const OPTIONS: ManifestOptions = ManifestOptions {
        target_sdk_version: 33,
        min_sdk_version: 24,
        oculus_project: false,
    };

    fn game_project(android: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("project.json"),
            r#"{"project_name": "Jack", "product_name": "Jack & Friends"}"#,
        )
        .unwrap();
        let android_json = project::android_project_json(dir.path());
        std::fs::create_dir_all(android_json.parent().unwrap()).unwrap();
        std::fs::write(android_json, format!(r#"{{"android_settings": {}}}"#, android)).unwrap();
        dir
    }

    #[test]
    fn test_every_key_has_a_value() {
        let dir = game_project(r#"{"package_name": "org.o3de.jack"}"#);
        let env = ManifestEnv::load(dir.path(), OPTIONS).unwrap();
        for key in ManifestEnv::KEYS {
            assert!(env.value(key).is_some(), "no value for {key}");
        }
        assert!(env.value("ICONS").is_none());
    }

    #[test]
    fn test_missing_package_name() {
        let dir = game_project(r#"{"version_name": "1.0"}"#);
        let err = ManifestEnv::load(dir.path(), OPTIONS).unwrap_err();
        assert!(err.to_string().contains("package_name"));
    }

    #[test]
    fn test_names_and_escaping() {
        let dir = game_project(r#"{"package_name": "org.o3de.jack", "orientation": "sensorPortrait"}"#);
        let env = ManifestEnv::load(dir.path(), OPTIONS).unwrap();
        assert_eq!(env.project_activity, "JackActivity");
        assert_eq!(env.launcher_name, "Jack.GameLauncher");
        assert_eq!(env.orientation, Orientation::Portrait);
        assert_eq!(env.value("ANDROID_APP_NAME").unwrap(), "Jack &amp; Friends");
        assert_eq!(env.value("ANDROID_PACKAGE_PATH").unwrap(), "org/o3de/jack");
        assert_eq!(env.value("OCULUS_INTENT_FILTER_CATEGORY").unwrap(), "");
    }

    #[test]
    fn test_unit_test_runner_defaults() {
        let engine = tempfile::tempdir().unwrap();
        let env = ManifestEnv::unit_test(engine.path(), OPTIONS).unwrap();
        assert_eq!(env.package_name, TEST_RUNNER_PACKAGE_NAME);
        assert_eq!(env.project_activity, "AzTestRunnerActivity");
        assert_eq!(env.launcher_name, TEST_RUNNER_PROJECT);
    }

    #[test]
    fn test_manifest_round_trip() {
        let dir = game_project(
            r#"{"package_name": "org.o3de.jack", "version_number": 7, "version_name": "2.1.0",
                "orientation": "landscape", "multi_window_options": {"enabled": true, "min_width": 400}}"#,
        );
        let options = ManifestOptions { oculus_project: true, ..OPTIONS };
        let env = ManifestEnv::load(dir.path(), options).unwrap();

        let template = Template::parse("AndroidManifest.xml", ANDROID_MANIFEST_TEMPLATE).unwrap();
        template.validate::<ManifestEnv>().unwrap();
        let xml = template.render(&env).unwrap();

        let summary = ManifestSummary::parse(&xml).unwrap();
        assert_eq!(summary.package.as_deref(), Some("org.o3de.jack"));
        assert_eq!(summary.version_code.as_deref(), Some("7"));
        assert_eq!(summary.version_name.as_deref(), Some("2.1.0"));
        let launcher = summary.launcher_activity().unwrap();
        assert_eq!(launcher.name, ".JackActivity");
        assert_eq!(launcher.screen_orientation.as_deref(), Some("landscape"));
        assert_eq!(launcher.resizeable.as_deref(), Some("true"));
        assert!(launcher.categories.iter().any(|c| c == "com.oculus.intent.category.VR"));
    }
}
