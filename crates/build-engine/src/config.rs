//! Generator Configuration
//!
//! Everything `generate` has resolved and verified before the project tree is
//! written.

use std::path::{Path, PathBuf};

use lydroid_core::config::DEFAULT_NATIVE_BUILD_PATH;
use lydroid_core::{AssetMode, PlatformSettings};

use crate::signing::SigningConfig;

/// Android ABI the native build targets
pub const ANDROID_ARCH: &str = "arm64-v8a";

/// Verified host tools
#[derive(Debug, Clone)]
pub struct NativeToolchain {
    /// Gradle executable used to create the wrapper
    pub gradle: PathBuf,
    /// CMake version Gradle is told to use
    pub cmake_version: String,
    /// CMake executable, when it came from an override location
    pub cmake_path: Option<PathBuf>,
    /// Ninja executable, when it came from an override location
    pub ninja_path: Option<PathBuf>,
    /// JDK Gradle runs on, when given through `JAVA_HOME`
    pub java_home: Option<PathBuf>,
}

/// Project generator configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub engine_root: PathBuf,
    pub build_dir: PathBuf,
    pub project_path: PathBuf,
    /// Generate the unit-test runner instead of the game
    pub is_unit_test: bool,

    pub android_sdk_path: PathBuf,
    pub android_ndk_path: PathBuf,
    pub ndk_version: String,
    /// `compileSdk` / `targetSdk` level
    pub platform_sdk_level: u32,
    /// `ANDROID_NATIVE_API_LEVEL`
    pub native_api_level: u32,
    pub min_sdk_level: u32,
    pub build_tools_version: String,
    pub android_gradle_plugin: String,
    pub toolchain: NativeToolchain,
    pub third_party_path: Option<PathBuf>,

    pub include_apk_assets: bool,
    pub asset_mode: AssetMode,
    pub asset_type: String,
    pub signing: Option<SigningConfig>,
    pub overwrite_existing: bool,
    pub enable_unity_build: bool,
    pub oculus_project: bool,
    pub extra_cmake_args: Vec<String>,
    /// Gradle's native staging folder, relative to the app project
    pub native_build_path: String,
    /// Directory whose files replace the built-in templates
    pub template_path: Option<PathBuf>,
}

impl GeneratorConfig {
    pub fn new(
        engine_root: PathBuf,
        build_dir: PathBuf,
        project_path: PathBuf,
        android_sdk_path: PathBuf,
        android_ndk_path: PathBuf,
        toolchain: NativeToolchain,
    ) -> Self {
        Self {
            engine_root,
            build_dir,
            project_path,
            is_unit_test: false,
            android_sdk_path,
            android_ndk_path,
            ndk_version: String::new(),
            platform_sdk_level: lydroid_core::config::DEFAULT_PLATFORM_SDK_API_LEVEL,
            native_api_level: 24,
            min_sdk_level: 24,
            build_tools_version: String::new(),
            android_gradle_plugin: lydroid_core::config::DEFAULT_ANDROID_GRADLE_PLUGIN.to_string(),
            toolchain,
            third_party_path: None,
            include_apk_assets: false,
            asset_mode: AssetMode::Loose,
            asset_type: "android".to_string(),
            signing: None,
            overwrite_existing: false,
            enable_unity_build: false,
            oculus_project: false,
            extra_cmake_args: Vec::new(),
            native_build_path: DEFAULT_NATIVE_BUILD_PATH.to_string(),
            template_path: None,
        }
    }

    pub fn app_dir(&self) -> PathBuf {
        self.build_dir.join("app")
    }

    /// Where the asset layout lands: inside the APK's asset folder when the
    /// assets are embedded (always for unit tests), otherwise next to it
    pub fn asset_layout_dir(&self) -> PathBuf {
        let src = self.app_dir().join("src");
        if self.include_apk_assets || self.is_unit_test {
            src.join("main").join("assets")
        } else {
            src.join("assets")
        }
    }

    /// The `platform.settings` record for this generation
    pub fn platform_settings(&self) -> PlatformSettings {
        PlatformSettings {
            platform: "android".to_string(),
            game_projects: vec![self.project_path.clone()],
            asset_deploy_mode: if self.is_unit_test { None } else { Some(self.asset_mode) },
            asset_deploy_type: if self.is_unit_test { String::new() } else { self.asset_type.clone() },
            android_sdk_path: self.android_sdk_path.clone(),
            embed_assets_in_apk: self.include_apk_assets || self.is_unit_test,
            is_unit_test: self.is_unit_test,
            android_gradle_plugin: self.android_gradle_plugin.clone(),
        }
    }

    /// Engine script that runs the bundled python
    pub fn python_path(&self) -> PathBuf {
        let script = if cfg!(windows) { "python.cmd" } else { "python.sh" };
        self.engine_root.join("python").join(script)
    }

    /// Base CMake folder for `local.properties` (the executable lives in `<dir>/bin`)
    pub fn cmake_dir(&self) -> Option<&Path> {
        self.toolchain
            .cmake_path
            .as_deref()
            .and_then(Path::parent)
            .and_then(Path::parent)
    }
}
