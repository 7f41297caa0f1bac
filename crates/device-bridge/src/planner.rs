//! Deployment planning
//!
//! Reads `platform.settings` from a generated build directory and works out what
//! a deploy pushes: the APK, the asset payload, or both.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use lydroid_core::{AssetMode, BuildConfiguration, DeploymentType, PlatformSettings};
use lydroid_core::{TEST_RUNNER_PACKAGE_NAME, TEST_RUNNER_PROJECT};
use lydroid_manifest_manager::{read_package, read_project_settings, ANDROID_MANIFEST_FILE};

use crate::DeployError;

/// Name of the marker file written next to the deployed assets
pub const DEPLOY_TIMESTAMP_FILE: &str = "deploy.timestamp";

/// What one deploy does
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPlan {
    pub build_dir: PathBuf,
    pub configuration: BuildConfiguration,
    /// Effective type after accounting for embedded assets
    pub deployment_type: DeploymentType,
    pub clean: bool,
    pub project_name: String,
    pub package_name: String,
    pub is_unit_test: bool,
    pub apk_path: PathBuf,
    pub asset_mode: AssetMode,
    pub local_asset_path: PathBuf,
}

/// `<build>/app/build/outputs/apk/<config>/app-<config>.apk`
pub fn apk_path(build_dir: &Path, configuration: BuildConfiguration) -> PathBuf {
    let config = configuration.lower();
    build_dir
        .join("app")
        .join("build")
        .join("outputs")
        .join("apk")
        .join(config)
        .join(format!("app-{}.apk", config))
}

/// Package name of the generated app. The generated manifest is authoritative;
/// the project settings are the fallback.
pub fn resolve_package_name(build_dir: &Path, settings: &PlatformSettings) -> Result<String, DeployError> {
    let manifest = build_dir.join("app").join("src").join("main").join(ANDROID_MANIFEST_FILE);
    if manifest.is_file() {
        match read_package(&manifest) {
            Ok(package) => return Ok(package),
            Err(e) => warn!("Unable to read the package name from {}: {}", manifest.display(), e),
        }
    }

    if settings.is_unit_test {
        return Ok(TEST_RUNNER_PACKAGE_NAME.to_string());
    }
    let project_path = settings
        .game_projects
        .first()
        .ok_or_else(|| lydroid_core::LyDroidError::generic("platform.settings lists no game project"))?;
    let (_, android) = lydroid_manifest_manager::load_project(project_path)?;
    android.package_name.ok_or_else(|| {
        DeployError::Manifest(lydroid_manifest_manager::ManifestError::MissingKey {
            path: project_path.clone(),
            key: "package_name",
        })
    })
}

fn project_name(settings: &PlatformSettings) -> String {
    if settings.is_unit_test {
        return TEST_RUNNER_PROJECT.to_string();
    }
    let Some(project_path) = settings.game_projects.first() else {
        return TEST_RUNNER_PROJECT.to_string();
    };
    let name = match read_project_settings(project_path) {
        Ok(project) => project.project_name,
        Err(e) => {
            debug!("{}", e);
            None
        }
    };
    name.or_else(|| project_path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| TEST_RUNNER_PROJECT.to_string())
}

impl DeploymentPlan {
    pub fn new(
        build_dir: &Path,
        configuration: BuildConfiguration,
        requested: DeploymentType,
        clean: bool,
    ) -> Result<Self, DeployError> {
        if !build_dir.is_dir() {
            return Err(DeployError::BuildDirNotFound(build_dir.to_path_buf()));
        }
        let settings = PlatformSettings::load(build_dir)?;

        let deployment_type = if settings.embed_assets_in_apk {
            match requested {
                DeploymentType::Assets => return Err(DeployError::AssetsEmbedded),
                DeploymentType::Both => {
                    info!("Assets are embedded in the APK, deploying the APK only");
                    DeploymentType::Apk
                }
                DeploymentType::Apk => DeploymentType::Apk,
            }
        } else {
            requested
        };

        let project_name = project_name(&settings);
        let package_name = resolve_package_name(build_dir, &settings)?;

        // Release layouts are always PAK
        let asset_mode = match (configuration, settings.asset_deploy_mode) {
            _ if settings.is_unit_test => AssetMode::Loose,
            (BuildConfiguration::Release, _) => AssetMode::Pak,
            (_, Some(mode)) => mode,
            (_, None) => AssetMode::Loose,
        };

        let local_asset_path = match (asset_mode, settings.game_projects.first()) {
            (AssetMode::Pak, Some(project_path)) => project_path.join("Pak").join(format!(
                "{}_{}_paks",
                project_name.to_lowercase(),
                settings.asset_deploy_type
            )),
            _ => build_dir.join("app").join("src").join("assets"),
        };

        let plan = Self {
            build_dir: build_dir.to_path_buf(),
            configuration,
            deployment_type,
            clean,
            project_name,
            package_name,
            is_unit_test: settings.is_unit_test,
            apk_path: apk_path(build_dir, configuration),
            asset_mode,
            local_asset_path,
        };
        plan.check_inputs()?;
        Ok(plan)
    }

    fn check_inputs(&self) -> Result<(), DeployError> {
        if self.deployment_type.includes_apk() && !self.apk_path.is_file() {
            return Err(DeployError::ApkNotFound(self.apk_path.clone(), self.configuration.lower().to_string()));
        }
        if self.deployment_type.includes_assets() && !self.local_asset_path.is_dir() {
            return Err(DeployError::AssetsNotFound(
                self.local_asset_path.clone(),
                self.configuration.lower().to_string(),
            ));
        }
        Ok(())
    }

    /// `<storage>/Android/data/<package>/files`
    pub fn device_asset_path(&self, storage_path: &str) -> String {
        format!("{}/Android/data/{}/files", storage_path.trim_end_matches('/'), self.package_name)
    }

    /// Local copy of the timestamp marker, kept in the build directory
    pub fn local_timestamp_path(&self) -> PathBuf {
        self.build_dir.join(DEPLOY_TIMESTAMP_FILE)
    }
}
