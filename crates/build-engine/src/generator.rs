//! Android Project Generator
//!
//! Writes the Gradle project for a game (or the unit-test runner) into the
//! build directory. Everything that can fail on bad input (templates, project
//! settings, library patches) is checked before the first file is written.

use std::path::PathBuf;

use tracing::{debug, info};

use lydroid_core::{CommandRunner, PlatformSettings};
use lydroid_manifest_manager::{ManifestEnv, ManifestOptions, ResourcePlan, ANDROID_MANIFEST_FILE};

use crate::builder_rules::BuilderRules;
use crate::config::GeneratorConfig;
use crate::gradle_build::GradleWrapper;
use crate::patcher::{LibraryPatcher, PatchedLibrary};
use crate::tasks::BuildGradleEnv;
use crate::templates::{
    GradlePropertiesEnv, LibrariesEnv, LocalPropertiesEnv, RootGradleEnv, TemplateSet, ANDROID_LIBRARIES_JSON,
    BUILD_GRADLE_TEMPLATE, GRADLE_PROPERTIES_TEMPLATE, LOCAL_PROPERTIES_TEMPLATE, ROOT_BUILD_GRADLE_TEMPLATE,
};
use crate::{gradle_path, write_generated, BuildError};

/// What a generation produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedProject {
    pub build_dir: PathBuf,
    pub package_name: String,
    /// Gradle subprojects, app first
    pub subprojects: Vec<String>,
    pub gradlew: PathBuf,
}

/// Generates the Android Gradle project
pub struct ProjectGenerator<R> {
    config: GeneratorConfig,
    runner: R,
}

impl<R: CommandRunner> ProjectGenerator<R> {
    pub fn new(config: GeneratorConfig, runner: R) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    fn manifest_env(&self) -> Result<ManifestEnv, BuildError> {
        let options = ManifestOptions {
            target_sdk_version: self.config.platform_sdk_level,
            min_sdk_version: self.config.min_sdk_level,
            oculus_project: self.config.oculus_project,
        };
        let env = if self.config.is_unit_test {
            ManifestEnv::unit_test(&self.config.engine_root, options)?
        } else {
            ManifestEnv::load(&self.config.project_path, options)?
        };
        Ok(env)
    }

    fn prepare_libraries(&self, templates: &TemplateSet) -> Result<Vec<PatchedLibrary>, BuildError> {
        let env = LibrariesEnv {
            sdk_home: gradle_path(&self.config.android_sdk_path),
            ndk_home: gradle_path(&self.config.android_ndk_path),
            sdk_version: self.config.platform_sdk_level.to_string(),
        };
        let script = templates.render(ANDROID_LIBRARIES_JSON, &env)?;
        let patcher = LibraryPatcher::parse(&script)?;
        debug!("Android libraries: {:?}", patcher.library_names());
        Ok(patcher.prepare()?)
    }

    /// Generate the project and its Gradle wrapper
    pub async fn execute(&self) -> Result<GeneratedProject, BuildError> {
        let config = &self.config;
        let templates = match &config.template_path {
            Some(dir) => TemplateSet::with_override(dir)?,
            None => TemplateSet::builtin(),
        };
        templates.validate()?;

        let manifest_env = self.manifest_env()?;
        let resource_root = if config.is_unit_test { &config.engine_root } else { &config.project_path };
        let resources = ResourcePlan::build(&manifest_env, resource_root)?;
        let libraries = self.prepare_libraries(&templates)?;
        let rules = BuilderRules::load(&templates, &manifest_env)?;

        let build_dir = &config.build_dir;
        std::fs::create_dir_all(build_dir)
            .map_err(|source| BuildError::Write { path: build_dir.clone(), source })?;

        let mut overwrite = config.overwrite_existing;
        if let Ok(existing) = PlatformSettings::load(build_dir) {
            if existing.android_gradle_plugin != config.android_gradle_plugin {
                info!(
                    "Android Gradle plugin changed from {} to {}, regenerating every file",
                    existing.android_gradle_plugin, config.android_gradle_plugin
                );
                overwrite = true;
            }
        }
        config.platform_settings().store(build_dir)?;

        let local_properties = LocalPropertiesEnv::new(
            &config.android_sdk_path,
            &config.android_ndk_path,
            config.cmake_dir(),
        );
        write_generated(
            &build_dir.join("local.properties"),
            &templates.render(LOCAL_PROPERTIES_TEMPLATE, &local_properties)?,
            overwrite,
        )?;

        let library_names =
            LibraryPatcher::emit(&libraries, build_dir, &templates, &config.android_gradle_plugin, overwrite)?;

        // App project
        let app_dir = config.app_dir();
        let app_src = app_dir.join("src");
        if app_src.exists() {
            tokio::fs::remove_dir_all(&app_src).await?;
        }
        let app_gradle = BuildGradleEnv::application(
            config,
            &manifest_env.package_name,
            &manifest_env.launcher_name,
            &library_names,
        );
        write_generated(
            &app_dir.join("build.gradle"),
            &templates.render(BUILD_GRADLE_TEMPLATE, &app_gradle)?,
            overwrite,
        )?;
        let main_dir = app_src.join("main");
        write_generated(
            &main_dir.join(ANDROID_MANIFEST_FILE),
            &templates.render(ANDROID_MANIFEST_FILE, &manifest_env)?,
            true,
        )?;
        let copied = rules.apply(&templates, &manifest_env, &app_dir, true)?;
        debug!("{} app source files from the builder rules", copied);
        resources.apply(&main_dir.join("res"))?;

        let root_gradle = RootGradleEnv {
            android_gradle_plugin: config.android_gradle_plugin.clone(),
            sdk_version: config.platform_sdk_level,
            min_sdk_version: config.min_sdk_level,
            ndk_platform_version: config.native_api_level,
            build_tools_version: config.build_tools_version.clone(),
            ndk_version: config.ndk_version.clone(),
            engine_root: gradle_path(&config.engine_root),
        };
        write_generated(
            &build_dir.join("build.gradle"),
            &templates.render(ROOT_BUILD_GRADLE_TEMPLATE, &root_gradle)?,
            overwrite,
        )?;

        let subprojects: Vec<String> = std::iter::once("app".to_string()).chain(library_names).collect();
        let includes: Vec<String> = subprojects.iter().map(|name| format!("include ':{}'", name)).collect();
        write_generated(&build_dir.join("settings.gradle"), &format!("{}\n", includes.join("\n")), overwrite)?;

        write_generated(
            &build_dir.join("gradle.properties"),
            &templates.render(GRADLE_PROPERTIES_TEMPLATE, &GradlePropertiesEnv)?,
            overwrite,
        )?;

        let mut wrapper = GradleWrapper::new(&self.runner, &config.toolchain.gradle, build_dir);
        if let Some(java_home) = &config.toolchain.java_home {
            wrapper = wrapper.with_java_home(java_home.clone());
        }
        let gradlew = wrapper.run().await?;

        info!("Android project generated at {}", build_dir.display());
        Ok(GeneratedProject {
            build_dir: build_dir.clone(),
            package_name: manifest_env.package_name,
            subprojects,
            gradlew,
        })
    }
}
