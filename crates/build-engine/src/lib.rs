//! Android Build Engine
//!
//! Generates the Gradle project that builds the engine's Android APK: the app
//! and patched library subprojects, the per-configuration native build and asset
//! layout tasks, and the settings `deploy` reads back later.

pub mod builder_rules;
pub mod config;
pub mod generator;
pub mod gradle_build;
pub mod patcher;
pub mod signing;
pub mod tasks;
pub mod templates;

pub use builder_rules::BuilderRules;
pub use config::{GeneratorConfig, NativeToolchain};
pub use generator::ProjectGenerator;
pub use gradle_build::GradleWrapper;
pub use patcher::{LibraryPatcher, PatchError, PatchedLibrary};
pub use signing::SigningConfig;
pub use templates::TemplateSet;

use std::path::PathBuf;

use lydroid_core::{LyDroidError, TemplateError};
use lydroid_manifest_manager::ManifestError;

/// Build errors
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Template '{0}' not found")]
    TemplateNotFound(String),
    #[error("Invalid template path {0}. Path does not exist or is not a directory")]
    TemplateDirNotFound(PathBuf),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error("{0}")]
    Signing(String),
    #[error("Invalid builder rules: {0}")]
    BuilderRules(String),
    #[error("Unable to run {tool}: {source}")]
    ToolExec { tool: String, source: std::io::Error },
    #[error("Gradle was unable to generate a gradle wrapper for this project (code {code}): {stderr}")]
    WrapperFailed { code: i32, stderr: String },
    #[error("Unable to write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Core(#[from] LyDroidError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BuildError> for LyDroidError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::TemplateNotFound(_) => LyDroidError::FileNotFound(err.to_string()),
            BuildError::TemplateDirNotFound(_) => LyDroidError::Directory(err.to_string()),
            BuildError::Signing(_) | BuildError::BuilderRules(_) => LyDroidError::InvalidArgument(err.to_string()),
            BuildError::ToolExec { .. } | BuildError::WrapperFailed { .. } => {
                LyDroidError::Environment(err.to_string())
            }
            BuildError::Template(e) => e.into(),
            BuildError::Patch(e) => e.into(),
            BuildError::Manifest(e) => e.into(),
            BuildError::Core(e) => e,
            BuildError::Io(e) => LyDroidError::Io(e),
            other => LyDroidError::Generic(other.to_string()),
        }
    }
}

/// Write `content` to `path` unless the file exists and `overwrite` is off.
/// Identical content is left untouched. Returns whether the file was written.
pub(crate) fn write_generated(path: &std::path::Path, content: &str, overwrite: bool) -> Result<bool, BuildError> {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    if path.exists() {
        if !overwrite {
            tracing::info!("Skipped {} (file exists)", name);
            return Ok(false);
        }
        if std::fs::read_to_string(path).map(|existing| existing == content).unwrap_or(false) {
            tracing::debug!("{} is up to date", path.display());
            return Ok(false);
        }
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| BuildError::Write { path: parent.to_path_buf(), source })?;
    }
    std::fs::write(path, content).map_err(|source| BuildError::Write { path: path.to_path_buf(), source })?;
    tracing::info!("Generated {}", name);
    Ok(true)
}

/// Path text for Gradle scripts: forward slashes only
pub(crate) fn gradle_path(path: &std::path::Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lydroid_core::ErrorKind;

    #[test]
    fn test_error_kinds() {
        let err = BuildError::WrapperFailed { code: 1, stderr: "boom".into() };
        assert_eq!(LyDroidError::from(err).kind(), ErrorKind::Environment);
        let err = BuildError::Signing("Keystore password not supplied".into());
        assert_eq!(LyDroidError::from(err).kind(), ErrorKind::InvalidArgument);
        let err = BuildError::TemplateNotFound("build.gradle.in".into());
        assert_eq!(LyDroidError::from(err).kind(), ErrorKind::FileNotFound);
    }

    #[test]
    fn test_write_generated_respects_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("local.properties");

        assert!(write_generated(&path, "a", false).unwrap());
        assert!(!write_generated(&path, "b", false).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a");
        assert!(!write_generated(&path, "a", true).unwrap());
        assert!(write_generated(&path, "b", true).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "b");
    }

    #[test]
    fn test_gradle_path() {
        assert_eq!(gradle_path(std::path::Path::new(r"C:\engine\root")), "C:/engine/root");
    }
}
