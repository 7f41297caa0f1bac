//! Android Manifest Manager
//!
//! Turns a project's `project.json` / `android_project.json` into the
//! substitution record for `AndroidManifest.xml`, plans icon and splash screen
//! overrides, and reads manifests back.

pub mod environment;
pub mod multi_window;
pub mod orientation;
pub mod parser;
pub mod project;
pub mod resources;

use std::borrow::Cow;
use std::path::PathBuf;

use lydroid_core::LyDroidError;

pub use environment::{ManifestEnv, ManifestOptions};
pub use multi_window::MultiWindowOptions;
pub use orientation::Orientation;
pub use parser::{read_package, ActivitySummary, ManifestSummary};
pub use project::{load_project, read_project_settings, AndroidSettings, DensityOverrides, ProjectSettings};
pub use resources::{ResourceCopy, ResourcePlan};

pub const ANDROID_MANIFEST_FILE: &str = "AndroidManifest.xml";

/// Built-in `AndroidManifest.xml` template
pub const ANDROID_MANIFEST_TEMPLATE: &str = include_str!("../templates/AndroidManifest.xml");

/// Manifest and project settings errors
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Invalid project path {0}. Path does not exist or is a file")]
    ProjectNotFound(PathBuf),
    #[error("File not found: {0}")]
    MissingFile(PathBuf),
    #[error("Missing android settings in {0}")]
    MissingAndroidSettings(PathBuf),
    #[error("Invalid settings for project at '{path}'. Missing required '{key}' key")]
    MissingKey { path: PathBuf, key: &'static str },
    #[error("Unable to locate the Gem/Resources folder for project at '{0}'")]
    ResourcesNotFound(PathBuf),
    #[error("Unable to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("Unable to write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("Invalid JSON in {path}: {source}")]
    Json { path: PathBuf, source: serde_json::Error },
    #[error("Invalid manifest: {0}")]
    Xml(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ManifestError> for LyDroidError {
    fn from(err: ManifestError) -> Self {
        match err {
            ManifestError::ProjectNotFound(_) => LyDroidError::Directory(err.to_string()),
            ManifestError::MissingFile(_) => LyDroidError::FileNotFound(err.to_string()),
            ManifestError::MissingAndroidSettings(_) | ManifestError::MissingKey { .. } | ManifestError::Json { .. } => {
                LyDroidError::InvalidArgument(err.to_string())
            }
            ManifestError::Io(e) => LyDroidError::Io(e),
            other => LyDroidError::Generic(other.to_string()),
        }
    }
}

/// Escape text for use inside an XML attribute or element
pub fn xml_escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}
