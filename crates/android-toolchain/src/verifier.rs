//! Toolchain Verification
//!
//! Locates the host build tools (Gradle, CMake, Ninja, Java), asks each for its
//! version and checks it against the bounds the selected Android Gradle plugin
//! requires.

use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info};
use which::which;

use lydroid_core::process::find_executable_in;
use lydroid_core::{CommandRunner, CommandSpec, LyDroidError};

use crate::version::Version;

/// How to find and interrogate one host tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: &'static str,
    /// Executable base name without extension
    pub executable: &'static str,
    /// Command-line argument that overrides the tool location
    pub argument_name: &'static str,
    pub version_arg: &'static str,
    /// Must contain a `version` capture group
    pub version_regex: &'static str,
}

pub const GRADLE: ToolDescriptor = ToolDescriptor {
    name: "Gradle",
    executable: "gradle",
    argument_name: "--gradle-install-path",
    version_arg: "--version",
    version_regex: r#"Gradle\s*"?(?P<version>[\d_.]+)"#,
};

pub const CMAKE: ToolDescriptor = ToolDescriptor {
    name: "CMake",
    executable: "cmake",
    argument_name: "--cmake-install-path",
    version_arg: "--version",
    version_regex: r#"cmake version\s*"?(?P<version>[\d_.]+)"#,
};

pub const NINJA: ToolDescriptor = ToolDescriptor {
    name: "Ninja",
    executable: "ninja",
    argument_name: "--ninja-install-path",
    version_arg: "--version",
    version_regex: r"^\s*(?P<version>[\d_.]+)",
};

pub const JAVA: ToolDescriptor = ToolDescriptor {
    name: "Java",
    executable: "java",
    argument_name: "JAVA_HOME",
    version_arg: "-version",
    version_regex: r#"version\s*"?(?P<version>[\d_.]+)"#,
};

/// A located tool and the version it reported
#[derive(Debug, Clone)]
pub struct VerifiedTool {
    pub name: &'static str,
    /// Path that was executed
    pub executable: PathBuf,
    /// Absolute path when the tool came from an override location
    pub override_path: Option<PathBuf>,
    pub version: Version,
}

/// Tool verification errors
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unable to locate {tool}. Make sure it is installed and on PATH, or set {argument}")]
    NotFound { tool: &'static str, argument: &'static str },
    #[error("Unable to find {tool} under '{path}' given by {argument}")]
    InvalidOverride { tool: &'static str, argument: &'static str, path: PathBuf },
    #[error("Unable to run {tool} ({path}): {source}")]
    Exec { tool: &'static str, path: PathBuf, source: std::io::Error },
    #[error("Unable to determine the version of {tool} from '{path}'. Check the installation or set {argument}")]
    NoVersion { tool: &'static str, argument: &'static str, path: PathBuf },
    #[error("{tool} version {found} is older than the minimum {min}. Upgrade it or set {argument}")]
    TooOld { tool: &'static str, argument: &'static str, found: Version, min: Version },
    #[error("{tool} version {found} is newer than the maximum {max}. Install a supported version or set {argument}")]
    TooNew { tool: &'static str, argument: &'static str, found: Version, max: Version },
    #[error("Invalid version pattern for {0}")]
    Pattern(&'static str),
}

impl From<ToolError> for LyDroidError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::InvalidOverride { .. } => LyDroidError::InvalidArgument(err.to_string()),
            other => LyDroidError::Environment(other.to_string()),
        }
    }
}

/// Verifies host tools through a [`CommandRunner`]
pub struct ToolchainVerifier<R> {
    runner: R,
}

impl<R: CommandRunner> ToolchainVerifier<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Resolve the executable, from `override_dir` (or its `bin/`) when given, otherwise from PATH
    pub fn resolve(tool: &ToolDescriptor, override_dir: Option<&Path>) -> Result<PathBuf, ToolError> {
        match override_dir {
            Some(dir) => [dir.to_path_buf(), dir.join("bin")]
                .iter()
                .find_map(|candidate| find_executable_in(candidate, tool.executable))
                .map(|path| std::path::absolute(&path).unwrap_or(path))
                .ok_or_else(|| ToolError::InvalidOverride {
                    tool: tool.name,
                    argument: tool.argument_name,
                    path: dir.to_path_buf(),
                }),
            None => which(tool.executable).map_err(|_| ToolError::NotFound {
                tool: tool.name,
                argument: tool.argument_name,
            }),
        }
    }

    /// Locate `tool`, read its version and check it against the optional bounds
    pub async fn verify(
        &self,
        tool: &ToolDescriptor,
        override_dir: Option<&Path>,
        min: Option<&Version>,
        max: Option<&Version>,
    ) -> Result<VerifiedTool, ToolError> {
        let executable = Self::resolve(tool, override_dir)?;
        debug!("Checking {} at {:?}", tool.name, executable);

        let spec = CommandSpec::new(&executable).arg(tool.version_arg);
        let output = self.runner.output(&spec).await.map_err(|source| ToolError::Exec {
            tool: tool.name,
            path: executable.clone(),
            source,
        })?;

        let pattern = Regex::new(&format!("(?m){}", tool.version_regex)).map_err(|_| ToolError::Pattern(tool.name))?;
        let version = pattern
            .captures(&output.combined())
            .and_then(|caps| caps.name("version"))
            .map(|m| Version::parse(m.as_str()))
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ToolError::NoVersion {
                tool: tool.name,
                argument: tool.argument_name,
                path: executable.clone(),
            })?;

        if let Some(min) = min {
            if version < *min {
                return Err(ToolError::TooOld {
                    tool: tool.name,
                    argument: tool.argument_name,
                    found: version,
                    min: min.clone(),
                });
            }
        }
        if let Some(max) = max {
            if version > *max {
                return Err(ToolError::TooNew {
                    tool: tool.name,
                    argument: tool.argument_name,
                    found: version,
                    max: max.clone(),
                });
            }
        }

        info!("{} version {} detected", tool.name, version);
        Ok(VerifiedTool {
            name: tool.name,
            override_path: override_dir.map(|_| executable.clone()),
            executable,
            version,
        })
    }
}
