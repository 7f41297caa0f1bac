//! Gradle Wrapper
//!
//! The generated project is built with its own `gradlew`, created by the
//! verified Gradle installation once everything else is in place.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use lydroid_core::process::{CommandRunner, CommandSpec};

use crate::BuildError;

/// Creates the Gradle wrapper for a generated project
pub struct GradleWrapper<R> {
    runner: R,
    gradle: PathBuf,
    project_dir: PathBuf,
    java_home: Option<PathBuf>,
}

impl<R: CommandRunner> GradleWrapper<R> {
    pub fn new(runner: R, gradle: impl Into<PathBuf>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            gradle: gradle.into(),
            project_dir: project_dir.into(),
            java_home: None,
        }
    }

    /// Set JAVA_HOME
    pub fn with_java_home(mut self, path: PathBuf) -> Self {
        self.java_home = Some(path);
        self
    }

    /// Get gradlew path
    pub fn gradlew_path(&self) -> PathBuf {
        gradlew_path(&self.project_dir)
    }

    /// Check if Gradle wrapper exists
    pub fn has_wrapper(&self) -> bool {
        self.gradlew_path().exists()
    }

    /// `gradle wrapper -p <project>`
    pub async fn run(&self) -> Result<PathBuf, BuildError> {
        let mut spec = CommandSpec::new(&self.gradle)
            .arg("wrapper")
            .arg("-p")
            .arg(self.project_dir.to_string_lossy())
            .with_cwd(&self.project_dir);
        if let Some(java_home) = &self.java_home {
            spec = spec.with_env("JAVA_HOME", java_home.as_os_str());
        }

        info!("Generating the gradle wrapper");
        debug!("Running {}", spec.display_line());
        let output = self.runner.output(&spec).await.map_err(|source| BuildError::ToolExec {
            tool: self.gradle.display().to_string(),
            source,
        })?;
        if !output.success() {
            return Err(BuildError::WrapperFailed {
                code: output.code.unwrap_or(-1),
                stderr: output.stderr.trim().to_string(),
            });
        }

        info!("Gradle wrapper generated at {}", self.gradlew_path().display());
        Ok(self.gradlew_path())
    }
}

/// Wrapper script inside `project_dir`
pub fn gradlew_path(project_dir: &Path) -> PathBuf {
    let wrapper_name = if cfg!(windows) { "gradlew.bat" } else { "gradlew" };
    project_dir.join(wrapper_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lydroid_core::testing::ScriptedRunner;
    use lydroid_core::LyDroidError;

    #[tokio::test]
    async fn test_wrapper_command() {
        let runner = ScriptedRunner::new();
        let wrapper = GradleWrapper::new(&runner, "/opt/gradle/bin/gradle", "/build/android")
            .with_java_home(PathBuf::from("/opt/jdk"));

        let path = wrapper.run().await.unwrap();
        assert_eq!(path, gradlew_path(Path::new("/build/android")));
        assert_eq!(runner.calls(), vec!["gradle wrapper -p /build/android".to_string()]);
        let spec = &runner.specs()[0];
        assert_eq!(spec.cwd.as_deref(), Some(Path::new("/build/android")));
    }

    #[tokio::test]
    async fn test_wrapper_failure_is_environment_error() {
        let runner = ScriptedRunner::new();
        runner.fail("wrapper", 1, "FAILURE: Build failed with an exception.\n");
        let err = GradleWrapper::new(&runner, "gradle", "/build").run().await.unwrap_err();
        assert!(matches!(err, BuildError::WrapperFailed { code: 1, .. }));
        assert_eq!(LyDroidError::from(err).kind(), lydroid_core::ErrorKind::Environment);
    }

    #[tokio::test]
    async fn test_missing_gradle() {
        let runner = ScriptedRunner::new();
        runner.spawn_error("gradle", std::io::ErrorKind::NotFound);
        let err = GradleWrapper::new(&runner, "gradle", "/build").run().await.unwrap_err();
        assert!(matches!(err, BuildError::ToolExec { .. }));
    }
}
