//! Device bridge - adb, deployment and on-device test launching
//!
//! Everything that talks to a connected device goes through [`AdbTool`]. The
//! [`DeploymentPlan`] decides what a deploy pushes, the [`Deployer`] pushes it to
//! each device, and the [`TestLauncher`] runs unit-test modules through the
//! test-runner activity while following its log output.

pub mod adb;
pub mod deployer;
pub mod device;
pub mod launcher;
pub mod logcat;
pub mod planner;
pub mod storage;

use std::path::PathBuf;

use lydroid_core::LyDroidError;
use lydroid_manifest_manager::ManifestError;

pub use adb::{AdbError, AdbTool, DeviceHandle};
pub use deployer::{DeviceOutcome, DeployReport, Deployer};
pub use device::{Device, DeviceRecord, DeviceState};
pub use launcher::{LaunchOptions, ModuleResult, TestLauncher, TestOutcome};
pub use planner::DeploymentPlan;

/// Deploy and test launch errors
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("Invalid build directory {0}. Path does not exist or is not a directory")]
    BuildDirNotFound(PathBuf),
    #[error("Cannot deploy assets only when the assets are embedded in the APK. Use the APK or BOTH deployment type")]
    AssetsEmbedded,
    #[error("APK not found at {0}. Build the '{1}' configuration first")]
    ApkNotFound(PathBuf, String),
    #[error("Asset folder not found at {0}. Build the '{1}' configuration first")]
    AssetsNotFound(PathBuf, String),
    #[error("No connected Android devices found")]
    NoDevices,
    #[error("Deployment failed on {} device(s): {}", .0.len(), .0.join(", "))]
    DeviceFailures(Vec<String>),
    #[error("Build directory {0} is not a unit test build. Generate it with --unit-test")]
    NotUnitTest(PathBuf),
    #[error("Unit test module registry not found at {0}")]
    RegistryNotFound(PathBuf),
    #[error("Invalid unit test module registry {0}: {1}")]
    InvalidRegistry(PathBuf, String),
    #[error("Unknown test module(s): {}. Available modules: {}", .requested.join(", "), .available.join(", "))]
    UnknownModules { requested: Vec<String>, available: Vec<String> },
    #[error(transparent)]
    Adb(#[from] AdbError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Core(#[from] LyDroidError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DeployError> for LyDroidError {
    fn from(err: DeployError) -> Self {
        match err {
            DeployError::BuildDirNotFound(_) => LyDroidError::Directory(err.to_string()),
            DeployError::AssetsEmbedded => LyDroidError::NotSupported(err.to_string()),
            DeployError::ApkNotFound(..) | DeployError::AssetsNotFound(..) | DeployError::RegistryNotFound(_) => {
                LyDroidError::FileNotFound(err.to_string())
            }
            DeployError::NotUnitTest(_) | DeployError::UnknownModules { .. } | DeployError::InvalidRegistry(..) => {
                LyDroidError::InvalidArgument(err.to_string())
            }
            DeployError::Adb(e) => e.into(),
            DeployError::Manifest(e) => e.into(),
            DeployError::Core(e) => e,
            DeployError::Io(e) => LyDroidError::Io(e),
            other => LyDroidError::Generic(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lydroid_core::ErrorKind;

    #[test]
    fn test_error_kinds() {
        assert_eq!(LyDroidError::from(DeployError::AssetsEmbedded).kind(), ErrorKind::NotSupported);
        assert_eq!(
            LyDroidError::from(DeployError::BuildDirNotFound(PathBuf::from("out"))).kind(),
            ErrorKind::Directory
        );
        let err = DeployError::Adb(AdbError::CommandFailed { command: "push".into(), stderr: "denied".into() });
        assert_eq!(LyDroidError::from(err).kind(), ErrorKind::Generic);
        let err = DeployError::DeviceFailures(vec!["DEV_A".into(), "DEV_B".into()]);
        assert_eq!(err.to_string(), "Deployment failed on 2 device(s): DEV_A, DEV_B");
    }
}
