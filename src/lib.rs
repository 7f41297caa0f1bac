//! lydroid - Android project generation, deployment and test launching
//!
//! Generates the Gradle project that builds the engine's Android APK, deploys
//! the APK and its assets to connected devices, and runs unit-test modules on a
//! device through the test-runner activity.
//!
//! ## Architecture
//!
//! - `lydroid-core`: errors, `platform.settings`, user configuration, templates and the process seam
//! - `lydroid-android-toolchain`: host tool verification, SDK packages and Gradle plugin requirements
//! - `lydroid-manifest-manager`: manifest values and the resource/icon plan
//! - `lydroid-device-bridge`: adb, deployment and the test launcher
//! - `lydroid-build-engine`: library patching and the Gradle project generator

#![warn(clippy::all)]

pub mod commands;

pub use lydroid_android_toolchain as toolchain;
pub use lydroid_build_engine as build;
pub use lydroid_core as core;
pub use lydroid_device_bridge as device;
pub use lydroid_manifest_manager as manifest;

/// Prelude module for convenient imports
pub mod prelude {
    pub use lydroid_build_engine::{GeneratorConfig, ProjectGenerator};
    pub use lydroid_core::{LyDroidError, PlatformSettings, UserConfig};
    pub use lydroid_device_bridge::{AdbTool, DeploymentPlan, Deployer, TestLauncher};
}
