//! Android Toolchain
//!
//! Resolves Android SDK packages through sdkmanager and verifies the host build
//! tools against the requirements of the selected Android Gradle plugin.

pub mod compat;
pub mod platform;
pub mod sdk_manager;
pub mod verifier;
pub mod version;

pub use compat::{lookup as lookup_gradle_plugin, GradlePluginRequirements};
pub use sdk_manager::{PackageCatalog, SdkManagerError, SdkPackage, SdkResolver};
pub use verifier::{ToolDescriptor, ToolError, ToolchainVerifier, VerifiedTool, CMAKE, GRADLE, JAVA, NINJA};
pub use version::Version;

/// SDK manager path of the platform tools package (adb)
pub const PLATFORM_TOOLS_PACKAGE: &str = "platform-tools";
