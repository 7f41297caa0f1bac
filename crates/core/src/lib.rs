//! lydroid core - shared types for the Android build and deployment pipeline
//!
//! Holds the error type every component reports through, the `platform.settings`
//! record shared by the generate and deploy phases, the user configuration file,
//! template expansion, and the child process seam.

pub mod config;
pub mod error;
pub mod process;
pub mod settings;
pub mod template;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use config::UserConfig;
pub use error::{ErrorKind, LyDroidError, Result};
pub use process::{CommandRunner, CommandSpec, ExecOutput, LineStream, SystemRunner};
pub use settings::{AssetMode, BuildConfiguration, DeploymentType, PlatformSettings, PLATFORM_SETTINGS_FILE};
pub use template::{Template, TemplateEnv, TemplateError};

/// lydroid version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "lydroid";

/// Project name used for unit-test builds
pub const TEST_RUNNER_PROJECT: &str = "AzTestRunner";

/// Android package of the unit-test runner
pub const TEST_RUNNER_PACKAGE_NAME: &str = "com.lumberyard.tests";
