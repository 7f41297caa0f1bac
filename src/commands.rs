//! CLI commands for lydroid
//!
//! Each command turns its arguments plus the user configuration into the inputs
//! of the component crates and drives them. Component errors are converted to
//! [`LyDroidError`] here so `main` can pick the exit code.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};

use lydroid_android_toolchain::platform::{
    parse_api_level, platform_package, MIN_NATIVE_API_LEVEL, MIN_PLATFORM_SDK_API_LEVEL,
};
use lydroid_android_toolchain::{
    lookup_gradle_plugin, GradlePluginRequirements, SdkResolver, ToolchainVerifier, CMAKE, GRADLE, JAVA, NINJA,
    PLATFORM_TOOLS_PACKAGE,
};
use lydroid_build_engine::{GeneratorConfig, NativeToolchain, ProjectGenerator, SigningConfig};
use lydroid_core::{
    AssetMode, BuildConfiguration, CommandRunner, DeploymentType, LyDroidError, PlatformSettings, SystemRunner,
    UserConfig,
};
use lydroid_device_bridge::launcher::format_results;
use lydroid_device_bridge::{AdbTool, DeployError, DeploymentPlan, Deployer, LaunchOptions, ModuleResult, TestLauncher};

/// Environment variable consulted when no SDK path is given
pub const ANDROID_SDK_ENV: &str = "ANDROID_SDK";

#[derive(Parser, Debug)]
#[command(name = "lydroid")]
#[command(version, about = "Generate, deploy and test the engine's Android projects", long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Read defaults from this file instead of the user config.toml
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate the Android Gradle project for a game or the unit-test runner
    Generate(GenerateCommand),
    /// Deploy the APK and/or assets of a generated project to connected devices
    Deploy(DeployCommand),
    /// Run unit test modules on a connected device
    LaunchTest(LaunchTestCommand),
    /// List attached devices and their state
    Devices(DevicesCommand),
}

impl Cli {
    pub fn user_config(&self) -> lydroid_core::Result<UserConfig> {
        match &self.config {
            Some(path) if !path.is_file() => Err(LyDroidError::file_not_found(format!(
                "Configuration file {} not found",
                path.display()
            ))),
            Some(path) => UserConfig::load_from(path),
            None => UserConfig::load(),
        }
    }

    pub async fn execute(&self) -> Result<()> {
        let user = self.user_config()?;
        match &self.command {
            Command::Generate(cmd) => cmd.execute(&user).await,
            Command::Deploy(cmd) => cmd.execute().await,
            Command::LaunchTest(cmd) => cmd.execute().await,
            Command::Devices(cmd) => cmd.execute(&user).await,
        }
    }
}

/// SDK root from the argument (or `ANDROID_SDK`), then the user config
fn resolve_sdk_path(argument: Option<&Path>, user: &UserConfig) -> lydroid_core::Result<PathBuf> {
    argument
        .map(Path::to_path_buf)
        .or_else(|| user.android_sdk_root.clone())
        .ok_or_else(|| {
            LyDroidError::invalid_argument(format!(
                "No Android SDK path given. Use --android-sdk-path, set {} or add android_sdk_root to the configuration file",
                ANDROID_SDK_ENV
            ))
        })
}

/// Generate command options
#[derive(Args, Debug, Clone)]
pub struct GenerateCommand {
    /// Folder the Gradle project is generated into
    #[arg(long)]
    pub build_dir: PathBuf,

    /// Game project to generate for
    #[arg(long, required_unless_present = "unit_test")]
    pub project_path: Option<PathBuf>,

    /// Engine root folder (defaults to the current directory)
    #[arg(long)]
    pub engine_root: Option<PathBuf>,

    #[arg(long, env = ANDROID_SDK_ENV)]
    pub android_sdk_path: Option<PathBuf>,

    /// Platform SDK level, e.g. 33 or android-33
    #[arg(long)]
    pub android_sdk_platform: Option<String>,

    /// Native API level for the NDK build
    #[arg(long)]
    pub android_native_api_level: Option<String>,

    /// Minimum SDK level of the app (defaults to the native API level)
    #[arg(long)]
    pub android_min_sdk: Option<String>,

    /// NDK version, may end in a '*' wildcard
    #[arg(long)]
    pub android_ndk_version: Option<String>,

    #[arg(long)]
    pub gradle_plugin_version: Option<String>,

    #[arg(long)]
    pub gradle_install_path: Option<PathBuf>,

    #[arg(long)]
    pub cmake_install_path: Option<PathBuf>,

    #[arg(long)]
    pub ninja_install_path: Option<PathBuf>,

    #[arg(long)]
    pub third_party_path: Option<PathBuf>,

    /// Package the asset layout inside the APK
    #[arg(long)]
    pub include_apk_assets: bool,

    #[arg(long, default_value = "LOOSE", value_name = "LOOSE|PAK|VFS")]
    pub asset_mode: AssetMode,

    #[arg(long, default_value = "android")]
    pub asset_type: String,

    #[arg(long)]
    pub signconfig_store_file: Option<PathBuf>,

    #[arg(long)]
    pub signconfig_store_password: Option<String>,

    #[arg(long)]
    pub signconfig_key_alias: Option<String>,

    #[arg(long)]
    pub signconfig_key_password: Option<String>,

    /// Generate the unit-test runner instead of a game
    #[arg(long)]
    pub unit_test: bool,

    #[arg(long)]
    pub overwrite_existing: bool,

    #[arg(long)]
    pub enable_unity_build: bool,

    #[arg(long)]
    pub oculus_project: bool,

    /// Extra CMake configure argument, passed through as given. Repeat for more.
    #[arg(long, value_name = "ARG", allow_hyphen_values = true)]
    pub extra_cmake_configure_args: Vec<String>,

    /// Folder whose files replace the built-in templates
    #[arg(long)]
    pub template_path: Option<PathBuf>,

    /// Gradle's native build staging folder
    #[arg(long)]
    pub native_build_path: Option<String>,
}

/// Arguments of `generate` after applying the user configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateInputs {
    pub engine_root: PathBuf,
    pub project_path: PathBuf,
    pub android_sdk_path: PathBuf,
    pub android_gradle_plugin: String,
    pub platform_sdk_level: u32,
    pub native_api_level: u32,
    pub min_sdk_level: u32,
    pub ndk_version: Option<String>,
    pub gradle_home: Option<PathBuf>,
    pub cmake_home: Option<PathBuf>,
    pub ninja_home: Option<PathBuf>,
    pub native_build_path: String,
    pub extra_cmake_args: Vec<String>,
}

/// Host tools checked against the plugin's requirements
#[derive(Debug, Clone)]
struct VerifiedToolchain {
    native: NativeToolchain,
}

/// SDK packages the project is generated against
#[derive(Debug, Clone)]
struct SdkPackages {
    ndk_path: PathBuf,
    ndk_version: String,
    build_tools_version: String,
}

impl GenerateCommand {
    /// Apply the configuration defaults and validate the plain arguments
    pub fn resolve(&self, user: &UserConfig) -> lydroid_core::Result<GenerateInputs> {
        let engine_root = match &self.engine_root {
            Some(root) => root.clone(),
            None => std::env::current_dir()?,
        };
        if !engine_root.is_dir() {
            return Err(LyDroidError::directory(format!(
                "Invalid engine root {}. Path does not exist or is not a directory",
                engine_root.display()
            )));
        }

        let project_path = match &self.project_path {
            Some(path) => path.clone(),
            None => engine_root.clone(),
        };
        if !self.unit_test && !project_path.is_dir() {
            return Err(LyDroidError::directory(format!(
                "Invalid project path {}. Path does not exist or is a file",
                project_path.display()
            )));
        }

        let android_sdk_path = resolve_sdk_path(self.android_sdk_path.as_deref(), user)?;

        let platform_sdk_level = match &self.android_sdk_platform {
            Some(value) => parse_api_level(value, "--android-sdk-platform", MIN_PLATFORM_SDK_API_LEVEL)?,
            None => parse_api_level(
                &user.platform_sdk_api_level.to_string(),
                "platform_sdk_api_level",
                MIN_PLATFORM_SDK_API_LEVEL,
            )?,
        };
        let native_api_level = match &self.android_native_api_level {
            Some(value) => parse_api_level(value, "--android-native-api-level", MIN_NATIVE_API_LEVEL)?,
            None => MIN_NATIVE_API_LEVEL,
        };
        let min_sdk_level = match &self.android_min_sdk {
            Some(value) => parse_api_level(value, "--android-min-sdk", MIN_NATIVE_API_LEVEL)?,
            None => native_api_level,
        };

        Ok(GenerateInputs {
            engine_root,
            project_path,
            android_sdk_path,
            android_gradle_plugin: self
                .gradle_plugin_version
                .clone()
                .unwrap_or_else(|| user.android_gradle_plugin.clone()),
            platform_sdk_level,
            native_api_level,
            min_sdk_level,
            ndk_version: self.android_ndk_version.clone().or_else(|| user.ndk_version.clone()),
            gradle_home: self.gradle_install_path.clone().or_else(|| user.gradle_home.clone()),
            cmake_home: self.cmake_install_path.clone().or_else(|| user.cmake_home.clone()),
            ninja_home: self.ninja_install_path.clone().or_else(|| user.ninja_home.clone()),
            native_build_path: self
                .native_build_path
                .clone()
                .unwrap_or_else(|| user.native_build_path.clone()),
            extra_cmake_args: self.extra_cmake_configure_args.clone(),
        })
    }

    pub async fn execute(&self, user: &UserConfig) -> Result<()> {
        Ok(self.generate(user).await?)
    }

    async fn generate(&self, user: &UserConfig) -> lydroid_core::Result<()> {
        let inputs = self.resolve(user)?;
        let signing = SigningConfig::from_parts(
            self.signconfig_store_file.clone(),
            self.signconfig_store_password.clone(),
            self.signconfig_key_alias.clone(),
            self.signconfig_key_password.clone(),
        )?;
        let requirements = lookup_gradle_plugin(&inputs.android_gradle_plugin)?;
        info!(
            "Using Android Gradle plugin {} ({})",
            requirements.agp_version, requirements.release_notes
        );

        let runner = SystemRunner;
        let toolchain = verify_toolchain(&runner, requirements, &inputs).await?;
        let packages = install_sdk_packages(&runner, requirements, &inputs, toolchain.native.java_home.as_deref()).await?;

        let mut config = GeneratorConfig::new(
            inputs.engine_root,
            self.build_dir.clone(),
            inputs.project_path,
            inputs.android_sdk_path,
            packages.ndk_path,
            toolchain.native,
        );
        config.is_unit_test = self.unit_test;
        config.ndk_version = packages.ndk_version;
        config.build_tools_version = packages.build_tools_version;
        config.platform_sdk_level = inputs.platform_sdk_level;
        config.native_api_level = inputs.native_api_level;
        config.min_sdk_level = inputs.min_sdk_level;
        config.android_gradle_plugin = requirements.agp_version.to_string();
        config.third_party_path = self.third_party_path.clone();
        config.include_apk_assets = self.include_apk_assets;
        config.asset_mode = self.asset_mode;
        config.asset_type = self.asset_type.clone();
        config.signing = signing;
        config.overwrite_existing = self.overwrite_existing;
        config.enable_unity_build = self.enable_unity_build;
        config.oculus_project = self.oculus_project;
        config.extra_cmake_args = inputs.extra_cmake_args;
        config.native_build_path = inputs.native_build_path;
        config.template_path = self.template_path.clone();

        let generated = ProjectGenerator::new(config, &runner).execute().await?;
        info!(
            "Generated {} ({}). Build it with {}",
            generated.build_dir.display(),
            generated.package_name,
            generated.gradlew.display()
        );
        Ok(())
    }
}

/// Verify Java, Gradle, CMake and Ninja against the plugin's requirements
async fn verify_toolchain<R: CommandRunner>(
    runner: R,
    requirements: &GradlePluginRequirements,
    inputs: &GenerateInputs,
) -> lydroid_core::Result<VerifiedToolchain> {
    let verifier = ToolchainVerifier::new(runner);

    let java_home = std::env::var_os("JAVA_HOME").map(PathBuf::from);
    verifier
        .verify(&JAVA, java_home.as_deref(), Some(&requirements.min_jdk_version()), None)
        .await?;
    let gradle = verifier
        .verify(&GRADLE, inputs.gradle_home.as_deref(), Some(&requirements.min_gradle_version()), None)
        .await?;
    let cmake = verifier
        .verify(
            &CMAKE,
            inputs.cmake_home.as_deref(),
            Some(&requirements.min_cmake_version()),
            requirements.max_cmake_version().as_ref(),
        )
        .await?;
    let ninja = verifier.verify(&NINJA, inputs.ninja_home.as_deref(), None, None).await?;

    Ok(VerifiedToolchain {
        native: NativeToolchain {
            gradle: gradle.executable,
            cmake_version: cmake.version.to_string(),
            cmake_path: cmake.override_path,
            ninja_path: ninja.override_path,
            java_home,
        },
    })
}

/// Make sure the platform, build tools, NDK and platform tools are installed
async fn install_sdk_packages<R: CommandRunner>(
    runner: R,
    requirements: &GradlePluginRequirements,
    inputs: &GenerateInputs,
    java_home: Option<&Path>,
) -> lydroid_core::Result<SdkPackages> {
    let sdk = &inputs.android_sdk_path;
    let mut resolver = SdkResolver::new(sdk.clone(), runner)?;
    if let Some(java_home) = java_home {
        resolver = resolver.with_java_home(java_home.to_path_buf());
    }
    resolver.check_licenses().await?;

    resolver
        .install(&platform_package(inputs.platform_sdk_level), "Android SDK Platform")
        .await?;
    let build_tools = resolver
        .install(&format!("build-tools;{}", requirements.default_build_tools), "Android SDK Build Tools")
        .await?;
    let ndk_version = inputs.ndk_version.as_deref().unwrap_or(requirements.default_ndk);
    let ndk = resolver.install(&format!("ndk;{}", ndk_version), "Android NDK").await?;
    resolver.install(PLATFORM_TOOLS_PACKAGE, "Android SDK Platform Tools").await?;

    let installed_version = |path: &str, prefix: &str| path.strip_prefix(prefix).unwrap_or(path).to_string();
    let ndk_version = installed_version(&ndk.path, "ndk;");
    let ndk_path = ndk
        .install_dir(sdk)
        .unwrap_or_else(|| sdk.join("ndk").join(&ndk_version));
    debug!("Using NDK {} at {}", ndk_version, ndk_path.display());

    Ok(SdkPackages {
        ndk_path,
        ndk_version,
        build_tools_version: installed_version(&build_tools.path, "build-tools;"),
    })
}

/// Deploy command options
#[derive(Args, Debug, Clone)]
pub struct DeployCommand {
    /// Folder of a generated project
    #[arg(long)]
    pub build_dir: PathBuf,

    #[arg(long, default_value = "profile", value_name = "debug|profile|release")]
    pub configuration: BuildConfiguration,

    /// Comma separated device serials
    #[arg(long)]
    pub device_id_filter: Option<String>,

    #[arg(long, default_value = "BOTH", value_name = "APK|ASSETS|BOTH")]
    pub deployment_type: DeploymentType,

    /// Uninstall and push everything again
    #[arg(long)]
    pub clean: bool,
}

impl DeployCommand {
    pub async fn execute(&self) -> Result<()> {
        Ok(self.deploy().await?)
    }

    async fn deploy(&self) -> lydroid_core::Result<()> {
        let plan = DeploymentPlan::new(&self.build_dir, self.configuration, self.deployment_type, self.clean)?;
        let settings = PlatformSettings::load(&self.build_dir)?;

        let runner = SystemRunner;
        let mut adb = AdbTool::new(&settings.android_sdk_path, &runner)?;
        adb.connect(self.device_id_filter.as_deref()).await?;
        let result = Deployer::new(&adb, &plan).run().await;
        adb.disconnect().await;

        let report = result?.into_result()?;
        info!(
            "{} deployed to {} device(s)",
            plan.deployment_type,
            report.devices.len()
        );
        Ok(())
    }
}

/// Launch-test command options
#[derive(Args, Debug, Clone)]
pub struct LaunchTestCommand {
    /// Folder of a generated unit-test project
    #[arg(long)]
    pub build_dir: PathBuf,

    /// Modules to run; all registered modules when empty
    #[arg(value_name = "TEST_MODULE")]
    pub test_modules: Vec<String>,

    #[arg(long)]
    pub device_serial: Option<String>,

    /// Seconds each module may run, -1 for no limit
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub timeout: i64,

    /// gtest filter passed to every module
    #[arg(long)]
    pub test_filter: Option<String>,

    /// Build configuration whose module registry is read
    #[arg(long, default_value = "profile", value_name = "debug|profile|release")]
    pub configuration: BuildConfiguration,
}

impl LaunchTestCommand {
    pub fn options(&self) -> LaunchOptions {
        LaunchOptions {
            modules: self.test_modules.clone(),
            test_filter: self.test_filter.clone().filter(|f| !f.is_empty()),
            timeout: u64::try_from(self.timeout).ok().filter(|t| *t > 0).map(Duration::from_secs),
        }
    }

    pub async fn execute(&self) -> Result<()> {
        Ok(self.launch().await?)
    }

    async fn launch(&self) -> lydroid_core::Result<()> {
        if !self.build_dir.is_dir() {
            return Err(DeployError::BuildDirNotFound(self.build_dir.clone()).into());
        }
        let settings = PlatformSettings::load(&self.build_dir)?;

        let runner = SystemRunner;
        let mut adb = AdbTool::new(&settings.android_sdk_path, &runner)?;
        adb.connect(self.device_serial.as_deref()).await?;
        let result: std::result::Result<Vec<ModuleResult>, DeployError> = async {
            let launcher = TestLauncher::new(&adb, &self.build_dir, self.configuration)?;
            launcher.run(&self.options()).await
        }
        .await;
        adb.disconnect().await;

        let results = result?;
        println!("{}", format_results(&results));
        let failed = results.iter().filter(|r| !r.outcome.passed()).count();
        if failed > 0 {
            return Err(LyDroidError::generic(format!(
                "{} of {} test module(s) failed",
                failed,
                results.len()
            )));
        }
        Ok(())
    }
}

/// Devices command options
#[derive(Args, Debug, Clone)]
pub struct DevicesCommand {
    #[arg(long, env = ANDROID_SDK_ENV)]
    pub android_sdk_path: Option<PathBuf>,
}

impl DevicesCommand {
    pub async fn execute(&self, user: &UserConfig) -> Result<()> {
        Ok(self.list(user).await?)
    }

    async fn list(&self, user: &UserConfig) -> lydroid_core::Result<()> {
        let sdk = resolve_sdk_path(self.android_sdk_path.as_deref(), user)?;
        let runner = SystemRunner;
        let mut adb = AdbTool::new(&sdk, &runner)?;
        adb.connect(None).await?;
        let devices = adb.list_all().await;
        adb.disconnect().await;

        let devices = devices?;
        if devices.is_empty() {
            println!("No devices attached");
        }
        for device in devices {
            println!("{}\t{}", device.serial, device.state.as_str());
        }
        Ok(())
    }
}
