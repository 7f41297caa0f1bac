//! On-device unit test launching
//!
//! Each module is run by starting the test-runner activity with the module name
//! as an extra, then following the runner's `LMBR` log output by pid until it
//! reports `[SUCCESS]` or `[FAILURE]`, the process goes away, or the timeout
//! expires.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use lydroid_core::{BuildConfiguration, CommandRunner, LineStream, PlatformSettings, TEST_RUNNER_PROJECT};

use crate::adb::{AdbTool, DeviceHandle};
use crate::deployer::LOG_BUFFER_SIZE;
use crate::logcat::{engine_payload, TestMarker, ENGINE_LOG_TAG};
use crate::planner::resolve_package_name;
use crate::DeployError;

pub const UNIT_TEST_MODULES_FILE: &str = "unit_test_modules.json";

/// Argument value that tells the runner to execute a module's tests
const RUN_UNIT_TESTS: &str = "AzRunUnitTests";

const PID_ATTEMPTS: usize = 5;
const PID_RETRY_DELAY: Duration = Duration::from_secs(1);
/// How long a read may block before the process is probed again
const PROBE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Empty runs every registered module
    pub modules: Vec<String>,
    pub test_filter: Option<String>,
    /// `None` waits for as long as the runner keeps running
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOutcome {
    Passed,
    Failed,
    TimedOut,
    /// The runner went away before reporting
    Exited,
    /// No runner process appeared after launch
    NotStarted,
}

impl TestOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, TestOutcome::Passed)
    }

    pub fn label(&self) -> &'static str {
        if self.passed() {
            "PASSED"
        } else {
            "FAILED"
        }
    }
}

impl From<TestMarker> for TestOutcome {
    fn from(marker: TestMarker) -> Self {
        match marker {
            TestMarker::Success => TestOutcome::Passed,
            TestMarker::Failure => TestOutcome::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleResult {
    pub module: String,
    pub outcome: TestOutcome,
}

/// `<build>/app/build/intermediates/cmake/<config>/obj/arm64-v8a/<config>/unit_test_modules.json`
pub fn registry_path(build_dir: &Path, configuration: BuildConfiguration) -> PathBuf {
    let config = configuration.lower();
    build_dir
        .join("app")
        .join("build")
        .join("intermediates")
        .join("cmake")
        .join(config)
        .join("obj")
        .join("arm64-v8a")
        .join(config)
        .join(UNIT_TEST_MODULES_FILE)
}

/// Module names in `{"Amazon": {"<target>": {"Modules": [...]}}}`, in file order
pub fn read_registry(path: &Path) -> Result<Vec<String>, DeployError> {
    if !path.is_file() {
        return Err(DeployError::RegistryNotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    let root: Value =
        serde_json::from_str(&text).map_err(|e| DeployError::InvalidRegistry(path.to_path_buf(), e.to_string()))?;
    let targets = root
        .get("Amazon")
        .and_then(Value::as_object)
        .ok_or_else(|| DeployError::InvalidRegistry(path.to_path_buf(), "missing 'Amazon' section".into()))?;

    let mut modules = Vec::new();
    for (target, entry) in targets {
        let Some(names) = entry.get("Modules").and_then(Value::as_array) else {
            warn!("Test target {} lists no modules", target);
            continue;
        };
        for name in names.iter().filter_map(Value::as_str) {
            if !modules.iter().any(|m| m == name) {
                modules.push(name.to_string());
            }
        }
    }
    Ok(modules)
}

/// Right-padded PASSED/FAILED table
pub fn format_results(results: &[ModuleResult]) -> String {
    let width = results.iter().map(|r| r.module.len()).max().unwrap_or(0);
    let mut table = String::new();
    for result in results {
        table.push_str(&format!("{:<width$} : {}\n", result.module, result.outcome.label(), width = width));
    }
    table
}

/// Runs unit test modules through the test-runner activity
pub struct TestLauncher<'a, R> {
    adb: &'a AdbTool<R>,
    package: String,
    activity: String,
    registry: Vec<String>,
}

impl<'a, R: CommandRunner> TestLauncher<'a, R> {
    /// Prepare a launcher for a unit-test build directory
    pub fn new(adb: &'a AdbTool<R>, build_dir: &Path, configuration: BuildConfiguration) -> Result<Self, DeployError> {
        if !build_dir.is_dir() {
            return Err(DeployError::BuildDirNotFound(build_dir.to_path_buf()));
        }
        let settings = PlatformSettings::load(build_dir)?;
        if !settings.is_unit_test {
            return Err(DeployError::NotUnitTest(build_dir.to_path_buf()));
        }
        let package = resolve_package_name(build_dir, &settings)?;
        let registry = read_registry(&registry_path(build_dir, configuration))?;
        Ok(Self {
            adb,
            package,
            activity: format!("{}Activity", TEST_RUNNER_PROJECT),
            registry,
        })
    }

    fn select_modules(&self, requested: &[String]) -> Result<Vec<String>, DeployError> {
        if requested.is_empty() {
            return Ok(self.registry.clone());
        }
        let unknown: Vec<String> = requested.iter().filter(|m| !self.registry.contains(m)).cloned().collect();
        if !unknown.is_empty() {
            return Err(DeployError::UnknownModules {
                requested: unknown,
                available: self.registry.clone(),
            });
        }
        Ok(requested.to_vec())
    }

    /// Run the selected modules one after another on the first usable device
    pub async fn run(&self, options: &LaunchOptions) -> Result<Vec<ModuleResult>, DeployError> {
        let modules = self.select_modules(&options.modules)?;
        let devices = self.adb.devices().await?;
        let Some(device) = devices.first() else {
            return Err(DeployError::NoDevices);
        };
        if devices.len() > 1 {
            warn!("Multiple devices connected, running tests on {}", device.serial);
        }
        let device = self.adb.device(&device.serial);

        if let Err(e) = device.exec(&["logcat", "-G", LOG_BUFFER_SIZE]).await {
            warn!("Unable to resize the log buffer on {}: {}", device.serial(), e);
        }

        let mut results = Vec::with_capacity(modules.len());
        for module in modules {
            let outcome = self.run_module(&device, &module, options).await?;
            info!("{}: {}", module, outcome.label());
            results.push(ModuleResult { module, outcome });
        }
        Ok(results)
    }

    async fn run_module(
        &self,
        device: &DeviceHandle<'_, R>,
        module: &str,
        options: &LaunchOptions,
    ) -> Result<TestOutcome, DeployError> {
        info!("Launching unit tests for {}", module);
        device.shell_quiet(&["pm", "clear", &self.package]).await;

        let component = format!("{}/.{}", self.package, self.activity);
        let mut args = vec!["am", "start", "-n", component.as_str(), "--es", module, RUN_UNIT_TESTS, "--es", "startdelay", "1"];
        if let Some(filter) = options.test_filter.as_deref() {
            args.extend(["--es", "gtest_filter", filter]);
        }
        device.shell(&args).await?;

        let outcome = match self.resolve_pid(device).await {
            Some(pid) => self.follow_log(device, &pid, options.timeout).await?,
            None => {
                warn!("Unable to find a running {} process", self.package);
                TestOutcome::NotStarted
            }
        };

        device.shell_quiet(&["am", "force-stop", &self.package]).await;
        if let Err(e) = device.exec(&["logcat", "-c"]).await {
            warn!("Unable to clear the log buffer on {}: {}", device.serial(), e);
        }
        Ok(outcome)
    }

    async fn current_pid(&self, device: &DeviceHandle<'_, R>) -> Option<String> {
        let output = device.shell_output(&["pidof", "-s", &self.package]).await.ok()?;
        let pid = output.stdout.trim();
        (output.success() && !pid.is_empty() && pid.chars().all(|c| c.is_ascii_digit())).then(|| pid.to_string())
    }

    async fn resolve_pid(&self, device: &DeviceHandle<'_, R>) -> Option<String> {
        for attempt in 1..=PID_ATTEMPTS {
            if let Some(pid) = self.current_pid(device).await {
                debug!("{} is running as pid {}", self.package, pid);
                return Some(pid);
            }
            if attempt < PID_ATTEMPTS {
                tokio::time::sleep(PID_RETRY_DELAY).await;
            }
        }
        None
    }

    async fn follow_log(
        &self,
        device: &DeviceHandle<'_, R>,
        pid: &str,
        timeout: Option<Duration>,
    ) -> Result<TestOutcome, DeployError> {
        let pid_arg = format!("--pid={}", pid);
        let mut stream = device.popen(&["logcat", &pid_arg, "-s", ENGINE_LOG_TAG]).await?;
        let deadline = timeout.map(|t| Instant::now() + t);

        let outcome = loop {
            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        warn!("Timed out waiting for the test results");
                        break TestOutcome::TimedOut;
                    }
                    PROBE_INTERVAL.min(deadline - now)
                }
                None => PROBE_INTERVAL,
            };

            match tokio::time::timeout(wait, stream.next_line()).await {
                Ok(Ok(Some(line))) => {
                    let Some(payload) = engine_payload(&line) else {
                        continue;
                    };
                    println!("{}", payload);
                    if let Some(marker) = TestMarker::find(&payload) {
                        break marker.into();
                    }
                }
                Ok(Ok(None)) => break TestOutcome::Exited,
                Ok(Err(e)) => {
                    warn!("Lost the log stream: {}", e);
                    break TestOutcome::Exited;
                }
                Err(_) => {
                    if self.current_pid(device).await.as_deref() != Some(pid) {
                        warn!("{} exited before reporting a result", self.package);
                        break TestOutcome::Exited;
                    }
                }
            }
        };

        if let Err(e) = stream.terminate().await {
            debug!("Unable to stop logcat: {}", e);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::adb_path;
    use lydroid_core::testing::ScriptedRunner;
    use lydroid_core::AssetMode;

    const REGISTRY: &str = r#"{"Amazon": {"AzTestRunner": {"Modules": ["AzCore.Tests", "AzFramework.Tests"]}}}"#;
    const START: &str = "am start -n com.lumberyard.tests/.AzTestRunnerActivity";

    struct Fixture {
        _root: tempfile::TempDir,
        sdk: PathBuf,
        build: PathBuf,
    }

    fn fixture(unit_test: bool, registry: Option<&str>) -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let sdk = root.path().join("sdk");
        let adb = adb_path(&sdk);
        std::fs::create_dir_all(adb.parent().unwrap()).unwrap();
        std::fs::write(&adb, "").unwrap();

        let build = root.path().join("build");
        std::fs::create_dir_all(&build).unwrap();
        PlatformSettings {
            platform: "android".into(),
            game_projects: vec![],
            asset_deploy_mode: if unit_test { None } else { Some(AssetMode::Loose) },
            asset_deploy_type: "android".into(),
            android_sdk_path: sdk.clone(),
            embed_assets_in_apk: true,
            is_unit_test: unit_test,
            android_gradle_plugin: "8.1.0".into(),
        }
        .store(&build)
        .unwrap();
        if let Some(registry) = registry {
            let path = registry_path(&build, BuildConfiguration::Profile);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, registry).unwrap();
        }
        Fixture { _root: root, sdk, build }
    }

    fn runner() -> ScriptedRunner {
        let runner = ScriptedRunner::new();
        runner.ok("adb devices", "List of devices attached\nDEV_A\tdevice\n");
        runner.ok("pidof -s com.lumberyard.tests", "4321\n");
        runner
    }

    #[test]
    fn test_registry_and_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(UNIT_TEST_MODULES_FILE);
        assert!(matches!(read_registry(&path), Err(DeployError::RegistryNotFound(_))));
        std::fs::write(&path, REGISTRY).unwrap();
        assert_eq!(read_registry(&path).unwrap(), vec!["AzCore.Tests", "AzFramework.Tests"]);

        let table = format_results(&[
            ModuleResult { module: "AzCore.Tests".into(), outcome: TestOutcome::Passed },
            ModuleResult { module: "Gem.Tests".into(), outcome: TestOutcome::TimedOut },
        ]);
        assert_eq!(table, "AzCore.Tests : PASSED\nGem.Tests    : FAILED\n");
    }

    #[tokio::test]
    async fn test_run_success() {
        let fx = fixture(true, Some(REGISTRY));
        let runner = runner();
        runner.stream(
            "logcat --pid=4321 -s LMBR",
            &[
                "--------- beginning of main",
                "10-16 09:41:02.517  4321  4350 I LMBR    : [==========] Running 12 tests",
                "10-16 09:41:03.101  4321  4350 I LMBR    : [SUCCESS]",
            ],
            true,
        );
        let adb = AdbTool::new(&fx.sdk, &runner).unwrap();
        let launcher = TestLauncher::new(&adb, &fx.build, BuildConfiguration::Profile).unwrap();
        let options = LaunchOptions {
            modules: vec!["AzCore.Tests".into()],
            test_filter: Some("Math*".into()),
            timeout: None,
        };

        let results = launcher.run(&options).await.unwrap();
        assert_eq!(results, vec![ModuleResult { module: "AzCore.Tests".into(), outcome: TestOutcome::Passed }]);

        let calls = runner.calls();
        let position = |needle: &str| calls.iter().position(|c| c.contains(needle)).unwrap();
        assert!(position("pm clear com.lumberyard.tests") < position(START));
        assert!(calls[position(START)].ends_with(
            "--es AzCore.Tests AzRunUnitTests --es startdelay 1 --es gtest_filter Math*"
        ));
        assert!(position("am force-stop com.lumberyard.tests") < position("logcat -c"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_timeout() {
        let fx = fixture(true, Some(REGISTRY));
        let runner = runner();
        runner.stream("logcat --pid=4321", &["10-16 09:41:02.517  4321  4350 I LMBR    : [ RUN      ] Slow.Test"], true);
        let adb = AdbTool::new(&fx.sdk, &runner).unwrap();
        let launcher = TestLauncher::new(&adb, &fx.build, BuildConfiguration::Profile).unwrap();
        let options = LaunchOptions {
            modules: vec!["AzFramework.Tests".into()],
            timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        };

        let started = Instant::now();
        let results = launcher.run(&options).await.unwrap();
        assert_eq!(results[0].outcome, TestOutcome::TimedOut);
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(runner.count("pidof") > 1);
        assert_eq!(runner.count("am force-stop"), 1);
        assert_eq!(runner.count("logcat -c"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_process_exit_fails() {
        let fx = fixture(true, Some(REGISTRY));
        let runner = runner();
        runner.fail("pidof", 1, "");
        runner.ok_once("pidof", "4321\n");
        runner.stream("logcat --pid=4321", &[], true);
        let adb = AdbTool::new(&fx.sdk, &runner).unwrap();
        let launcher = TestLauncher::new(&adb, &fx.build, BuildConfiguration::Profile).unwrap();

        let options = LaunchOptions { modules: vec!["AzCore.Tests".into()], ..Default::default() };
        let results = launcher.run(&options).await.unwrap();
        assert_eq!(results[0].outcome, TestOutcome::Exited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pid_retried_then_not_started() {
        let fx = fixture(true, Some(REGISTRY));
        let runner = runner();
        runner.fail("pidof", 1, "");
        let adb = AdbTool::new(&fx.sdk, &runner).unwrap();
        let launcher = TestLauncher::new(&adb, &fx.build, BuildConfiguration::Profile).unwrap();

        let options = LaunchOptions { modules: vec!["AzCore.Tests".into()], ..Default::default() };
        let results = launcher.run(&options).await.unwrap();
        assert_eq!(results[0].outcome, TestOutcome::NotStarted);
        assert_eq!(runner.count("pidof"), PID_ATTEMPTS);
        assert_eq!(runner.count("logcat --pid"), 0);
    }

    #[tokio::test]
    async fn test_all_modules_and_unknown_module() {
        let fx = fixture(true, Some(REGISTRY));
        let runner = runner();
        runner.stream("logcat --pid=4321", &["E/LMBR    ( 4321): [FAILURE]"], false);
        let adb = AdbTool::new(&fx.sdk, &runner).unwrap();
        let launcher = TestLauncher::new(&adb, &fx.build, BuildConfiguration::Profile).unwrap();

        let results = launcher.run(&LaunchOptions::default()).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.outcome == TestOutcome::Failed));

        let options = LaunchOptions { modules: vec!["Missing.Tests".into()], ..Default::default() };
        let err = launcher.run(&options).await.unwrap_err();
        assert!(matches!(err, DeployError::UnknownModules { .. }));
        assert!(err.to_string().starts_with("Unknown test module(s): Missing.Tests"));
    }

    #[test]
    fn test_requires_unit_test_build_and_registry() {
        let runner = ScriptedRunner::new();

        let fx = fixture(false, Some(REGISTRY));
        let adb = AdbTool::new(&fx.sdk, &runner).unwrap();
        assert!(matches!(
            TestLauncher::new(&adb, &fx.build, BuildConfiguration::Profile),
            Err(DeployError::NotUnitTest(_))
        ));

        let fx = fixture(true, None);
        let adb = AdbTool::new(&fx.sdk, &runner).unwrap();
        assert!(matches!(
            TestLauncher::new(&adb, &fx.build, BuildConfiguration::Profile),
            Err(DeployError::RegistryNotFound(_))
        ));
    }
}
