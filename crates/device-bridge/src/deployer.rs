//! Per-device deployment
//!
//! For every usable device: find the storage root, install the APK, then push the
//! asset payload. A clean deploy (or a device with no readable timestamp marker)
//! pushes the whole tree; otherwise only files modified since the marker are
//! pushed. One device failing does not stop the others.

use std::collections::HashSet;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveDateTime};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use lydroid_core::CommandRunner;

use crate::adb::{AdbTool, DeviceHandle};
use crate::device::DeviceRecord;
use crate::planner::{DeploymentPlan, DEPLOY_TIMESTAMP_FILE};
use crate::storage::detect_storage_path;
use crate::DeployError;

/// Format of the `deploy.timestamp` marker
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Size the device log buffer is raised to
pub const LOG_BUFFER_SIZE: &str = "32M";

/// Source of the current local time
pub type Clock = Box<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Result of deploying to one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceOutcome {
    pub device: DeviceRecord,
    pub apk_installed: bool,
    /// Files or directories handed to `adb push`, not counting the marker
    pub pushes: usize,
    pub error: Option<String>,
}

impl DeviceOutcome {
    fn new(device: DeviceRecord) -> Self {
        Self { device, apk_installed: false, pushes: 0, error: None }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployReport {
    pub devices: Vec<DeviceOutcome>,
}

impl DeployReport {
    pub fn failed_serials(&self) -> Vec<String> {
        self.devices
            .iter()
            .filter(|d| !d.succeeded())
            .map(|d| d.device.serial.clone())
            .collect()
    }

    /// Error when any device failed
    pub fn into_result(self) -> Result<Self, DeployError> {
        let failed = self.failed_serials();
        if failed.is_empty() {
            Ok(self)
        } else {
            Err(DeployError::DeviceFailures(failed))
        }
    }
}

fn modified_local(time: SystemTime) -> NaiveDateTime {
    DateTime::<Local>::from(time).naive_local()
}

fn file_modified(path: &Path) -> Option<NaiveDateTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok().map(modified_local)
}

/// Deploys one plan to every connected device
pub struct Deployer<'a, R> {
    adb: &'a AdbTool<R>,
    plan: &'a DeploymentPlan,
    clock: Clock,
}

impl<'a, R: CommandRunner> Deployer<'a, R> {
    pub fn new(adb: &'a AdbTool<R>, plan: &'a DeploymentPlan) -> Self {
        Self {
            adb,
            plan,
            clock: Box::new(|| Local::now().naive_local()),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Deploy to every usable device
    pub async fn run(&self) -> Result<DeployReport, DeployError> {
        let devices = self.adb.devices().await?;
        if devices.is_empty() {
            return Err(DeployError::NoDevices);
        }

        let mut report = DeployReport::default();
        for device in &devices {
            let mut outcome = DeviceOutcome::new(DeviceRecord::from(device));
            let handle = self.adb.device(&device.serial);
            info!("Deploying {} to device {}", self.plan.project_name, device.serial);
            if let Err(e) = self.deploy_device(&handle, &mut outcome).await {
                error!("Deployment to {} failed: {}", device.serial, e);
                outcome.error = Some(e.to_string());
            } else {
                info!("Deployment to {} complete", device.serial);
            }
            report.devices.push(outcome);
        }
        Ok(report)
    }

    async fn deploy_device(&self, device: &DeviceHandle<'_, R>, outcome: &mut DeviceOutcome) -> Result<(), DeployError> {
        let Some(storage) = detect_storage_path(device).await else {
            return Err(DeployError::Core(lydroid_core::LyDroidError::generic(format!(
                "Unable to detect a storage path on device {}",
                device.serial()
            ))));
        };
        outcome.device.storage_path = Some(storage.clone());

        let target = self.plan.device_asset_path(&storage);
        let remote_timestamp = format!("{}/{}", target, DEPLOY_TIMESTAMP_FILE);
        let device_timestamp = if self.plan.clean {
            None
        } else {
            self.read_device_timestamp(device, &remote_timestamp).await
        };

        if self.plan.deployment_type.includes_apk() {
            outcome.apk_installed = self.install_apk(device, device_timestamp).await?;
        }

        if self.plan.deployment_type.includes_assets() {
            if let Some(parent) = target.rsplit_once('/').map(|(p, _)| p) {
                device.shell_quiet(&["mkdir", "-p", parent]).await;
            }
            device.shell_quiet(&["mkdir", "-p", &target]).await;

            outcome.pushes = match device_timestamp {
                Some(since) => self.push_modified(device, &target, since).await?,
                None => self.push_all(device, &target).await?,
            };

            let now = (self.clock)();
            let local_timestamp = self.plan.local_timestamp_path();
            std::fs::write(&local_timestamp, now.format(TIMESTAMP_FORMAT).to_string())?;
            device.push(&local_timestamp, &remote_timestamp).await?;
        }

        if let Err(e) = device.exec(&["logcat", "-G", LOG_BUFFER_SIZE]).await {
            warn!("Unable to resize the log buffer on {}: {}", device.serial(), e);
        }
        Ok(())
    }

    async fn read_device_timestamp(&self, device: &DeviceHandle<'_, R>, remote: &str) -> Option<NaiveDateTime> {
        let output = device.shell_output(&["cat", remote]).await.ok()?;
        if !output.success() {
            debug!("No deployment timestamp on {}", device.serial());
            return None;
        }
        match NaiveDateTime::parse_from_str(output.stdout.trim(), TIMESTAMP_FORMAT) {
            Ok(stamp) => Some(stamp),
            Err(e) => {
                debug!("Ignoring unreadable timestamp '{}' on {}: {}", output.stdout.trim(), device.serial(), e);
                None
            }
        }
    }

    async fn is_installed(&self, device: &DeviceHandle<'_, R>) -> Result<bool, DeployError> {
        let listing = device.shell(&["pm", "list", "packages", &self.plan.package_name]).await?;
        let expected = format!("package:{}", self.plan.package_name);
        Ok(listing.lines().any(|l| l.trim() == expected))
    }

    /// Returns whether the APK was (re)installed
    async fn install_apk(&self, device: &DeviceHandle<'_, R>, device_timestamp: Option<NaiveDateTime>) -> Result<bool, DeployError> {
        let package = &self.plan.package_name;
        let installed = self.is_installed(device).await?;

        if installed && self.plan.clean {
            info!("Uninstalling {} from {}", package, device.serial());
            device.shell(&["pm", "uninstall", package]).await?;
        } else if installed {
            if let (Some(since), Some(apk_time)) = (device_timestamp, file_modified(&self.plan.apk_path)) {
                if apk_time < since {
                    info!("{} on {} is up to date", package, device.serial());
                    return Ok(false);
                }
            }
        }

        info!("Installing {} on {}", self.plan.apk_path.display(), device.serial());
        let apk = self.plan.apk_path.to_string_lossy();
        let output = device.exec(&["install", "-t", "-r", &apk]).await?;
        if output.contains("Failure") {
            return Err(DeployError::Core(lydroid_core::LyDroidError::generic(format!(
                "Unable to install {} on {}: {}",
                self.plan.apk_path.display(),
                device.serial(),
                output.trim()
            ))));
        }
        Ok(true)
    }

    async fn push_all(&self, device: &DeviceHandle<'_, R>, target: &str) -> Result<usize, DeployError> {
        if self.plan.clean {
            device.shell_quiet(&["rm", "-rf", target]).await;
            device.shell_quiet(&["mkdir", "-p", target]).await;
        }
        info!("Pushing {} to {}", self.plan.local_asset_path.display(), target);
        if let Err(e) = device.push(&self.plan.local_asset_path.join("."), target).await {
            device.shell_quiet(&["rm", "-rf", target]).await;
            return Err(e.into());
        }
        Ok(1)
    }

    async fn push_modified(&self, device: &DeviceHandle<'_, R>, target: &str, since: NaiveDateTime) -> Result<usize, DeployError> {
        let root = &self.plan.local_asset_path;
        let mut created: HashSet<String> = HashSet::new();
        let mut pushed = 0;

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| DeployError::Io(e.into()))?;
            if !entry.file_type().is_file() || entry.file_name() == DEPLOY_TIMESTAMP_FILE {
                continue;
            }
            let Some(modified) = file_modified(entry.path()) else {
                continue;
            };
            if modified < since {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let relative: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            let remote = format!("{}/{}", target, relative.join("/"));

            if relative.len() > 1 {
                let remote_dir = format!("{}/{}", target, relative[..relative.len() - 1].join("/"));
                if created.insert(remote_dir.clone()) {
                    device.shell_quiet(&["mkdir", "-p", &remote_dir]).await;
                }
            }

            debug!("Pushing modified {}", entry.path().display());
            device.push(entry.path(), &remote).await?;
            pushed += 1;
        }

        info!("Pushed {} modified file(s) to {}", pushed, device.serial());
        Ok(pushed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::adb_path;
    use lydroid_core::testing::{ScriptedLines, ScriptedRunner};
    use lydroid_core::{AssetMode, BuildConfiguration, CommandSpec, DeploymentType, ExecOutput, PlatformSettings};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const DEVICES: &str = "List of devices attached\nDEV_A\tdevice\nDEV_B\tdevice\n";

    /// Scripted adb that remembers the pushed timestamp marker and the installed package
    #[derive(Default)]
    struct FakeDevice {
        inner: ScriptedRunner,
        timestamp: Mutex<Option<String>>,
        installed: Mutex<bool>,
    }

    impl CommandRunner for FakeDevice {
        type Lines = ScriptedLines;

        async fn output(&self, spec: &CommandSpec) -> std::io::Result<ExecOutput> {
            let output = self.inner.output(spec).await?;
            let line = spec.display_line();
            if line.contains(" push ") && line.ends_with(DEPLOY_TIMESTAMP_FILE) && output.success() {
                let local = &spec.args[spec.args.len() - 2];
                *self.timestamp.lock().unwrap() = std::fs::read_to_string(local).ok();
            } else if line.contains(" cat ") && line.ends_with(DEPLOY_TIMESTAMP_FILE) {
                return Ok(match self.timestamp.lock().unwrap().clone() {
                    Some(stamp) => ExecOutput { code: Some(0), stdout: stamp, stderr: String::new() },
                    None => ExecOutput { code: Some(1), stdout: String::new(), stderr: "No such file or directory".into() },
                });
            } else if line.contains("pm list packages") {
                let stdout = if *self.installed.lock().unwrap() { "package:org.o3de.jack\n" } else { "" };
                return Ok(ExecOutput { code: Some(0), stdout: stdout.into(), stderr: String::new() });
            } else if line.contains(" install ") && output.success() {
                *self.installed.lock().unwrap() = true;
            } else if line.contains("pm uninstall") {
                *self.installed.lock().unwrap() = false;
            }
            Ok(output)
        }

        async fn spawn_lines(&self, spec: &CommandSpec) -> std::io::Result<ScriptedLines> {
            self.inner.spawn_lines(spec).await
        }
    }

    struct Fixture {
        _root: tempfile::TempDir,
        sdk: PathBuf,
        build: PathBuf,
        base: SystemTime,
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        std::fs::File::options().write(true).open(path).unwrap().set_modified(time).unwrap();
    }

    fn fixture() -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let sdk = root.path().join("sdk");
        let adb = adb_path(&sdk);
        std::fs::create_dir_all(adb.parent().unwrap()).unwrap();
        std::fs::write(&adb, "").unwrap();

        let project = root.path().join("Jack");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(project.join("project.json"), r#"{"project_name": "Jack"}"#).unwrap();

        let build = root.path().join("build");
        std::fs::create_dir_all(build.join("app/src/main")).unwrap();
        std::fs::write(
            build.join("app/src/main/AndroidManifest.xml"),
            r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="org.o3de.jack"/>"#,
        )
        .unwrap();
        PlatformSettings {
            platform: "android".into(),
            game_projects: vec![project],
            asset_deploy_mode: Some(AssetMode::Loose),
            asset_deploy_type: "android".into(),
            android_sdk_path: sdk.clone(),
            embed_assets_in_apk: false,
            is_unit_test: false,
            android_gradle_plugin: "8.1.0".into(),
        }
        .store(&build)
        .unwrap();

        let base = SystemTime::now() - Duration::from_secs(10 * 24 * 3600);
        let apk = crate::planner::apk_path(&build, BuildConfiguration::Profile);
        std::fs::create_dir_all(apk.parent().unwrap()).unwrap();
        std::fs::write(&apk, "apk").unwrap();
        set_mtime(&apk, base);

        let assets = build.join("app/src/assets");
        for file in ["engine.json", "levels/main.spawnable", "levels/sky.dds"] {
            let path = assets.join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, file).unwrap();
            set_mtime(&path, base);
        }

        Fixture { _root: root, sdk, build, base }
    }

    /// A clock that advances one hour from `base` on every read
    fn stepping_clock(base: SystemTime) -> impl Fn() -> NaiveDateTime + Send + Sync + 'static {
        let start = modified_local(base);
        let step = Arc::new(AtomicI64::new(0));
        move || start + chrono::Duration::hours(step.fetch_add(1, Ordering::SeqCst) + 1)
    }

    #[tokio::test]
    async fn test_clean_deploy_to_filtered_device() {
        let fx = fixture();
        let runner = FakeDevice::default();
        runner.inner.ok("adb devices", DEVICES);
        runner.inner.ok("echo $EXTERNAL_STORAGE", "/sdcard\n");
        *runner.installed.lock().unwrap() = true;

        let mut adb = AdbTool::new(&fx.sdk, &runner).unwrap();
        adb.connect(Some("DEV_B")).await.unwrap();
        let plan = DeploymentPlan::new(&fx.build, BuildConfiguration::Profile, DeploymentType::Both, true).unwrap();
        let report = Deployer::new(&adb, &plan).run().await.unwrap().into_result().unwrap();
        adb.disconnect().await;

        assert_eq!(report.devices.len(), 1);
        let outcome = &report.devices[0];
        assert_eq!(outcome.device.serial, "DEV_B");
        assert_eq!(outcome.device.storage_path.as_deref(), Some("/sdcard"));
        assert!(outcome.apk_installed);

        let calls = runner.inner.calls();
        assert!(calls.iter().all(|c| !c.contains("DEV_A")));
        let target = "/sdcard/Android/data/org.o3de.jack/files";
        let position = |needle: &str| calls.iter().position(|c| c.contains(needle)).unwrap();
        assert!(position("pm uninstall org.o3de.jack") < position("install -t -r"));
        assert!(position(&format!("shell rm -rf {}", target)) < position(&format!("assets/. {}", target)));
        assert_eq!(runner.inner.count(&format!("push {}", fx.build.join("app/src/assets").join(".").display())), 1);
        assert!(runner.timestamp.lock().unwrap().is_some());
        assert!(fx.build.join(DEPLOY_TIMESTAMP_FILE).is_file());
        assert_eq!(runner.inner.count("logcat -G 32M"), 1);
    }

    #[tokio::test]
    async fn test_clean_then_incremental_pushes_each_file_once() {
        let fx = fixture();
        let runner = FakeDevice::default();
        runner.inner.ok("adb devices", "List of devices attached\nDEV_A\tdevice\n");
        runner.inner.ok("echo $EXTERNAL_STORAGE", "/sdcard\n");
        let adb = AdbTool::new(&fx.sdk, &runner).unwrap();
        let clock = Arc::new(stepping_clock(fx.base));
        let deploy = |clean: bool| {
            let clock = clock.clone();
            let plan = DeploymentPlan::new(&fx.build, BuildConfiguration::Profile, DeploymentType::Both, clean).unwrap();
            let adb = &adb;
            async move { Deployer::new(adb, &plan).with_clock(move || (*clock)()).run().await.unwrap() }
        };

        // clean at base+1h
        let report = deploy(true).await;
        assert_eq!(report.devices[0].pushes, 1);
        assert_eq!(runner.inner.count("install -t -r"), 1);

        // one asset touched after the first deploy, stamped base+2h
        let sky = fx.build.join("app/src/assets/levels/sky.dds");
        std::fs::write(&sky, "new sky").unwrap();
        set_mtime(&sky, fx.base + Duration::from_secs(90 * 60));
        let report = deploy(false).await;
        assert_eq!(report.devices[0].pushes, 1);
        assert!(!report.devices[0].apk_installed);
        assert_eq!(runner.inner.count("install -t -r"), 1);
        assert_eq!(runner.inner.count("levels/sky.dds"), 1);
        assert_eq!(runner.inner.count("shell mkdir -p /sdcard/Android/data/org.o3de.jack/files/levels"), 1);

        // nothing changed since base+2h
        let report = deploy(false).await;
        assert_eq!(report.devices[0].pushes, 0);
        assert_eq!(runner.inner.count("levels/sky.dds"), 1);
        assert_eq!(runner.inner.count("engine.json"), 0);
        assert_eq!(runner.inner.count("levels/main.spawnable"), 0);
    }

    #[tokio::test]
    async fn test_failed_push_rolls_back_and_other_devices_continue() {
        let fx = fixture();
        let runner = FakeDevice::default();
        runner.inner.ok("adb devices", DEVICES);
        runner.inner.ok("echo $EXTERNAL_STORAGE", "/sdcard\n");
        runner.inner.fail("-s DEV_A push", 1, "adb: error: connection reset");
        let adb = AdbTool::new(&fx.sdk, &runner).unwrap();

        let plan = DeploymentPlan::new(&fx.build, BuildConfiguration::Profile, DeploymentType::Assets, false).unwrap();
        let report = Deployer::new(&adb, &plan).run().await.unwrap();

        assert_eq!(report.failed_serials(), vec!["DEV_A".to_string()]);
        assert!(report.devices[1].succeeded());
        assert_eq!(runner.inner.count("-s DEV_A shell rm -rf /sdcard/Android/data/org.o3de.jack/files"), 1);
        assert_eq!(runner.inner.count("install"), 0);
        assert!(matches!(report.into_result(), Err(DeployError::DeviceFailures(_))));
    }

    #[tokio::test]
    async fn test_no_storage_skips_device() {
        let fx = fixture();
        let runner = FakeDevice::default();
        runner.inner.ok("adb devices", "List of devices attached\nDEV_A\tdevice\n");
        runner.inner.fail("shell ls", 1, "No such file or directory");
        let adb = AdbTool::new(&fx.sdk, &runner).unwrap();

        let plan = DeploymentPlan::new(&fx.build, BuildConfiguration::Profile, DeploymentType::Both, false).unwrap();
        let report = Deployer::new(&adb, &plan).run().await.unwrap();
        assert!(report.devices[0].error.as_deref().unwrap().contains("storage path"));
        assert_eq!(runner.inner.count("install"), 0);
    }

    #[tokio::test]
    async fn test_no_devices() {
        let fx = fixture();
        let runner = FakeDevice::default();
        runner.inner.ok("adb devices", "List of devices attached\n");
        let adb = AdbTool::new(&fx.sdk, &runner).unwrap();
        let plan = DeploymentPlan::new(&fx.build, BuildConfiguration::Profile, DeploymentType::Apk, false).unwrap();
        assert!(matches!(Deployer::new(&adb, &plan).run().await, Err(DeployError::NoDevices)));
    }
}
