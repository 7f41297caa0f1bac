//! ADB (Android Debug Bridge) wrapper
//!
//! [`AdbTool`] owns the adb server for the duration of a command: `connect`
//! starts it, `disconnect` stops it. Calls are serialized. The device filter is a
//! comma separated list of serials; with a single serial every call is scoped to
//! it with `-s`.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use lydroid_core::{CommandRunner, CommandSpec, ExecOutput, LyDroidError};

use crate::device::{parse_device_list, Device, DeviceState};

/// ADB errors
#[derive(Debug, thiserror::Error)]
pub enum AdbError {
    #[error("Invalid Android SDK path '{0}': Unable to locate adb")]
    NotFound(PathBuf),
    #[error("Adb connection already started")]
    AlreadyConnected,
    #[error("Invalid device serial {serial}. The current connected device serial ids are : {}", available.join(","))]
    InvalidDevice { serial: String, available: Vec<String> },
    #[error("adb {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<AdbError> for LyDroidError {
    fn from(err: AdbError) -> Self {
        match err {
            AdbError::NotFound(_) => LyDroidError::FileNotFound(err.to_string()),
            AdbError::InvalidDevice { .. } => LyDroidError::InvalidArgument(err.to_string()),
            AdbError::Io(e) => LyDroidError::Io(e),
            other => LyDroidError::Generic(other.to_string()),
        }
    }
}

/// Location of adb under an SDK root
pub fn adb_path(sdk_root: &Path) -> PathBuf {
    let exe = if cfg!(windows) { "adb.exe" } else { "adb" };
    sdk_root.join("platform-tools").join(exe)
}

/// adb command-line wrapper
pub struct AdbTool<R> {
    adb: PathBuf,
    runner: R,
    connected: bool,
    device_filter: Vec<String>,
    gate: Mutex<()>,
}

impl<R: CommandRunner> AdbTool<R> {
    /// Create a wrapper for the adb in `<sdk_root>/platform-tools`
    pub fn new(sdk_root: &Path, runner: R) -> Result<Self, AdbError> {
        let adb = adb_path(sdk_root);
        if !adb.is_file() {
            return Err(AdbError::NotFound(sdk_root.to_path_buf()));
        }
        Ok(Self {
            adb,
            runner,
            connected: false,
            device_filter: Vec::new(),
            gate: Mutex::new(()),
        })
    }

    pub fn device_filter(&self) -> &[String] {
        &self.device_filter
    }

    /// Serial every call is scoped to, when the filter names exactly one device
    fn scoped_serial(&self) -> Option<&str> {
        match self.device_filter.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn spec(&self, serial: Option<&str>, args: &[&str]) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.adb);
        if let Some(serial) = serial {
            spec = spec.arg("-s").arg(serial);
        }
        spec.args(args.iter().copied())
    }

    async fn run(&self, serial: Option<&str>, args: &[&str]) -> Result<ExecOutput, AdbError> {
        let _guard = self.gate.lock().await;
        let spec = self.spec(serial, args);
        debug!("adb {:?}", spec.args);
        Ok(self.runner.output(&spec).await?)
    }

    async fn run_checked(&self, serial: Option<&str>, args: &[&str]) -> Result<String, AdbError> {
        let output = self.run(serial, args).await?;
        if !output.success() {
            return Err(AdbError::CommandFailed {
                command: args.join(" "),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    /// Start the adb server and, with a filter, check every serial is attached
    pub async fn connect(&mut self, device_filter: Option<&str>) -> Result<(), AdbError> {
        if self.connected {
            return Err(AdbError::AlreadyConnected);
        }
        self.run_checked(None, &["start-server"]).await?;
        self.connected = true;

        let requested: Vec<String> = device_filter
            .into_iter()
            .flat_map(|f| f.split(','))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if requested.is_empty() {
            return Ok(());
        }

        let available: Vec<String> = match self.devices().await {
            Ok(devices) => devices.into_iter().map(|d| d.serial).collect(),
            Err(e) => {
                self.disconnect().await;
                return Err(e);
            }
        };
        if let Some(missing) = requested.iter().find(|s| !available.contains(s)) {
            let serial = missing.clone();
            self.disconnect().await;
            return Err(AdbError::InvalidDevice { serial, available });
        }
        self.device_filter = requested;
        Ok(())
    }

    /// Stop the adb server. Failures are logged since this runs on error paths too.
    pub async fn disconnect(&mut self) {
        if let Err(e) = self.run_checked(None, &["kill-server"]).await {
            warn!("Unable to stop the adb server: {}", e);
        }
        self.connected = false;
        self.device_filter.clear();
    }

    /// Every attached device with its state
    pub async fn list_all(&self) -> Result<Vec<Device>, AdbError> {
        let output = self.run_checked(None, &["devices"]).await?;
        Ok(parse_device_list(&output))
    }

    /// Devices that are online and authorized, restricted to the filter when one is set
    pub async fn devices(&self) -> Result<Vec<Device>, AdbError> {
        let mut usable = Vec::new();
        for device in self.list_all().await? {
            if !self.device_filter.is_empty() && !self.device_filter.contains(&device.serial) {
                continue;
            }
            match device.state {
                state if state.is_usable() => usable.push(device),
                DeviceState::Unauthorized => warn!(
                    "Device {} is not authorized for debugging. Accept the prompt on the device and try again",
                    device.serial
                ),
                other => debug!("Skipping device {} ({})", device.serial, other),
            }
        }
        Ok(usable)
    }

    /// Run adb with `args`, returning stdout. A non-zero exit is an error.
    pub async fn exec(&self, args: &[&str]) -> Result<String, AdbError> {
        self.run_checked(self.scoped_serial(), args).await
    }

    /// Run adb and return the raw result whatever the exit code
    pub async fn exec_output(&self, args: &[&str]) -> Result<ExecOutput, AdbError> {
        self.run(self.scoped_serial(), args).await
    }

    /// Start adb and stream its stdout
    pub async fn popen(&self, args: &[&str]) -> Result<R::Lines, AdbError> {
        let _guard = self.gate.lock().await;
        let spec = self.spec(self.scoped_serial(), args);
        debug!("adb (streaming) {:?}", spec.args);
        Ok(self.runner.spawn_lines(&spec).await?)
    }

    /// Calls scoped to `serial`, whatever the connect filter is
    pub fn device<'a>(&'a self, serial: &'a str) -> DeviceHandle<'a, R> {
        DeviceHandle { adb: self, serial }
    }
}

/// adb calls bound to one device serial
pub struct DeviceHandle<'a, R> {
    adb: &'a AdbTool<R>,
    serial: &'a str,
}

impl<'a, R: CommandRunner> DeviceHandle<'a, R> {
    pub fn serial(&self) -> &str {
        self.serial
    }

    pub async fn exec(&self, args: &[&str]) -> Result<String, AdbError> {
        self.adb.run_checked(Some(self.serial), args).await
    }

    pub async fn exec_output(&self, args: &[&str]) -> Result<ExecOutput, AdbError> {
        self.adb.run(Some(self.serial), args).await
    }

    /// `adb shell <args>`, stdout on success
    pub async fn shell(&self, args: &[&str]) -> Result<String, AdbError> {
        let mut full = vec!["shell"];
        full.extend_from_slice(args);
        self.exec(&full).await
    }

    /// `adb shell <args>` without failing on a non-zero exit
    pub async fn shell_output(&self, args: &[&str]) -> Result<ExecOutput, AdbError> {
        let mut full = vec!["shell"];
        full.extend_from_slice(args);
        self.exec_output(&full).await
    }

    /// Best-effort shell call, failures are logged
    pub async fn shell_quiet(&self, args: &[&str]) {
        match self.shell_output(args).await {
            Ok(output) if output.success() => {}
            Ok(output) => debug!(
                "adb -s {} shell {} exited with {:?}: {}",
                self.serial,
                args.join(" "),
                output.code,
                output.stderr.trim()
            ),
            Err(e) => warn!("adb -s {} shell {} failed: {}", self.serial, args.join(" "), e),
        }
    }

    pub async fn push(&self, local: &Path, remote: &str) -> Result<(), AdbError> {
        let local = local.to_string_lossy();
        self.exec(&["push", &local, remote]).await.map(|_| ())
    }

    pub async fn popen(&self, args: &[&str]) -> Result<R::Lines, AdbError> {
        let _guard = self.adb.gate.lock().await;
        let spec = self.adb.spec(Some(self.serial), args);
        debug!("adb (streaming) {:?}", spec.args);
        Ok(self.adb.runner.spawn_lines(&spec).await?)
    }
}
