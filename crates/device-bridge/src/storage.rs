//! External storage detection
//!
//! Finds a writable external storage root on a device: the `EXTERNAL_STORAGE`
//! variable first (as given, then resolved through `realpath`), then the mount
//! points devices commonly expose.

use tracing::{debug, warn};

use lydroid_core::CommandRunner;

use crate::adb::DeviceHandle;

/// Mount points probed when `EXTERNAL_STORAGE` is unusable
pub const KNOWN_STORAGE_PATHS: [&str; 5] = [
    "/sdcard/",
    "/storage/emulated/0/",
    "/storage/emulated/legacy/",
    "/storage/sdcard0/",
    "/storage/self/primary/",
];

async fn lists<R: CommandRunner>(device: &DeviceHandle<'_, R>, path: &str) -> bool {
    match device.shell_output(&["ls", path]).await {
        Ok(output) => output.success() && !output.stdout.contains("No such file or directory"),
        Err(e) => {
            debug!("ls {} on {} failed: {}", path, device.serial(), e);
            false
        }
    }
}

fn first_line(text: &str) -> Option<String> {
    text.lines().map(str::trim).find(|l| !l.is_empty()).map(str::to_string)
}

fn strip_trailing_slash(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Storage root of `device` without a trailing slash, or `None` when nothing lists
pub async fn detect_storage_path<R: CommandRunner>(device: &DeviceHandle<'_, R>) -> Option<String> {
    let external = match device.shell_output(&["echo", "$EXTERNAL_STORAGE"]).await {
        Ok(output) if output.success() => first_line(&output.stdout),
        _ => None,
    };

    if let Some(external) = external {
        if lists(device, &external).await {
            return Some(strip_trailing_slash(&external));
        }
        let resolved = match device.shell_output(&["realpath", &external]).await {
            Ok(output) if output.success() => first_line(&output.stdout),
            _ => None,
        };
        if let Some(resolved) = resolved {
            if lists(device, &resolved).await {
                return Some(strip_trailing_slash(&resolved));
            }
        }
        debug!("EXTERNAL_STORAGE {} is not readable on {}", external, device.serial());
    }

    for candidate in KNOWN_STORAGE_PATHS {
        if lists(device, candidate).await {
            return Some(strip_trailing_slash(candidate));
        }
    }

    warn!("Unable to detect a valid storage path on device {}", device.serial());
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::{adb_path, AdbTool};
    use lydroid_core::testing::ScriptedRunner;

    fn fake_sdk() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let adb = adb_path(dir.path());
        std::fs::create_dir_all(adb.parent().unwrap()).unwrap();
        std::fs::write(adb, "").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_external_storage_variable() {
        let sdk = fake_sdk();
        let runner = ScriptedRunner::new();
        runner.ok("echo $EXTERNAL_STORAGE", "/sdcard/\n");
        let adb = AdbTool::new(sdk.path(), &runner).unwrap();

        let path = detect_storage_path(&adb.device("DEV_A")).await;
        assert_eq!(path.as_deref(), Some("/sdcard"));
        assert_eq!(runner.count("realpath"), 0);
    }

    #[tokio::test]
    async fn test_realpath_fallback() {
        let sdk = fake_sdk();
        let runner = ScriptedRunner::new();
        runner.ok("echo $EXTERNAL_STORAGE", "/mnt/sdcard\n");
        runner.fail("ls /mnt/sdcard", 1, "ls: /mnt/sdcard: No such file or directory");
        runner.ok("realpath /mnt/sdcard", "/storage/emulated/0\n");
        let adb = AdbTool::new(sdk.path(), &runner).unwrap();

        let path = detect_storage_path(&adb.device("DEV_A")).await;
        assert_eq!(path.as_deref(), Some("/storage/emulated/0"));
    }

    #[tokio::test]
    async fn test_known_mounts_then_none() {
        let sdk = fake_sdk();
        let runner = ScriptedRunner::new();
        runner.ok("echo $EXTERNAL_STORAGE", "\n");
        runner.fail("shell ls", 1, "No such file or directory");
        runner.ok("ls /storage/sdcard0/", "Android\n");
        let adb = AdbTool::new(sdk.path(), &runner).unwrap();

        let path = detect_storage_path(&adb.device("DEV_A")).await;
        assert_eq!(path.as_deref(), Some("/storage/sdcard0"));

        let runner = ScriptedRunner::new();
        runner.fail("shell", 1, "error: closed");
        let adb = AdbTool::new(sdk.path(), &runner).unwrap();
        assert_eq!(detect_storage_path(&adb.device("DEV_A")).await, None);
    }
}
