//! Device Types and State
//!
//! Parses `adb devices` output into device records.

use std::fmt;

/// Connection state reported by `adb devices`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Online and authorized
    Online,
    Offline,
    /// Debugging not yet accepted on the device
    Unauthorized,
    Bootloader,
    Recovery,
    Sideload,
    Unknown,
}

impl DeviceState {
    pub fn parse(value: &str) -> Self {
        match value {
            "device" => DeviceState::Online,
            "offline" => DeviceState::Offline,
            "unauthorized" => DeviceState::Unauthorized,
            "bootloader" => DeviceState::Bootloader,
            "recovery" => DeviceState::Recovery,
            "sideload" => DeviceState::Sideload,
            _ => DeviceState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Online => "device",
            DeviceState::Offline => "offline",
            DeviceState::Unauthorized => "unauthorized",
            DeviceState::Bootloader => "bootloader",
            DeviceState::Recovery => "recovery",
            DeviceState::Sideload => "sideload",
            DeviceState::Unknown => "unknown",
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, DeviceState::Online)
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of `adb devices`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub serial: String,
    pub state: DeviceState,
}

/// A device taking part in one deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub serial: String,
    pub authorized: bool,
    /// Writable external storage root, once detected
    pub storage_path: Option<String>,
}

impl From<&Device> for DeviceRecord {
    fn from(device: &Device) -> Self {
        Self {
            serial: device.serial.clone(),
            authorized: device.state != DeviceState::Unauthorized,
            storage_path: None,
        }
    }
}

/// Parse the output of `adb devices`, every state included
pub fn parse_device_list(output: &str) -> Vec<Device> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("List of devices") && !line.starts_with('*'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            let state = parts.next()?;
            Some(Device {
                serial: serial.to_string(),
                state: DeviceState::parse(state),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICES: &str = "\
* daemon not running; starting now at tcp:5037
* daemon started successfully
List of devices attached
R58M123ABC\tdevice
emulator-5554\toffline
0A1B2C3D\tunauthorized
192.168.1.20:5555\tdevice
";

    #[test]
    fn test_parse_all_states() {
        let devices = parse_device_list(DEVICES);
        assert_eq!(devices.len(), 4);
        assert_eq!(devices[0], Device { serial: "R58M123ABC".into(), state: DeviceState::Online });
        assert_eq!(devices[1].state, DeviceState::Offline);
        assert!(!devices[1].state.is_usable());
        assert_eq!(devices[2].state, DeviceState::Unauthorized);
        assert_eq!(devices[3].serial, "192.168.1.20:5555");
    }

    #[test]
    fn test_record_from_unauthorized() {
        let device = Device { serial: "X".into(), state: DeviceState::Unauthorized };
        assert!(!DeviceRecord::from(&device).authorized);
    }
}
