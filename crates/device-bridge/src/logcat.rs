//! Logcat line decoding
//!
//! The test runner reports through the `LMBR` tag. Lines arrive in whatever format
//! the device's logcat defaults to (`threadtime` on current releases, `brief` on
//! older ones), so the payload is recovered from either.

use once_cell::sync::Lazy;
use regex::Regex;

/// Tag the engine logs under
pub const ENGINE_LOG_TAG: &str = "LMBR";

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Verbose,
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
    Silent,
}

impl LogLevel {
    pub fn from_char(c: char) -> Self {
        match c {
            'V' => LogLevel::Verbose,
            'D' => LogLevel::Debug,
            'I' => LogLevel::Info,
            'W' => LogLevel::Warning,
            'E' => LogLevel::Error,
            'F' => LogLevel::Fatal,
            'S' => LogLevel::Silent,
            _ => LogLevel::Info,
        }
    }
}

/// `MM-DD HH:MM:SS.mmm  PID  TID L TAG : message`
static THREADTIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d\d-\d\d \d\d:\d\d:\d\d\.\d+)\s+(\d+)\s+(\d+)\s+([VDIWEFS])\s+(.*?)\s*: ?(.*)$")
        .expect("threadtime pattern")
});

/// `L/TAG ( PID): message`
static BRIEF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([VDIWEFS])/(.*?)\s*\(\s*(\d+)\): ?(.*)$").expect("brief pattern"));

/// Parsed logcat line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Empty for formats without one
    pub timestamp: String,
    pub pid: u32,
    /// Same as `pid` for formats without a thread id
    pub tid: u32,
    pub level: LogLevel,
    pub tag: String,
    pub message: String,
}

impl LogEntry {
    /// Parse a `threadtime` or `brief` logcat line
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some(caps) = THREADTIME.captures(line) {
            return Some(LogEntry {
                timestamp: caps[1].to_string(),
                pid: caps[2].parse().ok()?,
                tid: caps[3].parse().ok()?,
                level: LogLevel::from_char(caps[4].chars().next()?),
                tag: caps[5].to_string(),
                message: caps[6].to_string(),
            });
        }
        let caps = BRIEF.captures(line)?;
        let pid = caps[3].parse().ok()?;
        Some(LogEntry {
            timestamp: String::new(),
            pid,
            tid: pid,
            level: LogLevel::from_char(caps[1].chars().next()?),
            tag: caps[2].to_string(),
            message: caps[4].to_string(),
        })
    }
}

/// Text of an engine log line with the logcat prefix removed.
///
/// Returns `None` for logcat's own `--------- beginning of` banners and for lines
/// from other tags. Lines that match no known format are returned unchanged.
pub fn engine_payload(line: &str) -> Option<String> {
    if line.starts_with("---------") {
        return None;
    }
    match LogEntry::parse(line) {
        Some(entry) if entry.tag == ENGINE_LOG_TAG => Some(entry.message),
        Some(_) => None,
        None => Some(line.trim_end().to_string()),
    }
}

/// Outcome reported by the on-device test runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestMarker {
    Success,
    Failure,
}

impl TestMarker {
    pub fn find(payload: &str) -> Option<Self> {
        if payload.contains("[SUCCESS]") {
            Some(TestMarker::Success)
        } else if payload.contains("[FAILURE]") {
            Some(TestMarker::Failure)
        } else {
            None
        }
    }
}
