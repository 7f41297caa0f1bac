//! SDK Manager
//!
//! Wraps the Android SDK command-line `sdkmanager` to query the package catalog
//! and install missing packages on demand.

use std::path::{Path, PathBuf};
use std::time::Duration;

use glob::Pattern;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use lydroid_core::{CommandRunner, CommandSpec, LyDroidError};

use crate::version::Version;

static LICENSES_NOT_ACCEPTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\d+ of \d+ SDK package licenses? not accepted").expect("license pattern"));

static ALL_LICENSES_ACCEPTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*All SDK package licenses accepted\.?").expect("license pattern"));

/// A package row from `sdkmanager --list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkPackage {
    /// Package path, e.g. `platforms;android-33`
    pub path: String,
    pub version: Version,
    pub description: String,
    /// Install location relative to the SDK root (installed packages only)
    pub location: Option<String>,
}

impl SdkPackage {
    /// Absolute install directory, if the package is installed
    pub fn install_dir(&self, sdk_root: &Path) -> Option<PathBuf> {
        self.location.as_ref().map(|loc| sdk_root.join(loc))
    }
}

/// Section of the `--list` report currently being read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CatalogSection {
    None,
    Installed,
    Available,
    Updates,
}

impl CatalogSection {
    fn from_header(line: &str) -> Option<Self> {
        let lower = line.to_ascii_lowercase();
        if lower.starts_with("installed packages:") {
            Some(CatalogSection::Installed)
        } else if lower.starts_with("available packages:") {
            Some(CatalogSection::Available)
        } else if lower.starts_with("available updates:") {
            Some(CatalogSection::Updates)
        } else {
            None
        }
    }
}

/// Parsed `sdkmanager --list` output
#[derive(Debug, Clone, Default)]
pub struct PackageCatalog {
    pub installed: Vec<SdkPackage>,
    pub available: Vec<SdkPackage>,
    /// Updatable packages; `version` is the available version
    pub updates: Vec<SdkPackage>,
}

impl PackageCatalog {
    pub fn parse(output: &str) -> Self {
        let mut catalog = PackageCatalog::default();
        let mut section = CatalogSection::None;

        for line in output.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(next) = CatalogSection::from_header(line) {
                section = next;
                continue;
            }
            if section == CatalogSection::None {
                continue;
            }

            let fields: Vec<&str> = line.split('|').map(str::trim).collect();
            if fields.len() < 3 {
                continue;
            }
            if matches!(fields[1], "Version" | "Installed") || fields[1].starts_with("---") {
                continue;
            }

            match section {
                CatalogSection::Installed => catalog.installed.push(SdkPackage {
                    path: fields[0].to_string(),
                    version: Version::parse(fields[1]),
                    description: fields[2].to_string(),
                    location: fields.get(3).map(|l| l.to_string()),
                }),
                CatalogSection::Available => catalog.available.push(SdkPackage {
                    path: fields[0].to_string(),
                    version: Version::parse(fields[1]),
                    description: fields[2].to_string(),
                    location: None,
                }),
                CatalogSection::Updates => catalog.updates.push(SdkPackage {
                    path: fields[0].to_string(),
                    version: Version::parse(fields[2]),
                    description: format!("update from {}", fields[1]),
                    location: None,
                }),
                CatalogSection::None => {}
            }
        }

        catalog
    }
}

/// Packages whose path matches `pattern`, newest first
fn find_matches<'a>(packages: &'a [SdkPackage], pattern: &str) -> Vec<&'a SdkPackage> {
    let compiled = Pattern::new(pattern).ok();
    let mut matches: Vec<&SdkPackage> = packages
        .iter()
        .filter(|p| match &compiled {
            Some(glob) => glob.matches(&p.path),
            None => p.path == pattern,
        })
        .collect();
    matches.sort_by(|a, b| b.version.cmp(&a.version));
    matches
}

/// SDK Manager errors
#[derive(Debug, thiserror::Error)]
pub enum SdkManagerError {
    #[error("Android SDK not found at {0}")]
    SdkNotFound(PathBuf),
    #[error("Unable to locate sdkmanager under {0}. Make sure the Android SDK command-line tools are installed")]
    SdkManagerNotFound(PathBuf),
    #[error("sdkmanager {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("Unable to find any Android SDK package matching '{pattern}' ({description})")]
    PackageNotFound { pattern: String, description: String },
    #[error("Unable to install Android SDK package '{path}': {reason}")]
    InstallFailed { path: String, reason: String },
    #[error("{0} SDK package licenses not accepted. Run '{1} --licenses' to review and accept them")]
    LicensesNotAccepted(String, String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SdkManagerError> for LyDroidError {
    fn from(err: SdkManagerError) -> Self {
        match err {
            SdkManagerError::SdkNotFound(_) => LyDroidError::Directory(err.to_string()),
            SdkManagerError::SdkManagerNotFound(_) => LyDroidError::FileNotFound(err.to_string()),
            SdkManagerError::Io(e) => LyDroidError::Io(e),
            other => LyDroidError::Environment(other.to_string()),
        }
    }
}

/// Android SDK package resolver
pub struct SdkResolver<R> {
    sdk_root: PathBuf,
    sdkmanager_path: PathBuf,
    java_home: Option<PathBuf>,
    runner: R,
    catalog: Option<PackageCatalog>,
}

impl<R: CommandRunner> SdkResolver<R> {
    /// Create a resolver for the SDK at `sdk_root`
    pub fn new(sdk_root: PathBuf, runner: R) -> Result<Self, SdkManagerError> {
        if !sdk_root.is_dir() {
            return Err(SdkManagerError::SdkNotFound(sdk_root));
        }

        let sdkmanager_path = Self::find_sdkmanager(&sdk_root)?;
        debug!("Using sdkmanager at {:?}", sdkmanager_path);

        Ok(Self {
            sdk_root,
            sdkmanager_path,
            java_home: None,
            runner,
            catalog: None,
        })
    }

    /// Set the JAVA_HOME for sdkmanager invocations
    pub fn with_java_home(mut self, java_home: PathBuf) -> Self {
        self.java_home = Some(java_home);
        self
    }

    /// Find the sdkmanager executable
    fn find_sdkmanager(sdk_root: &Path) -> Result<PathBuf, SdkManagerError> {
        let exe_name = if cfg!(windows) { "sdkmanager.bat" } else { "sdkmanager" };
        let cmdline_tools = sdk_root.join("cmdline-tools");

        let path = cmdline_tools.join("latest").join("bin").join(exe_name);
        if path.is_file() {
            return Ok(path);
        }

        // Versioned installs, newest first
        if let Ok(entries) = std::fs::read_dir(&cmdline_tools) {
            let mut versioned: Vec<PathBuf> = entries
                .flatten()
                .map(|entry| entry.path().join("bin").join(exe_name))
                .filter(|p| p.is_file())
                .collect();
            versioned.sort();
            if let Some(path) = versioned.pop() {
                return Ok(path);
            }
        }

        // Legacy tools layout
        let path = sdk_root.join("tools").join("bin").join(exe_name);
        if path.is_file() {
            return Ok(path);
        }

        Err(SdkManagerError::SdkManagerNotFound(sdk_root.to_path_buf()))
    }

    pub fn sdk_root(&self) -> &Path {
        &self.sdk_root
    }

    pub fn sdkmanager_path(&self) -> &Path {
        &self.sdkmanager_path
    }

    fn command(&self) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.sdkmanager_path)
            .arg(format!("--sdk_root={}", self.sdk_root.display()))
            .with_env("ANDROID_SDK_ROOT", self.sdk_root.as_os_str())
            .with_env("ANDROID_HOME", self.sdk_root.as_os_str());
        if let Some(java_home) = &self.java_home {
            spec = spec.with_env("JAVA_HOME", java_home.as_os_str());
        }
        spec
    }

    /// Re-read the package catalog
    pub async fn refresh(&mut self) -> Result<&PackageCatalog, SdkManagerError> {
        debug!("Listing Android SDK packages...");
        let output = self.runner.output(&self.command().arg("--list")).await?;
        if !output.success() {
            return Err(SdkManagerError::CommandFailed {
                command: "--list".into(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(self.catalog.insert(PackageCatalog::parse(&output.stdout)))
    }

    async fn ensure_catalog(&mut self) -> Result<(), SdkManagerError> {
        if self.catalog.is_none() {
            self.refresh().await?;
        }
        Ok(())
    }

    /// Installed packages matching `pattern`, newest first
    pub fn is_installed(&self, pattern: &str) -> Vec<SdkPackage> {
        self.catalog
            .as_ref()
            .map(|c| find_matches(&c.installed, pattern).into_iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Available packages matching `pattern`, newest first
    pub fn is_available(&self, pattern: &str) -> Vec<SdkPackage> {
        self.catalog
            .as_ref()
            .map(|c| find_matches(&c.available, pattern).into_iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Make sure a package matching `pattern` is installed and return it.
    ///
    /// An installed match is returned without touching sdkmanager. Otherwise the
    /// reverse-lexicographically first available match is installed. That choice
    /// is only meaningful for patterns whose wildcard covers a version suffix.
    pub async fn install(&mut self, pattern: &str, description: &str) -> Result<SdkPackage, SdkManagerError> {
        self.ensure_catalog().await?;

        if let Some(installed) = self.is_installed(pattern).into_iter().next() {
            info!("{} version {} is installed", description, installed.version);
            return Ok(installed);
        }

        let mut candidates = self.is_available(pattern);
        if candidates.is_empty() {
            return Err(SdkManagerError::PackageNotFound {
                pattern: pattern.to_string(),
                description: description.to_string(),
            });
        }
        candidates.sort_by(|a, b| b.path.cmp(&a.path));
        let target = candidates.remove(0);

        info!("Installing {} ({})...", description, target.path);
        let output = self
            .runner
            .output(&self.command().arg("--install").arg(target.path.clone()).with_stdin("y\n"))
            .await?;
        if !output.success() {
            return Err(SdkManagerError::InstallFailed {
                path: target.path,
                reason: output.stderr.trim().to_string(),
            });
        }

        self.refresh().await?;
        self.is_installed(&target.path)
            .into_iter()
            .next()
            .ok_or_else(|| SdkManagerError::InstallFailed {
                path: target.path.clone(),
                reason: "package is still not reported as installed".into(),
            })
    }

    /// Fail when sdkmanager reports licenses that still need accepting
    pub async fn check_licenses(&self) -> Result<(), SdkManagerError> {
        let spec = self
            .command()
            .arg("--licenses")
            .with_stdin("n\n")
            .with_timeout(Duration::from_secs(30));
        let output = self.runner.output(&spec).await?;
        let text = output.combined();

        if let Some(found) = LICENSES_NOT_ACCEPTED.find(&text) {
            let count = found.as_str().split_whitespace().next().unwrap_or("Some").to_string();
            return Err(SdkManagerError::LicensesNotAccepted(
                count,
                self.sdkmanager_path.display().to_string(),
            ));
        }
        if ALL_LICENSES_ACCEPTED.is_match(&text) {
            debug!("All Android SDK licenses accepted");
        } else {
            warn!("Unable to determine the Android SDK license state");
        }
        Ok(())
    }
}
