//! Android Gradle plugin compatibility
//!
//! Known plugin versions and the host tool and SDK package versions each one
//! needs. Extend the table when a new plugin release is supported.

use lydroid_core::LyDroidError;

use crate::version::Version;

/// Requirements of one Android Gradle plugin release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradlePluginRequirements {
    pub agp_version: &'static str,
    pub min_gradle: &'static str,
    pub min_cmake: &'static str,
    pub max_cmake: Option<&'static str>,
    pub default_ndk: &'static str,
    pub default_build_tools: &'static str,
    pub min_jdk: &'static str,
    pub release_notes: &'static str,
}

impl GradlePluginRequirements {
    pub fn min_gradle_version(&self) -> Version {
        Version::parse(self.min_gradle)
    }

    pub fn min_cmake_version(&self) -> Version {
        Version::parse(self.min_cmake)
    }

    pub fn max_cmake_version(&self) -> Option<Version> {
        self.max_cmake.map(Version::parse)
    }

    pub fn min_jdk_version(&self) -> Version {
        Version::parse(self.min_jdk)
    }
}

const fn row(
    agp_version: &'static str,
    min_gradle: &'static str,
    max_cmake: Option<&'static str>,
    default_ndk: &'static str,
    default_build_tools: &'static str,
    min_jdk: &'static str,
    release_notes: &'static str,
) -> GradlePluginRequirements {
    GradlePluginRequirements {
        agp_version,
        min_gradle,
        min_cmake: "3.20",
        max_cmake,
        default_ndk,
        default_build_tools,
        min_jdk,
        release_notes,
    }
}

const AGP_4_2: &str = "https://developer.android.com/studio/releases/past-releases/agp-4-2-0-release-notes";
const AGP_7_0: &str = "https://developer.android.com/studio/releases/past-releases/agp-7-0-0-release-notes";
const AGP_7_1: &str = "https://developer.android.com/studio/releases/past-releases/agp-7-1-0-release-notes";
const AGP_7_2: &str = "https://developer.android.com/studio/releases/past-releases/agp-7-2-0-release-notes";
const AGP_7_3: &str = "https://developer.android.com/studio/releases/past-releases/agp-7-3-0-release-notes";
const AGP_7_4: &str = "https://developer.android.com/studio/releases/past-releases/agp-7-4-0-release-notes";
const AGP_8_0: &str = "https://developer.android.com/build/releases/past-releases/agp-8-0-0-release-notes";
const AGP_8_1: &str = "https://developer.android.com/build/releases/gradle-plugin";

static COMPATIBILITY_TABLE: &[GradlePluginRequirements] = &[
    row("4.2.0", "6.7.1", Some("3.22"), "21.4.7075529", "30.0.2", "1.8", AGP_4_2),
    row("4.2.1", "6.7.1", Some("3.22"), "21.4.7075529", "30.0.2", "1.8", AGP_4_2),
    row("4.2.2", "6.7.1", Some("3.22"), "21.4.7075529", "30.0.2", "1.8", AGP_4_2),
    row("7.0.0", "7.0.2", None, "21.4.7075529", "30.0.2", "11", AGP_7_0),
    row("7.0.4", "7.0.2", None, "21.4.7075529", "30.0.2", "11", AGP_7_0),
    row("7.1.3", "7.2", None, "21.4.7075529", "30.0.3", "11", AGP_7_1),
    row("7.2.2", "7.3.3", None, "21.4.7075529", "30.0.3", "11", AGP_7_2),
    row("7.3.0", "7.4", None, "25.1.8937393", "33.0.0", "11", AGP_7_3),
    row("7.3.1", "7.4", None, "25.1.8937393", "33.0.0", "11", AGP_7_3),
    row("7.4.2", "7.5", None, "25.1.8937393", "33.0.1", "11", AGP_7_4),
    row("8.0.0", "8.0", None, "25.1.8937393", "30.0.3", "17", AGP_8_0),
    row("8.0.1", "8.0", None, "25.1.8937393", "30.0.3", "17", AGP_8_0),
    row("8.0.2", "8.0", None, "25.1.8937393", "30.0.3", "17", AGP_8_0),
    row("8.1.0", "8.0", None, "25.1.8937393", "33.0.1", "17", AGP_8_1),
];

/// Look up the requirements for an exact plugin version
pub fn lookup(agp_version: &str) -> Result<&'static GradlePluginRequirements, LyDroidError> {
    let requested = agp_version.trim();
    COMPATIBILITY_TABLE
        .iter()
        .find(|r| r.agp_version == requested)
        .ok_or_else(|| {
            LyDroidError::not_supported(format!(
                "Unrecognized Android Gradle plugin version {}. Supported versions are: {}",
                requested,
                supported_versions().join(", ")
            ))
        })
}

/// Every plugin version with a known requirements row
pub fn supported_versions() -> Vec<&'static str> {
    COMPATIBILITY_TABLE.iter().map(|r| r.agp_version).collect()
}
