//! AndroidManifest.xml reader
//!
//! Extracts the handful of fields the pipeline needs from a manifest: the package
//! (library namespaces), versions and the activities with their intent filters.

use std::path::Path;

use crate::ManifestError;

/// Android namespace URI
const ANDROID_NS: &str = "http://schemas.android.com/apk/res/android";

const ACTION_MAIN: &str = "android.intent.action.MAIN";
const CATEGORY_LAUNCHER: &str = "android.intent.category.LAUNCHER";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivitySummary {
    pub name: String,
    pub screen_orientation: Option<String>,
    pub resizeable: Option<String>,
    pub actions: Vec<String>,
    pub categories: Vec<String>,
}

impl ActivitySummary {
    pub fn is_launcher(&self) -> bool {
        self.actions.iter().any(|a| a == ACTION_MAIN) && self.categories.iter().any(|c| c == CATEGORY_LAUNCHER)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestSummary {
    pub package: Option<String>,
    pub version_code: Option<String>,
    pub version_name: Option<String>,
    pub activities: Vec<ActivitySummary>,
}

impl ManifestSummary {
    pub fn parse(xml: &str) -> Result<Self, ManifestError> {
        let doc = roxmltree::Document::parse(xml).map_err(|e| ManifestError::Xml(e.to_string()))?;
        let root = doc.root_element();
        if root.tag_name().name() != "manifest" {
            return Err(ManifestError::Xml(format!(
                "expected <manifest> root element, found <{}>",
                root.tag_name().name()
            )));
        }

        let mut summary = ManifestSummary {
            package: root.attribute("package").map(str::to_string),
            version_code: root.attribute((ANDROID_NS, "versionCode")).map(str::to_string),
            version_name: root.attribute((ANDROID_NS, "versionName")).map(str::to_string),
            activities: Vec::new(),
        };

        for activity in root.descendants().filter(|n| n.has_tag_name("activity")) {
            let mut entry = ActivitySummary {
                name: activity.attribute((ANDROID_NS, "name")).unwrap_or_default().to_string(),
                screen_orientation: activity.attribute((ANDROID_NS, "screenOrientation")).map(str::to_string),
                resizeable: activity.attribute((ANDROID_NS, "resizeableActivity")).map(str::to_string),
                ..Default::default()
            };
            for filter in activity.children().filter(|n| n.has_tag_name("intent-filter")) {
                for child in filter.children().filter(|n| n.is_element()) {
                    let Some(name) = child.attribute((ANDROID_NS, "name")) else {
                        continue;
                    };
                    match child.tag_name().name() {
                        "action" => entry.actions.push(name.to_string()),
                        "category" => entry.categories.push(name.to_string()),
                        _ => {}
                    }
                }
            }
            summary.activities.push(entry);
        }

        Ok(summary)
    }

    pub fn launcher_activity(&self) -> Option<&ActivitySummary> {
        self.activities.iter().find(|a| a.is_launcher())
    }
}

/// The `package` attribute of the manifest at `path`
pub fn read_package(path: &Path) -> Result<String, ManifestError> {
    let xml = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ManifestSummary::parse(&xml)?
        .package
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ManifestError::MissingKey {
            path: path.to_path_buf(),
            key: "package",
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARY_MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="com.google.android.vending.expansion.downloader">
    <uses-permission android:name="android.permission.INTERNET" />
    <application>
        <activity android:name=".Viewer">
            <intent-filter>
                <action android:name="android.intent.action.VIEW" />
            </intent-filter>
        </activity>
    </application>
</manifest>"#;

    #[test]
    fn test_library_package() {
        let summary = ManifestSummary::parse(LIBRARY_MANIFEST).unwrap();
        assert_eq!(summary.package.as_deref(), Some("com.google.android.vending.expansion.downloader"));
        assert_eq!(summary.activities.len(), 1);
        assert!(summary.launcher_activity().is_none());
    }

    #[test]
    fn test_read_package_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AndroidManifest.xml");
        std::fs::write(&path, LIBRARY_MANIFEST).unwrap();
        assert_eq!(read_package(&path).unwrap(), "com.google.android.vending.expansion.downloader");

        std::fs::write(&path, "<manifest/>").unwrap();
        assert!(matches!(read_package(&path), Err(ManifestError::MissingKey { key: "package", .. })));
    }

    #[test]
    fn test_rejects_non_manifest() {
        assert!(ManifestSummary::parse("<resources/>").is_err());
        assert!(ManifestSummary::parse("<manifest").is_err());
    }
}
