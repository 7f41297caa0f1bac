//! Project templates
//!
//! The built-in templates ship inside the binary. A template directory given on
//! the command line replaces any built-in of the same file name and may add
//! files referenced by the builder rules.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use tracing::debug;

use lydroid_core::{Template, TemplateEnv};
use lydroid_manifest_manager::{ManifestEnv, ANDROID_MANIFEST_FILE, ANDROID_MANIFEST_TEMPLATE};

use crate::tasks::BuildGradleEnv;
use crate::BuildError;

pub const BUILD_GRADLE_TEMPLATE: &str = "build.gradle.in";
pub const ROOT_BUILD_GRADLE_TEMPLATE: &str = "root.build.gradle.in";
pub const LOCAL_PROPERTIES_TEMPLATE: &str = "local.properties.in";
pub const GRADLE_PROPERTIES_TEMPLATE: &str = "gradle.properties.in";
pub const ANDROID_LIBRARIES_JSON: &str = "android_libraries.json";
pub const ANDROID_BUILDER_JSON: &str = "android_builder.json";

static BUILTIN: &[(&str, &str)] = &[
    (BUILD_GRADLE_TEMPLATE, include_str!("../templates/build.gradle.in")),
    (ROOT_BUILD_GRADLE_TEMPLATE, include_str!("../templates/root.build.gradle.in")),
    (LOCAL_PROPERTIES_TEMPLATE, include_str!("../templates/local.properties.in")),
    (GRADLE_PROPERTIES_TEMPLATE, include_str!("../templates/gradle.properties.in")),
    (ANDROID_LIBRARIES_JSON, include_str!("../templates/android_libraries.json")),
    (ANDROID_BUILDER_JSON, include_str!("../templates/android_builder.json")),
    (ANDROID_MANIFEST_FILE, ANDROID_MANIFEST_TEMPLATE),
    ("ProjectActivity.java", include_str!("../templates/ProjectActivity.java")),
    ("strings.xml", include_str!("../templates/strings.xml")),
    ("styles.xml", include_str!("../templates/styles.xml")),
];

/// Extensions copied byte for byte instead of being substituted
const BINARY_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "tif", "tiff"];

/// Content of one template file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Text(String),
    Binary(PathBuf),
}

/// Built-in templates plus an optional override directory
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    override_dir: Option<PathBuf>,
}

impl TemplateSet {
    pub fn builtin() -> Self {
        Self::default()
    }

    pub fn with_override(dir: &Path) -> Result<Self, BuildError> {
        if !dir.is_dir() {
            return Err(BuildError::TemplateDirNotFound(dir.to_path_buf()));
        }
        debug!("Using template overrides from {}", dir.display());
        Ok(Self { override_dir: Some(dir.to_path_buf()) })
    }

    fn override_file(&self, name: &str) -> Option<PathBuf> {
        self.override_dir.as_ref().map(|dir| dir.join(name)).filter(|path| path.is_file())
    }

    fn is_binary(name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| BINARY_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    pub fn source(&self, name: &str) -> Result<TemplateSource, BuildError> {
        if let Some(path) = self.override_file(name) {
            if Self::is_binary(name) {
                return Ok(TemplateSource::Binary(path));
            }
            return Ok(TemplateSource::Text(std::fs::read_to_string(&path)?));
        }
        BUILTIN
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .map(|(_, text)| TemplateSource::Text(text.to_string()))
            .ok_or_else(|| BuildError::TemplateNotFound(name.to_string()))
    }

    /// Parsed text template
    pub fn template(&self, name: &str) -> Result<Template, BuildError> {
        match self.source(name)? {
            TemplateSource::Text(text) => Ok(Template::parse(name, &text)?),
            TemplateSource::Binary(_) => Err(BuildError::TemplateNotFound(name.to_string())),
        }
    }

    pub fn render<E: TemplateEnv>(&self, name: &str, env: &E) -> Result<String, BuildError> {
        Ok(self.template(name)?.render(env)?)
    }

    /// Check every template against the record it is rendered with
    pub fn validate(&self) -> Result<(), BuildError> {
        self.template(BUILD_GRADLE_TEMPLATE)?.validate::<BuildGradleEnv>()?;
        self.template(ROOT_BUILD_GRADLE_TEMPLATE)?.validate::<RootGradleEnv>()?;
        self.template(LOCAL_PROPERTIES_TEMPLATE)?.validate::<LocalPropertiesEnv>()?;
        self.template(GRADLE_PROPERTIES_TEMPLATE)?.validate::<GradlePropertiesEnv>()?;
        self.template(ANDROID_LIBRARIES_JSON)?.validate::<LibrariesEnv>()?;
        self.template(ANDROID_BUILDER_JSON)?.validate::<ManifestEnv>()?;
        self.template(ANDROID_MANIFEST_FILE)?.validate::<ManifestEnv>()?;
        Ok(())
    }
}

/// `root.build.gradle.in`
#[derive(Debug, Clone)]
pub struct RootGradleEnv {
    pub android_gradle_plugin: String,
    pub sdk_version: u32,
    pub min_sdk_version: u32,
    pub ndk_platform_version: u32,
    pub build_tools_version: String,
    pub ndk_version: String,
    pub engine_root: String,
}

impl TemplateEnv for RootGradleEnv {
    const KEYS: &'static [&'static str] = &[
        "ANDROID_GRADLE_PLUGIN_VERSION",
        "SDK_VER",
        "MIN_SDK_VER",
        "NDK_PLATFORM_VER",
        "SDK_BUILD_TOOL_VER",
        "NDK_VERSION",
        "LY_ENGINE_ROOT",
    ];

    fn value(&self, key: &str) -> Option<Cow<'_, str>> {
        Some(match key {
            "ANDROID_GRADLE_PLUGIN_VERSION" => Cow::Borrowed(self.android_gradle_plugin.as_str()),
            "SDK_VER" => Cow::Owned(self.sdk_version.to_string()),
            "MIN_SDK_VER" => Cow::Owned(self.min_sdk_version.to_string()),
            "NDK_PLATFORM_VER" => Cow::Owned(self.ndk_platform_version.to_string()),
            "SDK_BUILD_TOOL_VER" => Cow::Borrowed(self.build_tools_version.as_str()),
            "NDK_VERSION" => Cow::Borrowed(self.ndk_version.as_str()),
            "LY_ENGINE_ROOT" => Cow::Borrowed(self.engine_root.as_str()),
            _ => return None,
        })
    }
}

/// `local.properties.in`
#[derive(Debug, Clone)]
pub struct LocalPropertiesEnv {
    pub ndk_path: String,
    pub sdk_path: String,
    pub cmake_dir_line: String,
}

impl LocalPropertiesEnv {
    pub fn new(sdk: &Path, ndk: &Path, cmake_dir: Option<&Path>) -> Self {
        Self {
            ndk_path: properties_path(ndk),
            sdk_path: properties_path(sdk),
            cmake_dir_line: cmake_dir
                .map(|dir| format!("cmake.dir={}", properties_path(dir)))
                .unwrap_or_default(),
        }
    }
}

impl TemplateEnv for LocalPropertiesEnv {
    const KEYS: &'static [&'static str] = &["ANDROID_NDK_PATH", "ANDROID_SDK_PATH", "CMAKE_DIR_LINE"];

    fn value(&self, key: &str) -> Option<Cow<'_, str>> {
        let value = match key {
            "ANDROID_NDK_PATH" => &self.ndk_path,
            "ANDROID_SDK_PATH" => &self.sdk_path,
            "CMAKE_DIR_LINE" => &self.cmake_dir_line,
            _ => return None,
        };
        Some(Cow::Borrowed(value.as_str()))
    }
}

/// `gradle.properties.in` takes no values
#[derive(Debug, Clone, Copy, Default)]
pub struct GradlePropertiesEnv;

impl TemplateEnv for GradlePropertiesEnv {
    const KEYS: &'static [&'static str] = &[];

    fn value(&self, _key: &str) -> Option<Cow<'_, str>> {
        None
    }
}

/// `android_libraries.json`
#[derive(Debug, Clone)]
pub struct LibrariesEnv {
    pub sdk_home: String,
    pub ndk_home: String,
    pub sdk_version: String,
}

impl TemplateEnv for LibrariesEnv {
    const KEYS: &'static [&'static str] = &["ANDROID_SDK_HOME", "ANDROID_NDK_HOME", "ANDROID_SDK_VERSION"];

    fn value(&self, key: &str) -> Option<Cow<'_, str>> {
        let value = match key {
            "ANDROID_SDK_HOME" => &self.sdk_home,
            "ANDROID_NDK_HOME" => &self.ndk_home,
            "ANDROID_SDK_VERSION" => &self.sdk_version,
            _ => return None,
        };
        Some(Cow::Borrowed(value.as_str()))
    }
}

/// Path text for `.properties` files: forward slashes, drive colons escaped
pub fn properties_path(path: &Path) -> String {
    crate::gradle_path(path).replace(':', "\\:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_templates_validate() {
        TemplateSet::builtin().validate().unwrap();
    }

    #[test]
    fn test_override_replaces_builtin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(GRADLE_PROPERTIES_TEMPLATE), "org.gradle.daemon=false\n").unwrap();
        std::fs::write(dir.path().join("app_icon.png"), [0x89, b'P', b'N', b'G']).unwrap();
        let set = TemplateSet::with_override(dir.path()).unwrap();

        assert_eq!(
            set.render(GRADLE_PROPERTIES_TEMPLATE, &GradlePropertiesEnv).unwrap(),
            "org.gradle.daemon=false\n"
        );
        assert_eq!(
            set.source("app_icon.png").unwrap(),
            TemplateSource::Binary(dir.path().join("app_icon.png"))
        );
        // Everything else still comes from the built-in set
        assert!(matches!(set.source(ANDROID_BUILDER_JSON).unwrap(), TemplateSource::Text(_)));
        assert!(matches!(set.source("missing.txt"), Err(BuildError::TemplateNotFound(_))));
    }

    #[test]
    fn test_broken_override_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ROOT_BUILD_GRADLE_TEMPLATE), "compileSdk ${SDK_VERSION_TYPO}\n").unwrap();
        let err = TemplateSet::with_override(dir.path()).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("SDK_VERSION_TYPO"));
    }

    #[test]
    fn test_missing_override_dir() {
        let err = TemplateSet::with_override(Path::new("/no/such/templates")).unwrap_err();
        assert!(matches!(err, BuildError::TemplateDirNotFound(_)));
    }

    #[test]
    fn test_local_properties() {
        let env = LocalPropertiesEnv::new(
            Path::new("C:/android/sdk"),
            Path::new("C:/android/sdk/ndk/25.1.8937393"),
            None,
        );
        let text = TemplateSet::builtin().render(LOCAL_PROPERTIES_TEMPLATE, &env).unwrap();
        assert!(text.contains("sdk.dir=C\\:/android/sdk\n"));
        assert!(text.contains("ndk.dir=C\\:/android/sdk/ndk/25.1.8937393\n"));
        assert!(!text.contains("cmake.dir"));
    }
}
