//! APK Signing
//!
//! Keystore settings for the Gradle `signingConfigs` block. Either all four
//! values are given or none; the same keystore signs every configuration.

use std::path::{Path, PathBuf};

use tracing::debug;

use lydroid_core::BuildConfiguration;

use crate::{gradle_path, BuildError};

/// Signing configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningConfig {
    /// Path to keystore file
    pub store_file: PathBuf,
    /// Keystore password
    pub store_password: String,
    pub key_alias: String,
    pub key_password: String,
}

fn supplied(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !v.is_empty()).unwrap_or(false)
}

impl SigningConfig {
    /// Build from the optional command-line values. No values at all means an
    /// unsigned build; anything in between is an error naming the first gap.
    pub fn from_parts(
        store_file: Option<PathBuf>,
        store_password: Option<String>,
        key_alias: Option<String>,
        key_password: Option<String>,
    ) -> Result<Option<Self>, BuildError> {
        let any = store_file.is_some() || supplied(&store_password) || supplied(&key_alias) || supplied(&key_password);
        if !any {
            debug!("No signing configuration supplied");
            return Ok(None);
        }

        let store_file = store_file
            .ok_or_else(|| BuildError::Signing("Keystore file not supplied for signing configuration".into()))?;
        if !store_file.is_file() {
            return Err(BuildError::Signing(format!(
                "Missing/Invalid keystore file {} for signing config",
                store_file.display()
            )));
        }
        let store_password = store_password
            .filter(|v| !v.is_empty())
            .ok_or_else(|| BuildError::Signing("Keystore password not supplied for signing configuration".into()))?;
        let key_alias = key_alias
            .filter(|v| !v.is_empty())
            .ok_or_else(|| BuildError::Signing("Signing key alias not supplied for signing configuration".into()))?;
        let key_password = key_password
            .filter(|v| !v.is_empty())
            .ok_or_else(|| BuildError::Signing("Signing key password not supplied for signing configuration".into()))?;

        Ok(Some(Self { store_file, store_password, key_alias, key_password }))
    }

    pub fn store_file(&self) -> &Path {
        &self.store_file
    }

    /// Body of one `signingConfigs` entry, each line indented by `tabs` levels
    pub fn to_template_string(&self, tabs: usize) -> String {
        let indent = " ".repeat(4 * tabs);
        format!(
            "\n{indent}storeFile file('{}')\n{indent}storePassword '{}'\n{indent}keyPassword '{}'\n{indent}keyAlias '{}'",
            gradle_path(&self.store_file),
            self.store_password,
            self.key_password,
            self.key_alias,
        )
    }

    /// The `signingConfigs { ... }` block with one entry per configuration
    pub fn gradle_block(&self) -> String {
        let mut block = String::from("\n    signingConfigs {\n");
        for configuration in BuildConfiguration::ALL {
            block.push_str(&format!(
                "        {} {{{}\n        }}\n",
                configuration.lower(),
                self.to_template_string(3)
            ));
        }
        block.push_str("    }\n");
        block
    }

    /// `signingConfig` line for a build type
    pub fn build_type_line(configuration: BuildConfiguration) -> String {
        format!("signingConfig signingConfigs.{}", configuration.lower())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keystore() -> tempfile::NamedTempFile {
        tempfile::NamedTempFile::new().unwrap()
    }

    #[test]
    fn test_none_supplied() {
        assert_eq!(SigningConfig::from_parts(None, None, None, Some(String::new())).unwrap(), None);
    }

    #[test]
    fn test_partial_config_is_an_error() {
        let store = keystore();
        let err = SigningConfig::from_parts(Some(store.path().to_path_buf()), Some("secret".into()), None, None)
            .unwrap_err();
        assert_eq!(err.to_string(), "Signing key alias not supplied for signing configuration");

        let err = SigningConfig::from_parts(None, None, Some("upload".into()), None).unwrap_err();
        assert_eq!(err.to_string(), "Keystore file not supplied for signing configuration");
    }

    #[test]
    fn test_missing_keystore_file() {
        let err = SigningConfig::from_parts(
            Some(PathBuf::from("/no/such/release.keystore")),
            Some("a".into()),
            Some("b".into()),
            Some("c".into()),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Missing/Invalid keystore file"));
    }

    #[test]
    fn test_gradle_block() {
        let store = keystore();
        let config = SigningConfig::from_parts(
            Some(store.path().to_path_buf()),
            Some("storepass".into()),
            Some("upload".into()),
            Some("keypass".into()),
        )
        .unwrap()
        .unwrap();

        let block = config.gradle_block();
        assert!(block.starts_with("\n    signingConfigs {\n        debug {\n            storeFile file('"));
        assert!(block.contains("        profile {"));
        assert!(block.contains("            keyAlias 'upload'\n        }\n    }\n"));
        assert_eq!(block.matches("storePassword 'storepass'").count(), 3);
        assert_eq!(
            SigningConfig::build_type_line(BuildConfiguration::Release),
            "signingConfig signingConfigs.release"
        );
    }
}
