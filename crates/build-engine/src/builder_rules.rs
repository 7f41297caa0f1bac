//! App source rules
//!
//! `android_builder.json` describes the app's Java and resource files as a tree:
//! an object is a folder, a list names templates copied under their own names,
//! and a string maps a template name to the name it is written as.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use lydroid_manifest_manager::ManifestEnv;

use crate::templates::{TemplateSet, TemplateSource, ANDROID_BUILDER_JSON};
use crate::{write_generated, BuildError};

/// Folder names never copied from the rules
const IGNORED_ENTRIES: &[&str] = &["wscript"];

/// Parsed builder rules
#[derive(Debug, Clone)]
pub struct BuilderRules {
    rules: Value,
}

impl BuilderRules {
    /// Render the rules with the manifest values and parse them
    pub fn load(templates: &TemplateSet, env: &ManifestEnv) -> Result<Self, BuildError> {
        let text = templates.render(ANDROID_BUILDER_JSON, env)?;
        let rules: Value = serde_json::from_str(&text).map_err(|e| BuildError::BuilderRules(e.to_string()))?;
        if !rules.is_object() {
            return Err(BuildError::BuilderRules("top level must be an object".into()));
        }
        Ok(Self { rules })
    }

    /// Write every file the rules name under `dst`. Returns the number written.
    pub fn apply(
        &self,
        templates: &TemplateSet,
        env: &ManifestEnv,
        dst: &Path,
        overwrite_existing: bool,
    ) -> Result<usize, BuildError> {
        copy_rule(&self.rules, templates, env, dst, overwrite_existing)
    }
}

fn copy_rule(
    rule: &Value,
    templates: &TemplateSet,
    env: &ManifestEnv,
    dst: &Path,
    overwrite_existing: bool,
) -> Result<usize, BuildError> {
    match rule {
        Value::Object(entries) => {
            let mut written = 0;
            for (name, value) in entries {
                if IGNORED_ENTRIES.contains(&name.as_str()) {
                    continue;
                }
                match value {
                    Value::String(target) => {
                        written += copy_template(name, templates, env, &dst.join(target), overwrite_existing)?;
                    }
                    _ => written += copy_rule(value, templates, env, &dst.join(name), overwrite_existing)?,
                }
            }
            Ok(written)
        }
        Value::Array(names) => {
            let mut written = 0;
            for name in names {
                let name = name
                    .as_str()
                    .ok_or_else(|| BuildError::BuilderRules(format!("expected a file name in {}", dst.display())))?;
                written += copy_template(name, templates, env, &dst.join(name), overwrite_existing)?;
            }
            Ok(written)
        }
        other => Err(BuildError::BuilderRules(format!("unexpected rule {} for {}", other, dst.display()))),
    }
}

fn copy_template(
    name: &str,
    templates: &TemplateSet,
    env: &ManifestEnv,
    target: &Path,
    overwrite_existing: bool,
) -> Result<usize, BuildError> {
    debug!("Builder rule {} -> {}", name, target.display());
    match templates.source(name)? {
        TemplateSource::Text(text) => {
            let rendered = lydroid_core::Template::parse(name, &text)?.render(env)?;
            Ok(write_generated(target, &rendered, overwrite_existing)? as usize)
        }
        TemplateSource::Binary(path) => {
            if target.exists() && !overwrite_existing {
                return Ok(0);
            }
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(&path, target).map_err(|source| BuildError::Write { path: target.to_path_buf(), source })?;
            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lydroid_manifest_manager::ManifestOptions;

    fn project(root: &Path) -> std::path::PathBuf {
        let project = root.join("Jack");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(
            project.join("project.json"),
            r#"{"project_name": "Jack", "android_settings": {"package_name": "org.o3de.jack", "version_number": 1, "version_name": "1.0.0.0", "orientation": "landscape"}}"#,
        )
        .unwrap();
        project
    }

    fn env(root: &Path) -> ManifestEnv {
        ManifestEnv::load(&project(root), ManifestOptions { target_sdk_version: 33, min_sdk_version: 24, oculus_project: false })
            .unwrap()
    }

    #[test]
    fn test_builtin_rules() {
        let root = tempfile::tempdir().unwrap();
        let env = env(root.path());
        let templates = TemplateSet::builtin();
        let rules = BuilderRules::load(&templates, &env).unwrap();
        let app = root.path().join("app");

        assert_eq!(rules.apply(&templates, &env, &app, false).unwrap(), 3);
        let activity = app.join("src/main/java/org/o3de/jack").join(format!("{}.java", env.project_activity));
        let java = std::fs::read_to_string(activity).unwrap();
        assert!(java.starts_with("package org.o3de.jack;"));
        assert!(std::fs::read_to_string(app.join("src/main/res/values/strings.xml")).unwrap().contains("Jack"));

        // Existing files are left alone without overwrite
        assert_eq!(rules.apply(&templates, &env, &app, false).unwrap(), 0);
    }

    #[test]
    fn test_override_rules_with_binary() {
        let root = tempfile::tempdir().unwrap();
        let env = env(root.path());
        let overrides = root.path().join("templates");
        std::fs::create_dir_all(&overrides).unwrap();
        std::fs::write(
            overrides.join(ANDROID_BUILDER_JSON),
            r#"{"res": {"drawable": {"splash.png": "splash_screen.png"}}, "wscript": ["ignored.txt"]}"#,
        )
        .unwrap();
        std::fs::write(overrides.join("splash.png"), [0x89u8, b'P', b'N', b'G', b'$']).unwrap();
        let templates = TemplateSet::with_override(&overrides).unwrap();

        let app = root.path().join("app");
        let rules = BuilderRules::load(&templates, &env).unwrap();
        assert_eq!(rules.apply(&templates, &env, &app, false).unwrap(), 1);
        assert_eq!(
            std::fs::read(app.join("res/drawable/splash_screen.png")).unwrap(),
            vec![0x89u8, b'P', b'N', b'G', b'$']
        );
        assert!(!app.join("wscript").exists());
    }

    #[test]
    fn test_invalid_rules() {
        let root = tempfile::tempdir().unwrap();
        let env = env(root.path());
        let overrides = root.path().join("templates");
        std::fs::create_dir_all(&overrides).unwrap();
        std::fs::write(overrides.join(ANDROID_BUILDER_JSON), r#"{"res": 4}"#).unwrap();
        let templates = TemplateSet::with_override(&overrides).unwrap();
        let rules = BuilderRules::load(&templates, &env).unwrap();
        assert!(matches!(
            rules.apply(&templates, &env, &root.path().join("app"), false),
            Err(BuildError::BuilderRules(_))
        ));
    }
}
