//! Android support library patching
//!
//! `android_libraries.json` names third-party Android libraries shipped with the
//! SDK, where to find them and which lines to patch. Every library is resolved
//! and every change checked before anything is written; the patched libraries
//! are then emitted as Gradle library subprojects in one pass.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, info};
use walkdir::WalkDir;

use lydroid_core::LyDroidError;
use lydroid_manifest_manager::{ManifestSummary, ANDROID_MANIFEST_FILE};

use crate::tasks::{library_dependencies, namespace_declaration, BuildGradleEnv};
use crate::templates::{TemplateSet, BUILD_GRADLE_TEMPLATE};
use crate::{write_generated, BuildError};

/// Library patching errors
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("Invalid library script: {0}")]
    InvalidScript(String),
    #[error("Failed to find library - {name} - in path(s) [{}]. Please download the library from the Android SDK Manager and run this command again", .candidates.join(", "))]
    LibraryNotFound { name: String, candidates: Vec<String> },
    #[error("Library '{library}' has no file {path}")]
    SourceMissing { library: String, path: PathBuf },
    #[error("Library '{library}': line {line} is past the end of {file} ({lines} lines)")]
    LineOutOfRange { library: String, file: String, line: usize, lines: usize },
    #[error("Library '{library}': line {line} of {file} does not contain '{old}'")]
    NoMatch { library: String, file: String, line: usize, old: String },
    #[error("Unable to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
}

impl From<PatchError> for LyDroidError {
    fn from(err: PatchError) -> Self {
        match err {
            PatchError::InvalidScript(_) => LyDroidError::InvalidArgument(err.to_string()),
            PatchError::LibraryNotFound { .. } | PatchError::SourceMissing { .. } => {
                LyDroidError::FileNotFound(err.to_string())
            }
            PatchError::LineOutOfRange { .. } | PatchError::NoMatch { .. } => LyDroidError::Environment(err.to_string()),
            PatchError::Read { .. } => LyDroidError::Generic(err.to_string()),
        }
    }
}

/// A single string or a list of strings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Lines {
    One(String),
    Many(Vec<String>),
}

impl Lines {
    fn into_vec(self) -> Vec<String> {
        match self {
            Lines::One(line) => vec![line],
            Lines::Many(lines) => lines,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ChangeSpec {
    line: usize,
    old: Lines,
    #[serde(default)]
    new: Option<Lines>,
}

#[derive(Debug, Clone, Deserialize)]
struct FilePatchSpec {
    path: String,
    #[serde(default)]
    changes: Vec<ChangeSpec>,
}

#[derive(Debug, Clone, Deserialize)]
struct LibrarySpec {
    #[serde(rename = "srcDir")]
    src_dir: Vec<String>,
    #[serde(default)]
    patches: Vec<FilePatchSpec>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default, rename = "buildDependencies")]
    build_dependencies: Vec<String>,
}

/// One replacement: the first `old` on 1-based `line` becomes `new`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub line: usize,
    pub old: String,
    pub new: String,
}

impl ChangeSpec {
    /// A multi-line change pairs the n-th old line with the n-th new line; the
    /// last old line takes whatever new lines remain.
    fn expand(self) -> Vec<Change> {
        let old = self.old.into_vec();
        let mut new = self.new.map(Lines::into_vec).unwrap_or_default().into_iter();
        let mut changes = Vec::with_capacity(old.len());
        let last = old.len().saturating_sub(1);
        for (offset, old_line) in old.into_iter().enumerate() {
            let replacement = if offset < last {
                new.next().unwrap_or_default()
            } else {
                new.by_ref().collect::<Vec<_>>().join("\n")
            };
            changes.push(Change { line: self.line + offset, old: old_line, new: replacement });
        }
        changes
    }
}

/// A library file after patching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchedFile {
    /// Path inside the library source, e.g. `src/com/google/.../Foo.java`
    pub path: String,
    pub content: String,
}

impl PatchedFile {
    /// Destination inside the generated subproject's `src/main`
    fn destination(&self) -> PathBuf {
        if self.path == ANDROID_MANIFEST_FILE {
            PathBuf::from(ANDROID_MANIFEST_FILE)
        } else if let Some(rest) = self.path.strip_prefix("src/") {
            Path::new("java").join(rest)
        } else {
            PathBuf::from(&self.path)
        }
    }
}

/// A resolved library with its patches already applied in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchedLibrary {
    pub name: String,
    pub source_dir: PathBuf,
    pub files: Vec<PatchedFile>,
    pub dependencies: Vec<String>,
    pub build_dependencies: Vec<String>,
}

impl PatchedLibrary {
    /// Package declared by the library manifest (patched copy first)
    pub fn namespace(&self) -> Option<String> {
        let manifest = match self.files.iter().find(|f| f.path == ANDROID_MANIFEST_FILE) {
            Some(patched) => patched.content.clone(),
            None => std::fs::read_to_string(self.source_dir.join(ANDROID_MANIFEST_FILE)).ok()?,
        };
        match ManifestSummary::parse(&manifest) {
            Ok(summary) => summary.package,
            Err(e) => {
                debug!("Unable to read the package of library {}: {}", self.name, e);
                None
            }
        }
    }
}

/// Apply `changes` to `text`, checking each one
fn apply_changes(library: &str, file: &str, text: &str, changes: &[Change]) -> Result<String, PatchError> {
    let mut lines: Vec<String> = text.split_inclusive('\n').map(str::to_string).collect();
    for change in changes {
        let index = change.line.checked_sub(1).filter(|i| *i < lines.len()).ok_or_else(|| {
            PatchError::LineOutOfRange {
                library: library.to_string(),
                file: file.to_string(),
                line: change.line,
                lines: lines.len(),
            }
        })?;
        if !lines[index].contains(&change.old) {
            return Err(PatchError::NoMatch {
                library: library.to_string(),
                file: file.to_string(),
                line: change.line,
                old: change.old.clone(),
            });
        }
        lines[index] = lines[index].replacen(&change.old, &change.new, 1);
    }
    Ok(lines.concat())
}

/// Parsed `android_libraries.json`
#[derive(Debug, Clone)]
pub struct LibraryPatcher {
    libraries: IndexMap<String, LibrarySpec>,
}

impl LibraryPatcher {
    /// Parse the already substituted script
    pub fn parse(script: &str) -> Result<Self, PatchError> {
        let libraries = serde_json::from_str(script).map_err(|e| PatchError::InvalidScript(e.to_string()))?;
        Ok(Self { libraries })
    }

    pub fn library_names(&self) -> Vec<&str> {
        self.libraries.keys().map(String::as_str).collect()
    }

    /// Resolve every library and apply every change in memory
    pub fn prepare(&self) -> Result<Vec<PatchedLibrary>, PatchError> {
        let mut prepared = Vec::with_capacity(self.libraries.len());
        for (name, spec) in &self.libraries {
            let source_dir = spec
                .src_dir
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists())
                .ok_or_else(|| PatchError::LibraryNotFound {
                    name: name.clone(),
                    candidates: spec.src_dir.clone(),
                })?;
            debug!("Library {} found at {}", name, source_dir.display());

            let mut files = Vec::with_capacity(spec.patches.len());
            for patch in &spec.patches {
                let path = source_dir.join(&patch.path);
                if !path.is_file() {
                    return Err(PatchError::SourceMissing { library: name.clone(), path });
                }
                let text = std::fs::read_to_string(&path).map_err(|source| PatchError::Read { path, source })?;
                let changes: Vec<Change> = patch.changes.iter().cloned().flat_map(ChangeSpec::expand).collect();
                let content = apply_changes(name, &patch.path, &text, &changes)?;
                files.push(PatchedFile { path: patch.path.clone(), content });
            }

            prepared.push(PatchedLibrary {
                name: name.clone(),
                source_dir,
                files,
                dependencies: spec.dependencies.clone(),
                build_dependencies: spec.build_dependencies.clone(),
            });
        }
        Ok(prepared)
    }

    /// Emit each library as `<build_dir>/<name>`, returning the subproject names
    pub fn emit(
        libraries: &[PatchedLibrary],
        build_dir: &Path,
        templates: &TemplateSet,
        android_gradle_plugin: &str,
        overwrite_existing: bool,
    ) -> Result<Vec<String>, BuildError> {
        let template = templates.template(BUILD_GRADLE_TEMPLATE)?;
        let mut names = Vec::with_capacity(libraries.len());

        for library in libraries {
            let dst = build_dir.join(&library.name);
            let dst_src = dst.join("src");
            if dst_src.exists() {
                std::fs::remove_dir_all(&dst_src)?;
            }
            std::fs::create_dir_all(&dst)?;
            info!("Copying library '{}' to '{}'", library.name, dst.display());

            let env = BuildGradleEnv::library(
                namespace_declaration(android_gradle_plugin, &library.namespace().unwrap_or_default()),
                library_dependencies(&library.build_dependencies, &library.dependencies),
            );
            write_generated(&dst.join("build.gradle"), &template.render(&env)?, overwrite_existing)?;

            let main = dst_src.join("main");
            std::fs::create_dir_all(&main)?;
            copy_tree(&library.source_dir.join("res"), &main.join("res"))?;
            copy_tree(&library.source_dir.join("src"), &main.join("java"))?;
            let manifest = library.source_dir.join(ANDROID_MANIFEST_FILE);
            if manifest.is_file() {
                std::fs::copy(&manifest, main.join(ANDROID_MANIFEST_FILE))?;
            }

            for file in &library.files {
                debug!("  Patching file '{}'", file.path);
                let target = main.join(file.destination());
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&target, &file.content).map_err(|source| BuildError::Write { path: target, source })?;
            }
            names.push(library.name.clone());
        }
        Ok(names)
    }
}

/// Recursive copy; a missing source is skipped
fn copy_tree(from: &Path, to: &Path) -> Result<(), BuildError> {
    if !from.is_dir() {
        return Ok(());
    }
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry.map_err(|e| BuildError::Io(e.into()))?;
        let Ok(relative) = entry.path().strip_prefix(from) else { continue };
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
<manifest xmlns:android=\"http://schemas.android.com/apk/res/android\"\n    package=\"com.google.android.vending.licensing\">\n\
    <uses-sdk android:minSdkVersion=\"3\" android:targetSdkVersion=\"15\"/>\n\
    <uses-permission android:name=\"com.android.vending.CHECK_LICENSE\"/>\n\
</manifest>\n";

    fn library(root: &Path) -> PathBuf {
        let lib = root.join("extras/google/play_licensing/library");
        std::fs::create_dir_all(lib.join("src/com/google/licensing")).unwrap();
        std::fs::create_dir_all(lib.join("res/values")).unwrap();
        std::fs::write(lib.join(ANDROID_MANIFEST_FILE), MANIFEST).unwrap();
        std::fs::write(
            lib.join("src/com/google/licensing/Policy.java"),
            "package com.google.licensing;\nimport org.apache.http.NameValuePair;\npublic interface Policy {}\n",
        )
        .unwrap();
        std::fs::write(lib.join("res/values/strings.xml"), "<resources/>\n").unwrap();
        lib
    }

    fn script(root: &Path, changes: &str) -> String {
        format!(
            r#"{{
                "play_licensing": {{
                    "srcDir": ["{0}/extras/google/market_licensing/library", "{0}/extras/google/play_licensing/library"],
                    "patches": [
                        {{"path": "AndroidManifest.xml", "changes": [{{"line": 4, "old": "<uses-sdk android:minSdkVersion=\"3\" android:targetSdkVersion=\"15\"/>", "new": ""}}]}},
                        {{"path": "src/com/google/licensing/Policy.java", "changes": [{changes}]}}
                    ],
                    "buildDependencies": ["androidx.core:core:1.1.0"]
                }}
            }}"#,
            root.display()
        )
    }

    #[test]
    fn test_prepare_applies_changes() {
        let root = tempfile::tempdir().unwrap();
        library(root.path());
        let patcher = LibraryPatcher::parse(&script(
            root.path(),
            r#"{"line": 2, "old": ["org.apache.http.NameValuePair;", "interface Policy"], "new": ["java.util.Map;", "class Policy"]}"#,
        ))
        .unwrap();

        let prepared = patcher.prepare().unwrap();
        assert_eq!(prepared.len(), 1);
        let lib = &prepared[0];
        assert!(lib.source_dir.ends_with("play_licensing/library"));
        assert!(!lib.files[0].content.contains("uses-sdk"));
        assert_eq!(
            lib.files[1].content,
            "package com.google.licensing;\nimport java.util.Map;\npublic class Policy {}\n"
        );
        assert_eq!(lib.namespace().as_deref(), Some("com.google.android.vending.licensing"));
    }

    #[test]
    fn test_mismatch_fails_before_writing() {
        let root = tempfile::tempdir().unwrap();
        library(root.path());
        let patcher = LibraryPatcher::parse(&script(
            root.path(),
            r#"{"line": 1, "old": "org.apache.http.NameValuePair;", "new": "java.util.Map;"}"#,
        ))
        .unwrap();

        let err = patcher.prepare().unwrap_err();
        assert!(matches!(err, PatchError::NoMatch { line: 1, .. }));
        assert_eq!(LyDroidError::from(err).kind(), lydroid_core::ErrorKind::Environment);
    }

    #[test]
    fn test_line_out_of_range() {
        let root = tempfile::tempdir().unwrap();
        library(root.path());
        let patcher =
            LibraryPatcher::parse(&script(root.path(), r#"{"line": 40, "old": "Policy", "new": "Rules"}"#)).unwrap();
        assert!(matches!(patcher.prepare().unwrap_err(), PatchError::LineOutOfRange { line: 40, lines: 3, .. }));
    }

    #[test]
    fn test_missing_library_lists_candidates() {
        let root = tempfile::tempdir().unwrap();
        let patcher = LibraryPatcher::parse(&script(root.path(), "")).unwrap();
        let err = patcher.prepare().unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Failed to find library - play_licensing - in path(s) ["));
        assert!(message.contains("market_licensing/library, "));
    }

    #[test]
    fn test_emit_library_subproject() {
        let root = tempfile::tempdir().unwrap();
        library(root.path());
        let build = root.path().join("build");
        let patcher = LibraryPatcher::parse(&script(
            root.path(),
            r#"{"line": 2, "old": "org.apache.http.NameValuePair;", "new": "java.util.Map;"}"#,
        ))
        .unwrap();
        let prepared = patcher.prepare().unwrap();

        let names = LibraryPatcher::emit(&prepared, &build, &TemplateSet::builtin(), "8.1.0", false).unwrap();
        assert_eq!(names, vec!["play_licensing".to_string()]);

        let lib = build.join("play_licensing");
        let gradle = std::fs::read_to_string(lib.join("build.gradle")).unwrap();
        assert!(gradle.starts_with("apply plugin: \"com.android.library\""));
        assert!(gradle.contains("namespace 'com.google.android.vending.licensing'"));
        assert!(gradle.contains("dependencies {\n    api 'androidx.core:core:1.1.0'\n}"));
        assert!(!gradle.contains("externalNativeBuild"));

        let main = lib.join("src/main");
        assert!(main.join("res/values/strings.xml").is_file());
        let policy = std::fs::read_to_string(main.join("java/com/google/licensing/Policy.java")).unwrap();
        assert!(policy.contains("import java.util.Map;"));
        let manifest = std::fs::read_to_string(main.join(ANDROID_MANIFEST_FILE)).unwrap();
        assert!(!manifest.contains("uses-sdk"));
    }
}
