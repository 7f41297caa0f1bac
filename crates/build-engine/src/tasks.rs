//! Gradle build script sections
//!
//! Builders for the snippets substituted into `build.gradle.in`: the external
//! native build per configuration, the native library copy, the asset layout
//! steps and the dependency blocks. [`BuildGradleEnv`] collects them into the
//! closed record the template is rendered with.

use std::borrow::Cow;
use std::path::Path;

use lydroid_core::{AssetMode, BuildConfiguration, TemplateEnv};

use crate::config::{GeneratorConfig, ANDROID_ARCH};
use crate::gradle_path;
use crate::signing::SigningConfig;

/// Library every app links against
const ANDROIDX_CORE: &str = "androidx.core:core:1.1.0";

/// Where the external native build leaves a configuration's binaries
fn native_output_dir(configuration: BuildConfiguration) -> String {
    let lower = configuration.lower();
    format!("build/intermediates/cmake/{lower}/obj/{ANDROID_ARCH}/{lower}")
}

/// `android { externalNativeBuild { ... } }`
pub fn native_cmake_android(cmake_version: &str, staging_dir: &str, engine_root: &Path) -> String {
    format!(
        r#"
    externalNativeBuild {{
        cmake {{
            buildStagingDirectory "{staging_dir}"
            version "{cmake_version}"
            path "{}/CMakeLists.txt"
        }}
    }}
"#,
        gradle_path(engine_root)
    )
}

/// `defaultConfig { ndk { ... } }`
pub fn native_cmake_default_config() -> String {
    format!(
        r#"
        ndk {{
            abiFilters '{ANDROID_ARCH}'
        }}
"#
    )
}

/// Quoted CMake configure arguments for one configuration
pub fn cmake_arguments(config: &GeneratorConfig, configuration: BuildConfiguration) -> Vec<String> {
    let engine_root = gradle_path(&config.engine_root);
    let mut args = vec![
        "-GNinja".to_string(),
        format!("-S{}", engine_root),
        format!("-DCMAKE_BUILD_TYPE={}", configuration.lower()),
        format!("-DCMAKE_TOOLCHAIN_FILE={}/cmake/Platform/Android/Toolchain_Android.cmake", engine_root),
    ];
    if let Some(third_party) = &config.third_party_path {
        args.push(format!("-DLY_3RDPARTY_PATH={}", gradle_path(third_party)));
    }
    if config.is_unit_test {
        args.push("-DLY_TEST_PROJECT=1".to_string());
    } else {
        args.push(format!("-DLY_PROJECTS={}", gradle_path(&config.project_path)));
    }
    args.extend([
        format!("-DANDROID_NATIVE_API_LEVEL={}", config.native_api_level),
        format!("-DLY_NDK_DIR={}", gradle_path(&config.android_ndk_path)),
        "-DANDROID_STL=c++_shared".to_string(),
        "-Wno-deprecated".to_string(),
    ]);
    if configuration == BuildConfiguration::Release {
        args.push("-DLY_MONOLITHIC_GAME=1".to_string());
    }
    if let Some(ninja) = &config.toolchain.ninja_path {
        args.push(format!("-DCMAKE_MAKE_PROGRAM={}", gradle_path(ninja)));
    }
    if config.oculus_project {
        args.push("-DANDROID_USE_OCULUS_OPENXR=ON".to_string());
    }
    args.push(format!("-DLY_UNITY_BUILD={}", if config.enable_unity_build { "ON" } else { "OFF" }));
    args.extend(config.extra_cmake_args.iter().cloned());

    args.into_iter().map(gradle_string).collect()
}

/// Double-quoted Groovy string literal with JSON escaping
fn gradle_string(value: String) -> String {
    serde_json::Value::String(value).to_string()
}

/// `buildTypes { <config> { externalNativeBuild { ... } } }`
pub fn native_cmake_build_type(targets: Option<&str>, arguments: &[String]) -> String {
    let targets = targets.map(|t| format!("targets \"{}\"", t)).unwrap_or_default();
    format!(
        r#"
            externalNativeBuild {{
                cmake {{
                    {targets}
                    arguments {}
                }}
            }}
"#,
        arguments.join(",")
    )
}

/// Mirror the configuration's shared libraries into the JNI folder. The
/// launcher library itself is loaded by Gradle's own packaging.
pub fn copy_native_libs_task(configuration: BuildConfiguration, launcher: Option<&str>) -> String {
    let c = configuration.name();
    let exclude = launcher
        .map(|name| format!(", exclude: 'lib{}.so'", name))
        .unwrap_or_default();
    format!(
        r#"
    task copyNativeLibs{c}(type: Copy) {{
        delete 'outputs/native-lib/{ANDROID_ARCH}'

        from fileTree(dir: '{}', include: '**/*.so'{exclude} )
        into  'outputs/native-lib/{ANDROID_ARCH}'
    }}

    compile{c}Sources.dependsOn copyNativeLibs{c}
    merge{c}JniLibFolders.dependsOn copyNativeLibs{c}

    copyNativeLibs{c}.mustRunAfter {{
        tasks.findAll {{ task->task.name.contains('externalNativeBuild{c}') }}
    }}
"#,
        native_output_dir(configuration)
    )
}

/// Copy test fixtures produced by the native build into the APK assets
pub fn copy_test_artifacts_task(configuration: BuildConfiguration, layout_dir: &Path) -> String {
    let c = configuration.name();
    format!(
        r#"
    task copyNativeArtifacts{c}(type: Copy) {{
        from fileTree(dir: '{}', include: 'Test.Assets/**/*.*' )
        into  '{}'
    }}

    compile{c}Sources.dependsOn copyNativeArtifacts{c}
    merge{c}Assets.dependsOn copyNativeArtifacts{c}

    copyNativeArtifacts{c}.mustRunAfter {{
        tasks.findAll {{ task->task.name.contains('externalNativeBuild{c}') }}
    }}
"#,
        native_output_dir(configuration),
        gradle_path(layout_dir)
    )
}

/// Run the engine layout tool, then mirror the settings registry into the layout.
/// Release layouts are always PAK.
pub fn asset_layout_task(config: &GeneratorConfig, configuration: BuildConfiguration) -> String {
    let c = configuration.name();
    let mode = match configuration {
        BuildConfiguration::Release => AssetMode::Pak,
        _ => config.asset_mode,
    };
    let layout_dir = gradle_path(&config.asset_layout_dir());
    format!(
        r#"
    task syncLYLayoutMode{c}(type:Exec) {{
        workingDir '{}/cmake/Tools'
        commandLine '{}', 'layout_tool.py', '--project-path', '{}', '-p', 'Android', '-a', '{}', '-m', '{mode}', '--create-layout-root', '-l', '{layout_dir}'
    }}

    task copyRegistryFolder{c}(type: Copy) {{
        from fileTree(dir: '{}', include: '**/Registry/*.setreg' )
        into  '{layout_dir}'
    }}

    copyRegistryFolder{c}.dependsOn syncLYLayoutMode{c}
    copyRegistryFolder{c}.mustRunAfter {{
        tasks.findAll {{ task->task.name.contains('externalNativeBuild{c}') }}
    }}

    compile{c}Sources.dependsOn copyRegistryFolder{c}
    merge{c}Assets.dependsOn copyRegistryFolder{c}
"#,
        gradle_path(&config.engine_root),
        gradle_path(&config.python_path()),
        gradle_path(&config.project_path),
        config.asset_type,
        native_output_dir(configuration),
    )
}

/// The app's dependency block: every patched library plus androidx core
pub fn app_dependencies(libraries: &[String]) -> String {
    let projects: Vec<String> = libraries
        .iter()
        .map(|name| format!("    api project(path: ':{}')", name))
        .collect();
    format!("\ndependencies {{\n{}\n    api '{}'\n}}\n", projects.join("\n"), ANDROIDX_CORE)
}

/// A library's dependency block, empty when it has none
pub fn library_dependencies(build_dependencies: &[String], dependencies: &[String]) -> String {
    let lines: Vec<String> = build_dependencies
        .iter()
        .map(|dep| format!("    api '{}'", dep))
        .chain(dependencies.iter().map(|dep| format!("    api project(path: ':{}')", dep)))
        .collect();
    if lines.is_empty() {
        String::new()
    } else {
        format!("dependencies {{\n{}\n}}", lines.join("\n"))
    }
}

/// Java sources of the engine's Android framework plus the app's own
pub fn java_sourceset(engine_root: &Path) -> String {
    format!(
        r#"
            java {{
                srcDirs = ['{}/Code/Framework/AzAndroid/java', 'src/main/java']
            }}
"#,
        gradle_path(engine_root)
    )
}

/// The `namespace` DSL appeared with plugin 7.0
pub fn namespace_declaration(android_gradle_plugin: &str, namespace: &str) -> String {
    let major = android_gradle_plugin
        .split('.')
        .next()
        .and_then(|m| m.trim().parse::<u32>().ok())
        .unwrap_or(0);
    if major >= 7 && !namespace.is_empty() {
        format!("\n    namespace '{}'", namespace)
    } else {
        String::new()
    }
}

/// Per-configuration sections of `build.gradle`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSections {
    pub native_cmake: String,
    pub copy_native_libs: String,
    pub asset_layout: String,
    pub signing: String,
}

/// Substitution record for `build.gradle.in`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildGradleEnv {
    pub target_type: &'static str,
    pub namespace_declaration: String,
    pub project_dependencies: String,
    pub native_cmake_android: String,
    pub native_cmake_default_config: String,
    pub override_java_sourceset: String,
    pub optional_jni_src_lib_set: String,
    pub signing_configs: String,
    /// In [`BuildConfiguration::ALL`] order
    pub configurations: [ConfigSections; 3],
}

impl BuildGradleEnv {
    /// Java-only Android library subproject
    pub fn library(namespace_declaration: String, project_dependencies: String) -> Self {
        Self {
            target_type: "library",
            namespace_declaration,
            project_dependencies,
            native_cmake_android: String::new(),
            native_cmake_default_config: String::new(),
            override_java_sourceset: String::new(),
            optional_jni_src_lib_set: String::new(),
            signing_configs: String::new(),
            configurations: Default::default(),
        }
    }

    /// The application project that builds the APK
    pub fn application(config: &GeneratorConfig, package_name: &str, launcher: &str, libraries: &[String]) -> Self {
        let configurations = BuildConfiguration::ALL.map(|configuration| {
            let arguments = cmake_arguments(config, configuration);
            let targets = (!config.is_unit_test).then_some(launcher);
            ConfigSections {
                native_cmake: native_cmake_build_type(targets, &arguments),
                copy_native_libs: copy_native_libs_task(configuration, targets),
                asset_layout: if config.is_unit_test {
                    copy_test_artifacts_task(configuration, &config.asset_layout_dir())
                } else {
                    asset_layout_task(config, configuration)
                },
                signing: config
                    .signing
                    .as_ref()
                    .map(|_| SigningConfig::build_type_line(configuration))
                    .unwrap_or_default(),
            }
        });

        Self {
            target_type: "application",
            namespace_declaration: namespace_declaration(&config.android_gradle_plugin, package_name),
            project_dependencies: app_dependencies(libraries),
            native_cmake_android: native_cmake_android(
                &config.toolchain.cmake_version,
                &config.native_build_path,
                &config.engine_root,
            ),
            native_cmake_default_config: native_cmake_default_config(),
            override_java_sourceset: java_sourceset(&config.engine_root),
            optional_jni_src_lib_set: ", \"outputs/native-lib\"".to_string(),
            signing_configs: config.signing.as_ref().map(SigningConfig::gradle_block).unwrap_or_default(),
            configurations,
        }
    }

    fn sections(&self, configuration: &str) -> Option<&ConfigSections> {
        BuildConfiguration::ALL
            .iter()
            .position(|c| c.name().eq_ignore_ascii_case(configuration))
            .map(|index| &self.configurations[index])
    }

    fn config_value(&self, key: &str) -> Option<&str> {
        if let Some(c) = key.strip_prefix("NATIVE_CMAKE_SECTION_").and_then(|k| k.strip_suffix("_CONFIG")) {
            return self.sections(c).map(|s| s.native_cmake.as_str());
        }
        if let Some(c) = key.strip_prefix("CUSTOM_GRADLE_COPY_NATIVE_").and_then(|k| k.strip_suffix("_LIB_TASK")) {
            return self.sections(c).map(|s| s.copy_native_libs.as_str());
        }
        if let Some(c) = key.strip_prefix("CUSTOM_APPLY_ASSET_LAYOUT_").and_then(|k| k.strip_suffix("_TASK")) {
            return self.sections(c).map(|s| s.asset_layout.as_str());
        }
        if let Some(c) = key.strip_prefix("SIGNING_").and_then(|k| k.strip_suffix("_CONFIG")) {
            return self.sections(c).map(|s| s.signing.as_str());
        }
        None
    }
}

impl TemplateEnv for BuildGradleEnv {
    const KEYS: &'static [&'static str] = &[
        "TARGET_TYPE",
        "NAMESPACE_DECLARATION",
        "PROJECT_DEPENDENCIES",
        "NATIVE_CMAKE_SECTION_ANDROID",
        "NATIVE_CMAKE_SECTION_DEFAULT_CONFIG",
        "NATIVE_CMAKE_SECTION_DEBUG_CONFIG",
        "NATIVE_CMAKE_SECTION_PROFILE_CONFIG",
        "NATIVE_CMAKE_SECTION_RELEASE_CONFIG",
        "OVERRIDE_JAVA_SOURCESET",
        "OPTIONAL_JNI_SRC_LIB_SET",
        "CUSTOM_GRADLE_COPY_NATIVE_DEBUG_LIB_TASK",
        "CUSTOM_GRADLE_COPY_NATIVE_PROFILE_LIB_TASK",
        "CUSTOM_GRADLE_COPY_NATIVE_RELEASE_LIB_TASK",
        "CUSTOM_APPLY_ASSET_LAYOUT_DEBUG_TASK",
        "CUSTOM_APPLY_ASSET_LAYOUT_PROFILE_TASK",
        "CUSTOM_APPLY_ASSET_LAYOUT_RELEASE_TASK",
        "SIGNING_CONFIGS",
        "SIGNING_DEBUG_CONFIG",
        "SIGNING_PROFILE_CONFIG",
        "SIGNING_RELEASE_CONFIG",
    ];

    fn value(&self, key: &str) -> Option<Cow<'_, str>> {
        let value = match key {
            "TARGET_TYPE" => self.target_type,
            "NAMESPACE_DECLARATION" => self.namespace_declaration.as_str(),
            "PROJECT_DEPENDENCIES" => self.project_dependencies.as_str(),
            "NATIVE_CMAKE_SECTION_ANDROID" => self.native_cmake_android.as_str(),
            "NATIVE_CMAKE_SECTION_DEFAULT_CONFIG" => self.native_cmake_default_config.as_str(),
            "OVERRIDE_JAVA_SOURCESET" => self.override_java_sourceset.as_str(),
            "OPTIONAL_JNI_SRC_LIB_SET" => self.optional_jni_src_lib_set.as_str(),
            "SIGNING_CONFIGS" => self.signing_configs.as_str(),
            other => self.config_value(other)?,
        };
        Some(Cow::Borrowed(value))
    }
}
