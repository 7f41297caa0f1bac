//! Icon and splash screen overrides
//!
//! Overrides are planned first (copies, folder removals and warnings) and then
//! applied to `app/src/main/res`.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::environment::ManifestEnv;
use crate::orientation::{Orientation, SINGLE_ORIENTATIONS};
use crate::project::DensityOverrides;
use crate::ManifestError;

pub const APP_ICON_NAME: &str = "app_icon.png";
pub const APP_SPLASH_NAME: &str = "app_splash.png";

pub const MIPMAP_PREFIX: &str = "mipmap";
pub const DRAWABLE_PREFIX: &str = "drawable";

/// Icon densities
pub const ICON_DENSITIES: &[&str] = &["mdpi", "hdpi", "xhdpi", "xxhdpi", "xxxhdpi"];

/// Splash densities (no xxxhdpi for drawables)
pub const SPLASH_DENSITIES: &[&str] = &["mdpi", "hdpi", "xhdpi", "xxhdpi"];

/// One image to copy, destination relative to the `res` folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceCopy {
    pub source: PathBuf,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePlan {
    pub copies: Vec<ResourceCopy>,
    /// Folders relative to the `res` folder that must not exist
    pub removals: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

/// Resolve an override path: absolute as-is, otherwise under `Gem/Resources`
pub fn resolve_source(project_path: &Path, source: &str) -> Result<PathBuf, ManifestError> {
    let path = Path::new(source);
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let resources = project_path.join("Gem").join("Resources");
    if resources.is_dir() {
        return Ok(resources.join(path));
    }
    Err(ManifestError::ResourcesNotFound(project_path.to_path_buf()))
}

impl ResourcePlan {
    /// Plan the overrides for `env`, resolving relative images against `project_path`
    pub fn build(env: &ManifestEnv, project_path: &Path) -> Result<Self, ManifestError> {
        let mut plan = ResourcePlan::default();
        if let Some(icons) = &env.icons {
            plan.plan_icons(icons, project_path)?;
        }
        if let Some(splash) = &env.splash_screen {
            plan.plan_splash(splash, env.orientation, project_path)?;
        }
        plan.plan_unused(env.orientation);
        Ok(plan)
    }

    fn copy(&mut self, project_path: &Path, source: &str, folder: String, file: &str) -> Result<(), ManifestError> {
        let source = resolve_source(project_path, source)?;
        if !source.is_file() {
            return Err(ManifestError::MissingFile(source));
        }
        self.copies.push(ResourceCopy {
            source,
            destination: PathBuf::from(folder).join(file),
        });
        Ok(())
    }

    fn plan_icons(&mut self, icons: &DensityOverrides, project_path: &Path) -> Result<(), ManifestError> {
        let default = icons.default_image();
        match default {
            Some(image) => self.copy(project_path, image, MIPMAP_PREFIX.to_string(), APP_ICON_NAME)?,
            None => debug!("No default icon override for {}", project_path.display()),
        }

        let mut missing = Vec::new();
        for density in ICON_DENSITIES {
            let folder = format!("{}-{}", MIPMAP_PREFIX, density);
            match (icons.get(density), default) {
                (Some(image), _) => self.copy(project_path, image, folder, APP_ICON_NAME)?,
                (None, Some(_)) => self.removals.push(PathBuf::from(folder)),
                (None, None) => missing.push(format!(
                    "No icon override found for \"{}\". Either supply one for \"{}\" or a \"default\" in the android_settings \"icons\" section",
                    density, density
                )),
            }
        }
        // Nothing set at all is not worth one warning per density
        if missing.len() != ICON_DENSITIES.len() {
            self.warnings.extend(missing);
        }
        Ok(())
    }

    fn plan_splash(
        &mut self,
        splash: &indexmap::IndexMap<String, DensityOverrides>,
        orientation: Orientation,
        project_path: &Path,
    ) -> Result<(), ManifestError> {
        for flag in SINGLE_ORIENTATIONS {
            let Some(key) = flag.resource_key() else { continue };
            let Some(oriented) = splash.get(key).filter(|o| !o.is_empty()) else {
                continue;
            };

            if !orientation.includes(flag) {
                self.warnings.push(format!(
                    "Splash screen overrides specified for \"{}\" when the orientation is {}. These overrides will be ignored.",
                    key, orientation
                ));
                continue;
            }

            let prefix = format!("{}-{}", DRAWABLE_PREFIX, key);
            let default = oriented.default_image();
            if let Some(image) = default {
                self.copy(project_path, image, prefix.clone(), APP_SPLASH_NAME)?;
            }

            let mut missing = Vec::new();
            for density in SPLASH_DENSITIES {
                let folder = format!("{}-{}", prefix, density);
                match (oriented.get(density), default) {
                    (Some(image), _) => self.copy(project_path, image, folder, APP_SPLASH_NAME)?,
                    (None, Some(_)) => self.removals.push(PathBuf::from(folder)),
                    (None, None) => missing.push(format!(
                        "No splash screen override found for \"{}-{}\". Either supply one for \"{}\" or a \"default\" in the \"splash_screen\" \"{}\" section",
                        key, density, density, key
                    )),
                }
            }
            if missing.len() != SPLASH_DENSITIES.len() {
                self.warnings.extend(missing);
            }
        }
        Ok(())
    }

    /// A single-orientation app never shows the other orientation's splash images
    fn plan_unused(&mut self, orientation: Orientation) {
        let Some(key) = orientation.opposite().and_then(Orientation::resource_key) else {
            return;
        };
        let prefix = format!("{}-{}", DRAWABLE_PREFIX, key);
        self.removals.push(PathBuf::from(&prefix));
        for density in SPLASH_DENSITIES {
            self.removals.push(PathBuf::from(format!("{}-{}", prefix, density)));
        }
    }

    /// Log the warnings, remove the pruned folders and copy the images into `res_dir`
    pub fn apply(&self, res_dir: &Path) -> Result<(), ManifestError> {
        for warning in &self.warnings {
            warn!("{}", warning);
        }

        for folder in &self.removals {
            let target = res_dir.join(folder);
            if target.is_dir() {
                debug!("Clearing folder {}", target.display());
                std::fs::remove_dir_all(&target).map_err(|source| ManifestError::Write {
                    path: target.clone(),
                    source,
                })?;
            }
        }

        for copy in &self.copies {
            let destination = res_dir.join(&copy.destination);
            if let Some(parent) = destination.parent() {
                std::fs::create_dir_all(parent).map_err(|source| ManifestError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            std::fs::copy(&copy.source, &destination).map_err(|source| ManifestError::Write {
                path: destination.clone(),
                source,
            })?;
            // Sources may be read-only in version control
            let mut permissions = std::fs::metadata(&destination)?.permissions();
            #[allow(clippy::permissions_set_readonly_false)]
            permissions.set_readonly(false);
            std::fs::set_permissions(&destination, permissions)?;
        }
        Ok(())
    }
}
