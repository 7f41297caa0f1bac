//! Multi-window and Samsung DeX manifest fragments

use serde_json::Value;
use tracing::warn;

use crate::project::MultiWindowSettings;
use crate::xml_escape;

/// Configuration changes the activity handles itself
pub const DEFAULT_CONFIG_CHANGES: &[&str] = &[
    "keyboard",
    "keyboardHidden",
    "orientation",
    "screenSize",
    "smallestScreenSize",
    "screenLayout",
    "uiMode",
];

/// Manifest fragments derived from `multi_window_options`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiWindowOptions {
    pub config_changes: String,
    /// `android:resizeableActivity` attribute, empty when not set
    pub multi_window: String,
    /// `<layout>` element, empty when not set
    pub multi_window_properties: String,
    pub samsung_dex_keep_alive: String,
    pub samsung_dex_launch_width: String,
    pub samsung_dex_launch_height: String,
}

impl Default for MultiWindowOptions {
    fn default() -> Self {
        Self {
            config_changes: DEFAULT_CONFIG_CHANGES.join("|"),
            multi_window: String::new(),
            multi_window_properties: String::new(),
            samsung_dex_keep_alive: String::new(),
            samsung_dex_launch_width: String::new(),
            samsung_dex_launch_height: String::new(),
        }
    }
}

/// A positive whole number, or `None`. Non-integer values are reported.
fn whole_number(value: Option<&Value>, name: &str) -> Option<i64> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => match n.as_i64() {
            Some(0) => None,
            Some(v) => Some(v),
            None => {
                warn!("Invalid value for property \"{}\", expected whole number", name);
                None
            }
        },
        Some(_) => {
            warn!("Invalid value for property \"{}\", expected whole number", name);
            None
        }
    }
}

fn meta_data(name: &str, value: impl std::fmt::Display) -> String {
    format!("<meta-data android:name=\"{}\" android:value=\"{}\"/>", name, value)
}

impl MultiWindowOptions {
    pub fn from_settings(settings: Option<&MultiWindowSettings>) -> Self {
        let mut options = MultiWindowOptions::default();
        let Some(settings) = settings else {
            return options;
        };

        let mut launch_in_fullscreen = false;
        if let Some(dex) = &settings.samsung_dex_options {
            launch_in_fullscreen = dex.launch_in_fullscreen;
            let width = whole_number(dex.launch_width.as_ref(), "launch_width");
            let height = whole_number(dex.launch_height.as_ref(), "launch_height");

            if let (Some(width), Some(height)) = (width, height) {
                options.samsung_dex_launch_width =
                    meta_data("com.samsung.android.sdk.multiwindow.dex.launchwidth", width);
                options.samsung_dex_launch_height =
                    meta_data("com.samsung.android.sdk.multiwindow.dex.launchheight", height);

                if let Some(keep_alive) = dex.keep_alive.as_ref().and_then(Value::as_bool) {
                    options.samsung_dex_keep_alive =
                        meta_data("com.samsung.android.keepalive.density", keep_alive);
                }
            }
        }

        // Resolution changes arrive as density changes once multi-window is configured
        let mut changes: Vec<&str> = DEFAULT_CONFIG_CHANGES.to_vec();
        changes.push("density");
        options.config_changes = changes.join("|");
        options.multi_window = format!("android:resizeableActivity=\"{}\"", settings.enabled);

        if !settings.enabled {
            return options;
        }

        if launch_in_fullscreen {
            options.samsung_dex_launch_width.clear();
            options.samsung_dex_launch_height.clear();
        }

        let gravity = settings.gravity.as_deref().filter(|g| !g.is_empty());
        let any_layout = [
            &settings.default_width,
            &settings.default_height,
            &settings.min_width,
            &settings.min_height,
        ]
        .iter()
        .any(|v| v.as_ref().is_some_and(|v| !v.is_null()))
            || gravity.is_some();

        if any_layout {
            let mut layout = String::from("<layout ");
            // DeX treats the default size as the launch size
            if !launch_in_fullscreen {
                if let Some(w) = whole_number(settings.default_width.as_ref(), "default_width") {
                    layout.push_str(&format!("android:defaultWidth=\"{}dp\" ", w));
                }
                if let Some(h) = whole_number(settings.default_height.as_ref(), "default_height") {
                    layout.push_str(&format!("android:defaultHeight=\"{}dp\" ", h));
                }
            }
            if let Some(h) = whole_number(settings.min_height.as_ref(), "min_height") {
                layout.push_str(&format!("android:minHeight=\"{}dp\" ", h));
            }
            if let Some(w) = whole_number(settings.min_width.as_ref(), "min_width") {
                layout.push_str(&format!("android:minWidth=\"{}dp\" ", w));
            }
            if let Some(gravity) = gravity {
                layout.push_str(&format!("android:gravity=\"{}\" ", xml_escape(gravity)));
            }
            layout.push_str("/>");
            options.multi_window_properties = layout;
        }

        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(json: &str) -> MultiWindowSettings {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_absent_options_use_defaults() {
        let options = MultiWindowOptions::from_settings(None);
        assert_eq!(options, MultiWindowOptions::default());
        assert!(!options.config_changes.contains("density"));
    }

    #[test]
    fn test_disabled_window_adds_density_and_attribute() {
        let options = MultiWindowOptions::from_settings(Some(&settings(r#"{"enabled": false, "min_width": 300}"#)));
        assert!(options.config_changes.ends_with("|density"));
        assert_eq!(options.multi_window, "android:resizeableActivity=\"false\"");
        assert!(options.multi_window_properties.is_empty());
    }

    #[test]
    fn test_layout_with_invalid_number_dropped() {
        let options = MultiWindowOptions::from_settings(Some(&settings(
            r#"{"enabled": true, "default_width": 800, "default_height": "tall", "min_height": 200, "gravity": "top|end"}"#,
        )));
        assert_eq!(options.multi_window, "android:resizeableActivity=\"true\"");
        assert_eq!(
            options.multi_window_properties,
            "<layout android:defaultWidth=\"800dp\" android:minHeight=\"200dp\" android:gravity=\"top|end\" />"
        );
    }

    #[test]
    fn test_no_layout_without_layout_keys() {
        let options = MultiWindowOptions::from_settings(Some(&settings(r#"{"enabled": true}"#)));
        assert!(options.multi_window_properties.is_empty());
    }

    #[test]
    fn test_dex_launch_size_needs_both_dimensions() {
        let options = MultiWindowOptions::from_settings(Some(&settings(
            r#"{"samsung_dex_options": {"launch_width": 1280, "keep_alive": true}}"#,
        )));
        assert!(options.samsung_dex_launch_width.is_empty());
        assert!(options.samsung_dex_keep_alive.is_empty());

        let options = MultiWindowOptions::from_settings(Some(&settings(
            r#"{"samsung_dex_options": {"launch_width": 1280, "launch_height": 720, "keep_alive": false}}"#,
        )));
        assert!(options.samsung_dex_launch_width.contains("android:value=\"1280\""));
        assert!(options.samsung_dex_launch_height.contains("android:value=\"720\""));
        assert!(options.samsung_dex_keep_alive.contains("android:value=\"false\""));
    }

    #[test]
    fn test_fullscreen_drops_launch_size_and_default_size() {
        let options = MultiWindowOptions::from_settings(Some(&settings(
            r#"{"enabled": true, "default_width": 800, "min_width": 400,
                "samsung_dex_options": {"launch_in_fullscreen": true, "launch_width": 1280, "launch_height": 720}}"#,
        )));
        assert!(options.samsung_dex_launch_width.is_empty());
        assert!(options.samsung_dex_launch_height.is_empty());
        assert_eq!(options.multi_window_properties, "<layout android:minWidth=\"400dp\" />");
    }
}
