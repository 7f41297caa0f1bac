//! Screen orientation flags

use std::fmt;

/// Orientations the application can be displayed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Orientation {
    Landscape,
    Portrait,
    #[default]
    Both,
}

impl Orientation {
    /// Map an `android:screenOrientation` value onto a flag set
    pub fn from_screen_orientation(value: &str) -> Self {
        match value {
            "landscape" | "reverseLandscape" | "sensorLandscape" | "userLandscape" => Orientation::Landscape,
            "portrait" | "reversePortrait" | "sensorPortrait" | "userPortrait" => Orientation::Portrait,
            _ => Orientation::Both,
        }
    }

    pub fn includes(self, other: Orientation) -> bool {
        self == Orientation::Both || self == other
    }

    /// Resource qualifier (`land` / `port`) for a single orientation
    pub fn resource_key(self) -> Option<&'static str> {
        match self {
            Orientation::Landscape => Some("land"),
            Orientation::Portrait => Some("port"),
            Orientation::Both => None,
        }
    }

    /// The opposite single orientation, `None` for [`Orientation::Both`]
    pub fn opposite(self) -> Option<Orientation> {
        match self {
            Orientation::Landscape => Some(Orientation::Portrait),
            Orientation::Portrait => Some(Orientation::Landscape),
            Orientation::Both => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Landscape => "LANDSCAPE",
            Orientation::Portrait => "PORTRAIT",
            Orientation::Both => "BOTH",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two single orientations with their resource qualifiers
pub const SINGLE_ORIENTATIONS: [Orientation; 2] = [Orientation::Landscape, Orientation::Portrait];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_families() {
        for value in ["landscape", "reverseLandscape", "sensorLandscape", "userLandscape"] {
            assert_eq!(Orientation::from_screen_orientation(value), Orientation::Landscape);
        }
        for value in ["portrait", "reversePortrait", "sensorPortrait", "userPortrait"] {
            assert_eq!(Orientation::from_screen_orientation(value), Orientation::Portrait);
        }
        assert_eq!(Orientation::from_screen_orientation("fullSensor"), Orientation::Both);
        assert_eq!(Orientation::from_screen_orientation(""), Orientation::Both);
    }

    #[test]
    fn test_includes() {
        assert!(Orientation::Both.includes(Orientation::Portrait));
        assert!(Orientation::Landscape.includes(Orientation::Landscape));
        assert!(!Orientation::Landscape.includes(Orientation::Portrait));
    }
}
