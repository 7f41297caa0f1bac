//! Tool and package versions
//!
//! Versions reported by sdkmanager and the host tools come in many shapes
//! (`30.0.3`, `3.20.0-rc1`, `"17.0.2"`, `1.10.2.git`). They are normalized by
//! dropping every character that is not a digit or `.`, then compared
//! component-wise with missing components treated as zero.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone)]
pub struct Version {
    parts: Vec<u64>,
}

impl Version {
    pub fn parse(raw: &str) -> Self {
        let normalized: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
        let parts = normalized
            .split('.')
            .filter(|p| !p.is_empty())
            .map(|p| p.parse::<u64>().unwrap_or(u64::MAX))
            .collect();
        Self { parts }
    }

    /// True when no numeric component could be extracted
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn major(&self) -> u64 {
        self.parts.first().copied().unwrap_or(0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text: Vec<String> = self.parts.iter().map(u64::to_string).collect();
        f.write_str(&text.join("."))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for i in 0..len {
            let a = self.parts.get(i).copied().unwrap_or(0);
            let b = other.parts.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl From<&str> for Version {
    fn from(raw: &str) -> Self {
        Version::parse(raw)
    }
}
