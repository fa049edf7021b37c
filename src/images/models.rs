//! Image data models

use serde::{Deserialize, Serialize};

/// A downloadable image offered to the user
///
/// An empty `url` marks a placeholder entry ("nothing found" or "could not
/// load") that must never be flashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSource {
    pub label: String,
    pub url: String,
}

impl ImageSource {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }

    /// Placeholder entry with an empty URL
    pub fn sentinel(label: impl Into<String>) -> Self {
        Self::new(label, "")
    }

    pub fn is_flashable(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_is_not_flashable() {
        assert!(!ImageSource::sentinel("No ISOs found").is_flashable());
        assert!(ImageSource::new("Build", "https://x/y.iso").is_flashable());
    }
}
