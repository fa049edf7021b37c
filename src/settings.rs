//! Runtime settings
//!
//! Loaded from `settings.json` in the user's config directory. Every field
//! has a default, so a missing or partial file is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config;
use crate::{log_debug, log_info, log_warn};

const MODULE: &str = "settings";

/// What happens to the cached Rufus binary after a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolRetention {
    /// Delete after every session; the next flash downloads it again
    #[default]
    Delete,
    /// Keep the binary in the working directory for reuse
    Keep,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Page scraped for image links
    pub image_page_url: String,
    /// Working directory override; defaults to `<temp>/acreetionos-flasher`
    pub work_dir: Option<PathBuf>,
    pub max_redirects: usize,
    pub metadata_timeout_secs: u64,
    /// Per-request timeout for image and tool downloads; `None` is unbounded
    pub download_timeout_secs: Option<u64>,
    pub connect_timeout_secs: u64,
    /// Privilege escalation wrapper for dd; empty disables elevation
    pub elevation_command: String,
    /// Copy program used by the direct writer
    pub copy_program: String,
    pub tool_retention: ToolRetention,
    /// Where the Rufus binary is fetched from
    pub tool_url: String,
    /// Expected SHA256 of the Rufus binary; verification is skipped if unset
    pub tool_sha256: Option<String>,
    /// Open the Rufus download page when fetching it fails
    pub open_tool_page_on_failure: bool,
    /// Enables DEBUG logging
    pub developer_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            image_page_url: config::urls::DOWNLOAD_PAGE.to_string(),
            work_dir: None,
            max_redirects: config::transfer::MAX_REDIRECTS,
            metadata_timeout_secs: config::transfer::METADATA_TIMEOUT_SECS,
            download_timeout_secs: None,
            connect_timeout_secs: config::transfer::CONNECT_TIMEOUT_SECS,
            elevation_command: config::dd::ELEVATION_COMMAND.to_string(),
            copy_program: config::dd::PROGRAM.to_string(),
            tool_retention: ToolRetention::default(),
            tool_url: config::tool::RUFUS_URL.to_string(),
            tool_sha256: None,
            open_tool_page_on_failure: true,
            developer_mode: false,
        }
    }
}

impl Settings {
    /// Default location of the settings file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(config::app::NAME).join("settings.json"))
    }

    /// Load settings from the default location
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                log_warn!(MODULE, "No config directory available, using defaults");
                Self::default()
            }
        }
    }

    /// Load settings from `path`, falling back to defaults on any problem
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            log_debug!(MODULE, "No settings file at {}, using defaults", path.display());
            return Self::default();
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                log_warn!(MODULE, "Failed to read {}: {}. Using defaults.", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str::<Settings>(&content) {
            Ok(settings) => {
                log_info!(MODULE, "Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                log_warn!(MODULE, "Invalid settings file {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    /// Working directory for downloaded images and the cached tool
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(config::paths::WORK_DIR_NAME))
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    pub fn download_timeout(&self) -> Option<Duration> {
        self.download_timeout_secs.map(Duration::from_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.max_redirects, 8);
        assert_eq!(settings.metadata_timeout(), Duration::from_secs(15));
        assert!(settings.download_timeout().is_none());
        assert_eq!(settings.tool_retention, ToolRetention::Delete);
        assert!(settings.work_dir().ends_with("acreetionos-flasher"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "tool_retention": "keep", "max_redirects": 3 }"#).unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings.tool_retention, ToolRetention::Keep);
        assert_eq!(settings.max_redirects, 3);
        assert_eq!(settings.elevation_command, "pkexec");
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings.max_redirects, config::transfer::MAX_REDIRECTS);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let settings = Settings::load_from(Path::new("/nonexistent/settings.json"));
        assert_eq!(settings.image_page_url, config::urls::DOWNLOAD_PAGE);
    }
}
