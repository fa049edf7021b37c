//! Path utility functions
//!
//! Common path and URL-to-filename helpers used across the application.

use std::path::PathBuf;

use reqwest::Url;

use crate::config;

/// Per-user cache directory for this application (logs live here)
pub fn get_cache_dir(app_name: &str) -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(app_name)
}

/// Last path segment of an absolute URL, without query string or fragment
///
/// Returns `None` when the URL does not parse, ends in a slash, or names a
/// dot segment. The result is always safe to join onto a directory.
pub fn filename_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let name = parsed.path_segments()?.next_back()?;
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

/// Filename used to store a download, with the generic fallback
pub fn download_filename(url: &str) -> String {
    filename_from_url(url).unwrap_or_else(|| config::transfer::FALLBACK_FILENAME.to_string())
}

/// Path of the in-flight file for a download target
pub fn partial_path(dest: &std::path::Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(config::transfer::PARTIAL_SUFFIX);
    dest.with_file_name(name)
}
