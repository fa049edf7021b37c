//! Application configuration constants
//!
//! Compile-time defaults. Anything a user may want to change at runtime
//! lives in [`crate::settings::Settings`] instead.

/// Application identity
pub mod app {
    /// Application name, used for cache/config/log directories
    pub const NAME: &str = "acreetion-imager";

    /// Human-readable application title
    pub const TITLE: &str = "AcreetionOS USB Flashing Utility";

    /// User agent sent with every HTTP request
    pub const USER_AGENT: &str = concat!("AcreetionOS-Imager/", env!("CARGO_PKG_VERSION"));
}

/// Remote endpoints
pub mod urls {
    /// Page scraped for `.iso` download links
    pub const DOWNLOAD_PAGE: &str = "https://acreetionos.org/";
}

/// Third-party imaging tool used on Windows
pub mod tool {
    /// Pinned portable Rufus release
    pub const RUFUS_URL: &str =
        "https://github.com/pbatard/rufus/releases/download/v4.5/rufus-4.5p.exe";

    /// File name of the cached Rufus binary inside the working directory
    pub const RUFUS_EXE: &str = "rufus-4.5p.exe";
}

/// Transfer engine defaults
pub mod transfer {
    /// Timeout for metadata fetches such as the download page (seconds)
    pub const METADATA_TIMEOUT_SECS: u64 = 15;

    /// Connect timeout for every request (seconds)
    pub const CONNECT_TIMEOUT_SECS: u64 = 15;

    /// Maximum redirect hops before giving up
    pub const MAX_REDIRECTS: usize = 8;

    /// Suffix of in-flight download files
    pub const PARTIAL_SUFFIX: &str = ".downloading";

    /// File name used when the URL has no usable last segment
    pub const FALLBACK_FILENAME: &str = "download.iso";
}

/// Working directory layout
pub mod paths {
    /// Directory under the OS temp root holding images and the cached tool
    pub const WORK_DIR_NAME: &str = "acreetionos-flasher";
    /// Lock file inside the working directory, held while a session runs
    pub const SESSION_LOCK_NAME: &str = ".session.lock";
}

/// Direct block copy settings
pub mod dd {
    /// Copy program
    pub const PROGRAM: &str = "dd";

    /// dd block size for image writing
    pub const BLOCK_SIZE: &str = "4M";

    /// Default privilege escalation wrapper
    pub const ELEVATION_COMMAND: &str = "pkexec";
}

/// Image discovery
pub mod images {
    /// Extension of flashable images on the download page
    pub const IMAGE_EXTENSION: &str = ".iso";
}

/// Logging configuration
pub mod logging {
    /// Interval in MB between download progress debug logs
    pub const DOWNLOAD_LOG_INTERVAL_MB: u64 = 64;

    /// Capacity of the event broadcast channel
    pub const EVENT_CHANNEL_CAPACITY: usize = 1024;
}
