//! Logging module
//!
//! Module-tagged, leveled logging to stderr and a per-session log file.
//! Use the `log_debug!`, `log_info!`, `log_warn!` and `log_error!` macros:
//!
//! ```ignore
//! log_info!("download", "Fetched {} bytes", n);
//! ```

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::config;

/// Log severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

/// DEBUG lines are dropped unless developer mode turned this on
static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Mirror to stderr (disabled by front ends that draw their own output)
static STDERR_ENABLED: AtomicBool = AtomicBool::new(true);

static LOG_FILE: Lazy<Mutex<Option<File>>> = Lazy::new(|| Mutex::new(None));

/// Directory holding session log files
pub fn log_dir() -> PathBuf {
    crate::utils::get_cache_dir(config::app::NAME).join("logs")
}

/// Initialize the logging system
///
/// Opens a fresh log file for this session. Failing to create it is not
/// fatal: logging continues on stderr only.
pub fn init() {
    let dir = log_dir();
    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!("Failed to create log directory {}: {}", dir.display(), e);
        return;
    }

    let filename = format!(
        "{}-{}.log",
        config::app::NAME,
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    );
    let path = dir.join(filename);

    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => {
            if let Ok(mut guard) = LOG_FILE.lock() {
                *guard = Some(file);
            }
        }
        Err(e) => eprintln!("Failed to open log file {}: {}", path.display(), e),
    }
}

/// Enable or disable DEBUG output
pub fn set_log_level(debug: bool) {
    DEBUG_ENABLED.store(debug, Ordering::SeqCst);
}

/// Whether DEBUG output is currently enabled
pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::SeqCst)
}

/// Enable or disable the stderr mirror
pub fn set_stderr_output(enabled: bool) {
    STDERR_ENABLED.store(enabled, Ordering::SeqCst);
}

/// Render one log line
pub fn format_line(level: Level, module: &str, message: &str) -> String {
    format!(
        "[{}] [{}] [{}] {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        level.as_str(),
        module,
        message
    )
}

/// Write a log line. Called through the logging macros.
pub fn write(level: Level, module: &str, message: &str) {
    if level == Level::Debug && !is_debug_enabled() {
        return;
    }

    let line = format_line(level, module, message);

    if STDERR_ENABLED.load(Ordering::SeqCst) {
        eprintln!("{}", line);
    }

    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some(file) = guard.as_mut() {
            let _ = writeln!(file, "{}", line);
        }
    }
}

#[macro_export]
macro_rules! log_debug {
    ($module:expr, $($arg:tt)*) => {
        $crate::logging::write($crate::logging::Level::Debug, $module, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($module:expr, $($arg:tt)*) => {
        $crate::logging::write($crate::logging::Level::Info, $module, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($module:expr, $($arg:tt)*) => {
        $crate::logging::write($crate::logging::Level::Warn, $module, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($module:expr, $($arg:tt)*) => {
        $crate::logging::write($crate::logging::Level::Error, $module, &format!($($arg)*))
    };
}
