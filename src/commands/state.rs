//! Application state

use std::path::Path;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config;
use crate::devices::DeviceProbe;
use crate::download::Transfer;
use crate::error::Result;
use crate::events::{EventBus, FlasherEvent};
use crate::flash::FlashWriter;
use crate::session::{SessionSlot, WorkDirLock};
use crate::settings::{Settings, ToolRetention};
use crate::{log_debug, log_info, log_warn};

const MODULE: &str = "commands::state";

/// Shared imager state
///
/// Cheap to clone; clones share the session slot and the event stream.
#[derive(Clone)]
pub struct Flasher {
    pub(super) settings: Arc<Settings>,
    pub(super) transfer: Transfer,
    pub(super) writer: FlashWriter,
    pub(super) probe: DeviceProbe,
    pub(super) events: EventBus,
    pub(super) session: SessionSlot,
}

impl Flasher {
    /// Build the state for the host platform
    pub fn new(settings: Settings) -> Result<Self> {
        let transfer = Transfer::new(&settings)?;
        let writer = FlashWriter::for_host(&settings, &transfer);
        let probe = DeviceProbe::for_host();
        log_debug!(MODULE, "Writer: {}, device probe: {:?}", writer.name(), probe);

        Ok(Self {
            settings: Arc::new(settings),
            transfer,
            writer,
            probe,
            events: EventBus::new(),
            session: SessionSlot::new(),
        })
    }

    /// Replace the platform writer
    pub fn with_writer(mut self, writer: FlashWriter) -> Self {
        self.writer = writer;
        self
    }

    /// Replace the platform device probe
    pub fn with_probe(mut self, probe: DeviceProbe) -> Self {
        self.probe = probe;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn session(&self) -> &SessionSlot {
        &self.session
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FlasherEvent> {
        self.events.subscribe()
    }

    /// Delete leftovers of an interrupted session from the working directory
    ///
    /// Removes partial downloads and images, plus the cached tool when the
    /// retention policy does not keep it. Skipped while a session runs here
    /// or in another process sharing the directory.
    /// Returns the number of files removed.
    pub fn purge_stale_artifacts(&self) -> usize {
        if self.session.is_active() {
            log_debug!(MODULE, "Session active, not purging the working directory");
            return 0;
        }

        let work_dir = self.settings.work_dir();
        if !work_dir.is_dir() {
            return 0;
        }
        let _lock = match WorkDirLock::try_acquire(&work_dir) {
            Ok(Some(lock)) => lock,
            Ok(None) => {
                log_info!(
                    MODULE,
                    "{} is in use by another process, not purging",
                    work_dir.display()
                );
                return 0;
            }
            Err(e) => {
                log_warn!(MODULE, "Not purging the working directory: {}", e);
                return 0;
            }
        };

        let entries = match std::fs::read_dir(&work_dir) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || !self.is_stale_artifact(&path) {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    log_info!(MODULE, "Removed stale file: {}", path.display());
                    removed += 1;
                }
                Err(e) => log_warn!(MODULE, "Failed to remove stale file {}: {}", path.display(), e),
            }
        }
        removed
    }

    fn is_stale_artifact(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if name == config::tool::RUFUS_EXE {
            return self.settings.tool_retention == ToolRetention::Delete;
        }
        let lower = name.to_lowercase();
        lower.ends_with(config::transfer::PARTIAL_SUFFIX) || lower.ends_with(config::images::IMAGE_EXTENSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flasher_in(dir: &Path, retention: ToolRetention) -> Flasher {
        let settings = Settings {
            work_dir: Some(dir.to_path_buf()),
            tool_retention: retention,
            ..Settings::default()
        };
        Flasher::new(settings).unwrap()
    }

    #[test]
    fn test_purge_removes_partial_and_images() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.iso"), b"x").unwrap();
        std::fs::write(dir.path().join("b.iso.downloading"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.path().join(config::tool::RUFUS_EXE), b"MZ").unwrap();

        let flasher = flasher_in(dir.path(), ToolRetention::Keep);
        assert_eq!(flasher.purge_stale_artifacts(), 2);
        assert!(dir.path().join("notes.txt").exists());
        assert!(dir.path().join(config::tool::RUFUS_EXE).exists());
    }

    #[test]
    fn test_purge_removes_tool_when_not_retained() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(config::tool::RUFUS_EXE), b"MZ").unwrap();

        let flasher = flasher_in(dir.path(), ToolRetention::Delete);
        assert_eq!(flasher.purge_stale_artifacts(), 1);
    }

    #[test]
    fn test_purge_skipped_during_session() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.iso"), b"x").unwrap();

        let flasher = flasher_in(dir.path(), ToolRetention::Delete);
        let _guard = flasher.session().try_begin("a", "b").unwrap();
        assert_eq!(flasher.purge_stale_artifacts(), 0);
        assert!(dir.path().join("a.iso").exists());
    }

    #[test]
    fn test_purge_skipped_while_another_process_holds_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.iso"), b"x").unwrap();
        let held = WorkDirLock::try_acquire(dir.path()).unwrap().unwrap();

        let flasher = flasher_in(dir.path(), ToolRetention::Delete);
        assert_eq!(flasher.purge_stale_artifacts(), 0);
        assert!(dir.path().join("a.iso").exists());

        drop(held);
        assert_eq!(flasher.purge_stale_artifacts(), 1);
        assert!(dir.path().join(config::paths::SESSION_LOCK_NAME).exists());
    }

    #[test]
    fn test_missing_work_dir_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let flasher = flasher_in(&dir.path().join("nope"), ToolRetention::Delete);
        assert_eq!(flasher.purge_stale_artifacts(), 0);
        assert!(!dir.path().join("nope").exists());
    }
}
