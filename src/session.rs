//! Flash session tracking
//!
//! At most one session runs at a time. [`SessionSlot::try_begin`] claims the
//! slot or fails with [`FlashError::SessionBusy`]; dropping the returned
//! guard puts the slot back to idle whatever the outcome was.
//!
//! The slot only covers one process. Other processes sharing the working
//! directory are kept out by [`WorkDirLock`], which the guard holds for the
//! rest of the session.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use fs2::FileExt;
use serde::Serialize;

use crate::config;
use crate::error::{FlashError, Result};
use crate::{log_debug, log_info, log_warn};

const MODULE: &str = "session";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Downloading,
    Writing,
    Succeeded,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Succeeded | Phase::Failed)
    }
}

/// The one flash in flight
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashSession {
    pub image: String,
    pub device: String,
    pub phase: Phase,
    pub last_progress: u8,
}

type Shared = Arc<Mutex<Option<FlashSession>>>;

fn lock(shared: &Shared) -> MutexGuard<'_, Option<FlashSession>> {
    // A panic while holding the lock leaves plain data behind; keep going
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Holder of the single active session
#[derive(Clone, Default)]
pub struct SessionSlot {
    inner: Shared,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for a new session, entering `Downloading`
    pub fn try_begin(&self, image: &str, device: &str) -> Result<SessionGuard> {
        let mut current = lock(&self.inner);
        if let Some(active) = current.as_ref() {
            log_info!(
                MODULE,
                "Rejecting flash of {}: session for {} is {:?}",
                image,
                active.device,
                active.phase
            );
            return Err(FlashError::SessionBusy);
        }

        *current = Some(FlashSession {
            image: image.to_string(),
            device: device.to_string(),
            phase: Phase::Downloading,
            last_progress: 0,
        });
        log_info!(MODULE, "Session started: {} -> {} (Downloading)", image, device);

        Ok(SessionGuard {
            inner: self.inner.clone(),
            _work_dir_lock: None,
        })
    }

    /// Snapshot of the active session, if any
    pub fn current(&self) -> Option<FlashSession> {
        lock(&self.inner).clone()
    }

    pub fn phase(&self) -> Phase {
        lock(&self.inner).as_ref().map(|s| s.phase).unwrap_or(Phase::Idle)
    }

    pub fn is_active(&self) -> bool {
        lock(&self.inner).is_some()
    }
}

/// Proof of owning the slot; releases it on drop
pub struct SessionGuard {
    inner: Shared,
    _work_dir_lock: Option<WorkDirLock>,
}

impl SessionGuard {
    /// Keep `lock` until the session ends
    pub fn hold_lock(&mut self, lock: WorkDirLock) {
        self._work_dir_lock = Some(lock);
    }

    pub fn set_phase(&self, phase: Phase) {
        if let Some(session) = lock(&self.inner).as_mut() {
            log_info!(MODULE, "Session phase: {:?} -> {:?}", session.phase, phase);
            session.phase = phase;
            if phase == Phase::Writing {
                session.last_progress = 0;
            }
        }
    }

    pub fn set_progress(&self, percent: u8) {
        if let Some(session) = lock(&self.inner).as_mut() {
            session.last_progress = percent.min(100);
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(session) = lock(&self.inner).take() {
            if session.phase.is_terminal() {
                log_info!(
                    MODULE,
                    "Session ended: {} -> {} ({:?})",
                    session.image,
                    session.device,
                    session.phase
                );
            } else {
                log_warn!(
                    MODULE,
                    "Session abandoned while {:?}: {} -> {}",
                    session.phase,
                    session.image,
                    session.device
                );
            }
        }
    }
}

/// Exclusive advisory lock on the working directory
///
/// Released when dropped. The lock file stays behind: unlinking it while
/// another process waits on the same inode would let two holders coexist.
#[derive(Debug)]
pub struct WorkDirLock {
    _file: File,
    path: PathBuf,
}

impl WorkDirLock {
    /// Take the lock without blocking
    ///
    /// Returns `Ok(None)` when another holder has it. `work_dir` must exist.
    pub fn try_acquire(work_dir: &Path) -> Result<Option<Self>> {
        let path = work_dir.join(config::paths::SESSION_LOCK_NAME);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| FlashError::io_at("open", &path, e))?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                log_debug!(MODULE, "Locked {}", path.display());
                Ok(Some(Self { _file: file, path }))
            }
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                log_debug!(MODULE, "{} is held by another session", path.display());
                Ok(None)
            }
            Err(e) => Err(FlashError::io_at("lock", &path, e)),
        }
    }
}

impl Drop for WorkDirLock {
    fn drop(&mut self) {
        log_debug!(MODULE, "Unlocked {}", self.path.display());
    }
}
