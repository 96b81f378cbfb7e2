use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::carving::capture::bundle::CameraFrameBundle;

/// Single-slot mailbox between the tracking collaborator and the carving
/// session. Each delivery replaces the previous bundle; readers take an `Arc`
/// snapshot that later deliveries cannot change.
#[derive(Debug)]
pub struct FrameMailbox {
    slot: Mutex<Option<Arc<CameraFrameBundle>>>,
    accepting: AtomicBool,
    delivered: AtomicU64,
}

impl Default for FrameMailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameMailbox {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            accepting: AtomicBool::new(true),
            delivered: AtomicU64::new(0),
        }
    }

    /// Replaces the last bundle. Dropped (returns false) while paused.
    pub fn post(&self, bundle: CameraFrameBundle) -> bool {
        if !self.accepting.load(Ordering::Acquire) {
            trace!("Mailbox paused, dropping bundle");
            return false;
        }
        let bundle = Arc::new(bundle);
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(bundle);
        self.delivered.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn latest(&self) -> Option<Arc<CameraFrameBundle>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::Release);
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}
