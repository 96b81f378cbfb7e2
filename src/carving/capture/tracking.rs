use std::sync::Arc;

use tracing::info;

use crate::carving::capture::bundle::CameraFrameBundle;
use crate::carving::capture::mailbox::FrameMailbox;

/// The world-tracking collaborator. It owns the camera session and delivers
/// bundles into its mailbox; the carving core only starts and pauses it.
pub trait TrackingSession {
    fn start(&mut self);
    fn pause(&mut self);
    fn mailbox(&self) -> Arc<FrameMailbox>;
}

/// In-process tracking stand-in: bundles are delivered by hand through
/// [`ManualTracking::deliver`] or directly on the mailbox.
pub struct ManualTracking {
    mailbox: Arc<FrameMailbox>,
}

impl Default for ManualTracking {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualTracking {
    pub fn new() -> Self {
        Self {
            mailbox: Arc::new(FrameMailbox::new()),
        }
    }

    pub fn deliver(&self, bundle: CameraFrameBundle) -> bool {
        self.mailbox.post(bundle)
    }
}

impl TrackingSession for ManualTracking {
    fn start(&mut self) {
        info!("Tracking started");
        self.mailbox.set_accepting(true);
    }

    fn pause(&mut self) {
        info!("Tracking paused");
        self.mailbox.set_accepting(false);
    }

    fn mailbox(&self) -> Arc<FrameMailbox> {
        Arc::clone(&self.mailbox)
    }
}
