//! Capture input module
//!
//! Types for the per-tick RGB-D bundle delivered by the tracking collaborator,
//! the single-slot mailbox it is delivered through, and optional guided
//! depth upsampling.

pub mod types;
mod ycbcr;
mod bundle;
mod mailbox;
mod tracking;
mod upsample;

pub use types::{ImagePlane, RgbImage, DepthImage, ConfidenceImage, ConfidenceLevel};
pub use ycbcr::{YCbCrImage, ColorFrame};
pub use bundle::CameraFrameBundle;
pub use mailbox::FrameMailbox;
pub use tracking::{TrackingSession, ManualTracking};
pub use upsample::{area_resample, upsample_depth, DepthUpsampling};
