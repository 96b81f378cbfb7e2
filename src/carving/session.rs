//! Capture session module
//!
//! Orchestrates one capture end to end (light, mask, rays, accumulation)
//! and manages the ordered list of committed frames.

mod carving_session;
mod timing;
pub mod types;


pub use carving_session::CarvingSession;
pub use timing::{PipelineTimings, StepTiming, Timer};
pub use types::{CaptureStage, CapturedFrame, FrameHandle, RetractionPolicy, SessionConfig, SessionConfigBuilder};
