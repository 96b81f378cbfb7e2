use std::sync::Arc;

use glam::Vec3;

use crate::carving::capture::{ConfidenceLevel, DepthUpsampling};
use crate::carving::light::LightSource;
use crate::carving::shadow::ShadowMask;
use crate::carving::voxel::{AccumulationStats, GridSpec};

/// What deleting a frame does to the voxel evidence it contributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetractionPolicy {
    /// Replay the frame's rays and subtract exactly what it added
    #[default]
    Subtract,
    /// Only drop the frame from the list; counts stay as they are
    KeepEvidence,
}

/// Lifecycle of a single capture. Only `Accumulated` commits anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStage {
    Requested,
    Localizing,
    MaskComputed,
    RaysCast,
    Accumulated,
    Aborted,
}

impl CaptureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureStage::Requested => "requested",
            CaptureStage::Localizing => "localizing",
            CaptureStage::MaskComputed => "mask_computed",
            CaptureStage::RaysCast => "rays_cast",
            CaptureStage::Accumulated => "accumulated",
            CaptureStage::Aborted => "aborted",
        }
    }
}

/// One committed capture, kept so the frame can be listed, exported or
/// retracted later.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Monotonic capture number, never reused after deletion
    pub ordinal: u64,
    pub light: LightSource,
    pub shadow: ShadowMask,
    pub stats: AccumulationStats,
    /// Ray stride the frame was cast with
    pub ray_stride: usize,
    /// Whether the smoothed depth maps were used
    pub smoothed_depth: bool,
    /// Whether the depth snapshot was upsampled before ray casting
    pub upsampled_depth: bool,
    pub timestamp: f64,
}

pub type FrameHandle = Arc<CapturedFrame>;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub grid: GridSpec,
    pub use_smoothed_depth: bool,
    /// Guided upsampling of the selected depth map; `None` keeps the sensor grid
    pub depth_upsampling: Option<DepthUpsampling>,
    pub min_confidence: ConfidenceLevel,
    pub ray_stride: usize,
    pub retraction: RetractionPolicy,
    /// Reject malformed bundles before any stage runs
    pub validate_inputs: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            // 64 cm cube of 1 cm cells, one meter in front of the world origin
            grid: GridSpec::centered(Vec3::new(0.0, 0.0, -1.0), 64, 0.01),
            use_smoothed_depth: false,
            depth_upsampling: None,
            min_confidence: ConfidenceLevel::Low,
            ray_stride: 1,
            retraction: RetractionPolicy::Subtract,
            validate_inputs: true,
        }
    }
}

impl SessionConfig {
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct SessionConfigBuilder {
    grid: Option<GridSpec>,
    use_smoothed_depth: Option<bool>,
    depth_upsampling: Option<DepthUpsampling>,
    min_confidence: Option<ConfidenceLevel>,
    ray_stride: Option<usize>,
    retraction: Option<RetractionPolicy>,
    validate_inputs: Option<bool>,
}

impl SessionConfigBuilder {
    pub fn grid(mut self, grid: GridSpec) -> Self {
        self.grid = Some(grid);
        self
    }

    pub fn use_smoothed_depth(mut self, enable: bool) -> Self {
        self.use_smoothed_depth = Some(enable);
        self
    }

    pub fn depth_upsampling(mut self, settings: DepthUpsampling) -> Self {
        self.depth_upsampling = Some(settings);
        self
    }

    pub fn min_confidence(mut self, level: ConfidenceLevel) -> Self {
        self.min_confidence = Some(level);
        self
    }

    pub fn ray_stride(mut self, stride: usize) -> Self {
        self.ray_stride = Some(stride);
        self
    }

    pub fn retraction(mut self, policy: RetractionPolicy) -> Self {
        self.retraction = Some(policy);
        self
    }

    pub fn validate_inputs(mut self, validate: bool) -> Self {
        self.validate_inputs = Some(validate);
        self
    }

    pub fn build(self) -> SessionConfig {
        let default = SessionConfig::default();
        SessionConfig {
            grid: self.grid.unwrap_or(default.grid),
            use_smoothed_depth: self.use_smoothed_depth.unwrap_or(default.use_smoothed_depth),
            depth_upsampling: self.depth_upsampling.or(default.depth_upsampling),
            min_confidence: self.min_confidence.unwrap_or(default.min_confidence),
            ray_stride: self.ray_stride.unwrap_or(default.ray_stride).max(1),
            retraction: self.retraction.unwrap_or(default.retraction),
            validate_inputs: self.validate_inputs.unwrap_or(default.validate_inputs),
        }
    }
}
