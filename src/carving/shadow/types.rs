//! Shadow mask and calibration types

use glam::Mat4;

use crate::carving::camera::{CameraModel, Intrinsics};
use crate::carving::capture::types::{DepthImage, ImagePlane};
use crate::carving::common::error::{CarvingError, Result};

/// Grayscale luminance in `[0, 1]`.
pub type LumaImage = ImagePlane<f32>;

/// `true` marks an in-shadow pixel.
pub type MaskImage = ImagePlane<bool>;

/// Half-open pixel rectangle `[x_min, x_max) x [y_min, y_max)` in full color
/// resolution. It encodes the flat calibration surface shadows are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoiRect {
    pub x_min: usize,
    pub x_max: usize,
    pub y_min: usize,
    pub y_max: usize,
}

impl RoiRect {
    /// Covers any image.
    pub const UNBOUNDED: RoiRect = RoiRect {
        x_min: 0,
        x_max: usize::MAX,
        y_min: 0,
        y_max: usize::MAX,
    };

    pub const fn new(x_min: usize, x_max: usize, y_min: usize, y_max: usize) -> Self {
        Self { x_min, x_max, y_min, y_max }
    }

    #[inline]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x_min && x < self.x_max && y >= self.y_min && y < self.y_max
    }
}

/// User-tunable thresholds, read once at the start of a capture.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationParams {
    /// Lower bound of the in-shadow luminance band
    pub gray_min: f32,
    /// Upper bound of the in-shadow luminance band
    pub gray_max: f32,
    pub roi: RoiRect,
    /// Gaussian sigma in color pixels; 0 disables blurring
    pub blur_sigma: f32,
    /// Minimum luminance for a pixel to count as the light source
    pub light_threshold: f32,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            gray_min: 0.05,
            gray_max: 0.35,
            roi: RoiRect::UNBOUNDED,
            blur_sigma: 1.5,
            light_threshold: 0.98,
        }
    }
}

impl CalibrationParams {
    pub fn builder() -> CalibrationParamsBuilder {
        CalibrationParamsBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.gray_min) || !unit.contains(&self.gray_max) {
            return Err(CarvingError::InvalidCalibration(format!(
                "gray band [{}, {}] must lie in [0, 1]",
                self.gray_min, self.gray_max
            )));
        }
        if self.gray_min > self.gray_max {
            return Err(CarvingError::InvalidCalibration(format!(
                "gray_min {} exceeds gray_max {}",
                self.gray_min, self.gray_max
            )));
        }
        if !self.blur_sigma.is_finite() || self.blur_sigma < 0.0 {
            return Err(CarvingError::InvalidCalibration(format!(
                "blur_sigma must be finite and non-negative, got {}",
                self.blur_sigma
            )));
        }
        if !unit.contains(&self.light_threshold) {
            return Err(CarvingError::InvalidCalibration(format!(
                "light_threshold {} must lie in [0, 1]",
                self.light_threshold
            )));
        }
        if self.roi.x_min >= self.roi.x_max || self.roi.y_min >= self.roi.y_max {
            return Err(CarvingError::InvalidCalibration(format!("empty ROI {:?}", self.roi)));
        }
        Ok(())
    }
}

/// Builder for CalibrationParams
#[derive(Default)]
pub struct CalibrationParamsBuilder {
    gray_min: Option<f32>,
    gray_max: Option<f32>,
    roi: Option<RoiRect>,
    blur_sigma: Option<f32>,
    light_threshold: Option<f32>,
}

impl CalibrationParamsBuilder {
    pub fn gray_range(mut self, min: f32, max: f32) -> Self {
        self.gray_min = Some(min);
        self.gray_max = Some(max);
        self
    }

    pub fn roi(mut self, roi: RoiRect) -> Self {
        self.roi = Some(roi);
        self
    }

    pub fn blur_sigma(mut self, sigma: f32) -> Self {
        self.blur_sigma = Some(sigma);
        self
    }

    pub fn light_threshold(mut self, threshold: f32) -> Self {
        self.light_threshold = Some(threshold);
        self
    }

    pub fn build(self) -> CalibrationParams {
        let default = CalibrationParams::default();
        CalibrationParams {
            gray_min: self.gray_min.unwrap_or(default.gray_min),
            gray_max: self.gray_max.unwrap_or(default.gray_max),
            roi: self.roi.unwrap_or(default.roi),
            blur_sigma: self.blur_sigma.unwrap_or(default.blur_sigma),
            light_threshold: self.light_threshold.unwrap_or(default.light_threshold),
        }
    }
}

/// Shadow evidence frozen at capture time: the mask, plus everything needed
/// to regenerate the frame's rays (depth snapshot, depth-resolution
/// intrinsics, camera pose).
#[derive(Debug, Clone)]
pub struct ShadowMask {
    pub mask: MaskImage,
    pub depth: DepthImage,
    pub intrinsics: Intrinsics,
    pub camera_to_world: Mat4,
    /// In-shadow pixels of `mask`. Lit pixels cast rays too, so ray buffers
    /// are sized from the depth grid ([`RayCaster::capacity_hint`]) instead.
    ///
    /// [`RayCaster::capacity_hint`]: crate::carving::rays::RayCaster::capacity_hint
    pub pixel_count: usize,
}

impl ShadowMask {
    /// Camera model at depth resolution.
    pub fn camera(&self) -> CameraModel {
        CameraModel::new(self.intrinsics, self.depth.resolution(), self.camera_to_world)
    }

    pub fn is_in_shadow(&self, x: usize, y: usize) -> bool {
        self.mask.get(x, y)
    }
}
