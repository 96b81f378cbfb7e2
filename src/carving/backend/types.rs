//! Backend interface shared by CPU and device implementations

use crate::carving::camera::{CameraModel, Resolution};
use crate::carving::capture::{DepthImage, RgbImage};
use crate::carving::common::error::Result;
use crate::carving::light::LightSource;
use crate::carving::rays::{Ray, RayCaster};
use crate::carving::shadow::{CalibrationParams, MaskResult};
use crate::carving::voxel::{AccumulateMode, AccumulationStats, VoxelGrid};

/// The wide data-parallel kernels of a capture. Each call runs to completion before
/// returning; the session sequences them with no overlap.
pub trait ComputeBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Blur, luminance and band threshold, sampled at depth resolution.
    fn compute_mask(&self, color: &RgbImage, depth_resolution: Resolution, params: &CalibrationParams) -> Result<MaskResult>;

    /// Bright-pixel centroid lifted to world space; `camera` is at color resolution.
    fn locate_light(&self, color: &RgbImage, depth: &DepthImage, camera: &CameraModel, threshold: f32) -> Result<LightSource>;

    /// Materialises every ray the caster generates.
    fn cast_rays(&self, caster: &RayCaster<'_>) -> Result<Vec<Ray>>;

    /// Traverses the rays and updates the grid. Either every ray is applied
    /// or, on error, none is.
    fn accumulate(&self, grid: &VoxelGrid, rays: &[Ray], mode: AccumulateMode) -> Result<AccumulationStats>;
}
