//! Compute backends for the data-parallel capture stages
//!
//! A backend owns whatever kernel state it needs and is handed to the session
//! at construction. `CpuBackend` is the rayon reference implementation;
//! `CudaBackend` offloads ray traversal on Jetson targets.

pub mod types;
pub mod cpu_backend;
#[cfg(jetson_cuda)]
pub mod cuda_backend;

// Fallback when NOT on Jetson
#[cfg(not(jetson_cuda))]
pub struct CudaBackend;

#[cfg(not(jetson_cuda))]
impl CudaBackend {
    pub fn new() -> anyhow::Result<Self> {
        anyhow::bail!("CUDA backend is not available on this platform")
    }
}

#[cfg(not(jetson_cuda))]
impl ComputeBackend for CudaBackend {
    fn name(&self) -> &'static str {
        "cuda (unavailable)"
    }

    fn compute_mask(&self, _color: &RgbImage, _depth_resolution: Resolution, _params: &CalibrationParams) -> Result<MaskResult> {
        Err(CarvingError::Backend("CUDA backend is not available on this platform".to_string()))
    }

    fn locate_light(&self, _color: &RgbImage, _depth: &DepthImage, _camera: &CameraModel, _threshold: f32) -> Result<LightSource> {
        Err(CarvingError::Backend("CUDA backend is not available on this platform".to_string()))
    }

    fn cast_rays(&self, _caster: &RayCaster<'_>) -> Result<Vec<Ray>> {
        Err(CarvingError::Backend("CUDA backend is not available on this platform".to_string()))
    }

    fn accumulate(&self, _grid: &VoxelGrid, _rays: &[Ray], _mode: AccumulateMode) -> Result<AccumulationStats> {
        Err(CarvingError::Backend("CUDA backend is not available on this platform".to_string()))
    }
}

#[cfg(jetson_cuda)]
pub use cuda_backend::CudaBackend;
pub use cpu_backend::CpuBackend;
pub use types::ComputeBackend;

#[cfg(not(jetson_cuda))]
use crate::carving::{
    camera::{CameraModel, Resolution},
    capture::{DepthImage, RgbImage},
    common::error::{CarvingError, Result},
    light::LightSource,
    rays::{Ray, RayCaster},
    shadow::{CalibrationParams, MaskResult},
    voxel::{AccumulateMode, AccumulationStats, VoxelGrid},
};
