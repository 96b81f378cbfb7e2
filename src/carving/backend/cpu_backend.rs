use anyhow::Result as AnyResult;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::info;

use crate::carving::backend::types::ComputeBackend;
use crate::carving::camera::{CameraModel, Resolution};
use crate::carving::capture::{DepthImage, RgbImage};
use crate::carving::common::error::Result;
use crate::carving::light::{self, LightSource};
use crate::carving::rays::{Ray, RayCaster};
use crate::carving::shadow::{self, CalibrationParams, MaskResult};
use crate::carving::voxel::{AccumulateMode, AccumulationStats, VoxelGrid};

/// Reference backend: every kernel is a rayon parallel iterator, on the
/// global pool or on a dedicated one.
pub struct CpuBackend {
    pool: Option<ThreadPool>,
}

impl CpuBackend {
    pub fn new() -> AnyResult<Self> {
        Ok(Self { pool: None })
    }

    pub fn with_threads(threads: usize) -> AnyResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("carve-worker-{i}"))
            .build()?;
        info!("CPU backend using a dedicated pool of {} threads", threads);
        Ok(Self { pool: Some(pool) })
    }

    fn run<T: Send>(&self, kernel: impl FnOnce() -> T + Send) -> T {
        match &self.pool {
            Some(pool) => pool.install(kernel),
            None => kernel(),
        }
    }
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn compute_mask(&self, color: &RgbImage, depth_resolution: Resolution, params: &CalibrationParams) -> Result<MaskResult> {
        Ok(self.run(|| shadow::compute_mask(color, depth_resolution, params)))
    }

    fn locate_light(&self, color: &RgbImage, depth: &DepthImage, camera: &CameraModel, threshold: f32) -> Result<LightSource> {
        self.run(|| light::locate(color, depth, camera, threshold))
    }

    fn cast_rays(&self, caster: &RayCaster<'_>) -> Result<Vec<Ray>> {
        Ok(self.run(|| {
            let mut rays = Vec::with_capacity(caster.capacity_hint());
            rays.par_extend(caster.par_rays());
            rays
        }))
    }

    fn accumulate(&self, grid: &VoxelGrid, rays: &[Ray], mode: AccumulateMode) -> Result<AccumulationStats> {
        Ok(self.run(|| grid.traverse_and_accumulate(rays.par_iter().copied(), mode)))
    }
}
