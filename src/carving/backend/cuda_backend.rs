use cudarc::driver::safe::*;
use cudarc::nvrtc::Ptx;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

use crate::carving::backend::types::ComputeBackend;
use crate::carving::camera::{CameraModel, Resolution};
use crate::carving::capture::{DepthImage, RgbImage};
use crate::carving::common::error::{CarvingError, Result};
use crate::carving::light::{self, LightSource};
use crate::carving::rays::{Ray, RayCaster};
use crate::carving::shadow::{self, CalibrationParams, MaskResult};
use crate::carving::voxel::{AccumulateMode, AccumulationStats, VoxelGrid};

/// Floats per packed ray: origin, direction, length, shadow flag.
const PACKED_RAY_FLOATS: usize = 8;

/// CUDA ray traversal. Mask and light kernels stay on the CPU; they are
/// cheap next to traversing hundreds of thousands of rays.
pub struct CudaBackend {
    stream: Arc<CudaStream>,
    kernel: CudaFunction,
}

impl CudaBackend {
    /// Initialize CUDA context and load kernel
    pub fn new() -> anyhow::Result<Self> {
        // Include compiled PTX from build.rs
        let ptx = include_str!(concat!(env!("OUT_DIR"), "/voxel_accumulate.ptx"));
        let kernel_name = "accumulate_rays";

        let ctx = CudaContext::new(0)?;
        let stream = ctx.default_stream();
        let module = ctx.load_module(Ptx::from_src(ptx))?;
        let kernel = module.load_function(kernel_name)?;
        info!("CUDA voxel backend ready");

        Ok(Self { stream, kernel })
    }

    fn pack(rays: &[Ray]) -> Vec<f32> {
        rays.iter()
            .flat_map(|r| {
                [
                    r.origin.x,
                    r.origin.y,
                    r.origin.z,
                    r.direction.x,
                    r.direction.y,
                    r.direction.z,
                    r.length,
                    if r.in_shadow { 1.0 } else { 0.0 },
                ]
            })
            .collect()
    }

    /// Runs the traversal kernel into zeroed per-cell delta buffers and
    /// folds them into the host grid.
    fn traverse(&self, grid: &VoxelGrid, rays: &[Ray], mode: AccumulateMode) -> anyhow::Result<AccumulationStats> {
        if rays.is_empty() {
            return Ok(AccumulationStats::default());
        }
        let spec = grid.spec();
        let packed = Self::pack(rays);
        debug!("Uploading {} rays ({} floats)", rays.len(), packed.len());

        let mut d_rays = self.stream.clone_htod(&packed)?;
        let mut d_ins = self.stream.alloc_zeros::<u32>(grid.cell_count())?;
        let mut d_outs = self.stream.alloc_zeros::<u32>(grid.cell_count())?;
        let mut d_missed = self.stream.alloc_zeros::<u32>(1)?;

        let ray_count = rays.len() as i32;
        let nx = spec.dimensions[0] as i32;
        let ny = spec.dimensions[1] as i32;
        let nz = spec.dimensions[2] as i32;
        let (ox, oy, oz) = (spec.origin.x, spec.origin.y, spec.origin.z);
        let cell_size = spec.cell_size;

        let mut launch_args = self.stream.launch_builder(&self.kernel);
        launch_args.arg(&mut d_rays);
        launch_args.arg(&ray_count);
        launch_args.arg(&mut d_ins);
        launch_args.arg(&mut d_outs);
        launch_args.arg(&mut d_missed);
        launch_args.arg(&nx);
        launch_args.arg(&ny);
        launch_args.arg(&nz);
        launch_args.arg(&ox);
        launch_args.arg(&oy);
        launch_args.arg(&oz);
        launch_args.arg(&cell_size);

        let cfg = LaunchConfig::for_num_elems(rays.len() as u32);
        unsafe { launch_args.launch(cfg)? };

        let ins = self.stream.clone_dtoh(&d_ins)?;
        let outs = self.stream.clone_dtoh(&d_outs)?;
        let missed = self.stream.clone_dtoh(&d_missed)?;

        grid.apply_deltas(&ins, &outs, mode)?;

        Ok(AccumulationStats {
            rays: rays.len() as u64,
            rays_missed: missed[0] as u64,
            in_updates: ins.iter().map(|&c| c as u64).sum(),
            out_updates: outs.iter().map(|&c| c as u64).sum(),
        })
    }
}

impl ComputeBackend for CudaBackend {
    fn name(&self) -> &'static str {
        "cuda"
    }

    fn compute_mask(&self, color: &RgbImage, depth_resolution: Resolution, params: &CalibrationParams) -> Result<MaskResult> {
        Ok(shadow::compute_mask(color, depth_resolution, params))
    }

    fn locate_light(&self, color: &RgbImage, depth: &DepthImage, camera: &CameraModel, threshold: f32) -> Result<LightSource> {
        light::locate(color, depth, camera, threshold)
    }

    fn cast_rays(&self, caster: &RayCaster<'_>) -> Result<Vec<Ray>> {
        let mut rays = Vec::with_capacity(caster.capacity_hint());
        rays.par_extend(caster.par_rays());
        Ok(rays)
    }

    fn accumulate(&self, grid: &VoxelGrid, rays: &[Ray], mode: AccumulateMode) -> Result<AccumulationStats> {
        self.traverse(grid, rays, mode)
            .map_err(|e| CarvingError::Backend(e.to_string()))
    }
}
