use std::sync::Arc;

use tracing::{debug, info, info_span, instrument, trace, warn};

use crate::carving::{
    backend::{ComputeBackend, CpuBackend},
    capture::{upsample_depth, CameraFrameBundle, FrameMailbox, ManualTracking, TrackingSession},
    common::error::{CarvingError, Result},
    rays::RayCaster,
    session::timing::{PipelineTimings, Timer},
    session::types::{CaptureStage, CapturedFrame, FrameHandle, RetractionPolicy, SessionConfig},
    shadow::{CalibrationParams, ShadowMask},
    voxel::{AccumulateMode, AccumulationStats, VoxelGrid},
};

/// Owns the voxel grid and the list of committed frames, and runs captures
/// against the latest bundle the tracking collaborator delivered.
///
/// Captures are serialized by `&mut self`. Each one either commits a frame
/// and its voxel evidence, or fails without touching either.
pub struct CarvingSession<T: TrackingSession = ManualTracking, B: ComputeBackend = CpuBackend> {
    tracking: T,
    backend: B,
    config: SessionConfig,
    calibration: CalibrationParams,
    grid: VoxelGrid,
    frames: Vec<FrameHandle>,
    next_ordinal: u64,
}

impl CarvingSession<ManualTracking, CpuBackend> {
    pub fn new(config: SessionConfig) -> Result<Self> {
        let backend = CpuBackend::new().map_err(|e| CarvingError::Backend(e.to_string()))?;
        Self::with_custom(ManualTracking::new(), backend, config)
    }
}

impl<T: TrackingSession, B: ComputeBackend> CarvingSession<T, B> {
    pub fn with_custom(tracking: T, backend: B, config: SessionConfig) -> Result<Self> {
        let grid = VoxelGrid::new(config.grid)?;
        info!(
            backend = backend.name(),
            dimensions = ?config.grid.dimensions,
            cell_size = config.grid.cell_size,
            "Carving session created"
        );
        Ok(Self {
            tracking,
            backend,
            config,
            calibration: CalibrationParams::default(),
            grid,
            frames: Vec::new(),
            next_ordinal: 0,
        })
    }

    pub fn start(&mut self) {
        self.tracking.start();
    }

    pub fn pause(&mut self) {
        self.tracking.pause();
    }

    pub fn mailbox(&self) -> Arc<FrameMailbox> {
        self.tracking.mailbox()
    }

    pub fn tracking(&self) -> &T {
        &self.tracking
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Captures a frame from the latest delivered bundle with the current
    /// calibration.
    pub fn capture_frame(&mut self) -> Result<FrameHandle> {
        self.capture_frame_with_timings().map(|(frame, _)| frame)
    }

    pub fn capture_frame_with_timings(&mut self) -> Result<(FrameHandle, PipelineTimings)> {
        // Read once; later deliveries do not affect this capture
        let Some(bundle) = self.mailbox().latest() else {
            debug!("No bundle delivered yet");
            return Err(CarvingError::NotReconstructing);
        };
        let params = self.calibration.clone();
        let mut timings = PipelineTimings::new();
        let frame = self.run_capture(&bundle, &params, &mut timings)?;
        Ok((frame, timings))
    }

    /// Captures a frame from an explicit bundle and calibration snapshot.
    pub fn capture_frame_with(&mut self, bundle: &CameraFrameBundle, params: &CalibrationParams) -> Result<FrameHandle> {
        let mut timings = PipelineTimings::new();
        self.run_capture(bundle, params, &mut timings)
    }

    fn run_capture(
        &mut self,
        bundle: &CameraFrameBundle,
        params: &CalibrationParams,
        timings: &mut PipelineTimings,
    ) -> Result<FrameHandle> {
        let ordinal = self.next_ordinal;
        let _span = info_span!("capture_frame", ordinal).entered();
        trace!(stage = CaptureStage::Requested.as_str());

        let frame = match self.run_stages(ordinal, bundle, params, timings) {
            Ok(frame) => Arc::new(frame),
            Err(e) => {
                debug!(stage = CaptureStage::Aborted.as_str(), error = %e, "Capture aborted");
                return Err(e);
            }
        };

        self.frames.push(Arc::clone(&frame));
        self.next_ordinal += 1;

        info!(
            ordinal,
            frames = self.frames.len(),
            rays = frame.stats.rays,
            shadow_pixels = frame.shadow.pixel_count,
            in_updates = frame.stats.in_updates,
            out_updates = frame.stats.out_updates,
            "Frame captured"
        );
        Ok(frame)
    }

    /// Runs every stage up to and including accumulation. The grid is the
    /// only state touched, and only by the last stage, which either applies
    /// every ray or none.
    fn run_stages(
        &self,
        ordinal: u64,
        bundle: &CameraFrameBundle,
        params: &CalibrationParams,
        timings: &mut PipelineTimings,
    ) -> Result<CapturedFrame> {
        if !bundle.is_scene_being_reconstructed {
            debug!("Tracking is not reconstructing the scene yet");
            return Err(CarvingError::NotReconstructing);
        }
        params.validate()?;
        if self.config.validate_inputs {
            bundle.validate()?;
        }

        trace!(stage = CaptureStage::Localizing.as_str());
        let timer = Timer::start("color_conversion");
        let color = {
            let _span = info_span!("color_conversion").entered();
            bundle.color.to_rgb()
        };
        timings.record(timer);

        let (sensor_depth, sensor_confidence, smoothed) = bundle.depth_source(self.config.use_smoothed_depth);
        if self.config.use_smoothed_depth && !smoothed {
            warn!("Smoothed depth requested but not delivered, using raw depth");
        }

        let upsampled = match &self.config.depth_upsampling {
            Some(settings) => {
                let timer = Timer::start("upsample_depth");
                let result = {
                    let _span = info_span!("upsample_depth", factor = settings.factor).entered();
                    upsample_depth(sensor_depth, sensor_confidence, &color, settings)?
                };
                timings.record(timer);
                Some(result)
            }
            None => None,
        };
        let (depth, confidence) = match &upsampled {
            Some((depth, confidence)) => (depth, confidence.as_ref()),
            None => (sensor_depth, sensor_confidence),
        };

        let timer = Timer::start("localize_light");
        let light = {
            let _span = info_span!("localize_light").entered();
            self.backend
                .locate_light(&color, depth, &bundle.camera(), params.light_threshold)?
        };
        timings.record(timer);

        let timer = Timer::start("compute_mask");
        let mask = {
            let _span = info_span!("compute_mask").entered();
            self.backend.compute_mask(&color, depth.resolution(), params)?
        };
        let shadow = ShadowMask {
            mask: mask.mask,
            depth: depth.filtered_by_confidence(confidence, self.config.min_confidence)?,
            intrinsics: bundle.camera().scaled_to(depth.resolution()).intrinsics,
            camera_to_world: bundle.camera_to_world,
            pixel_count: mask.pixel_count,
        };
        timings.record(timer);
        trace!(stage = CaptureStage::MaskComputed.as_str(), shadow_pixels = shadow.pixel_count);

        let timer = Timer::start("cast_rays");
        let rays = {
            let _span = info_span!("cast_rays", stride = self.config.ray_stride).entered();
            let caster = RayCaster::for_frame(&light, &shadow)?.with_stride(self.config.ray_stride);
            self.backend.cast_rays(&caster)?
        };
        timings.record(timer);
        trace!(stage = CaptureStage::RaysCast.as_str(), rays = rays.len());

        let timer = Timer::start("accumulate");
        let stats = {
            let _span = info_span!("accumulate", rays = rays.len()).entered();
            self.backend.accumulate(&self.grid, &rays, AccumulateMode::Add)?
        };
        timings.record(timer);
        trace!(stage = CaptureStage::Accumulated.as_str());

        Ok(CapturedFrame {
            ordinal,
            light,
            shadow,
            stats,
            ray_stride: self.config.ray_stride,
            smoothed_depth: smoothed,
            upsampled_depth: upsampled.is_some(),
            timestamp: bundle.timestamp,
        })
    }

    /// Removes the frame at `index` and, under [`RetractionPolicy::Subtract`],
    /// takes its evidence back out of the grid. Returns the removed frame.
    #[instrument(skip(self))]
    pub fn delete_frame(&mut self, index: usize) -> Result<FrameHandle> {
        let len = self.frames.len();
        let frame = self
            .frames
            .get(index)
            .cloned()
            .ok_or(CarvingError::FrameIndexOutOfRange { index, len })?;

        if self.config.retraction == RetractionPolicy::Subtract {
            let retracted = self.retract(&frame)?;
            if retracted != frame.stats {
                warn!(
                    ordinal = frame.ordinal,
                    "Retraction touched {} cells, capture touched {}",
                    retracted.cell_updates(),
                    frame.stats.cell_updates()
                );
            }
        }

        self.frames.remove(index);
        info!(
            ordinal = frame.ordinal,
            index,
            frames = self.frames.len(),
            policy = ?self.config.retraction,
            "Frame deleted"
        );
        Ok(frame)
    }

    fn retract(&self, frame: &CapturedFrame) -> Result<AccumulationStats> {
        let caster = RayCaster::for_frame(&frame.light, &frame.shadow)?.with_stride(frame.ray_stride);
        let rays = self.backend.cast_rays(&caster)?;
        self.backend.accumulate(&self.grid, &rays, AccumulateMode::Retract)
    }

    pub fn update_calibration(&mut self, params: CalibrationParams) -> Result<()> {
        params.validate()?;
        debug!(?params, "Calibration updated");
        self.calibration = params;
        Ok(())
    }

    pub fn calibration(&self) -> &CalibrationParams {
        &self.calibration
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[FrameHandle] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&FrameHandle> {
        self.frames.get(index)
    }

    pub fn voxel_grid(&self) -> &VoxelGrid {
        &self.grid
    }

    /// Drops every frame and zeroes the grid.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.grid.reset();
        info!("Session reset");
    }
}
