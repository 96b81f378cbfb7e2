//! Shadow carving pipeline module
//!
//! Reconstructs occupied space from hand-held RGB-D captures lit by a moving
//! point light: each capture locates the light, classifies shadowed depth
//! pixels, casts light-to-surface rays and accumulates them into a voxel grid.

pub mod common;
pub mod camera;
pub mod capture;
pub mod shadow;
pub mod light;
pub mod rays;
pub mod voxel;
pub mod backend;
pub mod session;
pub mod export;
pub mod synthetic;

pub use common::{
    CarvingError,
    Result,
};

pub use camera::{
    CameraModel,
    Intrinsics,
    Resolution,
};

pub use capture::{
    CameraFrameBundle,
    ColorFrame,
    ConfidenceImage,
    ConfidenceLevel,
    DepthImage,
    DepthUpsampling,
    FrameMailbox,
    ManualTracking,
    RgbImage,
    TrackingSession,
    YCbCrImage,
};

pub use shadow::{
    CalibrationParams,
    CalibrationParamsBuilder,
    MaskImage,
    RoiRect,
    ShadowMask,
};

pub use light::LightSource;

pub use rays::{
    Ray,
    RayCaster,
};

pub use voxel::{
    AccumulateMode,
    AccumulationStats,
    GridSpec,
    OccupancyPolicy,
    Voxel,
    VoxelGrid,
};

pub use backend::{
    ComputeBackend,
    CpuBackend,
    CudaBackend,
};

pub use session::{
    CapturedFrame,
    CarvingSession,
    PipelineTimings,
    RetractionPolicy,
    SessionConfig,
    SessionConfigBuilder,
};

pub use export::{
    ExportConfig,
    TiffCompression,
    TiffExporter,
};

pub use synthetic::SyntheticScene;
