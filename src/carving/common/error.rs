use thiserror::Error;

#[derive(Error, Debug)]
pub enum CarvingError {
    #[error("No pixel met the light source brightness criterion")]
    LightSourceNotFound,

    #[error("Tracking has no valid scene geometry yet")]
    NotReconstructing,

    #[error("Frame index {index} out of range (captured frames: {len})")]
    FrameIndexOutOfRange { index: usize, len: usize },

    #[error("Invalid voxel grid: {0}")]
    InvalidGrid(String),

    #[error("Invalid image dimensions: width={0}, height={1}")]
    InvalidDimensions(usize, usize),

    #[error("Image dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Invalid calibration: {0}")]
    InvalidCalibration(String),

    #[error("Compute backend error: {0}")]
    Backend(String),

    #[error("Failed to export image: {0}")]
    Export(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CarvingError>;
