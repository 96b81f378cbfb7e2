//! Shadow mask module
//!
//! Calibration parameters and the blurred-luminance band threshold that
//! classifies depth-map pixels as in shadow or lit.

mod blur;
mod extractor;
pub mod types;

pub use blur::{gaussian_kernel, gaussian_blur, luminance, luminance_plane};
pub use extractor::{blurred_luminance, compute_mask, threshold_mask, MaskResult};
pub use types::{CalibrationParams, CalibrationParamsBuilder, RoiRect, LumaImage, MaskImage, ShadowMask};
