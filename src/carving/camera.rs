//! Camera model module
//!
//! Pinhole projection and unprojection between pixels, camera space and world space.
//! Camera space follows the image axes: +X right, +Y down, +Z along the optical axis.

mod intrinsics;
mod model;

pub use intrinsics::{Intrinsics, Resolution, scale_intrinsics};
pub use model::CameraModel;
