//! Light source localization module
//!
//! Finds the light's 2D image position as the centroid of over-threshold
//! pixels and lifts it to world space through the depth map.

mod localizer;
pub mod types;

pub use localizer::{locate, brightness_centroid, sample_depth_near};
pub use types::LightSource;
