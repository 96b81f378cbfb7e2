use glam::{Vec2, Vec3};

/// Light position recovered for one capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSource {
    /// Centroid pixel in full color resolution
    pub image_position: Vec2,
    pub world_position: Vec3,
    /// Number of pixels that met the brightness criterion
    pub matched_pixels: usize,
}
