//! Synthetic RGB-D scenes
//!
//! Renders a box standing in front of a flat wall, lit by a small point light
//! that is itself visible to the camera. Produces the same bundles the
//! tracking collaborator would deliver, so the whole capture pipeline can run
//! without a device.

use glam::{Mat4, Vec2, Vec3};
use rayon::prelude::*;

use crate::carving::camera::{CameraModel, Intrinsics, Resolution};
use crate::carving::capture::{CameraFrameBundle, ConfidenceImage, ConfidenceLevel, DepthImage, RgbImage};
use crate::carving::voxel::GridSpec;

/// Luminance of a lit surface; above the shadow band, below the light threshold.
pub const LIT_GRAY: f32 = 0.7;
/// Luminance of a shadowed surface; inside the default shadow band.
pub const SHADOW_GRAY: f32 = 0.2;

/// Segment parameters closer than this to either end do not count as blocked.
const OCCLUSION_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone)]
pub struct SyntheticScene {
    pub color_resolution: Resolution,
    pub depth_resolution: Resolution,
    /// Intrinsics at color resolution
    pub intrinsics: Intrinsics,
    pub camera_to_world: Mat4,
    /// World z of the wall behind the box
    pub wall_z: f32,
    pub box_min: Vec3,
    pub box_max: Vec3,
    /// Radius of the visible light bulb in world units
    pub light_radius: f32,
}

impl Default for SyntheticScene {
    fn default() -> Self {
        Self {
            color_resolution: Resolution::new(160, 120),
            depth_resolution: Resolution::new(80, 60),
            intrinsics: Intrinsics::new(150.0, 150.0, 80.0, 60.0),
            camera_to_world: Mat4::IDENTITY,
            wall_z: 1.5,
            box_min: Vec3::new(-0.1, -0.1, 0.9),
            box_max: Vec3::new(0.1, 0.1, 1.1),
            light_radius: 0.015,
        }
    }
}

/// Entry and exit parameters of `origin + t * dir` through an axis-aligned box.
fn slab_hit(origin: Vec3, dir: Vec3, min: Vec3, max: Vec3) -> Option<(f32, f32)> {
    let inv = dir.recip();
    let t0 = (min - origin) * inv;
    let t1 = (max - origin) * inv;
    let t_near = t0.min(t1).max_element();
    let t_far = t0.max(t1).min_element();
    (t_near <= t_far && t_far.is_finite()).then_some((t_near, t_far))
}

impl SyntheticScene {
    pub fn camera(&self) -> CameraModel {
        CameraModel::new(self.intrinsics, self.color_resolution, self.camera_to_world)
    }

    pub fn box_center(&self) -> Vec3 {
        (self.box_min + self.box_max) * 0.5
    }

    /// A cubic grid of `cells` per side around the box, twice its extent.
    pub fn grid_spec(&self, cells: usize) -> GridSpec {
        let extent = (self.box_max - self.box_min).max_element() * 2.0;
        GridSpec::centered(self.box_center(), cells, extent / cells as f32)
    }

    /// Light positions on a ring between the camera and the box, all inside
    /// the field of view.
    pub fn light_ring(&self, count: usize) -> Vec<Vec3> {
        let center = self.camera().position().lerp(self.box_center(), 0.5);
        (0..count)
            .map(|i| {
                let angle = i as f32 / count.max(1) as f32 * std::f32::consts::TAU;
                center + Vec3::new(angle.cos() * 0.12, angle.sin() * 0.09, 0.0)
            })
            .collect()
    }

    /// Nearest surface along the camera ray through `pixel`: camera-space
    /// depth and world hit point.
    fn surface(&self, camera: &CameraModel, pixel: Vec2) -> Option<(f32, Vec3)> {
        let origin = camera.position();
        let target = camera.unproject_to_world(pixel, 1.0)?;
        // Parameterised so that t equals camera-space depth
        let dir = target - origin;

        let wall = (dir.z.abs() > f32::EPSILON)
            .then(|| (self.wall_z - origin.z) / dir.z)
            .filter(|t| *t > 0.0);
        let block = slab_hit(origin, dir, self.box_min, self.box_max)
            .map(|(near, _)| near)
            .filter(|t| *t > 0.0);

        let t = match (wall, block) {
            (Some(w), Some(b)) => w.min(b),
            (w, b) => w.or(b)?,
        };
        Some((t, origin + dir * t))
    }

    fn occluded(&self, point: Vec3, light: Vec3) -> bool {
        match slab_hit(point, light - point, self.box_min, self.box_max) {
            Some((near, far)) => far > OCCLUSION_EPSILON && near < 1.0 - OCCLUSION_EPSILON,
            None => false,
        }
    }

    /// Whether `pixel` at `camera`'s resolution sees the light bulb, and its depth.
    fn light_hit(&self, camera: &CameraModel, pixel: Vec2, light: Vec3) -> Option<f32> {
        let light_camera = camera.camera_to_world.inverse().transform_point3(light);
        let center = camera.project(light_camera)?;
        let radius = camera.intrinsics.fx * self.light_radius / light_camera.z;
        (pixel.distance(center) <= radius.max(0.5)).then_some(light_camera.z)
    }

    /// Renders one bundle with the light at `light` (world coordinates).
    pub fn render(&self, light: Vec3) -> CameraFrameBundle {
        self.render_with(Some(light))
    }

    /// Renders the scene with the light switched off: no pixel is bright
    /// enough to be taken for the light source.
    pub fn render_dark(&self) -> CameraFrameBundle {
        self.render_with(None)
    }

    fn render_with(&self, light: Option<Vec3>) -> CameraFrameBundle {
        let color_camera = self.camera();
        let depth_camera = color_camera.scaled_to(self.depth_resolution);

        let Resolution { width: cw, height: ch } = self.color_resolution;
        let mut color = vec![0.0f32; cw * ch * 3];
        color.par_chunks_mut(cw * 3).enumerate().for_each(|(y, row)| {
            for x in 0..cw {
                let pixel = Vec2::new(x as f32, y as f32);
                let gray = match light {
                    Some(l) if self.light_hit(&color_camera, pixel, l).is_some() => 1.0,
                    Some(l) => match self.surface(&color_camera, pixel) {
                        Some((_, p)) if self.occluded(p, l) => SHADOW_GRAY,
                        Some(_) => LIT_GRAY,
                        None => 0.0,
                    },
                    None => match self.surface(&color_camera, pixel) {
                        Some(_) => SHADOW_GRAY,
                        None => 0.0,
                    },
                };
                row[x * 3..x * 3 + 3].fill(gray);
            }
        });

        let Resolution { width: dw, height: dh } = self.depth_resolution;
        let mut depth = vec![0.0f32; dw * dh];
        depth.par_chunks_mut(dw).enumerate().for_each(|(y, row)| {
            for (x, sample) in row.iter_mut().enumerate() {
                let pixel = Vec2::new(x as f32, y as f32);
                *sample = light
                    .and_then(|l| self.light_hit(&depth_camera, pixel, l))
                    .or_else(|| self.surface(&depth_camera, pixel).map(|(d, _)| d))
                    .unwrap_or(0.0);
            }
        });

        let color = RgbImage {
            width: cw,
            height: ch,
            data: color,
        };
        let depth = DepthImage {
            width: dw,
            height: dh,
            data: depth,
        };
        let confidence = ConfidenceImage::filled(dw, dh, ConfidenceLevel::High as u8);

        CameraFrameBundle::new(color, depth, self.intrinsics, self.camera_to_world).with_confidence(confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carving::light;
    use crate::carving::shadow::{compute_mask, CalibrationParams};

    #[test]
    fn wall_and_box_depths() {
        let scene = SyntheticScene::default();
        let bundle = scene.render_dark();
        // Center pixel looks straight at the box front face
        assert!((bundle.depth.get(40, 30) - 0.9).abs() < 1e-4);
        // Corner pixel sees the wall
        assert!((bundle.depth.get(0, 0) - 1.5).abs() < 1e-4);
        assert_eq!(bundle.depth.valid_count(), 80 * 60);
    }

    #[test]
    fn light_is_found_where_it_was_placed() {
        let scene = SyntheticScene::default();
        let position = scene.light_ring(4)[0];
        let bundle = scene.render(position);
        let color = bundle.color.to_rgb();

        let found = light::locate(&color, &bundle.depth, &bundle.camera(), 0.98).unwrap();
        assert!(found.world_position.distance(position) < 0.02);
    }

    #[test]
    fn box_casts_a_shadow_on_the_wall() {
        let scene = SyntheticScene::default();
        let bundle = scene.render(scene.light_ring(4)[0]);
        let color = bundle.color.to_rgb();
        let result = compute_mask(&color, bundle.depth.resolution(), &CalibrationParams::default());
        assert!(result.pixel_count > 0);
        assert!(result.pixel_count < 80 * 60);
    }

    #[test]
    fn dark_scene_has_no_light() {
        let scene = SyntheticScene::default();
        let bundle = scene.render_dark();
        let color = bundle.color.to_rgb();
        assert!(light::brightness_centroid(&color, 0.98).is_none());
    }
}
