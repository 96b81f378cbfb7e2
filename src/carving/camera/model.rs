use glam::{Mat4, Vec2, Vec3};

use crate::carving::camera::{Intrinsics, Resolution, scale_intrinsics};

/// A calibrated camera at one pose: intrinsics for `resolution` plus the
/// camera-to-world transform reported by tracking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraModel {
    pub intrinsics: Intrinsics,
    pub resolution: Resolution,
    pub camera_to_world: Mat4,
}

impl CameraModel {
    pub fn new(intrinsics: Intrinsics, resolution: Resolution, camera_to_world: Mat4) -> Self {
        Self {
            intrinsics,
            resolution,
            camera_to_world,
        }
    }

    /// The same camera sampled at another resolution (e.g. color → depth).
    pub fn scaled_to(&self, resolution: Resolution) -> Self {
        Self {
            intrinsics: scale_intrinsics(&self.intrinsics, self.resolution, resolution),
            resolution,
            camera_to_world: self.camera_to_world,
        }
    }

    /// Pixel plus metric depth to a camera-space point.
    /// Returns `None` for non-positive or non-finite depth.
    pub fn unproject(&self, pixel: Vec2, depth: f32) -> Option<Vec3> {
        if !depth.is_finite() || depth <= 0.0 {
            return None;
        }
        let k = &self.intrinsics;
        Some(Vec3::new(
            (pixel.x - k.cx) * depth / k.fx,
            (pixel.y - k.cy) * depth / k.fy,
            depth,
        ))
    }

    /// Forward pinhole projection of a camera-space point.
    pub fn project(&self, point: Vec3) -> Option<Vec2> {
        if point.z <= 0.0 {
            return None;
        }
        let k = &self.intrinsics;
        Some(Vec2::new(
            k.fx * point.x / point.z + k.cx,
            k.fy * point.y / point.z + k.cy,
        ))
    }

    pub fn to_world(&self, point: Vec3) -> Vec3 {
        self.camera_to_world.transform_point3(point)
    }

    pub fn unproject_to_world(&self, pixel: Vec2, depth: f32) -> Option<Vec3> {
        self.unproject(pixel, depth).map(|p| self.to_world(p))
    }

    pub fn position(&self) -> Vec3 {
        self.camera_to_world.w_axis.truncate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn camera() -> CameraModel {
        CameraModel::new(
            Intrinsics::new(200.0, 210.0, 128.0, 96.0),
            Resolution::new(256, 192),
            Mat4::IDENTITY,
        )
    }

    #[test]
    fn unproject_then_project_recovers_pixel() {
        let cam = camera();
        for &(x, y, d) in &[(0.0, 0.0, 0.3), (128.0, 96.0, 1.0), (255.0, 191.0, 4.5), (17.5, 150.25, 2.0)] {
            let p = cam.unproject(Vec2::new(x, y), d).unwrap();
            let back = cam.project(p).unwrap();
            assert!((back.x - x).abs() < 1e-3, "x {} vs {}", back.x, x);
            assert!((back.y - y).abs() < 1e-3, "y {} vs {}", back.y, y);
            assert!((p.z - d).abs() < 1e-6);
        }
    }

    #[test]
    fn invalid_depth_yields_no_point() {
        let cam = camera();
        assert!(cam.unproject(Vec2::new(10.0, 10.0), 0.0).is_none());
        assert!(cam.unproject(Vec2::new(10.0, 10.0), -1.0).is_none());
        assert!(cam.unproject(Vec2::new(10.0, 10.0), f32::NAN).is_none());
        assert!(cam.unproject(Vec2::new(10.0, 10.0), f32::INFINITY).is_none());
    }

    #[test]
    fn principal_point_lies_on_optical_axis() {
        let cam = camera();
        let p = cam.unproject(Vec2::new(128.0, 96.0), 2.0).unwrap();
        assert_eq!(p, Vec3::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn world_transform_applies_pose() {
        let pose = Mat4::from_rotation_translation(
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            Vec3::new(1.0, 2.0, 3.0),
        );
        let cam = CameraModel { camera_to_world: pose, ..camera() };
        let world = cam.unproject_to_world(Vec2::new(128.0, 96.0), 1.0).unwrap();
        // +Z rotated a quarter turn about Y points along +X.
        assert!((world - Vec3::new(2.0, 2.0, 3.0)).length() < 1e-5);
        assert_eq!(cam.position(), Vec3::new(1.0, 2.0, 3.0));
    }
}
