use glam::{Mat3, Mat4};

use crate::carving::camera::{CameraModel, Intrinsics, Resolution};
use crate::carving::capture::types::{ConfidenceImage, DepthImage};
use crate::carving::capture::ycbcr::ColorFrame;
use crate::carving::common::error::{CarvingError, Result};

/// One tick of RGB-D data from the tracking collaborator. Immutable once
/// posted; captures work on their own `Arc` snapshot of it.
#[derive(Debug, Clone)]
pub struct CameraFrameBundle {
    pub color: ColorFrame,
    pub depth: DepthImage,
    pub confidence: Option<ConfidenceImage>,
    pub depth_smoothed: Option<DepthImage>,
    pub confidence_smoothed: Option<ConfidenceImage>,
    /// Intrinsics for `resolution`, the full color resolution
    pub intrinsics: Intrinsics,
    pub resolution: Resolution,
    pub camera_to_world: Mat4,
    pub is_scene_being_reconstructed: bool,
    pub timestamp: f64,
}

impl CameraFrameBundle {
    pub fn new(
        color: impl Into<ColorFrame>,
        depth: DepthImage,
        intrinsics: Intrinsics,
        camera_to_world: Mat4,
    ) -> Self {
        let color = color.into();
        let resolution = color.resolution();
        Self {
            color,
            depth,
            confidence: None,
            depth_smoothed: None,
            confidence_smoothed: None,
            intrinsics,
            resolution,
            camera_to_world,
            is_scene_being_reconstructed: true,
            timestamp: 0.0,
        }
    }

    /// Builds a bundle from a raw 3x3 intrinsics matrix given as rows.
    pub fn from_matrix_rows(
        color: impl Into<ColorFrame>,
        depth: DepthImage,
        intrinsics: [[f32; 3]; 3],
        camera_to_world: Mat4,
    ) -> Self {
        let k = Mat3::from_cols_array_2d(&intrinsics).transpose();
        Self::new(color, depth, Intrinsics::from_matrix(&k), camera_to_world)
    }

    pub fn with_confidence(mut self, confidence: ConfidenceImage) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_smoothed(mut self, depth: DepthImage, confidence: Option<ConfidenceImage>) -> Self {
        self.depth_smoothed = Some(depth);
        self.confidence_smoothed = confidence;
        self
    }

    pub fn with_reconstructing(mut self, reconstructing: bool) -> Self {
        self.is_scene_being_reconstructed = reconstructing;
        self
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn color_resolution(&self) -> Resolution {
        self.color.resolution()
    }

    /// Camera model at the resolution the intrinsics were computed for.
    pub fn camera(&self) -> CameraModel {
        CameraModel::new(self.intrinsics, self.resolution, self.camera_to_world)
    }

    /// Depth and matching confidence, preferring the smoothed pair when asked
    /// and available. The flag reports whether smoothed maps were used.
    pub fn depth_source(&self, use_smoothed: bool) -> (&DepthImage, Option<&ConfidenceImage>, bool) {
        match (&self.depth_smoothed, use_smoothed) {
            (Some(smoothed), true) => (smoothed, self.confidence_smoothed.as_ref(), true),
            _ => (&self.depth, self.confidence.as_ref(), false),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for res in [self.resolution, self.color.resolution(), self.depth.resolution()] {
            if res.is_empty() {
                return Err(CarvingError::InvalidDimensions(res.width, res.height));
            }
        }
        if !self.intrinsics.is_valid() {
            return Err(CarvingError::InvalidCalibration(format!(
                "intrinsics must have positive finite focal lengths: {:?}",
                self.intrinsics
            )));
        }
        let depth_res = self.depth.resolution();
        let planes = [
            ("confidence", self.confidence.as_ref().map(|c| c.resolution())),
            ("smoothed depth", self.depth_smoothed.as_ref().map(|d| d.resolution())),
            ("smoothed confidence", self.confidence_smoothed.as_ref().map(|c| c.resolution())),
        ];
        for (name, res) in planes {
            if let Some(res) = res {
                if res != depth_res {
                    return Err(CarvingError::DimensionMismatch(format!(
                        "{} plane is {}x{}, depth is {}x{}",
                        name, res.width, res.height, depth_res.width, depth_res.height
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carving::capture::types::RgbImage;

    fn bundle() -> CameraFrameBundle {
        CameraFrameBundle::new(
            RgbImage::filled(8, 6, [0.2; 3]),
            DepthImage::filled(4, 3, 1.0),
            Intrinsics::new(10.0, 10.0, 4.0, 3.0),
            Mat4::IDENTITY,
        )
    }

    #[test]
    fn matrix_rows_are_read_as_k() {
        let b = CameraFrameBundle::from_matrix_rows(
            RgbImage::filled(8, 6, [0.2; 3]),
            DepthImage::filled(4, 3, 1.0),
            [[11.0, 0.0, 4.5], [0.0, 12.0, 3.5], [0.0, 0.0, 1.0]],
            Mat4::IDENTITY,
        );
        assert_eq!(b.intrinsics, Intrinsics::new(11.0, 12.0, 4.5, 3.5));
        assert_eq!(b.resolution, Resolution::new(8, 6));
    }

    #[test]
    fn smoothed_depth_is_opt_in() {
        let b = bundle().with_smoothed(DepthImage::filled(4, 3, 2.0), None);
        assert_eq!(b.depth_source(false).0.get(0, 0), 1.0);
        let (depth, _, smoothed) = b.depth_source(true);
        assert!(smoothed);
        assert_eq!(depth.get(0, 0), 2.0);
    }

    #[test]
    fn smoothed_request_falls_back_when_absent() {
        let b = bundle();
        let (depth, _, smoothed) = b.depth_source(true);
        assert!(!smoothed);
        assert_eq!(depth.get(0, 0), 1.0);
    }

    #[test]
    fn validate_catches_mismatched_confidence() {
        let b = bundle().with_confidence(ConfidenceImage::filled(2, 2, 2));
        assert!(matches!(b.validate(), Err(CarvingError::DimensionMismatch(_))));
        assert!(bundle().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_planes() {
        let mut b = bundle();
        b.depth = DepthImage::filled(0, 0, 1.0);
        assert!(matches!(b.validate(), Err(CarvingError::InvalidDimensions(0, 0))));

        let mut b = bundle();
        b.color = RgbImage::filled(0, 6, [0.2; 3]).into();
        assert!(matches!(b.validate(), Err(CarvingError::InvalidDimensions(0, 6))));
    }
}
