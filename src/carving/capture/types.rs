//! Image plane types shared by the capture and carving stages

use rayon::prelude::*;

use crate::carving::camera::Resolution;
use crate::carving::common::error::{CarvingError, Result};

/// A single-channel, row-major image grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePlane<T> {
    pub width: usize,
    pub height: usize,
    pub data: Vec<T>,
}

/// Metric depth in meters; 0 marks an invalid sample.
pub type DepthImage = ImagePlane<f32>;

/// Per-pixel depth confidence (`ConfidenceLevel as u8`).
pub type ConfidenceImage = ImagePlane<u8>;

impl<T: Copy> ImagePlane<T> {
    pub fn new(width: usize, height: usize, data: Vec<T>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CarvingError::InvalidDimensions(width, height));
        }
        if data.len() != width * height {
            return Err(CarvingError::DimensionMismatch(format!(
                "{}x{} plane needs {} samples, got {}",
                width,
                height,
                width * height,
                data.len()
            )));
        }
        Ok(Self { width, height, data })
    }

    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        self.data[y * self.width + x] = value;
    }

    pub fn rows(&self) -> std::slice::ChunksExact<'_, T> {
        self.data.chunks_exact(self.width)
    }
}

impl DepthImage {
    #[inline]
    pub fn is_valid_depth(depth: f32) -> bool {
        depth.is_finite() && depth > 0.0
    }

    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&d| Self::is_valid_depth(d)).count()
    }

    /// Copy of the depth map with samples below `min` confidence zeroed.
    pub fn filtered_by_confidence(&self, confidence: Option<&ConfidenceImage>, min: ConfidenceLevel) -> Result<DepthImage> {
        let mut filtered = self.clone();
        let Some(confidence) = confidence else {
            return Ok(filtered);
        };
        if confidence.resolution() != self.resolution() {
            return Err(CarvingError::DimensionMismatch(format!(
                "confidence is {}x{}, depth is {}x{}",
                confidence.width, confidence.height, self.width, self.height
            )));
        }
        if min == ConfidenceLevel::Low {
            return Ok(filtered);
        }
        filtered
            .data
            .par_iter_mut()
            .zip(confidence.data.par_iter())
            .for_each(|(depth, &level)| {
                if ConfidenceLevel::from_raw(level) < min {
                    *depth = 0.0;
                }
            });
        Ok(filtered)
    }
}

/// Depth confidence reported by the sensor, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ConfidenceLevel {
    Low = 0,
    Medium = 1,
    High = 2,
}

impl ConfidenceLevel {
    pub fn from_raw(value: u8) -> Self {
        match value {
            0 => ConfidenceLevel::Low,
            1 => ConfidenceLevel::Medium,
            _ => ConfidenceLevel::High,
        }
    }
}

/// Interleaved RGB image with linear channel values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbImage {
    pub width: usize,
    pub height: usize,
    /// RGB pixel data interleaved [R, G, B, R, G, B, ...]
    pub data: Vec<f32>,
}

impl RgbImage {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CarvingError::InvalidDimensions(width, height));
        }
        if data.len() != width * height * 3 {
            return Err(CarvingError::DimensionMismatch(format!(
                "{}x{} RGB image needs {} values, got {}",
                width,
                height,
                width * height * 3,
                data.len()
            )));
        }
        Ok(Self { width, height, data })
    }

    pub fn filled(width: usize, height: usize, rgb: [f32; 3]) -> Self {
        let data = std::iter::repeat_n(rgb, width * height).flatten().collect();
        Self { width, height, data }
    }

    pub fn from_rgb8(width: usize, height: usize, bytes: &[u8]) -> Result<Self> {
        Self::new(width, height, bytes.iter().map(|&b| b as f32 / 255.0).collect())
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> [f32; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, rgb: [f32; 3]) {
        let i = (y * self.width + x) * 3;
        self.data[i..i + 3].copy_from_slice(&rgb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_rejects_wrong_length() {
        let err = DepthImage::new(4, 4, vec![0.0; 15]).unwrap_err();
        assert!(matches!(err, CarvingError::DimensionMismatch(_)));
        let err = DepthImage::new(0, 4, vec![]).unwrap_err();
        assert!(matches!(err, CarvingError::InvalidDimensions(0, 4)));
    }

    #[test]
    fn plane_indexing_is_row_major() {
        let mut plane = ImagePlane::filled(3, 2, 0u8);
        plane.set(2, 1, 7);
        assert_eq!(plane.data[5], 7);
        assert_eq!(plane.get(2, 1), 7);
        assert_eq!(plane.rows().count(), 2);
    }

    #[test]
    fn depth_validity() {
        let depth = DepthImage::new(2, 2, vec![0.0, 1.0, f32::NAN, -0.5]).unwrap();
        assert_eq!(depth.valid_count(), 1);
    }

    #[test]
    fn low_confidence_depth_is_dropped() {
        let depth = DepthImage::filled(3, 1, 1.5);
        let confidence = ConfidenceImage::new(3, 1, vec![0, 1, 2]).unwrap();

        let medium = depth
            .filtered_by_confidence(Some(&confidence), ConfidenceLevel::Medium)
            .unwrap();
        assert_eq!(medium.data, vec![0.0, 1.5, 1.5]);

        let low = depth.filtered_by_confidence(Some(&confidence), ConfidenceLevel::Low).unwrap();
        assert_eq!(low, depth);
        assert_eq!(depth.filtered_by_confidence(None, ConfidenceLevel::High).unwrap(), depth);

        let wrong = ConfidenceImage::filled(2, 1, 2);
        assert!(depth.filtered_by_confidence(Some(&wrong), ConfidenceLevel::High).is_err());
    }

    #[test]
    fn confidence_levels_are_ordered() {
        assert!(ConfidenceLevel::from_raw(2) > ConfidenceLevel::from_raw(1));
        assert_eq!(ConfidenceLevel::from_raw(9), ConfidenceLevel::High);
    }

    #[test]
    fn rgb8_conversion() {
        let img = RgbImage::from_rgb8(1, 1, &[255, 0, 51]).unwrap();
        assert_eq!(img.get(0, 0), [1.0, 0.0, 0.2]);
    }
}
