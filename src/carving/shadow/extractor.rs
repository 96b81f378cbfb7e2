use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::carving::camera::Resolution;
use crate::carving::capture::types::RgbImage;
use crate::carving::shadow::blur::{gaussian_blur, luminance_plane};
use crate::carving::shadow::types::{CalibrationParams, LumaImage, MaskImage};

/// Output of mask extraction at depth resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskResult {
    pub mask: MaskImage,
    /// Number of in-shadow pixels
    pub pixel_count: usize,
}

pub fn blurred_luminance(color: &RgbImage, sigma: f32) -> LumaImage {
    gaussian_blur(&luminance_plane(color), sigma)
}

/// Classifies every depth-map pixel by sampling the color-resolution
/// luminance at the pixel's center. A pixel is in shadow iff it falls inside
/// the ROI and its luminance lies in `[gray_min, gray_max]`.
pub fn threshold_mask(luma: &LumaImage, depth_resolution: Resolution, params: &CalibrationParams) -> MaskResult {
    let (dw, dh) = (depth_resolution.width, depth_resolution.height);
    let scale_x = luma.width as f32 / dw as f32;
    let scale_y = luma.height as f32 / dh as f32;

    let mut data = vec![false; dw * dh];
    if data.is_empty() || luma.resolution().is_empty() {
        return MaskResult {
            mask: MaskImage {
                width: dw,
                height: dh,
                data,
            },
            pixel_count: 0,
        };
    }
    let pixel_count: usize = data
        .par_chunks_mut(dw)
        .enumerate()
        .map(|(y, row)| {
            let cy = (((y as f32 + 0.5) * scale_y) as usize).min(luma.height - 1);
            let mut count = 0;
            for (x, cell) in row.iter_mut().enumerate() {
                let cx = (((x as f32 + 0.5) * scale_x) as usize).min(luma.width - 1);
                if !params.roi.contains(cx, cy) {
                    continue;
                }
                let l = luma.get(cx, cy);
                if l >= params.gray_min && l <= params.gray_max {
                    *cell = true;
                    count += 1;
                }
            }
            count
        })
        .sum();

    MaskResult {
        mask: MaskImage {
            width: dw,
            height: dh,
            data,
        },
        pixel_count,
    }
}

#[instrument(skip(color, params), fields(color_width = color.width, color_height = color.height))]
pub fn compute_mask(color: &RgbImage, depth_resolution: Resolution, params: &CalibrationParams) -> MaskResult {
    let luma = blurred_luminance(color, params.blur_sigma);
    let result = threshold_mask(&luma, depth_resolution, params);
    debug!(
        "Shadow mask {}x{}: {} of {} pixels in shadow",
        depth_resolution.width,
        depth_resolution.height,
        result.pixel_count,
        depth_resolution.pixel_count()
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carving::shadow::types::RoiRect;

    /// Left third black, middle third mid-gray, right third white.
    fn banded(width: usize, height: usize) -> RgbImage {
        let mut img = RgbImage::filled(width, height, [0.0; 3]);
        for y in 0..height {
            for x in 0..width {
                let v = match x * 3 / width {
                    0 => 0.0,
                    1 => 0.25,
                    _ => 1.0,
                };
                img.set(x, y, [v; 3]);
            }
        }
        img
    }

    fn params() -> CalibrationParams {
        CalibrationParams::builder().gray_range(0.1, 0.4).blur_sigma(0.0).build()
    }

    #[test]
    fn band_separates_shadow_from_dark_and_lit() {
        let result = compute_mask(&banded(12, 6), Resolution::new(12, 6), &params());
        for y in 0..6 {
            for x in 0..12 {
                assert_eq!(result.mask.get(x, y), (4..8).contains(&x), "pixel ({x}, {y})");
            }
        }
        assert_eq!(result.pixel_count, 4 * 6);
    }

    #[test]
    fn pixels_outside_roi_are_never_shadow() {
        let params = CalibrationParams {
            roi: RoiRect::new(0, 12, 0, 3),
            ..params()
        };
        let result = compute_mask(&banded(12, 6), Resolution::new(12, 6), &params);
        assert!((0..12).all(|x| !result.mask.get(x, 4)));
        assert_eq!(result.pixel_count, 4 * 3);
    }

    #[test]
    fn mask_is_sampled_at_depth_resolution() {
        // Color is 4x the depth grid; ROI is in color pixels.
        let result = compute_mask(&banded(24, 12), Resolution::new(6, 3), &params());
        assert_eq!(result.mask.resolution(), Resolution::new(6, 3));
        assert_eq!(result.pixel_count, 2 * 3);
        assert!(result.mask.get(2, 1) && result.mask.get(3, 1));
        assert!(!result.mask.get(1, 1) && !result.mask.get(4, 1));
    }

    #[test]
    fn extraction_is_pure() {
        let color = banded(30, 20);
        let params = CalibrationParams::builder().gray_range(0.1, 0.4).blur_sigma(1.2).build();
        let a = compute_mask(&color, Resolution::new(15, 10), &params);
        let b = compute_mask(&color, Resolution::new(15, 10), &params);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_band_gives_empty_mask() {
        let params = CalibrationParams::builder().gray_range(0.5, 0.6).blur_sigma(0.0).build();
        let result = compute_mask(&banded(12, 6), Resolution::new(12, 6), &params);
        assert_eq!(result.pixel_count, 0);
        assert!(result.mask.data.iter().all(|&m| !m));
    }

    #[test]
    fn empty_planes_give_empty_mask() {
        let result = compute_mask(&banded(12, 6), Resolution::new(0, 0), &params());
        assert_eq!(result.pixel_count, 0);
        assert!(result.mask.data.is_empty());

        let result = compute_mask(&RgbImage::filled(0, 0, [0.25; 3]), Resolution::new(4, 3), &params());
        assert_eq!(result.pixel_count, 0);
        assert_eq!(result.mask.resolution(), Resolution::new(4, 3));
    }
}
