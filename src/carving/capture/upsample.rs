//! Guided-filter depth upsampling
//!
//! The sensor depth grid is much coarser than the color image. A local
//! linear model `depth ≈ a * luma + b` is fitted over windows of the depth
//! grid, with the color luminance resampled to depth resolution as guidance.
//! The averaged coefficients are then interpolated to the target resolution
//! and applied to the full-detail luminance there, so depth edges follow
//! color edges instead of the blocky depth grid.

use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::carving::camera::Resolution;
use crate::carving::capture::types::{ConfidenceImage, DepthImage, RgbImage};
use crate::carving::common::error::{CarvingError, Result};
use crate::carving::shadow::{LumaImage, luminance_plane};

const MIN_EPSILON: f32 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthUpsampling {
    /// Output size as a multiple of the depth grid, capped at the color resolution
    pub factor: usize,
    /// Half-width of the regression window, in depth pixels
    pub radius: usize,
    /// Regularisation of the linear model; larger values smooth more
    pub epsilon: f32,
}

impl Default for DepthUpsampling {
    fn default() -> Self {
        Self {
            factor: 2,
            radius: 2,
            epsilon: 1e-4,
        }
    }
}

impl DepthUpsampling {
    pub fn target_resolution(&self, depth: Resolution, color: Resolution) -> Resolution {
        let factor = self.factor.max(1);
        Resolution::new(
            (depth.width * factor).min(color.width.max(depth.width)),
            (depth.height * factor).min(color.height.max(depth.height)),
        )
    }
}

/// Per-pixel linear model. `weight` is 0 where the window held no valid depth.
struct Coefficients {
    width: usize,
    height: usize,
    a: Vec<f32>,
    b: Vec<f32>,
    weight: Vec<f32>,
}

/// Upsamples `depth` (and its confidence, bilinearly) towards the color
/// resolution. Invalid depth samples take no part in the fit; output pixels
/// whose neighbourhood held no valid depth stay invalid (0).
#[instrument(skip_all, fields(depth_width = depth.width, depth_height = depth.height))]
pub fn upsample_depth(
    depth: &DepthImage,
    confidence: Option<&ConfidenceImage>,
    color: &RgbImage,
    settings: &DepthUpsampling,
) -> Result<(DepthImage, Option<ConfidenceImage>)> {
    for res in [depth.resolution(), color.resolution()] {
        if res.is_empty() {
            return Err(CarvingError::InvalidDimensions(res.width, res.height));
        }
    }
    if let Some(confidence) = confidence {
        if confidence.resolution() != depth.resolution() {
            return Err(CarvingError::DimensionMismatch(format!(
                "confidence is {}x{}, depth is {}x{}",
                confidence.width, confidence.height, depth.width, depth.height
            )));
        }
    }

    let target = settings.target_resolution(depth.resolution(), color.resolution());
    let luma = luminance_plane(color);
    let guide_low = area_resample(&luma, depth.resolution());
    let guide_high = area_resample(&luma, target);

    let coefficients = fit(depth, &guide_low, settings.radius, settings.epsilon.max(MIN_EPSILON));
    let upsampled = reconstruct(&coefficients, &guide_high);
    let confidence = confidence.map(|c| upsample_confidence(c, target));

    debug!(
        "Depth upsampled {}x{} -> {}x{}, {} of {} samples valid",
        depth.width,
        depth.height,
        target.width,
        target.height,
        upsampled.valid_count(),
        target.pixel_count()
    );
    Ok((upsampled, confidence))
}

/// Box-averages (or replicates, when enlarging) a plane to `target`.
pub fn area_resample(plane: &LumaImage, target: Resolution) -> LumaImage {
    let (sw, sh) = (plane.width, plane.height);
    let (tw, th) = (target.width, target.height);
    let span = |i: usize, src: usize, dst: usize| {
        let start = (i * src / dst).min(src - 1);
        let end = ((i + 1) * src / dst).clamp(start + 1, src);
        start..end
    };

    let mut data = vec![0.0f32; tw * th];
    data.par_chunks_mut(tw).enumerate().for_each(|(y, row)| {
        let rows = span(y, sh, th);
        for (x, out) in row.iter_mut().enumerate() {
            let cols = span(x, sw, tw);
            let mut acc = 0.0;
            for sy in rows.clone() {
                for sx in cols.clone() {
                    acc += plane.get(sx, sy);
                }
            }
            *out = acc / (rows.len() * cols.len()) as f32;
        }
    });
    LumaImage {
        width: tw,
        height: th,
        data,
    }
}

/// Sum over the in-bounds part of the `(2r+1)^2` window around each pixel.
fn box_sum(data: &[f32], width: usize, height: usize, radius: usize) -> Vec<f32> {
    let mut horizontal = vec![0.0f32; width * height];
    horizontal
        .par_chunks_mut(width)
        .zip(data.par_chunks(width))
        .for_each(|(out, src)| {
            let mut prefix = Vec::with_capacity(width + 1);
            prefix.push(0.0f64);
            for &v in src {
                prefix.push(prefix[prefix.len() - 1] + v as f64);
            }
            for (x, o) in out.iter_mut().enumerate() {
                let lo = x.saturating_sub(radius);
                let hi = (x + radius + 1).min(width);
                *o = (prefix[hi] - prefix[lo]) as f32;
            }
        });

    let mut sums = vec![0.0f32; width * height];
    sums.par_chunks_mut(width).enumerate().for_each(|(y, out)| {
        let lo = y.saturating_sub(radius);
        let hi = (y + radius + 1).min(height);
        for sy in lo..hi {
            let src = &horizontal[sy * width..(sy + 1) * width];
            for (o, v) in out.iter_mut().zip(src) {
                *o += v;
            }
        }
    });
    sums
}

fn fit(depth: &DepthImage, guide: &LumaImage, radius: usize, epsilon: f32) -> Coefficients {
    let (w, h) = (depth.width, depth.height);
    let weights: Vec<f32> = depth
        .data
        .par_iter()
        .map(|&d| if DepthImage::is_valid_depth(d) { 1.0 } else { 0.0 })
        .collect();
    let weighted = |f: &(dyn Fn(f32, f32) -> f32 + Sync)| -> Vec<f32> {
        let values: Vec<f32> = (0..w * h)
            .into_par_iter()
            .map(|i| weights[i] * f(guide.data[i], if weights[i] > 0.0 { depth.data[i] } else { 0.0 }))
            .collect();
        box_sum(&values, w, h, radius)
    };

    let sum_w = box_sum(&weights, w, h, radius);
    let sum_i = weighted(&|i, _| i);
    let sum_p = weighted(&|_, p| p);
    let sum_ii = weighted(&|i, _| i * i);
    let sum_ip = weighted(&|i, p| i * p);

    let mut a = vec![0.0f32; w * h];
    let mut b = vec![0.0f32; w * h];
    let mut fitted = vec![0.0f32; w * h];
    a.par_iter_mut()
        .zip(b.par_iter_mut())
        .zip(fitted.par_iter_mut())
        .enumerate()
        .for_each(|(k, ((a, b), fitted))| {
            let n = sum_w[k];
            if n <= 0.0 {
                return;
            }
            let mean_i = sum_i[k] / n;
            let mean_p = sum_p[k] / n;
            let var = (sum_ii[k] / n - mean_i * mean_i).max(0.0);
            let cov = sum_ip[k] / n - mean_i * mean_p;
            *a = cov / (var + epsilon);
            *b = mean_p - *a * mean_i;
            *fitted = 1.0;
        });

    // Average the models of every window covering a pixel
    let weighted_a: Vec<f32> = a.par_iter().zip(fitted.par_iter()).map(|(a, f)| a * f).collect();
    let weighted_b: Vec<f32> = b.par_iter().zip(fitted.par_iter()).map(|(b, f)| b * f).collect();
    let count = box_sum(&fitted, w, h, radius);
    let sum_a = box_sum(&weighted_a, w, h, radius);
    let sum_b = box_sum(&weighted_b, w, h, radius);

    let mean = |sum: &[f32]| -> Vec<f32> {
        sum.par_iter()
            .zip(count.par_iter())
            .map(|(s, &c)| if c > 0.0 { s / c } else { 0.0 })
            .collect()
    };
    Coefficients {
        width: w,
        height: h,
        a: mean(&sum_a),
        b: mean(&sum_b),
        weight: count.par_iter().map(|&c| if c > 0.0 { 1.0 } else { 0.0 }).collect(),
    }
}

/// Bilinear taps on a `src`-sized grid for pixel `i` of a `dst`-sized grid.
fn taps(i: usize, src: usize, dst: usize) -> (usize, usize, f32) {
    let u = ((i as f32 + 0.5) * src as f32 / dst as f32 - 0.5).clamp(0.0, (src - 1) as f32);
    let lo = u.floor() as usize;
    (lo, (lo + 1).min(src - 1), u - lo as f32)
}

fn reconstruct(coefficients: &Coefficients, guide: &LumaImage) -> DepthImage {
    let Coefficients { width: lw, height: lh, .. } = *coefficients;
    let (tw, th) = (guide.width, guide.height);

    let mut data = vec![0.0f32; tw * th];
    data.par_chunks_mut(tw).enumerate().for_each(|(y, row)| {
        let (y0, y1, fy) = taps(y, lh, th);
        for (x, out) in row.iter_mut().enumerate() {
            let (x0, x1, fx) = taps(x, lw, tw);
            let (mut a, mut b, mut total) = (0.0f32, 0.0f32, 0.0f32);
            for (cx, cy, wgt) in [
                (x0, y0, (1.0 - fx) * (1.0 - fy)),
                (x1, y0, fx * (1.0 - fy)),
                (x0, y1, (1.0 - fx) * fy),
                (x1, y1, fx * fy),
            ] {
                let k = cy * lw + cx;
                let wgt = wgt * coefficients.weight[k];
                a += wgt * coefficients.a[k];
                b += wgt * coefficients.b[k];
                total += wgt;
            }
            if total <= 0.0 {
                continue;
            }
            let q = (a * guide.get(x, y) + b) / total;
            if DepthImage::is_valid_depth(q) {
                *out = q;
            }
        }
    });
    DepthImage {
        width: tw,
        height: th,
        data,
    }
}

fn upsample_confidence(confidence: &ConfidenceImage, target: Resolution) -> ConfidenceImage {
    let (sw, sh) = (confidence.width, confidence.height);
    let (tw, th) = (target.width, target.height);
    let mut data = vec![0u8; tw * th];
    data.par_chunks_mut(tw).enumerate().for_each(|(y, row)| {
        let (y0, y1, fy) = taps(y, sh, th);
        for (x, out) in row.iter_mut().enumerate() {
            let (x0, x1, fx) = taps(x, sw, tw);
            let level = |cx, cy| confidence.get(cx, cy) as f32;
            let top = level(x0, y0) * (1.0 - fx) + level(x1, y0) * fx;
            let bottom = level(x0, y1) * (1.0 - fx) + level(x1, y1) * fx;
            *out = (top * (1.0 - fy) + bottom * fy).round() as u8;
        }
    });
    ConfidenceImage {
        width: tw,
        height: th,
        data,
    }
}
