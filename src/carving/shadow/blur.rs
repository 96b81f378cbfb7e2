use rayon::prelude::*;

use crate::carving::capture::types::RgbImage;
use crate::carving::shadow::types::LumaImage;

/// Rec. 601 luma of a linear RGB triple.
#[inline]
pub fn luminance(rgb: [f32; 3]) -> f32 {
    0.299 * rgb[0] + 0.587 * rgb[1] + 0.114 * rgb[2]
}

pub fn luminance_plane(image: &RgbImage) -> LumaImage {
    let data = image
        .data
        .par_chunks_exact(3)
        .map(|px| luminance([px[0], px[1], px[2]]))
        .collect();
    LumaImage {
        width: image.width,
        height: image.height,
        data,
    }
}

/// Normalized 1D Gaussian taps, radius `ceil(3 sigma)`.
pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (3.0 * sigma).ceil() as isize;
    let denom = 2.0 * sigma * sigma;
    let taps: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let sum: f32 = taps.iter().sum();
    taps.into_iter().map(|w| w / sum).collect()
}

/// Separable Gaussian blur with clamp-to-edge borders. Sigmas below 0.01 are
/// a no-op.
pub fn gaussian_blur(image: &LumaImage, sigma: f32) -> LumaImage {
    if sigma < 0.01 || image.resolution().is_empty() {
        return image.clone();
    }
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;
    let (w, h) = (image.width, image.height);

    let mut horizontal = vec![0.0f32; w * h];
    horizontal
        .par_chunks_mut(w)
        .zip(image.data.par_chunks(w))
        .for_each(|(out, src)| {
            for x in 0..w {
                let mut acc = 0.0;
                for (k, weight) in kernel.iter().enumerate() {
                    let sx = (x as isize + k as isize - radius).clamp(0, w as isize - 1) as usize;
                    acc += weight * src[sx];
                }
                out[x] = acc;
            }
        });

    let mut data = vec![0.0f32; w * h];
    data.par_chunks_mut(w).enumerate().for_each(|(y, out)| {
        for (k, weight) in kernel.iter().enumerate() {
            let sy = (y as isize + k as isize - radius).clamp(0, h as isize - 1) as usize;
            let src = &horizontal[sy * w..(sy + 1) * w];
            for x in 0..w {
                out[x] += weight * src[x];
            }
        }
    });

    LumaImage { width: w, height: h, data }
}
