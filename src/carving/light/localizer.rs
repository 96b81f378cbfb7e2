use glam::Vec2;
use rayon::prelude::*;
use tracing::{debug, instrument, warn};

use crate::carving::camera::CameraModel;
use crate::carving::capture::types::{DepthImage, RgbImage};
use crate::carving::common::error::{CarvingError, Result};
use crate::carving::light::types::LightSource;
use crate::carving::shadow::luminance;

/// Half-width of the window searched when the centroid's depth sample is invalid.
const DEPTH_SEARCH_RADIUS: isize = 2;

/// Centroid of every pixel whose luminance reaches `threshold`, with the
/// number of matching pixels. Disjoint bright regions are averaged together.
pub fn brightness_centroid(color: &RgbImage, threshold: f32) -> Option<(Vec2, usize)> {
    if color.resolution().is_empty() {
        return None;
    }
    let (sum_x, sum_y, count) = color
        .data
        .par_chunks_exact(color.width * 3)
        .enumerate()
        .map(|(y, row)| {
            let mut acc = (0.0f64, 0.0f64, 0usize);
            for (x, px) in row.chunks_exact(3).enumerate() {
                if luminance([px[0], px[1], px[2]]) >= threshold {
                    acc.0 += x as f64;
                    acc.1 += y as f64;
                    acc.2 += 1;
                }
            }
            acc
        })
        .reduce(|| (0.0, 0.0, 0), |a, b| (a.0 + b.0, a.1 + b.1, a.2 + b.2));

    if count == 0 {
        return None;
    }
    Some((
        Vec2::new((sum_x / count as f64) as f32, (sum_y / count as f64) as f32),
        count,
    ))
}

/// Depth at the nearest pixel, or the median of valid samples in the
/// surrounding window when that pixel has no measurement.
pub fn sample_depth_near(depth: &DepthImage, pixel: Vec2) -> Option<f32> {
    if depth.resolution().is_empty() {
        return None;
    }
    let px = (pixel.x.round() as isize).clamp(0, depth.width as isize - 1);
    let py = (pixel.y.round() as isize).clamp(0, depth.height as isize - 1);

    let center = depth.get(px as usize, py as usize);
    if DepthImage::is_valid_depth(center) {
        return Some(center);
    }

    let mut window: Vec<f32> = (-DEPTH_SEARCH_RADIUS..=DEPTH_SEARCH_RADIUS)
        .flat_map(|dy| (-DEPTH_SEARCH_RADIUS..=DEPTH_SEARCH_RADIUS).map(move |dx| (px + dx, py + dy)))
        .filter(|&(x, y)| x >= 0 && y >= 0 && x < depth.width as isize && y < depth.height as isize)
        .map(|(x, y)| depth.get(x as usize, y as usize))
        .filter(|&d| DepthImage::is_valid_depth(d))
        .collect();

    if window.is_empty() {
        return None;
    }
    window.sort_by(f32::total_cmp);
    Some(window[window.len() / 2])
}

/// Locates the light source for one frame.
///
/// `camera` describes the full color resolution; the centroid is rescaled to
/// the depth grid and unprojected with depth-resolution intrinsics.
#[instrument(skip(color, depth, camera))]
pub fn locate(color: &RgbImage, depth: &DepthImage, camera: &CameraModel, threshold: f32) -> Result<LightSource> {
    let (image_position, matched_pixels) =
        brightness_centroid(color, threshold).ok_or(CarvingError::LightSourceNotFound)?;

    let depth_camera = camera.scaled_to(depth.resolution());
    let depth_pixel = Vec2::new(
        image_position.x * depth.width as f32 / color.width as f32,
        image_position.y * depth.height as f32 / color.height as f32,
    );

    let Some(light_depth) = sample_depth_near(depth, depth_pixel) else {
        warn!(
            "Light centroid ({:.1}, {:.1}) has no valid depth nearby",
            image_position.x, image_position.y
        );
        return Err(CarvingError::LightSourceNotFound);
    };

    let world_position = depth_camera
        .unproject_to_world(depth_pixel, light_depth)
        .ok_or(CarvingError::LightSourceNotFound)?;

    debug!(
        matched_pixels,
        "Light source at pixel ({:.1}, {:.1}), depth {:.3} m, world {:?}",
        image_position.x,
        image_position.y,
        light_depth,
        world_position
    );

    Ok(LightSource {
        image_position,
        world_position,
        matched_pixels,
    })
}
