use glam::{Vec2, Vec3};
use rayon::prelude::*;

use crate::carving::camera::CameraModel;
use crate::carving::capture::types::DepthImage;
use crate::carving::common::error::{CarvingError, Result};
use crate::carving::light::LightSource;
use crate::carving::shadow::{MaskImage, ShadowMask};

/// Segments shorter than this are dropped; the light sits on the surface.
const MIN_SEGMENT_LENGTH: f32 = 1e-6;

/// A light ray bounded by the depth surface it reached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit direction from the light towards the surface point
    pub direction: Vec3,
    /// Distance from `origin` to the surface point
    pub length: f32,
    pub in_shadow: bool,
}

impl Ray {
    pub fn end(&self) -> Vec3 {
        self.origin + self.direction * self.length
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Generates the rays of one frame. Generation is a pure function of the
/// inputs, so the sequence can be produced again at any time (e.g. to
/// retract a frame).
#[derive(Debug, Clone, Copy)]
pub struct RayCaster<'a> {
    light: Vec3,
    depth: &'a DepthImage,
    mask: &'a MaskImage,
    camera: CameraModel,
    stride: usize,
}

impl<'a> RayCaster<'a> {
    /// `camera` must describe the depth grid (depth-resolution intrinsics).
    pub fn new(light: Vec3, depth: &'a DepthImage, mask: &'a MaskImage, camera: CameraModel) -> Result<Self> {
        if depth.resolution() != mask.resolution() {
            return Err(CarvingError::DimensionMismatch(format!(
                "mask is {}x{}, depth is {}x{}",
                mask.width, mask.height, depth.width, depth.height
            )));
        }
        Ok(Self {
            light,
            depth,
            mask,
            camera,
            stride: 1,
        })
    }

    pub fn for_frame(light: &LightSource, shadow: &'a ShadowMask) -> Result<Self> {
        Self::new(light.world_position, &shadow.depth, &shadow.mask, shadow.camera())
    }

    /// Samples every `stride`-th pixel on both axes.
    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride.max(1);
        self
    }

    pub fn light(&self) -> Vec3 {
        self.light
    }

    /// Ray through pixel `(x, y)`, or `None` when the depth sample is invalid.
    pub fn ray_at(&self, x: usize, y: usize) -> Option<Ray> {
        let surface = self
            .camera
            .unproject_to_world(Vec2::new(x as f32, y as f32), self.depth.get(x, y))?;
        let offset = surface - self.light;
        let length = offset.length();
        if !length.is_finite() || length < MIN_SEGMENT_LENGTH {
            return None;
        }
        Some(Ray {
            origin: self.light,
            direction: offset / length,
            length,
            in_shadow: self.mask.get(x, y),
        })
    }

    fn sampled_columns(&self) -> usize {
        self.depth.width.div_ceil(self.stride)
    }

    fn sampled_rows(&self) -> usize {
        self.depth.height.div_ceil(self.stride)
    }

    /// Upper bound on the number of rays: one per sampled pixel, shadowed or lit.
    pub fn capacity_hint(&self) -> usize {
        self.sampled_columns() * self.sampled_rows()
    }

    /// Lazy sequential rays in row-major pixel order.
    pub fn rays(&self) -> impl Iterator<Item = Ray> + '_ {
        let stride = self.stride;
        let columns = self.sampled_columns();
        (0..self.sampled_rows()).flat_map(move |row| {
            (0..columns).filter_map(move |col| self.ray_at(col * stride, row * stride))
        })
    }

    /// The same rays as [`RayCaster::rays`], generated in parallel without
    /// ordering guarantees.
    pub fn par_rays(&self) -> impl ParallelIterator<Item = Ray> + '_ {
        let stride = self.stride;
        let columns = self.sampled_columns();
        (0..self.sampled_rows()).into_par_iter().flat_map_iter(move |row| {
            (0..columns).filter_map(move |col| self.ray_at(col * stride, row * stride))
        })
    }
}
