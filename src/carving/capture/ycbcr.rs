use std::borrow::Cow;

use rayon::prelude::*;
use tracing::debug;

use crate::carving::camera::Resolution;
use crate::carving::capture::types::RgbImage;
use crate::carving::common::error::{CarvingError, Result};

/// Bi-planar full-range YCbCr 4:2:0 frame as delivered by the camera:
/// a full-resolution luma plane and a half-resolution interleaved CbCr plane.
#[derive(Debug, Clone, PartialEq)]
pub struct YCbCrImage {
    pub width: usize,
    pub height: usize,
    pub luma: Vec<u8>,
    /// Interleaved [Cb, Cr, Cb, Cr, ...] at `ceil(width/2) x ceil(height/2)`
    pub cbcr: Vec<u8>,
}

impl YCbCrImage {
    pub fn new(width: usize, height: usize, luma: Vec<u8>, cbcr: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CarvingError::InvalidDimensions(width, height));
        }
        let (cw, ch) = Self::chroma_size(width, height);
        if luma.len() != width * height || cbcr.len() != cw * ch * 2 {
            return Err(CarvingError::DimensionMismatch(format!(
                "{}x{} YCbCr frame needs {} luma and {} chroma bytes, got {} and {}",
                width,
                height,
                width * height,
                cw * ch * 2,
                luma.len(),
                cbcr.len()
            )));
        }
        Ok(Self { width, height, luma, cbcr })
    }

    fn chroma_size(width: usize, height: usize) -> (usize, usize) {
        (width.div_ceil(2), height.div_ceil(2))
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Converts to RGB with the BT.601 full-range matrix.
    pub fn to_rgb(&self) -> RgbImage {
        debug!("Converting {}x{} YCbCr frame to RGB", self.width, self.height);
        let (cw, _) = Self::chroma_size(self.width, self.height);
        let mut data = vec![0.0f32; self.width * self.height * 3];
        if data.is_empty() {
            return RgbImage {
                width: self.width,
                height: self.height,
                data,
            };
        }

        data.par_chunks_mut(self.width * 3)
            .enumerate()
            .for_each(|(y, row)| {
                let chroma_row = &self.cbcr[(y / 2) * cw * 2..(y / 2 + 1) * cw * 2];
                for x in 0..self.width {
                    let luma = self.luma[y * self.width + x] as f32 / 255.0;
                    let cb = chroma_row[(x / 2) * 2] as f32 / 255.0 - 0.5;
                    let cr = chroma_row[(x / 2) * 2 + 1] as f32 / 255.0 - 0.5;

                    let r = luma + 1.402 * cr;
                    let g = luma - 0.344_136 * cb - 0.714_136 * cr;
                    let b = luma + 1.772 * cb;

                    row[x * 3] = r.clamp(0.0, 1.0);
                    row[x * 3 + 1] = g.clamp(0.0, 1.0);
                    row[x * 3 + 2] = b.clamp(0.0, 1.0);
                }
            });

        RgbImage {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

/// Color image in whichever encoding the camera delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorFrame {
    Rgb(RgbImage),
    YCbCr(YCbCrImage),
}

impl ColorFrame {
    pub fn resolution(&self) -> Resolution {
        match self {
            ColorFrame::Rgb(img) => img.resolution(),
            ColorFrame::YCbCr(img) => img.resolution(),
        }
    }

    pub fn to_rgb(&self) -> Cow<'_, RgbImage> {
        match self {
            ColorFrame::Rgb(img) => Cow::Borrowed(img),
            ColorFrame::YCbCr(img) => Cow::Owned(img.to_rgb()),
        }
    }
}

impl From<RgbImage> for ColorFrame {
    fn from(img: RgbImage) -> Self {
        ColorFrame::Rgb(img)
    }
}

impl From<YCbCrImage> for ColorFrame {
    fn from(img: YCbCrImage) -> Self {
        ColorFrame::YCbCr(img)
    }
}
