use std::io::{Cursor, Write};

use tiff::encoder::compression::DeflateLevel;
use tiff::encoder::{colortype, Compression, TiffEncoder};
use tiff::tags::Predictor;
use tracing::debug;

use crate::carving::common::error::{CarvingError, Result};
use crate::carving::export::types::{ExportConfig, TiffCompression};
use crate::carving::export::writer::TiffWriter;

pub struct StandardTiffWriter;

impl StandardTiffWriter {
    fn compression(config: &ExportConfig) -> Compression {
        match config.compression {
            TiffCompression::None => Compression::Uncompressed,
            TiffCompression::Lzw => Compression::Lzw,
            TiffCompression::DeflateFast => Compression::Deflate(DeflateLevel::Fast),
            TiffCompression::DeflateBalanced => Compression::Deflate(DeflateLevel::Balanced),
            TiffCompression::DeflateBest => Compression::Deflate(DeflateLevel::Best),
        }
    }

    fn check_len(width: usize, height: usize, len: usize) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(CarvingError::InvalidDimensions(width, height));
        }
        if len != width * height {
            return Err(CarvingError::DimensionMismatch(format!(
                "{}x{} image needs {} samples, got {}",
                width,
                height,
                width * height,
                len
            )));
        }
        Ok(())
    }
}

impl TiffWriter for StandardTiffWriter {
    fn write_gray8(&self, width: usize, height: usize, data: &[u8], output: &mut dyn Write, config: &ExportConfig) -> Result<()> {
        Self::check_len(width, height, data.len())?;
        debug!("Encoding Gray8 TIFF: {}x{}", width, height);

        let mut buffer = Vec::new();
        let mut encoder = TiffEncoder::new(Cursor::new(&mut buffer))
            .map_err(|e| CarvingError::Export(e.to_string()))?
            .with_compression(Self::compression(config));
        if config.predictor {
            encoder = encoder.with_predictor(Predictor::Horizontal);
        }

        encoder
            .write_image::<colortype::Gray8>(width as u32, height as u32, data)
            .map_err(|e| CarvingError::Export(e.to_string()))?;

        output.write_all(&buffer)?;
        Ok(())
    }

    fn write_gray32f(&self, width: usize, height: usize, data: &[f32], output: &mut dyn Write, config: &ExportConfig) -> Result<()> {
        Self::check_len(width, height, data.len())?;
        debug!("Encoding Gray32Float TIFF: {}x{}", width, height);

        let mut buffer = Vec::new();
        let mut encoder = TiffEncoder::new(Cursor::new(&mut buffer))
            .map_err(|e| CarvingError::Export(e.to_string()))?
            .with_compression(Self::compression(config));

        encoder
            .write_image::<colortype::Gray32Float>(width as u32, height as u32, data)
            .map_err(|e| CarvingError::Export(e.to_string()))?;

        output.write_all(&buffer)?;
        Ok(())
    }
}
