//! TIFF export module
//!
//! Writes frame masks (Gray8), depth snapshots (Gray32Float) and voxel
//! occupancy slices (Gray8) with selectable compression.

mod exporter;
mod standard_tiff_writer;
mod writer;
pub mod types;

#[cfg(test)]
mod tests;

pub use exporter::TiffExporter;
pub use standard_tiff_writer::StandardTiffWriter;
pub use types::{ExportConfig, ExportConfigBuilder, TiffCompression};
pub use writer::TiffWriter;
