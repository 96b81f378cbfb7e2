use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use crate::carving::common::error::{CarvingError, Result};
use crate::carving::export::standard_tiff_writer::StandardTiffWriter;
use crate::carving::export::types::ExportConfig;
use crate::carving::export::writer::TiffWriter;
use crate::carving::session::CapturedFrame;
use crate::carving::shadow::MaskImage;
use crate::carving::voxel::VoxelGrid;
use crate::carving::capture::DepthImage;

/// Writes captured frames and the voxel grid out as TIFF images.
pub struct TiffExporter<W: TiffWriter = StandardTiffWriter> {
    writer: W,
    config: ExportConfig,
}

impl TiffExporter<StandardTiffWriter> {
    pub fn new(config: ExportConfig) -> Self {
        Self {
            writer: StandardTiffWriter,
            config,
        }
    }
}

impl<W: TiffWriter> TiffExporter<W> {
    pub fn with_custom(writer: W, config: ExportConfig) -> Self {
        Self { writer, config }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Shadow pixels as 255, lit pixels as 0.
    pub fn write_mask(&self, mask: &MaskImage, output: &mut dyn Write) -> Result<()> {
        let data: Vec<u8> = mask.data.iter().map(|&m| if m { 255 } else { 0 }).collect();
        self.writer
            .write_gray8(mask.width, mask.height, &data, output, &self.config)
    }

    /// Metric depth, 0 where the sample was invalid or filtered.
    pub fn write_depth(&self, depth: &DepthImage, output: &mut dyn Write) -> Result<()> {
        self.writer
            .write_gray32f(depth.width, depth.height, &depth.data, output, &self.config)
    }

    /// One z layer of the grid: occupied cells as 255.
    pub fn write_occupancy_slice(&self, grid: &VoxelGrid, z: usize, output: &mut dyn Write) -> Result<()> {
        let [nx, ny, nz] = grid.dimensions();
        if z >= nz {
            return Err(CarvingError::Export(format!("slice {} outside grid depth {}", z, nz)));
        }
        let policy = self.config.occupancy;
        let mut data = Vec::with_capacity(nx * ny);
        for y in 0..ny {
            for x in 0..nx {
                data.push(if grid.classify_with([x, y, z], policy) { 255 } else { 0 });
            }
        }
        self.writer.write_gray8(nx, ny, &data, output, &self.config)
    }

    /// Writes `frame_<ordinal>_mask.tiff` and `frame_<ordinal>_depth.tiff`.
    #[instrument(skip(self, frame, dir), fields(ordinal = frame.ordinal))]
    pub fn export_frame<P: AsRef<Path>>(&self, frame: &CapturedFrame, dir: P) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let mask_path = dir.join(format!("frame_{:04}_mask.tiff", frame.ordinal));
        let mut file = create(&mask_path)?;
        self.write_mask(&frame.shadow.mask, &mut file)?;

        let depth_path = dir.join(format!("frame_{:04}_depth.tiff", frame.ordinal));
        let mut file = create(&depth_path)?;
        self.write_depth(&frame.shadow.depth, &mut file)?;

        info!(dir = %dir.display(), "Frame exported");
        Ok(vec![mask_path, depth_path])
    }

    /// Writes one `occupancy_z<z>.tiff` per grid layer.
    #[instrument(skip(self, grid, dir))]
    pub fn export_occupancy<P: AsRef<Path>>(&self, grid: &VoxelGrid, dir: P) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let [_, _, nz] = grid.dimensions();
        let mut paths = Vec::with_capacity(nz);
        for z in 0..nz {
            let path = dir.join(format!("occupancy_z{:03}.tiff", z));
            let mut file = create(&path)?;
            self.write_occupancy_slice(grid, z, &mut file)?;
            paths.push(path);
        }

        info!(slices = nz, dir = %dir.display(), "Occupancy exported");
        Ok(paths)
    }
}

fn create(path: &Path) -> Result<std::fs::File> {
    std::fs::File::create(path)
        .map_err(|e| CarvingError::Export(format!("{}: {}", path.display(), e)))
}
