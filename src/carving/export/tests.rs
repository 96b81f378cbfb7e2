#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};
    use std::sync::{Arc, Mutex};

    use glam::Vec3;
    use tiff::decoder::{Decoder, DecodingResult};

    use crate::carving::capture::DepthImage;
    use crate::carving::common::error::{CarvingError, Result};
    use crate::carving::export::{ExportConfig, TiffCompression, TiffExporter, TiffWriter};
    use crate::carving::rays::Ray;
    use crate::carving::session::{CarvingSession, SessionConfig};
    use crate::carving::shadow::{CalibrationParams, MaskImage};
    use crate::carving::synthetic::SyntheticScene;
    use crate::carving::voxel::{AccumulateMode, GridSpec, OccupancyPolicy, VoxelGrid};

    #[derive(Default, Clone)]
    struct MockWriter {
        gray8: Arc<Mutex<Vec<(usize, usize, Vec<u8>)>>>,
    }

    impl TiffWriter for MockWriter {
        fn write_gray8(&self, width: usize, height: usize, data: &[u8], _output: &mut dyn Write, _config: &ExportConfig) -> Result<()> {
            self.gray8.lock().unwrap().push((width, height, data.to_vec()));
            Ok(())
        }

        fn write_gray32f(&self, _width: usize, _height: usize, _data: &[f32], _output: &mut dyn Write, _config: &ExportConfig) -> Result<()> {
            Err(CarvingError::Export("Mock encode error".to_string()))
        }
    }

    fn decode(bytes: Vec<u8>) -> ((u32, u32), DecodingResult) {
        let mut decoder = Decoder::new(Cursor::new(bytes)).unwrap();
        let dims = decoder.dimensions().unwrap();
        (dims, decoder.read_image().unwrap())
    }

    #[test]
    fn test_config_builder() {
        let config = ExportConfig::builder()
            .compression(TiffCompression::Lzw)
            .predictor(true)
            .occupancy(OccupancyPolicy::AtLeast(3))
            .build();
        assert_eq!(config.compression, TiffCompression::Lzw);
        assert!(config.predictor);
        assert_eq!(config.occupancy, OccupancyPolicy::AtLeast(3));
    }

    #[test]
    fn test_mask_is_written_as_gray8() {
        let mut mask = MaskImage::filled(4, 3, false);
        mask.set(1, 2, true);

        for compression in [TiffCompression::None, TiffCompression::Lzw, TiffCompression::DeflateBest] {
            let exporter = TiffExporter::new(ExportConfig::builder().compression(compression).build());
            let mut bytes = Vec::new();
            exporter.write_mask(&mask, &mut bytes).unwrap();

            let (dims, image) = decode(bytes);
            assert_eq!(dims, (4, 3));
            match image {
                DecodingResult::U8(data) => {
                    assert_eq!(data[2 * 4 + 1], 255);
                    assert_eq!(data.iter().filter(|&&v| v == 255).count(), 1);
                }
                _ => panic!("expected 8-bit samples"),
            }
        }
    }

    #[test]
    fn test_depth_is_written_as_float() {
        let depth = DepthImage::new(2, 2, vec![0.0, 1.25, 2.5, 0.75]).unwrap();
        let exporter = TiffExporter::new(ExportConfig::default());
        let mut bytes = Vec::new();
        exporter.write_depth(&depth, &mut bytes).unwrap();

        let (dims, image) = decode(bytes);
        assert_eq!(dims, (2, 2));
        match image {
            DecodingResult::F32(data) => assert_eq!(data, depth.data),
            _ => panic!("expected float samples"),
        }
    }

    #[test]
    fn test_occupancy_slice() {
        let grid = VoxelGrid::new(GridSpec::new([4, 3, 2], 1.0, Vec3::ZERO)).unwrap();
        // Along +x through the middle of row y=1, layer z=0
        let ray = Ray {
            origin: Vec3::new(0.5, 1.5, 0.5),
            direction: Vec3::X,
            length: 2.0,
            in_shadow: true,
        };
        grid.accumulate_ray(&ray, AccumulateMode::Add);

        let writer = MockWriter::default();
        let exporter = TiffExporter::with_custom(writer.clone(), ExportConfig::default());
        let mut sink = Vec::new();
        exporter.write_occupancy_slice(&grid, 0, &mut sink).unwrap();
        exporter.write_occupancy_slice(&grid, 1, &mut sink).unwrap();

        let written = writer.gray8.lock().unwrap();
        let (w, h, layer0) = &written[0];
        assert_eq!((*w, *h), (4, 3));
        assert_eq!(&layer0[4..8], &[255, 255, 255, 0]);
        assert_eq!(layer0.iter().filter(|&&v| v == 255).count(), 3);
        assert!(written[1].2.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_slice_outside_grid() {
        let grid = VoxelGrid::new(GridSpec::new([2, 2, 2], 1.0, Vec3::ZERO)).unwrap();
        let exporter = TiffExporter::new(ExportConfig::default());
        let err = exporter.write_occupancy_slice(&grid, 2, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, CarvingError::Export(_)));
    }

    #[test]
    fn test_writer_failure_propagates() {
        let exporter = TiffExporter::with_custom(MockWriter::default(), ExportConfig::default());
        let err = exporter
            .write_depth(&DepthImage::filled(2, 2, 1.0), &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, CarvingError::Export(_)));
    }

    #[test]
    fn test_export_frame_and_grid_to_directory() {
        let scene = SyntheticScene::default();
        let mut session = CarvingSession::new(SessionConfig::builder().grid(scene.grid_spec(8)).build()).unwrap();
        let frame = session
            .capture_frame_with(&scene.render(scene.light_ring(4)[0]), &CalibrationParams::default())
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let exporter = TiffExporter::new(ExportConfig::default());

        let frame_files = exporter.export_frame(&frame, dir.path().join("frames")).unwrap();
        assert_eq!(frame_files.len(), 2);
        assert!(frame_files.iter().all(|p| p.exists()));

        let (dims, _) = decode(std::fs::read(&frame_files[0]).unwrap());
        assert_eq!(dims, (scene.depth_resolution.width as u32, scene.depth_resolution.height as u32));

        let slices = exporter.export_occupancy(session.voxel_grid(), dir.path().join("grid")).unwrap();
        assert_eq!(slices.len(), 8);
        assert!(slices.iter().all(|p| p.exists()));
    }
}
