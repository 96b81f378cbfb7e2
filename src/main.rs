use shadow_carve_rs::carving::{
    CarvingSession, ComputeBackend, CudaBackend, ExportConfig, ManualTracking, OccupancyPolicy, SessionConfig,
    SyntheticScene, TiffCompression, TiffExporter,
};
use shadow_carve_rs::logger;

use tracing::{error, info, warn};

const LIGHT_POSITIONS: usize = 8;

fn run<B: ComputeBackend>(
    mut session: CarvingSession<ManualTracking, B>,
    scene: &SyntheticScene,
    output_dir: &str,
) -> anyhow::Result<()> {
    session.start();

    for (i, light) in scene.light_ring(LIGHT_POSITIONS).into_iter().enumerate() {
        session
            .tracking()
            .deliver(scene.render(light).with_timestamp(i as f64 / 30.0));

        match session.capture_frame_with_timings() {
            Ok((frame, timings)) => {
                info!(
                    "Frame {}: light at {:?}, {} shadow pixels, {} rays",
                    frame.ordinal, frame.light.world_position, frame.shadow.pixel_count, frame.stats.rays
                );
                if i == 0 {
                    timings.log_summary();
                }
            }
            Err(e) => warn!("Capture failed: {}", e),
        }
    }

    // Light switched off: the capture is rejected and nothing changes
    session.tracking().deliver(scene.render_dark());
    if let Err(e) = session.capture_frame() {
        info!("Dark frame rejected: {}", e);
    }

    let grid = session.voxel_grid();
    for policy in [
        OccupancyPolicy::AnyBlocked,
        OccupancyPolicy::AtLeast(3),
        OccupancyPolicy::InExceedsOut,
    ] {
        info!("{:?}: {} occupied voxels", policy, grid.occupied_voxels(policy).count());
    }

    let deleted = session.delete_frame(0)?;
    info!(
        "Deleted frame {}, {} frames remain, {} voxels still blocked",
        deleted.ordinal,
        session.frame_count(),
        session.voxel_grid().occupied_voxels(OccupancyPolicy::AnyBlocked).count()
    );

    let exporter = TiffExporter::new(
        ExportConfig::builder()
            .compression(TiffCompression::DeflateBalanced)
            .occupancy(OccupancyPolicy::AtLeast(2))
            .build(),
    );
    if let Some(frame) = session.frame(0) {
        exporter.export_frame(frame, output_dir)?;
    }
    let slices = exporter.export_occupancy(session.voxel_grid(), output_dir)?;
    info!("Wrote {} occupancy slices to {}", slices.len(), output_dir);

    session.pause();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    logger::init();

    info!("Starting shadow_carve...");

    let output_dir = std::env::args().nth(1).unwrap_or_else(|| "carving_output".to_string());
    let scene = SyntheticScene::default();
    let config = SessionConfig::builder()
        .grid(scene.grid_spec(32))
        .build();

    info!(
        "Grid: {:?} cells of {:.4} m, retraction {:?}",
        config.grid.dimensions, config.grid.cell_size, config.retraction
    );

    let result = match CudaBackend::new() {
        Ok(backend) => run(CarvingSession::with_custom(ManualTracking::new(), backend, config)?, &scene, &output_dir),
        Err(e) => {
            info!("Using CPU backend ({})", e);
            run(CarvingSession::new(config)?, &scene, &output_dir)
        }
    };

    match result {
        Ok(_) => info!("Carving demo finished"),
        Err(e) => error!("Carving demo failed: {}", e),
    }

    Ok(())
}
