#[cfg(test)]
mod tests {
    use glam::Vec3;

    use crate::carving::common::error::CarvingError;
    use crate::carving::rays::Ray;
    use crate::carving::voxel::{AccumulateMode, GridSpec, OccupancyPolicy, VoxelGrid};

    fn scenario_grid() -> VoxelGrid {
        VoxelGrid::new(GridSpec::new([10, 10, 10], 0.1, Vec3::splat(-0.5))).unwrap()
    }

    fn segment(from: Vec3, to: Vec3, in_shadow: bool) -> Ray {
        let offset = to - from;
        Ray {
            origin: from,
            direction: offset.normalize(),
            length: offset.length(),
            in_shadow,
        }
    }

    /// Deterministic pseudo-random rays through the grid region.
    fn scattered_rays(count: usize, seed: u64) -> Vec<Ray> {
        let mut state = seed;
        let mut next = move || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 33) as f32 / (1u64 << 31) as f32) - 0.5
        };
        (0..count)
            .map(|i| {
                let from = Vec3::new(next() * 3.0, next() * 3.0, -2.0);
                let to = Vec3::new(next(), next(), next());
                segment(from, to, i % 3 == 0)
            })
            .collect()
    }

    #[test]
    fn test_construction_rejects_bad_specs() {
        let bad = [
            GridSpec::new([0, 10, 10], 0.1, Vec3::ZERO),
            GridSpec::new([10, 10, 10], 0.0, Vec3::ZERO),
            GridSpec::new([10, 10, 10], -0.1, Vec3::ZERO),
            GridSpec::new([10, 10, 10], f32::NAN, Vec3::ZERO),
            GridSpec::new([10, 10, 10], 0.1, Vec3::new(f32::INFINITY, 0.0, 0.0)),
        ];
        for spec in bad {
            assert!(matches!(VoxelGrid::new(spec), Err(CarvingError::InvalidGrid(_))), "{spec:?}");
        }
    }

    #[test]
    fn test_single_shadow_ray_scenario() {
        let grid = scenario_grid();
        let ray = segment(Vec3::new(0.0, 0.0, -2.0), Vec3::ZERO, true);

        let stats = grid.traverse_and_accumulate(vec![ray], AccumulateMode::Add);

        let column = grid.cell_of(Vec3::new(0.0, 0.0, -0.25)).unwrap();
        let expected: Vec<[usize; 3]> = (0..5).map(|z| [column[0], column[1], z]).collect();
        assert_eq!(stats.in_updates, 5);
        assert_eq!(stats.out_updates, 0);
        for voxel in grid.voxels() {
            let want = if expected.contains(&voxel.cell) { 1 } else { 0 };
            assert_eq!(voxel.ins, want, "cell {:?}", voxel.cell);
            assert_eq!(voxel.outs, 0);
        }
    }

    #[test]
    fn test_lit_ray_counts_out() {
        let grid = scenario_grid();
        let ray = segment(Vec3::new(0.05, 0.05, -2.0), Vec3::new(0.05, 0.05, 0.0), false);
        grid.accumulate_ray(&ray, AccumulateMode::Add);
        assert_eq!(grid.out_count([5, 5, 0]), 1);
        assert_eq!(grid.in_count([5, 5, 0]), 0);
        assert!(!grid.classify([5, 5, 0]));
    }

    #[test]
    fn test_rays_outside_grid_leave_no_evidence() {
        let grid = scenario_grid();
        let ray = segment(Vec3::new(5.0, 5.0, 5.0), Vec3::new(6.0, 5.0, 5.0), true);
        let stats = grid.traverse_and_accumulate(vec![ray], AccumulateMode::Add);
        assert_eq!(stats.rays, 1);
        assert_eq!(stats.rays_missed, 1);
        assert_eq!(grid.total_counts(), (0, 0));
    }

    #[test]
    fn test_accumulation_is_order_independent() {
        let rays = scattered_rays(500, 7);
        let mut reversed = rays.clone();
        reversed.reverse();
        let mut interleaved: Vec<_> = rays.iter().step_by(2).chain(rays.iter().skip(1).step_by(2)).copied().collect();
        interleaved.rotate_left(123);

        let grids: Vec<VoxelGrid> = [rays, reversed, interleaved]
            .into_iter()
            .map(|set| {
                let grid = scenario_grid();
                grid.traverse_and_accumulate(set, AccumulateMode::Add);
                grid
            })
            .collect();

        let first = grids[0].counts_snapshot();
        assert!(first.0.iter().any(|&c| c > 0));
        for grid in &grids[1..] {
            assert_eq!(grid.counts_snapshot(), first);
        }
    }

    #[test]
    fn test_retract_undoes_add() {
        let grid = scenario_grid();
        let base = scattered_rays(200, 1);
        let extra = scattered_rays(200, 2);
        grid.traverse_and_accumulate(base.clone(), AccumulateMode::Add);
        let before = grid.counts_snapshot();

        let added = grid.traverse_and_accumulate(extra.clone(), AccumulateMode::Add);
        let retracted = grid.traverse_and_accumulate(extra, AccumulateMode::Retract);

        assert_eq!(added, retracted);
        assert_eq!(grid.counts_snapshot(), before);
    }

    #[test]
    fn test_retract_never_underflows() {
        let grid = scenario_grid();
        let ray = segment(Vec3::new(0.05, 0.05, -2.0), Vec3::new(0.05, 0.05, 0.0), true);
        grid.accumulate_ray(&ray, AccumulateMode::Retract);
        assert_eq!(grid.total_counts(), (0, 0));
    }

    #[test]
    fn test_disjoint_ray_sets_sum() {
        let left: Vec<Ray> = (0..5)
            .map(|i| {
                let y = -0.45 + i as f32 * 0.1;
                segment(Vec3::new(-0.45, y, -2.0), Vec3::new(-0.45, y, 0.45), i % 2 == 0)
            })
            .collect();
        let right: Vec<Ray> = (0..5)
            .map(|i| {
                let y = -0.45 + i as f32 * 0.1;
                segment(Vec3::new(0.45, y, -2.0), Vec3::new(0.45, y, 0.45), i % 2 == 1)
            })
            .collect();

        let only_left = scenario_grid();
        only_left.traverse_and_accumulate(left.clone(), AccumulateMode::Add);
        let only_right = scenario_grid();
        only_right.traverse_and_accumulate(right.clone(), AccumulateMode::Add);
        let both = scenario_grid();
        both.traverse_and_accumulate(left, AccumulateMode::Add);
        both.traverse_and_accumulate(right, AccumulateMode::Add);

        let (l_in, l_out) = only_left.counts_snapshot();
        let (r_in, r_out) = only_right.counts_snapshot();
        let (b_in, b_out) = both.counts_snapshot();
        for i in 0..b_in.len() {
            assert_eq!(b_in[i], l_in[i] + r_in[i]);
            assert_eq!(b_out[i], l_out[i] + r_out[i]);
        }
    }

    #[test]
    fn test_apply_deltas_matches_traversal() {
        let rays = scattered_rays(100, 3);
        let traversed = scenario_grid();
        traversed.traverse_and_accumulate(rays.clone(), AccumulateMode::Add);

        let reference = scenario_grid();
        reference.traverse_and_accumulate(rays, AccumulateMode::Add);
        let (ins, outs) = reference.counts_snapshot();

        let applied = scenario_grid();
        applied.apply_deltas(&ins, &outs, AccumulateMode::Add).unwrap();
        assert_eq!(applied.counts_snapshot(), traversed.counts_snapshot());

        applied.apply_deltas(&ins, &outs, AccumulateMode::Retract).unwrap();
        assert_eq!(applied.total_counts(), (0, 0));

        assert!(applied.apply_deltas(&ins[1..], &outs, AccumulateMode::Add).is_err());
    }

    #[test]
    fn test_occupancy_policies() {
        let grid = scenario_grid();
        let shadow = segment(Vec3::new(0.05, 0.05, -2.0), Vec3::new(0.05, 0.05, -0.45), true);
        let lit = segment(Vec3::new(0.05, 0.05, -2.0), Vec3::new(0.05, 0.05, -0.45), false);
        grid.traverse_and_accumulate(vec![shadow, lit, lit], AccumulateMode::Add);

        let cell = [5, 5, 0];
        assert_eq!((grid.in_count(cell), grid.out_count(cell)), (1, 2));
        assert!(grid.classify(cell));
        assert!(grid.classify_with(cell, OccupancyPolicy::AtLeast(1)));
        assert!(!grid.classify_with(cell, OccupancyPolicy::AtLeast(2)));
        assert!(!grid.classify_with(cell, OccupancyPolicy::InExceedsOut));
        assert_eq!(grid.occupied_voxels(OccupancyPolicy::AnyBlocked).count(), 1);
    }

    #[test]
    fn test_reset_clears_counters() {
        let grid = scenario_grid();
        grid.traverse_and_accumulate(scattered_rays(50, 9), AccumulateMode::Add);
        grid.reset();
        assert_eq!(grid.total_counts(), (0, 0));
    }

    #[test]
    fn test_voxel_records_carry_world_centers() {
        let grid = scenario_grid();
        let voxel = grid.voxel([0, 0, 0]);
        assert!((voxel.world_center - Vec3::splat(-0.45)).length() < 1e-6);
        assert_eq!(grid.voxels().count(), 1000);
        assert_eq!(grid.spec().cell_from_linear(grid.spec().linear_index([3, 7, 2])), [3, 7, 2]);
    }

    #[test]
    fn test_out_of_range_cells_are_not_aliased() {
        let grid = scenario_grid();
        grid.accumulate_ray(
            &segment(Vec3::new(-0.45, -0.35, -2.0), Vec3::new(-0.45, -0.35, -0.45), true),
            AccumulateMode::Add,
        );
        assert_eq!(grid.in_count([0, 1, 0]), 1);

        // [10, 0, 0] would alias [0, 1, 0] in the flat layout
        assert!(grid.get([10, 0, 0]).is_none());
        assert!(grid.get([0, 0, 10]).is_none());
        assert_eq!(grid.get([0, 1, 0]).map(|v| v.ins), Some(1));
        assert!(!grid.spec().contains([0, 10, 0]));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "outside grid")]
    fn test_out_of_range_count_panics_in_debug() {
        scenario_grid().in_count([10, 0, 0]);
    }
}
