use std::sync::atomic::{AtomicU32, Ordering};

use glam::Vec3;
use rayon::prelude::*;
use tracing::debug;

use crate::carving::common::error::{CarvingError, Result};
use crate::carving::rays::Ray;
use crate::carving::voxel::types::{
    AccumulateMode, AccumulationStats, CellIndex, GridSpec, OccupancyPolicy, Voxel,
};
use crate::carving::voxel::walk::VoxelWalk;

/// Accumulated shadow evidence over a fixed lattice. Counters are atomic so
/// any number of rays may be traversed concurrently through `&self`.
#[derive(Debug)]
pub struct VoxelGrid {
    spec: GridSpec,
    ins: Vec<AtomicU32>,
    outs: Vec<AtomicU32>,
}

impl VoxelGrid {
    pub fn new(spec: GridSpec) -> Result<Self> {
        spec.validate()?;
        let cells = spec.cell_count();
        debug!(
            "Allocating {:?} voxel grid ({} cells, {} m cells) at {:?}",
            spec.dimensions, cells, spec.cell_size, spec.origin
        );
        Ok(Self {
            spec,
            ins: (0..cells).map(|_| AtomicU32::new(0)).collect(),
            outs: (0..cells).map(|_| AtomicU32::new(0)).collect(),
        })
    }

    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    pub fn dimensions(&self) -> [usize; 3] {
        self.spec.dimensions
    }

    pub fn cell_count(&self) -> usize {
        self.ins.len()
    }

    pub fn cell_of(&self, point: Vec3) -> Option<CellIndex> {
        self.spec.cell_of(point)
    }

    pub fn cell_center(&self, cell: CellIndex) -> Vec3 {
        self.spec.cell_center(cell)
    }

    /// Cells the ray's segment passes through, in order.
    pub fn walk(&self, ray: &Ray) -> VoxelWalk {
        VoxelWalk::new(&self.spec, ray.origin, ray.direction, ray.length)
    }

    /// Bumps the in (shadow) or out (lit) counter of every cell on the ray's
    /// segment. Cells outside the grid are never touched.
    pub fn accumulate_ray(&self, ray: &Ray, mode: AccumulateMode) -> AccumulationStats {
        let counters = if ray.in_shadow { &self.ins } else { &self.outs };
        let mut updates = 0u64;
        for step in self.walk(ray) {
            let counter = &counters[self.spec.linear_index(step.cell)];
            match mode {
                AccumulateMode::Add => {
                    counter.fetch_add(1, Ordering::Relaxed);
                }
                AccumulateMode::Retract => {
                    let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                        Some(v.saturating_sub(1))
                    });
                }
            }
            updates += 1;
        }
        AccumulationStats {
            rays: 1,
            rays_missed: (updates == 0) as u64,
            in_updates: if ray.in_shadow { updates } else { 0 },
            out_updates: if ray.in_shadow { 0 } else { updates },
        }
    }

    /// Traverses every ray in parallel. The result does not depend on the
    /// order the rays arrive in.
    pub fn traverse_and_accumulate<I>(&self, rays: I, mode: AccumulateMode) -> AccumulationStats
    where
        I: IntoParallelIterator<Item = Ray>,
    {
        rays.into_par_iter()
            .map(|ray| self.accumulate_ray(&ray, mode))
            .reduce(AccumulationStats::default, |a, b| a + b)
    }

    /// Adds (or subtracts) per-cell count deltas computed elsewhere, e.g. by a
    /// device kernel.
    pub fn apply_deltas(&self, in_deltas: &[u32], out_deltas: &[u32], mode: AccumulateMode) -> Result<()> {
        if in_deltas.len() != self.cell_count() || out_deltas.len() != self.cell_count() {
            return Err(CarvingError::DimensionMismatch(format!(
                "delta buffers hold {} / {} cells, grid has {}",
                in_deltas.len(),
                out_deltas.len(),
                self.cell_count()
            )));
        }
        let apply = |counters: &[AtomicU32], deltas: &[u32]| {
            counters.par_iter().zip(deltas.par_iter()).for_each(|(counter, &delta)| {
                if delta == 0 {
                    return;
                }
                match mode {
                    AccumulateMode::Add => {
                        counter.fetch_add(delta, Ordering::Relaxed);
                    }
                    AccumulateMode::Retract => {
                        let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                            Some(v.saturating_sub(delta))
                        });
                    }
                }
            });
        };
        apply(&self.ins, in_deltas);
        apply(&self.outs, out_deltas);
        Ok(())
    }

    /// Counts of `cell`, or `None` when it lies outside the grid.
    pub fn get(&self, cell: CellIndex) -> Option<Voxel> {
        self.spec.contains(cell).then(|| self.voxel(cell))
    }

    // The accessors below expect an in-grid cell (see `GridSpec::linear_index`);
    // use `get` for untrusted indices.

    pub fn in_count(&self, cell: CellIndex) -> u32 {
        self.ins[self.spec.linear_index(cell)].load(Ordering::Relaxed)
    }

    pub fn out_count(&self, cell: CellIndex) -> u32 {
        self.outs[self.spec.linear_index(cell)].load(Ordering::Relaxed)
    }

    /// Minimal carving rule: occupied iff a ray was ever blocked in the cell.
    pub fn classify(&self, cell: CellIndex) -> bool {
        self.classify_with(cell, OccupancyPolicy::AnyBlocked)
    }

    pub fn classify_with(&self, cell: CellIndex, policy: OccupancyPolicy) -> bool {
        policy.is_occupied(self.in_count(cell), self.out_count(cell))
    }

    pub fn voxel(&self, cell: CellIndex) -> Voxel {
        Voxel {
            cell,
            world_center: self.spec.cell_center(cell),
            ins: self.in_count(cell),
            outs: self.out_count(cell),
        }
    }

    /// All cells in linear order (x fastest).
    pub fn voxels(&self) -> impl Iterator<Item = Voxel> + '_ {
        (0..self.cell_count()).map(move |i| self.voxel(self.spec.cell_from_linear(i)))
    }

    pub fn occupied_voxels(&self, policy: OccupancyPolicy) -> impl Iterator<Item = Voxel> + '_ {
        self.voxels().filter(move |v| policy.is_occupied(v.ins, v.outs))
    }

    /// Copies of the `in` and `out` arrays in linear order.
    pub fn counts_snapshot(&self) -> (Vec<u32>, Vec<u32>) {
        let load = |counters: &[AtomicU32]| -> Vec<u32> { counters.iter().map(|c| c.load(Ordering::Relaxed)).collect() };
        (load(&self.ins), load(&self.outs))
    }

    pub fn total_counts(&self) -> (u64, u64) {
        let sum = |counters: &[AtomicU32]| -> u64 {
            counters.par_iter().map(|c| c.load(Ordering::Relaxed) as u64).sum()
        };
        (sum(&self.ins), sum(&self.outs))
    }

    pub fn reset(&self) {
        self.ins.par_iter().for_each(|c| c.store(0, Ordering::Relaxed));
        self.outs.par_iter().for_each(|c| c.store(0, Ordering::Relaxed));
    }
}
