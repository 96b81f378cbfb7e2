//! Voxel grid types

use std::ops::Add;

use glam::Vec3;

use crate::carving::common::error::{CarvingError, Result};

/// Integer cell coordinates `[x, y, z]`.
pub type CellIndex = [usize; 3];

/// Placement and resolution of a voxel grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    /// Cells along each axis `[nx, ny, nz]`
    pub dimensions: [usize; 3],
    /// Edge length of a cubic cell in world units
    pub cell_size: f32,
    /// World position of the minimum corner of cell `[0, 0, 0]`
    pub origin: Vec3,
}

impl GridSpec {
    pub fn new(dimensions: [usize; 3], cell_size: f32, origin: Vec3) -> Self {
        Self {
            dimensions,
            cell_size,
            origin,
        }
    }

    /// A cube of `cells` per side centered on `center`.
    pub fn centered(center: Vec3, cells: usize, cell_size: f32) -> Self {
        let half = cells as f32 * cell_size * 0.5;
        Self::new([cells; 3], cell_size, center - Vec3::splat(half))
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimensions.iter().any(|&n| n == 0) {
            return Err(CarvingError::InvalidGrid(format!(
                "dimensions must be positive, got {:?}",
                self.dimensions
            )));
        }
        if !self.cell_size.is_finite() || self.cell_size <= 0.0 {
            return Err(CarvingError::InvalidGrid(format!(
                "cell size must be positive and finite, got {}",
                self.cell_size
            )));
        }
        if !self.origin.is_finite() {
            return Err(CarvingError::InvalidGrid(format!("origin must be finite, got {:?}", self.origin)));
        }
        let [nx, ny, nz] = self.dimensions;
        if nx.checked_mul(ny).and_then(|n| n.checked_mul(nz)).is_none()
            || self.dimensions.iter().any(|&n| n > i32::MAX as usize)
        {
            return Err(CarvingError::InvalidGrid(format!("{:?} cells overflow", self.dimensions)));
        }
        Ok(())
    }

    pub fn cell_count(&self) -> usize {
        self.dimensions.iter().product()
    }

    /// World position of the maximum corner of the grid.
    pub fn max_corner(&self) -> Vec3 {
        let [nx, ny, nz] = self.dimensions;
        self.origin + Vec3::new(nx as f32, ny as f32, nz as f32) * self.cell_size
    }

    /// Continuous cell coordinates, `(p - origin) / cell_size`.
    #[inline]
    pub fn cell_coords(&self, point: Vec3) -> Vec3 {
        (point - self.origin) / self.cell_size
    }

    /// Cell containing `point`, or `None` outside `[0, N)` on any axis.
    pub fn cell_of(&self, point: Vec3) -> Option<CellIndex> {
        let c = self.cell_coords(point).floor();
        let mut cell = [0usize; 3];
        for axis in 0..3 {
            let v = c[axis];
            if !(v >= 0.0 && v < self.dimensions[axis] as f32) {
                return None;
            }
            cell[axis] = v as usize;
        }
        Some(cell)
    }

    pub fn contains(&self, cell: CellIndex) -> bool {
        cell.iter().zip(self.dimensions).all(|(&c, n)| c < n)
    }

    pub fn cell_center(&self, cell: CellIndex) -> Vec3 {
        self.origin
            + Vec3::new(cell[0] as f32 + 0.5, cell[1] as f32 + 0.5, cell[2] as f32 + 0.5) * self.cell_size
    }

    /// Flat index, x fastest then y then z. `cell` must lie inside the
    /// grid; an x or y past its axis would alias another cell.
    #[inline]
    pub fn linear_index(&self, cell: CellIndex) -> usize {
        debug_assert!(self.contains(cell), "cell {:?} outside grid {:?}", cell, self.dimensions);
        let [nx, ny, _] = self.dimensions;
        cell[0] + nx * (cell[1] + ny * cell[2])
    }

    pub fn cell_from_linear(&self, index: usize) -> CellIndex {
        let [nx, ny, _] = self.dimensions;
        [index % nx, (index / nx) % ny, index / (nx * ny)]
    }
}

/// A cell's evidence, for export and visualisation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voxel {
    pub cell: CellIndex,
    pub world_center: Vec3,
    pub ins: u32,
    pub outs: u32,
}

/// Rule turning a cell's counts into occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OccupancyPolicy {
    /// At least one ray was blocked in the cell
    #[default]
    AnyBlocked,
    /// At least `k` blocked rays
    AtLeast(u32),
    /// More blocked than unblocked rays
    InExceedsOut,
}

impl OccupancyPolicy {
    pub fn is_occupied(&self, ins: u32, outs: u32) -> bool {
        match *self {
            OccupancyPolicy::AnyBlocked => ins > 0,
            OccupancyPolicy::AtLeast(k) => ins >= k.max(1),
            OccupancyPolicy::InExceedsOut => ins > outs,
        }
    }
}

/// Whether traversed cells gain or lose one count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulateMode {
    Add,
    Retract,
}

/// Totals of one accumulation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccumulationStats {
    pub rays: u64,
    /// Rays whose segment never entered the grid
    pub rays_missed: u64,
    pub in_updates: u64,
    pub out_updates: u64,
}

impl AccumulationStats {
    pub fn cell_updates(&self) -> u64 {
        self.in_updates + self.out_updates
    }
}

impl Add for AccumulationStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            rays: self.rays + rhs.rays,
            rays_missed: self.rays_missed + rhs.rays_missed,
            in_updates: self.in_updates + rhs.in_updates,
            out_updates: self.out_updates + rhs.out_updates,
        }
    }
}
