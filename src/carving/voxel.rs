//! Voxel grid module
//!
//! Fixed lattice of cubic cells holding per-cell blocked (`in`) and
//! unblocked (`out`) ray counts, and the grid traversal that feeds them.

mod grid;
mod walk;
pub mod types;

#[cfg(test)]
mod tests;

pub use grid::VoxelGrid;
pub use walk::{VoxelStep, VoxelWalk};
pub use types::{AccumulateMode, AccumulationStats, CellIndex, GridSpec, OccupancyPolicy, Voxel};
