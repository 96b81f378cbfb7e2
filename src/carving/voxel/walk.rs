//! Grid traversal of a bounded ray segment.
//!
//! The segment is first clipped to the grid box with a slab test, then walked
//! cell by cell (Amanatides & Woo). Every crossing parameter is recomputed from
//! the boundary plane it crosses rather than accumulated, so long rays do not
//! drift, and each face-adjacent cell on the path is yielded exactly once.

use glam::Vec3;

use crate::carving::voxel::types::{CellIndex, GridSpec};

/// Directions with a component smaller than this are treated as parallel to
/// that axis.
const PARALLEL_EPSILON: f32 = 1e-9;

/// Fraction of a cell used to step off the entry face and to ignore
/// boundaries the segment ends on.
const BOUNDARY_TOLERANCE: f32 = 1e-5;

/// One cell on a ray's path and the ray-parameter interval spent inside it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelStep {
    pub cell: CellIndex,
    pub t_enter: f32,
    pub t_exit: f32,
}

impl VoxelStep {
    pub fn length(&self) -> f32 {
        self.t_exit - self.t_enter
    }
}

/// Iterator over the cells a segment `origin + t * direction`, `t in [0, length]`,
/// passes through.
#[derive(Debug, Clone)]
pub struct VoxelWalk {
    spec: GridSpec,
    origin: Vec3,
    direction: Vec3,
    cell: [i64; 3],
    step: [i64; 3],
    t_max: [f32; 3],
    t: f32,
    t_end: f32,
    done: bool,
}

impl VoxelWalk {
    /// `direction` need not be normalised; `length` is measured in units of it.
    pub fn new(spec: &GridSpec, origin: Vec3, direction: Vec3, length: f32) -> Self {
        let mut walk = Self {
            spec: *spec,
            origin,
            direction,
            cell: [0; 3],
            step: [0; 3],
            t_max: [f32::INFINITY; 3],
            t: 0.0,
            t_end: 0.0,
            done: true,
        };

        let Some((t0, t1)) = clip_to_box(spec, origin, direction, length) else {
            return walk;
        };

        let speed = direction.length();
        let nudge = (spec.cell_size * BOUNDARY_TOLERANCE / speed).min((t1 - t0) * 0.5);
        let start = spec.cell_coords(origin + direction * (t0 + nudge)).floor();

        for axis in 0..3 {
            let n = spec.dimensions[axis] as i64;
            walk.cell[axis] = (start[axis] as i64).clamp(0, n - 1);
            let d = direction[axis];
            walk.step[axis] = if d > PARALLEL_EPSILON {
                1
            } else if d < -PARALLEL_EPSILON {
                -1
            } else {
                0
            };
        }
        for axis in 0..3 {
            walk.t_max[axis] = walk.crossing(axis);
        }

        walk.t = t0;
        walk.t_end = t1;
        walk.done = false;
        walk
    }

    /// Ray parameter at which the walk leaves the current cell through its
    /// face on `axis`.
    fn crossing(&self, axis: usize) -> f32 {
        let step = self.step[axis];
        if step == 0 {
            return f32::INFINITY;
        }
        let face = if step > 0 { self.cell[axis] + 1 } else { self.cell[axis] };
        let plane = self.spec.origin[axis] + face as f32 * self.spec.cell_size;
        (plane - self.origin[axis]) / self.direction[axis]
    }

    fn in_bounds(&self) -> bool {
        (0..3).all(|axis| self.cell[axis] >= 0 && self.cell[axis] < self.spec.dimensions[axis] as i64)
    }
}

impl Iterator for VoxelWalk {
    type Item = VoxelStep;

    fn next(&mut self) -> Option<VoxelStep> {
        if self.done {
            return None;
        }

        let axis = if self.t_max[0] <= self.t_max[1] && self.t_max[0] <= self.t_max[2] {
            0
        } else if self.t_max[1] <= self.t_max[2] {
            1
        } else {
            2
        };

        let cell = [self.cell[0] as usize, self.cell[1] as usize, self.cell[2] as usize];
        let t_enter = self.t;
        let t_exit = self.t_max[axis].min(self.t_end).max(t_enter);

        let end_tolerance = self.spec.cell_size * BOUNDARY_TOLERANCE / self.direction.length();
        if self.t_max[axis] >= self.t_end - end_tolerance {
            self.done = true;
        } else {
            self.cell[axis] += self.step[axis];
            if self.in_bounds() {
                self.t = t_exit;
                self.t_max[axis] = self.crossing(axis);
            } else {
                self.done = true;
            }
        }

        Some(VoxelStep { cell, t_enter, t_exit })
    }
}

/// Slab test of the segment against the grid box. Returns the parameter
/// interval inside the box, or `None` if the segment misses it.
fn clip_to_box(spec: &GridSpec, origin: Vec3, direction: Vec3, length: f32) -> Option<(f32, f32)> {
    if !(length > 0.0) || !origin.is_finite() || !direction.is_finite() {
        return None;
    }
    let lo = spec.origin;
    let hi = spec.max_corner();
    let mut t0 = 0.0f32;
    let mut t1 = length;

    for axis in 0..3 {
        let o = origin[axis];
        let d = direction[axis];
        if d.abs() <= PARALLEL_EPSILON {
            if o < lo[axis] || o >= hi[axis] {
                return None;
            }
            continue;
        }
        let mut ta = (lo[axis] - o) / d;
        let mut tb = (hi[axis] - o) / d;
        if ta > tb {
            std::mem::swap(&mut ta, &mut tb);
        }
        t0 = t0.max(ta);
        t1 = t1.min(tb);
        if t0 >= t1 {
            return None;
        }
    }
    Some((t0, t1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_grid() -> GridSpec {
        GridSpec::new([10, 10, 10], 0.1, Vec3::splat(-0.5))
    }

    fn walk(origin: Vec3, end: Vec3) -> Vec<VoxelStep> {
        let offset = end - origin;
        VoxelWalk::new(&unit_grid(), origin, offset.normalize(), offset.length()).collect()
    }

    #[test]
    fn axis_aligned_ray_stops_at_its_end() {
        let steps = walk(Vec3::new(0.05, 0.05, -2.0), Vec3::new(0.05, 0.05, 0.0));
        let zs: Vec<usize> = steps.iter().map(|s| s.cell[2]).collect();
        assert_eq!(zs, vec![0, 1, 2, 3, 4]);
        assert!(steps.iter().all(|s| s.cell[0] == 5 && s.cell[1] == 5));
    }

    #[test]
    fn segment_fully_inside_one_cell() {
        let steps = walk(Vec3::new(0.01, 0.01, 0.01), Vec3::new(0.02, 0.03, 0.04));
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].cell, [5, 5, 5]);
    }

    #[test]
    fn missing_segments_yield_nothing() {
        assert!(walk(Vec3::new(2.0, 2.0, 2.0), Vec3::new(3.0, 2.0, 2.0)).is_empty());
        // Points at the grid but stops short of it.
        assert!(walk(Vec3::new(0.0, 0.0, -2.0), Vec3::new(0.0, 0.0, -1.0)).is_empty());
    }

    #[test]
    fn negative_direction_walks_backwards() {
        let steps = walk(Vec3::new(0.45, 0.05, 0.05), Vec3::new(-0.45, 0.05, 0.05));
        let xs: Vec<usize> = steps.iter().map(|s| s.cell[0]).collect();
        assert_eq!(xs, (0..10).rev().collect::<Vec<_>>());
    }

    #[test]
    fn diagonal_walk_is_face_connected_and_monotonic() {
        let steps = walk(Vec3::new(-0.7, -0.62, -0.55), Vec3::new(0.63, 0.41, 0.58));
        assert!(steps.len() > 10);
        for pair in steps.windows(2) {
            let manhattan: usize = (0..3).map(|a| pair[0].cell[a].abs_diff(pair[1].cell[a])).sum();
            assert_eq!(manhattan, 1, "{:?} -> {:?}", pair[0].cell, pair[1].cell);
            assert!(pair[1].t_enter >= pair[0].t_enter);
            assert!((pair[1].t_enter - pair[0].t_exit).abs() < 1e-5);
        }
        let mut cells: Vec<CellIndex> = steps.iter().map(|s| s.cell).collect();
        cells.sort();
        cells.dedup();
        assert_eq!(cells.len(), steps.len(), "a cell was visited twice");
    }

    #[test]
    fn visited_lengths_sum_to_clipped_segment() {
        let origin = Vec3::new(-0.3, 0.2, -0.9);
        let end = Vec3::new(0.35, -0.4, 0.3);
        let steps = walk(origin, end);
        let total: f32 = steps.iter().map(VoxelStep::length).sum();
        // Both endpoints inside the grid except the start, which enters at z = -0.5.
        let dir = (end - origin).normalize();
        let t_entry = (-0.5 - origin.z) / dir.z;
        let expected = (end - origin).length() - t_entry;
        assert!((total - expected).abs() < 1e-4, "{total} vs {expected}");
    }

    #[test]
    fn ray_parallel_to_a_face_on_the_max_boundary_misses() {
        assert!(walk(Vec3::new(0.5, 0.0, -1.0), Vec3::new(0.5, 0.0, 1.0)).is_empty());
    }

    #[test]
    fn every_visited_cell_contains_its_midpoint() {
        let spec = unit_grid();
        let origin = Vec3::new(-0.48, 0.33, -0.21);
        let end = Vec3::new(0.44, -0.47, 0.39);
        let dir = (end - origin).normalize();
        let steps = VoxelWalk::new(&spec, origin, dir, (end - origin).length());
        for step in steps.filter(|s| s.length() > 1e-4) {
            let mid = origin + dir * (0.5 * (step.t_enter + step.t_exit));
            assert_eq!(spec.cell_of(mid), Some(step.cell));
        }
    }
}
