//! Grid evaluation over the arm's reach.

use glam::DVec2;
use reach_common::{ArmConfig, ServoCalibration};
use serde::Serialize;

use crate::contour::{self, Contour};
use crate::kinematics::evaluate;

/// Sampling lattice for field mode.
///
/// `width` columns cover `x ∈ [0, max_reach)`, `height = 2 * width` rows
/// cover `y` from `+max_reach` down to `-max_reach`. Cell `(i, j)` sits at
/// `(i * step, (height / 2 - j) * step)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldGrid {
    pub width: usize,
    pub height: usize,
    pub step: f64,
}

impl FieldGrid {
    /// Grid at `resolution` columns (at least one) for this arm.
    pub fn new(arm: &ArmConfig, resolution: u32) -> Self {
        let width = resolution.max(1) as usize;
        Self {
            width,
            height: 2 * width,
            step: arm.max_reach() / width as f64,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn index(&self, i: usize, j: usize) -> usize {
        j * self.width + i
    }

    /// Arm-frame position of cell `(i, j)`.
    #[inline]
    pub fn position(&self, i: usize, j: usize) -> DVec2 {
        DVec2::new(
            i as f64 * self.step,
            (self.height as f64 / 2.0 - j as f64) * self.step,
        )
    }

    /// Nearest cell to `point`, if it lies on the grid.
    pub fn cell_of(&self, point: DVec2) -> Option<(usize, usize)> {
        if !(self.step > 0.0) {
            return None;
        }
        let i = (point.x / self.step).round();
        let j = (self.height as f64 / 2.0 - point.y / self.step).round();
        if i < 0.0 || j < 0.0 || i >= self.width as f64 || j >= self.height as f64 {
            return None;
        }
        Some((i as usize, j as usize))
    }
}

/// Result of a field solve. Arrays are row-major, `index = j * width + i`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldResult {
    pub grid: FieldGrid,
    /// Every check passed.
    pub reachable: Vec<bool>,
    /// Load capacity where reachable, zero elsewhere.
    pub loads: Vec<f64>,
    /// Elbow position wherever the circles intersect.
    pub elbows: Vec<Option<DVec2>>,
    /// Boundaries of the valid region.
    pub contours: Vec<Contour>,
}

/// Evaluate every cell of the grid.
pub fn solve_field(arm: &ArmConfig, calibration: &ServoCalibration, resolution: u32) -> FieldResult {
    let grid = FieldGrid::new(arm, resolution);
    let n = grid.len();
    let mut reachable = Vec::with_capacity(n);
    let mut loads = Vec::with_capacity(n);
    let mut elbows = Vec::with_capacity(n);

    for j in 0..grid.height {
        for i in 0..grid.width {
            let eval = evaluate(arm, calibration, grid.position(i, j));
            let load = eval.load();
            reachable.push(load.is_some());
            loads.push(load.unwrap_or(0.0));
            elbows.push(eval.elbow);
        }
    }

    let contours = contour::extract(&reachable, grid.width, grid.height, grid.step);
    FieldResult {
        grid,
        reachable,
        loads,
        elbows,
        contours,
    }
}

impl FieldResult {
    #[inline]
    pub fn width(&self) -> usize {
        self.grid.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.grid.height
    }

    /// Grid spacing in millimetres.
    #[inline]
    pub fn scaling_factor(&self) -> f64 {
        self.grid.step
    }

    /// Load at cell `(i, j)`; `None` off-grid or where invalid.
    pub fn load_at(&self, i: usize, j: usize) -> Option<f64> {
        if i >= self.grid.width || j >= self.grid.height {
            return None;
        }
        let k = self.grid.index(i, j);
        self.reachable[k].then(|| self.loads[k])
    }

    /// Load at the cell nearest to `point`.
    pub fn sample_load(&self, point: DVec2) -> Option<f64> {
        let (i, j) = self.grid.cell_of(point)?;
        self.load_at(i, j)
    }

    pub fn reachable_count(&self) -> usize {
        self.reachable.iter().filter(|&&r| r).count()
    }

    /// Positions of every valid cell.
    pub fn reachable_cells(&self) -> Vec<DVec2> {
        (0..self.grid.height)
            .flat_map(|j| (0..self.grid.width).map(move |i| (i, j)))
            .filter(|&(i, j)| self.reachable[self.grid.index(i, j)])
            .map(|(i, j)| self.grid.position(i, j))
            .collect()
    }

    /// Largest load over the valid cells, zero when there are none.
    pub fn max_load(&self) -> f64 {
        self.loads
            .iter()
            .zip(&self.reachable)
            .filter(|&(_, &r)| r)
            .map(|(&l, _)| l)
            .fold(0.0, f64::max)
    }

    /// Counts of valid-cell loads in `bins` equal buckets over `[0, max]`.
    ///
    /// Loads above `max` land in the last bucket.
    pub fn load_histogram(&self, bins: usize, max: f64) -> Vec<usize> {
        let mut counts = vec![0; bins];
        if bins == 0 || !(max > 0.0) {
            return counts;
        }
        let width = max / bins as f64;
        for (&load, _) in self.loads.iter().zip(&self.reachable).filter(|&(_, &r)| r) {
            let bin = ((load / width) as usize).min(bins - 1);
            counts[bin] += 1;
        }
        counts
    }

    /// Per-cell `(intensity, alpha)` for rendering.
    ///
    /// Intensity is the load scaled by four and clamped to a byte; alpha is
    /// opaque on valid cells and transparent elsewhere.
    pub fn heatmap(&self) -> Vec<(u8, u8)> {
        self.loads
            .iter()
            .zip(&self.reachable)
            .map(|(&load, &r)| {
                let intensity = (load * 4.0).clamp(0.0, 255.0) as u8;
                (intensity, if r { 255 } else { 0 })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_field(resolution: u32) -> FieldResult {
        solve_field(&ArmConfig::default(), &ServoCalibration::default(), resolution)
    }

    #[test]
    fn grid_dimensions() {
        let f = default_field(40);
        assert_eq!(f.width(), 40);
        assert_eq!(f.height(), 80);
        assert_eq!(f.reachable.len(), 3200);
        assert_eq!(f.loads.len(), 3200);
        assert_eq!(f.elbows.len(), 3200);
        assert!((f.scaling_factor() - 308.4 / 40.0).abs() < 1e-12);
    }

    #[test]
    fn zero_resolution_clamps_to_one() {
        let f = default_field(0);
        assert_eq!(f.width(), 1);
        assert_eq!(f.height(), 2);
    }

    #[test]
    fn cell_of_inverts_position() {
        let grid = FieldGrid::new(&ArmConfig::default(), 50);
        for (i, j) in [(0, 0), (10, 17), (49, 99), (25, 50)] {
            assert_eq!(grid.cell_of(grid.position(i, j)), Some((i, j)));
        }
        assert_eq!(grid.cell_of(DVec2::new(-100.0, 0.0)), None);
        assert_eq!(grid.cell_of(DVec2::new(0.0, 1000.0)), None);
    }

    #[test]
    fn invalid_cells_have_zero_load() {
        let f = default_field(40);
        for (&load, &r) in f.loads.iter().zip(&f.reachable) {
            if !r {
                assert_eq!(load, 0.0);
            } else {
                assert!(load > 0.0);
            }
        }
    }

    #[test]
    fn default_arm_has_a_valid_region() {
        let f = default_field(60);
        assert!(f.reachable_count() > 0);
        assert!(!f.contours.is_empty());
        assert_eq!(f.reachable_cells().len(), f.reachable_count());
        assert!(f.max_load() > 0.0);
    }

    #[test]
    fn histogram_counts_every_valid_cell() {
        let f = default_field(40);
        let hist = f.load_histogram(10, f.max_load());
        assert_eq!(hist.iter().sum::<usize>(), f.reachable_count());
        assert!(f.load_histogram(0, 10.0).is_empty());
    }

    #[test]
    fn heatmap_alpha_follows_validity() {
        let f = default_field(30);
        let heat = f.heatmap();
        assert_eq!(heat.len(), f.reachable.len());
        for ((_, alpha), &r) in heat.iter().zip(&f.reachable) {
            assert_eq!(*alpha == 255, r);
        }
    }
}
