//! Display identities that ghost outlines are latched onto.
//!
//! The scheduler never renders anything. It binds a small pool of caller
//! supplied [`GhostDisplay`] handles to ring slots and pushes geometry and
//! colour into them.

use reach_common::consts::{HALF_WINDOW, MIN_GHOST_INTENSITY};
use reach_solver::Contour;
use serde::Serialize;

/// A renderable outline owned by the caller.
pub trait GhostDisplay {
    /// Replace the displayed geometry.
    fn update(&mut self, contours: &[Contour]);
    fn set_color(&mut self, color: GhostColor);
    fn hide(&mut self);
    fn show(&mut self);
}

/// Which side of the current value a ghost sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GhostTone {
    Below,
    Above,
}

/// Ghost colour: a tone plus a brightness in `[MIN_GHOST_INTENSITY, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GhostColor {
    pub tone: GhostTone,
    pub intensity: f32,
}

impl GhostColor {
    const BELOW_RGB: [u8; 3] = [50, 50, 255];
    const ABOVE_RGB: [u8; 3] = [230, 230, 50];

    /// Colour for a ghost at `target` while the parameter sits at `current`.
    ///
    /// Distance is normalised by the width of half the window, so a ghost
    /// at the window edge has distance 1. Brightness falls off as the
    /// reciprocal of that distance and never drops below the floor.
    pub fn for_target(target: f64, current: f64, step_ratio: f64) -> Self {
        let tone = if target < current {
            GhostTone::Below
        } else {
            GhostTone::Above
        };
        let half_window = (current * step_ratio.powi(HALF_WINDOW as i32) - current).abs();
        let norm = if half_window > 0.0 {
            (target - current).abs() / half_window
        } else {
            1.0
        };
        let floor = MIN_GHOST_INTENSITY as f64;
        let intensity = if norm > floor {
            (floor / norm).clamp(floor, 1.0)
        } else {
            1.0
        };
        Self {
            tone,
            intensity: intensity as f32,
        }
    }

    /// Base colour darkened by the intensity.
    pub fn rgb(&self) -> [u8; 3] {
        let base = match self.tone {
            GhostTone::Below => Self::BELOW_RGB,
            GhostTone::Above => Self::ABOVE_RGB,
        };
        base.map(|c| (c as f32 * self.intensity).round() as u8)
    }
}
