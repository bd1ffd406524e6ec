//! Workspace-wide constants.
//!
//! Sizes that shape fixed-capacity collections live here so that the
//! scheduler and its tests agree on them at compile time.

use static_assertions::const_assert;

// ─── Sweep Window ───────────────────────────────────────────────────

/// Ghost slots kept on each side of the current value.
pub const HALF_WINDOW: usize = 4;

/// Ghost slots per parameter ring.
pub const RING_SIZE: usize = 2 * HALF_WINDOW;

/// Default multiplicative offset between neighbouring ghost values.
pub const DEFAULT_STEP_RATIO: f64 = 1.08;

/// Allowed range for the step ratio (exclusive min, inclusive max).
pub const STEP_RATIO_MIN: f64 = 1.0;
pub const STEP_RATIO_MAX: f64 = 2.0;

/// Upper bound on concurrently swept parameters (one ring each).
pub const MAX_RINGS: usize = 12;

// ─── Display Latching ───────────────────────────────────────────────

/// Display identities available for ghost outlines.
pub const MAX_DISPLAYS: usize = 6;

/// Intensity floor for a ghost at the window edge.
pub const MIN_GHOST_INTENSITY: f32 = 0.125;

// ─── Grid ───────────────────────────────────────────────────────────

/// Default field-mode resolution (grid width; height is twice this).
pub const DEFAULT_RESOLUTION: u32 = 200;
pub const RESOLUTION_MIN: u32 = 8;
pub const RESOLUTION_MAX: u32 = 2000;

// ─── Timing ─────────────────────────────────────────────────────────

/// Default control-loop tick interval [ms].
pub const DEFAULT_TICK_MS: u64 = 16;
pub const TICK_MS_MIN: u64 = 1;
pub const TICK_MS_MAX: u64 = 1000;

/// Default background refresh period [ticks].
pub const DEFAULT_REFRESH_TICKS: u32 = 30;

const_assert!(RING_SIZE == 2 * HALF_WINDOW);
const_assert!(MAX_DISPLAYS <= RING_SIZE);
const_assert!(RESOLUTION_MIN <= DEFAULT_RESOLUTION && DEFAULT_RESOLUTION <= RESOLUTION_MAX);
