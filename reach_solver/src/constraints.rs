//! Validity flags for an evaluated goal.
//!
//! Each flag is SET when its check passes. A goal is valid only when every
//! flag is set; a cleared flag names the check that failed. Out-of-range
//! cells are excluded by these predicates, never by poisoning angles or
//! loads with non-numeric markers.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Passed checks for one goal.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Constraints: u8 {
        /// The elevator and forearm circles intersect.
        const REACHABLE      = 0x01;
        /// Elevator servo setting within its calibrated range.
        const ELEVATOR_SERVO = 0x02;
        /// Forearm angle from vertical within range.
        const FOREARM_ANGLE  = 0x04;
        /// Actuator servo setting within its calibrated range.
        const ACTUATOR_SERVO = 0x08;
        /// Elevator-to-actuator base angle within range.
        const BASE_ANGLE     = 0x10;
        /// Elbow angle above its minimum.
        const ELBOW_ANGLE    = 0x20;
        /// Load capacity above the configured minimum.
        const LOAD           = 0x40;
    }
}

impl Constraints {
    /// Checks that depend only on the linkage geometry.
    pub const GEOMETRY: Self = Self::from_bits_truncate(
        Self::REACHABLE.bits()
            | Self::ELEVATOR_SERVO.bits()
            | Self::FOREARM_ANGLE.bits()
            | Self::ACTUATOR_SERVO.bits()
            | Self::BASE_ANGLE.bits()
            | Self::ELBOW_ANGLE.bits(),
    );

    /// Every geometric check passed.
    #[inline]
    pub const fn geometry_ok(&self) -> bool {
        self.contains(Self::GEOMETRY)
    }

    /// Every check passed, load included.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.contains(Self::all())
    }

    /// Failed checks.
    #[inline]
    pub fn failed(&self) -> Self {
        Self::all().difference(*self)
    }
}

impl Default for Constraints {
    fn default() -> Self {
        Self::empty()
    }
}
