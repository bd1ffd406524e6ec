//! Static-equilibrium load capacity.
//!
//! The forearm (with the upper actuator arm behind the elbow) is a lever
//! pivoting on the elbow. The load at the goal is balanced by the linkage
//! force acting along the linkage at the upper actuator tip. With the
//! elevator held, that linkage force loads the actuator crank; with the
//! actuator held, the forearm's net reaction loads the elevator. Both servo
//! torques are affine in the applied load:
//!
//! ```text
//! torque(load) = self_weight_torque + load * torque_per_newton
//! ```
//!
//! so each servo's torque limit yields an independent load bound and the
//! capacity is the smaller one.
//!
//! Lengths are mm, forces N, torques N·m.

use glam::DVec2;
use reach_common::ArmConfig;

use crate::geometry::{EPS, direction_from_vertical};

const MM_PER_M: f64 = 1000.0;

/// Linkage geometry and per-newton force response at one goal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statics {
    /// Lower actuator (crank) tip.
    pub lower_anchor: DVec2,
    /// Upper actuator tip, behind the elbow.
    pub upper_anchor: DVec2,
    /// Linkage force on the forearm per newton of load.
    pub linkage_per_newton: DVec2,
    /// Linkage force on the forearm from the forearm's own weight.
    pub linkage_from_weight: DVec2,
    /// Forearm weight vector.
    pub forearm_weight: DVec2,
    /// Load bound from the actuator torque limit.
    pub actuator_bound: f64,
    /// Load bound from the elevator torque limit.
    pub elevator_bound: f64,
}

impl Statics {
    /// Binding load capacity.
    #[inline]
    pub fn capacity(&self) -> f64 {
        self.actuator_bound.min(self.elevator_bound)
    }
}

/// Largest load `l >= 0` with `|offset + l * per_unit| <= limit`.
///
/// Infinite when the load does not reach this servo at all.
fn load_bound(offset: f64, per_unit: f64, limit: f64) -> f64 {
    if offset.abs() > limit {
        return 0.0;
    }
    if per_unit.abs() < EPS {
        return f64::INFINITY;
    }
    (limit - offset * per_unit.signum()) / per_unit.abs()
}

/// Solve the statics for a goal whose geometry is already known.
///
/// `forearm_dir` points from the elbow to the goal. Returns `None` when the
/// linkage is degenerate (zero length or parallel to the upper actuator
/// arm), since no finite linkage force balances the load there.
pub fn solve_statics(
    arm: &ArmConfig,
    goal: DVec2,
    elbow: DVec2,
    forearm_dir: DVec2,
    actuator_angle: f64,
) -> Option<Statics> {
    let lower_anchor = direction_from_vertical(actuator_angle) * arm.lower_actuator_length;
    let upper_anchor = elbow - forearm_dir * arm.upper_actuator_length;

    let link = lower_anchor - upper_anchor;
    let link_len = link.length();
    if link_len < EPS {
        return None;
    }
    let link_dir = link / link_len;

    // Moment arm of a force along the linkage about the elbow.
    let lever = (upper_anchor - elbow).perp_dot(link_dir);
    if lever.abs() < EPS {
        return None;
    }

    let unit_load = DVec2::new(0.0, -1.0);
    let forearm_weight = DVec2::new(0.0, -arm.forearm_weight);
    let forearm_mid = elbow + (goal - elbow) * 0.5;

    // Moment balance about the elbow.
    let linkage_per_newton = link_dir * (-(goal - elbow).perp_dot(unit_load) / lever);
    let linkage_from_weight = link_dir * (-(forearm_mid - elbow).perp_dot(forearm_weight) / lever);

    // Actuator crank carries the linkage force.
    let actuator_per_unit = lower_anchor.perp_dot(linkage_per_newton) / MM_PER_M;
    let actuator_offset = lower_anchor.perp_dot(linkage_from_weight) / MM_PER_M;

    // Elevator carries the forearm's net reaction plus its own weight.
    let elevator_weight = DVec2::new(0.0, -arm.elevator_weight);
    let elevator_per_unit = elbow.perp_dot(unit_load + linkage_per_newton) / MM_PER_M;
    let elevator_offset = (elbow.perp_dot(forearm_weight + linkage_from_weight)
        + (elbow * 0.5).perp_dot(elevator_weight))
        / MM_PER_M;

    Some(Statics {
        lower_anchor,
        upper_anchor,
        linkage_per_newton,
        linkage_from_weight,
        forearm_weight,
        actuator_bound: load_bound(actuator_offset, actuator_per_unit, arm.actuator_torque),
        elevator_bound: load_bound(elevator_offset, elevator_per_unit, arm.elevator_torque),
    })
}
