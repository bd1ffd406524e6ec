//! Planar vector helpers.
//!
//! The arm frame has its origin at the elevator pivot, `+y` up and `+x`
//! towards the reachable side.

use glam::DVec2;

/// Unit vector along the "up" axis.
pub const UP: DVec2 = DVec2::new(0.0, 1.0);

/// Unit vector along the "right" axis.
pub const RIGHT: DVec2 = DVec2::new(1.0, 0.0);

/// Tolerance for degenerate lengths and denominators.
pub const EPS: f64 = 1e-9;

/// `acos` with its argument clamped to [-1, 1].
#[inline]
pub fn safe_acos(x: f64) -> f64 {
    x.clamp(-1.0, 1.0).acos()
}

/// Angle of a unit direction from vertical.
///
/// Positive when the direction leans right, negative otherwise.
#[inline]
pub fn signed_angle_from_vertical(dir: DVec2) -> f64 {
    let magnitude = safe_acos(dir.dot(UP));
    if dir.dot(RIGHT) > 0.0 {
        magnitude
    } else {
        -magnitude
    }
}

/// Unit direction at `angle` from vertical (inverse of
/// [`signed_angle_from_vertical`]).
#[inline]
pub fn direction_from_vertical(angle: f64) -> DVec2 {
    DVec2::new(angle.sin(), angle.cos())
}

/// Elbow position for a goal.
///
/// Intersects the forearm circle (radius `forearm`, centred on `goal`) with
/// the elevator circle (radius `elevator`, centred on the origin) and
/// returns the candidate that sits higher. `None` when the circles do not
/// meet at two points: zero distance, out of reach, or one circle inside
/// the other.
pub fn elbow_position(goal: DVec2, elevator: f64, forearm: f64) -> Option<DVec2> {
    let dist = goal.length();
    if !(dist > EPS) || dist >= elevator + forearm - EPS {
        return None;
    }
    // Distance from the goal, along the goal→origin axis, to the chord.
    let a = (forearm * forearm - elevator * elevator + dist * dist) / (2.0 * dist);
    let h_sq = forearm * forearm - a * a;
    if !(h_sq > 0.0) {
        return None;
    }
    let h = h_sq.sqrt();
    let toward_origin = -goal / dist;
    let chord_mid = goal + toward_origin * a;
    // Perpendicular to the axis, scaled to the half-chord.
    let offset = DVec2::new(toward_origin.y, -toward_origin.x) * h;
    let first = chord_mid + offset;
    let second = chord_mid - offset;
    if second.y > first.y {
        Some(second)
    } else {
        Some(first)
    }
}

/// Even-odd containment of `p` in a closed polygon.
pub fn point_in_polygon(p: DVec2, polygon: &[DVec2]) -> bool {
    let mut inside = false;
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}
