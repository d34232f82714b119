//! Footstep planning: stride limits, leg-offset geometry, and plan
//! enumeration for the pose-goal and velocity walking modes.
//!
//! Plan layout convention: entry 0 records the initial support foot at its
//! current placement; every later entry is the landing pose of the leg that
//! swings during that step. Consecutive entries alternate legs.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use striders_core::transform::Pose;
use striders_core::types::{Footstep, FootstepPlan, LegSide};

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Foot-placement geometry and stride limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FootstepParams {
    /// Default foot-center offset from the midfoot frame, right leg
    /// (typically negative y).
    pub leg_offset_right: [f64; 3],
    /// Default foot-center offset from the midfoot frame, left leg.
    pub leg_offset_left: [f64; 3],
    /// Maximum forward stride per step (meters).
    pub stride_x: f64,
    /// Maximum lateral stride per step (meters).
    pub stride_y: f64,
    /// Maximum turn per step (radians).
    pub stride_theta: f64,
    /// Forbid the swing foot from moving toward the support foot's side.
    pub inside_step_limitation: bool,
}

impl Default for FootstepParams {
    fn default() -> Self {
        Self {
            leg_offset_right: [0.0, -0.1, 0.0],
            leg_offset_left: [0.0, 0.1, 0.0],
            stride_x: 0.15,
            stride_y: 0.05,
            stride_theta: 10.0_f64.to_radians(),
            inside_step_limitation: true,
        }
    }
}

impl FootstepParams {
    /// Foot-center offset from the midfoot frame for one leg.
    #[must_use]
    pub fn leg_offset(&self, side: LegSide) -> Vector3<f64> {
        let v = match side {
            LegSide::Right => self.leg_offset_right,
            LegSide::Left => self.leg_offset_left,
        };
        Vector3::new(v[0], v[1], v[2])
    }

    /// Foot placement for `side` when the midfoot frame sits at `midfoot`.
    #[must_use]
    pub fn foot_from_midfoot(&self, side: LegSide, midfoot: &Pose) -> Pose {
        Pose::new(midfoot.transform_point(&self.leg_offset(side)), midfoot.rot)
    }

    /// Midfoot frame recovered from one foot placement.
    #[must_use]
    pub fn midfoot_from_foot(&self, side: LegSide, foot: &Pose) -> Pose {
        Pose::new(foot.transform_point(&(-self.leg_offset(side))), foot.rot)
    }

    /// Clamp a per-step midfoot displacement to the stride limits, applying
    /// the inside-step rule for the given swing leg.
    #[must_use]
    pub fn clamp_stride(&self, swing: LegSide, dx: f64, dy: f64, dtheta: f64) -> (f64, f64, f64) {
        let mut dy = dy.clamp(-self.stride_y, self.stride_y);
        if self.inside_step_limitation && dy * swing.lateral_sign() < 0.0 {
            // the swing foot may not step toward the support side
            dy = 0.0;
        }
        (
            dx.clamp(-self.stride_x, self.stride_x),
            dy,
            dtheta.clamp(-self.stride_theta, self.stride_theta),
        )
    }
}

// ---------------------------------------------------------------------------
// Plan enumeration
// ---------------------------------------------------------------------------

/// Leg that starts a pose-goal walk: the first swing converges toward the
/// target side, right when the goal is straight ahead or to the left.
#[must_use]
pub fn go_pos_start_leg(dy: f64) -> LegSide {
    if dy >= 0.0 {
        LegSide::Right
    } else {
        LegSide::Left
    }
}

/// Enumerate footsteps for a midfoot displacement `(dx, dy, dtheta)` from
/// `midfoot`, starting with `start_leg`.
///
/// The displacement is decomposed into at-most-stride increments with legs
/// alternating, followed by two finishing steps that bring the feet level at
/// the goal (the second is a zero-length re-place so the last real step has
/// a successor for double-support blending).
#[must_use]
pub fn plan_go_pos(
    params: &FootstepParams,
    midfoot: &Pose,
    dx: f64,
    dy: f64,
    dtheta: f64,
    start_leg: LegSide,
) -> FootstepPlan {
    let goal = midfoot.compose(&Pose::from_xy_theta(dx, dy, dtheta));
    let mut plan = FootstepPlan::new();
    plan.push(Footstep::new(
        start_leg.opposite(),
        params.foot_from_midfoot(start_leg.opposite(), midfoot),
    ));

    let mut current = *midfoot;
    let mut swing = start_leg;
    const EPS_POS: f64 = 1e-6;
    const EPS_ROT: f64 = 1e-6;
    // Stride-limited displacement steps. The bound only guards against a
    // degenerate non-advancing clamp; the loop exits on arrival.
    for _ in 0..1000 {
        let rel = current.inverse().compose(&goal);
        let (rx, ry) = (rel.pos.x, rel.pos.y);
        let rtheta = rel.yaw();
        if rx.abs() < EPS_POS && ry.abs() < EPS_POS && rtheta.abs() < EPS_ROT {
            break;
        }
        let (sx, sy, stheta) = params.clamp_stride(swing, rx, ry, rtheta);
        current = current.compose(&Pose::from_xy_theta(sx, sy, stheta));
        plan.push(Footstep::new(swing, params.foot_from_midfoot(swing, &current)));
        swing = swing.opposite();
    }

    // Finishing steps: level the trailing foot, then re-place its pair.
    plan.push(Footstep::new(swing, params.foot_from_midfoot(swing, &current)));
    swing = swing.opposite();
    plan.push(Footstep::new(swing, params.foot_from_midfoot(swing, &current)));
    plan
}

/// One-step override: swing `swing_leg` by `(dx, dy, dz, dtheta)` relative to
/// the support foot's default midfoot frame.
#[must_use]
pub fn plan_single_step(
    params: &FootstepParams,
    support_pose: &Pose,
    support_leg: LegSide,
    dx: f64,
    dy: f64,
    dz: f64,
    dtheta: f64,
) -> FootstepPlan {
    let swing = support_leg.opposite();
    let midfoot = params.midfoot_from_foot(support_leg, support_pose);
    let target_mid = midfoot.compose(&Pose::from_xy_theta(dx, dy, dtheta));
    let mut target = params.foot_from_midfoot(swing, &target_mid);
    target.pos.z += dz;

    let mut plan = FootstepPlan::new();
    plan.push(Footstep::new(support_leg, *support_pose));
    plan.push(Footstep::new(swing, target));
    plan.push(Footstep::new(support_leg, *support_pose));
    plan
}

/// Derive the next velocity-mode footstep from the plan's last entry.
///
/// The commanded twist is integrated over one step time, stride-clamped, and
/// applied to the midfoot frame recovered from the last placement.
#[must_use]
pub fn next_velocity_step(
    params: &FootstepParams,
    last: &Footstep,
    vx: f64,
    vy: f64,
    vtheta: f64,
    step_time: f64,
) -> Footstep {
    let swing = last.leg.opposite();
    let midfoot = params.midfoot_from_foot(last.leg, &last.pose);
    let (sx, sy, stheta) = params.clamp_stride(
        swing,
        vx * step_time,
        vy * step_time,
        vtheta * step_time,
    );
    let next_mid = midfoot.compose(&Pose::from_xy_theta(sx, sy, stheta));
    Footstep::new(swing, params.foot_from_midfoot(swing, &next_mid))
}

/// Closing velocity-mode step: bring the swing foot level with the support
/// foot's midfoot frame, with no further displacement.
#[must_use]
pub fn closing_velocity_step(params: &FootstepParams, last: &Footstep) -> Footstep {
    let swing = last.leg.opposite();
    let midfoot = params.midfoot_from_foot(last.leg, &last.pose);
    Footstep::new(swing, params.foot_from_midfoot(swing, &midfoot))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
