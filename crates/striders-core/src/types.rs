//! Shared value types for the gait generator and stabilizer.

use nalgebra::Vector3;

use crate::transform::Pose;

// ---------------------------------------------------------------------------
// LegSide
// ---------------------------------------------------------------------------

/// Which leg a footstep or sensor belongs to.
///
/// Index convention throughout the workspace: right = 0, left = 1, matching
/// the force-sensor port order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegSide {
    Right,
    Left,
}

impl LegSide {
    /// The other leg.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Right => Self::Left,
            Self::Left => Self::Right,
        }
    }

    /// Array index for per-leg pairs (right = 0, left = 1).
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Right => 0,
            Self::Left => 1,
        }
    }

    /// +1 for the left leg, -1 for the right: the sign of the leg's default
    /// lateral offset from the midfoot frame.
    #[must_use]
    pub const fn lateral_sign(self) -> f64 {
        match self {
            Self::Right => -1.0,
            Self::Left => 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Footsteps
// ---------------------------------------------------------------------------

/// A single planned foot placement in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footstep {
    /// Leg that lands at `pose`.
    pub leg: LegSide,
    /// World pose of the foot center at landing.
    pub pose: Pose,
}

impl Footstep {
    #[must_use]
    pub const fn new(leg: LegSide, pose: Pose) -> Self {
        Self { leg, pose }
    }
}

/// Ordered footstep sequence consumed front-to-back by the gait generator.
///
/// Consecutive entries alternate legs; [`FootstepPlan::push`] rejects a
/// same-leg append. The plan is replaced wholesale on a new command and never
/// edited element-wise afterwards.
#[derive(Debug, Clone, Default)]
pub struct FootstepPlan {
    steps: Vec<Footstep>,
}

impl FootstepPlan {
    #[must_use]
    pub const fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Build a plan from a list, validating the alternation invariant.
    /// Returns `None` if two consecutive entries share a leg.
    #[must_use]
    pub fn from_steps(steps: Vec<Footstep>) -> Option<Self> {
        for pair in steps.windows(2) {
            if pair[0].leg == pair[1].leg {
                return None;
            }
        }
        Some(Self { steps })
    }

    /// Append a footstep. Returns `false` (and leaves the plan unchanged)
    /// when the new step repeats the last step's leg.
    pub fn push(&mut self, step: Footstep) -> bool {
        if let Some(last) = self.steps.last() {
            if last.leg == step.leg {
                return false;
            }
        }
        self.steps.push(step);
        true
    }

    /// Re-append the second-to-last entry so the tail forms a leveled
    /// two-step pattern. Used to flush double support at a stop.
    pub fn push_finalize(&mut self) {
        if self.steps.len() >= 2 {
            let dup = self.steps[self.steps.len() - 2];
            self.steps.push(dup);
        }
    }

    /// Remove and return the front footstep.
    pub fn pop_front(&mut self) -> Option<Footstep> {
        if self.steps.is_empty() {
            None
        } else {
            Some(self.steps.remove(0))
        }
    }

    #[must_use]
    pub fn front(&self) -> Option<&Footstep> {
        self.steps.first()
    }

    #[must_use]
    pub fn back(&self) -> Option<&Footstep> {
        self.steps.last()
    }

    #[must_use]
    pub fn get(&self, i: usize) -> Option<&Footstep> {
        self.steps.get(i)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[must_use]
    pub fn steps(&self) -> &[Footstep] {
        &self.steps
    }

    /// Drop every entry past the first `len` (plan overwrite at a stop).
    pub fn truncate(&mut self, len: usize) {
        self.steps.truncate(len);
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }
}

// ---------------------------------------------------------------------------
// Per-tick samples
// ---------------------------------------------------------------------------

/// A 6-D wrench: force and moment.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Wrench {
    pub force: Vector3<f64>,
    pub moment: Vector3<f64>,
}

impl Wrench {
    #[must_use]
    pub const fn new(force: Vector3<f64>, moment: Vector3<f64>) -> Self {
        Self { force, moment }
    }

    /// From the flat `[fx, fy, fz, mx, my, mz]` sensor layout.
    #[must_use]
    pub fn from_slice(v: &[f64; 6]) -> Self {
        Self {
            force: Vector3::new(v[0], v[1], v[2]),
            moment: Vector3::new(v[3], v[4], v[5]),
        }
    }
}

/// Measured state read at the top of each stabilizer tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSamples {
    /// Measured joint angles in radians.
    pub joint_angles: Vec<f64>,
    /// Body roll/pitch/yaw from the gyrometer link.
    pub body_rpy: Vector3<f64>,
    /// Raw foot force/torque in each sensor frame (right = 0, left = 1).
    pub foot_wrench: [Wrench; 2],
}

/// Reference state read at the top of each stabilizer tick.
#[derive(Debug, Clone, PartialEq)]
pub struct RefSamples {
    /// Reference joint angles in radians.
    pub joint_angles: Vec<f64>,
    /// Reference base position in world.
    pub base_pos: Vector3<f64>,
    /// Reference base roll/pitch/yaw.
    pub base_rpy: Vector3<f64>,
    /// Reference ZMP expressed in the base frame.
    pub zmp: Vector3<f64>,
    /// Reference contact state per leg (right = 0, left = 1).
    pub contact_states: [bool; 2],
    /// Seconds remaining in the current swing per leg.
    pub swing_support_time: [f64; 2],
}
