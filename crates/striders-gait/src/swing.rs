//! Swing-foot trajectory generation.
//!
//! Two orbit families shape the swing path: a cycloid arc peaked at a
//! configurable fraction of the swing, and a three-phase rectangle
//! (up, across, down). Either orbit serves as the antecedent path of a
//! delayed minimum-jerk smoother: the interpolator chases the orbit point
//! until a final time window, then retargets to the landing pose itself, so
//! touchdown is smooth even when the target moves late in the step.

use nalgebra::Vector3;

use striders_core::transform::{mid_pose, Pose};

// ---------------------------------------------------------------------------
// Orbits
// ---------------------------------------------------------------------------

/// Geometric family of the swing path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SwingOrbit {
    /// Classic cycloid arc with its apex at `top_ratio` of the swing.
    Cycloid { top_ratio: f64 },
    /// Straight up, straight across, straight down.
    Rectangle,
}

impl Default for SwingOrbit {
    fn default() -> Self {
        Self::Rectangle
    }
}

impl SwingOrbit {
    /// Point on the orbit at `ratio` in [0, 1] of the horizontal-time budget.
    #[must_use]
    pub fn antecedent_path(
        &self,
        ratio: f64,
        start: &Vector3<f64>,
        goal: &Vector3<f64>,
        height: f64,
    ) -> Vector3<f64> {
        match *self {
            Self::Cycloid { top_ratio } => cycloid_point(ratio, start, goal, height, top_ratio),
            Self::Rectangle => rectangle_point(ratio, start, goal, height),
        }
    }
}

/// Cycloid arc point. The phase is warped so the apex lands at `top_ratio`.
#[must_use]
pub fn cycloid_point(
    ratio: f64,
    start: &Vector3<f64>,
    goal: &Vector3<f64>,
    height: f64,
    top_ratio: f64,
) -> Vector3<f64> {
    let r = ratio.clamp(0.0, 1.0);
    let top = top_ratio.clamp(1e-3, 1.0 - 1e-3);
    let phase = if r < top {
        std::f64::consts::PI * r / top
    } else {
        std::f64::consts::PI * (1.0 + (r - top) / (1.0 - top))
    };
    let s = (phase - phase.sin()) / std::f64::consts::TAU;
    let mut p = start + s * (goal - start);
    p.z += height * 0.5 * (1.0 - phase.cos());
    p
}

/// Rectangle profile point: up, across, down, with the up and down phases
/// each taking `height / path_length` of the budget.
#[must_use]
pub fn rectangle_point(
    ratio: f64,
    start: &Vector3<f64>,
    goal: &Vector3<f64>,
    height: f64,
) -> Vector3<f64> {
    let total_path = (goal - start).norm() + 2.0 * height;
    if total_path < 1e-4 {
        return *goal;
    }
    let updown = height / total_path;
    let top = start.z.min(goal.z) + height;
    let r = ratio.clamp(0.0, 1.0);
    if r < updown {
        let t = r / updown;
        let up = Vector3::new(start.x, start.y, top);
        start.lerp(&up, t)
    } else if r < 1.0 - updown {
        let t = (r - updown) / (1.0 - 2.0 * updown);
        Vector3::new(start.x, start.y, top).lerp(&Vector3::new(goal.x, goal.y, top), t)
    } else {
        let t = (r - (1.0 - updown)) / updown;
        Vector3::new(goal.x, goal.y, top).lerp(goal, t)
    }
}

// ---------------------------------------------------------------------------
// Delayed minimum-jerk smoother
// ---------------------------------------------------------------------------

/// Third-order interpolator with remaining-time retargeting.
///
/// Integrates `jerk = -9/τ·a - 36/τ²·v + 60/τ³·(target - p)` with `τ` the
/// time to the current target. For `remain > time_offset` the target is the
/// orbit point; inside the final window it is the landing pose itself.
#[derive(Debug, Clone)]
pub struct DelayedMinJerk {
    dt: f64,
    time_offset: f64,
    total_time: f64,
    remain_time: f64,
    pos: Vector3<f64>,
    vel: Vector3<f64>,
    acc: Vector3<f64>,
}

impl DelayedMinJerk {
    #[must_use]
    pub fn new(dt: f64) -> Self {
        Self {
            dt,
            time_offset: 0.1,
            total_time: 0.0,
            remain_time: 0.0,
            pos: Vector3::zeros(),
            vel: Vector3::zeros(),
            acc: Vector3::zeros(),
        }
    }

    pub fn set_time_offset(&mut self, time_offset: f64) {
        self.time_offset = time_offset;
    }

    /// Restart over `step_samples` ticks. State re-seeds on the first
    /// `advance` call.
    #[allow(clippy::cast_precision_loss)]
    pub fn reset(&mut self, step_samples: usize) {
        self.total_time = step_samples as f64 * self.dt;
        self.remain_time = self.total_time;
    }

    fn integrate(&mut self, tau: f64, target: &Vector3<f64>) {
        let jerk = -9.0 / tau * self.acc - 36.0 / (tau * tau) * self.vel
            + 60.0 / (tau * tau * tau) * (target - self.pos);
        self.acc += self.dt * jerk;
        self.vel += self.dt * self.acc;
        self.pos += self.dt * self.vel;
    }

    /// Advance one tick toward `goal` along `orbit` and return the position.
    pub fn advance(
        &mut self,
        orbit: &SwingOrbit,
        start: &Vector3<f64>,
        goal: &Vector3<f64>,
        height: f64,
    ) -> Vector3<f64> {
        if (self.remain_time - self.total_time).abs() < 1e-5 {
            self.pos = *start;
            self.vel = Vector3::zeros();
            self.acc = Vector3::zeros();
        }
        if self.remain_time > self.time_offset {
            let ratio = if self.total_time - self.time_offset > 1e-9 {
                (self.total_time - self.remain_time) / (self.total_time - self.time_offset)
            } else {
                1.0
            };
            let target = orbit.antecedent_path(ratio, start, goal, height);
            self.integrate(self.time_offset, &target);
        } else if self.remain_time > 1e-5 {
            self.integrate(self.remain_time, goal);
        } else {
            self.pos = *goal;
        }
        self.remain_time -= self.dt;
        self.pos
    }
}

// ---------------------------------------------------------------------------
// Swing-leg bookkeeping
// ---------------------------------------------------------------------------

/// Per-step swing state: source/destination/support placements, phase
/// ratios, and the smoothed swing pose.
#[derive(Debug, Clone)]
pub struct SwingGenerator {
    dt: f64,
    orbit: SwingOrbit,
    step_height: f64,
    smoother: DelayedMinJerk,
    swing_src: Pose,
    swing_dst: Pose,
    support_pose: Pose,
    swing_pose: Pose,
    step_samples: usize,
    sample_index: usize,
    /// Commanded apex for the current tick: `step_height` mid-swing, zero in
    /// double support or under a forced flat orbit.
    pub current_step_height: f64,
    /// Swing-phase fraction in [0, 1], zero across double support.
    pub swing_ratio: f64,
    /// Rotation blend fraction from source to destination placement.
    pub rot_ratio: f64,
}

impl SwingGenerator {
    #[must_use]
    pub fn new(dt: f64, orbit: SwingOrbit, step_height: f64) -> Self {
        Self {
            dt,
            orbit,
            step_height,
            smoother: DelayedMinJerk::new(dt),
            swing_src: Pose::identity(),
            swing_dst: Pose::identity(),
            support_pose: Pose::identity(),
            swing_pose: Pose::identity(),
            step_samples: 0,
            sample_index: 0,
            current_step_height: 0.0,
            swing_ratio: 0.0,
            rot_ratio: 0.0,
        }
    }

    pub fn set_orbit(&mut self, orbit: SwingOrbit) {
        self.orbit = orbit;
    }

    pub fn set_step_height(&mut self, step_height: f64) {
        self.step_height = step_height;
    }

    pub fn set_time_offset(&mut self, time_offset: f64) {
        self.smoother.set_time_offset(time_offset);
    }

    /// Reinitialize at a step boundary.
    pub fn reset(
        &mut self,
        step_samples: usize,
        swing_src: &Pose,
        swing_dst: &Pose,
        support_pose: &Pose,
    ) {
        self.swing_src = *swing_src;
        self.swing_dst = *swing_dst;
        self.support_pose = *support_pose;
        self.swing_pose = *swing_src;
        self.step_samples = step_samples;
        self.sample_index = 0;
        self.current_step_height = 0.0;
        self.swing_ratio = 0.0;
        self.rot_ratio = 0.0;
        self.smoother.reset(step_samples);
    }

    /// Swing-phase fraction for the current sample: 0 through the leading
    /// double-support half, then linear to 1 across single support.
    #[allow(clippy::cast_precision_loss)]
    fn phase_ratio(&self, double_support_ratio: f64) -> f64 {
        if self.step_samples == 0 {
            return 0.0;
        }
        let t = self.sample_index as f64 / self.step_samples as f64;
        ((t - 0.5 * double_support_ratio) / (1.0 - double_support_ratio)).clamp(0.0, 1.0)
    }

    /// Produce the swing pose for this tick.
    pub fn advance(&mut self, double_support_ratio: f64, force_height_zero: bool) -> Pose {
        let ratio = self.phase_ratio(double_support_ratio);
        self.swing_ratio = ratio;
        self.rot_ratio = ratio;

        // a step that goes nowhere stays on the ground
        let displaced = (self.swing_dst.pos - self.swing_src.pos).norm() > 1e-9
            || self.swing_src.rot.angle_to(&self.swing_dst.rot) > 1e-9;
        let height = if force_height_zero || !displaced {
            0.0
        } else {
            self.step_height
        };
        self.current_step_height = if ratio > 0.0 && ratio < 1.0 { height } else { 0.0 };

        let pos = self.smoother.advance(
            &self.orbit,
            &self.swing_src.pos,
            &self.swing_dst.pos,
            height,
        );
        let rot = mid_pose(ratio, &self.swing_src, &self.swing_dst).rot;
        self.swing_pose = Pose::new(pos, rot);
        self.sample_index += 1;
        self.swing_pose
    }

    #[must_use]
    pub const fn swing_pose(&self) -> Pose {
        self.swing_pose
    }

    #[must_use]
    pub const fn support_pose(&self) -> Pose {
        self.support_pose
    }

    #[must_use]
    pub const fn swing_dst(&self) -> Pose {
        self.swing_dst
    }

    #[must_use]
    pub const fn sample_index(&self) -> usize {
        self.sample_index
    }

    #[must_use]
    pub const fn step_samples(&self) -> usize {
        self.step_samples
    }

    /// Midpoint frame between the blended swing placement and the support
    /// foot, used as the walking-frame origin.
    #[must_use]
    pub fn swing_support_mid_pose(&self) -> Pose {
        let blended = mid_pose(self.rot_ratio, &self.swing_src, &self.swing_dst);
        mid_pose(0.5, &blended, &self.support_pose)
    }

    /// Whether the swing foot is airborne this tick (with a landing-offset
    /// margin carved out of the single-support window).
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn is_swinging(&self, double_support_ratio: f64, landing_offset_ratio: f64) -> bool {
        if self.step_samples == 0 {
            return false;
        }
        let t = self.sample_index as f64 / self.step_samples as f64;
        let lo = 0.5 * double_support_ratio + landing_offset_ratio;
        let hi = 1.0 - 0.5 * double_support_ratio - landing_offset_ratio;
        t >= lo && t <= hi
    }

    /// Seconds until the current swing ends; zero outside the swing window.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn swing_remain_time(&self, double_support_ratio: f64) -> f64 {
        if self.swing_ratio <= 0.0 || self.swing_ratio >= 1.0 {
            return 0.0;
        }
        let end = (1.0 - 0.5 * double_support_ratio) * self.step_samples as f64;
        ((end - self.sample_index as f64) * self.dt).max(0.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
