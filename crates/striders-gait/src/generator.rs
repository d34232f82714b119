//! Gait generator.
//!
//! Drives the reference-ZMP stream, the preview filter, and the swing-foot
//! generator one sample per control tick, and owns the footstep plan and the
//! walking mode flags. The ZMP stream leads the leg-side cursor by the
//! preview horizon, so the CoM anticipates upcoming steps.

use nalgebra::Vector3;
use tracing::{debug, info};

use striders_core::transform::{mid_pose, Pose};
use striders_core::types::{Footstep, FootstepPlan, LegSide};
use striders_core::error::ServiceError;

use crate::footstep::{
    closing_velocity_step, go_pos_start_leg, next_velocity_step, plan_go_pos, plan_single_step,
    FootstepParams,
};
use crate::preview::{PreviewConfig, PreviewFilter};
use crate::refzmp::RefZmpGenerator;
use crate::swing::{SwingGenerator, SwingOrbit};

// ---------------------------------------------------------------------------
// Configuration and mode flags
// ---------------------------------------------------------------------------

/// Static gait parameters.
#[derive(Debug, Clone, Copy)]
pub struct GaitConfig {
    /// Control period in seconds.
    pub dt: f64,
    /// Nominal step duration in seconds.
    pub step_time: f64,
    /// Fraction of each step spent in double support.
    pub double_support_ratio: f64,
    /// Swing apex height in meters.
    pub step_height: f64,
    /// Swing orbit family.
    pub orbit: SwingOrbit,
    /// Foot geometry and stride limits.
    pub footstep: FootstepParams,
    /// Default ZMP offset from the foot center, per leg (right, left).
    pub zmp_offset_right: [f64; 3],
    pub zmp_offset_left: [f64; 3],
    /// Preview filter parameters (`dt` is overridden by the gait `dt`).
    pub preview: PreviewConfig,
    /// Root-link height above the CoM in the emitted root pose.
    pub root_above_com: f64,
}

impl Default for GaitConfig {
    fn default() -> Self {
        Self {
            dt: 0.005,
            step_time: 1.0,
            double_support_ratio: 0.2,
            step_height: 0.05,
            orbit: SwingOrbit::default(),
            footstep: FootstepParams::default(),
            zmp_offset_right: [0.0; 3],
            zmp_offset_left: [0.0; 3],
            preview: PreviewConfig::default(),
            root_above_com: 0.15,
        }
    }
}

impl GaitConfig {
    /// Derive the gait parameters from a validated [`ControlConfig`].
    #[must_use]
    pub fn from_control(config: &striders_core::config::ControlConfig) -> Self {
        Self {
            dt: config.dt,
            step_time: config.step_time,
            double_support_ratio: config.double_support_ratio,
            step_height: config.step_height,
            ..Self::default()
        }
    }

    /// The cycloid orbit family at this configuration's apex ratio.
    #[must_use]
    pub fn cycloid_orbit(config: &striders_core::config::ControlConfig) -> SwingOrbit {
        SwingOrbit::Cycloid {
            top_ratio: config.top_ratio,
        }
    }
}

/// Velocity-command walking phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VelocityPhase {
    Idle,
    Doing,
    Ending,
}

/// Emergency-stop phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencyPhase {
    Idle,
    /// Stop requested; the current step still completes.
    Stop,
    /// Flushing the final double support with a flattened orbit.
    Stopping,
}

/// Internal walking state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkState {
    Idle,
    Walking,
    /// Plan exhausted; the preview filter settles onto the final ZMP.
    Draining,
}

/// One tick of reference output.
#[derive(Debug, Clone, Copy)]
pub struct GaitRefs {
    /// Reference ZMP at the leg-side time (world frame).
    pub ref_zmp: Vector3<f64>,
    /// Filtered reference CoM.
    pub ref_cog: Vector3<f64>,
    /// Target root pose derived from the CoM and the walking frame.
    pub root_pose: Pose,
    /// Per-leg foot targets (right = 0, left = 1).
    pub foot_pose: [Pose; 2],
    /// Per-leg contact flags.
    pub contact_states: [bool; 2],
    /// Seconds remaining in swing, per leg (zero while supporting).
    pub swing_support_time: [f64; 2],
    /// Support leg during single support, `None` in double support.
    pub support: Option<LegSide>,
    /// Swing-phase fraction of the active step.
    pub swing_ratio: f64,
}

// ---------------------------------------------------------------------------
// GaitGenerator
// ---------------------------------------------------------------------------

/// Walking pattern generator.
pub struct GaitGenerator {
    config: GaitConfig,
    step_samples: usize,
    plan: FootstepPlan,
    rg: RefZmpGenerator,
    swing: SwingGenerator,
    preview: PreviewFilter,
    state: WalkState,
    /// Ticks until the leg-side cursor starts moving (preview lead).
    lead_remaining: usize,
    drain_remaining: usize,
    /// Index into the plan of the step being executed.
    leg_step: usize,
    step_sample: usize,
    swing_leg: LegSide,
    /// Persistent foot placements (right = 0, left = 1).
    foot_pose: [Pose; 2],
    initial_swing: (LegSide, Pose),
    velocity: [f64; 3],
    offset_velocity: [f64; 3],
    velocity_phase: VelocityPhase,
    emergency: EmergencyPhase,
    last_rzmp: Vector3<f64>,
}

impl GaitGenerator {
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(config: GaitConfig) -> Self {
        let step_samples = (config.step_time / config.dt).round() as usize;
        let preview = PreviewFilter::new(PreviewConfig {
            dt: config.dt,
            ..config.preview
        });
        let swing = SwingGenerator::new(config.dt, config.orbit, config.step_height);
        let rg = RefZmpGenerator::new([
            Vector3::from_column_slice(&config.zmp_offset_right),
            Vector3::from_column_slice(&config.zmp_offset_left),
        ]);
        let foot_pose = [
            config.footstep.foot_from_midfoot(LegSide::Right, &Pose::identity()),
            config.footstep.foot_from_midfoot(LegSide::Left, &Pose::identity()),
        ];
        Self {
            config,
            step_samples,
            plan: FootstepPlan::new(),
            rg,
            swing,
            preview,
            state: WalkState::Idle,
            lead_remaining: 0,
            drain_remaining: 0,
            leg_step: 0,
            step_sample: 0,
            swing_leg: LegSide::Right,
            foot_pose,
            initial_swing: (LegSide::Right, foot_pose[0]),
            velocity: [0.0; 3],
            offset_velocity: [0.0; 3],
            velocity_phase: VelocityPhase::Idle,
            emergency: EmergencyPhase::Idle,
            last_rzmp: Vector3::zeros(),
        }
    }

    /// Place the feet before the first command.
    pub fn set_initial_feet(&mut self, right: &Pose, left: &Pose) {
        self.foot_pose = [*right, *left];
    }

    /// Midfoot frame of the current placements.
    #[must_use]
    pub fn midfoot(&self) -> Pose {
        mid_pose(0.5, &self.foot_pose[0], &self.foot_pose[1])
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == WalkState::Idle
    }

    #[must_use]
    pub const fn velocity_phase(&self) -> VelocityPhase {
        self.velocity_phase
    }

    #[must_use]
    pub const fn emergency_phase(&self) -> EmergencyPhase {
        self.emergency
    }

    #[must_use]
    pub fn plan(&self) -> &FootstepPlan {
        &self.plan
    }

    #[must_use]
    pub const fn step_samples(&self) -> usize {
        self.step_samples
    }

    /// Ticks from command to fully settled output for an `n`-step plan.
    #[must_use]
    pub fn ticks_for_steps(&self, n: usize) -> usize {
        self.preview.horizon_samples() * 2 + n * self.step_samples
    }

    pub fn set_stride_parameters(&mut self, stride_x: f64, stride_y: f64, stride_theta: f64) {
        self.config.footstep.stride_x = stride_x;
        self.config.footstep.stride_y = stride_y;
        self.config.footstep.stride_theta = stride_theta;
    }

    pub fn set_orbit(&mut self, orbit: SwingOrbit) {
        self.config.orbit = orbit;
        self.swing.set_orbit(orbit);
    }

    pub fn set_step_height(&mut self, step_height: f64) {
        self.config.step_height = step_height;
        self.swing.set_step_height(step_height);
    }

    /// Default ZMP offsets from the foot centers (right, left). Takes effect
    /// at the next plan.
    pub fn set_zmp_offsets(&mut self, right: [f64; 3], left: [f64; 3]) {
        self.config.zmp_offset_right = right;
        self.config.zmp_offset_left = left;
        self.rg.set_zmp_offsets([
            Vector3::from_column_slice(&right),
            Vector3::from_column_slice(&left),
        ]);
    }

    // -- commands ----------------------------------------------------------

    /// Walk to a midfoot displacement `(dx, dy, dtheta)`.
    pub fn go_pos(&mut self, dx: f64, dy: f64, dtheta: f64) -> Result<(), ServiceError> {
        self.require_idle()?;
        let start_leg = go_pos_start_leg(dy);
        let midfoot = self.midfoot();
        let plan = plan_go_pos(&self.config.footstep, &midfoot, dx, dy, dtheta, start_leg);
        info!(steps = plan.len(), "go_pos plan generated");
        self.start_plan(plan)
    }

    /// Swing one leg by `(dx, dy, dz, dtheta)` relative to the support foot.
    pub fn go_single_step(
        &mut self,
        dx: f64,
        dy: f64,
        dz: f64,
        dtheta: f64,
        swing_leg: LegSide,
    ) -> Result<(), ServiceError> {
        self.require_idle()?;
        let support = swing_leg.opposite();
        let plan = plan_single_step(
            &self.config.footstep,
            &self.foot_pose[support.index()],
            support,
            dx,
            dy,
            dz,
            dtheta,
        );
        self.start_plan(plan)
    }

    /// Walk continuously at `(vx, vy, vtheta)` until finalized.
    pub fn go_velocity(&mut self, vx: f64, vy: f64, vtheta: f64) -> Result<(), ServiceError> {
        self.velocity = [vx, vy, vtheta];
        if self.velocity_phase == VelocityPhase::Doing {
            return Ok(());
        }
        self.require_idle()?;
        let [cx, cy, ctheta] = self.commanded_velocity();
        let start_leg = go_pos_start_leg(cy);
        let support = start_leg.opposite();
        let mut plan = FootstepPlan::new();
        plan.push(Footstep::new(support, self.foot_pose[support.index()]));
        for _ in 0..3 {
            let next = next_velocity_step(
                &self.config.footstep,
                plan.back().unwrap(),
                cx,
                cy,
                ctheta,
                self.config.step_time,
            );
            plan.push(next);
        }
        self.velocity_phase = VelocityPhase::Doing;
        self.start_plan(plan)
    }

    /// Constant twist added to every velocity command (trim against drift).
    pub fn set_offset_velocity(&mut self, vx: f64, vy: f64, vtheta: f64) {
        self.offset_velocity = [vx, vy, vtheta];
    }

    fn commanded_velocity(&self) -> [f64; 3] {
        [
            self.velocity[0] + self.offset_velocity[0],
            self.velocity[1] + self.offset_velocity[1],
            self.velocity[2] + self.offset_velocity[2],
        ]
    }

    /// Stop velocity walking gracefully with a closing level step.
    pub fn finalize_velocity_mode(&mut self) {
        if self.velocity_phase == VelocityPhase::Doing {
            self.velocity_phase = VelocityPhase::Ending;
        }
    }

    /// Replace the plan with an explicit footstep list.
    pub fn set_footsteps(&mut self, steps: Vec<Footstep>) -> Result<(), ServiceError> {
        self.require_idle()?;
        let plan = FootstepPlan::from_steps(steps).ok_or(ServiceError::NonAlternatingPlan)?;
        self.start_plan(plan)
    }

    /// Stop appending footsteps; after the current step completes, flush the
    /// final double support and go idle.
    pub fn emergency_stop(&mut self) {
        if self.state == WalkState::Walking && !self.plan.is_empty() {
            self.velocity_phase = VelocityPhase::Idle;
            self.emergency = EmergencyPhase::Stop;
            info!("emergency stop requested");
        }
    }

    fn require_idle(&self) -> Result<(), ServiceError> {
        if self.state == WalkState::Idle {
            Ok(())
        } else {
            Err(ServiceError::NotIdle)
        }
    }

    fn start_plan(&mut self, plan: FootstepPlan) -> Result<(), ServiceError> {
        if plan.len() < 2 {
            return Err(ServiceError::EmptyPlan);
        }
        let first = *plan.get(0).unwrap();
        let swing_side = first.leg.opposite();
        self.foot_pose[first.leg.index()] = first.pose;
        self.initial_swing = (swing_side, self.foot_pose[swing_side.index()]);

        self.plan = plan;
        self.rg.reset(&self.plan, self.initial_swing);
        self.leg_step = 0;
        self.step_sample = 0;
        self.swing_leg = swing_side;
        self.swing.reset(
            self.step_samples,
            &self.initial_swing.1,
            &self.initial_swing.1,
            &first.pose,
        );

        // Seed the preview queue with a horizon of initial standing ZMP; the
        // leg-side cursor waits that long so it stays aligned with the head.
        let initial_zmp = self.standing_zmp();
        self.preview.reset(&initial_zmp);
        for _ in 0..self.preview.horizon_samples() {
            self.preview.push(initial_zmp);
        }
        self.last_rzmp = initial_zmp;
        self.lead_remaining = self.preview.horizon_samples();
        self.state = WalkState::Walking;
        self.emergency = EmergencyPhase::Idle;
        Ok(())
    }

    /// Midpoint of the two current placements with their ZMP offsets.
    fn standing_zmp(&self) -> Vector3<f64> {
        let r = self.foot_pose[0].transform_point(&Vector3::from_column_slice(
            &self.config.zmp_offset_right,
        ));
        let l = self.foot_pose[1].transform_point(&Vector3::from_column_slice(
            &self.config.zmp_offset_left,
        ));
        0.5 * (r + l)
    }

    // -- per-tick ----------------------------------------------------------

    /// Advance one control period. Returns `None` when idle.
    pub fn tick(&mut self) -> Option<GaitRefs> {
        if self.state == WalkState::Idle {
            return None;
        }

        // CoM first: consume the queue head the previous ticks produced.
        let ref_cog = self.preview.advance()?;

        // Then extend the look-ahead stream by one sample.
        self.manage_plan_tail();
        let rzmp = self
            .rg
            .update(self.config.double_support_ratio, self.step_samples)
            .unwrap_or(self.last_rzmp);
        self.last_rzmp = rzmp;
        self.preview.push(rzmp);

        if self.lead_remaining > 0 {
            self.lead_remaining -= 1;
            return Some(self.standing_refs(ref_cog));
        }
        if self.state == WalkState::Draining {
            if self.drain_remaining == 0 {
                self.state = WalkState::Idle;
                debug!("gait generator idle");
                return None;
            }
            self.drain_remaining -= 1;
            return Some(self.standing_refs(ref_cog));
        }

        // Leg side.
        let force_flat = self.emergency == EmergencyPhase::Stopping;
        let swing_pose = self
            .swing
            .advance(self.config.double_support_ratio, force_flat);
        self.foot_pose[self.swing_leg.index()] = swing_pose;
        self.step_sample += 1;

        let refs = self.walking_refs(ref_cog);
        if self.step_sample >= self.step_samples {
            self.on_step_boundary();
        }
        Some(refs)
    }

    /// Top the plan up in velocity mode and close it out when ending.
    fn manage_plan_tail(&mut self) {
        if self.emergency != EmergencyPhase::Idle {
            return;
        }
        match self.velocity_phase {
            VelocityPhase::Doing => {
                while self.rg.remaining_steps() < 3 {
                    let [vx, vy, vtheta] = self.commanded_velocity();
                    let next = next_velocity_step(
                        &self.config.footstep,
                        self.plan.back().expect("velocity plan is never empty"),
                        vx,
                        vy,
                        vtheta,
                        self.config.step_time,
                    );
                    self.plan.push(next);
                    self.rg.rebuild_anchors(&self.plan, self.initial_swing);
                    debug!(len = self.plan.len(), "velocity step appended");
                }
            }
            VelocityPhase::Ending => {
                let closing =
                    closing_velocity_step(&self.config.footstep, self.plan.back().unwrap());
                self.plan.push(closing);
                self.plan.push_finalize();
                self.rg.rebuild_anchors(&self.plan, self.initial_swing);
                self.velocity_phase = VelocityPhase::Idle;
                info!("velocity mode finalized");
            }
            VelocityPhase::Idle => {}
        }
    }

    fn on_step_boundary(&mut self) {
        self.step_sample = 0;
        // touchdown
        self.foot_pose[self.swing_leg.index()] = self.swing.swing_dst();

        if self.emergency == EmergencyPhase::Stop {
            self.plan.truncate((self.leg_step + 1).min(self.plan.len()));
            self.plan.push_finalize();
            self.rg.rebuild_anchors(&self.plan, self.initial_swing);
            self.emergency = EmergencyPhase::Stopping;
            info!("emergency stop: flushing double support");
        }

        self.leg_step += 1;
        if self.leg_step >= self.plan.len() {
            self.state = WalkState::Draining;
            self.drain_remaining = self.preview.horizon_samples();
            self.emergency = EmergencyPhase::Idle;
            self.velocity_phase = VelocityPhase::Idle;
            info!("footstep plan complete, settling");
            return;
        }

        let next = *self.plan.get(self.leg_step).unwrap();
        self.swing_leg = next.leg;
        let support = self.swing_leg.opposite();
        let swing_src = self.foot_pose[self.swing_leg.index()];
        let support_pose = self.foot_pose[support.index()];
        self.swing
            .reset(self.step_samples, &swing_src, &next.pose, &support_pose);
    }

    fn walking_refs(&self, ref_cog: Vector3<f64>) -> GaitRefs {
        let ratio = self.swing.swing_ratio;
        let airborne = self.swing.current_step_height > 0.0 && ratio > 0.0 && ratio < 1.0;
        let mut contact_states = [true; 2];
        let mut swing_support_time = [0.0; 2];
        if airborne {
            contact_states[self.swing_leg.index()] = false;
        }
        swing_support_time[self.swing_leg.index()] = self
            .swing
            .swing_remain_time(self.config.double_support_ratio);

        GaitRefs {
            ref_zmp: self.leg_side_zmp(),
            ref_cog,
            root_pose: Pose::new(
                Vector3::new(
                    ref_cog.x,
                    ref_cog.y,
                    ref_cog.z + self.config.root_above_com,
                ),
                self.swing.swing_support_mid_pose().rot,
            ),
            foot_pose: self.foot_pose,
            contact_states,
            swing_support_time,
            support: airborne.then(|| self.swing_leg.opposite()),
            swing_ratio: ratio,
        }
    }

    fn standing_refs(&self, ref_cog: Vector3<f64>) -> GaitRefs {
        GaitRefs {
            ref_zmp: self.standing_zmp(),
            ref_cog,
            root_pose: Pose::new(
                Vector3::new(
                    ref_cog.x,
                    ref_cog.y,
                    ref_cog.z + self.config.root_above_com,
                ),
                self.midfoot().rot,
            ),
            foot_pose: self.foot_pose,
            contact_states: [true; 2],
            swing_support_time: [0.0; 2],
            support: None,
            swing_ratio: 0.0,
        }
    }

    /// Reference ZMP aligned with the leg-side (not look-ahead) time: the
    /// cart-table output of the preview state.
    fn leg_side_zmp(&self) -> Vector3<f64> {
        let mut z = self.preview.output_zmp();
        z.z = self.last_rzmp.z;
        z
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
