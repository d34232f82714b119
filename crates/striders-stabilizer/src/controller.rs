//! Stabilizer controller.
//!
//! Closes the balance loop each control period: loads the reference and
//! measured samples into the body model, estimates the actual ZMP and CoM in
//! the foot-origin frame, computes a corrected ZMP (Kajita's feedback law),
//! distributes it into per-foot wrenches, runs the damping compensators, and
//! solves per-leg IK against the modified foot targets.
//!
//! Two algorithm families are selectable at idle: EEFM (the distributor +
//! damping pipeline above) and TPCC (direct CoM feedback on the root).

use nalgebra::{UnitQuaternion, Vector3};
use tracing::{info, warn};

use striders_core::config::EndEffectorFrame;
use striders_core::transform::{rot_times, rotation_from_rpy, rpy_from_rotation, Pose};
use striders_core::types::{LegSide, RefSamples, SensorSamples, Wrench};
use striders_model::leg_ik::{LegIkConfig, LegIkSolver};
use striders_model::model::BodyModel;

use crate::damping::{attitude_control, damping_control, vlimit, FOOT_RPY_LIMIT, Z_CTRL_LIMIT};
use crate::distributor::{distribute, DistributorConfig, RollAssign};
use crate::foot_frame::foot_origin_frame;
use crate::params::{StAlgorithm, StabilizerParams};
use crate::transition::TransitionInterpolator;
use crate::zmp::ZmpEstimator;

const LEGS: [LegSide; 2] = [LegSide::Right, LegSide::Left];
const TRANSITION_TIME: f64 = 2.0;
/// Filtered per-foot vertical force above which that foot counts as loaded.
const FOOT_CONTACT_THRESHOLD: f64 = 25.0;

// ---------------------------------------------------------------------------
// Modes and outputs
// ---------------------------------------------------------------------------

/// Stabilizer mode machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilizerMode {
    Idle,
    /// Feet off the ground; control suspended until touchdown.
    Air,
    /// Stabilization active.
    St,
    SyncToIdle,
    SyncToSt,
    SyncToAir,
}

/// Per-tick introspection record mirroring the diagnostic ports.
#[derive(Debug, Clone, Copy, Default)]
pub struct Diagnostics {
    pub origin_ref_zmp: Vector3<f64>,
    pub origin_ref_cog: Vector3<f64>,
    pub origin_ref_cogvel: Vector3<f64>,
    pub origin_new_zmp: Vector3<f64>,
    pub origin_act_zmp: Vector3<f64>,
    pub origin_act_cog: Vector3<f64>,
    pub origin_act_cogvel: Vector3<f64>,
    /// Reference wrench per foot (right = 0, left = 1), foot-origin frame.
    pub ref_wrench: [Wrench; 2],
    /// Vertical foot compensation per foot.
    pub foot_comp_z: [f64; 2],
    /// Roll/pitch foot compensation per foot.
    pub foot_comp_rpy: [[f64; 2]; 2],
    pub act_base_rpy: Vector3<f64>,
    pub current_base_pos: Vector3<f64>,
    pub current_base_rpy: Vector3<f64>,
}

/// Output of one stabilizer tick.
#[derive(Debug, Clone)]
pub struct StabilizerOutput {
    /// Modified joint angles.
    pub q: Vec<f64>,
    /// Commanded ZMP in the root-link frame.
    pub zmp: Vector3<f64>,
    pub diagnostics: Diagnostics,
}

// ---------------------------------------------------------------------------
// Stabilizer
// ---------------------------------------------------------------------------

/// Balance stabilizer over a [`BodyModel`].
pub struct Stabilizer<M: BodyModel> {
    model: M,
    dt: f64,
    ee_local: [Pose; 2],
    params: StabilizerParams,
    mode: StabilizerMode,
    transition: TransitionInterpolator,
    zmp_estimator: ZmpEstimator,
    ik: LegIkSolver,

    // per-tick snapshots
    qorg: Vec<f64>,
    qrefv: Vec<f64>,
    current_root: Pose,
    target_root: Pose,
    target_foot: [Pose; 2],

    // reference-side state (foot-origin frame under EEFM)
    ref_zmp: Vector3<f64>,
    ref_cog: Vector3<f64>,
    ref_cogvel: Vector3<f64>,
    prev_ref_cog: Vector3<f64>,
    prev_ref_zmp: Vector3<f64>,
    new_refzmp: Vector3<f64>,
    rel_cog: Vector3<f64>,
    prev_ref_foot_origin_rot: UnitQuaternion<f64>,

    // actual-side state
    act_zmp: Vector3<f64>,
    act_cog: Vector3<f64>,
    act_cogvel: Vector3<f64>,
    prev_act_cog: Vector3<f64>,
    prev_act_cogvel: Vector3<f64>,
    rel_act_zmp: Vector3<f64>,
    prev_act_foot_origin_rot: UnitQuaternion<f64>,
    act_base_rpy: Vector3<f64>,
    on_ground: bool,
    zmp_origin_off: f64,

    contact_states: [bool; 2],
    prev_contact_states: [bool; 2],
    swing_support_time: [f64; 2],

    // compensator accumulators
    d_rpy: [f64; 2],
    d_foot_rpy: [[f64; 2]; 2],
    zctrl: f64,
    f_zctrl: [f64; 2],
    ref_wrench: [Wrench; 2],
    current_base_pos: Vector3<f64>,
    current_base_rpy: Vector3<f64>,

    mismatch_warned: bool,
}

impl<M: BodyModel> Stabilizer<M> {
    /// Build a stabilizer around a model and the two sole frames
    /// (right = 0, left = 1).
    #[must_use]
    pub fn new(model: M, dt: f64, end_effectors: &[EndEffectorFrame; 2]) -> Self {
        let n = model.num_joints();
        let ee_local = [end_effectors[0].local, end_effectors[1].local];
        let zmp_origin_off = ee_local[0].pos.z;
        Self {
            model,
            dt,
            ee_local,
            params: StabilizerParams::default(),
            mode: StabilizerMode::Idle,
            transition: TransitionInterpolator::new(dt),
            zmp_estimator: ZmpEstimator::new(),
            ik: LegIkSolver::new(LegIkConfig::default()),
            qorg: vec![0.0; n],
            qrefv: vec![0.0; n],
            current_root: Pose::identity(),
            target_root: Pose::identity(),
            target_foot: [Pose::identity(); 2],
            ref_zmp: Vector3::zeros(),
            ref_cog: Vector3::zeros(),
            ref_cogvel: Vector3::zeros(),
            prev_ref_cog: Vector3::zeros(),
            prev_ref_zmp: Vector3::zeros(),
            new_refzmp: Vector3::zeros(),
            rel_cog: Vector3::zeros(),
            prev_ref_foot_origin_rot: UnitQuaternion::identity(),
            act_zmp: Vector3::zeros(),
            act_cog: Vector3::zeros(),
            act_cogvel: Vector3::zeros(),
            prev_act_cog: Vector3::zeros(),
            prev_act_cogvel: Vector3::zeros(),
            rel_act_zmp: Vector3::zeros(),
            prev_act_foot_origin_rot: UnitQuaternion::identity(),
            act_base_rpy: Vector3::zeros(),
            on_ground: false,
            zmp_origin_off,
            contact_states: [true; 2],
            prev_contact_states: [true; 2],
            swing_support_time: [0.0; 2],
            d_rpy: [0.0; 2],
            d_foot_rpy: [[0.0; 2]; 2],
            zctrl: 0.0,
            f_zctrl: [0.0; 2],
            ref_wrench: [Wrench::default(); 2],
            current_base_pos: Vector3::zeros(),
            current_base_rpy: Vector3::zeros(),
            mismatch_warned: false,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> StabilizerMode {
        self.mode
    }

    /// Transition ratio currently applied to the control gains.
    #[must_use]
    pub const fn transition_ratio(&self) -> f64 {
        self.transition.value()
    }

    #[must_use]
    pub const fn on_ground(&self) -> bool {
        self.on_ground
    }

    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }

    // -- service interface -------------------------------------------------

    /// Request stabilization. Takes effect at the next tick; the mode walks
    /// Idle -> SyncToSt -> St over a 2 s blend (or straight to Air when the
    /// robot is not on the ground).
    pub fn start(&mut self) {
        if self.transition.is_done() && self.mode == StabilizerMode::Idle {
            self.sync_to_st();
        }
    }

    /// Request release. The mode walks St/Air -> SyncToIdle -> Idle.
    pub fn stop(&mut self) {
        if self.transition.is_done()
            && (self.mode == StabilizerMode::St || self.mode == StabilizerMode::Air)
        {
            info!("stabilizer: sync ST => IDLE");
            self.mode = StabilizerMode::SyncToIdle;
            self.transition.go(0.0, TRANSITION_TIME);
        }
    }

    /// Current parameter set.
    #[must_use]
    pub const fn get_parameter(&self) -> StabilizerParams {
        self.params
    }

    /// Apply a parameter set. Values are clamped into range; the algorithm
    /// field is rejected (with a warning) unless the mode is idle.
    pub fn set_parameter(&mut self, params: &StabilizerParams) {
        let sanitized = params.sanitized();
        if self.mode == StabilizerMode::Idle {
            self.params = sanitized;
        } else {
            if sanitized.st_algorithm != self.params.st_algorithm {
                warn!("stabilizer: st_algorithm can only change while idle");
            }
            self.params = StabilizerParams {
                st_algorithm: self.params.st_algorithm,
                ..sanitized
            };
        }
    }

    fn sync_to_st(&mut self) {
        self.d_rpy = [0.0; 2];
        self.d_foot_rpy = [[0.0; 2]; 2];
        self.zctrl = 0.0;
        self.f_zctrl = [0.0; 2];
        if self.on_ground {
            info!("stabilizer: sync IDLE => ST");
            self.mode = StabilizerMode::SyncToSt;
            self.transition.go(1.0, TRANSITION_TIME);
        } else {
            self.mode = StabilizerMode::Air;
        }
    }

    fn sync_to_air(&mut self) {
        info!("stabilizer: ground lost, sync ST => AIR");
        self.mode = StabilizerMode::SyncToAir;
        self.transition.go(0.0, TRANSITION_TIME);
    }

    // -- per-tick ----------------------------------------------------------

    /// Run one control period.
    pub fn tick(&mut self, sensors: &SensorSamples, refs: &RefSamples) -> StabilizerOutput {
        let n = self.model.num_joints();
        if refs.joint_angles.len() != n || sensors.joint_angles.len() != n {
            if !self.mismatch_warned {
                warn!(
                    expected = n,
                    got_ref = refs.joint_angles.len(),
                    got_act = sensors.joint_angles.len(),
                    "joint vector length mismatch, skipping write stage"
                );
                self.mismatch_warned = true;
            }
            self.transition.advance();
            return StabilizerOutput {
                q: refs.joint_angles.clone(),
                zmp: self.rel_act_zmp,
                diagnostics: self.diagnostics(),
            };
        }

        self.contact_states = refs.contact_states;
        self.swing_support_time = refs.swing_support_time;
        self.get_current();
        self.get_target(refs);
        self.get_actual(sensors);

        if self.mode == StabilizerMode::Air {
            if self.transition.is_done() && self.on_ground {
                self.sync_to_st();
            }
        } else {
            match self.params.st_algorithm {
                StAlgorithm::Eefm => self.control_eefm(),
                StAlgorithm::Tpcc => self.control_tpcc(sensors),
            }
            if self.mode == StabilizerMode::St && !self.on_ground {
                self.sync_to_air();
            }
        }

        // Blend the model's joints toward the raw reference by the
        // transition ratio: 0 passes qRef through, 1 keeps the stabilized
        // posture.
        let ratio = self.transition.advance();
        let mut q = Vec::with_capacity(n);
        for (i, &qr) in self.qrefv.iter().enumerate() {
            q.push((1.0 - ratio) * qr + ratio * self.model.joint_angles()[i]);
        }

        // mode changes for sync
        match self.mode {
            StabilizerMode::SyncToSt => self.mode = StabilizerMode::St,
            StabilizerMode::SyncToIdle if self.transition.is_done() => {
                info!("stabilizer: finished cleanup");
                self.mode = StabilizerMode::Idle;
            }
            StabilizerMode::SyncToAir if self.transition.is_done() => {
                self.mode = StabilizerMode::Air;
            }
            _ => {}
        }

        // the blended posture is this tick's published state
        let _ = self.model.set_joint_angles(&q);
        self.model.update_kinematics();
        self.prev_contact_states = self.contact_states;

        StabilizerOutput {
            q,
            zmp: self.rel_act_zmp,
            diagnostics: self.diagnostics(),
        }
    }

    /// Snapshot the previous tick's published state.
    fn get_current(&mut self) {
        self.current_root = self.model.root_pose();
        self.qorg.copy_from_slice(self.model.joint_angles());
    }

    /// Load the reference samples and derive reference-side quantities.
    fn get_target(&mut self, refs: &RefSamples) {
        self.qrefv.copy_from_slice(&refs.joint_angles);
        let _ = self.model.set_joint_angles(&refs.joint_angles);
        self.target_root = Pose::new(
            refs.base_pos,
            rotation_from_rpy(refs.base_rpy.x, refs.base_rpy.y, refs.base_rpy.z),
        );
        self.model.set_root_pose(&self.target_root);
        self.model.update_kinematics();

        // base frame -> world frame
        self.ref_zmp = self.target_root.transform_point(&refs.zmp);
        if self.params.st_algorithm == StAlgorithm::Eefm {
            // inverse of the preview filter's output delay
            let advanced = self.ref_zmp
                + self.params.eefm_zmp_delay_time_const[0] * (self.ref_zmp - self.prev_ref_zmp)
                    / self.dt;
            self.prev_ref_zmp = self.ref_zmp;
            self.ref_zmp = advanced;
        }
        self.ref_cog = self.model.com();
        for (i, leg) in LEGS.iter().enumerate() {
            self.target_foot[i] = self.model.ankle_pose(*leg).compose(&self.ee_local[i]);
        }

        if self.params.st_algorithm == StAlgorithm::Eefm {
            let frame = foot_origin_frame(&self.target_foot, self.contact_states);
            self.new_refzmp = self.ref_zmp;
            self.rel_cog = self
                .target_root
                .inverse_transform_point(&self.ref_cog);
            self.zmp_origin_off = self.ref_zmp.z - frame.pos.z;
            self.ref_zmp = frame.inverse_transform_point(&self.ref_zmp);
            self.ref_cog = frame.inverse_transform_point(&self.ref_cog);
            self.new_refzmp = frame.inverse_transform_point(&self.new_refzmp);
            if self.contact_states != self.prev_contact_states {
                // the walking frame rotated under us; carry the velocity over
                self.ref_cogvel =
                    (frame.rot.inverse() * self.prev_ref_foot_origin_rot) * self.ref_cogvel;
            } else {
                self.ref_cogvel = (self.ref_cog - self.prev_ref_cog) / self.dt;
            }
            self.prev_ref_foot_origin_rot = frame.rot;
        } else {
            self.ref_cogvel = (self.ref_cog - self.prev_ref_cog) / self.dt;
        }
        self.prev_ref_cog = self.ref_cog;
    }

    /// Load the measured samples and derive actual-side quantities.
    fn get_actual(&mut self, sensors: &SensorSamples) {
        let act_frame;
        if self.params.st_algorithm == StAlgorithm::Eefm {
            let _ = self.model.set_joint_angles(&sensors.joint_angles);
            let root_rot = self.model.root_pose().rot;
            self.model
                .set_root_pose(&Pose::new(Vector3::zeros(), root_rot));
            self.model.update_kinematics();
            // overwrite the root orientation from the gyrometer; the sensor
            // sits on the root link, so the measured attitude is the root's
            let corrected = rotation_from_rpy(
                sensors.body_rpy.x,
                sensors.body_rpy.y,
                sensors.body_rpy.z,
            );
            self.model
                .set_root_pose(&Pose::new(Vector3::zeros(), corrected));
            self.model.update_kinematics();
            self.act_base_rpy = rpy_from_rotation(&self.model.root_pose().rot);
            act_frame = foot_origin_frame(&self.actual_ee_poses(), self.contact_states);
        } else {
            let _ = self.model.set_joint_angles(&self.qorg);
            self.model.set_root_pose(&self.current_root);
            self.model.update_kinematics();
            act_frame = foot_origin_frame(&self.actual_ee_poses(), self.contact_states);
        }

        self.act_cog = self.model.com();
        let sensor_poses = self.sensor_poses();
        let z_plane = if self.params.st_algorithm == StAlgorithm::Eefm {
            self.zmp_origin_off + act_frame.pos.z
        } else {
            self.ref_zmp.z
        };
        let (zmp_world, on_ground) =
            self.zmp_estimator
                .update(&sensor_poses, &sensors.foot_wrench, z_plane);
        self.on_ground = on_ground;
        self.rel_act_zmp = self
            .model
            .root_pose()
            .inverse_transform_point(&zmp_world);
        self.act_zmp = zmp_world;

        if self.params.st_algorithm == StAlgorithm::Eefm {
            self.act_zmp = act_frame.inverse_transform_point(&self.act_zmp);
            self.act_cog = act_frame.inverse_transform_point(&self.act_cog);
            if self.contact_states != self.prev_contact_states {
                self.act_cogvel =
                    (act_frame.rot.inverse() * self.prev_act_foot_origin_rot) * self.act_cogvel;
            } else {
                self.act_cogvel = (self.act_cog - self.prev_act_cog) / self.dt;
            }
            self.prev_act_foot_origin_rot = act_frame.rot;
            let cutoff = 2.0 * std::f64::consts::PI * self.params.eefm_cogvel_cutoff_freq * self.dt;
            self.act_cogvel =
                (self.prev_act_cogvel + cutoff * self.act_cogvel) / (1.0 + cutoff);
            self.prev_act_cog = self.act_cog;
            self.prev_act_cogvel = self.act_cogvel;

            self.update_new_refzmp(&act_frame);
            self.update_wrench_distribution(&act_frame);
            self.update_body_attitude();
            self.update_foot_damping(sensors, &act_frame);
        }

        // restore the reference posture, keeping the measured leg state for
        // the differential IK start
        let _ = self.model.set_joint_angles(&self.qrefv);
        self.model.set_root_pose(&self.target_root);
        if !(self.mode == StabilizerMode::Idle || self.mode == StabilizerMode::Air) {
            for leg in LEGS {
                let indices = self.model.leg_joints(leg).to_vec();
                for idx in indices {
                    self.model.set_joint_angle(idx, self.qorg[idx]);
                }
            }
            let mut root = self.target_root;
            root.pos.x = self.current_root.pos.x;
            root.pos.y = self.current_root.pos.y;
            root.rot = self.current_root.rot;
            self.model.set_root_pose(&root);
        }
        self.model.update_kinematics();
    }

    /// Kajita's feedback law: move the commanded ZMP against CoM error,
    /// CoM-velocity error, and ZMP error, scaled by the transition ratio.
    fn update_new_refzmp(&mut self, act_frame: &Pose) {
        let ratio = self.transition.value();
        let dcog = act_frame.rot * (self.ref_cog - self.act_cog);
        let dcogvel = act_frame.rot * (self.ref_cogvel - self.act_cogvel);
        let dzmp = act_frame.rot * (self.ref_zmp - self.act_zmp);
        let mut new_refzmp = act_frame.transform_point(&self.new_refzmp);
        for i in 0..2 {
            new_refzmp[i] += self.params.eefm_k1[i] * ratio * dcog[i]
                + self.params.eefm_k2[i] * ratio * dcogvel[i]
                + self.params.eefm_k3[i] * ratio * dzmp[i]
                + self.params.eefm_ref_zmp_aux[i];
        }
        self.new_refzmp = new_refzmp; // world, for the distributor
    }

    /// Split the commanded ZMP into per-foot reference wrenches.
    fn update_wrench_distribution(&mut self, act_frame: &Pose) {
        let config = DistributorConfig {
            inside_margin: self.params.eefm_leg_inside_margin,
            front_margin: self.params.eefm_leg_front_margin,
            rear_margin: self.params.eefm_leg_rear_margin,
            gravity: 9.8,
            roll_assign: RollAssign::PositiveToRight,
        };
        let ee = self.actual_ee_poses();
        let dist = distribute(&config, &self.new_refzmp, &ee, self.model.total_mass());
        self.ref_wrench = dist.wrench;
        // diagnostics live in the foot-origin frame
        self.new_refzmp = act_frame.inverse_transform_point(&self.new_refzmp);
    }

    fn update_body_attitude(&mut self) {
        let ratio = self.transition.value();
        let act_rpy = rpy_from_rotation(&self.model.root_pose().rot);
        let ref_rpy = rpy_from_rotation(&self.target_root.rot);
        for i in 0..2 {
            self.d_rpy[i] = ratio
                * attitude_control(
                    ref_rpy[i],
                    act_rpy[i],
                    self.d_rpy[i],
                    self.params.eefm_body_attitude_control_gain[i],
                    self.params.eefm_body_attitude_control_time_const[i],
                    self.dt,
                )
                + (1.0 - ratio) * self.d_rpy[i];
        }
    }

    /// Foot roll/pitch damping and the vertical force-difference channel.
    fn update_foot_damping(&mut self, sensors: &SensorSamples, act_frame: &Pose) {
        let mut fz_diff = 0.0;
        for (i, leg) in LEGS.iter().enumerate() {
            let ankle = self.model.ankle_pose(*leg);
            let sensor = self.model.force_sensor(*leg);
            let world_rot = rot_times(&ankle.rot, &sensor.local.rot);
            let force = world_rot * sensors.foot_wrench[i].force;
            let moment = world_rot * sensors.foot_wrench[i].moment;
            // moment about the sole frame
            let arm = ankle.rot * (sensor.local.pos - self.ee_local[i].pos);
            let ee_moment = arm.cross(&force) + moment;

            let ee_rot = rot_times(&ankle.rot, &self.ee_local[i].rot);
            let ee_ref_moment = ee_rot.inverse() * self.ref_wrench[i].moment;
            let ee_act_moment = ee_rot.inverse() * ee_moment;
            fz_diff += if i == 0 { -force.z } else { force.z };

            for axis in 0..2 {
                self.d_foot_rpy[i][axis] = damping_control(
                    ee_ref_moment[axis],
                    ee_act_moment[axis],
                    self.d_foot_rpy[i][axis],
                    self.params.eefm_rot_damping_gain,
                    self.params.eefm_rot_time_const,
                    self.dt,
                );
                self.d_foot_rpy[i][axis] =
                    vlimit(self.d_foot_rpy[i][axis], -FOOT_RPY_LIMIT, FOOT_RPY_LIMIT);
            }
        }

        // store diagnostics wrench in the foot-origin frame
        for w in &mut self.ref_wrench {
            w.moment = act_frame.rot.inverse() * w.moment;
        }

        let ref_fz_diff = self.ref_wrench[1].force.z - self.ref_wrench[0].force.z;
        let fz = self.zmp_estimator.filtered_fz();
        let actual_double = fz[0] > FOOT_CONTACT_THRESHOLD && fz[1] > FOOT_CONTACT_THRESHOLD;
        if (self.contact_states[0] && self.contact_states[1]) || actual_double {
            self.zctrl = damping_control(
                ref_fz_diff,
                fz_diff,
                self.zctrl,
                self.params.eefm_pos_damping_gain,
                self.params.eefm_pos_time_const_support,
                self.dt,
            );
        } else {
            let swing_idx = usize::from(self.contact_states[0]);
            let remain = self.swing_support_time[swing_idx];
            let window = self.params.eefm_pos_transition_time + self.params.eefm_pos_margin_time;
            if window < remain {
                self.zctrl = damping_control(
                    0.0,
                    0.0,
                    self.zctrl,
                    self.params.eefm_pos_damping_gain,
                    self.params.eefm_pos_time_const_swing,
                    self.dt,
                );
            } else {
                // landing approach: blend from the swing to the support
                // time constant
                let r = (1.0
                    - (remain - self.params.eefm_pos_margin_time)
                        / self.params.eefm_pos_transition_time)
                    .min(1.0);
                let tc = (1.0 - r) * self.params.eefm_pos_time_const_swing
                    + r * self.params.eefm_pos_time_const_support;
                self.zctrl = damping_control(
                    r * ref_fz_diff,
                    r * fz_diff,
                    self.zctrl,
                    self.params.eefm_pos_damping_gain,
                    tc,
                    self.dt,
                );
            }
        }
        self.zctrl = vlimit(self.zctrl, -Z_CTRL_LIMIT, Z_CTRL_LIMIT);
        self.f_zctrl = [-0.5 * self.zctrl, 0.5 * self.zctrl];
    }

    /// EEFM output stage: modified root attitude and foot targets, per-leg IK.
    fn control_eefm(&mut self) {
        let _ = self.model.set_joint_angles(&self.qrefv);
        self.model.set_root_pose(&self.target_root);

        // modified root attitude preserving the root-to-CoM vector
        let current_root_rot = rot_times(
            &self.target_root.rot,
            &rotation_from_rpy(self.d_rpy[0], self.d_rpy[1], 0.0),
        );
        let current_root_pos = self.target_root.pos + self.target_root.rot * self.rel_cog
            - current_root_rot * self.rel_cog;
        self.model
            .set_root_pose(&Pose::new(current_root_pos, current_root_rot));
        self.model.update_kinematics();
        self.current_base_pos = current_root_pos;
        self.current_base_rpy = rpy_from_rotation(&current_root_rot);

        let ratio = self.transition.value();
        for (i, leg) in LEGS.iter().enumerate() {
            let rot = rot_times(
                &self.target_foot[i].rot,
                &rotation_from_rpy(-self.d_foot_rpy[i][0], -self.d_foot_rpy[i][1], 0.0),
            );
            let pos = Vector3::new(
                self.target_foot[i].pos.x,
                self.target_foot[i].pos.y,
                self.target_foot[i].pos.z - self.f_zctrl[i],
            );
            // sole target -> ankle-link target
            let ankle_target = Pose::new(pos, rot).compose(&self.ee_local[i].inverse());
            self.ik.solve(&mut self.model, *leg, &ankle_target, ratio);
        }
    }

    /// TPCC output stage: CoM-convergence loop moving the root directly.
    fn control_tpcc(&mut self, sensors: &SensorSamples) {
        let ratio = self.transition.value();
        let cog = self.model.com();
        let dcog = self.ref_cog - self.act_cog;
        let dzmp = self.ref_zmp - self.act_zmp;
        let mut newcog = cog;
        for i in 0..2 {
            let uu = self.ref_cogvel[i] - self.params.k_tpcc_p[i] * ratio * dzmp[i]
                + self.params.k_tpcc_x[i] * ratio * dcog[i];
            newcog[i] = uu * self.dt + cog[i];
        }

        // body attitude straight from the gyro (the sensor is root-mounted)
        let act_rb = rotation_from_rpy(
            sensors.body_rpy.x,
            sensors.body_rpy.y,
            sensors.body_rpy.z,
        );
        let act_rpy = rpy_from_rotation(&act_rb);
        let ref_rpy = rpy_from_rotation(&self.target_root.rot);
        for i in 0..2 {
            self.d_rpy[i] = ratio
                * attitude_control(
                    ref_rpy[i],
                    act_rpy[i],
                    self.d_rpy[i],
                    self.params.k_brot_p[i],
                    self.params.k_brot_tc[i],
                    self.dt,
                )
                + (1.0 - ratio) * self.d_rpy[i];
        }
        let current_root_rot = rot_times(
            &self.target_root.rot,
            &rotation_from_rpy(self.d_rpy[0], self.d_rpy[1], 0.0),
        );
        let mut root = self.model.root_pose();
        root.rot = current_root_rot;
        self.model.set_root_pose(&root);
        self.current_base_pos = root.pos;
        self.current_base_rpy = rpy_from_rotation(&current_root_rot);

        // sole targets -> ankle-link targets
        let ankle_targets: [Pose; 2] = [
            self.target_foot[0].compose(&self.ee_local[0].inverse()),
            self.target_foot[1].compose(&self.ee_local[1].inverse()),
        ];

        let single_step = LegIkSolver::new(LegIkConfig {
            iterations: 1,
            ..LegIkConfig::default()
        });
        for _ in 0..3 {
            self.model.update_kinematics();
            let cm = self.model.com();
            let mut root = self.model.root_pose();
            root.pos.x += 0.9 * (newcog.x - cm.x);
            root.pos.y += 0.9 * (newcog.y - cm.y);
            self.model.set_root_pose(&root);
            self.model.update_kinematics();
            for (i, leg) in LEGS.iter().enumerate() {
                single_step.solve(&mut self.model, *leg, &ankle_targets[i], 1.0);
            }
        }
    }

    // -- helpers -----------------------------------------------------------

    fn actual_ee_poses(&self) -> [Pose; 2] {
        [
            self.model
                .ankle_pose(LegSide::Right)
                .compose(&self.ee_local[0]),
            self.model
                .ankle_pose(LegSide::Left)
                .compose(&self.ee_local[1]),
        ]
    }

    fn sensor_poses(&self) -> [Pose; 2] {
        [
            self.model
                .ankle_pose(LegSide::Right)
                .compose(&self.model.force_sensor(LegSide::Right).local),
            self.model
                .ankle_pose(LegSide::Left)
                .compose(&self.model.force_sensor(LegSide::Left).local),
        ]
    }

    fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            origin_ref_zmp: self.ref_zmp,
            origin_ref_cog: self.ref_cog,
            origin_ref_cogvel: self.ref_cogvel,
            origin_new_zmp: self.new_refzmp,
            origin_act_zmp: self.act_zmp,
            origin_act_cog: self.act_cog,
            origin_act_cogvel: self.act_cogvel,
            ref_wrench: self.ref_wrench,
            foot_comp_z: self.f_zctrl,
            foot_comp_rpy: self.d_foot_rpy,
            act_base_rpy: self.act_base_rpy,
            current_base_pos: self.current_base_pos,
            current_base_rpy: self.current_base_rpy,
        }
    }
}
