//! Stabilizer parameter set.
//!
//! The full runtime-tunable parameter record served over the parameter
//! service. Setters clamp out-of-range values to a safe range and log at
//! warn level; the algorithm field only changes while the controller is
//! idle.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Stabilization algorithm family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StAlgorithm {
    /// Torso-position compliance control: CoM feedback drives the root.
    Tpcc,
    /// End-effector force/moment control: distributor + damping.
    Eefm,
}

/// Runtime-tunable stabilizer parameters. Per-axis pairs are `[x, y]`
/// (or `[roll, pitch]` for attitude channels).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StabilizerParams {
    // TPCC
    pub k_tpcc_p: [f64; 2],
    pub k_tpcc_x: [f64; 2],
    pub k_brot_p: [f64; 2],
    pub k_brot_tc: [f64; 2],
    // EEFM feedback law
    pub eefm_k1: [f64; 2],
    pub eefm_k2: [f64; 2],
    pub eefm_k3: [f64; 2],
    pub eefm_zmp_delay_time_const: [f64; 2],
    pub eefm_ref_zmp_aux: [f64; 2],
    // EEFM body attitude
    pub eefm_body_attitude_control_gain: [f64; 2],
    pub eefm_body_attitude_control_time_const: [f64; 2],
    // EEFM damping
    pub eefm_rot_damping_gain: f64,
    pub eefm_rot_time_const: f64,
    pub eefm_pos_damping_gain: f64,
    pub eefm_pos_time_const_support: f64,
    pub eefm_pos_time_const_swing: f64,
    pub eefm_pos_transition_time: f64,
    pub eefm_pos_margin_time: f64,
    // EEFM support rectangle
    pub eefm_leg_inside_margin: f64,
    pub eefm_leg_front_margin: f64,
    pub eefm_leg_rear_margin: f64,
    // EEFM CoM velocity filter
    pub eefm_cogvel_cutoff_freq: f64,
    pub st_algorithm: StAlgorithm,
}

impl Default for StabilizerParams {
    fn default() -> Self {
        let k_ratio = 0.9;
        Self {
            k_tpcc_p: [0.2; 2],
            k_tpcc_x: [4.0; 2],
            k_brot_p: [0.1; 2],
            k_brot_tc: [1.5; 2],
            eefm_k1: [-1.41429 * k_ratio; 2],
            eefm_k2: [-0.404082 * k_ratio; 2],
            eefm_k3: [-0.18 * k_ratio; 2],
            eefm_zmp_delay_time_const: [0.04; 2],
            eefm_ref_zmp_aux: [0.0; 2],
            eefm_body_attitude_control_gain: [1.0; 2],
            eefm_body_attitude_control_time_const: [1e5; 2],
            eefm_rot_damping_gain: 100.0,
            eefm_rot_time_const: 1.0,
            eefm_pos_damping_gain: 3500.0,
            eefm_pos_time_const_support: 1.0,
            eefm_pos_time_const_swing: 0.04,
            eefm_pos_transition_time: 0.02,
            eefm_pos_margin_time: 0.02,
            eefm_leg_inside_margin: 0.065,
            eefm_leg_front_margin: 0.05,
            eefm_leg_rear_margin: 0.05,
            eefm_cogvel_cutoff_freq: 35.3678,
            st_algorithm: StAlgorithm::Tpcc,
        }
    }
}

impl StabilizerParams {
    /// Clamp every field into its safe range, warning on each adjustment.
    /// Returns the sanitized copy.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let mut p = *self;
        for i in 0..2 {
            p.eefm_zmp_delay_time_const[i] =
                clamp_field("eefm_zmp_delay_time_const", p.eefm_zmp_delay_time_const[i], 0.0, 1.0);
            p.eefm_body_attitude_control_time_const[i] = clamp_field(
                "eefm_body_attitude_control_time_const",
                p.eefm_body_attitude_control_time_const[i],
                1e-3,
                1e6,
            );
            p.k_brot_tc[i] = clamp_field("k_brot_tc", p.k_brot_tc[i], 1e-3, 1e6);
            p.eefm_ref_zmp_aux[i] = clamp_field("eefm_ref_zmp_aux", p.eefm_ref_zmp_aux[i], -0.1, 0.1);
        }
        p.eefm_rot_damping_gain =
            clamp_field("eefm_rot_damping_gain", p.eefm_rot_damping_gain, 1e-3, 1e6);
        p.eefm_pos_damping_gain =
            clamp_field("eefm_pos_damping_gain", p.eefm_pos_damping_gain, 1e-3, 1e7);
        p.eefm_rot_time_const = clamp_field("eefm_rot_time_const", p.eefm_rot_time_const, 1e-3, 1e3);
        p.eefm_pos_time_const_support = clamp_field(
            "eefm_pos_time_const_support",
            p.eefm_pos_time_const_support,
            1e-3,
            1e3,
        );
        p.eefm_pos_time_const_swing = clamp_field(
            "eefm_pos_time_const_swing",
            p.eefm_pos_time_const_swing,
            1e-3,
            1e3,
        );
        p.eefm_pos_transition_time =
            clamp_field("eefm_pos_transition_time", p.eefm_pos_transition_time, 0.0, 10.0);
        p.eefm_pos_margin_time =
            clamp_field("eefm_pos_margin_time", p.eefm_pos_margin_time, 0.0, 10.0);
        p.eefm_leg_inside_margin =
            clamp_field("eefm_leg_inside_margin", p.eefm_leg_inside_margin, 0.0, 0.5);
        p.eefm_leg_front_margin =
            clamp_field("eefm_leg_front_margin", p.eefm_leg_front_margin, 0.0, 0.5);
        p.eefm_leg_rear_margin =
            clamp_field("eefm_leg_rear_margin", p.eefm_leg_rear_margin, 0.0, 0.5);
        p.eefm_cogvel_cutoff_freq =
            clamp_field("eefm_cogvel_cutoff_freq", p.eefm_cogvel_cutoff_freq, 0.01, 1000.0);
        p
    }
}

fn clamp_field(name: &str, value: f64, lo: f64, hi: f64) -> f64 {
    if !value.is_finite() {
        warn!(field = name, value, lo, "non-finite parameter, using lower bound");
        return lo;
    }
    if value < lo || value > hi {
        let clamped = value.clamp(lo, hi);
        warn!(field = name, value, clamped, "parameter out of range, clamped");
        return clamped;
    }
    value
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
