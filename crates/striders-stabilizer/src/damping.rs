//! First-order damping and attitude compensation.
//!
//! Every compensation channel in the stabilizer integrates the same
//! discretized first-order law; only the gains differ. Outputs are clamped at
//! their published bounds, and non-finite inputs collapse to the clamped
//! zero, so a pathological sensor sample can never propagate.

/// One step of damping control:
/// `d' = d + dt * ((tau_d - tau_act) / damping - d / time_const)`.
#[must_use]
pub fn damping_control(
    tau_d: f64,
    tau_act: f64,
    prev_d: f64,
    damping_gain: f64,
    time_const: f64,
    dt: f64,
) -> f64 {
    ((tau_d - tau_act) / damping_gain - prev_d / time_const) * dt + prev_d
}

/// One step of attitude compensation:
/// `d' = d + dt * (gain * (ref - act) - d / time_const)`.
#[must_use]
pub fn attitude_control(
    ref_angle: f64,
    act_angle: f64,
    prev_d: f64,
    gain: f64,
    time_const: f64,
    dt: f64,
) -> f64 {
    (gain * (ref_angle - act_angle) - prev_d / time_const) * dt + prev_d
}

/// Clamp to `[lo, hi]`. A non-finite value collapses to zero clamped into
/// the range, so NaN cannot survive a tick.
#[must_use]
pub fn vlimit(value: f64, lo: f64, hi: f64) -> f64 {
    if !value.is_finite() {
        return 0.0_f64.clamp(lo, hi);
    }
    value.clamp(lo, hi)
}

/// Foot roll/pitch compensation bound: +/- 10 degrees.
pub const FOOT_RPY_LIMIT: f64 = 10.0 * std::f64::consts::PI / 180.0;

/// Vertical force-difference compensation bound: +/- 5 cm.
pub const Z_CTRL_LIMIT: f64 = 0.05;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
