//! Damped least squares leg IK.
//!
//! One fixed-iteration differential step per call site: the stabilizer runs
//! three iterations per tick against the modified foot targets, scaling the
//! pose error by its transition ratio so control fades in and out smoothly.

use nalgebra::{DMatrix, DVector};

use striders_core::transform::{rotation_difference, Pose};
use striders_core::types::LegSide;

use crate::model::BodyModel;

/// Configuration for the leg IK step.
#[derive(Debug, Clone, Copy)]
pub struct LegIkConfig {
    /// Differential iterations per solve.
    pub iterations: usize,
    /// DLS damping factor (lambda). Higher is more robust near the straight-
    /// knee singularity, lower converges faster.
    pub damping: f64,
}

impl Default for LegIkConfig {
    fn default() -> Self {
        Self {
            iterations: 3,
            damping: 0.01,
        }
    }
}

/// Damped least squares solver over a [`BodyModel`] leg chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegIkSolver {
    config: LegIkConfig,
}

impl LegIkSolver {
    #[must_use]
    pub const fn new(config: LegIkConfig) -> Self {
        Self { config }
    }

    /// Drive one leg's ankle toward `target`, scaling the error by `scale`
    /// each iteration. Mutates the model's leg joints in place and leaves its
    /// kinematics updated. Returns the final position error norm.
    pub fn solve(
        &self,
        model: &mut dyn BodyModel,
        side: LegSide,
        target: &Pose,
        scale: f64,
    ) -> f64 {
        for _ in 0..self.config.iterations {
            model.update_kinematics();
            let current = model.ankle_pose(side);
            let mut err = DVector::zeros(6);
            let dp = (target.pos - current.pos) * scale;
            let dr = rotation_difference(&current.rot, &target.rot) * scale;
            for i in 0..3 {
                err[i] = dp[i];
                err[i + 3] = dr[i];
            }

            let jac = model.leg_jacobian(side);
            let jjt = &jac * jac.transpose();
            let damped =
                jjt + DMatrix::identity(6, 6) * (self.config.damping * self.config.damping);
            let Some(inv) = damped.try_inverse() else {
                break;
            };
            let dq = jac.transpose() * inv * err;

            for (row, &qi) in model.leg_joints(side).to_vec().iter().enumerate() {
                let q = model.joint_angles()[qi] + dq[row];
                model.set_joint_angle(qi, q);
            }
        }
        model.update_kinematics();
        (target.pos - model.ankle_pose(side).pos).norm()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
