//! Body-model seam.
//!
//! The controller consumes a whole-body kinematic model through [`BodyModel`]
//! only: joint vector read/write, root pose, forward kinematics, leg chain
//! Jacobians, mass/CoM queries, and force-sensor frames. The actual model
//! loader lives outside this workspace.

use nalgebra::{DMatrix, Vector3};

use striders_core::error::ModelError;
use striders_core::transform::Pose;
use striders_core::types::LegSide;

/// A force sensor fixed on a leg's ankle link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceSensorFrame {
    pub side: LegSide,
    /// Sensor pose in the ankle-link frame.
    pub local: Pose,
}

/// Whole-body kinematic model of a biped.
///
/// `update_kinematics` must be called after mutating joint angles or the root
/// pose; pose/CoM/Jacobian queries reflect the state at the last update.
pub trait BodyModel {
    /// Number of actuated joints.
    fn num_joints(&self) -> usize;

    /// Current joint angle vector (radians).
    fn joint_angles(&self) -> &[f64];

    /// Overwrite the full joint vector. Fails on length mismatch without
    /// touching the model.
    fn set_joint_angles(&mut self, q: &[f64]) -> Result<(), ModelError>;

    /// Overwrite one joint angle.
    fn set_joint_angle(&mut self, index: usize, q: f64);

    /// World pose of the root link.
    fn root_pose(&self) -> Pose;

    /// Move the root link.
    fn set_root_pose(&mut self, pose: &Pose);

    /// Recompute link frames from the root pose and joint vector.
    fn update_kinematics(&mut self);

    /// Total mass in kilograms.
    fn total_mass(&self) -> f64;

    /// Whole-body center of mass in world coordinates.
    fn com(&self) -> Vector3<f64>;

    /// Joint indices making up a leg chain, root-to-ankle order.
    fn leg_joints(&self, side: LegSide) -> &[usize];

    /// World pose of a leg's ankle link.
    fn ankle_pose(&self, side: LegSide) -> Pose;

    /// 6 x n geometric Jacobian of the ankle link with respect to the leg's
    /// joints, root held fixed. Rows: linear velocity, then angular.
    fn leg_jacobian(&self, side: LegSide) -> DMatrix<f64>;

    /// The leg's force-sensor frame.
    fn force_sensor(&self, side: LegSide) -> ForceSensorFrame;
}
