//! Rigid transforms for the walking controller.
//!
//! All frame math in the controller goes through [`Pose`]: a translation plus
//! a unit-quaternion rotation. Composition multiplies quaternions and
//! renormalizes, so repeated products never drift away from orthonormality.

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};

/// Position + orientation of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Translation in meters.
    pub pos: Vector3<f64>,
    /// Orientation as a unit quaternion.
    pub rot: UnitQuaternion<f64>,
}

impl Pose {
    /// Identity pose at the origin.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            pos: Vector3::zeros(),
            rot: UnitQuaternion::identity(),
        }
    }

    /// Pose from a translation and rotation.
    #[must_use]
    pub const fn new(pos: Vector3<f64>, rot: UnitQuaternion<f64>) -> Self {
        Self { pos, rot }
    }

    /// Pose from a translation with identity rotation.
    #[must_use]
    pub fn from_translation(pos: Vector3<f64>) -> Self {
        Self {
            pos,
            rot: UnitQuaternion::identity(),
        }
    }

    /// Pose from a translation and a yaw angle about world z.
    #[must_use]
    pub fn from_xy_theta(x: f64, y: f64, theta: f64) -> Self {
        Self {
            pos: Vector3::new(x, y, 0.0),
            rot: UnitQuaternion::from_axis_angle(&Vector3::z_axis(), theta),
        }
    }

    /// Rotation as a 3x3 matrix.
    #[must_use]
    pub fn rot_matrix(&self) -> Matrix3<f64> {
        self.rot.to_rotation_matrix().into_inner()
    }

    /// Compose with another pose expressed in this pose's frame.
    ///
    /// The rotation product goes through the quaternion representation and is
    /// renormalized.
    #[must_use]
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            pos: self.pos + self.rot * other.pos,
            rot: rot_times(&self.rot, &other.rot),
        }
    }

    /// Inverse transformation.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let inv_rot = self.rot.inverse();
        Self {
            pos: inv_rot * (-self.pos),
            rot: inv_rot,
        }
    }

    /// Map a point from this pose's frame to the parent frame.
    #[must_use]
    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.pos + self.rot * p
    }

    /// Map a point from the parent frame into this pose's frame.
    #[must_use]
    pub fn inverse_transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rot.inverse() * (p - self.pos)
    }

    /// Rotate a free vector into the parent frame.
    #[must_use]
    pub fn transform_vector(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.rot * v
    }

    /// Yaw of the pose's x-axis projected onto the horizontal plane.
    #[must_use]
    pub fn yaw(&self) -> f64 {
        let x = self.rot * Vector3::x();
        x.y.atan2(x.x)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

// ---------------------------------------------------------------------------
// Rotation helpers
// ---------------------------------------------------------------------------

/// Quaternion product with renormalization.
#[must_use]
pub fn rot_times(a: &UnitQuaternion<f64>, b: &UnitQuaternion<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::new_normalize(a.into_inner() * b.into_inner())
}

/// Axis-angle logarithm of a rotation, as axis * angle.
#[must_use]
pub fn rotation_log(r: &UnitQuaternion<f64>) -> Vector3<f64> {
    match r.axis_angle() {
        Some((axis, angle)) => axis.into_inner() * angle,
        None => Vector3::zeros(),
    }
}

/// Rotation difference `self -> target` expressed in the world frame.
///
/// This is the angular error vector fed to the differential IK step: zero
/// when the rotations agree, and `self * log(selfᵀ target)` otherwise.
#[must_use]
pub fn rotation_difference(
    self_rot: &UnitQuaternion<f64>,
    target_rot: &UnitQuaternion<f64>,
) -> Vector3<f64> {
    self_rot * rotation_log(&(self_rot.inverse() * target_rot))
}

/// Rotation from roll/pitch/yaw (x-y-z convention).
#[must_use]
pub fn rotation_from_rpy(roll: f64, pitch: f64, yaw: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_euler_angles(roll, pitch, yaw)
}

/// Roll/pitch/yaw of a rotation (x-y-z convention).
#[must_use]
pub fn rpy_from_rotation(r: &UnitQuaternion<f64>) -> Vector3<f64> {
    let (roll, pitch, yaw) = r.euler_angles();
    Vector3::new(roll, pitch, yaw)
}

/// Rotation from a 3x3 matrix, renormalized through the quaternion form.
#[must_use]
pub fn rotation_from_matrix(m: &Matrix3<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(*m))
}

/// Interpolate between two poses.
///
/// Position is blended linearly by `p`; rotation follows the geodesic from
/// `a.rot` to `b.rot` by the same fraction (axis-angle scaling of the
/// relative rotation). `p = 0` returns `a`, `p = 1` returns `b`.
#[must_use]
pub fn mid_pose(p: f64, a: &Pose, b: &Pose) -> Pose {
    let pos = (1.0 - p) * a.pos + p * b.pos;
    let omega = rotation_log(&(a.rot.inverse() * b.rot));
    let rot = if omega.norm() < 1e-12 {
        a.rot
    } else {
        rot_times(&a.rot, &UnitQuaternion::new(omega * p))
    };
    Pose::new(pos, rot)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
