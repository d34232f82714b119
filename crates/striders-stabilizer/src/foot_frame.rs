//! Foot-origin frame.
//!
//! The instantaneous ground frame the stabilization math runs in: each foot
//! contributes a planar frame (its x-axis flattened onto the horizontal
//! plane, z pointing up), and the origin is their pose midpoint in double
//! support or the contacting foot's frame in single support.

use nalgebra::{Matrix3, Vector3};

use striders_core::transform::{mid_pose, rotation_from_matrix, Pose};

/// Planar projection of a foot pose: x from the foot's x-axis flattened and
/// normalized, z up, y completing the right-handed frame.
#[must_use]
pub fn projected_frame(foot: &Pose) -> Pose {
    let ez = Vector3::z();
    let mut x = foot.rot * Vector3::x();
    x.z = 0.0;
    let x = if x.norm() < 1e-9 {
        // foot pointing straight up or down; fall back to world x
        Vector3::x()
    } else {
        x.normalize()
    };
    let y = ez.cross(&x);
    let m = Matrix3::from_columns(&[x, y, ez]);
    Pose::new(foot.pos, rotation_from_matrix(&m))
}

/// Ground frame from the two foot poses and their contact flags.
///
/// Both feet in contact: the pose midpoint of the projected frames. One
/// contact: that foot's projected frame (falling back to the left when
/// neither reports contact, matching single-support bookkeeping).
#[must_use]
pub fn foot_origin_frame(feet: &[Pose; 2], contacts: [bool; 2]) -> Pose {
    let right = projected_frame(&feet[0]);
    let left = projected_frame(&feet[1]);
    match contacts {
        [true, true] => mid_pose(0.5, &right, &left),
        [true, false] => right,
        _ => left,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use striders_core::transform::rotation_from_rpy;

    #[test]
    fn level_foot_projects_to_itself() {
        let foot = Pose::from_xy_theta(0.1, -0.1, 0.4);
        let proj = projected_frame(&foot);
        assert_relative_eq!(proj.pos, foot.pos, epsilon = 1e-12);
        assert_relative_eq!(proj.yaw(), 0.4, epsilon = 1e-12);
        // z-axis is world up
        let z = proj.rot * Vector3::z();
        assert_relative_eq!(z, Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn tilted_foot_projects_flat() {
        let mut foot = Pose::from_xy_theta(0.0, 0.0, 0.3);
        foot.rot = rotation_from_rpy(0.2, -0.1, 0.3);
        let proj = projected_frame(&foot);
        let z = proj.rot * Vector3::z();
        assert_relative_eq!(z, Vector3::z(), epsilon = 1e-12);
        assert_relative_eq!(proj.yaw(), foot.yaw(), epsilon = 1e-12);
    }

    #[test]
    fn double_support_frame_is_midpoint() {
        let feet = [
            Pose::from_xy_theta(0.0, -0.1, 0.0),
            Pose::from_xy_theta(0.2, 0.1, 0.0),
        ];
        let frame = foot_origin_frame(&feet, [true, true]);
        assert_relative_eq!(frame.pos.x, 0.1, epsilon = 1e-12);
        assert_relative_eq!(frame.pos.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn double_support_yaw_is_blended() {
        let feet = [
            Pose::from_xy_theta(0.0, -0.1, 0.0),
            Pose::from_xy_theta(0.0, 0.1, 0.4),
        ];
        let frame = foot_origin_frame(&feet, [true, true]);
        assert_relative_eq!(frame.yaw(), 0.2, epsilon = 1e-9);
    }

    #[test]
    fn single_support_copies_contact_foot() {
        let feet = [
            Pose::from_xy_theta(0.0, -0.1, 0.1),
            Pose::from_xy_theta(0.2, 0.1, 0.5),
        ];
        let right_only = foot_origin_frame(&feet, [true, false]);
        assert_relative_eq!(right_only.pos, feet[0].pos, epsilon = 1e-12);
        assert_relative_eq!(right_only.yaw(), 0.1, epsilon = 1e-12);

        let left_only = foot_origin_frame(&feet, [false, true]);
        assert_relative_eq!(left_only.pos, feet[1].pos, epsilon = 1e-12);
        assert_relative_eq!(left_only.yaw(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn no_contact_falls_back_to_left() {
        let feet = [
            Pose::from_xy_theta(0.0, -0.1, 0.0),
            Pose::from_xy_theta(0.2, 0.1, 0.0),
        ];
        let frame = foot_origin_frame(&feet, [false, false]);
        assert_relative_eq!(frame.pos, feet[1].pos, epsilon = 1e-12);
    }
}
