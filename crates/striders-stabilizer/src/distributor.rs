//! Reference force/moment distribution between the feet.
//!
//! Given the commanded ZMP and the two sole frames, a scalar `alpha` splits
//! the body weight: inside either foot's support rectangle the weight goes
//! wholly to that foot; otherwise the ZMP is projected onto the closest edge
//! of each rectangle and `alpha` parameterizes the line between those edge
//! points. The net moment about the ZMP is then assigned per axis in a frame
//! spanned by the foot-to-foot line.

use nalgebra::{Matrix3, Vector3};

use striders_core::transform::{rotation_from_matrix, Pose};
use striders_core::types::Wrench;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Which foot takes the roll moment (the component about the foot-to-foot
/// line) in double support when its sign is positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollAssign {
    PositiveToRight,
    PositiveToLeft,
}

/// Support-rectangle margins and distribution options.
#[derive(Debug, Clone, Copy)]
pub struct DistributorConfig {
    /// Lateral margin from the sole frame to the inner foot edge (meters).
    pub inside_margin: f64,
    /// Margin to the toe edge (meters).
    pub front_margin: f64,
    /// Margin to the heel edge (meters).
    pub rear_margin: f64,
    /// Gravity (m/s^2).
    pub gravity: f64,
    /// Double-support roll moment assignment.
    pub roll_assign: RollAssign,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            inside_margin: 0.065,
            front_margin: 0.05,
            rear_margin: 0.05,
            gravity: 9.8,
            roll_assign: RollAssign::PositiveToRight,
        }
    }
}

/// Per-foot reference wrench split (right = 0, left = 1).
#[derive(Debug, Clone, Copy)]
pub struct WrenchDistribution {
    /// Weight fraction on the right foot.
    pub alpha: f64,
    /// Reference wrench per foot, world frame.
    pub wrench: [Wrench; 2],
}

// ---------------------------------------------------------------------------
// Support-rectangle tests
// ---------------------------------------------------------------------------

/// Laterally on the foot side of the inner edge. The outer edge is
/// unbounded: a ZMP outside the stance simply loads that foot fully.
fn is_inside_foot(local_zmp: &Vector3<f64>, is_left: bool, inside_margin: f64) -> bool {
    if is_left {
        local_zmp.y >= -inside_margin
    } else {
        local_zmp.y <= inside_margin
    }
}

fn is_front_of_foot(local_zmp: &Vector3<f64>, front_margin: f64) -> bool {
    local_zmp.x > front_margin
}

fn is_rear_of_foot(local_zmp: &Vector3<f64>, rear_margin: f64) -> bool {
    local_zmp.x < -rear_margin
}

/// Closest point on a foot's support-rectangle boundary to a ZMP outside it,
/// in the foot frame. `inner_sign` is the inner edge's y sign (+ for the
/// right foot, - for the left).
fn edge_point(
    config: &DistributorConfig,
    local_zmp: &Vector3<f64>,
    is_left: bool,
    inner_sign: f64,
) -> Vector3<f64> {
    let inside = is_inside_foot(local_zmp, is_left, config.inside_margin);
    let front = is_front_of_foot(local_zmp, config.front_margin);
    let rear = is_rear_of_foot(local_zmp, config.rear_margin);
    let inner_y = inner_sign * config.inside_margin;
    if inside && front {
        Vector3::new(config.front_margin, local_zmp.y, 0.0)
    } else if !inside && front {
        Vector3::new(config.front_margin, inner_y, 0.0)
    } else if !inside && !front && !rear {
        Vector3::new(local_zmp.x, inner_y, 0.0)
    } else if !inside && rear {
        Vector3::new(-config.rear_margin, inner_y, 0.0)
    } else {
        Vector3::new(-config.rear_margin, local_zmp.y, 0.0)
    }
}

// ---------------------------------------------------------------------------
// Distribution
// ---------------------------------------------------------------------------

/// Split the weight and the net moment about `zmp` between the feet.
///
/// `ee` holds the sole frames in world (right = 0, left = 1).
#[must_use]
pub fn distribute(
    config: &DistributorConfig,
    zmp: &Vector3<f64>,
    ee: &[Pose; 2],
    total_mass: f64,
) -> WrenchDistribution {
    let r_local = ee[0].inverse_transform_point(zmp);
    let l_local = ee[1].inverse_transform_point(zmp);

    let alpha = if is_inside_foot(&l_local, true, config.inside_margin)
        && !is_front_of_foot(&l_local, config.front_margin)
        && !is_rear_of_foot(&l_local, config.rear_margin)
    {
        0.0
    } else if is_inside_foot(&r_local, false, config.inside_margin)
        && !is_front_of_foot(&r_local, config.front_margin)
        && !is_rear_of_foot(&r_local, config.rear_margin)
    {
        1.0
    } else {
        let l_edge = ee[1].transform_point(&edge_point(config, &l_local, true, -1.0));
        let r_edge = ee[0].transform_point(&edge_point(config, &r_local, false, 1.0));
        let diff = r_edge - l_edge;
        (diff.dot(&(zmp - l_edge)) / diff.norm_squared()).clamp(0.0, 1.0)
    };

    let total_fz = config.gravity * total_mass;
    let force = [
        Vector3::new(0.0, 0.0, alpha * total_fz),
        Vector3::new(0.0, 0.0, (1.0 - alpha) * total_fz),
    ];

    let mut tau_0 = Vector3::zeros();
    for i in 0..2 {
        tau_0 -= (ee[i].pos - zmp).cross(&force[i]);
    }

    let moment = if alpha == 0.0 {
        [Vector3::zeros(), -(ee[1].pos - zmp).cross(&force[1])]
    } else if alpha == 1.0 {
        [-(ee[0].pos - zmp).cross(&force[0]), Vector3::zeros()]
    } else {
        // foot-distribution frame: y along right-to-left, x completing it
        let mut ey = ee[1].pos - ee[0].pos;
        ey.z = 0.0;
        let ey = ey.normalize();
        let ex = ey.cross(&Vector3::z());
        let dist_rot =
            rotation_from_matrix(&Matrix3::from_columns(&[ex, ey, Vector3::z()]));
        let tau_f = dist_rot.inverse() * tau_0;

        let (roll_right, roll_left) = match config.roll_assign {
            RollAssign::PositiveToRight => {
                if tau_f.x > 0.0 {
                    (tau_f.x, 0.0)
                } else {
                    (0.0, tau_f.x)
                }
            }
            RollAssign::PositiveToLeft => {
                if tau_f.x > 0.0 {
                    (0.0, tau_f.x)
                } else {
                    (tau_f.x, 0.0)
                }
            }
        };
        [
            dist_rot * Vector3::new(roll_right, tau_f.y * alpha, 0.0),
            dist_rot * Vector3::new(roll_left, tau_f.y * (1.0 - alpha), 0.0),
        ]
    };

    WrenchDistribution {
        alpha,
        wrench: [
            Wrench::new(force[0], moment[0]),
            Wrench::new(force[1], moment[1]),
        ],
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn stance() -> [Pose; 2] {
        [
            Pose::from_xy_theta(0.0, -0.1, 0.0),
            Pose::from_xy_theta(0.0, 0.1, 0.0),
        ]
    }

    #[test]
    fn zmp_inside_left_foot_loads_left() {
        let config = DistributorConfig::default();
        let ee = stance();
        let zmp = ee[1].pos;
        let d = distribute(&config, &zmp, &ee, 50.0);
        assert_relative_eq!(d.alpha, 0.0);
        assert_relative_eq!(d.wrench[0].force.z, 0.0, epsilon = 1e-12);
        assert_relative_eq!(d.wrench[1].force.z, 490.0, epsilon = 1e-12);
        assert_relative_eq!(d.wrench[0].moment.norm(), 0.0, epsilon = 1e-12);
        // ZMP at the sole center: no moment needed
        assert_relative_eq!(d.wrench[1].moment.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn zmp_inside_right_foot_loads_right() {
        let config = DistributorConfig::default();
        let ee = stance();
        let zmp = ee[0].pos + Vector3::new(0.03, 0.0, 0.0);
        let d = distribute(&config, &zmp, &ee, 50.0);
        assert_relative_eq!(d.alpha, 1.0);
        assert_relative_eq!(d.wrench[0].force.z, 490.0, epsilon = 1e-12);
        assert_relative_eq!(d.wrench[1].force.z, 0.0, epsilon = 1e-12);
        // offset ZMP needs an ankle moment on the support foot
        assert!(d.wrench[0].moment.norm() > 1.0);
        assert_relative_eq!(d.wrench[1].moment.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn zmp_between_feet_splits_weight() {
        let config = DistributorConfig::default();
        let ee = stance();
        let d = distribute(&config, &Vector3::zeros(), &ee, 50.0);
        assert_relative_eq!(d.alpha, 0.5, epsilon = 1e-9);
        assert_relative_eq!(d.wrench[0].force.z, 245.0, epsilon = 1e-6);
        assert_relative_eq!(d.wrench[1].force.z, 245.0, epsilon = 1e-6);
    }

    #[test]
    fn alpha_moves_with_lateral_zmp() {
        let config = DistributorConfig::default();
        let ee = stance();
        let toward_right = distribute(&config, &Vector3::new(0.0, -0.02, 0.0), &ee, 50.0);
        let toward_left = distribute(&config, &Vector3::new(0.0, 0.02, 0.0), &ee, 50.0);
        assert!(toward_right.alpha > 0.5);
        assert!(toward_left.alpha < 0.5);
        assert_relative_eq!(
            toward_right.alpha + toward_left.alpha,
            1.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn force_closure_holds() {
        let config = DistributorConfig::default();
        let ee = stance();
        for y in [-0.12, -0.05, 0.0, 0.03, 0.11] {
            for x in [-0.06, 0.0, 0.07] {
                let zmp = Vector3::new(x, y, 0.0);
                let d = distribute(&config, &zmp, &ee, 50.0);
                let f_total = d.wrench[0].force + d.wrench[1].force;
                assert_relative_eq!(f_total, Vector3::new(0.0, 0.0, 490.0), epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn moment_closure_about_zmp() {
        // sum of (ee - zmp) x f + m vanishes for the horizontal axes
        let config = DistributorConfig::default();
        let ee = stance();
        for y in [-0.05, 0.0, 0.04] {
            let zmp = Vector3::new(0.01, y, 0.0);
            let d = distribute(&config, &zmp, &ee, 50.0);
            let mut residual = Vector3::zeros();
            for i in 0..2 {
                residual += (ee[i].pos - zmp).cross(&d.wrench[i].force) + d.wrench[i].moment;
            }
            assert_relative_eq!(residual.x, 0.0, epsilon = 1e-9);
            assert_relative_eq!(residual.y, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn alpha_clamped_outside_stance() {
        let config = DistributorConfig::default();
        let ee = stance();
        // far beyond the left foot
        let d = distribute(&config, &Vector3::new(0.0, 0.4, 0.0), &ee, 50.0);
        assert_relative_eq!(d.alpha, 0.0);
        // far beyond the right foot
        let d = distribute(&config, &Vector3::new(0.0, -0.4, 0.0), &ee, 50.0);
        assert_relative_eq!(d.alpha, 1.0);
    }

    #[test]
    fn pitch_moment_splits_by_alpha() {
        let config = DistributorConfig::default();
        let ee = stance();
        // ZMP ahead of both feet: pure pitch moment in double support
        let zmp = Vector3::new(0.08, 0.0, 0.0);
        let d = distribute(&config, &zmp, &ee, 50.0);
        assert!(d.alpha > 0.0 && d.alpha < 1.0);
        // roll components vanish by symmetry; pitch split matches alpha
        assert_relative_eq!(
            d.wrench[0].moment.y * (1.0 - d.alpha),
            d.wrench[1].moment.y * d.alpha,
            epsilon = 1e-9
        );
        assert_relative_eq!(d.wrench[0].moment.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(d.wrench[1].moment.x, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn roll_assignment_convention_switches() {
        // a lateral ZMP offset leaves a roll moment the weight split alone
        // cannot produce; the convention decides which foot carries it
        let ee = stance();
        let zmp = Vector3::new(0.0, 0.02, 0.0);
        let right_conv = distribute(
            &DistributorConfig {
                roll_assign: RollAssign::PositiveToRight,
                ..DistributorConfig::default()
            },
            &zmp,
            &ee,
            50.0,
        );
        let left_conv = distribute(
            &DistributorConfig {
                roll_assign: RollAssign::PositiveToLeft,
                ..DistributorConfig::default()
            },
            &zmp,
            &ee,
            50.0,
        );
        assert!(right_conv.alpha > 0.0 && right_conv.alpha < 1.0);
        // exactly one foot carries the roll channel under each convention
        let roll_r = right_conv.wrench[0].moment.x;
        let roll_l = right_conv.wrench[1].moment.x;
        assert!(roll_r.abs() < 1e-12 || roll_l.abs() < 1e-12);
        assert!((roll_r + roll_l).abs() > 1.0, "no roll moment to assign");
        assert!(
            (right_conv.wrench[0].moment.x - left_conv.wrench[0].moment.x).abs() > 1.0,
            "conventions produced identical distributions"
        );
    }

    #[test]
    fn edge_projection_prefers_near_edge() {
        let config = DistributorConfig::default();
        // ZMP between the feet, level with the soles
        let local = Vector3::new(0.0, -0.1, 0.0); // left-foot frame, toward the right
        let edge = edge_point(&config, &local, true, -1.0);
        assert_relative_eq!(edge.y, -config.inside_margin, epsilon = 1e-12);
        assert_relative_eq!(edge.x, 0.0, epsilon = 1e-12);

        // ahead and inside: projected to the toe edge
        let local = Vector3::new(0.09, 0.0, 0.0);
        let edge = edge_point(&config, &local, true, -1.0);
        assert_relative_eq!(edge.x, config.front_margin, epsilon = 1e-12);
        assert_relative_eq!(edge.y, 0.0, epsilon = 1e-12);
    }
}
