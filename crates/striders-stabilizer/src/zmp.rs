//! Actual-ZMP estimation from the foot force/torque sensors.
//!
//! Raw wrenches are rotated into the world, the planar ZMP is computed about
//! the plane `z = z0`, and a low-passed vertical-force sum decides whether
//! the robot is on the ground at all.

use nalgebra::Vector3;

use striders_core::transform::Pose;
use striders_core::types::Wrench;

/// Total filtered vertical force below which the robot counts as airborne.
const ON_GROUND_THRESHOLD: f64 = 50.0;

/// First-order filter weight on the previous vertical-force sample
/// (~5 Hz cutoff at a 5 ms period).
const FZ_FILTER: f64 = 0.85;

/// Force-sensor ZMP estimator with on-ground detection.
#[derive(Debug, Clone, Default)]
pub struct ZmpEstimator {
    filtered_fz: [f64; 2],
    last_zmp: Vector3<f64>,
}

impl ZmpEstimator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Filtered per-foot vertical force (right = 0, left = 1).
    #[must_use]
    pub const fn filtered_fz(&self) -> [f64; 2] {
        self.filtered_fz
    }

    /// Estimate the ZMP on the plane `z = zmp_z` from the two sensors.
    ///
    /// `sensor_pose` is each sensor's world pose; `raw` the wrench in the
    /// sensor frame. Returns the ZMP and the on-ground flag; while airborne
    /// the last grounded ZMP is repeated.
    pub fn update(
        &mut self,
        sensor_pose: &[Pose; 2],
        raw: &[Wrench; 2],
        zmp_z: f64,
    ) -> (Vector3<f64>, bool) {
        let mut num_x = 0.0;
        let mut num_y = 0.0;
        let mut fz_sum = 0.0;
        for i in 0..2 {
            let p = sensor_pose[i].pos;
            let f = sensor_pose[i].rot * raw[i].force;
            let m = sensor_pose[i].rot * raw[i].moment;
            num_x += f.z * p.x - (p.z - zmp_z) * f.x - m.y;
            num_y += f.z * p.y - (p.z - zmp_z) * f.y + m.x;
            fz_sum += f.z;
            self.filtered_fz[i] = FZ_FILTER * self.filtered_fz[i] + (1.0 - FZ_FILTER) * f.z;
        }
        if self.filtered_fz[0] + self.filtered_fz[1] < ON_GROUND_THRESHOLD {
            (self.last_zmp, false)
        } else {
            let zmp = Vector3::new(num_x / fz_sum, num_y / fz_sum, zmp_z);
            self.last_zmp = zmp;
            (zmp, true)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn feet_sensors() -> [Pose; 2] {
        [
            Pose::from_translation(Vector3::new(0.0, -0.1, 0.02)),
            Pose::from_translation(Vector3::new(0.0, 0.1, 0.02)),
        ]
    }

    fn settle(est: &mut ZmpEstimator, sensors: &[Pose; 2], raw: &[Wrench; 2]) -> (Vector3<f64>, bool) {
        let mut out = (Vector3::zeros(), false);
        for _ in 0..100 {
            out = est.update(sensors, raw, 0.0);
        }
        out
    }

    #[test]
    fn symmetric_load_puts_zmp_between_feet() {
        let sensors = feet_sensors();
        let raw = [
            Wrench::new(Vector3::new(0.0, 0.0, 250.0), Vector3::zeros()),
            Wrench::new(Vector3::new(0.0, 0.0, 250.0), Vector3::zeros()),
        ];
        let mut est = ZmpEstimator::new();
        let (zmp, on_ground) = settle(&mut est, &sensors, &raw);
        assert!(on_ground);
        assert_relative_eq!(zmp.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(zmp.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(zmp.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn asymmetric_load_shifts_zmp() {
        let sensors = feet_sensors();
        let raw = [
            Wrench::new(Vector3::new(0.0, 0.0, 400.0), Vector3::zeros()),
            Wrench::new(Vector3::new(0.0, 0.0, 100.0), Vector3::zeros()),
        ];
        let mut est = ZmpEstimator::new();
        let (zmp, on_ground) = settle(&mut est, &sensors, &raw);
        assert!(on_ground);
        // weighted toward the right foot: (400*(-0.1) + 100*(0.1)) / 500
        assert_relative_eq!(zmp.y, -0.06, epsilon = 1e-12);
    }

    #[test]
    fn ankle_moment_shifts_zmp() {
        let sensors = feet_sensors();
        let raw = [
            Wrench::new(Vector3::new(0.0, 0.0, 250.0), Vector3::new(0.0, -5.0, 0.0)),
            Wrench::new(Vector3::new(0.0, 0.0, 250.0), Vector3::new(0.0, -5.0, 0.0)),
        ];
        let mut est = ZmpEstimator::new();
        let (zmp, _) = settle(&mut est, &sensors, &raw);
        // -sum(m_y) / sum(f_z) = 10 / 500
        assert_relative_eq!(zmp.x, 0.02, epsilon = 1e-12);
    }

    #[test]
    fn light_contact_reports_airborne() {
        let sensors = feet_sensors();
        let raw = [
            Wrench::new(Vector3::new(0.0, 0.0, 10.0), Vector3::zeros()),
            Wrench::new(Vector3::new(0.0, 0.0, 10.0), Vector3::zeros()),
        ];
        let mut est = ZmpEstimator::new();
        let mut on_ground = true;
        for _ in 0..10 {
            (_, on_ground) = est.update(&sensors, &raw, 0.0);
        }
        assert!(!on_ground, "20 N total should read as airborne");
    }

    #[test]
    fn filter_delays_touchdown_detection() {
        let sensors = feet_sensors();
        let heavy = [
            Wrench::new(Vector3::new(0.0, 0.0, 300.0), Vector3::zeros()),
            Wrench::new(Vector3::new(0.0, 0.0, 300.0), Vector3::zeros()),
        ];
        let mut est = ZmpEstimator::new();
        // first sample: filter has only 15% of the new force
        let (_, first) = est.update(&sensors, &heavy, 0.0);
        assert!(first, "600 N steps the filter past the threshold immediately");

        // from a long airborne stretch, a single spike does not flip the flag
        let mut est = ZmpEstimator::new();
        let zero = [Wrench::default(), Wrench::default()];
        for _ in 0..100 {
            est.update(&sensors, &zero, 0.0);
        }
        let spike = [
            Wrench::new(Vector3::new(0.0, 0.0, 150.0), Vector3::zeros()),
            Wrench::new(Vector3::new(0.0, 0.0, 150.0), Vector3::zeros()),
        ];
        let (_, flagged) = est.update(&sensors, &spike, 0.0);
        assert!(!flagged, "45 N filtered should stay airborne");
    }

    #[test]
    fn airborne_returns_last_grounded_zmp() {
        let sensors = feet_sensors();
        let loaded = [
            Wrench::new(Vector3::new(0.0, 0.0, 400.0), Vector3::zeros()),
            Wrench::new(Vector3::new(0.0, 0.0, 100.0), Vector3::zeros()),
        ];
        let mut est = ZmpEstimator::new();
        let (grounded_zmp, _) = settle(&mut est, &sensors, &loaded);
        let zero = [Wrench::default(), Wrench::default()];
        let mut out = (Vector3::zeros(), true);
        for _ in 0..100 {
            out = est.update(&sensors, &zero, 0.0);
        }
        assert!(!out.1);
        assert_relative_eq!(out.0, grounded_zmp, epsilon = 1e-12);
    }

    #[test]
    fn tilted_sensor_rotates_wrench() {
        // sensor rotated 90 deg about z: raw x-force becomes world y-force
        let rot = striders_core::transform::rotation_from_rpy(0.0, 0.0, std::f64::consts::FRAC_PI_2);
        let sensors = [
            Pose::new(Vector3::new(0.0, -0.1, 0.0), rot),
            Pose::new(Vector3::new(0.0, 0.1, 0.0), rot),
        ];
        let raw = [
            Wrench::new(Vector3::new(0.0, 0.0, 300.0), Vector3::new(-5.0, 0.0, 0.0)),
            Wrench::new(Vector3::new(0.0, 0.0, 300.0), Vector3::new(-5.0, 0.0, 0.0)),
        ];
        let mut est = ZmpEstimator::new();
        let (zmp, _) = settle(&mut est, &sensors, &raw);
        // raw moment (-5, 0, 0) maps to world (0, -5, 0): pushes ZMP forward
        assert_relative_eq!(zmp.x, 10.0 / 600.0, epsilon = 1e-12);
        assert_relative_eq!(zmp.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn filter_value_converges_geometrically() {
        let sensors = feet_sensors();
        let raw = [
            Wrench::new(Vector3::new(0.0, 0.0, 100.0), Vector3::zeros()),
            Wrench::new(Vector3::new(0.0, 0.0, 100.0), Vector3::zeros()),
        ];
        let mut est = ZmpEstimator::new();
        est.update(&sensors, &raw, 0.0);
        assert_relative_eq!(est.filtered_fz()[0], 15.0, epsilon = 1e-12);
        est.update(&sensors, &raw, 0.0);
        assert_relative_eq!(est.filtered_fz()[0], 15.0 * 0.85 + 15.0, epsilon = 1e-12);
    }
}
