//! Serial-chain sample biped.
//!
//! A 12-DoF biped (two 6-DoF legs hanging from a trunk) with point-mass
//! links. It implements [`BodyModel`] exactly the way the external model
//! loader would, and is what the demo app and the test suites run against.
//!
//! Per-leg joint order, root to ankle:
//! hip yaw (z), hip roll (x), hip pitch (y), knee pitch (y),
//! ankle pitch (y), ankle roll (x).

use nalgebra::{DMatrix, UnitQuaternion, Vector3};

use striders_core::error::ModelError;
use striders_core::transform::Pose;
use striders_core::types::LegSide;

use crate::model::{BodyModel, ForceSensorFrame};

/// One revolute joint in a leg chain.
#[derive(Debug, Clone, Copy)]
struct JointDef {
    /// Fixed translation from the previous joint frame.
    offset: Vector3<f64>,
    /// Rotation axis in the local frame (unit).
    axis: Vector3<f64>,
    /// Point mass attributed to the link that follows this joint.
    mass: f64,
}

/// World frame of one joint after forward kinematics.
#[derive(Debug, Clone, Copy)]
struct JointFrame {
    origin: Vector3<f64>,
    axis: Vector3<f64>,
}

/// Geometry parameters of the sample biped.
#[derive(Debug, Clone, Copy)]
pub struct BipedGeometry {
    /// Lateral hip offset from the root (meters, applied as +/-y).
    pub hip_spacing: f64,
    /// Thigh length (meters).
    pub thigh: f64,
    /// Shank length (meters).
    pub shank: f64,
    /// Force-sensor drop below the ankle joint (meters).
    pub sensor_drop: f64,
    /// Trunk point mass (kg).
    pub trunk_mass: f64,
}

impl Default for BipedGeometry {
    fn default() -> Self {
        Self {
            hip_spacing: 0.1,
            thigh: 0.3,
            shank: 0.3,
            sensor_drop: 0.04,
            trunk_mass: 30.0,
        }
    }
}

/// 12-DoF sample biped with point-mass links.
#[derive(Debug, Clone)]
pub struct SampleBiped {
    geometry: BipedGeometry,
    q: Vec<f64>,
    root: Pose,
    joints: [[JointDef; 6]; 2],
    leg_indices: [[usize; 6]; 2],
    // world frames, valid after update_kinematics
    frames: [[JointFrame; 6]; 2],
    ankle: [Pose; 2],
    com: Vector3<f64>,
    total_mass: f64,
}

impl SampleBiped {
    /// Build the biped standing with straight legs, soles on the ground.
    #[must_use]
    pub fn new(geometry: BipedGeometry) -> Self {
        let leg = |sign: f64| -> [JointDef; 6] {
            [
                // hip yaw, at the hip offset
                JointDef {
                    offset: Vector3::new(0.0, sign * geometry.hip_spacing, 0.0),
                    axis: Vector3::z(),
                    mass: 1.5,
                },
                // hip roll
                JointDef {
                    offset: Vector3::zeros(),
                    axis: Vector3::x(),
                    mass: 1.5,
                },
                // hip pitch, thigh follows
                JointDef {
                    offset: Vector3::zeros(),
                    axis: Vector3::y(),
                    mass: 4.0,
                },
                // knee pitch, shank follows
                JointDef {
                    offset: Vector3::new(0.0, 0.0, -geometry.thigh),
                    axis: Vector3::y(),
                    mass: 3.0,
                },
                // ankle pitch
                JointDef {
                    offset: Vector3::new(0.0, 0.0, -geometry.shank),
                    axis: Vector3::y(),
                    mass: 1.0,
                },
                // ankle roll, foot follows
                JointDef {
                    offset: Vector3::zeros(),
                    axis: Vector3::x(),
                    mass: 1.0,
                },
            ]
        };

        let mut model = Self {
            geometry,
            q: vec![0.0; 12],
            root: Pose::from_translation(Vector3::new(
                0.0,
                0.0,
                geometry.thigh + geometry.shank + geometry.sensor_drop + 0.03,
            )),
            joints: [leg(-1.0), leg(1.0)],
            leg_indices: [[0, 1, 2, 3, 4, 5], [6, 7, 8, 9, 10, 11]],
            frames: [[JointFrame {
                origin: Vector3::zeros(),
                axis: Vector3::z(),
            }; 6]; 2],
            ankle: [Pose::identity(); 2],
            com: Vector3::zeros(),
            total_mass: 0.0,
        };
        model.total_mass = geometry.trunk_mass
            + model.joints.iter().flatten().map(|j| j.mass).sum::<f64>();
        model.update_kinematics();
        model
    }

    /// Geometry the model was built with.
    #[must_use]
    pub const fn geometry(&self) -> &BipedGeometry {
        &self.geometry
    }
}

impl Default for SampleBiped {
    fn default() -> Self {
        Self::new(BipedGeometry::default())
    }
}

impl BodyModel for SampleBiped {
    fn num_joints(&self) -> usize {
        self.q.len()
    }

    fn joint_angles(&self) -> &[f64] {
        &self.q
    }

    fn set_joint_angles(&mut self, q: &[f64]) -> Result<(), ModelError> {
        if q.len() != self.q.len() {
            return Err(ModelError::JointCountMismatch {
                expected: self.q.len(),
                got: q.len(),
            });
        }
        self.q.copy_from_slice(q);
        Ok(())
    }

    fn set_joint_angle(&mut self, index: usize, q: f64) {
        self.q[index] = q;
    }

    fn root_pose(&self) -> Pose {
        self.root
    }

    fn set_root_pose(&mut self, pose: &Pose) {
        self.root = *pose;
    }

    fn update_kinematics(&mut self) {
        let mut weighted = self.root.pos * self.geometry.trunk_mass;
        for leg in 0..2 {
            let mut frame = self.root;
            for (j_idx, j) in self.joints[leg].iter().enumerate() {
                let qi = self.leg_indices[leg][j_idx];
                frame = frame.compose(&Pose::new(
                    j.offset,
                    UnitQuaternion::new(j.axis * self.q[qi]),
                ));
                self.frames[leg][j_idx] = JointFrame {
                    origin: frame.pos,
                    axis: frame.rot * j.axis,
                };
                weighted += frame.pos * j.mass;
            }
            self.ankle[leg] = frame;
        }
        self.com = weighted / self.total_mass;
    }

    fn total_mass(&self) -> f64 {
        self.total_mass
    }

    fn com(&self) -> Vector3<f64> {
        self.com
    }

    fn leg_joints(&self, side: LegSide) -> &[usize] {
        &self.leg_indices[side.index()]
    }

    fn ankle_pose(&self, side: LegSide) -> Pose {
        self.ankle[side.index()]
    }

    fn leg_jacobian(&self, side: LegSide) -> DMatrix<f64> {
        let leg = side.index();
        let ee = self.ankle[leg].pos;
        let mut jac = DMatrix::zeros(6, 6);
        for (col, frame) in self.frames[leg].iter().enumerate() {
            let r = ee - frame.origin;
            let lin = frame.axis.cross(&r);
            for row in 0..3 {
                jac[(row, col)] = lin[row];
                jac[(row + 3, col)] = frame.axis[row];
            }
        }
        jac
    }

    fn force_sensor(&self, side: LegSide) -> ForceSensorFrame {
        ForceSensorFrame {
            side,
            local: Pose::from_translation(Vector3::new(0.0, 0.0, -self.geometry.sensor_drop)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
