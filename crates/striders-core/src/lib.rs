// striders-core: Transforms, types, config, clock, errors for the Striders
// walking controller.

pub mod clock;
pub mod config;
pub mod error;
pub mod transform;
pub mod types;

pub mod prelude {
    pub use crate::{
        clock::ControlClock,
        config::{ControlConfig, EndEffectorFrame},
        error::{ConfigError, ModelError, ServiceError, StridersError},
        transform::{
            mid_pose, rot_times, rotation_difference, rotation_from_matrix, rotation_from_rpy,
            rotation_log, rpy_from_rotation, Pose,
        },
        types::{Footstep, FootstepPlan, LegSide, RefSamples, SensorSamples, Wrench},
    };
}
