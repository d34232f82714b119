// striders-gait: Walking pattern generation for a biped — preview ZMP
// filter, footstep planning, reference-ZMP stream, swing trajectories, and
// the per-tick gait generator.

pub mod footstep;
pub mod generator;
pub mod preview;
pub mod refzmp;
pub mod service;
pub mod swing;

pub mod prelude {
    pub use crate::{
        footstep::FootstepParams,
        generator::{EmergencyPhase, GaitConfig, GaitGenerator, GaitRefs, VelocityPhase},
        preview::{PreviewConfig, PreviewFilter},
        refzmp::RefZmpGenerator,
        service::GaitHandle,
        swing::{DelayedMinJerk, SwingGenerator, SwingOrbit},
    };
}
