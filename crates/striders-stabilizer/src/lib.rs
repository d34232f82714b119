// striders-stabilizer: Balance stabilization for a biped — foot-origin
// frame, ZMP estimation, wrench distribution, damping compensation, and the
// stabilizer control loop with its service facade.

pub mod controller;
pub mod damping;
pub mod distributor;
pub mod foot_frame;
pub mod params;
pub mod service;
pub mod transition;
pub mod zmp;

pub mod prelude {
    pub use crate::{
        controller::{Diagnostics, Stabilizer, StabilizerMode, StabilizerOutput},
        damping::{attitude_control, damping_control, vlimit},
        distributor::{distribute, DistributorConfig, RollAssign, WrenchDistribution},
        foot_frame::{foot_origin_frame, projected_frame},
        params::{StAlgorithm, StabilizerParams},
        service::StabilizerHandle,
        transition::TransitionInterpolator,
        zmp::ZmpEstimator,
    };
}
