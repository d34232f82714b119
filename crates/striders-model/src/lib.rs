// striders-model: Body-model seam, sample biped kinematics, and leg IK.

pub mod biped;
pub mod leg_ik;
pub mod model;

pub mod prelude {
    pub use crate::{
        biped::{BipedGeometry, SampleBiped},
        leg_ik::{LegIkConfig, LegIkSolver},
        model::{BodyModel, ForceSensorFrame},
    };
}
