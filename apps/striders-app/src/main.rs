//! Minimal headless Striders run.
//!
//! Plans a short forward walk, streams the gait references to completion,
//! then engages the stabilizer on the sample biped and prints loop
//! statistics.

use nalgebra::Vector3;
use striders_core::clock::ControlClock;
use striders_core::config::ControlConfig;
use striders_core::types::{RefSamples, SensorSamples, Wrench};
use striders_gait::generator::{GaitConfig, GaitGenerator};
use striders_model::biped::SampleBiped;
use striders_model::model::BodyModel;
use striders_stabilizer::controller::{Stabilizer, StabilizerMode};

fn main() {
    let config = ControlConfig {
        end_effectors: "rleg,RLEG_ANKLE_R,WAIST,0.0,0.0,-0.07,0,0,1,0.0,\
                        lleg,LLEG_ANKLE_R,WAIST,0.0,0.0,-0.07,0,0,1,0.0"
            .into(),
        ..ControlConfig::default()
    };
    config.validate().expect("control config");

    // Walk 0.3 m forward and stream the pattern to completion.
    let mut gait = GaitGenerator::new(GaitConfig::from_control(&config));
    gait.go_pos(0.3, 0.0, 0.0).expect("gait generator is idle");
    let steps = gait.plan().len();

    let mut clock = ControlClock::new(config.dt);
    let mut final_cog = Vector3::zeros();
    let mut lifted = 0u64;
    while let Some(refs) = gait.tick() {
        clock.tick();
        final_cog = refs.ref_cog;
        if refs.contact_states.iter().any(|c| !c) {
            lifted += 1;
        }
    }
    println!(
        "walk: {steps} footsteps, {} ticks over {:.2} s, {lifted} single-support ticks, \
         final CoM x = {:.4} m",
        clock.ticks(),
        clock.elapsed_secs(),
        final_cog.x
    );

    // Engage the stabilizer on a standing sample biped.
    let ee = config.parse_end_effectors().expect("end effector config");
    let model = SampleBiped::default();
    let q = model.joint_angles().to_vec();
    let root = model.root_pose();
    let half_weight = model.total_mass() * 9.8 / 2.0;

    let sensors = SensorSamples {
        joint_angles: q.clone(),
        body_rpy: Vector3::zeros(),
        foot_wrench: [
            Wrench::new(Vector3::new(0.0, 0.0, half_weight), Vector3::zeros()),
            Wrench::new(Vector3::new(0.0, 0.0, half_weight), Vector3::zeros()),
        ],
    };
    let refs = RefSamples {
        joint_angles: q,
        base_pos: root.pos,
        base_rpy: Vector3::zeros(),
        zmp: root.inverse_transform_point(&Vector3::zeros()),
        contact_states: [true; 2],
        swing_support_time: [0.0; 2],
    };

    let mut st = Stabilizer::new(model, config.dt, &ee);
    for _ in 0..100 {
        st.tick(&sensors, &refs);
    }
    st.start();
    let transition_ticks = (2.0 / config.dt) as usize + 10;
    let mut out = None;
    for _ in 0..transition_ticks {
        out = Some(st.tick(&sensors, &refs));
    }
    let out = out.expect("stabilizer ran");
    let residual: f64 = out
        .q
        .iter()
        .zip(&refs.joint_angles)
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f64>()
        .sqrt();
    println!(
        "stabilizer: mode {:?}, transition ratio {:.2}, residual {residual:.2e}",
        st.mode(),
        st.transition_ratio()
    );
    assert_eq!(st.mode(), StabilizerMode::St);
}
