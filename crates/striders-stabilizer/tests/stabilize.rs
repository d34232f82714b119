//! Stabilizer mode-machine and loop scenarios on the sample biped.

use nalgebra::Vector3;
use striders_core::config::ControlConfig;
use striders_core::types::{RefSamples, SensorSamples, Wrench};
use striders_model::biped::SampleBiped;
use striders_model::model::BodyModel;
use striders_stabilizer::controller::{Stabilizer, StabilizerMode};
use striders_stabilizer::params::StAlgorithm;

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

const DT: f64 = 0.005;
/// Ticks in one 2 s mode transition.
const TRANSITION_TICKS: usize = 400;

struct StHarness {
    st: Stabilizer<SampleBiped>,
    sensors: SensorSamples,
    refs: RefSamples,
}

fn standing_harness() -> StHarness {
    let config = ControlConfig {
        dt: DT,
        end_effectors: "rleg,RLEG_ANKLE_R,WAIST,0.0,0.0,-0.07,0,0,1,0.0,\
                        lleg,LLEG_ANKLE_R,WAIST,0.0,0.0,-0.07,0,0,1,0.0"
            .into(),
        ..ControlConfig::default()
    };
    let ee = config.parse_end_effectors().unwrap();
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
    StHarness {
        st: Stabilizer::new(model, DT, &ee),
        sensors,
        refs,
    }
}

impl StHarness {
    /// Tick until the force filter has settled on the current wrenches.
    fn warm_up(&mut self) {
        for _ in 0..100 {
            self.st.tick(&self.sensors, &self.refs);
        }
    }

    fn set_foot_fz(&mut self, fz: f64) {
        self.sensors.foot_wrench = [
            Wrench::new(Vector3::new(0.0, 0.0, fz), Vector3::zeros()),
            Wrench::new(Vector3::new(0.0, 0.0, fz), Vector3::zeros()),
        ];
    }
}

// ---------------------------------------------------------------------------
// Cold start (mode machine + residual)
// ---------------------------------------------------------------------------

#[test]
fn cold_start_ramps_smoothly_into_st() {
    let mut h = standing_harness();
    h.warm_up();
    assert_eq!(h.st.mode(), StabilizerMode::Idle);
    assert!(h.st.on_ground());

    h.st.start();
    assert_eq!(h.st.mode(), StabilizerMode::SyncToSt);

    let mut prev_ratio = 0.0;
    for _ in 0..TRANSITION_TICKS {
        h.st.tick(&h.sensors, &h.refs);
        let ratio = h.st.transition_ratio();
        assert!(
            ratio >= prev_ratio - 1e-12,
            "transition ratio reversed: {prev_ratio} -> {ratio}"
        );
        assert!((0.0..=1.0).contains(&ratio));
        prev_ratio = ratio;
    }
    assert_eq!(h.st.mode(), StabilizerMode::St);
    assert!((h.st.transition_ratio() - 1.0).abs() < 1e-9);

    // undisturbed: the command barely deviates from the reference
    let out = h.st.tick(&h.sensors, &h.refs);
    let residual: f64 = out
        .q
        .iter()
        .zip(&h.refs.joint_angles)
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f64>()
        .sqrt();
    assert!(residual < 1e-3, "undisturbed residual {residual}");
}

#[test]
fn start_in_the_air_goes_to_air_mode() {
    let mut h = standing_harness();
    h.set_foot_fz(5.0);
    h.warm_up();
    assert!(!h.st.on_ground());

    h.st.start();
    assert_eq!(h.st.mode(), StabilizerMode::Air);

    // touchdown while in air mode resumes the start sequence
    h.set_foot_fz(270.0);
    for _ in 0..50 {
        h.st.tick(&h.sensors, &h.refs);
    }
    assert!(matches!(
        h.st.mode(),
        StabilizerMode::SyncToSt | StabilizerMode::St
    ));
}

// ---------------------------------------------------------------------------
// Ground loss (S5)
// ---------------------------------------------------------------------------

#[test]
fn ground_loss_in_st_transitions_to_air() {
    let mut h = standing_harness();
    h.warm_up();
    h.st.start();
    for _ in 0..TRANSITION_TICKS + 10 {
        h.st.tick(&h.sensors, &h.refs);
    }
    assert_eq!(h.st.mode(), StabilizerMode::St);

    // both feet unload to 10 N
    h.set_foot_fz(10.0);
    let mut saw_sync_to_air = false;
    for _ in 0..TRANSITION_TICKS + 50 {
        h.st.tick(&h.sensors, &h.refs);
        if h.st.mode() == StabilizerMode::SyncToAir {
            saw_sync_to_air = true;
        }
    }
    assert!(saw_sync_to_air, "never passed through SyncToAir");
    assert_eq!(h.st.mode(), StabilizerMode::Air);
    assert!(!h.st.on_ground());
}

// ---------------------------------------------------------------------------
// Stop
// ---------------------------------------------------------------------------

#[test]
fn stop_fades_back_to_idle() {
    let mut h = standing_harness();
    h.warm_up();
    h.st.start();
    for _ in 0..TRANSITION_TICKS + 10 {
        h.st.tick(&h.sensors, &h.refs);
    }
    assert_eq!(h.st.mode(), StabilizerMode::St);

    h.st.stop();
    assert_eq!(h.st.mode(), StabilizerMode::SyncToIdle);
    let mut prev_ratio = h.st.transition_ratio();
    for _ in 0..TRANSITION_TICKS + 10 {
        h.st.tick(&h.sensors, &h.refs);
        let ratio = h.st.transition_ratio();
        assert!(ratio <= prev_ratio + 1e-12, "stop ratio increased");
        prev_ratio = ratio;
    }
    assert_eq!(h.st.mode(), StabilizerMode::Idle);
    assert!(h.st.transition_ratio().abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// Parameter service (S6)
// ---------------------------------------------------------------------------

#[test]
fn algorithm_switch_rejected_outside_idle() {
    let mut h = standing_harness();
    h.warm_up();
    h.st.start();
    for _ in 0..TRANSITION_TICKS + 10 {
        h.st.tick(&h.sensors, &h.refs);
    }
    assert_eq!(h.st.mode(), StabilizerMode::St);

    let mut params = h.st.get_parameter();
    assert_eq!(params.st_algorithm, StAlgorithm::Tpcc);
    params.st_algorithm = StAlgorithm::Eefm;
    params.eefm_leg_front_margin = 0.04;
    h.st.set_parameter(&params);

    let back = h.st.get_parameter();
    // algorithm unchanged, other fields applied
    assert_eq!(back.st_algorithm, StAlgorithm::Tpcc);
    assert!((back.eefm_leg_front_margin - 0.04).abs() < 1e-12);
}

#[test]
fn algorithm_switch_allowed_at_idle() {
    let mut h = standing_harness();
    let mut params = h.st.get_parameter();
    params.st_algorithm = StAlgorithm::Eefm;
    h.st.set_parameter(&params);
    assert_eq!(h.st.get_parameter().st_algorithm, StAlgorithm::Eefm);
}

// ---------------------------------------------------------------------------
// EEFM loop sanity
// ---------------------------------------------------------------------------

#[test]
fn eefm_standing_distributes_weight_evenly() {
    let mut h = standing_harness();
    let mut params = h.st.get_parameter();
    params.st_algorithm = StAlgorithm::Eefm;
    h.st.set_parameter(&params);

    h.warm_up();
    h.st.start();
    let mut out = None;
    for _ in 0..TRANSITION_TICKS + 50 {
        out = Some(h.st.tick(&h.sensors, &h.refs));
    }
    assert_eq!(h.st.mode(), StabilizerMode::St);

    let diag = out.unwrap().diagnostics;
    let total = diag.ref_wrench[0].force.z + diag.ref_wrench[1].force.z;
    let weight = 9.8 * 54.0; // sample biped total mass
    assert!(
        (total - weight).abs() < 1.0,
        "distributed weight {total} vs {weight}"
    );
    // symmetric stance: close to an even split
    assert!((diag.ref_wrench[0].force.z - diag.ref_wrench[1].force.z).abs() < 0.2 * weight);
    // foot compensation stays inside its published bounds
    for comp in diag.foot_comp_rpy {
        assert!(comp[0].abs() <= 10.0f64.to_radians() + 1e-12);
        assert!(comp[1].abs() <= 10.0f64.to_radians() + 1e-12);
    }
    assert!(diag.foot_comp_z[0].abs() <= 0.025 + 1e-12);
}

#[test]
fn eefm_disturbance_produces_foot_compensation() {
    let mut h = standing_harness();
    let mut params = h.st.get_parameter();
    params.st_algorithm = StAlgorithm::Eefm;
    h.st.set_parameter(&params);

    h.warm_up();
    h.st.start();
    for _ in 0..TRANSITION_TICKS + 10 {
        h.st.tick(&h.sensors, &h.refs);
    }

    // sustained ankle pitch torque on the right foot
    h.sensors.foot_wrench[0].moment.y = 8.0;
    let mut out = None;
    for _ in 0..200 {
        out = Some(h.st.tick(&h.sensors, &h.refs));
    }
    let diag = out.unwrap().diagnostics;
    assert!(
        diag.foot_comp_rpy[0][1].abs() > 1e-5,
        "pitch compensation did not engage: {}",
        diag.foot_comp_rpy[0][1]
    );
    assert!(diag.foot_comp_rpy[0][1].abs() <= 10.0f64.to_radians() + 1e-12);
}

// ---------------------------------------------------------------------------
// Joint-count mismatch
// ---------------------------------------------------------------------------

#[test]
fn joint_count_mismatch_passes_reference_through() {
    let mut h = standing_harness();
    h.warm_up();
    let short_refs = RefSamples {
        joint_angles: vec![0.0; 5],
        ..h.refs.clone()
    };
    let out = h.st.tick(&h.sensors.clone(), &short_refs);
    assert_eq!(out.q.len(), 5);
    // the controller keeps running afterwards
    let out = h.st.tick(&h.sensors, &h.refs);
    assert_eq!(out.q.len(), 12);
}
