//! Blocking service facade.
//!
//! Service calls arrive on a different thread than the control loop. Both
//! sides share one mutex: the control thread holds it for the whole tick, so
//! a service request takes effect at the next tick boundary. `start` and
//! `stop` block their caller until the mode machine reaches steady state,
//! polling between ticks.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use striders_core::types::{RefSamples, SensorSamples};
use striders_model::model::BodyModel;

use crate::controller::{Stabilizer, StabilizerMode, StabilizerOutput};
use crate::params::StabilizerParams;

const POLL_INTERVAL: Duration = Duration::from_micros(10);

/// Shared handle to a [`Stabilizer`] for the service thread.
pub struct StabilizerHandle<M: BodyModel> {
    inner: Arc<Mutex<Stabilizer<M>>>,
}

impl<M: BodyModel> Clone for StabilizerHandle<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: BodyModel> StabilizerHandle<M> {
    #[must_use]
    pub fn new(stabilizer: Stabilizer<M>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(stabilizer)),
        }
    }

    /// Run one control period. Called from the control thread; holds the
    /// mutex for the whole tick.
    pub fn tick(&self, sensors: &SensorSamples, refs: &RefSamples) -> StabilizerOutput {
        self.inner
            .lock()
            .expect("stabilizer mutex poisoned")
            .tick(sensors, refs)
    }

    #[must_use]
    pub fn mode(&self) -> StabilizerMode {
        self.inner.lock().expect("stabilizer mutex poisoned").mode()
    }

    /// Request stabilization and block until the mode machine settles in
    /// `St` or `Air`. Idempotent.
    pub fn start(&self) {
        self.inner
            .lock()
            .expect("stabilizer mutex poisoned")
            .start();
        self.wait_for(|mode| matches!(mode, StabilizerMode::St | StabilizerMode::Air));
    }

    /// Request release and block until idle. Idempotent.
    pub fn stop(&self) {
        self.inner.lock().expect("stabilizer mutex poisoned").stop();
        self.wait_for(|mode| {
            matches!(
                mode,
                StabilizerMode::Idle | StabilizerMode::St | StabilizerMode::Air
            )
        });
    }

    #[must_use]
    pub fn get_parameter(&self) -> StabilizerParams {
        self.inner
            .lock()
            .expect("stabilizer mutex poisoned")
            .get_parameter()
    }

    pub fn set_parameter(&self, params: &StabilizerParams) {
        self.inner
            .lock()
            .expect("stabilizer mutex poisoned")
            .set_parameter(params);
    }

    fn wait_for(&self, settled: impl Fn(StabilizerMode) -> bool) {
        loop {
            let mode = self.inner.lock().expect("stabilizer mutex poisoned").mode();
            if settled(mode) {
                return;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
