//! Blocking service facade for the gait generator.
//!
//! Walking commands arrive on the service thread while the control thread
//! ticks the generator under the same mutex; commands land at tick
//! boundaries. `wait_foot_steps` blocks its caller until the plan has been
//! walked out.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use striders_core::error::ServiceError;
use striders_core::types::Footstep;

use crate::generator::{GaitGenerator, GaitRefs};

const POLL_INTERVAL: Duration = Duration::from_micros(10);

/// Shared handle to a [`GaitGenerator`] for the service thread.
#[derive(Clone)]
pub struct GaitHandle {
    inner: Arc<Mutex<GaitGenerator>>,
}

impl GaitHandle {
    #[must_use]
    pub fn new(generator: GaitGenerator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(generator)),
        }
    }

    /// Advance one control period from the control thread.
    pub fn tick(&self) -> Option<GaitRefs> {
        self.inner.lock().expect("gait mutex poisoned").tick()
    }

    pub fn go_pos(&self, dx: f64, dy: f64, dtheta: f64) -> Result<(), ServiceError> {
        self.inner
            .lock()
            .expect("gait mutex poisoned")
            .go_pos(dx, dy, dtheta)
    }

    pub fn go_velocity(&self, vx: f64, vy: f64, vtheta: f64) -> Result<(), ServiceError> {
        self.inner
            .lock()
            .expect("gait mutex poisoned")
            .go_velocity(vx, vy, vtheta)
    }

    pub fn finalize_velocity_mode(&self) {
        self.inner
            .lock()
            .expect("gait mutex poisoned")
            .finalize_velocity_mode();
    }

    pub fn set_footsteps(&self, steps: Vec<Footstep>) -> Result<(), ServiceError> {
        self.inner
            .lock()
            .expect("gait mutex poisoned")
            .set_footsteps(steps)
    }

    pub fn emergency_stop(&self) {
        self.inner
            .lock()
            .expect("gait mutex poisoned")
            .emergency_stop();
    }

    /// Block until the current footstep plan has been walked out.
    pub fn wait_foot_steps(&self) {
        loop {
            if self.inner.lock().expect("gait mutex poisoned").is_idle() {
                return;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.inner.lock().expect("gait mutex poisoned").is_idle()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
