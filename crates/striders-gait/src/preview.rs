//! Preview ZMP-to-CoM filter.
//!
//! An extended preview controller on the discrete cart-table model: given a
//! queue of `N` future reference ZMP samples, each [`PreviewFilter::advance`]
//! consumes the queue head and emits the CoM sample for the current tick.
//! The state-feedback gain, integral gain, and preview gain vector are
//! derived once at construction from a discrete Riccati iteration.

use std::collections::VecDeque;

use nalgebra::{Matrix3, Matrix4, RowVector3, Vector3, Vector4};

/// Parameters for the preview gain synthesis.
#[derive(Debug, Clone, Copy)]
pub struct PreviewConfig {
    /// Control period in seconds.
    pub dt: f64,
    /// Preview horizon in seconds. `N = round(horizon / dt)` future samples.
    pub horizon: f64,
    /// Cart-table CoM height in meters.
    pub com_height: f64,
    /// Gravity in m/s^2.
    pub gravity: f64,
    /// Tracking-error weight in the quadratic cost.
    pub q_error: f64,
    /// Control (CoM jerk) weight in the quadratic cost.
    pub r_control: f64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            dt: 0.005,
            horizon: 1.6,
            com_height: 0.6,
            gravity: 9.8,
            q_error: 1.0,
            r_control: 1e-6,
        }
    }
}

/// Per-axis cart-table state: position, velocity, acceleration.
type AxisState = Vector3<f64>;

/// Extended preview controller with integral action.
#[derive(Debug, Clone)]
pub struct PreviewFilter {
    config: PreviewConfig,
    horizon_samples: usize,
    // cart-table discretization
    a: Matrix3<f64>,
    b: Vector3<f64>,
    c: RowVector3<f64>,
    // gains from the Riccati solution
    gain_integral: f64,
    gain_state: Vector3<f64>,
    gain_preview: Vec<f64>,
    // runtime state
    queue: VecDeque<Vector3<f64>>,
    state: [AxisState; 2],
    error_sum: [f64; 2],
}

impl PreviewFilter {
    /// Derive gains and build an empty filter. The caller must seed the queue
    /// with `horizon_samples()` samples before the first `advance`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(config: PreviewConfig) -> Self {
        let dt = config.dt;
        let n = (config.horizon / dt).round() as usize;

        let a = Matrix3::new(
            1.0, dt, dt * dt / 2.0,
            0.0, 1.0, dt,
            0.0, 0.0, 1.0,
        );
        let b = Vector3::new(dt * dt * dt / 6.0, dt * dt / 2.0, dt);
        let c = RowVector3::new(1.0, 0.0, -config.com_height / config.gravity);

        // Augmented servo system: state [error integral; cart-table state].
        let ca = c * a;
        let cb = (c * b)[0];
        let mut a_aug = Matrix4::identity();
        a_aug
            .view_mut((0, 1), (1, 3))
            .copy_from(&ca);
        a_aug.view_mut((1, 1), (3, 3)).copy_from(&a);
        let b_aug = Vector4::new(cb, b[0], b[1], b[2]);
        let mut q_aug = Matrix4::zeros();
        q_aug[(0, 0)] = config.q_error;

        let p = solve_dare(&a_aug, &b_aug, &q_aug, config.r_control);
        let denom = config.r_control + (b_aug.transpose() * p * b_aug)[0];
        let k_row = (b_aug.transpose() * p * a_aug) / denom;
        let gain_integral = k_row[0];
        let gain_state = Vector3::new(k_row[1], k_row[2], k_row[3]);

        // Preview gains: g_1 = Ki, g_j = b'(Ac')^{j-1} P e1 / denom.
        let a_closed = a_aug - b_aug * k_row;
        let e1 = Vector4::new(1.0, 0.0, 0.0, 0.0);
        let mut x = p * e1;
        let mut gain_preview = Vec::with_capacity(n);
        gain_preview.push(gain_integral);
        for _ in 1..n {
            x = a_closed.transpose() * x;
            gain_preview.push((b_aug.transpose() * x)[0] / denom);
        }

        Self {
            config,
            horizon_samples: n,
            a,
            b,
            c,
            gain_integral,
            gain_state,
            gain_preview,
            queue: VecDeque::with_capacity(n),
            state: [AxisState::zeros(); 2],
            error_sum: [0.0; 2],
        }
    }

    /// Preview horizon length in samples.
    #[must_use]
    pub const fn horizon_samples(&self) -> usize {
        self.horizon_samples
    }

    /// Number of queued future samples.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Enqueue one future reference ZMP sample. When the queue is already
    /// full the oldest sample is dropped, keeping the most recent `N`.
    pub fn push(&mut self, ref_zmp: Vector3<f64>) {
        if self.queue.len() == self.horizon_samples {
            self.queue.pop_front();
        }
        self.queue.push_back(ref_zmp);
    }

    /// Reset the CoM state onto `initial_zmp` with zero velocity and
    /// integral, and clear the queue.
    pub fn reset(&mut self, initial_zmp: &Vector3<f64>) {
        for axis in 0..2 {
            self.state[axis] = AxisState::new(initial_zmp[axis], 0.0, 0.0);
            self.error_sum[axis] = 0.0;
        }
        self.queue.clear();
    }

    /// Consume the queue head and return the CoM sample for this tick.
    /// Returns `None` until the queue holds a full horizon.
    pub fn advance(&mut self) -> Option<Vector3<f64>> {
        if self.queue.len() < self.horizon_samples {
            return None;
        }
        let mut cog = Vector3::new(0.0, 0.0, self.config.com_height);
        for axis in 0..2 {
            let x = self.state[axis];
            let e = (self.c * x)[0] - self.queue[0][axis];
            self.error_sum[axis] += e;

            let mut preview = 0.0;
            for (j, g) in self.gain_preview.iter().enumerate() {
                let idx = (j + 1).min(self.horizon_samples - 1);
                preview += g * self.queue[idx][axis];
            }
            let u = -self.gain_integral * self.error_sum[axis]
                - self.gain_state.dot(&x)
                + preview;

            self.state[axis] = self.a * x + self.b * u;
            cog[axis] = self.state[axis][0];
        }
        self.queue.pop_front();
        Some(cog)
    }

    /// ZMP the current state maps to through the cart-table output equation.
    #[must_use]
    pub fn output_zmp(&self) -> Vector3<f64> {
        Vector3::new(
            (self.c * self.state[0])[0],
            (self.c * self.state[1])[0],
            0.0,
        )
    }
}

/// Iterative solution of the discrete algebraic Riccati equation for a
/// single-input system.
fn solve_dare(a: &Matrix4<f64>, b: &Vector4<f64>, q: &Matrix4<f64>, r: f64) -> Matrix4<f64> {
    let mut p = *q;
    for _ in 0..100_000 {
        let denom = r + (b.transpose() * p * b)[0];
        let k = (b.transpose() * p * a) / denom;
        let next = q + a.transpose() * p * a - a.transpose() * p * b * k;
        let delta = (next - p).abs().max();
        p = next;
        if delta < 1e-12 {
            break;
        }
    }
    p
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn test_config() -> PreviewConfig {
        PreviewConfig {
            dt: 0.005,
            horizon: 0.8,
            com_height: 0.6,
            ..PreviewConfig::default()
        }
    }

    #[test]
    fn advance_requires_full_queue() {
        let mut filter = PreviewFilter::new(test_config());
        filter.reset(&Vector3::zeros());
        assert!(filter.advance().is_none());
        for _ in 0..filter.horizon_samples() - 1 {
            filter.push(Vector3::zeros());
        }
        assert!(filter.advance().is_none());
        filter.push(Vector3::zeros());
        assert!(filter.advance().is_some());
    }

    #[test]
    fn push_keeps_most_recent_horizon() {
        let mut filter = PreviewFilter::new(test_config());
        let n = filter.horizon_samples();
        for i in 0..n + 10 {
            filter.push(Vector3::new(i as f64, 0.0, 0.0));
        }
        assert_eq!(filter.queue_len(), n);
    }

    #[test]
    fn constant_zmp_converges_to_zmp() {
        let mut filter = PreviewFilter::new(test_config());
        let target = Vector3::new(0.03, -0.05, 0.0);
        filter.reset(&Vector3::zeros());
        let n = filter.horizon_samples();
        for _ in 0..n {
            filter.push(target);
        }
        let mut cog = Vector3::zeros();
        for _ in 0..5 * n {
            filter.push(target);
            cog = filter.advance().expect("queue seeded");
        }
        assert!((cog.x - target.x).abs() < 1e-3, "x residual {}", cog.x - target.x);
        assert!((cog.y - target.y).abs() < 1e-3, "y residual {}", cog.y - target.y);
        assert_relative_eq!(cog.z, 0.6, epsilon = 1e-12);
    }

    #[test]
    fn reset_reseeds_state() {
        let mut filter = PreviewFilter::new(test_config());
        let start = Vector3::new(0.1, 0.2, 0.0);
        filter.reset(&start);
        let n = filter.horizon_samples();
        for _ in 0..n {
            filter.push(start);
        }
        // Seeded on the reference, the first tick barely moves and the
        // output settles back onto the reference.
        let first = filter.advance().unwrap();
        assert!((first.x - 0.1).abs() < 0.01);
        assert!((first.y - 0.2).abs() < 0.01);
        let mut cog = first;
        for _ in 0..5 * n {
            filter.push(start);
            cog = filter.advance().unwrap();
        }
        assert!((cog.x - 0.1).abs() < 1e-3);
        assert!((cog.y - 0.2).abs() < 1e-3);
    }

    #[test]
    fn step_reference_anticipated_by_preview() {
        // The CoM must start moving toward a future ZMP step before the step
        // itself enters the present.
        let mut filter = PreviewFilter::new(test_config());
        filter.reset(&Vector3::zeros());
        let n = filter.horizon_samples();
        // first half of the horizon at 0, second half at 0.1
        for i in 0..n {
            let x = if i < n / 2 { 0.0 } else { 0.1 };
            filter.push(Vector3::new(x, 0.0, 0.0));
        }
        let mut cog = Vector3::zeros();
        for _ in 0..n / 4 {
            filter.push(Vector3::new(0.1, 0.0, 0.0));
            cog = filter.advance().unwrap();
        }
        assert!(
            cog.x > 1e-5,
            "CoM did not anticipate the upcoming ZMP shift: {}",
            cog.x
        );
    }

    #[test]
    fn gains_are_finite() {
        let filter = PreviewFilter::new(test_config());
        assert!(filter.gain_integral.is_finite());
        assert!(filter.gain_state.iter().all(|g| g.is_finite()));
        assert!(filter.gain_preview.iter().all(|g| g.is_finite()));
        assert_eq!(filter.gain_preview.len(), filter.horizon_samples());
        // Preview influence decays toward the end of the horizon.
        let peak = filter
            .gain_preview
            .iter()
            .fold(0.0f64, |m, g| m.max(g.abs()));
        let tail = filter.gain_preview.last().unwrap().abs();
        assert!(tail < 0.5 * peak, "tail {tail} vs peak {peak}");
    }
}
