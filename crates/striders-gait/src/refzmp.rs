//! Reference-ZMP stream.
//!
//! Turns a footstep plan into one ZMP sample per control tick: during single
//! support the ZMP sits on the support foot (center plus a per-leg offset),
//! and across each step boundary it blends linearly over the double-support
//! window centered on the boundary.
//!
//! The sample cursor runs ahead of the swing-leg cursor by the preview
//! horizon; anchors can be appended while the stream is being consumed
//! (velocity mode keeps topping the plan up).

use nalgebra::Vector3;

use striders_core::transform::Pose;
use striders_core::types::{FootstepPlan, LegSide};

/// Per-step ZMP anchors plus a sample cursor.
#[derive(Debug, Clone, Default)]
pub struct RefZmpGenerator {
    /// Default ZMP offset from the foot center, per leg (right = 0, left = 1),
    /// expressed in the foot frame.
    zmp_offsets: [Vector3<f64>; 2],
    /// One anchor per step, plus a trailing anchor closing the final blend.
    anchors: Vec<Vector3<f64>>,
    /// Step the cursor is in.
    fs_index: usize,
    /// Sample inside the current step.
    sample_index: usize,
}

impl RefZmpGenerator {
    #[must_use]
    pub fn new(zmp_offsets: [Vector3<f64>; 2]) -> Self {
        Self {
            zmp_offsets,
            ..Self::default()
        }
    }

    pub fn set_zmp_offsets(&mut self, offsets: [Vector3<f64>; 2]) {
        self.zmp_offsets = offsets;
    }

    /// ZMP anchor over one foot placement.
    fn foot_anchor(&self, leg: LegSide, pose: &Pose) -> Vector3<f64> {
        let mut p = pose.transform_point(&self.zmp_offsets[leg.index()]);
        p.z = pose.pos.z;
        p
    }

    /// Rebuild the anchor list from a plan.
    ///
    /// Step 0 is the initial standing double support over the midpoint of the
    /// two initial placements (`initial_swing` is the foot that is not
    /// `plan[0]`); step `i >= 1` stands on `plan[i-1]`; a trailing anchor at
    /// the midpoint of the last two placements closes the final blend.
    ///
    /// The cursor is preserved, so velocity-mode appends and emergency
    /// truncation can regenerate the tail mid-stream.
    pub fn rebuild_anchors(&mut self, plan: &FootstepPlan, initial_swing: (LegSide, Pose)) {
        self.anchors.clear();
        if plan.is_empty() {
            return;
        }
        let first = plan.get(0).unwrap();
        let initial_mid = 0.5
            * (self.foot_anchor(first.leg, &first.pose)
                + self.foot_anchor(initial_swing.0, &initial_swing.1));
        self.anchors.push(initial_mid);
        for i in 1..plan.len() {
            let support = plan.get(i - 1).unwrap();
            self.anchors.push(self.foot_anchor(support.leg, &support.pose));
        }
        if plan.len() >= 2 {
            let a = plan.get(plan.len() - 1).unwrap();
            let b = plan.get(plan.len() - 2).unwrap();
            self.anchors.push(
                0.5 * (self.foot_anchor(a.leg, &a.pose) + self.foot_anchor(b.leg, &b.pose)),
            );
        } else {
            self.anchors.push(initial_mid);
        }
    }

    /// Rebuild anchors and rewind the cursor to the stream start.
    pub fn reset(&mut self, plan: &FootstepPlan, initial_swing: (LegSide, Pose)) {
        self.fs_index = 0;
        self.sample_index = 0;
        self.rebuild_anchors(plan, initial_swing);
    }

    /// Truncate queued anchors beyond `len` steps (plan overwrite). Never
    /// removes the step the cursor is in.
    pub fn remove_over(&mut self, len: usize) {
        self.anchors.truncate(len.max(self.fs_index + 1));
    }

    /// Number of steps with anchors remaining at or after the cursor.
    #[must_use]
    pub fn remaining_steps(&self) -> usize {
        self.anchors.len().saturating_sub(self.fs_index + 1)
    }

    /// Step index the cursor is in.
    #[must_use]
    pub const fn fs_index(&self) -> usize {
        self.fs_index
    }

    /// Produce the reference ZMP for the current tick and advance the
    /// cursor, wrapping into the next step every `step_samples` samples.
    /// Returns `None` once the anchor list is exhausted; the caller pads
    /// with the last emitted value.
    #[allow(clippy::cast_precision_loss)]
    pub fn update(
        &mut self,
        double_support_ratio: f64,
        step_samples: usize,
    ) -> Option<Vector3<f64>> {
        if self.fs_index + 1 >= self.anchors.len() {
            return None;
        }
        let anchor = self.anchors[self.fs_index];
        let half_ds = 0.5 * double_support_ratio * step_samples as f64;
        let ds_len = double_support_ratio * step_samples as f64;
        let t = self.sample_index as f64;

        let zmp = if t < half_ds && ds_len > 0.0 {
            // trailing half of the blend across the previous boundary
            let prev = if self.fs_index == 0 {
                anchor
            } else {
                self.anchors[self.fs_index - 1]
            };
            let r = 0.5 + t / ds_len;
            prev.lerp(&anchor, r)
        } else if t >= step_samples as f64 - half_ds && ds_len > 0.0 {
            // leading half of the blend across the next boundary
            let next = self.anchors[self.fs_index + 1];
            let r = (t - (step_samples as f64 - half_ds)) / ds_len;
            anchor.lerp(&next, r)
        } else {
            anchor
        };

        self.sample_index += 1;
        if self.sample_index >= step_samples {
            self.sample_index = 0;
            self.fs_index += 1;
        }
        Some(zmp)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use striders_core::types::Footstep;

    fn two_step_plan() -> (FootstepPlan, (LegSide, Pose)) {
        // initial support left at (0, 0.1); right swings to (0.2, -0.1);
        // left closes to (0.2, 0.1)
        let mut plan = FootstepPlan::new();
        plan.push(Footstep::new(
            LegSide::Left,
            Pose::from_xy_theta(0.0, 0.1, 0.0),
        ));
        plan.push(Footstep::new(
            LegSide::Right,
            Pose::from_xy_theta(0.2, -0.1, 0.0),
        ));
        plan.push(Footstep::new(
            LegSide::Left,
            Pose::from_xy_theta(0.2, 0.1, 0.0),
        ));
        let initial_swing = (LegSide::Right, Pose::from_xy_theta(0.0, -0.1, 0.0));
        (plan, initial_swing)
    }

    fn generator() -> RefZmpGenerator {
        RefZmpGenerator::new([Vector3::zeros(), Vector3::zeros()])
    }

    #[test]
    fn initial_standing_zmp_at_midfoot() {
        let (plan, swing) = two_step_plan();
        let mut gen = generator();
        gen.reset(&plan, swing);
        let zmp = gen.update(0.2, 100).unwrap();
        assert_relative_eq!(zmp.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(zmp.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn single_support_zmp_on_support_foot() {
        let (plan, swing) = two_step_plan();
        let mut gen = generator();
        gen.reset(&plan, swing);
        // consume step 0, then half of step 1
        for _ in 0..150 {
            gen.update(0.2, 100).unwrap();
        }
        let zmp = gen.update(0.2, 100).unwrap();
        // support during step 1 is the initial left foot
        assert_relative_eq!(zmp.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(zmp.y, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn stream_is_continuous() {
        let (plan, swing) = two_step_plan();
        let mut gen = generator();
        gen.reset(&plan, swing);
        let mut samples = Vec::new();
        while let Some(z) = gen.update(0.2, 100) {
            samples.push(z.y);
        }
        assert_eq!(samples.len(), 300);
        // largest anchor gap is 0.2 over a 20-sample blend
        let max_step = 0.2 / 20.0;
        for pair in samples.windows(2) {
            assert!(
                (pair[1] - pair[0]).abs() <= max_step + 1e-9,
                "discontinuity {} -> {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn blend_centered_on_boundary() {
        let (plan, swing) = two_step_plan();
        let mut gen = generator();
        gen.reset(&plan, swing);
        let mut last = Vector3::zeros();
        for _ in 0..100 {
            last = gen.update(0.2, 100).unwrap();
        }
        let first = gen.update(0.2, 100).unwrap();
        // step 0 anchor y = 0.0, step 1 anchor y = 0.1; halfway is 0.05
        assert!(last.y < 0.05);
        assert!(first.y >= 0.05);
        assert!((first.y - last.y).abs() < 0.01);
    }

    #[test]
    fn final_blend_settles_on_last_midfoot() {
        let (plan, swing) = two_step_plan();
        let mut gen = generator();
        gen.reset(&plan, swing);
        let mut last = Vector3::zeros();
        while let Some(z) = gen.update(0.2, 100) {
            last = z;
        }
        // trailing anchor is the midpoint of the final placements
        assert_relative_eq!(last.x, 0.2, epsilon = 0.01);
        assert!(last.y.abs() < 0.06);
    }

    #[test]
    fn zmp_offsets_shift_anchor() {
        let (plan, swing) = two_step_plan();
        let mut gen = RefZmpGenerator::new([
            Vector3::new(0.02, 0.0, 0.0),
            Vector3::new(0.02, 0.0, 0.0),
        ]);
        gen.reset(&plan, swing);
        for _ in 0..150 {
            gen.update(0.2, 100).unwrap();
        }
        let zmp = gen.update(0.2, 100).unwrap();
        assert_relative_eq!(zmp.x, 0.02, epsilon = 1e-12);
    }

    #[test]
    fn exhausted_anchor_list_returns_none() {
        let (plan, swing) = two_step_plan();
        let mut gen = generator();
        gen.reset(&plan, swing);
        for _ in 0..300 {
            assert!(gen.update(0.2, 100).is_some());
        }
        assert!(gen.update(0.2, 100).is_none());
    }

    #[test]
    fn remove_over_truncates_future_anchors() {
        let (plan, swing) = two_step_plan();
        let mut gen = generator();
        gen.reset(&plan, swing);
        assert_eq!(gen.remaining_steps(), 3);
        gen.remove_over(2);
        assert_eq!(gen.remaining_steps(), 1);
    }

    #[test]
    fn rebuild_preserves_cursor() {
        let (mut plan, swing) = two_step_plan();
        let mut gen = generator();
        gen.reset(&plan, swing);
        for _ in 0..150 {
            gen.update(0.2, 100).unwrap();
        }
        assert_eq!(gen.fs_index(), 1);
        // extend the plan and rebuild; the cursor stays mid-stream
        plan.push(Footstep::new(
            LegSide::Right,
            Pose::from_xy_theta(0.4, -0.1, 0.0),
        ));
        gen.rebuild_anchors(&plan, swing);
        assert_eq!(gen.fs_index(), 1);
        assert_eq!(gen.remaining_steps(), 3);
        let zmp = gen.update(0.2, 100).unwrap();
        assert_relative_eq!(zmp.y, 0.1, epsilon = 1e-12);
    }
}
