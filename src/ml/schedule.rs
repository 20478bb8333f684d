// ============================================================
// Layer 5 — Learning-Rate Schedules
// ============================================================
// Learning-rate schedules with linear warmup.
//
// `step` is the number of optimizer updates already applied, so the
// first update uses lr_at(0). With a warmup of W steps:
//
//   step < W        lr = base · step / W
//   W ≤ step ≤ T    decays monotonically to the end value at T
//   step > T        end value

/// A schedule queried once per optimizer step.
pub trait LearningRateSchedule {
    fn lr_at(&self, step: usize) -> f64;

    fn total_steps(&self) -> usize;

    fn warmup_steps(&self) -> usize;
}

/// Number of warmup steps for a fraction of the run (floored).
pub fn warmup_steps_for(total_steps: usize, warmup_proportion: f64) -> usize {
    (total_steps as f64 * warmup_proportion) as usize
}

fn warmup_lr(base_lr: f64, step: usize, warmup: usize) -> f64 {
    base_lr * step as f64 / warmup.max(1) as f64
}

/// Linear warmup, then linear decay to 0 at `total_steps`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearDecayWithWarmup {
    pub base_lr:      f64,
    pub total_steps:  usize,
    pub warmup_steps: usize,
}

impl LinearDecayWithWarmup {
    pub fn new(base_lr: f64, total_steps: usize, warmup_proportion: f64) -> Self {
        Self {
            base_lr,
            total_steps,
            warmup_steps: warmup_steps_for(total_steps, warmup_proportion),
        }
    }
}

impl LearningRateSchedule for LinearDecayWithWarmup {
    fn lr_at(&self, step: usize) -> f64 {
        if step < self.warmup_steps {
            return warmup_lr(self.base_lr, step, self.warmup_steps);
        }
        let remaining = self.total_steps.saturating_sub(step) as f64;
        let span      = self.total_steps.saturating_sub(self.warmup_steps).max(1) as f64;
        self.base_lr * (remaining / span).max(0.0)
    }

    fn total_steps(&self) -> usize {
        self.total_steps
    }

    fn warmup_steps(&self) -> usize {
        self.warmup_steps
    }
}

/// Linear warmup, then polynomial decay from `base_lr` to `lr_end`.
/// `power = 1.0` is a straight line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolyDecayWithWarmup {
    pub base_lr:      f64,
    pub total_steps:  usize,
    pub warmup_steps: usize,
    pub lr_end:       f64,
    pub power:        f64,
}

impl PolyDecayWithWarmup {
    pub fn new(base_lr: f64, total_steps: usize, warmup_steps: usize) -> Self {
        Self {
            base_lr,
            total_steps,
            warmup_steps,
            lr_end: 0.0,
            power:  1.0,
        }
    }

    pub fn with_lr_end(mut self, lr_end: f64) -> Self {
        self.lr_end = lr_end;
        self
    }

    pub fn with_power(mut self, power: f64) -> Self {
        self.power = power;
        self
    }
}

impl LearningRateSchedule for PolyDecayWithWarmup {
    fn lr_at(&self, step: usize) -> f64 {
        if step < self.warmup_steps {
            return warmup_lr(self.base_lr, step, self.warmup_steps);
        }
        if step >= self.total_steps {
            return self.lr_end;
        }
        let decay_steps   = (self.total_steps - self.warmup_steps) as f64;
        let pct_remaining = 1.0 - (step - self.warmup_steps) as f64 / decay_steps;
        (self.base_lr - self.lr_end) * pct_remaining.powf(self.power) + self.lr_end
    }

    fn total_steps(&self) -> usize {
        self.total_steps
    }

    fn warmup_steps(&self) -> usize {
        self.warmup_steps
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn assert_monotone_after_warmup(s: &dyn LearningRateSchedule) {
        let mut prev = s.lr_at(s.warmup_steps());
        for step in s.warmup_steps() + 1..=s.total_steps() + 5 {
            let lr = s.lr_at(step);
            assert!(lr <= prev + EPS, "lr rose at step {step}: {prev} -> {lr}");
            prev = lr;
        }
    }

    #[test]
    fn test_linear_without_warmup_starts_at_base() {
        let s = LinearDecayWithWarmup::new(3e-5, 100, 0.0);
        assert!((s.lr_at(0) - 3e-5).abs() < EPS);
    }

    #[test]
    fn test_linear_warmup_ramps_from_zero() {
        let s = LinearDecayWithWarmup::new(1.0, 100, 0.1);
        assert_eq!(s.warmup_steps, 10);
        assert_eq!(s.lr_at(0), 0.0);
        assert!((s.lr_at(5) - 0.5).abs() < EPS);
        assert!((s.lr_at(10) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_linear_decays_to_zero_at_final_step() {
        let s = LinearDecayWithWarmup::new(1.0, 100, 0.1);
        assert_monotone_after_warmup(&s);
        assert_eq!(s.lr_at(100), 0.0);
        assert_eq!(s.lr_at(250), 0.0);
        assert!((s.lr_at(55) - 0.5).abs() < EPS);
    }

    #[test]
    fn test_poly_power_one_is_linear_to_end_value() {
        let s = PolyDecayWithWarmup::new(1.0, 20, 0).with_lr_end(0.1);
        assert!((s.lr_at(0) - 1.0).abs() < EPS);
        assert!((s.lr_at(10) - 0.55).abs() < EPS);
        assert!((s.lr_at(20) - 0.1).abs() < EPS);
        assert!((s.lr_at(30) - 0.1).abs() < EPS);
        assert_monotone_after_warmup(&s);
    }

    #[test]
    fn test_poly_with_warmup_and_power() {
        let s = PolyDecayWithWarmup::new(2.0, 40, 8).with_power(2.0);
        assert_eq!(s.lr_at(0), 0.0);
        assert!((s.lr_at(4) - 1.0).abs() < EPS);
        assert!((s.lr_at(8) - 2.0).abs() < EPS);
        assert_monotone_after_warmup(&s);
        assert_eq!(s.lr_at(40), 0.0);
    }

    #[test]
    fn test_degenerate_schedules_do_not_divide_by_zero() {
        let s = LinearDecayWithWarmup::new(1.0, 0, 0.5);
        assert_eq!(s.lr_at(0), 0.0);

        let s = PolyDecayWithWarmup::new(1.0, 5, 5);
        assert!(s.lr_at(5).is_finite());
        assert!(s.lr_at(4).is_finite());
    }

    #[test]
    fn test_warmup_steps_are_floored() {
        assert_eq!(warmup_steps_for(99, 0.1), 9);
        assert_eq!(warmup_steps_for(10, 0.0), 0);
    }
}
