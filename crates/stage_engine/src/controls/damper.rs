//! Critically damped spring integration
//!
//! Each step evaluates the exact solution of
//! `x'' = w²(goal - x) - 2w·x'` over the elapsed time, so the motion is
//! identical whether a second is covered in one step or in sixty.

use crate::foundation::time::Millis;

/// Default decay time in milliseconds
pub const DECAY_MILLISECONDS: Millis = 50.0;

/// Time after which any motion has certainly settled
pub const SETTLING_TIME: Millis = 10_000.0;

const MIN_DECAY_MILLISECONDS: Millis = 0.001;

/// Steps longer than this many decay times land on the goal outright
const MAX_DECAY_STEPS: f64 = 40.0;

/// Velocity below which a value snaps to its goal, per unit of normalization
/// and natural frequency
const NIL_SPEED_FACTOR: f64 = 0.0002;

/// Frame-rate independent smoother for one scalar
#[derive(Debug, Clone, PartialEq)]
pub struct Damper {
    velocity: f64,
    natural_frequency: f64,
}

impl Default for Damper {
    fn default() -> Self {
        Self::new(DECAY_MILLISECONDS)
    }
}

impl Damper {
    /// Create a damper with the given decay time
    pub fn new(decay_ms: Millis) -> Self {
        let mut damper = Self {
            velocity: 0.0,
            natural_frequency: 0.0,
        };
        damper.set_decay_time(decay_ms);
        damper
    }

    /// Change the decay time
    pub fn set_decay_time(&mut self, decay_ms: Millis) {
        self.natural_frequency = 1.0 / decay_ms.max(MIN_DECAY_MILLISECONDS);
    }

    /// Current velocity in units per millisecond
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Forget any motion in progress
    pub fn reset(&mut self) {
        self.velocity = 0.0;
    }

    /// Advance `x` toward `goal` by `delta_ms`
    ///
    /// `normalization` is the scale of the value's range; it sets the speed
    /// below which the value is considered settled and snaps exactly onto the
    /// goal. A non-positive `delta_ms` returns `x` unchanged; an infinite,
    /// NaN or overly long one lands on the goal with zero velocity.
    pub fn update(&mut self, x: f32, goal: f32, delta_ms: Millis, normalization: f32) -> f32 {
        if normalization == 0.0 || (x == goal && self.velocity == 0.0) {
            self.velocity = 0.0;
            return goal;
        }
        if delta_ms <= 0.0 {
            return x;
        }

        let omega = self.natural_frequency;
        if !delta_ms.is_finite() || omega * delta_ms > MAX_DECAY_STEPS {
            self.velocity = 0.0;
            return goal;
        }
        let nil_speed = NIL_SPEED_FACTOR * omega;

        let delta_x = f64::from(x) - f64::from(goal);
        let intermediate_velocity = self.velocity + omega * delta_x;
        let intermediate_x = delta_x + delta_ms * intermediate_velocity;
        let decay = (-omega * delta_ms).exp();
        let new_velocity = (intermediate_velocity - omega * intermediate_x) * decay;
        let acceleration = -omega * (new_velocity + intermediate_velocity * decay);

        let settled =
            new_velocity.abs() < nil_speed * f64::from(normalization).abs() && acceleration * delta_x >= 0.0;
        let next = (f64::from(goal) + intermediate_x * decay) as f32;
        if settled || !new_velocity.is_finite() || !next.is_finite() {
            self.velocity = 0.0;
            goal
        } else {
            self.velocity = new_velocity;
            next
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_huge_step_lands_exactly_on_goal() {
        let mut damper = Damper::default();
        assert_eq!(damper.update(0.0, 3.5, SETTLING_TIME, 1.0), 3.5);
        assert_eq!(damper.velocity(), 0.0);
    }

    #[test]
    fn test_non_positive_delta_is_a_no_op() {
        let mut damper = Damper::default();
        assert_eq!(damper.update(1.0, 2.0, 0.0, 1.0), 1.0);
        assert_eq!(damper.update(1.0, 2.0, -16.0, 1.0), 1.0);
    }

    #[test]
    fn test_non_finite_delta_lands_on_goal() {
        let mut damper = Damper::default();
        assert_eq!(damper.update(0.0, 1.0, Millis::INFINITY, 1.0), 1.0);
        assert_eq!(damper.velocity(), 0.0);

        damper.update(0.0, 1.0, 16.0, 1.0);
        assert!(damper.velocity() > 0.0);
        assert_eq!(damper.update(0.5, 1.0, Millis::NAN, 1.0), 1.0);
        assert_eq!(damper.velocity(), 0.0);
        assert_eq!(damper.update(0.0, 1.0, Millis::MAX, 1.0), 1.0);
    }

    #[test]
    fn test_nan_value_recovers() {
        let mut damper = Damper::default();
        assert_eq!(damper.update(f32::NAN, 2.0, 16.0, 1.0), 2.0);
        assert_eq!(damper.velocity(), 0.0);
        let next = damper.update(0.0, 2.0, 16.0, 1.0);
        assert!(next.is_finite() && next > 0.0);
    }

    #[test]
    fn test_convergence_is_monotonic() {
        let mut damper = Damper::default();
        let mut x = 0.0;
        for _ in 0..120 {
            let next = damper.update(x, 10.0, 16.6, 10.0);
            assert!(next >= x, "moved backwards: {} -> {}", x, next);
            assert!(next <= 10.0, "overshot: {}", next);
            x = next;
        }
        assert_eq!(x, 10.0);
    }

    #[test]
    fn test_frame_rate_independence() {
        let mut coarse = Damper::default();
        let mut fine = Damper::default();

        let coarse_x = coarse.update(0.0, 1.0, 40.0, 1.0);
        let mut fine_x = 0.0;
        for _ in 0..4 {
            fine_x = fine.update(fine_x, 1.0, 10.0, 1.0);
        }

        assert!((coarse_x - fine_x).abs() < 1.0e-4);
    }

    #[test]
    fn test_decay_time_controls_speed() {
        let mut fast = Damper::new(10.0);
        let mut slow = Damper::new(200.0);
        let fast_x = fast.update(0.0, 1.0, 16.0, 1.0);
        let slow_x = slow.update(0.0, 1.0, 16.0, 1.0);
        assert!(fast_x > slow_x);
    }
}
