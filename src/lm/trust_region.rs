//! Damping control for the Levenberg-Marquardt algorithm.
//!
//! The damping parameter `mu` follows Nielsen's strategy: after an accepted
//! step it shrinks smoothly according to how well the linear model predicted
//! the reduction, after a rejected step it grows by a factor that itself
//! doubles on every consecutive rejection.

/// Nielsen damping controller.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustRegion {
    /// Current value of the damping parameter
    pub mu: f64,

    /// Growth factor applied on the next rejection
    pub nu: f64,
}

impl TrustRegion {
    /// Start from `tau` times the largest squared singular value of the
    /// scaled Jacobian. A zero Jacobian starts from `tau` itself.
    pub fn new(tau: f64, max_singular_value: f64) -> Self {
        let largest = max_singular_value * max_singular_value;
        let mu = if largest > 0.0 { tau * largest } else { tau };
        Self { mu, nu: 2.0 }
    }

    /// Update the damping after a trial step with gain ratio `rho`.
    ///
    /// # Returns
    ///
    /// * `true` if the step should be accepted
    pub fn update(&mut self, rho: f64) -> bool {
        if rho > 0.0 {
            let shrink = 1.0 - (2.0 * rho - 1.0).powi(3);
            self.mu *= shrink.max(1.0 / 3.0);
            self.nu = 2.0;
            true
        } else {
            self.mu *= self.nu;
            self.nu *= 2.0;
            false
        }
    }

    /// Calculates the gain ratio between actual and predicted reduction.
    ///
    /// Both reductions are taken relative to the current sum of squares. A
    /// non-positive prediction gives a ratio of zero.
    pub fn gain_ratio(actual_reduction: f64, predicted_reduction: f64) -> f64 {
        if predicted_reduction > 0.0 {
            actual_reduction / predicted_reduction
        } else {
            0.0
        }
    }
}
