//! Configuration options for the Levenberg-Marquardt algorithm.
//!
//! The defaults are the classic ones for dense least-squares fitting: the
//! residual tolerance and the finite-difference step are both derived from
//! the step tolerance.

use serde::{Deserialize, Serialize};

/// Configuration options for the Levenberg-Marquardt algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LmConfig {
    /// Relative step-size tolerance. Default: 1e-8
    pub x_tolerance: f64,

    /// Relative reduction tolerance for the sum of squares. Default: 0.01 * x_tolerance
    pub f_tolerance: f64,

    /// Tolerance on the cosine between the residual vector and every
    /// Jacobian column. Default: 1e-5
    pub g_tolerance: f64,

    /// Residual evaluation budget. `None` means `400 * n`.
    pub max_evaluations: Option<usize>,

    /// Relative step used for forward-difference Jacobians. Default: 1e-3 * x_tolerance
    pub finite_difference_step: f64,

    /// Initial damping relative to the largest squared singular value of the
    /// scaled Jacobian. Default: 1e-3
    pub initial_damping: f64,

    /// Log every accepted iterate at `info` level instead of `debug`. Default: false
    pub trace: bool,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self::with_x_tolerance(1e-8)
    }
}

impl LmConfig {
    /// Defaults for the given step tolerance, with the residual tolerance and
    /// finite-difference step derived from it.
    pub fn with_x_tolerance(x_tolerance: f64) -> Self {
        Self {
            x_tolerance,
            f_tolerance: 0.01 * x_tolerance,
            g_tolerance: 1e-5,
            max_evaluations: None,
            finite_difference_step: 1e-3 * x_tolerance,
            initial_damping: 1e-3,
            trace: false,
        }
    }

    /// The evaluation budget for a problem with `n` unknowns.
    pub fn evaluation_budget(&self, n: usize) -> usize {
        self.max_evaluations.unwrap_or(400 * n)
    }

    /// Describe the first setting that makes a run impossible, if any.
    pub fn validate(&self) -> Option<String> {
        let tolerances = [
            ("x_tolerance", self.x_tolerance),
            ("f_tolerance", self.f_tolerance),
            ("g_tolerance", self.g_tolerance),
            ("finite_difference_step", self.finite_difference_step),
        ];
        if let Some((name, value)) = tolerances.iter().find(|(_, v)| !(*v >= 0.0)) {
            return Some(format!("{} must be non-negative, got {}", name, value));
        }
        if !(self.initial_damping > 0.0) || !self.initial_damping.is_finite() {
            return Some(format!(
                "initial_damping must be positive, got {}",
                self.initial_damping
            ));
        }
        if self.max_evaluations == Some(0) {
            return Some("max_evaluations must be at least 1".to_string());
        }
        None
    }
}
