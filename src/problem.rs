//! Problem definition trait.
//!
//! This module defines the `Problem` trait, which represents a nonlinear
//! least squares problem to be solved with the Levenberg-Marquardt algorithm.
//! The solver only relies on this contract; it never assumes anything else
//! about the problem's internals.

use ndarray::{Array1, Array2};

use crate::error::{LmSvdError, Result};

/// A trait representing a nonlinear least squares problem.
///
/// The problem is borrowed mutably for the duration of a minimization so
/// that it may keep caches, count calls, or raise its failure flag from
/// inside an evaluation.
pub trait Problem {
    /// Get the number of parameters (unknowns) in the problem.
    fn parameter_count(&self) -> usize;

    /// Get the number of residuals in the problem.
    fn residual_count(&self) -> usize;

    /// Evaluate the residuals at the given parameters.
    ///
    /// # Arguments
    ///
    /// * `params` - The parameter values at which to evaluate the residuals
    ///
    /// # Returns
    ///
    /// * A vector of `residual_count()` residuals. Returning an error is
    ///   equivalent to raising the failure flag: the minimizer stops.
    fn eval(&mut self, params: &Array1<f64>) -> Result<Array1<f64>>;

    /// Check if this problem provides an analytic Jacobian.
    fn has_custom_jacobian(&self) -> bool {
        false
    }

    /// Evaluate the `residual_count() x parameter_count()` Jacobian matrix.
    ///
    /// Only called when [`has_custom_jacobian`](Problem::has_custom_jacobian)
    /// returns true.
    fn jacobian(&mut self, _params: &Array1<f64>) -> Result<Array2<f64>> {
        Err(LmSvdError::NotImplemented(
            "this problem does not provide an analytic Jacobian".to_string(),
        ))
    }

    /// Observe an accepted iterate. Called once per accepted point, before the
    /// Jacobian at that point is formed. Raising the failure flag here stops
    /// the run.
    fn trace(&mut self, _iteration: usize, _params: &Array1<f64>, _residuals: &Array1<f64>) {}

    /// Whether the problem has requested that the minimization stop.
    fn failure(&self) -> bool {
        false
    }

    /// Reset the failure flag. The minimizer calls this after it has observed
    /// a raised flag.
    fn clear_failure(&mut self) {}

    /// Evaluate the sum of squared residuals at the given parameters.
    fn eval_cost(&mut self, params: &Array1<f64>) -> Result<f64> {
        let residuals = self.eval(params)?;
        Ok(residuals.iter().map(|r| r.powi(2)).sum())
    }
}
