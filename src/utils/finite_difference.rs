//! Finite difference methods for numerical differentiation.
//!
//! The Jacobian is estimated by forward differences. Residual evaluations go
//! through a caller-supplied closure so the caller keeps control of budgets
//! and abort requests; whatever error the closure returns stops the estimate
//! immediately and is handed back unchanged.

use ndarray::{Array1, Array2};

/// Relative perturbation used for a requested finite-difference step.
///
/// The step is never taken below the square root of machine precision, so
/// a step of zero still yields a usable estimate.
pub fn relative_step(finite_difference_step: f64) -> f64 {
    finite_difference_step.max(f64::EPSILON).sqrt()
}

/// Compute the Jacobian matrix using forward finite differences.
///
/// Column `j` is `(f(x + h_j e_j) - f(x)) / h_j` with `h_j = eps * |x_j|`,
/// or `h_j = eps` when `x_j` is zero, where `eps` comes from
/// [`relative_step`].
///
/// # Arguments
///
/// * `params` - The point at which to differentiate
/// * `residuals` - The residual vector already evaluated at `params`
/// * `finite_difference_step` - The requested relative step
/// * `eval` - Evaluates the residuals at a perturbed point
///
/// # Returns
///
/// * The `m x n` Jacobian, or the first error returned by `eval`
pub fn jacobian<F, E>(
    params: &Array1<f64>,
    residuals: &Array1<f64>,
    finite_difference_step: f64,
    mut eval: F,
) -> Result<Array2<f64>, E>
where
    F: FnMut(&Array1<f64>) -> Result<Array1<f64>, E>,
{
    let eps = relative_step(finite_difference_step);
    let n_params = params.len();
    let n_residuals = residuals.len();

    let mut jac = Array2::zeros((n_residuals, n_params));
    let mut perturbed = params.clone();

    for j in 0..n_params {
        let original = perturbed[j];
        let h = if original == 0.0 {
            eps
        } else {
            eps * original.abs()
        };

        perturbed[j] = original + h;
        let shifted = eval(&perturbed)?;
        perturbed[j] = original;

        let mut column = jac.column_mut(j);
        for i in 0..n_residuals {
            column[i] = (shifted[i] - residuals[i]) / h;
        }
    }

    Ok(jac)
}
