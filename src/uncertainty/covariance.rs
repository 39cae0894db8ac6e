//! # Covariance Matrix Calculations
//!
//! Functions for estimating parameter covariance from the Jacobian of a
//! least-squares fit. Everything goes through the SVD `J = U W V^T`, so the
//! normal matrix and its pseudo-inverse are formed without ever squaring
//! the condition number of `J`:
//!
//! ```text
//! J^T J     = V diag(W^2) V^T
//! (J^T J)^+ = V diag(1 / W^2) V^T
//! ```

use ndarray::{Array1, Array2};

use crate::error::Result;
use crate::svd::Svd;

/// `V diag(d) V^T` for the right singular vectors of `svd`.
fn symmetric_product(svd: &Svd, d: &Array1<f64>) -> Array2<f64> {
    let v = svd.v();
    let mut scaled = v.clone();
    for (mut col, &dj) in scaled.columns_mut().into_iter().zip(d.iter()) {
        col *= dj;
    }
    scaled.dot(&v.t())
}

/// Relative cut-off below which singular values of an `m x n` Jacobian are
/// treated as zero.
fn rank_tolerance(m: usize, n: usize) -> f64 {
    f64::EPSILON * m.max(n) as f64
}

/// Calculate the normal-equations matrix `J^T J`.
pub fn normal_matrix(jacobian: &Array2<f64>) -> Result<Array2<f64>> {
    let svd = Svd::new(jacobian, 0.0)?;
    let squares = svd.w().mapv(|w| w * w);
    Ok(symmetric_product(&svd, &squares))
}

/// Calculate the covariance matrix from the Jacobian matrix.
///
/// For nonlinear least-squares problems, the covariance matrix is estimated as:
///   covar = redchi * pinv(J^T * J)
/// where:
///   - J is the Jacobian matrix
///   - redchi is the reduced chi-square (chi^2 / dof)
///
/// Directions along which `J` is numerically rank deficient get zero
/// variance instead of an error.
pub fn covariance_from_jacobian(jacobian: &Array2<f64>, redchi: f64) -> Result<Array2<f64>> {
    let (m, n) = jacobian.dim();
    let svd = Svd::new(jacobian, -rank_tolerance(m, n))?;
    let inverse_squares = svd.winverse().mapv(|wi| wi * wi * redchi);
    Ok(symmetric_product(&svd, &inverse_squares))
}

/// Calculate correlation matrix from covariance matrix.
///
/// The correlation matrix is calculated as:
///   correl[i,j] = covar[i,j] / sqrt(covar[i,i] * covar[j,j])
///
/// Diagonal elements are 1.0. Pairs involving a parameter with zero variance
/// are reported as uncorrelated.
pub fn calculate_correlation(covar: &Array2<f64>) -> Array2<f64> {
    let n = covar.nrows();
    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            return 1.0;
        }
        let denom = (covar[[i, i]] * covar[[j, j]]).sqrt();
        if denom > 0.0 {
            covar[[i, j]] / denom
        } else {
            0.0
        }
    })
}

/// Extract standard errors from the covariance matrix.
///
/// Standard errors are the square roots of the diagonal elements
/// of the covariance matrix.
pub fn standard_errors_from_covariance(covar: &Array2<f64>) -> Array1<f64> {
    covar.diag().mapv(|v| if v > 0.0 { v.sqrt() } else { 0.0 })
}
