//! # Uncertainty Calculation
//!
//! Parameter uncertainties from the Jacobian at the end of a fit:
//!
//! - The normal-equations matrix `J^T J`
//! - Covariance matrix estimation scaled by the reduced chi-square
//! - Correlation coefficients and standard errors
//!
//! [`crate::LevenbergMarquardt`] exposes these for its last run through
//! `get_jtj`, `covariance` and `standard_errors`.

pub mod covariance;

pub use covariance::{
    calculate_correlation, covariance_from_jacobian, normal_matrix,
    standard_errors_from_covariance,
};
