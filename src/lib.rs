//! # lmsvd-rs
//!
//! `lmsvd-rs` is a Rust implementation of the Levenberg-Marquardt algorithm
//! for nonlinear least-squares optimization, built on a dense singular value
//! decomposition.
//!
//! The library provides:
//! - [`Svd`], a reusable SVD of dense `f64` matrices with rank, condition,
//!   inverses, pseudo-inverses, least-squares solves and null spaces
//! - [`LevenbergMarquardt`], a minimizer with forward-difference or analytic
//!   Jacobians, MINPACK-style termination codes and diagnostics
//! - Covariance and standard errors of the fitted parameters
//!
//! ## Basic Usage
//!
//! ```
//! use lmsvd_rs::{LevenbergMarquardt, Problem, Result};
//! use ndarray::{array, Array1};
//!
//! /// Fit y = a * exp(b * t)
//! struct Decay {
//!     t: Array1<f64>,
//!     y: Array1<f64>,
//! }
//!
//! impl Problem for Decay {
//!     fn parameter_count(&self) -> usize { 2 }
//!     fn residual_count(&self) -> usize { self.t.len() }
//!
//!     fn eval(&mut self, p: &Array1<f64>) -> Result<Array1<f64>> {
//!         Ok(self.t.mapv(|t| p[0] * (p[1] * t).exp()) - &self.y)
//!     }
//! }
//!
//! let t = array![0.0, 1.0, 2.0, 3.0, 4.0];
//! let y = t.mapv(|t: f64| 2.0 * (-0.5 * t).exp());
//! let mut problem = Decay { t, y };
//!
//! let mut lm = LevenbergMarquardt::new();
//! let mut p = array![1.0, 0.0];
//! assert!(lm.minimize(&mut problem, &mut p));
//! assert!((p[0] - 2.0).abs() < 1e-6);
//! assert!((p[1] + 0.5).abs() < 1e-6);
//! assert!(lm.termination_code().map_or(false, |c| c.is_converged()));
//! ```

// Public modules
pub mod error;
pub mod lm;
pub mod problem;
pub mod svd;
pub mod uncertainty;
pub mod utils;

// Re-exports for convenience
pub use error::{LmSvdError, Result};
pub use lm::{Diagnosis, LevenbergMarquardt, LmConfig, TerminationCode};
pub use problem::Problem;
pub use svd::Svd;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
