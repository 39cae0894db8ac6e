//! Levenberg-Marquardt algorithm implementation.
//!
//! This module provides a Levenberg-Marquardt minimizer for dense nonlinear
//! least-squares problems. Each damped step is solved through an SVD of the
//! scaled Jacobian, the damping follows Nielsen's update, and runs end with a
//! MINPACK-style [`TerminationCode`].

pub mod algorithm;
pub mod config;
pub mod convergence;
pub mod step;
pub mod trust_region;

// Re-export key types
pub use algorithm::LevenbergMarquardt;
pub use config::LmConfig;
pub use convergence::{Diagnosis, TerminationCode};
pub use step::{DampedStep, StepResult};
pub use trust_region::TrustRegion;
