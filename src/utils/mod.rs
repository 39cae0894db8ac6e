//! Utility functions and helpers for the lmsvd-rs library.

pub mod finite_difference;
pub mod numeric;

// Re-export commonly used utilities
pub use numeric::{column_norms, enorm, rms};
