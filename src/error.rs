use thiserror::Error;

/// Error types for the lmsvd-rs library.
///
/// Minimizer outcomes are not errors: they are reported as a
/// [`TerminationCode`](crate::lm::TerminationCode). This enum covers API misuse
/// and failures of the SVD engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LmSvdError {
    /// Error indicating a mismatch in matrix or vector dimensions.
    #[error("Matrix dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// The bidiagonal QR sweep did not converge for one singular value.
    #[error("SVD failed to converge on singular value {index} after {iterations} iterations")]
    SvdNoConvergence {
        /// Index of the singular value that did not converge.
        index: usize,
        /// Number of QR sweeps attempted.
        iterations: usize,
    },

    /// Error indicating a singular matrix was encountered.
    #[error("Singular matrix encountered")]
    SingularMatrix,

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid state in the algorithm or data structure.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Error during function evaluation.
    #[error("Function evaluation error: {0}")]
    FunctionEvaluation(String),

    /// Not implemented functionality.
    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

/// Result type alias for lmsvd-rs operations.
pub type Result<T> = std::result::Result<T, LmSvdError>;
