//! Termination codes for the Levenberg-Marquardt minimizer.
//!
//! Both drive modes report how a run ended with the same [`TerminationCode`].
//! The numeric values follow the classic MINPACK `info` convention so that
//! codes coming from other tools can be classified with
//! [`TerminationCode::from_code`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a minimization run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminationCode {
    /// The problem asked for the run to stop.
    ErrorFailure,

    /// Shapes or settings were invalid; nothing was evaluated.
    ErrorDodgyInput,

    /// Relative reduction of the sum of squares fell below `f_tolerance`.
    ConvergedFtol,

    /// Relative step size fell below `x_tolerance`.
    ConvergedXtol,

    /// Both `f_tolerance` and `x_tolerance` were met.
    ConvergedXftol,

    /// The residual vector is orthogonal to the Jacobian columns within `g_tolerance`.
    ConvergedGtol,

    /// The evaluation budget was exhausted.
    FailedTooManyIterations,

    /// No further reduction of the sum of squares is possible.
    FailedFtolTooSmall,

    /// No further improvement of the solution is possible.
    FailedXtolTooSmall,

    /// The residuals are orthogonal to the Jacobian to machine precision.
    FailedGtolTooSmall,
}

impl TerminationCode {
    /// The numeric code: -1 and 0 for errors, 1 to 4 for convergence, 5 to 8
    /// for failures.
    pub fn code(&self) -> i32 {
        match self {
            TerminationCode::ErrorFailure => -1,
            TerminationCode::ErrorDodgyInput => 0,
            TerminationCode::ConvergedFtol => 1,
            TerminationCode::ConvergedXtol => 2,
            TerminationCode::ConvergedXftol => 3,
            TerminationCode::ConvergedGtol => 4,
            TerminationCode::FailedTooManyIterations => 5,
            TerminationCode::FailedFtolTooSmall => 6,
            TerminationCode::FailedXtolTooSmall => 7,
            TerminationCode::FailedGtolTooSmall => 8,
        }
    }

    /// Classify a numeric code. Any negative value means the problem aborted.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            c if c < 0 => Some(TerminationCode::ErrorFailure),
            0 => Some(TerminationCode::ErrorDodgyInput),
            1 => Some(TerminationCode::ConvergedFtol),
            2 => Some(TerminationCode::ConvergedXtol),
            3 => Some(TerminationCode::ConvergedXftol),
            4 => Some(TerminationCode::ConvergedGtol),
            5 => Some(TerminationCode::FailedTooManyIterations),
            6 => Some(TerminationCode::FailedFtolTooSmall),
            7 => Some(TerminationCode::FailedXtolTooSmall),
            8 => Some(TerminationCode::FailedGtolTooSmall),
            _ => None,
        }
    }

    /// Combine the step and reduction tests of a single trial.
    pub fn from_tolerances(ftol_met: bool, xtol_met: bool) -> Option<Self> {
        match (ftol_met, xtol_met) {
            (true, true) => Some(TerminationCode::ConvergedXftol),
            (true, false) => Some(TerminationCode::ConvergedFtol),
            (false, true) => Some(TerminationCode::ConvergedXtol),
            (false, false) => None,
        }
    }

    /// Returns true if the run converged.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            TerminationCode::ConvergedFtol
                | TerminationCode::ConvergedXtol
                | TerminationCode::ConvergedXftol
                | TerminationCode::ConvergedGtol
        )
    }

    /// Returns true for the two error outcomes.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            TerminationCode::ErrorFailure | TerminationCode::ErrorDodgyInput
        )
    }

    /// Returns a description of the outcome.
    pub fn description(&self) -> &'static str {
        match self {
            TerminationCode::ErrorFailure => "failure in least-squares function",
            TerminationCode::ErrorDodgyInput => "dodgy input",
            TerminationCode::ConvergedFtol => "converged to ftol",
            TerminationCode::ConvergedXtol => "converged to xtol",
            TerminationCode::ConvergedXftol => "converged nicely",
            TerminationCode::ConvergedGtol => "converged via gtol",
            TerminationCode::FailedTooManyIterations => "too many iterations",
            TerminationCode::FailedFtolTooSmall => {
                "ftol is too small. no further reduction in the sum of squares is possible"
            }
            TerminationCode::FailedXtolTooSmall => {
                "xtol is too small. no further improvement in the approximate solution x is possible"
            }
            TerminationCode::FailedGtolTooSmall => {
                "gtol is too small. f(x) is orthogonal to the columns of the jacobian to machine precision"
            }
        }
    }
}

impl fmt::Display for TerminationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A snapshot of how the last run went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    /// Outcome of the run, `None` if no run has happened.
    pub termination: Option<TerminationCode>,

    /// Numeric form of `termination`.
    pub code: Option<i32>,

    /// Human readable outcome.
    pub message: String,

    /// Iterations performed.
    pub iterations: usize,

    /// Residual evaluations performed.
    pub evaluations: usize,

    /// Number of residuals of the problem.
    pub residuals: usize,

    /// RMS of the residuals at the starting point.
    pub start_error: f64,

    /// RMS of the residuals at the returned point.
    pub end_error: f64,
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "levenberg-marquardt: {}", self.message)?;
        write!(
            f,
            "levenberg-marquardt: {} iterations, {} evaluations, {} residuals.  RMS error start/end {}/{}",
            self.iterations, self.evaluations, self.residuals, self.start_error, self.end_error
        )
    }
}
