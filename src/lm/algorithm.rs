//! Implementation of the Levenberg-Marquardt algorithm.
//!
//! This module contains the minimizer itself. A run is driven in one of two
//! modes: with a forward-difference Jacobian
//! ([`LevenbergMarquardt::minimize_without_gradient`]) or with the problem's
//! analytic Jacobian ([`LevenbergMarquardt::minimize_using_gradient`]). Both
//! share the same outer iteration and termination tests and differ only in
//! how the Jacobian is obtained and how evaluations are counted.
//!
//! The problem is passed explicitly into every run and every callback, so no
//! global state ties a callback to its minimizer. A run borrows the
//! minimizer mutably, which rules out nested runs on the same instance at
//! compile time, while separate instances may run concurrently.

use log::{debug, log, warn, Level};
use ndarray::{Array1, Array2, Zip};

use crate::error::{LmSvdError, Result};
use crate::problem::Problem;
use crate::uncertainty::covariance;
use crate::utils::{column_norms, enorm, finite_difference, rms};

use super::config::LmConfig;
use super::convergence::{Diagnosis, TerminationCode};
use super::step::DampedStep;
use super::trust_region::TrustRegion;

/// How the Jacobian is obtained during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriveMode {
    FiniteDifference,
    Analytic,
}

/// Counters and results of the most recent run.
#[derive(Debug, Clone, Default)]
struct RunState {
    iterations: usize,
    evaluations: usize,
    residuals: usize,
    start_error: f64,
    end_error: f64,
    termination: Option<TerminationCode>,
}

/// The Levenberg-Marquardt optimizer.
///
/// Configure it, then call one of the `minimize*` methods with a problem
/// and a starting point. The point is overwritten with the best solution
/// found, the return value says whether the run converged, and the counters
/// and [`TerminationCode`] of the run stay queryable until the next run.
///
/// ```
/// use lmsvd_rs::{LevenbergMarquardt, Problem, Result};
/// use ndarray::{array, Array1};
///
/// struct Bowl;
///
/// impl Problem for Bowl {
///     fn parameter_count(&self) -> usize { 2 }
///     fn residual_count(&self) -> usize { 2 }
///     fn eval(&mut self, x: &Array1<f64>) -> Result<Array1<f64>> {
///         Ok(array![x[0] - 3.0, x[1] + 2.0])
///     }
/// }
///
/// let mut lm = LevenbergMarquardt::new();
/// let mut x = array![0.0, 0.0];
/// assert!(lm.minimize_without_gradient(&mut Bowl, &mut x));
/// assert!((x[0] - 3.0).abs() < 1e-6 && (x[1] + 2.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    /// Configuration options
    config: LmConfig,

    /// State of the last run
    state: RunState,

    /// Last Jacobian formed by the last run
    jacobian: Option<Array2<f64>>,

    /// Lazily computed `J^T J` of `jacobian`
    jtj: Option<Array2<f64>>,
}

impl LevenbergMarquardt {
    /// Create a new Levenberg-Marquardt optimizer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new Levenberg-Marquardt optimizer with the given configuration.
    pub fn with_config(config: LmConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Set the relative step-size tolerance.
    pub fn with_x_tolerance(mut self, x_tolerance: f64) -> Self {
        self.config.x_tolerance = x_tolerance;
        self
    }

    /// Set the relative reduction tolerance for the sum of squares.
    pub fn with_f_tolerance(mut self, f_tolerance: f64) -> Self {
        self.config.f_tolerance = f_tolerance;
        self
    }

    /// Set the gradient-orthogonality tolerance.
    pub fn with_g_tolerance(mut self, g_tolerance: f64) -> Self {
        self.config.g_tolerance = g_tolerance;
        self
    }

    /// Set the residual evaluation budget.
    pub fn with_max_evaluations(mut self, max_evaluations: usize) -> Self {
        self.config.max_evaluations = Some(max_evaluations);
        self
    }

    /// Set the relative step of the forward-difference Jacobian.
    pub fn with_finite_difference_step(mut self, step: f64) -> Self {
        self.config.finite_difference_step = step;
        self
    }

    /// Set the initial damping factor.
    pub fn with_initial_damping(mut self, tau: f64) -> Self {
        self.config.initial_damping = tau;
        self
    }

    /// Log accepted iterates at `info` level.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.config.trace = trace;
        self
    }

    /// The configuration used by the next run.
    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    /// Change the configuration between runs.
    pub fn config_mut(&mut self) -> &mut LmConfig {
        &mut self.config
    }

    /// Minimize using the analytic Jacobian when the problem has one, and a
    /// finite-difference Jacobian otherwise.
    pub fn minimize<P: Problem + ?Sized>(&mut self, problem: &mut P, x: &mut Array1<f64>) -> bool {
        if problem.has_custom_jacobian() {
            self.minimize_using_gradient(problem, x)
        } else {
            self.minimize_without_gradient(problem, x)
        }
    }

    /// Minimize the sum of squared residuals with a forward-difference
    /// Jacobian.
    ///
    /// # Arguments
    ///
    /// * `problem` - The problem to solve
    /// * `x` - Initial guess, overwritten with the best point found
    ///
    /// # Returns
    ///
    /// * `true` iff the run ended with one of the `Converged*` codes
    pub fn minimize_without_gradient<P: Problem + ?Sized>(
        &mut self,
        problem: &mut P,
        x: &mut Array1<f64>,
    ) -> bool {
        if problem.has_custom_jacobian() {
            warn!("minimize_without_gradient() called, but the problem has an analytic Jacobian");
        }
        self.run(problem, x, DriveMode::FiniteDifference)
    }

    /// Minimize the sum of squared residuals with the problem's analytic
    /// Jacobian.
    ///
    /// Fails with [`TerminationCode::ErrorDodgyInput`], without evaluating
    /// anything, if the problem has no Jacobian.
    pub fn minimize_using_gradient<P: Problem + ?Sized>(
        &mut self,
        problem: &mut P,
        x: &mut Array1<f64>,
    ) -> bool {
        self.run(problem, x, DriveMode::Analytic)
    }

    /// Iterations of the last run. With a finite-difference Jacobian this
    /// counts accepted points; with an analytic one it counts residual
    /// evaluations.
    pub fn iteration_count(&self) -> usize {
        self.state.iterations
    }

    /// Residual evaluations of the last run, excluding the final evaluation
    /// used for [`end_error`](Self::end_error).
    pub fn evaluation_count(&self) -> usize {
        self.state.evaluations
    }

    /// RMS of the residuals at the starting point of the last run.
    pub fn start_error(&self) -> f64 {
        self.state.start_error
    }

    /// RMS of the residuals at the point returned by the last run.
    pub fn end_error(&self) -> f64 {
        self.state.end_error
    }

    /// Outcome of the last run, `None` before the first run.
    pub fn termination_code(&self) -> Option<TerminationCode> {
        self.state.termination
    }

    /// Describe the outcome of the last run. Has no side effects.
    pub fn diagnose_outcome(&self) -> Diagnosis {
        let termination = self.state.termination;
        Diagnosis {
            termination,
            code: termination.map(|t| t.code()),
            message: termination
                .map(|t| t.description().to_string())
                .unwrap_or_else(|| "no minimization has been run".to_string()),
            iterations: self.state.iterations,
            evaluations: self.state.evaluations,
            residuals: self.state.residuals,
            start_error: self.state.start_error,
            end_error: self.state.end_error,
        }
    }

    /// The Jacobian at the point the last run returned, if the run got far
    /// enough to form one.
    pub fn jacobian(&self) -> Option<&Array2<f64>> {
        self.jacobian.as_ref()
    }

    /// The normal-equations matrix `J^T J` of the last run's final Jacobian.
    ///
    /// Computed from the SVD of the Jacobian on first request and cached
    /// until the next run.
    ///
    /// # Errors
    ///
    /// * [`LmSvdError::InvalidState`] if no run has produced a Jacobian
    pub fn get_jtj(&mut self) -> Result<&Array2<f64>> {
        if self.jtj.is_none() {
            let jacobian = self.final_jacobian()?;
            self.jtj = Some(covariance::normal_matrix(jacobian)?);
        }
        self.jtj
            .as_ref()
            .ok_or_else(|| LmSvdError::InvalidState("J^T J cache is empty".to_string()))
    }

    /// Parameter covariance `(J^T J)^+` scaled by the reduced chi-square of
    /// the final residuals.
    pub fn covariance(&self) -> Result<Array2<f64>> {
        let jacobian = self.final_jacobian()?;
        let (m, n) = jacobian.dim();
        let redchi = if m > n {
            let chi_square = self.state.end_error.powi(2) * m as f64;
            chi_square / (m - n) as f64
        } else {
            1.0
        };
        covariance::covariance_from_jacobian(jacobian, redchi)
    }

    /// One-sigma uncertainties of the parameters, the square roots of the
    /// covariance diagonal.
    pub fn standard_errors(&self) -> Result<Array1<f64>> {
        Ok(covariance::standard_errors_from_covariance(&self.covariance()?))
    }

    fn final_jacobian(&self) -> Result<&Array2<f64>> {
        self.jacobian.as_ref().ok_or_else(|| {
            LmSvdError::InvalidState("no completed minimization has produced a Jacobian".to_string())
        })
    }

    /// Reason why a run cannot start, if any.
    fn dodgy_input<P: Problem + ?Sized>(
        &self,
        problem: &P,
        x: &Array1<f64>,
        mode: DriveMode,
    ) -> Option<String> {
        let n = problem.parameter_count();
        let m = problem.residual_count();

        if mode == DriveMode::Analytic && !problem.has_custom_jacobian() {
            return Some(
                "minimize_using_gradient() called, but the problem has no Jacobian".to_string(),
            );
        }
        if n == 0 {
            return Some("the problem has no unknowns".to_string());
        }
        if m < n {
            return Some(format!(
                "Number of unknowns ({}) greater than number of data ({})",
                n, m
            ));
        }
        if x.len() != n {
            return Some(format!(
                "Input vector length ({}) not equal to num unknowns ({})",
                x.len(),
                n
            ));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Some("the initial guess contains non-finite values".to_string());
        }
        self.config.validate()
    }

    fn run<P: Problem + ?Sized>(&mut self, problem: &mut P, x: &mut Array1<f64>, mode: DriveMode) -> bool {
        self.state = RunState {
            residuals: problem.residual_count(),
            ..RunState::default()
        };
        self.jacobian = None;
        self.jtj = None;

        if let Some(reason) = self.dodgy_input(problem, x, mode) {
            warn!("levenberg-marquardt: {}", reason);
            self.state.termination = Some(TerminationCode::ErrorDodgyInput);
            return false;
        }

        let config = self.config.clone();
        let mut evaluator = Evaluator {
            problem,
            mode,
            budget: config.evaluation_budget(x.len()),
            residual_count: self.state.residuals,
            trace: config.trace,
            state: &mut self.state,
            accepted: None,
            jacobian: None,
            stale_jacobian: false,
        };

        let code = match evaluator.iterate(x, &config) {
            Ok(code) | Err(code) => code,
        };

        // One more evaluation so the reported error belongs to the returned x.
        let final_residuals = evaluator.uncounted_residuals(x);
        let end_error = match final_residuals.as_ref().or(evaluator.accepted.as_ref()) {
            Some(f) => rms(f.view()),
            None => f64::NAN,
        };
        if evaluator.stale_jacobian {
            evaluator.refresh_jacobian(x, final_residuals.as_ref(), config.finite_difference_step);
        }
        let jacobian = evaluator.jacobian.take();

        self.state.end_error = end_error;
        self.state.termination = Some(code);
        self.jacobian = jacobian;

        if code.is_converged() {
            debug!("{}", self.diagnose_outcome());
            true
        } else {
            warn!("{}", self.diagnose_outcome());
            false
        }
    }
}

/// Per-run context handed to every problem callback: the problem, the budget,
/// and the counters it updates.
struct Evaluator<'a, P: Problem + ?Sized> {
    problem: &'a mut P,
    mode: DriveMode,
    budget: usize,
    residual_count: usize,
    trace: bool,
    state: &'a mut RunState,
    /// Residuals at the last accepted point.
    accepted: Option<Array1<f64>>,
    /// Last Jacobian formed.
    jacobian: Option<Array2<f64>>,
    /// Set when a step was accepted after `jacobian` was formed.
    stale_jacobian: bool,
}

/// Early exits of an iteration carry the code they end the run with.
type Step<T> = std::result::Result<T, TerminationCode>;

impl<'a, P: Problem + ?Sized> Evaluator<'a, P> {
    /// A raised failure flag is consumed and ends the run.
    fn consume_failure(&mut self) -> Step<()> {
        if self.problem.failure() {
            self.problem.clear_failure();
            debug!("levenberg-marquardt: problem raised its failure flag");
            return Err(TerminationCode::ErrorFailure);
        }
        Ok(())
    }

    /// A counted residual evaluation.
    fn residuals(&mut self, x: &Array1<f64>) -> Step<Array1<f64>> {
        if self.state.evaluations >= self.budget {
            return Err(TerminationCode::FailedTooManyIterations);
        }
        self.state.evaluations += 1;
        if self.mode == DriveMode::Analytic {
            self.state.iterations += 1;
        }

        let outcome = self.problem.eval(x);
        let first = self.state.evaluations == 1;
        if let Ok(f) = &outcome {
            if first && f.len() == self.residual_count {
                self.state.start_error = rms(f.view());
            }
        }
        self.consume_failure()?;
        let f = match outcome {
            Ok(f) if f.len() == self.residual_count => f,
            Ok(f) => {
                warn!(
                    "levenberg-marquardt: problem returned {} residuals, expected {}",
                    f.len(),
                    self.residual_count
                );
                return Err(TerminationCode::ErrorFailure);
            }
            Err(e) => {
                warn!("levenberg-marquardt: residual evaluation failed: {}", e);
                return Err(TerminationCode::ErrorFailure);
            }
        };
        Ok(f)
    }

    fn jacobian_at(&mut self, x: &Array1<f64>, f: &Array1<f64>, fd_step: f64) -> Step<Array2<f64>> {
        match self.mode {
            DriveMode::FiniteDifference => {
                finite_difference::jacobian(x, f, fd_step, |shifted| self.residuals(shifted))
            }
            DriveMode::Analytic => {
                let outcome = self.problem.jacobian(x);
                self.consume_failure()?;
                match outcome {
                    Ok(j) if j.dim() == (self.residual_count, x.len()) => Ok(j),
                    Ok(j) => {
                        warn!(
                            "levenberg-marquardt: problem returned a {:?} Jacobian, expected {:?}",
                            j.dim(),
                            (self.residual_count, x.len())
                        );
                        Err(TerminationCode::ErrorFailure)
                    }
                    Err(e) => {
                        warn!("levenberg-marquardt: Jacobian evaluation failed: {}", e);
                        Err(TerminationCode::ErrorFailure)
                    }
                }
            }
        }
    }

    /// Report an accepted point to the log and to the problem.
    fn observe(&mut self, x: &Array1<f64>, f: &Array1<f64>) -> Step<()> {
        let level = if self.trace { Level::Info } else { Level::Debug };
        let head: Vec<f64> = x.iter().take(5).copied().collect();
        log!(
            level,
            "levenberg-marquardt: iter {:3} x {:?}{} |f| = {:e}",
            self.state.iterations,
            head,
            if x.len() > 5 { " ..." } else { "" },
            enorm(f.view())
        );

        self.problem.trace(self.state.iterations, x, f);
        if self.mode == DriveMode::FiniteDifference {
            self.state.iterations += 1;
        }
        self.consume_failure()
    }

    fn iterate(&mut self, x: &mut Array1<f64>, config: &LmConfig) -> Step<TerminationCode> {
        let mut f = self.residuals(x)?;
        self.accepted = Some(f.clone());

        let mut scale: Option<Array1<f64>> = None;
        let mut damping: Option<TrustRegion> = None;

        loop {
            self.observe(x, &f)?;
            let jacobian = self.jacobian_at(x, &f, config.finite_difference_step)?;
            let norms = column_norms(jacobian.view());
            let fnorm = enorm(f.view());

            // Running maximum of the column norms; zero columns get unit scale.
            let diag = match scale.take() {
                None => norms.mapv(|c| if c == 0.0 { 1.0 } else { c }),
                Some(previous) => Zip::from(&previous)
                    .and(&norms)
                    .map_collect(|&d, &c| d.max(c)),
            };

            let subproblem = DampedStep::new(&jacobian, &f, &diag);
            let informative = norms.iter().any(|&c| c > 0.0);
            let gnorm = gradient_cosine(&jacobian, &f, &norms, fnorm);
            self.jacobian = Some(jacobian);
            self.stale_jacobian = false;

            if fnorm == 0.0 {
                return Ok(TerminationCode::ConvergedGtol);
            }
            // A vanishing Jacobian carries no direction, so no test can
            // tell a flat region from a stationary point.
            if informative {
                if gnorm <= config.g_tolerance {
                    return Ok(TerminationCode::ConvergedGtol);
                }
                if gnorm <= f64::EPSILON {
                    return Ok(TerminationCode::FailedGtolTooSmall);
                }
            }

            let subproblem = subproblem.map_err(|e| {
                warn!("levenberg-marquardt: cannot factorise the Jacobian: {}", e);
                TerminationCode::ErrorFailure
            })?;
            let trust_region = damping.get_or_insert_with(|| {
                TrustRegion::new(config.initial_damping, subproblem.max_singular_value())
            });
            let xnorm = enorm((&*x * &diag).view());

            loop {
                let trial = subproblem.solve(trust_region.mu);
                let x_new = &*x + &trial.step;
                let f_new = self.residuals(&x_new)?;
                let fnorm_new = enorm(f_new.view());

                let actual = if 0.1 * fnorm_new < fnorm {
                    1.0 - (fnorm_new / fnorm).powi(2)
                } else {
                    -1.0
                };
                let predicted = trial.predicted_reduction / (fnorm * fnorm);
                let ratio = TrustRegion::gain_ratio(actual, predicted);
                let accepted = trust_region.update(ratio);

                debug!(
                    "levenberg-marquardt: mu {:e} |Dh| {:e} actual {:e} predicted {:e} ratio {:.3} {}",
                    trial.mu,
                    trial.scaled_norm,
                    actual,
                    predicted,
                    ratio,
                    if accepted { "accepted" } else { "rejected" }
                );

                if accepted {
                    *x = x_new;
                    f = f_new;
                    self.accepted = Some(f.clone());
                    self.stale_jacobian = self.jacobian.is_some();
                }

                if informative {
                    let ftol_met = actual.abs() <= config.f_tolerance
                        && predicted <= config.f_tolerance
                        && 0.5 * ratio <= 1.0;
                    let xtol_met = trial.scaled_norm <= config.x_tolerance * xnorm;
                    if let Some(code) = TerminationCode::from_tolerances(ftol_met, xtol_met) {
                        return Ok(code);
                    }

                    if actual.abs() <= f64::EPSILON && predicted <= f64::EPSILON && 0.5 * ratio <= 1.0 {
                        return Ok(TerminationCode::FailedFtolTooSmall);
                    }
                    if trial.scaled_norm <= f64::EPSILON * xnorm {
                        return Ok(TerminationCode::FailedXtolTooSmall);
                    }
                }

                if accepted {
                    break;
                }
            }

            scale = Some(diag);
        }
    }

    /// One evaluation outside the budget and the counters. Any refusal
    /// yields `None` and leaves the flag cleared.
    fn uncounted_residuals(&mut self, x: &Array1<f64>) -> Option<Array1<f64>> {
        let outcome = self.problem.eval(x);
        let refused = self.problem.failure();
        if refused {
            self.problem.clear_failure();
        }

        match outcome {
            Ok(f) if !refused && f.len() == self.residual_count => Some(f),
            _ => None,
        }
    }

    /// Form the Jacobian at the returned `x` after the run stopped on a
    /// freshly accepted step. Nothing is counted. If the problem refuses, no
    /// Jacobian is kept rather than one from an earlier iterate.
    fn refresh_jacobian(&mut self, x: &Array1<f64>, f: Option<&Array1<f64>>, fd_step: f64) {
        let refreshed = match (self.mode, f) {
            (DriveMode::FiniteDifference, Some(f)) => {
                finite_difference::jacobian(x, f, fd_step, |shifted| {
                    self.uncounted_residuals(shifted).ok_or(())
                })
                .ok()
            }
            (DriveMode::FiniteDifference, None) => None,
            (DriveMode::Analytic, _) => {
                let outcome = self.problem.jacobian(x);
                let refused = self.problem.failure();
                if refused {
                    self.problem.clear_failure();
                }
                match outcome {
                    Ok(j) if !refused && j.dim() == (self.residual_count, x.len()) => Some(j),
                    _ => None,
                }
            }
        };

        if refreshed.is_none() {
            warn!("levenberg-marquardt: cannot form the Jacobian at the returned point");
        }
        self.jacobian = refreshed;
        self.stale_jacobian = false;
    }
}

/// Largest cosine between `f` and a nonzero column of the Jacobian.
fn gradient_cosine(jacobian: &Array2<f64>, f: &Array1<f64>, norms: &Array1<f64>, fnorm: f64) -> f64 {
    if fnorm == 0.0 {
        return 0.0;
    }
    let g = jacobian.t().dot(f);
    g.iter()
        .zip(norms.iter())
        .filter(|(_, &c)| c != 0.0)
        .map(|(&gj, &c)| (gj / (c * fnorm)).abs())
        .fold(0.0, f64::max)
}
