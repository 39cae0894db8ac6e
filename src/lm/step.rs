//! Step calculation for the Levenberg-Marquardt algorithm.
//!
//! The damped subproblem
//!
//! ```text
//! minimize ||f + J h||^2 + mu ||D h||^2
//! ```
//!
//! is solved through one SVD of the scaled Jacobian `J D^-1 = U W V^T`. With
//! `z = U^T f` the scaled step is `D h = -V diag(W / (W^2 + mu)) z` for any
//! `mu`, so rejected steps only cost a matrix-vector product, and the
//! reduction predicted by the linear model has the closed form
//! `sum z_i^2 t_i (2 - t_i)` with `t_i = W_i^2 / (W_i^2 + mu)`.

use ndarray::{Array1, Array2, Axis};

use crate::error::{LmSvdError, Result};
use crate::svd::Svd;
use crate::utils::enorm;

/// Result of a Levenberg-Marquardt step calculation.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// The step in parameter space
    pub step: Array1<f64>,

    /// `||D h||`, the length of the step in scaled coordinates
    pub scaled_norm: f64,

    /// Reduction of the sum of squares predicted by the linear model
    pub predicted_reduction: f64,

    /// The damping parameter used to calculate the step
    pub mu: f64,
}

/// The factorised subproblem at one Jacobian.
#[derive(Debug, Clone)]
pub struct DampedStep {
    svd: Svd,
    projected: Array1<f64>,
    scale: Array1<f64>,
}

impl DampedStep {
    /// Factorise the subproblem for `jacobian` (`m x n`), `residuals` (`m`)
    /// and the positive diagonal scaling `scale` (`n`).
    pub fn new(jacobian: &Array2<f64>, residuals: &Array1<f64>, scale: &Array1<f64>) -> Result<Self> {
        let (m, n) = jacobian.dim();
        if residuals.len() != m || scale.len() != n {
            return Err(LmSvdError::DimensionMismatch(format!(
                "jacobian is {}x{}, residuals {}, scale {}",
                m,
                n,
                residuals.len(),
                scale.len()
            )));
        }

        let mut scaled = jacobian.clone();
        for (mut col, &d) in scaled.axis_iter_mut(Axis(1)).zip(scale.iter()) {
            col /= d;
        }

        let svd = Svd::new(&scaled, 0.0)?;
        let projected = svd.u().t().dot(residuals);

        Ok(Self {
            svd,
            projected,
            scale: scale.clone(),
        })
    }

    /// Largest singular value of the scaled Jacobian.
    pub fn max_singular_value(&self) -> f64 {
        self.svd.sigma_max()
    }

    /// Numerical rank of the scaled Jacobian.
    pub fn rank(&self) -> usize {
        self.svd.rank()
    }

    /// Solve the subproblem for damping `mu > 0`.
    pub fn solve(&self, mu: f64) -> StepResult {
        let w = self.svd.w();

        let mut coefficients = Array1::zeros(w.len());
        let mut predicted_reduction = 0.0;
        for (i, (&wi, &zi)) in w.iter().zip(self.projected.iter()).enumerate() {
            let w2 = wi * wi;
            let t = w2 / (w2 + mu);
            if wi != 0.0 {
                coefficients[i] = -(t / wi) * zi;
            }
            predicted_reduction += zi * zi * t * (2.0 - t);
        }

        let scaled_step = self.svd.v().dot(&coefficients);
        let scaled_norm = enorm(scaled_step.view());
        let step = scaled_step / &self.scale;

        StepResult {
            step,
            scaled_norm,
            predicted_reduction,
            mu,
        }
    }
}
