//! Test problems shared by the minimizer tests.

use lmsvd_rs::{LmSvdError, Problem, Result};
use ndarray::{array, Array1, Array2};

/// f(x) = (x0 - 3, x1 + 2), minimum zero at (3, -2)
pub struct Bowl {
    pub analytic: bool,
}

impl Problem for Bowl {
    fn parameter_count(&self) -> usize {
        2
    }

    fn residual_count(&self) -> usize {
        2
    }

    fn eval(&mut self, x: &Array1<f64>) -> Result<Array1<f64>> {
        Ok(array![x[0] - 3.0, x[1] + 2.0])
    }

    fn has_custom_jacobian(&self) -> bool {
        self.analytic
    }

    fn jacobian(&mut self, _x: &Array1<f64>) -> Result<Array2<f64>> {
        Ok(Array2::eye(2))
    }
}

/// The Rosenbrock function as residuals: (10 (x1 - x0^2), 1 - x0)
pub struct Rosenbrock {
    pub analytic: bool,
}

impl Problem for Rosenbrock {
    fn parameter_count(&self) -> usize {
        2
    }

    fn residual_count(&self) -> usize {
        2
    }

    fn eval(&mut self, x: &Array1<f64>) -> Result<Array1<f64>> {
        Ok(array![10.0 * (x[1] - x[0] * x[0]), 1.0 - x[0]])
    }

    fn has_custom_jacobian(&self) -> bool {
        self.analytic
    }

    fn jacobian(&mut self, x: &Array1<f64>) -> Result<Array2<f64>> {
        Ok(array![[-20.0 * x[0], 10.0], [-1.0, 0.0]])
    }
}

/// Residuals that never change; the Jacobian is identically zero.
pub struct Constant {
    pub analytic: bool,
}

impl Problem for Constant {
    fn parameter_count(&self) -> usize {
        2
    }

    fn residual_count(&self) -> usize {
        2
    }

    fn eval(&mut self, _x: &Array1<f64>) -> Result<Array1<f64>> {
        Ok(array![1.0, 1.0])
    }

    fn has_custom_jacobian(&self) -> bool {
        self.analytic
    }

    fn jacobian(&mut self, _x: &Array1<f64>) -> Result<Array2<f64>> {
        Ok(Array2::zeros((2, 2)))
    }
}

/// Counts evaluations and can fail on a chosen call.
pub struct Faulty {
    pub calls: usize,
    pub fail_on: Option<usize>,
    pub error_on: Option<usize>,
    pub fail_in_trace: bool,
    pub analytic: bool,
    pub residuals: usize,
    pub failure: bool,
}

impl Faulty {
    pub fn new(residuals: usize) -> Self {
        Self {
            calls: 0,
            fail_on: None,
            error_on: None,
            fail_in_trace: false,
            analytic: false,
            residuals,
            failure: false,
        }
    }
}

impl Problem for Faulty {
    fn parameter_count(&self) -> usize {
        3
    }

    fn residual_count(&self) -> usize {
        self.residuals
    }

    fn eval(&mut self, x: &Array1<f64>) -> Result<Array1<f64>> {
        self.calls += 1;
        if self.fail_on == Some(self.calls) {
            self.failure = true;
        }
        if self.error_on == Some(self.calls) {
            return Err(LmSvdError::FunctionEvaluation("sensor offline".to_string()));
        }
        let sum = x.sum();
        Ok(Array1::from_shape_fn(self.residuals, |i| sum - i as f64))
    }

    fn has_custom_jacobian(&self) -> bool {
        self.analytic
    }

    fn jacobian(&mut self, _x: &Array1<f64>) -> Result<Array2<f64>> {
        Ok(Array2::ones((self.residuals, 3)))
    }

    fn trace(&mut self, _iteration: usize, _x: &Array1<f64>, _f: &Array1<f64>) {
        if self.fail_in_trace {
            self.failure = true;
        }
    }

    fn failure(&self) -> bool {
        self.failure
    }

    fn clear_failure(&mut self) {
        self.failure = false;
    }
}

/// y = a exp(b t) sampled with seeded noise
pub struct ExponentialDecay {
    pub t: Array1<f64>,
    pub y: Array1<f64>,
    pub analytic: bool,
}

impl ExponentialDecay {
    pub fn generate(a: f64, b: f64, noise_level: f64, seed: u64) -> Self {
        use rand::{Rng, SeedableRng};
        use rand_chacha::ChaCha8Rng;

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let t = Array1::linspace(0.0, 4.0, 30);
        let y = t.mapv(|ti: f64| a * (b * ti).exp() + rng.gen_range(-noise_level..noise_level));
        Self {
            t,
            y,
            analytic: false,
        }
    }
}

impl Problem for ExponentialDecay {
    fn parameter_count(&self) -> usize {
        2
    }

    fn residual_count(&self) -> usize {
        self.t.len()
    }

    fn eval(&mut self, p: &Array1<f64>) -> Result<Array1<f64>> {
        Ok(self.t.mapv(|ti| p[0] * (p[1] * ti).exp()) - &self.y)
    }

    fn has_custom_jacobian(&self) -> bool {
        self.analytic
    }

    fn jacobian(&mut self, p: &Array1<f64>) -> Result<Array2<f64>> {
        let mut jac = Array2::zeros((self.t.len(), 2));
        for (i, &ti) in self.t.iter().enumerate() {
            let e = (p[1] * ti).exp();
            jac[[i, 0]] = e;
            jac[[i, 1]] = p[0] * ti * e;
        }
        Ok(jac)
    }
}

/// r = x - 1, started one ulp away from the root.
pub struct Shifted;

impl Problem for Shifted {
    fn parameter_count(&self) -> usize {
        1
    }

    fn residual_count(&self) -> usize {
        1
    }

    fn eval(&mut self, x: &Array1<f64>) -> Result<Array1<f64>> {
        Ok(array![x[0] - 1.0])
    }

    fn has_custom_jacobian(&self) -> bool {
        true
    }

    fn jacobian(&mut self, _x: &Array1<f64>) -> Result<Array2<f64>> {
        Ok(array![[1.0]])
    }
}

/// r = (x, 1): near x = 0 the residual is almost orthogonal to the Jacobian.
pub struct Orthogonal;

impl Problem for Orthogonal {
    fn parameter_count(&self) -> usize {
        1
    }

    fn residual_count(&self) -> usize {
        2
    }

    fn eval(&mut self, x: &Array1<f64>) -> Result<Array1<f64>> {
        Ok(array![x[0], 1.0])
    }

    fn has_custom_jacobian(&self) -> bool {
        true
    }

    fn jacobian(&mut self, _x: &Array1<f64>) -> Result<Array2<f64>> {
        Ok(array![[1.0], [0.0]])
    }
}
