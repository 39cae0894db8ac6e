//! Singular value decomposition of dense matrices.
//!
//! [`Svd`] holds the factors `U`, `W`, `V` of `M = U * diag(W) * V^T`. The
//! decomposition is computed once at construction; rank, condition,
//! inverses, least-squares solves and null spaces are then answered from the
//! stored factors. `W` is sorted in decreasing order, the columns of `U` for
//! nonzero singular values span the range of `M` and the columns of `V` for
//! zero singular values span its null space.
//!
//! Singular values below a tolerance are zeroed ("zeroing out"), which is how
//! rank deficiency is decided. Ill-conditioning is never an error: it shows up
//! in [`Svd::well_condition`] and in the rank.

pub mod bidiag;

use std::fmt;

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{LmSvdError, Result};

/// The singular value decomposition of an `m x n` matrix.
#[derive(Debug, Clone)]
pub struct Svd {
    m: usize,
    n: usize,
    u: Array2<f64>,
    /// Singular values after zeroing.
    w: Array1<f64>,
    /// Singular values exactly as the kernel produced them.
    raw_w: Array1<f64>,
    winverse: Array1<f64>,
    v: Array2<f64>,
    rank: usize,
    last_tolerance: f64,
}

impl Svd {
    /// Decompose `matrix`.
    ///
    /// # Arguments
    ///
    /// * `matrix` - Any real `m x n` matrix
    /// * `zero_out_tolerance` - If non-negative, singular values smaller than
    ///   it are set to zero. If negative, the threshold is
    ///   `|zero_out_tolerance| * sigma_max`.
    ///
    /// # Errors
    ///
    /// * [`LmSvdError::SvdNoConvergence`] if the QR sweep does not converge
    /// * [`LmSvdError::InvalidInput`] if the matrix holds NaN or infinity
    pub fn new(matrix: &Array2<f64>, zero_out_tolerance: f64) -> Result<Self> {
        let (m, n) = matrix.dim();
        let factors = bidiag::decompose(matrix)?;

        let mut svd = Self {
            m,
            n,
            u: factors.u,
            w: factors.w.clone(),
            raw_w: factors.w,
            winverse: Array1::zeros(n),
            v: factors.v,
            rank: 0,
            last_tolerance: zero_out_tolerance,
        };

        if zero_out_tolerance >= 0.0 {
            svd.zero_out_absolute(zero_out_tolerance);
        } else {
            svd.zero_out_relative(-zero_out_tolerance);
        }

        Ok(svd)
    }

    /// Zero every singular value smaller than `tol`.
    ///
    /// Zeroing always starts from the decomposed values, so a later call with a
    /// smaller tolerance restores values zeroed by an earlier one.
    pub fn zero_out_absolute(&mut self, tol: f64) {
        self.last_tolerance = tol;
        self.rank = 0;
        for k in 0..self.n {
            let value = self.raw_w[k];
            if value < tol || value == 0.0 {
                self.w[k] = 0.0;
                self.winverse[k] = 0.0;
            } else {
                self.w[k] = value;
                self.winverse[k] = 1.0 / value;
                self.rank += 1;
            }
        }
    }

    /// Zero every singular value smaller than `tol * sigma_max`.
    pub fn zero_out_relative(&mut self, tol: f64) {
        let sigma_max = self.raw_w.first().copied().unwrap_or(0.0);
        self.zero_out_absolute(tol * sigma_max);
        self.last_tolerance = -tol;
    }

    /// Number of rows of the decomposed matrix.
    pub fn rows(&self) -> usize {
        self.m
    }

    /// Number of columns of the decomposed matrix.
    pub fn cols(&self) -> usize {
        self.n
    }

    /// The `m x n` left factor.
    pub fn u(&self) -> &Array2<f64> {
        &self.u
    }

    /// Singular values, sorted from largest to smallest, after zeroing.
    pub fn w(&self) -> &Array1<f64> {
        &self.w
    }

    /// Reciprocals of the singular values, zero where the value was zeroed.
    pub fn winverse(&self) -> &Array1<f64> {
        &self.winverse
    }

    /// The `n x n` orthogonal right factor.
    pub fn v(&self) -> &Array2<f64> {
        &self.v
    }

    /// The tolerance passed to the most recent zeroing; negative when relative.
    pub fn last_tolerance(&self) -> f64 {
        self.last_tolerance
    }

    /// Number of nonzero singular values.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of zero singular values, `n - rank`.
    pub fn singularities(&self) -> usize {
        self.n - self.rank
    }

    /// Largest singular value (zero for an empty matrix).
    pub fn sigma_max(&self) -> f64 {
        self.w.first().copied().unwrap_or(0.0)
    }

    /// Smallest singular value (zero for an empty matrix).
    pub fn sigma_min(&self) -> f64 {
        self.w.last().copied().unwrap_or(0.0)
    }

    /// `sigma_min / sigma_max`; near zero means ill-conditioned. A zero
    /// matrix has condition zero.
    pub fn well_condition(&self) -> f64 {
        let max = self.sigma_max();
        if max == 0.0 {
            0.0
        } else {
            self.sigma_min() / max
        }
    }

    /// Product of the singular values, `|det M|` for a square matrix.
    pub fn determinant_magnitude(&self) -> f64 {
        if self.m != self.n {
            log::warn!(
                "determinant_magnitude() called on a non-square {}x{} matrix",
                self.m,
                self.n
            );
        }
        self.w.product()
    }

    /// Spectral norm of the matrix.
    pub fn norm(&self) -> f64 {
        self.sigma_max()
    }

    /// `U * diag(W) * V^T`, using the zeroed singular values.
    pub fn recompose(&self) -> Array2<f64> {
        scale_columns(&self.u, self.w.view()).dot(&self.v.t())
    }

    /// The inverse of a square, nonsingular matrix.
    ///
    /// # Errors
    ///
    /// * [`LmSvdError::DimensionMismatch`] for non-square matrices
    /// * [`LmSvdError::SingularMatrix`] if any singular value was zeroed
    pub fn inverse(&self) -> Result<Array2<f64>> {
        if self.m != self.n {
            return Err(LmSvdError::DimensionMismatch(format!(
                "inverse() needs a square matrix, got {}x{}",
                self.m, self.n
            )));
        }
        if self.rank < self.n {
            return Err(LmSvdError::SingularMatrix);
        }
        Ok(self.pseudo_inverse())
    }

    /// Transpose of the inverse, `U * diag(1/W) * V^T`.
    pub fn tinverse(&self) -> Result<Array2<f64>> {
        Ok(self.inverse()?.reversed_axes())
    }

    /// The `n x m` Moore-Penrose pseudo-inverse `V * diag(1/W) * U^T`.
    pub fn pseudo_inverse(&self) -> Array2<f64> {
        scale_columns(&self.v, self.winverse.view()).dot(&self.u.t())
    }

    /// Pseudo-inverse built from only the `rank` largest singular values.
    pub fn pseudo_inverse_with_rank(&self, rank: usize) -> Array2<f64> {
        let mut winverse = self.winverse.clone();
        winverse.iter_mut().skip(rank).for_each(|x| *x = 0.0);
        scale_columns(&self.v, winverse.view()).dot(&self.u.t())
    }

    /// Minimum-norm least-squares solution of `M * x = rhs`.
    ///
    /// # Errors
    ///
    /// * [`LmSvdError::DimensionMismatch`] if `rhs.len() != m`
    pub fn solve(&self, rhs: &Array1<f64>) -> Result<Array1<f64>> {
        if rhs.len() != self.m {
            return Err(LmSvdError::DimensionMismatch(format!(
                "solve() expects a right-hand side of length {}, got {}",
                self.m,
                rhs.len()
            )));
        }
        let projected = self.u.t().dot(rhs) * &self.winverse;
        Ok(self.v.dot(&projected))
    }

    /// Least-squares solve for every column of `rhs` at once.
    pub fn solve_matrix(&self, rhs: &Array2<f64>) -> Result<Array2<f64>> {
        if rhs.nrows() != self.m {
            return Err(LmSvdError::DimensionMismatch(format!(
                "solve_matrix() expects {} rows, got {}",
                self.m,
                rhs.nrows()
            )));
        }
        let mut projected = self.u.t().dot(rhs);
        for (mut row, &wi) in projected.axis_iter_mut(Axis(0)).zip(self.winverse.iter()) {
            row *= wi;
        }
        Ok(self.v.dot(&projected))
    }

    /// Orthonormal basis of the null space: the columns of `V` for the zeroed
    /// singular values.
    pub fn nullspace(&self) -> Array2<f64> {
        self.v.slice(s![.., self.rank..]).to_owned()
    }

    /// The last `dimension` columns of `V`, i.e. those belonging to the
    /// smallest singular values, regardless of the rank.
    pub fn nullspace_with_dimension(&self, dimension: usize) -> Result<Array2<f64>> {
        trailing_columns(self.v.view(), dimension)
    }

    /// Columns of `U` for the zeroed singular values, an orthonormal basis of
    /// the complement of the range of `M` in `R^m`.
    pub fn left_nullspace(&self) -> Array2<f64> {
        self.left_basis().slice(s![.., self.rank..]).to_owned()
    }

    /// The last `dimension` of the first `min(m, n)` columns of `U`.
    pub fn left_nullspace_with_dimension(&self, dimension: usize) -> Result<Array2<f64>> {
        trailing_columns(self.left_basis(), dimension)
    }

    /// The right singular vector for the smallest singular value.
    pub fn nullvector(&self) -> Result<Array1<f64>> {
        Ok(trailing_columns(self.v.view(), 1)?.column(0).to_owned())
    }

    /// The left singular vector for the smallest singular value.
    pub fn left_nullvector(&self) -> Result<Array1<f64>> {
        Ok(trailing_columns(self.left_basis(), 1)?.column(0).to_owned())
    }

    /// For wide matrices, columns `m..n` of `U` are zero and carry no
    /// direction.
    fn left_basis(&self) -> ArrayView2<f64> {
        self.u.slice(s![.., ..self.m.min(self.n)])
    }
}

/// Multiply column `j` of `a` by `d[j]`.
fn scale_columns(a: &Array2<f64>, d: ArrayView1<f64>) -> Array2<f64> {
    let mut scaled = a.clone();
    for (mut col, &dj) in scaled.columns_mut().into_iter().zip(d.iter()) {
        col *= dj;
    }
    scaled
}

fn trailing_columns(a: ArrayView2<f64>, dimension: usize) -> Result<Array2<f64>> {
    let cols = a.ncols();
    if dimension > cols {
        return Err(LmSvdError::DimensionMismatch(format!(
            "requested a basis of dimension {} from {} columns",
            dimension, cols
        )));
    }
    Ok(a.slice(s![.., cols - dimension..]).to_owned())
}

impl fmt::Display for Svd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "svd<{}x{}>:", self.m, self.n)?;
        writeln!(f, "U = {}", self.u)?;
        writeln!(f, "W = {}", self.w)?;
        writeln!(f, "V = {}", self.v)?;
        write!(f, "rank = {}", self.rank)
    }
}
