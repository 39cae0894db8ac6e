//! Golub-Kahan-Reinsch singular value decomposition kernel.
//!
//! Householder reflections reduce the input to upper bidiagonal form, the
//! reflections are accumulated into `U` and `V`, and an implicitly shifted QR
//! sweep drives the superdiagonal to zero. Singular values come out
//! non-negative and are sorted in decreasing order before returning.

use ndarray::{s, Array1, Array2, ArrayViewMut2};

use crate::error::{LmSvdError, Result};

/// Maximum number of QR sweeps spent on a single singular value.
pub const MAX_SWEEPS: usize = 75;

/// Raw factors of `M = U * diag(W) * V^T`.
#[derive(Debug, Clone)]
pub struct Factors {
    /// `m x n` left factor.
    pub u: Array2<f64>,
    /// Singular values, sorted decreasing.
    pub w: Array1<f64>,
    /// `n x n` right factor.
    pub v: Array2<f64>,
}

/// Decompose an arbitrary `m x n` matrix.
///
/// Wide inputs are handled through their transpose: with `M^T = P S Q^T`,
/// `U` is `Q` followed by `n - m` zero columns, `W` is `S` padded with zeros
/// and `V` is `P` completed to an orthonormal basis of `R^n`.
pub fn decompose(matrix: &Array2<f64>) -> Result<Factors> {
    let (m, n) = matrix.dim();

    if m == 0 || n == 0 {
        return Ok(Factors {
            u: Array2::zeros((m, n)),
            w: Array1::zeros(n),
            v: Array2::eye(n),
        });
    }

    if matrix.iter().any(|x| !x.is_finite()) {
        return Err(LmSvdError::InvalidInput(
            "matrix contains non-finite entries".to_string(),
        ));
    }

    if m >= n {
        Ok(sort_decreasing(golub_kahan(matrix.clone())?))
    } else {
        decompose_wide(matrix)
    }
}

fn decompose_wide(matrix: &Array2<f64>) -> Result<Factors> {
    let (m, n) = matrix.dim();
    let inner = sort_decreasing(golub_kahan(matrix.t().to_owned())?);

    let mut u = Array2::zeros((m, n));
    u.slice_mut(s![.., ..m]).assign(&inner.v);

    let mut w = Array1::zeros(n);
    w.slice_mut(s![..m]).assign(&inner.w);

    let mut v = Array2::zeros((n, n));
    v.slice_mut(s![.., ..m]).assign(&inner.u);
    v.slice_mut(s![.., m..]).assign(&orthogonal_complement(&inner.u));

    Ok(Factors { u, w, v })
}

/// Apply the reflector `I - 2 r r^T` (unit `r`) to every column of `block`.
fn reflect(reflector: &Array1<f64>, mut block: ArrayViewMut2<f64>) {
    let projections = reflector.dot(&block);
    for (mut col, &p) in block.columns_mut().into_iter().zip(projections.iter()) {
        col.scaled_add(-2.0 * p, reflector);
    }
}

/// Orthonormal basis of the complement of the column space of `p`, which
/// must have orthonormal columns. The basis is the trailing `n - k` columns
/// of the orthogonal factor of a Householder QR of `p`.
fn orthogonal_complement(p: &Array2<f64>) -> Array2<f64> {
    let (n, k) = p.dim();
    let mut a = p.clone();
    let mut reflectors = Vec::with_capacity(k);

    for j in 0..k {
        let mut r = a.slice(s![j.., j]).to_owned();
        let norm = r.dot(&r).sqrt();
        let alpha = -with_sign(norm, r[0]);
        r[0] -= alpha;
        let length = r.dot(&r).sqrt();
        if length > 0.0 {
            r /= length;
        }
        reflect(&r, a.slice_mut(s![j.., j..]));
        reflectors.push(r);
    }

    let mut q = Array2::zeros((n, n - k));
    for i in 0..n - k {
        q[[k + i, i]] = 1.0;
    }
    for (j, r) in reflectors.iter().enumerate().rev() {
        reflect(r, q.slice_mut(s![j.., ..]));
    }
    q
}

#[inline]
fn with_sign(magnitude: f64, sign_of: f64) -> f64 {
    if sign_of >= 0.0 {
        magnitude.abs()
    } else {
        -magnitude.abs()
    }
}

/// The Golub-Kahan-Reinsch procedure on a tall (`m >= n`) matrix.
///
/// `a` is overwritten and returned as `U`.
fn golub_kahan(mut a: Array2<f64>) -> Result<Factors> {
    let (m, n) = a.dim();
    let mut w = Array1::<f64>::zeros(n);
    let mut v = Array2::<f64>::zeros((n, n));
    let mut rv1 = vec![0.0_f64; n];

    let mut g = 0.0_f64;
    let mut scale = 0.0_f64;
    let mut anorm = 0.0_f64;
    let mut l = 0;

    // Householder reduction to bidiagonal form.
    for i in 0..n {
        l = i + 1;
        rv1[i] = scale * g;
        g = 0.0;
        scale = 0.0;

        for k in i..m {
            scale += a[[k, i]].abs();
        }
        if scale != 0.0 {
            let mut s = 0.0;
            for k in i..m {
                a[[k, i]] /= scale;
                s += a[[k, i]] * a[[k, i]];
            }
            let f = a[[i, i]];
            g = -with_sign(s.sqrt(), f);
            let h = f * g - s;
            a[[i, i]] = f - g;
            for j in l..n {
                let mut s = 0.0;
                for k in i..m {
                    s += a[[k, i]] * a[[k, j]];
                }
                let f = s / h;
                for k in i..m {
                    let aki = a[[k, i]];
                    a[[k, j]] += f * aki;
                }
            }
            for k in i..m {
                a[[k, i]] *= scale;
            }
        }
        w[i] = scale * g;

        g = 0.0;
        scale = 0.0;
        if i != n - 1 {
            for k in l..n {
                scale += a[[i, k]].abs();
            }
            if scale != 0.0 {
                let mut s = 0.0;
                for k in l..n {
                    a[[i, k]] /= scale;
                    s += a[[i, k]] * a[[i, k]];
                }
                let f = a[[i, l]];
                g = -with_sign(s.sqrt(), f);
                let h = f * g - s;
                a[[i, l]] = f - g;
                for k in l..n {
                    rv1[k] = a[[i, k]] / h;
                }
                for j in l..m {
                    let mut s = 0.0;
                    for k in l..n {
                        s += a[[j, k]] * a[[i, k]];
                    }
                    for k in l..n {
                        a[[j, k]] += s * rv1[k];
                    }
                }
                for k in l..n {
                    a[[i, k]] *= scale;
                }
            }
        }
        anorm = anorm.max(w[i].abs() + rv1[i].abs());
    }

    // Accumulate the right-hand transformations.
    for i in (0..n).rev() {
        if i < n - 1 {
            if g != 0.0 {
                // Double division avoids possible underflow.
                for j in l..n {
                    v[[j, i]] = (a[[i, j]] / a[[i, l]]) / g;
                }
                for j in l..n {
                    let mut s = 0.0;
                    for k in l..n {
                        s += a[[i, k]] * v[[k, j]];
                    }
                    for k in l..n {
                        let vki = v[[k, i]];
                        v[[k, j]] += s * vki;
                    }
                }
            }
            for j in l..n {
                v[[i, j]] = 0.0;
                v[[j, i]] = 0.0;
            }
        }
        v[[i, i]] = 1.0;
        g = rv1[i];
        l = i;
    }

    // Accumulate the left-hand transformations.
    for i in (0..n).rev() {
        let l = i + 1;
        let mut g = w[i];
        for j in l..n {
            a[[i, j]] = 0.0;
        }
        if g != 0.0 {
            g = 1.0 / g;
            for j in l..n {
                let mut s = 0.0;
                for k in l..m {
                    s += a[[k, i]] * a[[k, j]];
                }
                let f = (s / a[[i, i]]) * g;
                for k in i..m {
                    let aki = a[[k, i]];
                    a[[k, j]] += f * aki;
                }
            }
            for j in i..m {
                a[[j, i]] *= g;
            }
        } else {
            for j in i..m {
                a[[j, i]] = 0.0;
            }
        }
        a[[i, i]] += 1.0;
    }

    // Diagonalise the bidiagonal form.
    let negligible = |x: f64| x.abs() <= f64::EPSILON * anorm;

    for k in (0..n).rev() {
        let mut sweeps = 0;
        loop {
            // Find the start of the unreduced block ending at k. rv1[0] is
            // always zero, so the search terminates at l == 0 at the latest.
            let mut split = false;
            let mut l = k;
            loop {
                if negligible(rv1[l]) {
                    split = true;
                    break;
                }
                if negligible(w[l - 1]) {
                    break;
                }
                l -= 1;
            }

            if !split {
                // w[l - 1] is negligible: cancel rv1[l] with Givens rotations.
                let nm = l - 1;
                let mut c = 0.0;
                let mut s = 1.0;
                for i in l..=k {
                    let f = s * rv1[i];
                    rv1[i] *= c;
                    if negligible(f) {
                        break;
                    }
                    let g = w[i];
                    let h = f.hypot(g);
                    w[i] = h;
                    c = g / h;
                    s = -f / h;
                    for j in 0..m {
                        let y = a[[j, nm]];
                        let z = a[[j, i]];
                        a[[j, nm]] = y * c + z * s;
                        a[[j, i]] = z * c - y * s;
                    }
                }
            }

            let z = w[k];
            if l == k {
                // Converged: make the singular value non-negative.
                if z < 0.0 {
                    w[k] = -z;
                    v.column_mut(k).mapv_inplace(|x| -x);
                }
                break;
            }

            if sweeps == MAX_SWEEPS {
                return Err(LmSvdError::SvdNoConvergence {
                    index: k,
                    iterations: sweeps,
                });
            }
            sweeps += 1;

            // Wilkinson shift from the bottom 2x2 minor.
            let mut x = w[l];
            let nm = k - 1;
            let mut y = w[nm];
            let mut g = rv1[nm];
            let mut h = rv1[k];
            let mut f = ((y - z) * (y + z) + (g - h) * (g + h)) / (2.0 * h * y);
            g = f.hypot(1.0);
            f = ((x - z) * (x + z) + h * ((y / (f + with_sign(g, f))) - h)) / x;

            // Next QR transformation.
            let mut c = 1.0;
            let mut s = 1.0;
            for j in l..=nm {
                let i = j + 1;
                g = rv1[i];
                y = w[i];
                h = s * g;
                g *= c;
                let mut z = f.hypot(h);
                rv1[j] = z;
                c = f / z;
                s = h / z;
                f = x * c + g * s;
                g = g * c - x * s;
                h = y * s;
                y *= c;
                for jj in 0..n {
                    let x = v[[jj, j]];
                    let z = v[[jj, i]];
                    v[[jj, j]] = x * c + z * s;
                    v[[jj, i]] = z * c - x * s;
                }
                z = f.hypot(h);
                w[j] = z;
                if z != 0.0 {
                    z = 1.0 / z;
                    c = f * z;
                    s = h * z;
                }
                f = c * g + s * y;
                x = c * y - s * g;
                for jj in 0..m {
                    let y = a[[jj, j]];
                    let z = a[[jj, i]];
                    a[[jj, j]] = y * c + z * s;
                    a[[jj, i]] = z * c - y * s;
                }
            }
            rv1[l] = 0.0;
            rv1[k] = f;
            w[k] = x;
        }
    }

    Ok(Factors { u: a, w, v })
}

/// Reorder singular values (and the matching columns of `U` and `V`) so
/// that they decrease.
fn sort_decreasing(factors: Factors) -> Factors {
    let n = factors.w.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| factors.w[j].total_cmp(&factors.w[i]));

    if order.iter().enumerate().all(|(pos, &idx)| pos == idx) {
        return factors;
    }

    let mut u = Array2::zeros(factors.u.raw_dim());
    let mut v = Array2::zeros(factors.v.raw_dim());
    let mut w = Array1::zeros(n);
    for (dst, &src) in order.iter().enumerate() {
        u.column_mut(dst).assign(&factors.u.column(src));
        v.column_mut(dst).assign(&factors.v.column(src));
        w[dst] = factors.w[src];
    }

    Factors { u, w, v }
}
