//! Small numeric helpers shared by the SVD engine and the minimizer.

use ndarray::{Array1, ArrayView1, ArrayView2};

/// Euclidean norm computed with a running scale so that large or tiny
/// components neither overflow nor underflow.
pub fn enorm(v: ArrayView1<f64>) -> f64 {
    let mut scale = 0.0_f64;
    let mut ssq = 1.0_f64;

    for &x in v.iter() {
        if x != 0.0 {
            let ax = x.abs();
            if scale < ax {
                ssq = 1.0 + ssq * (scale / ax).powi(2);
                scale = ax;
            } else {
                ssq += (ax / scale).powi(2);
            }
        }
    }

    scale * ssq.sqrt()
}

/// Root-mean-square of a vector. An empty vector has zero RMS.
pub fn rms(v: ArrayView1<f64>) -> f64 {
    if v.is_empty() {
        0.0
    } else {
        enorm(v) / (v.len() as f64).sqrt()
    }
}

/// Euclidean norm of every column of `a`.
pub fn column_norms(a: ArrayView2<f64>) -> Array1<f64> {
    a.columns().into_iter().map(enorm).collect()
}
