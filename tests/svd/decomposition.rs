//! Structural properties of the decomposition on random matrices.

use approx::assert_relative_eq;
use lmsvd_rs::svd::Svd;
use lmsvd_rs::LmSvdError;
use nalgebra::DMatrix;
use ndarray::{array, Array2};
use rayon::prelude::*;

use crate::test_helpers::{matrix_approx_eq, max_abs_diff, random_matrix, random_matrix_of_rank};

const SHAPES: [(usize, usize); 8] = [
    (1, 1),
    (4, 4),
    (7, 3),
    (3, 7),
    (10, 1),
    (1, 6),
    (12, 12),
    (20, 5),
];

#[test]
fn test_reconstruction() {
    for (seed, &(m, n)) in SHAPES.iter().enumerate() {
        let a = random_matrix(m, n, seed as u64);
        let svd = Svd::new(&a, 0.0).unwrap();

        assert_eq!(svd.u().dim(), (m, n));
        assert_eq!(svd.w().len(), n);
        assert_eq!(svd.v().dim(), (n, n));
        assert!(
            max_abs_diff(&svd.recompose(), &a) < 1e-12,
            "reconstruction failed for {}x{}",
            m,
            n
        );
    }
}

#[test]
fn test_singular_vectors_are_orthonormal() {
    for (seed, &(m, n)) in SHAPES.iter().enumerate() {
        let a = random_matrix(m, n, 100 + seed as u64);
        let svd = Svd::new(&a, 0.0).unwrap();

        let vtv = svd.v().t().dot(svd.v());
        assert!(matrix_approx_eq(&vtv, &Array2::eye(n), 1e-12));

        // Wide matrices have n - m zero singular values whose U columns vanish.
        let k = m.min(n);
        let u = svd.u().slice(ndarray::s![.., ..k]).to_owned();
        let utu = u.t().dot(&u);
        assert!(matrix_approx_eq(&utu, &Array2::eye(k), 1e-12));
    }
}

#[test]
fn test_singular_values_sorted_and_non_negative() {
    for (seed, &(m, n)) in SHAPES.iter().enumerate() {
        let svd = Svd::new(&random_matrix(m, n, 200 + seed as u64), 0.0).unwrap();
        let w = svd.w();
        assert!(w.iter().all(|&x| x >= 0.0));
        assert!(w.windows(2).into_iter().all(|pair| pair[0] >= pair[1]));
        assert_relative_eq!(svd.norm(), w[0]);
    }
}

#[test]
fn test_singular_values_match_nalgebra() {
    for (seed, &(m, n)) in SHAPES.iter().enumerate() {
        let a = random_matrix(m, n, 300 + seed as u64);
        let svd = Svd::new(&a, 0.0).unwrap();

        let reference = DMatrix::from_row_slice(m, n, a.as_slice().unwrap());
        let mut expected: Vec<f64> = reference.singular_values().iter().copied().collect();
        expected.sort_by(|x, y| y.partial_cmp(x).unwrap());

        // nalgebra reports min(m, n) values; the rest are zero here.
        for (k, &value) in svd.w().iter().enumerate() {
            let reference_value = expected.get(k).copied().unwrap_or(0.0);
            assert_relative_eq!(value, reference_value, epsilon = 1e-10);
        }
    }
}

#[test]
fn test_rank_is_monotone_in_tolerance() {
    let a = random_matrix(8, 6, 7);
    let mut svd = Svd::new(&a, 0.0).unwrap();
    let mut previous = svd.rank();
    assert_eq!(previous, 6);

    for tol in [1e-6, 1e-3, 0.1, 0.5, 1.0, 2.0, 10.0] {
        svd.zero_out_absolute(tol);
        assert!(svd.rank() <= previous);
        assert_eq!(svd.rank() + svd.singularities(), 6);
        previous = svd.rank();
    }
    assert_eq!(previous, 0);
}

#[test]
fn test_rank_deficient_nullspaces() {
    let a = random_matrix_of_rank(9, 6, 3, 11);
    let svd = Svd::new(&a, -1e-10).unwrap();
    assert_eq!(svd.rank(), 3);

    let nullspace = svd.nullspace();
    assert_eq!(nullspace.dim(), (6, 3));
    assert!(a.dot(&nullspace).iter().all(|x| x.abs() < 1e-12));

    let left = svd.left_nullspace();
    assert_eq!(left.ncols(), 3);
    assert!(left.t().dot(&a).iter().all(|x| x.abs() < 1e-12));

    let v = svd.nullvector().unwrap();
    assert!(a.dot(&v).iter().all(|x| x.abs() < 1e-12));
    assert_relative_eq!(v.dot(&v), 1.0, epsilon = 1e-12);

    assert_eq!(svd.nullspace_with_dimension(2).unwrap().ncols(), 2);
    assert!(matches!(
        svd.nullspace_with_dimension(7),
        Err(LmSvdError::DimensionMismatch(_))
    ));
}

#[test]
fn test_wide_rank_deficient_left_nullspace() {
    let a = array![[1.0, 2.0, 3.0], [2.0, 4.0, 6.0]];
    let svd = Svd::new(&a, -1e-12).unwrap();
    assert_eq!(svd.rank(), 1);

    let left = svd.left_nullspace();
    assert_eq!(left.dim(), (2, 1));
    assert!(matrix_approx_eq(&left.t().dot(&left), &Array2::eye(1), 1e-12));
    assert!(left.t().dot(&a).iter().all(|x| x.abs() < 1e-12));

    // (2, -1) / sqrt(5) up to sign.
    let lv = svd.left_nullvector().unwrap();
    assert_relative_eq!(lv[0].abs(), 2.0 / 5.0f64.sqrt(), epsilon = 1e-12);
    assert_relative_eq!(lv[0], -2.0 * lv[1], epsilon = 1e-12);

    let nullspace = svd.nullspace();
    assert_eq!(nullspace.dim(), (3, 2));
    assert!(matrix_approx_eq(&nullspace.t().dot(&nullspace), &Array2::eye(2), 1e-12));
    assert!(a.dot(&nullspace).iter().all(|x| x.abs() < 1e-12));

    assert_eq!(svd.left_nullspace_with_dimension(2).unwrap().dim(), (2, 2));
    assert!(matches!(
        svd.left_nullspace_with_dimension(3),
        Err(LmSvdError::DimensionMismatch(_))
    ));
}

#[test]
fn test_wide_full_rank_left_nullspace_is_empty() {
    let a = array![[1.0, 0.0, 2.0], [0.0, 1.0, 0.0]];
    let svd = Svd::new(&a, 0.0).unwrap();
    assert_eq!(svd.rank(), 2);
    assert_eq!(svd.left_nullspace().dim(), (2, 0));

    let lv = svd.left_nullvector().unwrap();
    assert_relative_eq!(lv.dot(&lv), 1.0, epsilon = 1e-12);

    let v = svd.nullvector().unwrap();
    assert!(a.dot(&v).iter().all(|x| x.abs() < 1e-12));
}

#[test]
fn test_random_wide_nullspaces() {
    let a = random_matrix_of_rank(4, 9, 2, 21);
    let svd = Svd::new(&a, -1e-10).unwrap();
    assert_eq!(svd.rank(), 2);

    let left = svd.left_nullspace();
    assert_eq!(left.dim(), (4, 2));
    assert!(matrix_approx_eq(&left.t().dot(&left), &Array2::eye(2), 1e-12));
    assert!(left.t().dot(&a).iter().all(|x| x.abs() < 1e-10));

    let nullspace = svd.nullspace();
    assert_eq!(nullspace.dim(), (9, 7));
    assert!(matrix_approx_eq(&nullspace.t().dot(&nullspace), &Array2::eye(7), 1e-12));
    assert!(a.dot(&nullspace).iter().all(|x| x.abs() < 1e-10));
}

#[test]
fn test_zero_and_empty_matrices() {
    let svd = Svd::new(&Array2::zeros((3, 2)), 0.0).unwrap();
    assert_eq!(svd.rank(), 0);
    assert_eq!(svd.well_condition(), 0.0);
    assert_eq!(svd.norm(), 0.0);
    assert!(svd.pseudo_inverse().iter().all(|&x| x == 0.0));

    let empty = Svd::new(&Array2::zeros((0, 0)), 0.0).unwrap();
    assert_eq!(empty.rank(), 0);
    assert_eq!(empty.w().len(), 0);
}

#[test]
fn test_non_finite_input_is_rejected() {
    let a = array![[1.0, f64::NAN], [0.0, 1.0]];
    assert!(matches!(Svd::new(&a, 0.0), Err(LmSvdError::InvalidInput(_))));
}

#[test]
fn test_determinant_magnitude_of_triangular_matrix() {
    let a = array![[2.0, 5.0, -1.0], [0.0, -3.0, 4.0], [0.0, 0.0, 0.5]];
    let svd = Svd::new(&a, 0.0).unwrap();
    assert_relative_eq!(svd.determinant_magnitude(), 3.0, epsilon = 1e-12);
}

#[test]
fn test_independent_decompositions_in_parallel() {
    let errors: Vec<f64> = (0..32u64)
        .into_par_iter()
        .map(|seed| {
            let a = random_matrix(15, 8, 1000 + seed);
            let svd = Svd::new(&a, 0.0).unwrap();
            max_abs_diff(&svd.recompose(), &a)
        })
        .collect();

    assert_eq!(errors.len(), 32);
    assert!(errors.iter().all(|&e| e < 1e-12));
}
