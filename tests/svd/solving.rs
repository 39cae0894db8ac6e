//! Inverses and least-squares solves.

use approx::assert_relative_eq;
use lmsvd_rs::svd::Svd;
use ndarray::{Array1, Array2};

use crate::test_helpers::{array_approx_eq, matrix_approx_eq, random_matrix, random_matrix_of_rank};

#[test]
fn test_pseudo_inverse_equals_inverse_for_nonsingular() {
    let a = random_matrix(6, 6, 42);
    let svd = Svd::new(&a, 0.0).unwrap();

    let inverse = svd.inverse().unwrap();
    assert!(matrix_approx_eq(&inverse, &svd.pseudo_inverse(), 1e-12));
    assert!(matrix_approx_eq(&a.dot(&inverse), &Array2::eye(6), 1e-9));
    assert!(matrix_approx_eq(&svd.tinverse().unwrap(), &inverse.t().to_owned(), 1e-12));
}

#[test]
fn test_pseudo_inverse_penrose_conditions() {
    let a = random_matrix_of_rank(7, 5, 3, 5);
    let svd = Svd::new(&a, -1e-10).unwrap();
    let pinv = svd.pseudo_inverse();

    assert!(matrix_approx_eq(&a.dot(&pinv).dot(&a), &a, 1e-9));
    assert!(matrix_approx_eq(&pinv.dot(&a).dot(&pinv), &pinv, 1e-9));
    let ap = a.dot(&pinv);
    assert!(matrix_approx_eq(&ap, &ap.t().to_owned(), 1e-10));
}

#[test]
fn test_truncated_pseudo_inverse() {
    let a = random_matrix(5, 4, 8);
    let svd = Svd::new(&a, 0.0).unwrap();

    assert!(matrix_approx_eq(&svd.pseudo_inverse_with_rank(4), &svd.pseudo_inverse(), 1e-14));
    assert!(svd.pseudo_inverse_with_rank(0).iter().all(|&x| x == 0.0));

    // The rank-1 pseudo-inverse only sees the dominant direction.
    let p1 = svd.pseudo_inverse_with_rank(1);
    let u0 = svd.u().column(0).to_owned();
    let image = p1.dot(&u0);
    let expected = svd.v().column(0).mapv(|x| x / svd.w()[0]);
    assert!(array_approx_eq(&image, &expected, 1e-12));
}

#[test]
fn test_solve_consistent_overdetermined_system() {
    let a = random_matrix(10, 4, 9);
    let x_true = Array1::from_vec(vec![1.0, -2.0, 0.5, 3.0]);
    let b = a.dot(&x_true);

    let svd = Svd::new(&a, 0.0).unwrap();
    let x = svd.solve(&b).unwrap();
    assert!(array_approx_eq(&x, &x_true, 1e-10));
}

#[test]
fn test_solve_least_squares_residual_is_orthogonal() {
    let a = random_matrix(12, 3, 10);
    let b = random_matrix(12, 1, 11).column(0).to_owned();

    let svd = Svd::new(&a, 0.0).unwrap();
    let x = svd.solve(&b).unwrap();
    let residual = &a.dot(&x) - &b;
    let gradient = a.t().dot(&residual);
    assert!(gradient.iter().all(|g| g.abs() < 1e-12));
}

#[test]
fn test_solve_underdetermined_gives_minimum_norm() {
    let a = random_matrix(3, 6, 12);
    let b = Array1::from_vec(vec![1.0, 2.0, 3.0]);

    let svd = Svd::new(&a, -1e-12).unwrap();
    assert_eq!(svd.rank(), 3);
    let x = svd.solve(&b).unwrap();
    assert!(array_approx_eq(&a.dot(&x), &b, 1e-10));

    // Minimum norm: no component in the null space.
    let nullspace = svd.nullspace();
    assert_eq!(nullspace.ncols(), 3);
    assert!(nullspace.t().dot(&x).iter().all(|c| c.abs() < 1e-10));
}

#[test]
fn test_solve_matrix_matches_columnwise_solve() {
    let a = random_matrix(8, 5, 13);
    let rhs = random_matrix(8, 3, 14);
    let svd = Svd::new(&a, 0.0).unwrap();

    let all = svd.solve_matrix(&rhs).unwrap();
    for j in 0..3 {
        let single = svd.solve(&rhs.column(j).to_owned()).unwrap();
        for i in 0..5 {
            assert_relative_eq!(all[[i, j]], single[i], epsilon = 1e-12);
        }
    }
}
