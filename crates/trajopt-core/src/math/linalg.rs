//! Dense linear algebra helpers

use nalgebra::{Cholesky, DMatrix, DVector};

/// Replace `m` with its symmetric part, ½(m + mᵀ), in place
pub fn symmetrize(m: &mut DMatrix<f64>) {
    let n = m.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            let avg = 0.5 * (m[(i, j)] + m[(j, i)]);
            m[(i, j)] = avg;
            m[(j, i)] = avg;
        }
    }
}

/// Cholesky-based positive-definiteness test
pub fn is_positive_definite(m: &DMatrix<f64>) -> bool {
    m.is_square() && Cholesky::new(m.clone()).is_some()
}

/// Smallest eigenvalue of a symmetric matrix
pub fn min_eigenvalue(m: &DMatrix<f64>) -> f64 {
    m.clone()
        .symmetric_eigenvalues()
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min)
}

/// Largest absolute component, NaN-propagating
///
/// Returns NaN when any component is NaN so that overflow checks treat it
/// as out of bounds.
pub fn max_abs(v: &DVector<f64>) -> f64 {
    let mut out = 0.0_f64;
    for &value in v.iter() {
        if value.is_nan() {
            return f64::NAN;
        }
        out = out.max(value.abs());
    }
    out
}

/// Central-difference Jacobian of `f` at `x`
///
/// Used to cross-check analytic Jacobians of models and constraints.
pub fn numerical_jacobian<F>(x: &DVector<f64>, eps: f64, f: F) -> DMatrix<f64>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let rows = f(x).len();
    let mut jac = DMatrix::zeros(rows, x.len());
    let mut shifted = x.clone();
    for j in 0..x.len() {
        shifted[j] = x[j] + eps;
        let plus = f(&shifted);
        shifted[j] = x[j] - eps;
        let minus = f(&shifted);
        shifted[j] = x[j];
        jac.set_column(j, &((plus - minus) / (2.0 * eps)));
    }
    jac
}
