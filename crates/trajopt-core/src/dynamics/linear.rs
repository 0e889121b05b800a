//! Linear discrete-time system x⁺ = A x + B u
//!
//! The time step is baked into (A, B); the `dt` argument is ignored.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::DiscreteDynamics;
use crate::ModelError;

/// Linear time-invariant discrete system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearDiscrete {
    a: DMatrix<f64>,
    b: DMatrix<f64>,
}

impl LinearDiscrete {
    pub fn new(a: DMatrix<f64>, b: DMatrix<f64>) -> Result<Self, ModelError> {
        ModelError::check_dim("A column", a.nrows(), a.ncols())?;
        ModelError::check_dim("B row", a.nrows(), b.nrows())?;
        Ok(Self { a, b })
    }

    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn b(&self) -> &DMatrix<f64> {
        &self.b
    }
}

impl DiscreteDynamics for LinearDiscrete {
    fn state_dim(&self) -> usize {
        self.a.nrows()
    }

    fn control_dim(&self) -> usize {
        self.b.ncols()
    }

    fn step(&self, x: &DVector<f64>, u: &DVector<f64>, _dt: f64, x_next: &mut DVector<f64>) {
        x_next.gemv(1.0, &self.a, x, 0.0);
        x_next.gemv(1.0, &self.b, u, 1.0);
    }

    fn step_jacobian(
        &self,
        _x: &DVector<f64>,
        _u: &DVector<f64>,
        _dt: f64,
        a: &mut DMatrix<f64>,
        b: &mut DMatrix<f64>,
    ) {
        a.copy_from(&self.a);
        b.copy_from(&self.b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rejects_non_square_a() {
        let err = LinearDiscrete::new(DMatrix::zeros(2, 3), DMatrix::zeros(2, 1)).unwrap_err();
        assert!(matches!(err, ModelError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_rejects_mismatched_b() {
        assert!(LinearDiscrete::new(DMatrix::identity(2, 2), DMatrix::zeros(3, 1)).is_err());
    }

    #[test]
    fn test_step() {
        let sys = LinearDiscrete::new(
            DMatrix::from_row_slice(2, 2, &[1.0, 0.1, 0.0, 1.0]),
            DMatrix::from_row_slice(2, 1, &[0.0, 0.1]),
        )
        .unwrap();
        let mut next = DVector::zeros(2);
        sys.step(&DVector::from_vec(vec![1.0, 2.0]), &DVector::from_vec(vec![3.0]), 0.0, &mut next);
        assert_relative_eq!(next[0], 1.2, epsilon = 1e-12);
        assert_relative_eq!(next[1], 2.3, epsilon = 1e-12);
    }
}
