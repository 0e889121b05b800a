//! Quadratic tracking cost
//!
//! ```text
//! ℓ(x, u)  = ½ δxᵀ Q δx + ½ δuᵀ R δu + δuᵀ H δx
//! ℓ_N(x)   = ½ δxᵀ Q_f δx
//! δx = x - x_ref,  δu = u - u_ref
//! ```

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::{CostFunction, StageExpansion, TerminalExpansion};
use crate::ModelError;

/// Quadratic cost around a fixed state/control reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadraticCost {
    /// State weight (n×n)
    pub q: DMatrix<f64>,
    /// Control weight (m×m)
    pub r: DMatrix<f64>,
    /// Cross weight (m×n)
    pub h: DMatrix<f64>,
    /// Terminal state weight (n×n)
    pub qf: DMatrix<f64>,
    /// State reference (also the terminal target)
    pub x_ref: DVector<f64>,
    /// Control reference
    pub u_ref: DVector<f64>,
}

impl QuadraticCost {
    /// Create a cost with zero cross term and zero control reference
    pub fn new(
        q: DMatrix<f64>,
        r: DMatrix<f64>,
        qf: DMatrix<f64>,
        x_ref: DVector<f64>,
    ) -> Result<Self, ModelError> {
        let n = x_ref.len();
        let m = r.nrows();
        ModelError::check_dim("Q row", n, q.nrows())?;
        ModelError::check_dim("Q column", n, q.ncols())?;
        ModelError::check_dim("Qf row", n, qf.nrows())?;
        ModelError::check_dim("Qf column", n, qf.ncols())?;
        ModelError::check_dim("R column", m, r.ncols())?;
        Ok(Self {
            q,
            r,
            h: DMatrix::zeros(m, n),
            qf,
            x_ref,
            u_ref: DVector::zeros(m),
        })
    }

    /// Diagonal weights
    pub fn diagonal(
        q_diag: &[f64],
        r_diag: &[f64],
        qf_diag: &[f64],
        x_ref: DVector<f64>,
    ) -> Result<Self, ModelError> {
        Self::new(
            DMatrix::from_diagonal(&DVector::from_column_slice(q_diag)),
            DMatrix::from_diagonal(&DVector::from_column_slice(r_diag)),
            DMatrix::from_diagonal(&DVector::from_column_slice(qf_diag)),
            x_ref,
        )
    }

    pub fn with_control_reference(mut self, u_ref: DVector<f64>) -> Result<Self, ModelError> {
        ModelError::check_dim("control reference", self.r.nrows(), u_ref.len())?;
        self.u_ref = u_ref;
        Ok(self)
    }

    pub fn with_cross_term(mut self, h: DMatrix<f64>) -> Result<Self, ModelError> {
        ModelError::check_dim("H row", self.r.nrows(), h.nrows())?;
        ModelError::check_dim("H column", self.q.nrows(), h.ncols())?;
        self.h = h;
        Ok(self)
    }

    pub fn state_dim(&self) -> usize {
        self.x_ref.len()
    }

    pub fn control_dim(&self) -> usize {
        self.u_ref.len()
    }
}

impl CostFunction for QuadraticCost {
    fn stage_cost(&self, x: &DVector<f64>, u: &DVector<f64>) -> f64 {
        let dx = x - &self.x_ref;
        let du = u - &self.u_ref;
        0.5 * dx.dot(&(&self.q * &dx)) + 0.5 * du.dot(&(&self.r * &du)) + du.dot(&(&self.h * &dx))
    }

    fn terminal_cost(&self, x: &DVector<f64>) -> f64 {
        let dx = x - &self.x_ref;
        0.5 * dx.dot(&(&self.qf * &dx))
    }

    fn stage_expansion(&self, x: &DVector<f64>, u: &DVector<f64>, out: &mut StageExpansion) {
        let dx = x - &self.x_ref;
        let du = u - &self.u_ref;

        out.lx.gemv(1.0, &self.q, &dx, 0.0);
        out.lx.gemv_tr(1.0, &self.h, &du, 1.0);
        out.lu.gemv(1.0, &self.r, &du, 0.0);
        out.lu.gemv(1.0, &self.h, &dx, 1.0);
        out.lxx.copy_from(&self.q);
        out.luu.copy_from(&self.r);
        out.lux.copy_from(&self.h);
    }

    fn terminal_expansion(&self, x: &DVector<f64>, out: &mut TerminalExpansion) {
        let dx = x - &self.x_ref;
        out.lx.gemv(1.0, &self.qf, &dx, 0.0);
        out.lxx.copy_from(&self.qf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::numerical_jacobian;
    use approx::assert_relative_eq;

    fn test_cost() -> QuadraticCost {
        QuadraticCost::diagonal(&[1.0, 2.0], &[0.5], &[10.0, 10.0], DVector::from_vec(vec![1.0, 0.0]))
            .unwrap()
            .with_cross_term(DMatrix::from_row_slice(1, 2, &[0.1, -0.2]))
            .unwrap()
            .with_control_reference(DVector::from_vec(vec![0.3]))
            .unwrap()
    }

    #[test]
    fn test_zero_at_reference() {
        let cost = test_cost();
        let x = DVector::from_vec(vec![1.0, 0.0]);
        let u = DVector::from_vec(vec![0.3]);
        assert_relative_eq!(cost.stage_cost(&x, &u), 0.0);
        assert_relative_eq!(cost.terminal_cost(&x), 0.0);
    }

    #[test]
    fn test_stage_value() {
        let cost = test_cost();
        let x = DVector::from_vec(vec![2.0, 1.0]);
        let u = DVector::from_vec(vec![1.3]);
        // ½(1 + 2) + ½(0.5) + 1·(0.1 - 0.2)
        assert_relative_eq!(cost.stage_cost(&x, &u), 1.5 + 0.25 - 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let cost = test_cost();
        let x = DVector::from_vec(vec![0.4, -1.0]);
        let u = DVector::from_vec(vec![2.0]);
        let mut exp = StageExpansion::zeros(2, 1);
        cost.stage_expansion(&x, &u, &mut exp);

        let gx = numerical_jacobian(&x, 1e-6, |x| DVector::from_element(1, cost.stage_cost(x, &u)));
        let gu = numerical_jacobian(&u, 1e-6, |u| DVector::from_element(1, cost.stage_cost(&x, u)));
        assert_relative_eq!(exp.lx, gx.transpose().column(0).into_owned(), epsilon = 1e-6);
        assert_relative_eq!(exp.lu, gu.transpose().column(0).into_owned(), epsilon = 1e-6);
        assert_relative_eq!(exp.lux, cost.h, epsilon = 1e-12);
    }

    #[test]
    fn test_terminal_expansion() {
        let cost = test_cost();
        let mut exp = TerminalExpansion::zeros(2);
        cost.terminal_expansion(&DVector::from_vec(vec![2.0, 1.0]), &mut exp);
        assert_relative_eq!(exp.lx, DVector::from_vec(vec![10.0, 10.0]), epsilon = 1e-12);
        assert_relative_eq!(exp.lxx, cost.qf);
    }

    #[test]
    fn test_dimension_validation() {
        let result = QuadraticCost::new(
            DMatrix::identity(3, 3),
            DMatrix::identity(1, 1),
            DMatrix::identity(2, 2),
            DVector::zeros(2),
        );
        assert!(result.is_err());
    }
}
