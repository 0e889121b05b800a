//! Box bounds on controls and states
//!
//! Only finite bounds produce constraint rows: an upper bound uᵢ ≤ bᵢ
//! becomes uᵢ - bᵢ ≤ 0 and a lower bound aᵢ ≤ uᵢ becomes aᵢ - uᵢ ≤ 0.

use nalgebra::{DMatrixViewMut, DVector};
use serde::{Deserialize, Serialize};

use super::{ConstraintKind, StageConstraint, TerminalConstraint};
use crate::ModelError;

/// Row layout shared by control and state boxes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BoxRows {
    lower: DVector<f64>,
    upper: DVector<f64>,
    /// Indices with a finite upper bound
    upper_idx: Vec<usize>,
    /// Indices with a finite lower bound
    lower_idx: Vec<usize>,
}

impl BoxRows {
    fn new(lower: DVector<f64>, upper: DVector<f64>) -> Result<Self, ModelError> {
        ModelError::check_dim("upper bound", lower.len(), upper.len())?;
        if let Some(i) = (0..lower.len()).find(|&i| lower[i] > upper[i] || lower[i].is_nan() || upper[i].is_nan()) {
            return Err(ModelError::InvalidParameter(format!(
                "bound {} has lower {} above upper {}",
                i, lower[i], upper[i]
            )));
        }
        let upper_idx = (0..upper.len()).filter(|&i| upper[i].is_finite()).collect();
        let lower_idx = (0..lower.len()).filter(|&i| lower[i].is_finite()).collect();
        Ok(Self {
            lower,
            upper,
            upper_idx,
            lower_idx,
        })
    }

    fn len(&self) -> usize {
        self.lower.len()
    }

    fn dim(&self) -> usize {
        self.upper_idx.len() + self.lower_idx.len()
    }

    fn evaluate(&self, v: &DVector<f64>, out: &mut [f64]) {
        let mut row = 0;
        for &i in &self.upper_idx {
            out[row] = v[i] - self.upper[i];
            row += 1;
        }
        for &i in &self.lower_idx {
            out[row] = self.lower[i] - v[i];
            row += 1;
        }
    }

    fn jacobian(&self, jac: &mut DMatrixViewMut<'_, f64>) {
        let mut row = 0;
        for &i in &self.upper_idx {
            jac[(row, i)] = 1.0;
            row += 1;
        }
        for &i in &self.lower_idx {
            jac[(row, i)] = -1.0;
            row += 1;
        }
    }
}

/// Box limits on the control, lower ≤ u ≤ upper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlBound {
    rows: BoxRows,
}

impl ControlBound {
    pub fn new(lower: DVector<f64>, upper: DVector<f64>) -> Result<Self, ModelError> {
        Ok(Self {
            rows: BoxRows::new(lower, upper)?,
        })
    }

    /// |uᵢ| ≤ limit for every component
    pub fn symmetric(control_dim: usize, limit: f64) -> Result<Self, ModelError> {
        Self::new(
            DVector::from_element(control_dim, -limit),
            DVector::from_element(control_dim, limit),
        )
    }

    pub fn lower(&self) -> &DVector<f64> {
        &self.rows.lower
    }

    pub fn upper(&self) -> &DVector<f64> {
        &self.rows.upper
    }
}

impl StageConstraint for ControlBound {
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Inequality
    }

    fn dim(&self) -> usize {
        self.rows.dim()
    }

    fn check_dims(&self, _state_dim: usize, control_dim: usize) -> Result<(), ModelError> {
        ModelError::check_dim("control bound", control_dim, self.rows.len())
    }

    fn evaluate(&self, _x: &DVector<f64>, u: &DVector<f64>, out: &mut [f64]) {
        self.rows.evaluate(u, out);
    }

    fn jacobian(
        &self,
        _x: &DVector<f64>,
        _u: &DVector<f64>,
        _jx: &mut DMatrixViewMut<'_, f64>,
        ju: &mut DMatrixViewMut<'_, f64>,
    ) {
        self.rows.jacobian(ju);
    }
}

/// Box limits on the state, lower ≤ x ≤ upper
///
/// Usable both as a stage and as a terminal constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateBound {
    rows: BoxRows,
}

impl StateBound {
    pub fn new(lower: DVector<f64>, upper: DVector<f64>) -> Result<Self, ModelError> {
        Ok(Self {
            rows: BoxRows::new(lower, upper)?,
        })
    }
}

impl StageConstraint for StateBound {
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Inequality
    }

    fn dim(&self) -> usize {
        self.rows.dim()
    }

    fn check_dims(&self, state_dim: usize, _control_dim: usize) -> Result<(), ModelError> {
        ModelError::check_dim("state bound", state_dim, self.rows.len())
    }

    fn evaluate(&self, x: &DVector<f64>, _u: &DVector<f64>, out: &mut [f64]) {
        self.rows.evaluate(x, out);
    }

    fn jacobian(
        &self,
        _x: &DVector<f64>,
        _u: &DVector<f64>,
        jx: &mut DMatrixViewMut<'_, f64>,
        _ju: &mut DMatrixViewMut<'_, f64>,
    ) {
        self.rows.jacobian(jx);
    }
}

impl TerminalConstraint for StateBound {
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Inequality
    }

    fn dim(&self) -> usize {
        self.rows.dim()
    }

    fn check_dims(&self, state_dim: usize) -> Result<(), ModelError> {
        ModelError::check_dim("state bound", state_dim, self.rows.len())
    }

    fn evaluate(&self, x: &DVector<f64>, out: &mut [f64]) {
        self.rows.evaluate(x, out);
    }

    fn jacobian(&self, _x: &DVector<f64>, jx: &mut DMatrixViewMut<'_, f64>) {
        self.rows.jacobian(jx);
    }
}
