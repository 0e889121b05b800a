//! Control magnitude limit ‖u‖ ≤ r, written as ‖u‖² - r² ≤ 0

use nalgebra::{DMatrixViewMut, DVector};
use serde::{Deserialize, Serialize};

use super::{ConstraintKind, StageConstraint};
use crate::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlNorm {
    pub radius: f64,
}

impl ControlNorm {
    pub fn new(radius: f64) -> Result<Self, ModelError> {
        if !(radius > 0.0 && radius.is_finite()) {
            return Err(ModelError::InvalidParameter(format!(
                "control norm radius must be positive, got {}",
                radius
            )));
        }
        Ok(Self { radius })
    }
}

impl StageConstraint for ControlNorm {
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Inequality
    }

    fn dim(&self) -> usize {
        1
    }

    fn evaluate(&self, _x: &DVector<f64>, u: &DVector<f64>, out: &mut [f64]) {
        out[0] = u.norm_squared() - self.radius * self.radius;
    }

    fn jacobian(
        &self,
        _x: &DVector<f64>,
        u: &DVector<f64>,
        _jx: &mut DMatrixViewMut<'_, f64>,
        ju: &mut DMatrixViewMut<'_, f64>,
    ) {
        for (j, &uj) in u.iter().enumerate() {
            ju[(0, j)] = 2.0 * uj;
        }
    }
}
