//! Terminal goal constraint x_N - x_goal = 0

use nalgebra::{DMatrixViewMut, DVector};
use serde::{Deserialize, Serialize};

use super::{ConstraintKind, TerminalConstraint};
use crate::ModelError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalConstraint {
    pub goal: DVector<f64>,
}

impl GoalConstraint {
    pub fn new(goal: DVector<f64>) -> Self {
        Self { goal }
    }
}

impl TerminalConstraint for GoalConstraint {
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Equality
    }

    fn dim(&self) -> usize {
        self.goal.len()
    }

    fn check_dims(&self, state_dim: usize) -> Result<(), ModelError> {
        ModelError::check_dim("goal", state_dim, self.goal.len())
    }

    fn evaluate(&self, x: &DVector<f64>, out: &mut [f64]) {
        for (i, o) in out.iter_mut().enumerate() {
            *o = x[i] - self.goal[i];
        }
    }

    fn jacobian(&self, _x: &DVector<f64>, jx: &mut DMatrixViewMut<'_, f64>) {
        jx.fill_with_identity();
    }
}
