//! Composition of constraint blocks
//!
//! A [`ConstraintList`] holds the stage blocks and the terminal blocks as
//! two separate arrays. Each block gets its row offset when it is added,
//! and the per-component kinds are expanded once, so evaluation is a
//! straight loop over blocks with no lookup by name.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use super::{ConstraintKind, StageConstraint, TerminalConstraint};
use crate::ModelError;

/// Stage and terminal constraint blocks with fixed row offsets
#[derive(Debug, Clone)]
pub struct ConstraintList {
    state_dim: usize,
    control_dim: usize,
    stage: Vec<Arc<dyn StageConstraint>>,
    stage_offsets: Vec<usize>,
    stage_kinds: Vec<ConstraintKind>,
    terminal: Vec<Arc<dyn TerminalConstraint>>,
    terminal_offsets: Vec<usize>,
    terminal_kinds: Vec<ConstraintKind>,
}

impl ConstraintList {
    /// Empty list for a problem with n states and m controls
    pub fn new(state_dim: usize, control_dim: usize) -> Self {
        Self {
            state_dim,
            control_dim,
            stage: Vec::new(),
            stage_offsets: Vec::new(),
            stage_kinds: Vec::new(),
            terminal: Vec::new(),
            terminal_offsets: Vec::new(),
            terminal_kinds: Vec::new(),
        }
    }

    /// Append a block applied at every stage knot 0..N-1
    pub fn with_stage<C: StageConstraint + 'static>(mut self, constraint: C) -> Result<Self, ModelError> {
        constraint.check_dims(self.state_dim, self.control_dim)?;
        self.stage_offsets.push(self.stage_kinds.len());
        self.stage_kinds
            .extend(std::iter::repeat(constraint.kind()).take(constraint.dim()));
        self.stage.push(Arc::new(constraint));
        Ok(self)
    }

    /// Append a block applied at the terminal knot
    pub fn with_terminal<C: TerminalConstraint + 'static>(
        mut self,
        constraint: C,
    ) -> Result<Self, ModelError> {
        constraint.check_dims(self.state_dim)?;
        self.terminal_offsets.push(self.terminal_kinds.len());
        self.terminal_kinds
            .extend(std::iter::repeat(constraint.kind()).take(constraint.dim()));
        self.terminal.push(Arc::new(constraint));
        Ok(self)
    }

    pub fn state_dim(&self) -> usize {
        self.state_dim
    }

    pub fn control_dim(&self) -> usize {
        self.control_dim
    }

    /// Total stage rows p
    pub fn stage_dim(&self) -> usize {
        self.stage_kinds.len()
    }

    /// Total terminal rows p_N
    pub fn terminal_dim(&self) -> usize {
        self.terminal_kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stage_dim() == 0 && self.terminal_dim() == 0
    }

    /// Kind of each stage row
    pub fn stage_kinds(&self) -> &[ConstraintKind] {
        &self.stage_kinds
    }

    /// Kind of each terminal row
    pub fn terminal_kinds(&self) -> &[ConstraintKind] {
        &self.terminal_kinds
    }

    /// Write all stage rows c(x, u) into `c` (length `stage_dim()`)
    pub fn evaluate_stage(&self, x: &DVector<f64>, u: &DVector<f64>, c: &mut DVector<f64>) {
        let out = c.as_mut_slice();
        for (block, &offset) in self.stage.iter().zip(&self.stage_offsets) {
            block.evaluate(x, u, &mut out[offset..offset + block.dim()]);
        }
    }

    /// Write the stage Jacobians into `cx` (p×n) and `cu` (p×m)
    pub fn stage_jacobian(
        &self,
        x: &DVector<f64>,
        u: &DVector<f64>,
        cx: &mut DMatrix<f64>,
        cu: &mut DMatrix<f64>,
    ) {
        cx.fill(0.0);
        cu.fill(0.0);
        for (block, &offset) in self.stage.iter().zip(&self.stage_offsets) {
            let dim = block.dim();
            block.jacobian(x, u, &mut cx.rows_mut(offset, dim), &mut cu.rows_mut(offset, dim));
        }
    }

    /// Write all terminal rows c_N(x) into `c` (length `terminal_dim()`)
    pub fn evaluate_terminal(&self, x: &DVector<f64>, c: &mut DVector<f64>) {
        let out = c.as_mut_slice();
        for (block, &offset) in self.terminal.iter().zip(&self.terminal_offsets) {
            block.evaluate(x, &mut out[offset..offset + block.dim()]);
        }
    }

    /// Write the terminal Jacobian into `cx` (p_N×n)
    pub fn terminal_jacobian(&self, x: &DVector<f64>, cx: &mut DMatrix<f64>) {
        cx.fill(0.0);
        for (block, &offset) in self.terminal.iter().zip(&self.terminal_offsets) {
            block.jacobian(x, &mut cx.rows_mut(offset, block.dim()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{ControlBound, ControlNorm, GoalConstraint, StateBound};
    use approx::assert_relative_eq;

    fn test_list() -> ConstraintList {
        ConstraintList::new(4, 2)
            .with_stage(ControlBound::symmetric(2, 1.0).unwrap())
            .unwrap()
            .with_stage(ControlNorm::new(1.0).unwrap())
            .unwrap()
            .with_terminal(GoalConstraint::new(DVector::from_vec(vec![1.0, 1.0, 0.0, 0.0])))
            .unwrap()
    }

    #[test]
    fn test_dimensions_and_kinds() {
        let list = test_list();
        assert_eq!(list.stage_dim(), 5);
        assert_eq!(list.terminal_dim(), 4);
        assert!(list.stage_kinds().iter().all(|k| *k == ConstraintKind::Inequality));
        assert!(list.terminal_kinds().iter().all(|k| *k == ConstraintKind::Equality));
        assert!(!list.is_empty());
        assert!(ConstraintList::new(4, 2).is_empty());
    }

    #[test]
    fn test_offsets_place_blocks_in_order() {
        let list = test_list();
        let x = DVector::zeros(4);
        let u = DVector::from_vec(vec![2.0, 0.0]);
        let mut c = DVector::zeros(5);
        list.evaluate_stage(&x, &u, &mut c);

        // ControlBound rows 0..4, ControlNorm row 4
        assert_relative_eq!(c[0], 1.0);
        assert_relative_eq!(c[4], 3.0);

        let mut cx = DMatrix::zeros(5, 4);
        let mut cu = DMatrix::zeros(5, 2);
        list.stage_jacobian(&x, &u, &mut cx, &mut cu);
        assert_relative_eq!(cu[(0, 0)], 1.0);
        assert_relative_eq!(cu[(4, 0)], 4.0);
        assert_relative_eq!(cu[(4, 1)], 0.0);
    }

    #[test]
    fn test_terminal_evaluation() {
        let list = test_list();
        let x = DVector::from_vec(vec![1.0, 0.5, 0.0, 0.2]);
        let mut c = DVector::zeros(4);
        list.evaluate_terminal(&x, &mut c);
        assert_relative_eq!(c, DVector::from_vec(vec![0.0, -0.5, 0.0, 0.2]));

        let mut cx = DMatrix::zeros(4, 4);
        list.terminal_jacobian(&x, &mut cx);
        assert_relative_eq!(cx, DMatrix::identity(4, 4));
    }

    #[test]
    fn test_rejects_mismatched_block() {
        let result = ConstraintList::new(4, 2).with_stage(ControlBound::symmetric(3, 1.0).unwrap());
        assert!(result.is_err());
        let result = ConstraintList::new(4, 2)
            .with_terminal(StateBound::new(DVector::zeros(2), DVector::from_element(2, 1.0)).unwrap());
        assert!(result.is_err());
    }
}
