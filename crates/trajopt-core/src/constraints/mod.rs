//! Constraint definitions
//!
//! Constraints follow the sign convention c(x, u) ≤ 0 for inequalities and
//! c(x, u) = 0 for equalities; positive inequality values are violations.
//!
//! Each constraint is a block with a fixed output dimension. Blocks are
//! composed into a [`ConstraintList`], which assigns every block a row
//! offset once, at setup.
//!
//! Provided blocks:
//! - [`ControlBound`]: box limits on u
//! - [`StateBound`]: box limits on x (stage or terminal)
//! - [`ControlNorm`]: ‖u‖ ≤ r
//! - [`GoalConstraint`]: terminal equality x_N = x_goal

pub mod bounds;
pub mod goal;
pub mod list;
pub mod norm;

pub use bounds::*;
pub use goal::*;
pub use list::*;
pub use norm::*;

use std::fmt::Debug;

use nalgebra::{DMatrixViewMut, DVector};
use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Equality or inequality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// c = 0
    Equality,
    /// c ≤ 0
    Inequality,
}

/// Constraint on a stage knot (x_k, u_k)
pub trait StageConstraint: Debug + Send + Sync {
    fn kind(&self) -> ConstraintKind;

    /// Number of output components
    fn dim(&self) -> usize;

    /// Check the block against the problem dimensions
    fn check_dims(&self, _state_dim: usize, _control_dim: usize) -> Result<(), ModelError> {
        Ok(())
    }

    /// Write c(x, u) into `out` (length `dim()`)
    fn evaluate(&self, x: &DVector<f64>, u: &DVector<f64>, out: &mut [f64]);

    /// Write ∂c/∂x (dim×n) into `jx` and ∂c/∂u (dim×m) into `ju`
    ///
    /// Both views arrive zeroed.
    fn jacobian(
        &self,
        x: &DVector<f64>,
        u: &DVector<f64>,
        jx: &mut DMatrixViewMut<'_, f64>,
        ju: &mut DMatrixViewMut<'_, f64>,
    );
}

/// Constraint on the terminal state x_N
pub trait TerminalConstraint: Debug + Send + Sync {
    fn kind(&self) -> ConstraintKind;

    fn dim(&self) -> usize;

    fn check_dims(&self, _state_dim: usize) -> Result<(), ModelError> {
        Ok(())
    }

    fn evaluate(&self, x: &DVector<f64>, out: &mut [f64]);

    /// Write ∂c/∂x (dim×n) into the zeroed view `jx`
    fn jacobian(&self, x: &DVector<f64>, jx: &mut DMatrixViewMut<'_, f64>);
}
