//! Cost functions
//!
//! A cost is a sum of stage terms ℓ(x_k, u_k) over the control intervals
//! plus a terminal term ℓ_N(x_N). The solver needs the values and the
//! second-order expansion of each term around the nominal trajectory.

pub mod expansion;
pub mod quadratic;

pub use expansion::*;
pub use quadratic::*;

use nalgebra::DVector;

/// Stage and terminal cost with first and second derivatives
pub trait CostFunction {
    /// Stage cost ℓ(x, u)
    fn stage_cost(&self, x: &DVector<f64>, u: &DVector<f64>) -> f64;

    /// Terminal cost ℓ_N(x)
    fn terminal_cost(&self, x: &DVector<f64>) -> f64;

    /// Overwrite `out` with the gradient/Hessian blocks of ℓ at (x, u)
    fn stage_expansion(&self, x: &DVector<f64>, u: &DVector<f64>, out: &mut StageExpansion);

    /// Overwrite `out` with the gradient/Hessian of ℓ_N at x
    fn terminal_expansion(&self, x: &DVector<f64>, out: &mut TerminalExpansion);
}
