//! Reference problems
//!
//! Small, well-understood problems used by the tests and the demos:
//!
//! - Planar double integrator reaching a goal (linear-quadratic)
//! - The same with control bounds (augmented Lagrangian)
//! - A double integrator whose cost leaves the last control partially
//!   unweighted, so Quu is singular until regularized
//! - Pendulum swing-up (nonlinear dynamics)
//! - A generic linear-quadratic regulator

use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector};

use trajopt_core::constraints::{ConstraintList, ControlBound};
use trajopt_core::cost::QuadraticCost;
use trajopt_core::dynamics::{DoubleIntegrator, Discretized, Integrator, LinearDiscrete, Pendulum};

use crate::problem::Problem;
use crate::solver::SolverError;

/// Planar point-mass problem type
pub type PointMassProblem = Problem<Discretized<DoubleIntegrator>, QuadraticCost>;

/// Pendulum problem type
pub type PendulumProblem = Problem<Discretized<Pendulum>, QuadraticCost>;

/// Parameters of the planar point-mass scenarios
#[derive(Debug, Clone, PartialEq)]
pub struct PointMassParams {
    /// Number of knots N
    pub horizon: usize,
    /// Time step [s]
    pub dt: f64,
    /// Target position [m]
    pub goal: [f64; 2],
    /// Stage state weight (all components)
    pub state_weight: f64,
    /// Stage control weight (all components)
    pub control_weight: f64,
    /// Terminal state weight (all components)
    pub terminal_weight: f64,
}

impl Default for PointMassParams {
    fn default() -> Self {
        Self {
            horizon: 50,
            dt: 0.1,
            goal: [1.0, 1.0],
            state_weight: 1e-2,
            control_weight: 1e-2,
            terminal_weight: 1e4,
        }
    }
}

impl PointMassParams {
    /// Goal state [p, v] at rest
    pub fn goal_state(&self) -> DVector<f64> {
        DVector::from_vec(vec![self.goal[0], self.goal[1], 0.0, 0.0])
    }
}

/// Point mass from rest at the origin to rest at the goal
pub fn double_integrator(params: &PointMassParams) -> Result<PointMassProblem, SolverError> {
    let dynamics = Discretized::new(DoubleIntegrator::planar(), Integrator::Rk4);
    let cost = QuadraticCost::diagonal(
        &[params.state_weight; 4],
        &[params.control_weight; 2],
        &[params.terminal_weight; 4],
        params.goal_state(),
    )?;
    Problem::new(dynamics, cost, DVector::zeros(4), params.horizon, params.dt)
}

/// [`double_integrator`] with |uᵢ| ≤ `limit` at every stage
pub fn bounded_double_integrator(
    params: &PointMassParams,
    limit: f64,
) -> Result<PointMassProblem, SolverError> {
    let problem = double_integrator(params)?;
    let constraints = ConstraintList::new(4, 2).with_stage(ControlBound::symmetric(2, limit)?)?;
    problem.with_constraints(constraints)
}

/// Point mass whose second control channel carries no weight
///
/// Explicit Euler makes the last control act on velocity only, and the
/// terminal cost ignores velocity, so Quu is exactly singular on the last
/// interval. The backward pass has to regularize to get through.
pub fn singular_double_integrator(params: &PointMassParams) -> Result<PointMassProblem, SolverError> {
    let dynamics = Discretized::new(DoubleIntegrator::planar(), Integrator::Euler);
    let w = params.terminal_weight;
    let cost = QuadraticCost::diagonal(
        &[params.state_weight; 4],
        &[params.control_weight, 0.0],
        &[w, w, 0.0, 0.0],
        params.goal_state(),
    )?;
    Problem::new(dynamics, cost, DVector::zeros(4), params.horizon, params.dt)
}

/// Pendulum from hanging down (θ = 0) to upright (θ = π)
pub fn pendulum_swingup() -> Result<PendulumProblem, SolverError> {
    let dynamics = Discretized::new(Pendulum::default(), Integrator::Rk4);
    let cost = QuadraticCost::diagonal(
        &[1e-2, 1e-2],
        &[1e-3],
        &[1e3, 1e2],
        DVector::from_vec(vec![PI, 0.0]),
    )?;
    Problem::new(dynamics, cost, DVector::zeros(2), 51, 0.1)
}

/// Three-state, two-input regulator with a mildly unstable mode
pub fn linear_quadratic(horizon: usize) -> Result<Problem<LinearDiscrete, QuadraticCost>, SolverError> {
    let a = DMatrix::from_row_slice(3, 3, &[1.02, 0.1, 0.0, 0.0, 0.98, 0.1, 0.05, 0.0, 1.01]);
    let b = DMatrix::from_row_slice(3, 2, &[0.0, 0.1, 0.1, 0.0, 0.05, 0.05]);
    let dynamics = LinearDiscrete::new(a, b)?;
    let cost = QuadraticCost::diagonal(&[1.0, 0.5, 1.0], &[0.1, 0.2], &[10.0, 10.0, 10.0], DVector::zeros(3))?;
    Problem::new(dynamics, cost, DVector::from_vec(vec![1.0, -0.5, 2.0]), horizon, 0.1)
}
