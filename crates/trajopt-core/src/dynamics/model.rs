//! Dynamics model traits and discretization

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::math::{euler, euler_jacobian, rk4, rk4_jacobian};

/// Continuous-time dynamics dx/dt = f(x, u)
pub trait ContinuousDynamics {
    /// State dimension n
    fn state_dim(&self) -> usize;
    /// Control dimension m
    fn control_dim(&self) -> usize;
    /// State derivative
    fn dynamics(&self, x: &DVector<f64>, u: &DVector<f64>) -> DVector<f64>;
    /// Continuous Jacobians (∂f/∂x, ∂f/∂u)
    fn jacobian(&self, x: &DVector<f64>, u: &DVector<f64>) -> (DMatrix<f64>, DMatrix<f64>);
}

/// Discrete-time dynamics x⁺ = f(x, u, dt)
///
/// This is the interface the solver consumes. Implementations write into
/// caller-owned buffers so rollouts do not reallocate trajectories.
pub trait DiscreteDynamics {
    /// State dimension n
    fn state_dim(&self) -> usize;
    /// Control dimension m
    fn control_dim(&self) -> usize;
    /// Propagate one step, writing the next state into `x_next`
    fn step(&self, x: &DVector<f64>, u: &DVector<f64>, dt: f64, x_next: &mut DVector<f64>);
    /// Jacobians of the step: `a` (n×n) and `b` (n×m)
    fn step_jacobian(
        &self,
        x: &DVector<f64>,
        u: &DVector<f64>,
        dt: f64,
        a: &mut DMatrix<f64>,
        b: &mut DMatrix<f64>,
    );
}

/// Integration scheme used to discretize continuous dynamics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Integrator {
    /// Explicit Euler (first order)
    Euler,
    /// Classic Runge-Kutta 4
    #[default]
    Rk4,
}

/// A continuous model paired with an integrator
#[derive(Debug, Clone)]
pub struct Discretized<M> {
    model: M,
    integrator: Integrator,
}

impl<M: ContinuousDynamics> Discretized<M> {
    pub fn new(model: M, integrator: Integrator) -> Self {
        Self { model, integrator }
    }

    /// Underlying continuous model
    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn integrator(&self) -> Integrator {
        self.integrator
    }
}

impl<M: ContinuousDynamics> DiscreteDynamics for Discretized<M> {
    fn state_dim(&self) -> usize {
        self.model.state_dim()
    }

    fn control_dim(&self) -> usize {
        self.model.control_dim()
    }

    fn step(&self, x: &DVector<f64>, u: &DVector<f64>, dt: f64, x_next: &mut DVector<f64>) {
        let f = |x: &DVector<f64>, u: &DVector<f64>| self.model.dynamics(x, u);
        let next = match self.integrator {
            Integrator::Euler => euler(x, u, dt, f),
            Integrator::Rk4 => rk4(x, u, dt, f),
        };
        x_next.copy_from(&next);
    }

    fn step_jacobian(
        &self,
        x: &DVector<f64>,
        u: &DVector<f64>,
        dt: f64,
        a: &mut DMatrix<f64>,
        b: &mut DMatrix<f64>,
    ) {
        let jac = |x: &DVector<f64>, u: &DVector<f64>| self.model.jacobian(x, u);
        let (a_new, b_new) = match self.integrator {
            Integrator::Euler => euler_jacobian(x, u, dt, jac),
            Integrator::Rk4 => {
                let f = |x: &DVector<f64>, u: &DVector<f64>| self.model.dynamics(x, u);
                rk4_jacobian(x, u, dt, f, jac)
            }
        };
        a.copy_from(&a_new);
        b.copy_from(&b_new);
    }
}
