//! Trajectory optimization problem definition
//!
//! ```text
//! minimize    J = Σ_{k<N-1} ℓ(x_k, u_k) + ℓ_N(x_{N-1})
//! subject to  x_0 = x_init
//!             x_{k+1} = f(x_k, u_k, dt)
//!             c(x_k, u_k) ≤ 0 or = 0       (stage constraints)
//!             c_N(x_{N-1}) ≤ 0 or = 0      (terminal constraints)
//! ```
//!
//! The dynamics are enforced by rollout, never as constraints.

use nalgebra::DVector;

use trajopt_core::constraints::ConstraintList;
use trajopt_core::cost::CostFunction;
use trajopt_core::dynamics::DiscreteDynamics;

use crate::objective::trajectory_cost;
use crate::solver::SolverError;
use crate::trajectory::Trajectory;

/// Problem data consumed by the solver
#[derive(Debug, Clone)]
pub struct Problem<D, C> {
    /// Discrete dynamics f(x, u, dt)
    pub dynamics: D,
    /// Stage and terminal cost
    pub cost: C,
    /// Stage and terminal constraints (may be empty)
    pub constraints: ConstraintList,
    initial_state: DVector<f64>,
    initial_controls: Vec<DVector<f64>>,
    dt: f64,
}

impl<D: DiscreteDynamics, C: CostFunction> Problem<D, C> {
    /// Unconstrained problem with `horizon` knots and zero initial controls
    pub fn new(
        dynamics: D,
        cost: C,
        initial_state: DVector<f64>,
        horizon: usize,
        dt: f64,
    ) -> Result<Self, SolverError> {
        let n = dynamics.state_dim();
        let m = dynamics.control_dim();

        if horizon < 2 {
            return Err(SolverError::InvalidProblem(format!(
                "horizon must have at least 2 knots, got {}",
                horizon
            )));
        }
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(SolverError::InvalidProblem(format!(
                "time step must be positive, got {}",
                dt
            )));
        }
        if initial_state.len() != n {
            return Err(SolverError::InvalidProblem(format!(
                "initial state has dimension {}, dynamics expect {}",
                initial_state.len(),
                n
            )));
        }

        Ok(Self {
            dynamics,
            cost,
            constraints: ConstraintList::new(n, m),
            initial_state,
            initial_controls: vec![DVector::zeros(m); horizon - 1],
            dt,
        })
    }

    /// Attach constraints; dimensions must match the dynamics
    pub fn with_constraints(mut self, constraints: ConstraintList) -> Result<Self, SolverError> {
        if constraints.state_dim() != self.state_dim()
            || constraints.control_dim() != self.control_dim()
        {
            return Err(SolverError::InvalidProblem(format!(
                "constraints built for (n = {}, m = {}), problem has (n = {}, m = {})",
                constraints.state_dim(),
                constraints.control_dim(),
                self.state_dim(),
                self.control_dim()
            )));
        }
        self.constraints = constraints;
        Ok(self)
    }

    /// Replace the initial control guess (one entry per interval)
    pub fn with_initial_controls(mut self, controls: Vec<DVector<f64>>) -> Result<Self, SolverError> {
        if controls.len() != self.initial_controls.len() {
            return Err(SolverError::InvalidProblem(format!(
                "expected {} initial controls, got {}",
                self.initial_controls.len(),
                controls.len()
            )));
        }
        if let Some(u) = controls.iter().find(|u| u.len() != self.control_dim()) {
            return Err(SolverError::InvalidProblem(format!(
                "initial control has dimension {}, dynamics expect {}",
                u.len(),
                self.control_dim()
            )));
        }
        self.initial_controls = controls;
        Ok(self)
    }

    pub fn state_dim(&self) -> usize {
        self.dynamics.state_dim()
    }

    pub fn control_dim(&self) -> usize {
        self.dynamics.control_dim()
    }

    /// Number of knot points N
    pub fn horizon(&self) -> usize {
        self.initial_controls.len() + 1
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn initial_state(&self) -> &DVector<f64> {
        &self.initial_state
    }

    pub fn initial_controls(&self) -> &[DVector<f64>] {
        &self.initial_controls
    }

    /// Initial guess rolled out through the dynamics
    pub fn initial_trajectory(&self) -> Trajectory {
        let mut trajectory = Trajectory::with_controls(&self.initial_state, &self.initial_controls, self.dt);
        trajectory.rollout(&self.dynamics);
        trajectory
    }

    /// Cost of a trajectory under this problem's cost function
    pub fn cost_of(&self, trajectory: &Trajectory) -> f64 {
        trajectory_cost(&self.cost, trajectory)
    }
}
