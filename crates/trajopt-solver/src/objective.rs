//! Trajectory-level objectives
//!
//! The iLQR engine only needs two things from an objective: its value on
//! a trajectory and its second-order expansion around one. The plain
//! problem cost and the augmented Lagrangian both implement
//! [`Objective`], so the same engine serves the unconstrained solve and
//! every inner solve of the constrained one.

use trajopt_core::cost::{CostFunction, StageExpansion, TerminalExpansion};

use crate::trajectory::Trajectory;

/// Cost expansion along a whole trajectory
#[derive(Debug, Clone, PartialEq)]
pub struct CostExpansion {
    /// One entry per interval (N-1)
    pub stage: Vec<StageExpansion>,
    pub terminal: TerminalExpansion,
}

impl CostExpansion {
    pub fn zeros(state_dim: usize, control_dim: usize, horizon: usize) -> Self {
        Self {
            stage: vec![StageExpansion::zeros(state_dim, control_dim); horizon.saturating_sub(1)],
            terminal: TerminalExpansion::zeros(state_dim),
        }
    }
}

/// Objective evaluated on whole trajectories
pub trait Objective {
    /// Total cost J of `trajectory`
    fn cost(&mut self, trajectory: &Trajectory) -> f64;

    /// Overwrite `expansion` with the expansion around `trajectory`
    fn expand(&mut self, trajectory: &Trajectory, expansion: &mut CostExpansion);
}

/// The problem's own cost, J = Σ ℓ + ℓ_N
#[derive(Debug, Clone, Copy)]
pub struct StandardObjective<'a, C> {
    cost: &'a C,
}

impl<'a, C: CostFunction> StandardObjective<'a, C> {
    pub fn new(cost: &'a C) -> Self {
        Self { cost }
    }
}

impl<C: CostFunction> Objective for StandardObjective<'_, C> {
    fn cost(&mut self, trajectory: &Trajectory) -> f64 {
        trajectory_cost(self.cost, trajectory)
    }

    fn expand(&mut self, trajectory: &Trajectory, expansion: &mut CostExpansion) {
        expand_cost(self.cost, trajectory, expansion);
    }
}

/// Σ ℓ(x_k, u_k) + ℓ_N(x_{N-1})
pub(crate) fn trajectory_cost<C: CostFunction>(cost: &C, trajectory: &Trajectory) -> f64 {
    let intervals = trajectory.num_intervals();
    let stage: f64 = trajectory.knots()[..intervals]
        .iter()
        .map(|k| cost.stage_cost(&k.x, &k.u))
        .sum();
    stage + cost.terminal_cost(trajectory.final_state())
}

pub(crate) fn expand_cost<C: CostFunction>(
    cost: &C,
    trajectory: &Trajectory,
    expansion: &mut CostExpansion,
) {
    for (knot, stage) in trajectory.knots().iter().zip(expansion.stage.iter_mut()) {
        cost.stage_expansion(&knot.x, &knot.u, stage);
    }
    cost.terminal_expansion(trajectory.final_state(), &mut expansion.terminal);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DVector;
    use trajopt_core::cost::QuadraticCost;

    #[test]
    fn test_standard_objective_cost_and_expansion() {
        let cost = QuadraticCost::diagonal(&[2.0], &[1.0], &[10.0], DVector::zeros(1)).unwrap();
        let x0 = DVector::from_vec(vec![1.0]);
        let controls = vec![DVector::from_vec(vec![1.0]); 2];
        let mut traj = Trajectory::with_controls(&x0, &controls, 1.0);
        traj.knots_mut()[1].x[0] = 2.0;
        traj.knots_mut()[2].x[0] = 3.0;

        let mut objective = StandardObjective::new(&cost);
        // stages: ½·2·1 + ½·1 + ½·2·4 + ½·1 = 6, terminal: ½·10·9 = 45
        assert_relative_eq!(objective.cost(&traj), 51.0, epsilon = 1e-12);

        let mut expansion = CostExpansion::zeros(1, 1, 3);
        objective.expand(&traj, &mut expansion);
        assert_eq!(expansion.stage.len(), 2);
        assert_relative_eq!(expansion.stage[1].lx[0], 4.0, epsilon = 1e-12);
        assert_relative_eq!(expansion.stage[0].lu[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(expansion.terminal.lx[0], 30.0, epsilon = 1e-12);
        assert_relative_eq!(expansion.terminal.lxx[(0, 0)], 10.0, epsilon = 1e-12);
    }
}
