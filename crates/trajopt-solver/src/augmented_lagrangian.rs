//! Augmented Lagrangian outer loop
//!
//! Constraints are folded into the cost as
//!
//! ```text
//! L = J + Σ_active ( λᵢcᵢ + ½μᵢcᵢ² )
//! ```
//!
//! and each outer iteration minimizes L with the iLQR engine, then updates
//! the multipliers and the penalties. The loop stops once the worst
//! violation drops below the constraint tolerance.

use trajopt_core::constraints::ConstraintList;
use trajopt_core::cost::CostFunction;
use trajopt_core::dynamics::DiscreteDynamics;

use crate::backward_pass::Gains;
use crate::config::AlConfig;
use crate::constraints::ConstraintTrajectory;
use crate::ilqr::{IlqrSolver, InnerStatus, Tolerances};
use crate::logging::SolverLogger;
use crate::objective::{expand_cost, trajectory_cost, CostExpansion, Objective};
use crate::solver::TerminationStatus;
use crate::statistics::{OuterIterationRecord, SolverStats};
use crate::trajectory::Trajectory;

/// Problem cost plus augmented constraint terms
#[derive(Debug)]
pub struct AugmentedObjective<'a, C> {
    cost: &'a C,
    constraints: &'a ConstraintList,
    duals: &'a mut ConstraintTrajectory,
}

impl<'a, C: CostFunction> AugmentedObjective<'a, C> {
    pub fn new(cost: &'a C, constraints: &'a ConstraintList, duals: &'a mut ConstraintTrajectory) -> Self {
        Self {
            cost,
            constraints,
            duals,
        }
    }
}

impl<C: CostFunction> Objective for AugmentedObjective<'_, C> {
    fn cost(&mut self, trajectory: &Trajectory) -> f64 {
        trajectory_cost(self.cost, trajectory) + self.duals.penalty_cost(self.constraints, trajectory)
    }

    fn expand(&mut self, trajectory: &Trajectory, expansion: &mut CostExpansion) {
        expand_cost(self.cost, trajectory, expansion);
        self.duals.linearize(self.constraints, trajectory);
        self.duals.add_to_expansion(expansion);
    }
}

/// How the outer loop ended
#[derive(Debug, Clone, PartialEq)]
pub struct AlOutcome {
    pub status: TerminationStatus,
    /// Worst violation of the returned trajectory
    pub c_max: f64,
    /// The returned trajectory is the least-violating one seen, not the
    /// last nominal
    pub used_best: bool,
}

/// Outer-loop state: multipliers, penalties and the best iterate
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentedLagrangian {
    config: AlConfig,
    duals: ConstraintTrajectory,
    best: Trajectory,
    best_gains: Gains,
}

impl AugmentedLagrangian {
    pub fn new(config: AlConfig, constraints: &ConstraintList, initial: &Trajectory) -> Self {
        let horizon = initial.len();
        Self {
            duals: ConstraintTrajectory::new(constraints, horizon, config.penalty_initial),
            best: initial.clone(),
            best_gains: Gains::zeros(initial.state_dim(), initial.control_dim(), horizon),
            config,
        }
    }

    pub fn config(&self) -> &AlConfig {
        &self.config
    }

    /// Multipliers, penalties and constraint values
    pub fn duals(&self) -> &ConstraintTrajectory {
        &self.duals
    }

    /// Least-violating trajectory of the last solve
    pub fn best_trajectory(&self) -> &Trajectory {
        &self.best
    }

    pub fn best_gains(&self) -> &Gains {
        &self.best_gains
    }

    /// λ = 0 and μ = initial penalty
    pub fn reset(&mut self) {
        self.duals.reset(self.config.penalty_initial);
    }

    /// Run outer iterations until the constraints are met or the budget ends
    pub fn solve<D: DiscreteDynamics, C: CostFunction>(
        &mut self,
        ilqr: &mut IlqrSolver,
        dynamics: &D,
        cost: &C,
        constraints: &ConstraintList,
        stats: &mut SolverStats,
        logger: &dyn SolverLogger,
    ) -> AlOutcome {
        let final_tolerances = ilqr.tolerances();
        let intermediate_tolerances = Tolerances {
            cost: self.config.cost_tolerance_intermediate,
            gradient: self.config.gradient_norm_tolerance_intermediate,
        };

        ilqr.rollout_nominal(dynamics);
        self.duals.evaluate(constraints, ilqr.nominal());
        self.duals.store_violation();
        let mut c_max = self.duals.c_max();
        let mut best_c_max = f64::INFINITY;

        for outer in 0..self.config.max_outer_iterations {
            let loose = c_max > self.config.constraint_tolerance;
            let tolerances = if loose {
                intermediate_tolerances
            } else {
                final_tolerances
            };

            let start = stats.iterations;
            let inner = {
                let mut objective = AugmentedObjective::new(cost, constraints, &mut self.duals);
                ilqr.solve(dynamics, &mut objective, tolerances, stats, logger)
            };
            let inner_iterations = stats.iterations - start;

            if let InnerStatus::Failed(err) = inner {
                return AlOutcome {
                    status: TerminationStatus::Failed(err),
                    c_max,
                    used_best: false,
                };
            }

            self.duals.evaluate(constraints, ilqr.nominal());
            c_max = self.duals.c_max();
            if c_max < best_c_max {
                best_c_max = c_max;
                self.best.copy_from(ilqr.nominal());
                self.best_gains.copy_from(ilqr.gains());
            }

            self.duals.update_duals(self.config.dual_max);
            self.duals.update_penalties(
                self.config.constraint_decrease_ratio,
                self.config.penalty_scale,
                self.config.penalty_max,
            );

            let record = OuterIterationRecord {
                outer_iteration: outer,
                c_max,
                penalty_max: self.duals.max_penalty(),
                cost: trajectory_cost(cost, ilqr.nominal()),
                inner_iterations,
            };
            stats.record_outer(&record);
            logger.outer_iteration(&record);

            // A feasible result from a loose inner solve gets one more pass
            // at the final tolerances before it can count as solved
            if c_max < self.config.constraint_tolerance && !loose {
                let status = match inner {
                    InnerStatus::Converged => TerminationStatus::Solved,
                    _ => TerminationStatus::MaxIterations,
                };
                return AlOutcome {
                    status,
                    c_max,
                    used_best: false,
                };
            }
        }

        if c_max < self.config.constraint_tolerance {
            return AlOutcome {
                status: TerminationStatus::MaxIterations,
                c_max,
                used_best: false,
            };
        }
        AlOutcome {
            status: TerminationStatus::ConstraintInfeasible { c_max: best_c_max },
            c_max: best_c_max,
            used_best: true,
        }
    }
}
