//! Solver front end
//!
//! [`Solver`] owns a [`Problem`], the iLQR engine and the augmented
//! Lagrangian state. Problems without constraints go straight to iLQR;
//! otherwise the augmented Lagrangian loop drives repeated inner solves.
//!
//! Every buffer is sized at construction. `solve` and `reset` reuse them,
//! and cloning a solver deep-copies them, so clones can run independently.

use std::sync::Arc;

use thiserror::Error;

use trajopt_core::cost::CostFunction;
use trajopt_core::dynamics::DiscreteDynamics;
use trajopt_core::ModelError;

use crate::augmented_lagrangian::AugmentedLagrangian;
use crate::backward_pass::Gains;
use crate::config::{ConfigError, SolverConfig};
use crate::ilqr::{IlqrSolver, InnerStatus};
use crate::logging::{SolverLogger, TracingLogger};
use crate::objective::StandardObjective;
use crate::problem::Problem;
use crate::statistics::{SolverStats, TerminationRecord};
use crate::trajectory::{FeedbackPolicy, Trajectory};

/// Solver errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Quu not positive definite at knot {knot} with regularization at its maximum ({rho})")]
    NonPositiveDefinite { knot: usize, rho: f64 },
    #[error("Line search failed {failures} consecutive times")]
    LineSearchExhausted { failures: usize },
    #[error("Numeric overflow: cost {cost}, max |x| {max_state}, max |u| {max_control}")]
    NumericOverflow {
        cost: f64,
        max_state: f64,
        max_control: f64,
    },
    #[error("Maximum iterations reached without convergence")]
    MaxIterationsExceeded,
    #[error("Constraints not satisfied (c_max = {c_max})")]
    ConstraintInfeasible { c_max: f64 },
}

/// Why a solve stopped
#[derive(Debug, Clone, PartialEq)]
pub enum TerminationStatus {
    /// No solve has run since construction or reset
    Unsolved,
    /// Converged, and constraints (if any) are within tolerance
    Solved,
    /// Iteration budget ran out before convergence
    MaxIterations,
    /// Outer budget ran out with constraints still violated
    ConstraintInfeasible { c_max: f64 },
    /// Fatal numerical failure
    Failed(SolverError),
}

impl TerminationStatus {
    pub fn is_solved(&self) -> bool {
        matches!(self, Self::Solved)
    }

    /// The matching error for every non-success outcome
    pub fn as_error(&self) -> Option<SolverError> {
        match self {
            Self::Unsolved | Self::Solved => None,
            Self::MaxIterations => Some(SolverError::MaxIterationsExceeded),
            Self::ConstraintInfeasible { c_max } => {
                Some(SolverError::ConstraintInfeasible { c_max: *c_max })
            }
            Self::Failed(err) => Some(err.clone()),
        }
    }
}

impl From<InnerStatus> for TerminationStatus {
    fn from(status: InnerStatus) -> Self {
        match status {
            InnerStatus::Converged => Self::Solved,
            InnerStatus::MaxIterations => Self::MaxIterations,
            InnerStatus::Failed(err) => Self::Failed(err),
        }
    }
}

/// Result of a solve
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub status: TerminationStatus,
    /// Optimized (or last valid) trajectory
    pub trajectory: Trajectory,
    /// Gains of the last successful backward pass
    ///
    /// They were computed around the nominal that preceded the final
    /// accepted step. At convergence that nominal and `trajectory` agree to
    /// within the convergence tolerances. All zeros when no backward pass
    /// succeeded.
    pub gains: Gains,
    /// Problem cost of `trajectory`, without augmented terms
    pub cost: f64,
    /// Worst constraint violation of `trajectory` (0 when unconstrained)
    pub c_max: f64,
    pub stats: SolverStats,
}

impl Solution {
    pub fn is_solved(&self) -> bool {
        self.status.is_solved()
    }

    /// `Ok` when solved, the matching error otherwise
    pub fn into_result(self) -> Result<Self, SolverError> {
        match self.status.as_error() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    /// Feedback law u = ū + K(x − x̄) with ū, x̄ taken from `trajectory`
    ///
    /// The gains K are the ones in [`Solution::gains`].
    pub fn policy(&self) -> FeedbackPolicy {
        FeedbackPolicy::new(self.trajectory.clone(), self.gains.feedback.clone())
    }
}

/// Trajectory optimizer for one problem
#[derive(Debug, Clone)]
pub struct Solver<D, C> {
    problem: Problem<D, C>,
    config: SolverConfig,
    initial: Trajectory,
    ilqr: IlqrSolver,
    al: AugmentedLagrangian,
    stats: SolverStats,
    status: TerminationStatus,
    logger: Arc<dyn SolverLogger>,
}

impl<D: DiscreteDynamics, C: CostFunction> Solver<D, C> {
    /// Build a solver reporting through `tracing`
    pub fn new(problem: Problem<D, C>, config: SolverConfig) -> Result<Self, SolverError> {
        Self::with_logger(problem, config, Arc::new(TracingLogger))
    }

    pub fn with_logger(
        problem: Problem<D, C>,
        config: SolverConfig,
        logger: Arc<dyn SolverLogger>,
    ) -> Result<Self, SolverError> {
        config.validate()?;

        let initial = problem.initial_trajectory();
        let ilqr = IlqrSolver::new(config.ilqr.clone(), &initial);
        let al = AugmentedLagrangian::new(
            config.augmented_lagrangian.clone(),
            &problem.constraints,
            &initial,
        );
        let outer = if problem.constraints.is_empty() {
            0
        } else {
            config.augmented_lagrangian.max_outer_iterations
        };
        let stats = SolverStats::with_capacity(config.ilqr.max_iterations * outer.max(1), outer);

        Ok(Self {
            problem,
            config,
            initial,
            ilqr,
            al,
            stats,
            status: TerminationStatus::Unsolved,
            logger,
        })
    }

    pub fn problem(&self) -> &Problem<D, C> {
        &self.problem
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn stats(&self) -> &SolverStats {
        &self.stats
    }

    pub fn status(&self) -> &TerminationStatus {
        &self.status
    }

    /// Current regularization ρ
    pub fn regularization(&self) -> f64 {
        self.ilqr.regularization().rho()
    }

    /// Current nominal trajectory
    pub fn trajectory(&self) -> &Trajectory {
        self.ilqr.nominal()
    }

    /// Inner iLQR engine (gains, backward-pass buffers, ρ)
    pub fn engine(&self) -> &IlqrSolver {
        &self.ilqr
    }

    pub fn augmented_lagrangian(&self) -> &AugmentedLagrangian {
        &self.al
    }

    /// Optimize from the current nominal
    ///
    /// A second call without [`Solver::reset`] warm-starts from the
    /// previous result and keeps the multipliers and penalties.
    pub fn solve(&mut self) -> Solution {
        let Self {
            problem,
            ilqr,
            al,
            stats,
            logger,
            ..
        } = self;

        stats.reset();
        ilqr.rollout_nominal(&problem.dynamics);
        stats.initial_cost = problem.cost_of(ilqr.nominal());

        let (status, use_best) = if problem.constraints.is_empty() {
            let mut objective = StandardObjective::new(&problem.cost);
            let tolerances = ilqr.tolerances();
            let inner = ilqr.solve(&problem.dynamics, &mut objective, tolerances, stats, &**logger);
            (TerminationStatus::from(inner), false)
        } else {
            let outcome = al.solve(
                ilqr,
                &problem.dynamics,
                &problem.cost,
                &problem.constraints,
                stats,
                &**logger,
            );
            (outcome.status, outcome.used_best)
        };

        let (trajectory, gains) = if use_best {
            (al.best_trajectory().clone(), al.best_gains().clone())
        } else {
            (ilqr.nominal().clone(), ilqr.gains().clone())
        };
        let c_max = if problem.constraints.is_empty() {
            0.0
        } else {
            let mut duals = al.duals().clone();
            duals.evaluate(&problem.constraints, &trajectory);
            duals.c_max()
        };

        let cost = problem.cost_of(&trajectory);
        logger.termination(&TerminationRecord {
            status: status.clone(),
            cost,
            c_max,
            iterations: stats.iterations,
            outer_iterations: stats.outer_iterations,
        });
        self.status = status.clone();

        Solution {
            status,
            cost,
            trajectory,
            gains,
            c_max,
            stats: self.stats.clone(),
        }
    }

    /// Restore the initial guess, ρ, multipliers, penalties and statistics
    pub fn reset(&mut self) {
        self.ilqr.reset(&self.initial);
        self.al.reset();
        self.stats.reset();
        self.status = TerminationStatus::Unsolved;
    }
}
