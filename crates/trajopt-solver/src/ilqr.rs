//! iLQR convergence driver
//!
//! Each iteration linearizes the dynamics and expands the objective
//! around the nominal trajectory, runs the backward pass (growing ρ until
//! Quu_reg factors), then line-searches along the new gains. Accepted
//! candidates replace the nominal by swapping buffers.
//!
//! The engine owns every per-iteration buffer; dynamics and objective are
//! borrowed per solve, so the augmented Lagrangian loop can hand it a new
//! objective each outer iteration without copying problem data.

use std::mem;

use trajopt_core::dynamics::DiscreteDynamics;

use crate::backward_pass::{BackwardPass, Gains, Linearization};
use crate::config::{GradientNormType, IlqrConfig};
use crate::forward_pass::{check_bounds, line_search, LineSearchOutcome};
use crate::logging::SolverLogger;
use crate::objective::{CostExpansion, Objective};
use crate::regularization::Regularization;
use crate::solver::SolverError;
use crate::statistics::{IterationRecord, SolverStats};
use crate::trajectory::Trajectory;

/// Convergence thresholds of one inner solve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    pub cost: f64,
    pub gradient: f64,
}

/// How an inner solve ended
#[derive(Debug, Clone, PartialEq)]
pub enum InnerStatus {
    Converged,
    MaxIterations,
    Failed(SolverError),
}

/// Unconstrained iLQR engine
#[derive(Debug, Clone)]
pub struct IlqrSolver {
    config: IlqrConfig,
    nominal: Trajectory,
    candidate: Trajectory,
    linearization: Linearization,
    expansion: CostExpansion,
    backward: BackwardPass,
    regularization: Regularization,
    cost: f64,
    dj_counter: usize,
}

impl IlqrSolver {
    /// Allocate every buffer for trajectories shaped like `initial`
    pub fn new(config: IlqrConfig, initial: &Trajectory) -> Self {
        let (n, m, horizon) = (initial.state_dim(), initial.control_dim(), initial.len());
        Self {
            regularization: Regularization::new(config.regularization.clone()),
            config,
            nominal: initial.clone(),
            candidate: initial.clone(),
            linearization: Linearization::zeros(n, m, horizon),
            expansion: CostExpansion::zeros(n, m, horizon),
            backward: BackwardPass::new(n, m, horizon),
            cost: 0.0,
            dj_counter: 0,
        }
    }

    pub fn config(&self) -> &IlqrConfig {
        &self.config
    }

    /// Current nominal trajectory
    pub fn nominal(&self) -> &Trajectory {
        &self.nominal
    }

    /// Gains of the last successful backward pass
    pub fn gains(&self) -> &Gains {
        self.backward.gains()
    }

    pub fn backward_pass(&self) -> &BackwardPass {
        &self.backward
    }

    /// Objective value of the nominal at the end of the last solve
    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn regularization(&self) -> &Regularization {
        &self.regularization
    }

    /// Final convergence thresholds from the configuration
    pub fn tolerances(&self) -> Tolerances {
        Tolerances {
            cost: self.config.cost_tolerance,
            gradient: self.config.gradient_norm_tolerance,
        }
    }

    /// Restore the initial guess and schedule without reallocating
    pub fn reset(&mut self, initial: &Trajectory) {
        self.nominal.copy_from(initial);
        self.candidate.copy_from(initial);
        self.regularization.reset();
        self.backward.reset();
        self.cost = 0.0;
        self.dj_counter = 0;
    }

    /// Make the nominal dynamically consistent with its controls
    pub fn rollout_nominal<D: DiscreteDynamics>(&mut self, dynamics: &D) {
        self.nominal.rollout(dynamics);
    }

    /// Iterate until convergence, budget exhaustion or a fatal error
    pub fn solve<D: DiscreteDynamics, O: Objective>(
        &mut self,
        dynamics: &D,
        objective: &mut O,
        tolerances: Tolerances,
        stats: &mut SolverStats,
        logger: &dyn SolverLogger,
    ) -> InnerStatus {
        self.nominal.rollout(dynamics);
        self.cost = objective.cost(&self.nominal);
        if let Err(err) = check_bounds(&self.nominal, self.cost, &self.config.bounds) {
            return InnerStatus::Failed(err);
        }
        self.dj_counter = 0;

        for _ in 0..self.config.max_iterations {
            let iteration = stats.iterations;

            for k in 0..self.nominal.num_intervals() {
                let knot = self.nominal.knot(k);
                dynamics.step_jacobian(
                    &knot.x,
                    &knot.u,
                    knot.dt,
                    &mut self.linearization.a[k],
                    &mut self.linearization.b[k],
                );
            }
            objective.expand(&self.nominal, &mut self.expansion);

            let mut increases = 0;
            let expected = loop {
                match self.backward.run(
                    &self.linearization,
                    &self.expansion,
                    self.regularization.rho(),
                    self.config.regularization.mode,
                ) {
                    Ok(expected) => break expected,
                    Err(indefinite) => {
                        increases += 1;
                        if self.regularization.increase().is_err() {
                            return InnerStatus::Failed(SolverError::NonPositiveDefinite {
                                knot: indefinite.knot,
                                rho: indefinite.rho,
                            });
                        }
                    }
                }
            };
            let rho_backward = self.regularization.rho();

            let outcome = match line_search(
                dynamics,
                objective,
                &self.nominal,
                &mut self.candidate,
                self.backward.gains(),
                self.cost,
                expected,
                &self.config.line_search,
                &self.config.bounds,
            ) {
                Ok(outcome) => outcome,
                Err(err) => return InnerStatus::Failed(err),
            };

            match outcome {
                LineSearchOutcome::Accepted(step) => {
                    mem::swap(&mut self.nominal, &mut self.candidate);
                    self.cost = step.cost;
                    self.dj_counter = 0;
                    if increases == 0 {
                        self.regularization.decrease();
                    }

                    let gradient = self.gradient_norm();
                    let record = IterationRecord {
                        iteration,
                        cost: step.cost,
                        dj: step.dj,
                        expected: step.expected,
                        gradient,
                        alpha: step.alpha,
                        rho_backward,
                        rho: self.regularization.rho(),
                        regularization_increases: increases,
                        line_search_attempts: step.attempts,
                        accepted: true,
                    };
                    stats.record(&record);
                    logger.iteration(&record);

                    if step.dj < tolerances.cost || gradient < tolerances.gradient {
                        return InnerStatus::Converged;
                    }
                }
                LineSearchOutcome::Exhausted { attempts } => {
                    self.dj_counter += 1;
                    self.regularization.bump();

                    let record = IterationRecord {
                        iteration,
                        cost: self.cost,
                        dj: 0.0,
                        expected: expected.at(1.0),
                        gradient: self.gradient_norm(),
                        alpha: 0.0,
                        rho_backward,
                        rho: self.regularization.rho(),
                        regularization_increases: increases,
                        line_search_attempts: attempts,
                        accepted: false,
                    };
                    stats.record(&record);
                    logger.iteration(&record);

                    if self.dj_counter > self.config.dj_counter_limit {
                        return InnerStatus::Failed(SolverError::LineSearchExhausted {
                            failures: self.dj_counter,
                        });
                    }
                }
            }
        }

        InnerStatus::MaxIterations
    }

    /// Average feedforward magnitude over the intervals
    fn gradient_norm(&self) -> f64 {
        let feedforward = &self.backward.gains().feedforward;
        if feedforward.is_empty() {
            return 0.0;
        }
        let total: f64 = match self.config.gradient_norm {
            GradientNormType::Relative => feedforward
                .iter()
                .zip(self.nominal.controls())
                .map(|(d, u)| d.norm() / (u.norm() + 1.0))
                .sum(),
            GradientNormType::Feedforward => feedforward.iter().map(|d| d.norm()).sum(),
        };
        total / feedforward.len() as f64
    }
}
