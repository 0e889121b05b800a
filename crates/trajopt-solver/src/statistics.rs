//! Per-iteration solver statistics
//!
//! Histories are reserved up front for the whole iteration budget and are
//! cleared, not freed, on reset.

use crate::solver::TerminationStatus;

/// Snapshot of one iLQR iteration
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IterationRecord {
    /// Iteration index, counted across every inner solve
    pub iteration: usize,
    /// Nominal cost at the end of the iteration
    pub cost: f64,
    /// Actual cost decrease (0 when the step was rejected)
    pub dj: f64,
    /// Predicted cost decrease at the accepted step size
    pub expected: f64,
    /// Gradient measure of the feedforward gains
    pub gradient: f64,
    /// Accepted step size (0 when the line search was exhausted)
    pub alpha: f64,
    /// ρ used by the successful backward pass
    pub rho_backward: f64,
    /// ρ after this iteration's schedule updates
    pub rho: f64,
    /// Backward-pass retries needed this iteration
    pub regularization_increases: usize,
    pub line_search_attempts: usize,
    pub accepted: bool,
}

/// Snapshot of one augmented Lagrangian outer iteration
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OuterIterationRecord {
    pub outer_iteration: usize,
    /// Worst constraint violation after the inner solve
    pub c_max: f64,
    /// Largest penalty after the update
    pub penalty_max: f64,
    /// Problem cost (without augmented terms)
    pub cost: f64,
    pub inner_iterations: usize,
}

/// Summary of a finished solve, as returned to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct TerminationRecord {
    pub status: TerminationStatus,
    /// Problem cost of the returned trajectory, without augmented terms
    pub cost: f64,
    /// Worst constraint violation of the returned trajectory
    pub c_max: f64,
    pub iterations: usize,
    pub outer_iterations: usize,
}

/// Accumulated statistics of one solve
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolverStats {
    /// Total iLQR iterations across all inner solves
    pub iterations: usize,
    /// Cost of the initial rollout
    pub initial_cost: f64,
    pub cost: Vec<f64>,
    pub dj: Vec<f64>,
    pub gradient: Vec<f64>,
    pub rho: Vec<f64>,
    pub alpha: Vec<f64>,
    pub regularization_increases: usize,
    pub line_search_failures: usize,
    pub outer_iterations: usize,
    pub c_max: Vec<f64>,
    pub penalty_max: Vec<f64>,
    pub inner_iterations: Vec<usize>,
}

impl SolverStats {
    /// Reserve history for `iterations` inner and `outer` outer iterations
    pub fn with_capacity(iterations: usize, outer: usize) -> Self {
        Self {
            cost: Vec::with_capacity(iterations),
            dj: Vec::with_capacity(iterations),
            gradient: Vec::with_capacity(iterations),
            rho: Vec::with_capacity(iterations),
            alpha: Vec::with_capacity(iterations),
            c_max: Vec::with_capacity(outer),
            penalty_max: Vec::with_capacity(outer),
            inner_iterations: Vec::with_capacity(outer),
            ..Default::default()
        }
    }

    pub fn record(&mut self, record: &IterationRecord) {
        self.iterations += 1;
        self.cost.push(record.cost);
        self.dj.push(record.dj);
        self.gradient.push(record.gradient);
        self.rho.push(record.rho);
        self.alpha.push(record.alpha);
        self.regularization_increases += record.regularization_increases;
        if !record.accepted {
            self.line_search_failures += 1;
        }
    }

    pub fn record_outer(&mut self, record: &OuterIterationRecord) {
        self.outer_iterations += 1;
        self.c_max.push(record.c_max);
        self.penalty_max.push(record.penalty_max);
        self.inner_iterations.push(record.inner_iterations);
    }

    /// Clear every counter and history, keeping the allocations
    pub fn reset(&mut self) {
        self.iterations = 0;
        self.initial_cost = 0.0;
        self.cost.clear();
        self.dj.clear();
        self.gradient.clear();
        self.rho.clear();
        self.alpha.clear();
        self.regularization_increases = 0;
        self.line_search_failures = 0;
        self.outer_iterations = 0;
        self.c_max.clear();
        self.penalty_max.clear();
        self.inner_iterations.clear();
    }

    /// Nominal cost after the last iteration
    pub fn final_cost(&self) -> Option<f64> {
        self.cost.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_reset_keep_capacity() {
        let mut stats = SolverStats::with_capacity(50, 5);
        stats.record(&IterationRecord {
            cost: 3.0,
            accepted: true,
            regularization_increases: 2,
            ..Default::default()
        });
        stats.record(&IterationRecord {
            cost: 3.0,
            accepted: false,
            ..Default::default()
        });
        stats.record_outer(&OuterIterationRecord {
            c_max: 0.1,
            ..Default::default()
        });

        assert_eq!(stats.iterations, 2);
        assert_eq!(stats.regularization_increases, 2);
        assert_eq!(stats.line_search_failures, 1);
        assert_eq!(stats.outer_iterations, 1);
        assert_eq!(stats.final_cost(), Some(3.0));

        stats.reset();
        assert_eq!(stats.iterations, 0);
        assert!(stats.cost.is_empty());
        assert!(stats.cost.capacity() >= 50);
        assert!(stats.c_max.capacity() >= 5);
        assert_eq!(stats.final_cost(), None);
    }
}
