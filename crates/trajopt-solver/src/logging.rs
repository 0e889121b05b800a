//! Solver progress reporting
//!
//! The solver pushes one record per iteration into a [`SolverLogger`].
//! The default sink forwards to `tracing`; install a subscriber to see it.

use std::fmt::Debug;
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::solver::TerminationStatus;
use crate::statistics::{IterationRecord, OuterIterationRecord, TerminationRecord};

/// Sink for solver progress
pub trait SolverLogger: Debug + Send + Sync {
    fn iteration(&self, record: &IterationRecord);

    fn outer_iteration(&self, record: &OuterIterationRecord);

    fn termination(&self, record: &TerminationRecord);
}

/// Structured events through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl SolverLogger for TracingLogger {
    fn iteration(&self, record: &IterationRecord) {
        if record.accepted {
            debug!(
                iteration = record.iteration,
                cost = record.cost,
                dj = record.dj,
                expected = record.expected,
                gradient = record.gradient,
                alpha = record.alpha,
                rho = record.rho,
                "iLQR iteration"
            );
        } else {
            debug!(
                iteration = record.iteration,
                cost = record.cost,
                attempts = record.line_search_attempts,
                rho = record.rho,
                "Line search exhausted"
            );
        }
    }

    fn outer_iteration(&self, record: &OuterIterationRecord) {
        info!(
            outer_iteration = record.outer_iteration,
            c_max = record.c_max,
            penalty_max = record.penalty_max,
            cost = record.cost,
            inner_iterations = record.inner_iterations,
            "Augmented Lagrangian iteration"
        );
    }

    fn termination(&self, record: &TerminationRecord) {
        match &record.status {
            TerminationStatus::Solved => info!(
                iterations = record.iterations,
                outer_iterations = record.outer_iterations,
                cost = record.cost,
                c_max = record.c_max,
                "Solve converged"
            ),
            other => warn!(
                status = ?other,
                iterations = record.iterations,
                outer_iterations = record.outer_iterations,
                cost = record.cost,
                c_max = record.c_max,
                "Solve stopped without converging"
            ),
        }
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl SolverLogger for NullLogger {
    fn iteration(&self, _record: &IterationRecord) {}

    fn outer_iteration(&self, _record: &OuterIterationRecord) {}

    fn termination(&self, _record: &TerminationRecord) {}
}

/// Keeps every record in memory, for tests and offline inspection
#[derive(Debug, Default)]
pub struct RecordingLogger {
    iterations: Mutex<Vec<IterationRecord>>,
    outer: Mutex<Vec<OuterIterationRecord>>,
    terminations: Mutex<Vec<TerminationRecord>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iterations(&self) -> Vec<IterationRecord> {
        self.iterations.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn outer_iterations(&self) -> Vec<OuterIterationRecord> {
        self.outer.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn terminations(&self) -> Vec<TerminationRecord> {
        self.terminations.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut v) = self.iterations.lock() {
            v.clear();
        }
        if let Ok(mut v) = self.outer.lock() {
            v.clear();
        }
        if let Ok(mut v) = self.terminations.lock() {
            v.clear();
        }
    }
}

impl SolverLogger for RecordingLogger {
    fn iteration(&self, record: &IterationRecord) {
        if let Ok(mut v) = self.iterations.lock() {
            v.push(*record);
        }
    }

    fn outer_iteration(&self, record: &OuterIterationRecord) {
        if let Ok(mut v) = self.outer.lock() {
            v.push(*record);
        }
    }

    fn termination(&self, record: &TerminationRecord) {
        if let Ok(mut v) = self.terminations.lock() {
            v.push(record.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solved_record() -> TerminationRecord {
        TerminationRecord {
            status: TerminationStatus::Solved,
            cost: 1.5,
            c_max: 0.0,
            iterations: 3,
            outer_iterations: 0,
        }
    }

    #[test]
    fn test_recording_logger_collects_records() {
        let logger = RecordingLogger::new();
        logger.iteration(&IterationRecord {
            iteration: 0,
            accepted: true,
            ..Default::default()
        });
        logger.outer_iteration(&OuterIterationRecord::default());
        logger.termination(&solved_record());

        assert_eq!(logger.iterations().len(), 1);
        assert_eq!(logger.outer_iterations().len(), 1);
        assert_eq!(logger.terminations(), vec![solved_record()]);

        logger.clear();
        assert!(logger.iterations().is_empty());
    }

    #[test]
    fn test_tracing_logger_without_subscriber() {
        let logger = TracingLogger;
        logger.iteration(&IterationRecord::default());
        logger.termination(&TerminationRecord {
            status: TerminationStatus::MaxIterations,
            ..solved_record()
        });
    }
}
