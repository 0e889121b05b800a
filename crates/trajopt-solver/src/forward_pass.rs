//! Closed-loop forward pass with backtracking line search
//!
//! For a step size α the candidate is rolled out from x_0 with
//!
//! ```text
//! u_k = ū_k + α·d_k + K_k (x_k − x̄_k)
//! ```
//!
//! and accepted when the ratio z of actual to predicted decrease lies in
//! the configured band. α shrinks geometrically between attempts.

use trajopt_core::dynamics::DiscreteDynamics;

use crate::backward_pass::{ExpectedDecrease, Gains};
use crate::config::{LineSearchConfig, NumericBounds};
use crate::objective::Objective;
use crate::solver::SolverError;
use crate::trajectory::Trajectory;

/// Below this (relative to the cost scale) a predicted decrease counts as zero
const NEGLIGIBLE_DECREASE: f64 = 1e-10;

/// Accepted step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub alpha: f64,
    /// Candidate cost
    pub cost: f64,
    /// Actual decrease J_prev − J
    pub dj: f64,
    /// Predicted decrease at α
    pub expected: f64,
    /// Step sizes tried, including the accepted one
    pub attempts: usize,
}

/// Result of a line search that did not overflow
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineSearchOutcome {
    Accepted(Step),
    /// No step size met the acceptance band
    Exhausted { attempts: usize },
}

/// Roll the candidate out under the affine policy with step size α
pub fn rollout<D: DiscreteDynamics>(
    dynamics: &D,
    nominal: &Trajectory,
    candidate: &mut Trajectory,
    gains: &Gains,
    alpha: f64,
) {
    let knots = candidate.knots_mut();
    knots[0].x.copy_from(nominal.initial_state());

    for k in 0..nominal.num_intervals() {
        let reference = nominal.knot(k);
        let (head, tail) = knots.split_at_mut(k + 1);
        let knot = &mut head[k];

        let feedback = &gains.feedback[k];
        let feedforward = &gains.feedforward[k];
        for i in 0..knot.u.len() {
            let mut u = reference.u[i] + alpha * feedforward[i];
            for j in 0..knot.x.len() {
                u += feedback[(i, j)] * (knot.x[j] - reference.x[j]);
            }
            knot.u[i] = u;
        }

        dynamics.step(&knot.x, &knot.u, knot.dt, &mut tail[0].x);
    }
}

/// Fail when the cost or any state or control component exceeds its bound
///
/// NaN anywhere counts as overflow.
pub fn check_bounds(trajectory: &Trajectory, cost: f64, bounds: &NumericBounds) -> Result<(), SolverError> {
    let max_state = trajectory.max_state();
    let max_control = trajectory.max_control();
    let within = |value: f64, limit: f64| !value.is_nan() && value.abs() <= limit;

    if within(cost, bounds.max_cost)
        && within(max_state, bounds.max_state)
        && within(max_control, bounds.max_control)
    {
        Ok(())
    } else {
        Err(SolverError::NumericOverflow {
            cost,
            max_state,
            max_control,
        })
    }
}

/// Backtracking line search from the nominal along the gains
///
/// `candidate` holds the last trial on return. Overflow aborts the search
/// immediately.
#[allow(clippy::too_many_arguments)]
pub fn line_search<D: DiscreteDynamics, O: Objective>(
    dynamics: &D,
    objective: &mut O,
    nominal: &Trajectory,
    candidate: &mut Trajectory,
    gains: &Gains,
    nominal_cost: f64,
    expected: ExpectedDecrease,
    config: &LineSearchConfig,
    bounds: &NumericBounds,
) -> Result<LineSearchOutcome, SolverError> {
    let scale = nominal_cost.abs().max(1.0);
    let mut alpha = 1.0;

    for attempt in 1..=config.max_iterations {
        rollout(dynamics, nominal, candidate, gains, alpha);
        let cost = objective.cost(candidate);
        check_bounds(candidate, cost, bounds)?;

        let dj = nominal_cost - cost;
        let predicted = expected.at(alpha);

        let accept = if predicted.abs() <= NEGLIGIBLE_DECREASE * scale {
            dj >= -NEGLIGIBLE_DECREASE * scale
        } else {
            let z = dj / predicted;
            z >= config.lower_bound && z <= config.upper_bound
        };

        if accept {
            return Ok(LineSearchOutcome::Accepted(Step {
                alpha,
                cost,
                dj,
                expected: predicted,
                attempts: attempt,
            }));
        }
        alpha *= config.backtrack_factor;
    }

    Ok(LineSearchOutcome::Exhausted {
        attempts: config.max_iterations,
    })
}
