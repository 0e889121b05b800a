//! End-to-end solver validation
//!
//! Checks the solver against closed-form LQR, the reference scenarios and
//! the failure modes it must report.

use std::sync::Arc;

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};

use trajopt_core::cost::{CostFunction, StageExpansion, TerminalExpansion};
use trajopt_core::dynamics::LinearDiscrete;
use trajopt_core::math::is_positive_definite;

use trajopt_solver::config::SolverConfig;
use trajopt_solver::scenarios::{
    bounded_double_integrator, double_integrator, linear_quadratic, pendulum_swingup,
    singular_double_integrator, PointMassParams,
};
use trajopt_solver::{
    NullLogger, Problem, RecordingLogger, Solver, SolverError, SolverLogger, TerminationStatus,
};

fn quiet_solver<D, C>(problem: Problem<D, C>, config: SolverConfig) -> Solver<D, C>
where
    D: trajopt_core::dynamics::DiscreteDynamics,
    C: CostFunction,
{
    Solver::with_logger(problem, config, Arc::new(NullLogger)).unwrap()
}

fn recorded_solver<D, C>(
    problem: Problem<D, C>,
    config: SolverConfig,
) -> (Solver<D, C>, Arc<RecordingLogger>)
where
    D: trajopt_core::dynamics::DiscreteDynamics,
    C: CostFunction,
{
    let logger = Arc::new(RecordingLogger::new());
    let sink: Arc<dyn SolverLogger> = logger.clone();
    (Solver::with_logger(problem, config, sink).unwrap(), logger)
}

/// Finite-horizon discrete Riccati recursion
///
/// Returns the gains K_k per interval and the cost-to-go P_k per knot,
/// with P_N = Qf.
fn riccati(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
    qf: &DMatrix<f64>,
    intervals: usize,
) -> (Vec<DMatrix<f64>>, Vec<DMatrix<f64>>) {
    let mut cost_to_go = vec![qf.clone(); intervals + 1];
    let mut gains = vec![DMatrix::zeros(b.ncols(), a.nrows()); intervals];
    for k in (0..intervals).rev() {
        let p = &cost_to_go[k + 1];
        let quu = r + b.transpose() * p * b;
        let qux = b.transpose() * p * a;
        let gain = -quu.try_inverse().unwrap() * &qux;
        cost_to_go[k] = q + a.transpose() * p * a + qux.transpose() * &gain;
        gains[k] = gain;
    }
    (gains, cost_to_go)
}

mod lqr_equivalence_tests {
    use super::*;

    #[test]
    fn test_gains_match_riccati_recursion() {
        let problem = linear_quadratic(30).unwrap();
        let (expected, _) = riccati(
            problem.dynamics.a(),
            problem.dynamics.b(),
            &problem.cost.q,
            &problem.cost.r,
            &problem.cost.qf,
            29,
        );
        let mut solver = quiet_solver(problem, SolverConfig::default());
        let solution = solver.solve();

        assert!(solution.is_solved());
        for (k, gain) in expected.iter().enumerate() {
            assert_relative_eq!(&solution.gains.feedback[k], gain, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_cost_to_go_matches_riccati_recursion() {
        let problem = linear_quadratic(30).unwrap();
        let (_, expected) = riccati(
            problem.dynamics.a(),
            problem.dynamics.b(),
            &problem.cost.q,
            &problem.cost.r,
            &problem.cost.qf,
            29,
        );
        let mut solver = quiet_solver(problem, SolverConfig::default());
        assert!(solver.solve().is_solved());

        let hessians = &solver.engine().backward_pass().value_function().hessian;
        assert_eq!(hessians.len(), expected.len());
        for (s, p) in hessians.iter().zip(&expected) {
            assert_relative_eq!(s, p, epsilon = 1e-8, max_relative = 1e-10);
        }
    }

    #[test]
    fn test_single_newton_step_reaches_optimum() {
        let problem = linear_quadratic(30).unwrap();
        let (mut solver, logger) = recorded_solver(problem, SolverConfig::default());
        let solution = solver.solve();

        let records = logger.iterations();
        assert_eq!(records.len(), 2);
        assert_relative_eq!(records[0].alpha, 1.0);
        assert_relative_eq!(records[0].rho, 0.0);
        assert!(records[1].dj.abs() < 1e-8);

        // The optimal controls are the LQR feedback applied along the path
        for k in 0..solution.trajectory.num_intervals() {
            let u = &solution.gains.feedback[k] * solution.trajectory.state(k);
            assert_relative_eq!(solution.trajectory.control(k), &u, epsilon = 1e-8);
        }
    }
}

mod regularization_tests {
    use super::*;

    #[test]
    fn test_singular_control_weight_needs_regularization() {
        let problem = singular_double_integrator(&PointMassParams::default()).unwrap();
        let (mut solver, logger) = recorded_solver(problem, SolverConfig::default());
        let solution = solver.solve();

        assert!(solution.is_solved(), "status: {:?}", solution.status);
        assert!(solution.stats.regularization_increases >= 1);
        assert!(logger.iterations()[0].regularization_increases >= 1);
    }

    #[test]
    fn test_regularized_hessians_are_positive_definite() {
        let problem = singular_double_integrator(&PointMassParams::default()).unwrap();
        let mut solver = quiet_solver(problem, SolverConfig::default());
        solver.solve();

        let hessians = solver.engine().backward_pass().regularized_hessians();
        assert_eq!(hessians.len(), 49);
        assert!(hessians.iter().all(is_positive_definite));
    }

    #[test]
    fn test_hessians_positive_definite_at_every_budget() {
        for budget in 1..=5 {
            let mut config = SolverConfig::default();
            config.ilqr.max_iterations = budget;

            let problem = singular_double_integrator(&PointMassParams::default()).unwrap();
            let mut solver = quiet_solver(problem, config.clone());
            solver.solve();
            let hessians = solver.engine().backward_pass().regularized_hessians();
            assert_eq!(hessians.len(), 49);
            assert!(hessians.iter().all(is_positive_definite), "budget {}", budget);

            let mut solver = quiet_solver(pendulum_swingup().unwrap(), config);
            solver.solve();
            let hessians = solver.engine().backward_pass().regularized_hessians();
            assert!(!hessians.is_empty());
            assert!(hessians.iter().all(is_positive_definite), "budget {}", budget);
        }
    }

    #[test]
    fn test_failed_regularization_leaves_no_partial_pass() {
        // S_N = 10 keeps the last knot definite; R = -1 breaks the one before
        let dynamics =
            LinearDiscrete::new(DMatrix::identity(1, 1), DMatrix::identity(1, 1)).unwrap();
        let cost = trajopt_core::cost::QuadraticCost::diagonal(&[0.0], &[-1.0], &[10.0], DVector::zeros(1))
            .unwrap();
        let problem = Problem::new(dynamics, cost, DVector::from_vec(vec![1.0]), 6, 1.0).unwrap();

        let mut config = SolverConfig::default();
        config.ilqr.regularization.max = 1e-3;
        config.ilqr.regularization.forward_pass_bump = 1e-4;
        let mut solver = quiet_solver(problem, config);
        let solution = solver.solve();

        assert!(matches!(
            solution.status,
            TerminationStatus::Failed(SolverError::NonPositiveDefinite { knot: 3, .. })
        ));
        let backward = solver.engine().backward_pass();
        assert!(!backward.has_solution());
        assert!(backward.regularized_hessians().is_empty());
        assert!(solution.gains.feedback.iter().all(|k| k.iter().all(|&v| v == 0.0)));
        assert!(solution.gains.feedforward.iter().all(|d| d.iter().all(|&v| v == 0.0)));
    }

    #[test]
    fn test_rho_stays_in_band() {
        let config = SolverConfig::default();
        let (min, max) = (config.ilqr.regularization.min, config.ilqr.regularization.max);
        let problem = singular_double_integrator(&PointMassParams::default()).unwrap();
        let (mut solver, logger) = recorded_solver(problem, config);
        solver.solve();

        for record in logger.iterations() {
            for rho in [record.rho, record.rho_backward] {
                assert!(rho == 0.0 || (rho >= min && rho <= max), "rho = {}", rho);
            }
            // Accepted steps that needed no retry never raise ρ
            if record.accepted && record.regularization_increases == 0 {
                assert!(record.rho <= record.rho_backward);
            }
        }
    }

    #[test]
    fn test_indefinite_cost_fails_at_regularization_ceiling() {
        let dynamics =
            LinearDiscrete::new(DMatrix::identity(2, 2), DMatrix::identity(2, 2)).unwrap();
        let cost = trajopt_core::cost::QuadraticCost::diagonal(
            &[1.0, 1.0],
            &[-1.0, -1.0],
            &[0.0, 0.0],
            DVector::zeros(2),
        )
        .unwrap();
        let problem = Problem::new(dynamics, cost, DVector::from_vec(vec![1.0, 1.0]), 10, 1.0).unwrap();

        let mut config = SolverConfig::default();
        config.ilqr.regularization.max = 1.0;
        config.ilqr.regularization.forward_pass_bump = 0.1;
        let mut solver = quiet_solver(problem, config);
        let solution = solver.solve();

        assert!(matches!(
            solution.status,
            TerminationStatus::Failed(SolverError::NonPositiveDefinite { .. })
        ));
        assert!(solver.regularization() <= 1.0);
    }
}

/// Cost whose reported gradient points uphill
#[derive(Debug, Clone)]
struct MisleadingCost;

impl CostFunction for MisleadingCost {
    fn stage_cost(&self, x: &DVector<f64>, u: &DVector<f64>) -> f64 {
        0.5 * x.norm_squared() + 0.5 * u.norm_squared()
    }

    fn terminal_cost(&self, x: &DVector<f64>) -> f64 {
        0.5 * x.norm_squared()
    }

    fn stage_expansion(&self, x: &DVector<f64>, u: &DVector<f64>, out: &mut StageExpansion) {
        out.fill_zero();
        out.lx.copy_from(&(-x));
        out.lu.copy_from(&(-u));
        out.lxx.fill_diagonal(1.0);
        out.luu.fill_diagonal(1.0);
    }

    fn terminal_expansion(&self, x: &DVector<f64>, out: &mut TerminalExpansion) {
        out.fill_zero();
        out.lx.copy_from(&(-x));
        out.lxx.fill_diagonal(1.0);
    }
}

mod failure_mode_tests {
    use super::*;

    #[test]
    fn test_wrong_gradient_exhausts_line_search() {
        let dynamics =
            LinearDiscrete::new(DMatrix::identity(1, 1), DMatrix::identity(1, 1)).unwrap();
        let problem = Problem::new(dynamics, MisleadingCost, DVector::from_vec(vec![1.0]), 10, 1.0).unwrap();
        let config = SolverConfig::default();
        let limit = config.ilqr.dj_counter_limit;
        let (mut solver, logger) = recorded_solver(problem, config);
        let solution = solver.solve();

        assert_eq!(
            solution.status,
            TerminationStatus::Failed(SolverError::LineSearchExhausted { failures: limit + 1 })
        );
        assert!(logger.iterations().iter().all(|r| !r.accepted));
        // Every exhausted search bumps ρ
        let rhos: Vec<f64> = logger.iterations().iter().map(|r| r.rho).collect();
        assert!(rhos.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_state_bound_overflow_is_fatal() {
        let problem = double_integrator(&PointMassParams::default()).unwrap();
        let mut config = SolverConfig::default();
        config.ilqr.bounds.max_state = 0.5;
        let mut solver = quiet_solver(problem, config);
        let solution = solver.solve();

        match &solution.status {
            TerminationStatus::Failed(SolverError::NumericOverflow { max_state, .. }) => {
                assert!(*max_state > 0.5);
            }
            other => panic!("expected overflow, got {:?}", other),
        }
        // The last valid trajectory is the untouched initial guess
        assert!(solution.trajectory.states().all(|x| x.iter().all(|&v| v == 0.0)));
        assert!(matches!(
            solution.into_result(),
            Err(SolverError::NumericOverflow { .. })
        ));
    }

    #[test]
    fn test_iteration_budget() {
        let problem = pendulum_swingup().unwrap();
        let mut config = SolverConfig::default();
        config.ilqr.max_iterations = 2;
        let mut solver = quiet_solver(problem, config);
        let solution = solver.solve();

        assert_eq!(solution.status, TerminationStatus::MaxIterations);
        assert_eq!(solution.stats.iterations, 2);
        assert!(solution.cost <= solution.stats.initial_cost);
    }
}

mod scenario_tests {
    use super::*;

    #[test]
    fn test_double_integrator_reaches_goal() {
        let params = PointMassParams::default();
        let goal = params.goal_state();
        let mut solver = quiet_solver(double_integrator(&params).unwrap(), SolverConfig::default());
        let solution = solver.solve();

        assert!(solution.is_solved());
        assert!(solution.stats.iterations <= 3);
        assert_relative_eq!(solution.trajectory.final_state(), &goal, epsilon = 1e-3);
    }

    #[test]
    fn test_control_bounds_respected() {
        let params = PointMassParams::default();

        // Tighten the bound below the unconstrained peak
        let mut free = quiet_solver(double_integrator(&params).unwrap(), SolverConfig::default());
        let peak = free.solve().trajectory.max_control();
        let limit = 0.8 * peak;

        let problem = bounded_double_integrator(&params, limit).unwrap();
        let mut solver = quiet_solver(problem, SolverConfig::default());
        let solution = solver.solve();

        assert!(solution.is_solved(), "status: {:?}", solution.status);
        assert!(solution.c_max < 1e-4);
        assert!(solution.stats.outer_iterations <= 10);
        assert!(solution.trajectory.max_control() <= limit + 1e-4);
        assert!(solution.stats.penalty_max.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_constraint_violation_shrinks_over_outer_iterations() {
        let params = PointMassParams::default();
        let mut free = quiet_solver(double_integrator(&params).unwrap(), SolverConfig::default());
        let limit = 0.8 * free.solve().trajectory.max_control();

        let problem = bounded_double_integrator(&params, limit).unwrap();
        let (mut solver, logger) = recorded_solver(problem, SolverConfig::default());
        let solution = solver.solve();

        assert!(solution.is_solved(), "status: {:?}", solution.status);
        let history = &solution.stats.c_max;
        assert!(history.len() >= 2);
        let (first, last) = (history[0], history[history.len() - 1]);
        assert!(last < first);
        assert!(last < 1e-4);

        // The reported cost excludes the penalty terms
        let termination = logger.terminations().pop().unwrap();
        assert_eq!(termination.status, solution.status);
        assert_relative_eq!(termination.cost, solution.cost);
        assert_relative_eq!(termination.c_max, solution.c_max);
        assert_relative_eq!(termination.cost, solver.problem().cost_of(&solution.trajectory));
    }

    #[test]
    fn test_pendulum_swingup_descends_monotonically() {
        let (mut solver, logger) = recorded_solver(pendulum_swingup().unwrap(), SolverConfig::default());
        let solution = solver.solve();

        assert!(solution.is_solved(), "status: {:?}", solution.status);
        assert_relative_eq!(solution.trajectory.final_state()[0], std::f64::consts::PI, epsilon = 0.05);

        let mut previous = solution.stats.initial_cost;
        for record in logger.iterations() {
            assert!(record.cost <= previous + 1e-9 * previous.abs().max(1.0));
            previous = record.cost;
        }
    }
}

mod lifecycle_tests {
    use super::*;

    #[test]
    fn test_reset_then_solve_is_deterministic() {
        let params = PointMassParams::default();
        let problem = bounded_double_integrator(&params, 0.2).unwrap();
        let mut solver = quiet_solver(problem, SolverConfig::default());

        let first = solver.solve();
        solver.reset();
        assert_eq!(solver.status(), &TerminationStatus::Unsolved);
        let second = solver.solve();

        assert_eq!(first.trajectory, second.trajectory);
        assert_eq!(first.gains, second.gains);
        assert_eq!(first.stats, second.stats);
    }

    #[test]
    fn test_clones_are_independent() {
        let problem = double_integrator(&PointMassParams::default()).unwrap();
        let mut original = quiet_solver(problem, SolverConfig::default());
        let mut copy = original.clone();

        let solved = original.solve();
        assert_eq!(copy.status(), &TerminationStatus::Unsolved);
        assert_eq!(copy.stats().iterations, 0);
        assert_ne!(copy.trajectory(), original.trajectory());

        let solved_copy = copy.solve();
        assert_eq!(solved.trajectory, solved_copy.trajectory);
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let mut config = SolverConfig::default();
        config.ilqr.max_iterations = 42;
        config.augmented_lagrangian.penalty_scale = 5.0;

        let json = serde_json::to_string(&config).unwrap();
        let parsed: SolverConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
