//! Point-mass demonstration
//!
//! Solves the planar double integrator twice: once unconstrained, once with
//! the controls bounded below the unconstrained peak, and prints the
//! outer-loop history of the constrained solve.

use std::sync::Arc;

use trajopt_solver::scenarios::{bounded_double_integrator, double_integrator, PointMassParams};
use trajopt_solver::{RecordingLogger, Solver, SolverConfig, SolverError, SolverLogger};

fn main() -> Result<(), SolverError> {
    println!("=== Double Integrator ===\n");

    let params = PointMassParams::default();
    println!("Horizon: {} knots, dt = {} s", params.horizon, params.dt);
    println!("Goal: {:?}", params.goal);

    // === Unconstrained ===
    let mut solver = Solver::new(double_integrator(&params)?, SolverConfig::default())?;
    let free = solver.solve().into_result()?;
    let peak = free.trajectory.max_control();

    println!("\n--- Unconstrained ---");
    println!("Iterations: {}", free.stats.iterations);
    println!("Cost: {:.3e} -> {:.3e}", free.stats.initial_cost, free.cost);
    println!("Final state: {:?}", free.trajectory.final_state().as_slice());
    println!("Peak |u|: {:.4}", peak);

    // === Bounded controls ===
    let limit = 0.8 * peak;
    let logger = Arc::new(RecordingLogger::new());
    let sink: Arc<dyn SolverLogger> = logger.clone();
    let mut solver = Solver::with_logger(
        bounded_double_integrator(&params, limit)?,
        SolverConfig::default(),
        sink,
    )?;
    let bounded = solver.solve();

    println!("\n--- |u| <= {:.4} ---", limit);
    println!("Status: {:?}", bounded.status);
    println!("{:>6} {:>12} {:>12} {:>8}", "outer", "c_max", "penalty", "inner");
    for record in logger.outer_iterations() {
        println!(
            "{:>6} {:>12.3e} {:>12.3e} {:>8}",
            record.outer_iteration, record.c_max, record.penalty_max, record.inner_iterations
        );
    }
    println!("Cost: {:.3e}", bounded.cost);
    println!("Peak |u|: {:.4}", bounded.trajectory.max_control());
    println!("Final state: {:?}", bounded.trajectory.final_state().as_slice());

    // === Feedback replay ===
    let policy = bounded.policy();
    let replay = policy.simulate(&solver.problem().dynamics, solver.problem().initial_state());
    let drift = (replay.final_state() - bounded.trajectory.final_state()).norm();
    println!("\nClosed-loop replay drift: {:.3e}", drift);

    Ok(())
}
