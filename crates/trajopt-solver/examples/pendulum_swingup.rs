//! Pendulum swing-up demonstration
//!
//! Drives a damped pendulum from hanging down to upright and prints the
//! iLQR convergence history.

use std::f64::consts::PI;
use std::sync::Arc;

use trajopt_solver::scenarios::pendulum_swingup;
use trajopt_solver::{RecordingLogger, Solver, SolverConfig, SolverError, SolverLogger};

fn main() -> Result<(), SolverError> {
    println!("=== Pendulum Swing-Up ===\n");

    let problem = pendulum_swingup()?;
    println!("Horizon: {} knots, dt = {} s", problem.horizon(), problem.dt());

    let logger = Arc::new(RecordingLogger::new());
    let sink: Arc<dyn SolverLogger> = logger.clone();
    let mut solver = Solver::with_logger(problem, SolverConfig::default(), sink)?;
    let solution = solver.solve();

    println!(
        "\n{:>5} {:>12} {:>12} {:>12} {:>8} {:>10}",
        "iter", "cost", "dJ", "gradient", "alpha", "rho"
    );
    for record in logger.iterations() {
        println!(
            "{:>5} {:>12.4e} {:>12.4e} {:>12.4e} {:>8.4} {:>10.2e}",
            record.iteration, record.cost, record.dj, record.gradient, record.alpha, record.rho
        );
    }

    println!("\nStatus: {:?}", solution.status);
    println!("Regularization increases: {}", solution.stats.regularization_increases);

    let theta = solution.trajectory.final_state()[0];
    println!("Final angle: {:.4} rad (target {:.4})", theta, PI);
    println!("Peak torque: {:.3} N·m", solution.trajectory.max_control());

    // Sample the optimized motion at 0.5 s spacing
    println!("\n{:>6} {:>10} {:>10}", "t [s]", "theta", "torque");
    let mut t = 0.0;
    while t <= solution.trajectory.duration() + 1e-9 {
        let x = solution.trajectory.state_at(t);
        let u = solution.trajectory.control_at(t);
        println!("{:>6.2} {:>10.4} {:>10.4}", t, x[0], u[0]);
        t += 0.5;
    }

    solution.into_result().map(|_| ())
}
