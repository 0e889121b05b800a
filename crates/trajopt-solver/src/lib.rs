//! # trajopt-solver
//!
//! Trajectory optimizer based on iterative LQR (iLQR / Gauss-Newton DDP)
//! with an augmented Lagrangian outer loop for constraints.
//!
//! ```text
//! minimize    J = Σ ℓ(x_k, u_k) + ℓ_N(x_N)
//! subject to  x_{k+1} = f(x_k, u_k)          (enforced by rollout)
//!             c(x_k, u_k) ≤ 0 / = 0          (augmented Lagrangian)
//!             c_N(x_N) ≤ 0 / = 0
//! ```
//!
//! # Components
//!
//! - [`problem`]: Problem definition and initial guess
//! - [`config`]: Solver options with validated defaults
//! - [`trajectory`]: Knot points, rollout, interpolation, feedback policy
//! - [`objective`]: Cost expansions along a trajectory
//! - [`backward_pass`]: Riccati recursion producing the gains
//! - [`forward_pass`]: Closed-loop rollout and backtracking line search
//! - [`regularization`]: ρ schedule for the backward pass
//! - [`ilqr`]: Inner convergence driver
//! - [`constraints`]: Multipliers, penalties and active sets
//! - [`augmented_lagrangian`]: Outer constraint loop
//! - [`solver`]: Front end, status and errors
//! - [`statistics`] / [`logging`]: Per-iteration diagnostics
//! - [`scenarios`]: Reference problems
//!
//! # Example
//!
//! ```no_run
//! use trajopt_solver::scenarios::{double_integrator, PointMassParams};
//! use trajopt_solver::{Solver, SolverConfig};
//!
//! let problem = double_integrator(&PointMassParams::default()).unwrap();
//! let mut solver = Solver::new(problem, SolverConfig::default()).unwrap();
//! let solution = solver.solve();
//! assert!(solution.is_solved());
//! ```

pub mod augmented_lagrangian;
pub mod backward_pass;
pub mod config;
pub mod constraints;
pub mod forward_pass;
pub mod ilqr;
pub mod logging;
pub mod objective;
pub mod problem;
pub mod regularization;
pub mod scenarios;
pub mod solver;
pub mod statistics;
pub mod trajectory;

// Re-exports
pub use config::{ConfigError, SolverConfig};
pub use logging::{NullLogger, RecordingLogger, SolverLogger, TracingLogger};
pub use problem::Problem;
pub use solver::{Solution, Solver, SolverError, TerminationStatus};
pub use statistics::SolverStats;
pub use trajectory::{FeedbackPolicy, KnotPoint, Trajectory};
