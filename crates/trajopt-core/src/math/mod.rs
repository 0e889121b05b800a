//! Mathematical utilities
//!
//! Numerical integrators (with discrete-step Jacobians) and the handful of
//! dense linear algebra helpers the solver needs.

pub mod integrator;
pub mod linalg;

pub use integrator::*;
pub use linalg::*;
