//! Dynamics models
//!
//! The solver only ever talks to [`DiscreteDynamics`]: a discrete-time
//! transition x⁺ = f(x, u, dt) plus its Jacobian pair (A, B).
//! Continuous models implement [`ContinuousDynamics`] and are turned into
//! discrete ones by [`Discretized`] with a chosen [`Integrator`].
//!
//! Models provided:
//! - Double integrator (point mass in any number of spatial dimensions)
//! - Damped pendulum
//! - Linear discrete system x⁺ = A x + B u

pub mod double_integrator;
pub mod linear;
pub mod model;
pub mod pendulum;

pub use double_integrator::*;
pub use linear::*;
pub use model::*;
pub use pendulum::*;
