//! Damped pendulum
//!
//! θ̈ = (τ - b θ̇ - m g l sin θ) / (m l²)
//!
//! with θ = 0 hanging straight down. State x = [θ, θ̇], control u = [τ].

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::ContinuousDynamics;

/// Pendulum parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pendulum {
    /// Point mass [kg]
    pub mass: f64,
    /// Rod length [m]
    pub length: f64,
    /// Viscous damping [N·m·s]
    pub damping: f64,
    /// Gravity [m/s²]
    pub gravity: f64,
}

impl Default for Pendulum {
    fn default() -> Self {
        Self {
            mass: 1.0,
            length: 0.5,
            damping: 0.1,
            gravity: 9.81,
        }
    }
}

impl Pendulum {
    fn inertia(&self) -> f64 {
        self.mass * self.length * self.length
    }
}

impl ContinuousDynamics for Pendulum {
    fn state_dim(&self) -> usize {
        2
    }

    fn control_dim(&self) -> usize {
        1
    }

    fn dynamics(&self, x: &DVector<f64>, u: &DVector<f64>) -> DVector<f64> {
        let theta_ddot = (u[0]
            - self.damping * x[1]
            - self.mass * self.gravity * self.length * x[0].sin())
            / self.inertia();
        DVector::from_vec(vec![x[1], theta_ddot])
    }

    fn jacobian(&self, x: &DVector<f64>, _u: &DVector<f64>) -> (DMatrix<f64>, DMatrix<f64>) {
        let j = self.inertia();
        let a = DMatrix::from_row_slice(
            2,
            2,
            &[
                0.0,
                1.0,
                -self.mass * self.gravity * self.length * x[0].cos() / j,
                -self.damping / j,
            ],
        );
        let b = DMatrix::from_row_slice(2, 1, &[0.0, 1.0 / j]);
        (a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::numerical_jacobian;
    use approx::assert_relative_eq;

    #[test]
    fn test_hanging_equilibrium() {
        let p = Pendulum::default();
        let xdot = p.dynamics(&DVector::zeros(2), &DVector::zeros(1));
        assert_relative_eq!(xdot.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_jacobian_matches_finite_difference() {
        let p = Pendulum::default();
        let x = DVector::from_vec(vec![2.0, 0.7]);
        let u = DVector::from_vec(vec![-0.5]);
        let (a, b) = p.jacobian(&x, &u);
        let a_fd = numerical_jacobian(&x, 1e-6, |x| p.dynamics(x, &u));
        let b_fd = numerical_jacobian(&u, 1e-6, |u| p.dynamics(&x, u));
        assert_relative_eq!(a, a_fd, epsilon = 1e-7);
        assert_relative_eq!(b, b_fd, epsilon = 1e-7);
    }
}
