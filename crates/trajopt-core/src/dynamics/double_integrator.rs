//! Double integrator (point mass)
//!
//! State x = [p, v] with p, v ∈ ℝᵈ, control u = a ∈ ℝᵈ:
//!
//! ṗ = v
//! v̇ = u

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::ContinuousDynamics;

/// Point mass with direct acceleration control
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoubleIntegrator {
    /// Number of spatial dimensions d
    pub dims: usize,
}

impl DoubleIntegrator {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    /// Planar point mass (d = 2, n = 4, m = 2)
    pub fn planar() -> Self {
        Self::new(2)
    }
}

impl Default for DoubleIntegrator {
    fn default() -> Self {
        Self::planar()
    }
}

impl ContinuousDynamics for DoubleIntegrator {
    fn state_dim(&self) -> usize {
        2 * self.dims
    }

    fn control_dim(&self) -> usize {
        self.dims
    }

    fn dynamics(&self, x: &DVector<f64>, u: &DVector<f64>) -> DVector<f64> {
        let d = self.dims;
        let mut xdot = DVector::zeros(2 * d);
        xdot.rows_mut(0, d).copy_from(&x.rows(d, d));
        xdot.rows_mut(d, d).copy_from(u);
        xdot
    }

    fn jacobian(&self, _x: &DVector<f64>, _u: &DVector<f64>) -> (DMatrix<f64>, DMatrix<f64>) {
        let d = self.dims;
        let mut a = DMatrix::zeros(2 * d, 2 * d);
        let mut b = DMatrix::zeros(2 * d, d);
        for i in 0..d {
            a[(i, d + i)] = 1.0;
            b[(d + i, i)] = 1.0;
        }
        (a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::{DiscreteDynamics, Discretized, Integrator};
    use approx::assert_relative_eq;

    #[test]
    fn test_planar_dimensions() {
        let model = DoubleIntegrator::planar();
        assert_eq!(model.state_dim(), 4);
        assert_eq!(model.control_dim(), 2);
    }

    #[test]
    fn test_dynamics() {
        let model = DoubleIntegrator::planar();
        let x = DVector::from_vec(vec![1.0, 2.0, 0.5, -0.5]);
        let u = DVector::from_vec(vec![0.1, 0.2]);
        let xdot = model.dynamics(&x, &u);
        assert_relative_eq!(xdot, DVector::from_vec(vec![0.5, -0.5, 0.1, 0.2]));
    }

    #[test]
    fn test_rk4_is_exact_for_constant_acceleration() {
        // p⁺ = p + v h + ½ a h², v⁺ = v + a h
        let model = Discretized::new(DoubleIntegrator::planar(), Integrator::Rk4);
        let x = DVector::from_vec(vec![0.0, 1.0, 2.0, 0.0]);
        let u = DVector::from_vec(vec![1.0, -2.0]);
        let h = 0.1;
        let mut next = DVector::zeros(4);
        model.step(&x, &u, h, &mut next);

        assert_relative_eq!(next[0], 2.0 * h + 0.5 * h * h, epsilon = 1e-12);
        assert_relative_eq!(next[1], 1.0 - h * h, epsilon = 1e-12);
        assert_relative_eq!(next[2], 2.0 + h, epsilon = 1e-12);
        assert_relative_eq!(next[3], -2.0 * h, epsilon = 1e-12);
    }
}
