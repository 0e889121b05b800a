//! Second-order cost expansion buffers

use nalgebra::{DMatrix, DVector};

/// Gradient and Hessian blocks of a stage cost
///
/// `lux` is the m×n mixed block ∂²ℓ/∂u∂x.
#[derive(Debug, Clone, PartialEq)]
pub struct StageExpansion {
    pub lx: DVector<f64>,
    pub lu: DVector<f64>,
    pub lxx: DMatrix<f64>,
    pub luu: DMatrix<f64>,
    pub lux: DMatrix<f64>,
}

impl StageExpansion {
    pub fn zeros(n: usize, m: usize) -> Self {
        Self {
            lx: DVector::zeros(n),
            lu: DVector::zeros(m),
            lxx: DMatrix::zeros(n, n),
            luu: DMatrix::zeros(m, m),
            lux: DMatrix::zeros(m, n),
        }
    }

    pub fn fill_zero(&mut self) {
        self.lx.fill(0.0);
        self.lu.fill(0.0);
        self.lxx.fill(0.0);
        self.luu.fill(0.0);
        self.lux.fill(0.0);
    }
}

/// Gradient and Hessian of the terminal cost
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalExpansion {
    pub lx: DVector<f64>,
    pub lxx: DMatrix<f64>,
}

impl TerminalExpansion {
    pub fn zeros(n: usize) -> Self {
        Self {
            lx: DVector::zeros(n),
            lxx: DMatrix::zeros(n, n),
        }
    }

    pub fn fill_zero(&mut self) {
        self.lx.fill(0.0);
        self.lxx.fill(0.0);
    }
}
