//! Riccati backward pass
//!
//! Starting from the terminal cost expansion, each interval builds the
//! quadratic model of the action-value function
//!
//! ```text
//! Qx  = lx  + Aᵀs          Qu  = lu  + Bᵀs
//! Qxx = lxx + AᵀSA         Quu = luu + BᵀSB         Qux = lux + BᵀSA
//! ```
//!
//! regularizes it, factors Quu_reg with a Cholesky decomposition and
//! solves for the gains
//!
//! ```text
//! K = -Quu_reg⁻¹ Qux_reg      d = -Quu_reg⁻¹ Qu
//! ```
//!
//! The value function is then updated with the unregularized blocks:
//!
//! ```text
//! S = Qxx + KᵀQuuK + KᵀQux + QuxᵀK
//! s = Qx  + KᵀQuud + KᵀQu  + Quxᵀd
//! ```
//!
//! Every buffer is allocated once in [`BackwardPass::new`]. The Cholesky
//! factor reuses its storage across knots; only a failed factorization
//! allocates a replacement.

use std::mem;

use nalgebra::{Cholesky, DMatrix, DVector};
use thiserror::Error;

use trajopt_core::math::symmetrize;

use crate::config::RegularizationMode;
use crate::objective::CostExpansion;

/// Quu_reg failed its Cholesky factorization at some interval
#[derive(Debug, Error, Clone, Copy, PartialEq)]
#[error("Quu not positive definite at knot {knot} (rho = {rho})")]
pub struct IndefiniteHessian {
    pub knot: usize,
    pub rho: f64,
}

/// Discrete dynamics Jacobians along the nominal trajectory
#[derive(Debug, Clone, PartialEq)]
pub struct Linearization {
    /// ∂f/∂x per interval (n×n)
    pub a: Vec<DMatrix<f64>>,
    /// ∂f/∂u per interval (n×m)
    pub b: Vec<DMatrix<f64>>,
}

impl Linearization {
    pub fn zeros(state_dim: usize, control_dim: usize, horizon: usize) -> Self {
        let intervals = horizon.saturating_sub(1);
        Self {
            a: vec![DMatrix::zeros(state_dim, state_dim); intervals],
            b: vec![DMatrix::zeros(state_dim, control_dim); intervals],
        }
    }
}

/// Quadratic value function S_k, s_k per knot
#[derive(Debug, Clone, PartialEq)]
pub struct ValueFunction {
    pub hessian: Vec<DMatrix<f64>>,
    pub gradient: Vec<DVector<f64>>,
}

/// Feedback and feedforward gains per interval
#[derive(Debug, Clone, PartialEq)]
pub struct Gains {
    /// K_k (m×n)
    pub feedback: Vec<DMatrix<f64>>,
    /// d_k (m)
    pub feedforward: Vec<DVector<f64>>,
}

impl Gains {
    pub fn zeros(state_dim: usize, control_dim: usize, horizon: usize) -> Self {
        let intervals = horizon.saturating_sub(1);
        Self {
            feedback: vec![DMatrix::zeros(control_dim, state_dim); intervals],
            feedforward: vec![DVector::zeros(control_dim); intervals],
        }
    }

    pub fn copy_from(&mut self, other: &Gains) {
        for (dst, src) in self.feedback.iter_mut().zip(&other.feedback) {
            dst.copy_from(src);
        }
        for (dst, src) in self.feedforward.iter_mut().zip(&other.feedforward) {
            dst.copy_from(src);
        }
    }
}

/// Coefficients of the predicted cost change
///
/// For a step of size α the quadratic model predicts
/// J(α) − J(0) = α·ΔJ₁ + α²·ΔJ₂, where ΔJ₁ = Σ dᵀQu and
/// ΔJ₂ = Σ ½dᵀQuu d.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExpectedDecrease {
    pub linear: f64,
    pub quadratic: f64,
}

impl ExpectedDecrease {
    /// Predicted decrease J(0) − J(α), positive for a descent step
    pub fn at(&self, alpha: f64) -> f64 {
        -alpha * (self.linear + alpha * self.quadratic)
    }
}

/// Scratch blocks of the action-value function
#[derive(Debug, Clone, PartialEq)]
struct ActionValue {
    qx: DVector<f64>,
    qu: DVector<f64>,
    qxx: DMatrix<f64>,
    quu: DMatrix<f64>,
    qux: DMatrix<f64>,
    qux_reg: DMatrix<f64>,
    // S·A and S·B products
    sa: DMatrix<f64>,
    sb: DMatrix<f64>,
    // Quu·K and Quu·d
    quu_k: DMatrix<f64>,
    quu_d: DVector<f64>,
    // Storage handed to the Cholesky factorization and taken back after
    factor: DMatrix<f64>,
}

/// Everything one pass produces
#[derive(Debug, Clone, PartialEq)]
struct PassOutput {
    value: ValueFunction,
    gains: Gains,
    quu_reg: Vec<DMatrix<f64>>,
}

impl PassOutput {
    fn zeros(n: usize, m: usize, horizon: usize) -> Self {
        let intervals = horizon.saturating_sub(1);
        Self {
            value: ValueFunction {
                hessian: vec![DMatrix::zeros(n, n); horizon],
                gradient: vec![DVector::zeros(n); horizon],
            },
            gains: Gains::zeros(n, m, horizon),
            quu_reg: vec![DMatrix::zeros(m, m); intervals],
        }
    }

    fn fill_zero(&mut self) {
        self.value.hessian.iter_mut().for_each(|s| s.fill(0.0));
        self.value.gradient.iter_mut().for_each(|g| g.fill(0.0));
        self.gains.feedback.iter_mut().for_each(|k| k.fill(0.0));
        self.gains.feedforward.iter_mut().for_each(|d| d.fill(0.0));
        self.quu_reg.iter_mut().for_each(|q| q.fill(0.0));
    }
}

/// Backward pass buffers and results
///
/// Each pass writes into a working copy that replaces the published
/// results only when the whole recursion succeeds, so a failed pass never
/// leaks into the gains, value function or regularized Hessians.
#[derive(Debug, Clone, PartialEq)]
pub struct BackwardPass {
    published: PassOutput,
    work: PassOutput,
    q: ActionValue,
    solved: bool,
}

impl BackwardPass {
    pub fn new(state_dim: usize, control_dim: usize, horizon: usize) -> Self {
        let (n, m) = (state_dim, control_dim);
        Self {
            published: PassOutput::zeros(n, m, horizon),
            work: PassOutput::zeros(n, m, horizon),
            q: ActionValue {
                qx: DVector::zeros(n),
                qu: DVector::zeros(m),
                qxx: DMatrix::zeros(n, n),
                quu: DMatrix::zeros(m, m),
                qux: DMatrix::zeros(m, n),
                qux_reg: DMatrix::zeros(m, n),
                sa: DMatrix::zeros(n, n),
                sb: DMatrix::zeros(n, m),
                quu_k: DMatrix::zeros(m, n),
                quu_d: DVector::zeros(m),
                factor: DMatrix::zeros(m, m),
            },
            solved: false,
        }
    }

    /// Gains of the last successful pass (zeros before the first one)
    pub fn gains(&self) -> &Gains {
        &self.published.gains
    }

    pub fn value_function(&self) -> &ValueFunction {
        &self.published.value
    }

    /// Regularized Quu of the last successful pass, one per interval
    ///
    /// Empty until a pass has succeeded.
    pub fn regularized_hessians(&self) -> &[DMatrix<f64>] {
        if self.solved {
            &self.published.quu_reg
        } else {
            &[]
        }
    }

    /// Whether any pass has succeeded since construction or reset
    pub fn has_solution(&self) -> bool {
        self.solved
    }

    /// Zero the published results without reallocating
    pub fn reset(&mut self) {
        self.published.fill_zero();
        self.solved = false;
    }

    /// Run the recursion at regularization `rho`
    ///
    /// On failure the published results are left untouched; callers retry
    /// with a larger ρ.
    pub fn run(
        &mut self,
        linearization: &Linearization,
        expansion: &CostExpansion,
        rho: f64,
        mode: RegularizationMode,
    ) -> Result<ExpectedDecrease, IndefiniteHessian> {
        let expected = recurse(&mut self.work, &mut self.q, linearization, expansion, rho, mode)?;
        mem::swap(&mut self.published, &mut self.work);
        self.solved = true;
        Ok(expected)
    }
}

fn recurse(
    out: &mut PassOutput,
    q: &mut ActionValue,
    linearization: &Linearization,
    expansion: &CostExpansion,
    rho: f64,
    mode: RegularizationMode,
) -> Result<ExpectedDecrease, IndefiniteHessian> {
    let PassOutput {
        value,
        gains,
        quu_reg,
    } = out;

    let last = value.hessian.len() - 1;
    value.hessian[last].copy_from(&expansion.terminal.lxx);
    value.gradient[last].copy_from(&expansion.terminal.lx);

    let mut expected = ExpectedDecrease::default();

    for k in (0..last).rev() {
        let a = &linearization.a[k];
        let b = &linearization.b[k];
        let stage = &expansion.stage[k];

        let (s_head, s_tail) = value.hessian.split_at_mut(k + 1);
        let (g_head, g_tail) = value.gradient.split_at_mut(k + 1);
        let s_next = &s_tail[0];
        let g_next = &g_tail[0];

        q.qx.copy_from(&stage.lx);
        q.qx.gemv_tr(1.0, a, g_next, 1.0);
        q.qu.copy_from(&stage.lu);
        q.qu.gemv_tr(1.0, b, g_next, 1.0);

        q.sa.gemm(1.0, s_next, a, 0.0);
        q.sb.gemm(1.0, s_next, b, 0.0);

        q.qxx.copy_from(&stage.lxx);
        q.qxx.gemm_tr(1.0, a, &q.sa, 1.0);
        q.quu.copy_from(&stage.luu);
        q.quu.gemm_tr(1.0, b, &q.sb, 1.0);
        q.qux.copy_from(&stage.lux);
        q.qux.gemm_tr(1.0, b, &q.sa, 1.0);

        let reg = &mut quu_reg[k];
        reg.copy_from(&q.quu);
        q.qux_reg.copy_from(&q.qux);
        if rho > 0.0 {
            match mode {
                RegularizationMode::Control => {
                    for i in 0..reg.nrows() {
                        reg[(i, i)] += rho;
                    }
                }
                RegularizationMode::State => {
                    // Bᵀ(S + ρI)B = BᵀSB + ρBᵀB, likewise for Qux
                    reg.gemm_tr(rho, b, b, 1.0);
                    q.qux_reg.gemm_tr(rho, b, a, 1.0);
                }
            }
        }
        symmetrize(reg);

        let m = reg.nrows();
        q.factor.copy_from(&*reg);
        let chol = match Cholesky::new(mem::replace(&mut q.factor, DMatrix::zeros(0, 0))) {
            Some(chol) => chol,
            None => {
                // The rejected storage is dropped; only this path reallocates
                q.factor = DMatrix::zeros(m, m);
                return Err(IndefiniteHessian { knot: k, rho });
            }
        };

        gains.feedback[k].copy_from(&q.qux_reg);
        chol.solve_mut(&mut gains.feedback[k]);
        gains.feedback[k].neg_mut();

        gains.feedforward[k].copy_from(&q.qu);
        chol.solve_mut(&mut gains.feedforward[k]);
        gains.feedforward[k].neg_mut();

        q.factor = chol.unpack_dirty();

        let feedback = &gains.feedback[k];
        let feedforward = &gains.feedforward[k];

        // S = Qxx + KᵀQuuK + KᵀQux + QuxᵀK
        q.quu_k.gemm(1.0, &q.quu, feedback, 0.0);
        let s = &mut s_head[k];
        s.copy_from(&q.qxx);
        s.gemm_tr(1.0, feedback, &q.quu_k, 1.0);
        s.gemm_tr(1.0, feedback, &q.qux, 1.0);
        s.gemm_tr(1.0, &q.qux, feedback, 1.0);
        symmetrize(s);

        // s = Qx + KᵀQuud + KᵀQu + Quxᵀd
        q.quu_d.gemv(1.0, &q.quu, feedforward, 0.0);
        let g = &mut g_head[k];
        g.copy_from(&q.qx);
        g.gemv_tr(1.0, feedback, &q.quu_d, 1.0);
        g.gemv_tr(1.0, feedback, &q.qu, 1.0);
        g.gemv_tr(1.0, &q.qux, feedforward, 1.0);

        expected.linear += feedforward.dot(&q.qu);
        expected.quadratic += 0.5 * feedforward.dot(&q.quu_d);
    }

    Ok(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use trajopt_core::math::is_positive_definite;

    // Scalar system x⁺ = x + u with ℓ = ½x² + ½u², ℓ_N = ½x²
    fn scalar_problem(horizon: usize, x: f64, u: f64) -> (Linearization, CostExpansion) {
        let mut lin = Linearization::zeros(1, 1, horizon);
        for (a, b) in lin.a.iter_mut().zip(lin.b.iter_mut()) {
            a[(0, 0)] = 1.0;
            b[(0, 0)] = 1.0;
        }
        let mut exp = CostExpansion::zeros(1, 1, horizon);
        for stage in exp.stage.iter_mut() {
            stage.lx[0] = x;
            stage.lu[0] = u;
            stage.lxx[(0, 0)] = 1.0;
            stage.luu[(0, 0)] = 1.0;
        }
        exp.terminal.lx[0] = x;
        exp.terminal.lxx[(0, 0)] = 1.0;
        (lin, exp)
    }

    #[test]
    fn test_scalar_riccati() {
        let (lin, exp) = scalar_problem(2, 0.0, 0.0);
        let mut bp = BackwardPass::new(1, 1, 2);
        bp.run(&lin, &exp, 0.0, RegularizationMode::Control).unwrap();

        // Quu = 1 + 1 = 2, Qux = 1, K = -1/2, S = 1 + 1 - ½ = 1.5
        assert_relative_eq!(bp.gains().feedback[0][(0, 0)], -0.5, epsilon = 1e-12);
        assert_relative_eq!(bp.value_function().hessian[0][(0, 0)], 1.5, epsilon = 1e-12);
        assert_relative_eq!(bp.gains().feedforward[0][0], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_feedforward_and_expected_decrease() {
        // At x = 1, u = 0: Qu = lu + Bᵀs = 0 + 1 = 1, Quu = 2, d = -½
        let (lin, exp) = scalar_problem(2, 1.0, 0.0);
        let mut bp = BackwardPass::new(1, 1, 2);
        let expected = bp.run(&lin, &exp, 0.0, RegularizationMode::Control).unwrap();

        assert_relative_eq!(bp.gains().feedforward[0][0], -0.5, epsilon = 1e-12);
        assert_relative_eq!(expected.linear, -0.5, epsilon = 1e-12);
        assert_relative_eq!(expected.quadratic, 0.25, epsilon = 1e-12);
        // Full step predicts a decrease of ½·Qu²/Quu
        assert_relative_eq!(expected.at(1.0), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_indefinite_hessian_detected() {
        let (lin, mut exp) = scalar_problem(3, 0.0, 0.0);
        for stage in exp.stage.iter_mut() {
            stage.luu[(0, 0)] = -10.0;
        }
        let mut bp = BackwardPass::new(1, 1, 3);
        let err = bp.run(&lin, &exp, 0.0, RegularizationMode::Control).unwrap_err();
        assert_eq!(err.knot, 1);

        // Enough damping restores positive definiteness
        assert!(bp.run(&lin, &exp, 20.0, RegularizationMode::Control).is_ok());
        assert!(bp.regularized_hessians().iter().all(is_positive_definite));
    }

    #[test]
    fn test_failed_pass_keeps_previous_results() {
        let (lin, exp) = scalar_problem(4, 1.0, 0.0);
        let mut bp = BackwardPass::new(1, 1, 4);
        bp.run(&lin, &exp, 0.0, RegularizationMode::Control).unwrap();
        let gains = bp.gains().clone();
        let value = bp.value_function().clone();
        let hessians = bp.regularized_hessians().to_vec();

        // Knot 2 factors fine, knot 1 does not
        let mut bad = exp.clone();
        bad.stage[1].luu[(0, 0)] = -100.0;
        bad.stage[2].lu[0] = 5.0;
        let err = bp.run(&lin, &bad, 0.0, RegularizationMode::Control).unwrap_err();
        assert_eq!(err.knot, 1);

        assert_eq!(bp.gains(), &gains);
        assert_eq!(bp.value_function(), &value);
        assert_eq!(bp.regularized_hessians(), hessians.as_slice());
        assert!(bp.regularized_hessians().iter().all(is_positive_definite));
    }

    #[test]
    fn test_no_results_before_first_success() {
        let (lin, mut exp) = scalar_problem(3, 1.0, 0.0);
        exp.stage[1].luu[(0, 0)] = -10.0;
        let mut bp = BackwardPass::new(1, 1, 3);
        assert!(bp.run(&lin, &exp, 0.0, RegularizationMode::Control).is_err());

        assert!(!bp.has_solution());
        assert!(bp.regularized_hessians().is_empty());
        assert!(bp.gains().feedback.iter().all(|k| k[(0, 0)] == 0.0));

        exp.stage[1].luu[(0, 0)] = 1.0;
        bp.run(&lin, &exp, 0.0, RegularizationMode::Control).unwrap();
        assert!(bp.has_solution());
        bp.reset();
        assert!(bp.regularized_hessians().is_empty());
        assert!(bp.gains().feedforward.iter().all(|d| d[0] == 0.0));
    }

    #[test]
    fn test_state_regularization_scales_with_b() {
        let (mut lin, mut exp) = scalar_problem(2, 0.0, 0.0);
        lin.b[0][(0, 0)] = 2.0;
        exp.stage[0].luu[(0, 0)] = 0.0;
        exp.terminal.lxx[(0, 0)] = 0.0;

        let mut bp = BackwardPass::new(1, 1, 2);
        bp.run(&lin, &exp, 1.0, RegularizationMode::State).unwrap();
        // Quu_reg = 0 + Bᵀ(0 + 1)B = 4
        assert_relative_eq!(bp.regularized_hessians()[0][(0, 0)], 4.0, epsilon = 1e-12);

        bp.run(&lin, &exp, 1.0, RegularizationMode::Control).unwrap();
        assert_relative_eq!(bp.regularized_hessians()[0][(0, 0)], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_lqr_gains_match_discrete_riccati() {
        // Longer horizon converges towards the stationary gain of
        // x⁺ = x + u, q = r = 1: P = 1 + P - P²/(1 + P) => P = φ (golden ratio)
        let (lin, exp) = scalar_problem(60, 0.0, 0.0);
        let mut bp = BackwardPass::new(1, 1, 60);
        bp.run(&lin, &exp, 0.0, RegularizationMode::Control).unwrap();

        let phi = (1.0 + 5.0_f64.sqrt()) / 2.0;
        assert_relative_eq!(bp.value_function().hessian[0][(0, 0)], phi, epsilon = 1e-9);
        assert_relative_eq!(
            bp.gains().feedback[0][(0, 0)],
            -phi / (1.0 + phi),
            epsilon = 1e-9
        );
    }
}
