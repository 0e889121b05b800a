//! Constraint values, multipliers and penalties along a trajectory
//!
//! One [`ConstraintBlock`] per stage knot plus one for the terminal knot.
//! Each block stores the constraint values and Jacobians at the nominal,
//! the Lagrange multipliers λ, the penalties μ, the active set and the
//! violation seen after the previous outer iteration.
//!
//! Sign convention: c ≤ 0 for inequalities, c = 0 for equalities.
//! A component is active when it is an equality, when c > 0, or when its
//! multiplier is positive.

use nalgebra::{DMatrix, DVector};

use trajopt_core::constraints::{ConstraintKind, ConstraintList};
use trajopt_core::cost::{StageExpansion, TerminalExpansion};

use crate::objective::CostExpansion;
use crate::trajectory::Trajectory;

/// Magnitude by which a component is violated (0 when satisfied)
pub fn violation(kind: ConstraintKind, value: f64) -> f64 {
    match kind {
        ConstraintKind::Equality => value.abs(),
        ConstraintKind::Inequality => value.max(0.0),
    }
}

/// Active-set rule for one component
pub fn is_active(kind: ConstraintKind, value: f64, lambda: f64) -> bool {
    match kind {
        ConstraintKind::Equality => true,
        ConstraintKind::Inequality => value > 0.0 || lambda > 0.0,
    }
}

/// Σ over active components of λc + ½μc²
fn penalty_term(kinds: &[ConstraintKind], c: &DVector<f64>, lambda: &DVector<f64>, mu: &DVector<f64>) -> f64 {
    let mut total = 0.0;
    for (i, &kind) in kinds.iter().enumerate() {
        if is_active(kind, c[i], lambda[i]) {
            total += lambda[i] * c[i] + 0.5 * mu[i] * c[i] * c[i];
        }
    }
    total
}

/// Constraint state at one knot
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintBlock {
    /// c at the nominal
    pub values: DVector<f64>,
    /// ∂c/∂x (p×n)
    pub jac_x: DMatrix<f64>,
    /// ∂c/∂u (p×m); zero columns at the terminal knot
    pub jac_u: DMatrix<f64>,
    pub lambda: DVector<f64>,
    pub mu: DVector<f64>,
    pub active: Vec<bool>,
    /// Violation recorded after the previous outer iteration
    pub previous_violation: DVector<f64>,
    trial: DVector<f64>,
    gradient: DVector<f64>,
    weighted_x: DMatrix<f64>,
    weighted_u: DMatrix<f64>,
}

impl ConstraintBlock {
    fn new(dim: usize, state_dim: usize, control_dim: usize, penalty: f64) -> Self {
        Self {
            values: DVector::zeros(dim),
            jac_x: DMatrix::zeros(dim, state_dim),
            jac_u: DMatrix::zeros(dim, control_dim),
            lambda: DVector::zeros(dim),
            mu: DVector::from_element(dim, penalty),
            active: vec![false; dim],
            previous_violation: DVector::zeros(dim),
            trial: DVector::zeros(dim),
            gradient: DVector::zeros(dim),
            weighted_x: DMatrix::zeros(dim, state_dim),
            weighted_u: DMatrix::zeros(dim, control_dim),
        }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    fn update_active_set(&mut self, kinds: &[ConstraintKind]) {
        for (i, &kind) in kinds.iter().enumerate() {
            self.active[i] = is_active(kind, self.values[i], self.lambda[i]);
        }
    }

    /// Fill the AL gradient λ + μc and curvature μ masked by the active set
    fn prepare_weights(&mut self) {
        for i in 0..self.dim() {
            let (g, w) = if self.active[i] {
                (self.lambda[i] + self.mu[i] * self.values[i], self.mu[i])
            } else {
                (0.0, 0.0)
            };
            self.gradient[i] = g;
            self.weighted_x.row_mut(i).copy_from(&self.jac_x.row(i));
            self.weighted_x.row_mut(i).scale_mut(w);
            self.weighted_u.row_mut(i).copy_from(&self.jac_u.row(i));
            self.weighted_u.row_mut(i).scale_mut(w);
        }
    }

    fn add_to_stage(&mut self, stage: &mut StageExpansion) {
        if self.dim() == 0 {
            return;
        }
        self.prepare_weights();
        stage.lx.gemv_tr(1.0, &self.jac_x, &self.gradient, 1.0);
        stage.lu.gemv_tr(1.0, &self.jac_u, &self.gradient, 1.0);
        stage.lxx.gemm_tr(1.0, &self.jac_x, &self.weighted_x, 1.0);
        stage.luu.gemm_tr(1.0, &self.jac_u, &self.weighted_u, 1.0);
        stage.lux.gemm_tr(1.0, &self.jac_u, &self.weighted_x, 1.0);
    }

    fn add_to_terminal(&mut self, terminal: &mut TerminalExpansion) {
        if self.dim() == 0 {
            return;
        }
        self.prepare_weights();
        terminal.lx.gemv_tr(1.0, &self.jac_x, &self.gradient, 1.0);
        terminal.lxx.gemm_tr(1.0, &self.jac_x, &self.weighted_x, 1.0);
    }

    fn update_duals(&mut self, kinds: &[ConstraintKind], dual_max: f64) {
        for (i, &kind) in kinds.iter().enumerate() {
            let mut lambda = self.lambda[i] + self.mu[i] * self.values[i];
            if kind == ConstraintKind::Inequality {
                lambda = lambda.max(0.0);
            }
            self.lambda[i] = lambda.clamp(-dual_max, dual_max);
        }
    }

    fn update_penalties(&mut self, kinds: &[ConstraintKind], ratio: f64, scale: f64, max: f64) {
        for (i, &kind) in kinds.iter().enumerate() {
            let current = violation(kind, self.values[i]);
            if current > ratio * self.previous_violation[i] {
                self.mu[i] = (self.mu[i] * scale).min(max);
            }
            self.previous_violation[i] = current;
        }
    }

    fn store_violation(&mut self, kinds: &[ConstraintKind]) {
        for (i, &kind) in kinds.iter().enumerate() {
            self.previous_violation[i] = violation(kind, self.values[i]);
        }
    }

    fn c_max(&self, kinds: &[ConstraintKind]) -> f64 {
        kinds
            .iter()
            .enumerate()
            .map(|(i, &kind)| violation(kind, self.values[i]))
            .fold(0.0, f64::max)
    }

    fn reset(&mut self, penalty: f64) {
        self.lambda.fill(0.0);
        self.mu.fill(penalty);
        self.active.iter_mut().for_each(|a| *a = false);
        self.previous_violation.fill(0.0);
    }
}

/// Constraint blocks for every knot of a trajectory
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintTrajectory {
    stage: Vec<ConstraintBlock>,
    terminal: ConstraintBlock,
    stage_kinds: Vec<ConstraintKind>,
    terminal_kinds: Vec<ConstraintKind>,
}

impl ConstraintTrajectory {
    /// Blocks sized for `constraints` over `horizon` knots, λ = 0, μ = `penalty`
    pub fn new(constraints: &ConstraintList, horizon: usize, penalty: f64) -> Self {
        let (n, m) = (constraints.state_dim(), constraints.control_dim());
        Self {
            stage: vec![
                ConstraintBlock::new(constraints.stage_dim(), n, m, penalty);
                horizon.saturating_sub(1)
            ],
            terminal: ConstraintBlock::new(constraints.terminal_dim(), n, 0, penalty),
            stage_kinds: constraints.stage_kinds().to_vec(),
            terminal_kinds: constraints.terminal_kinds().to_vec(),
        }
    }

    pub fn stage(&self) -> &[ConstraintBlock] {
        &self.stage
    }

    pub fn terminal(&self) -> &ConstraintBlock {
        &self.terminal
    }

    /// Evaluate values at every knot and refresh the active set
    pub fn evaluate(&mut self, constraints: &ConstraintList, trajectory: &Trajectory) {
        for (block, knot) in self.stage.iter_mut().zip(trajectory.knots()) {
            constraints.evaluate_stage(&knot.x, &knot.u, &mut block.values);
            block.update_active_set(&self.stage_kinds);
        }
        constraints.evaluate_terminal(trajectory.final_state(), &mut self.terminal.values);
        self.terminal.update_active_set(&self.terminal_kinds);
    }

    /// Evaluate values and Jacobians at every knot and refresh the active set
    pub fn linearize(&mut self, constraints: &ConstraintList, trajectory: &Trajectory) {
        self.evaluate(constraints, trajectory);
        for (block, knot) in self.stage.iter_mut().zip(trajectory.knots()) {
            constraints.stage_jacobian(&knot.x, &knot.u, &mut block.jac_x, &mut block.jac_u);
        }
        constraints.terminal_jacobian(trajectory.final_state(), &mut self.terminal.jac_x);
    }

    /// Augmented terms Σ λc + ½μc² of `trajectory` under the current λ, μ
    ///
    /// Uses scratch storage only: the values and active set stored for
    /// the nominal are left untouched.
    pub fn penalty_cost(&mut self, constraints: &ConstraintList, trajectory: &Trajectory) -> f64 {
        let mut total = 0.0;
        for (block, knot) in self.stage.iter_mut().zip(trajectory.knots()) {
            constraints.evaluate_stage(&knot.x, &knot.u, &mut block.trial);
            total += penalty_term(&self.stage_kinds, &block.trial, &block.lambda, &block.mu);
        }
        let terminal = &mut self.terminal;
        constraints.evaluate_terminal(trajectory.final_state(), &mut terminal.trial);
        total + penalty_term(&self.terminal_kinds, &terminal.trial, &terminal.lambda, &terminal.mu)
    }

    /// Add the augmented terms' gradient and Gauss-Newton Hessian
    ///
    /// Expects [`ConstraintTrajectory::linearize`] at the same trajectory.
    pub fn add_to_expansion(&mut self, expansion: &mut CostExpansion) {
        for (block, stage) in self.stage.iter_mut().zip(expansion.stage.iter_mut()) {
            block.add_to_stage(stage);
        }
        self.terminal.add_to_terminal(&mut expansion.terminal);
    }

    /// λ ← λ + μc, projected to λ ≥ 0 for inequalities, clamped to ±dual_max
    pub fn update_duals(&mut self, dual_max: f64) {
        for block in &mut self.stage {
            block.update_duals(&self.stage_kinds, dual_max);
        }
        self.terminal.update_duals(&self.terminal_kinds, dual_max);
    }

    /// Scale μ for components whose violation did not shrink by `ratio`
    pub fn update_penalties(&mut self, ratio: f64, scale: f64, max: f64) {
        for block in &mut self.stage {
            block.update_penalties(&self.stage_kinds, ratio, scale, max);
        }
        self.terminal
            .update_penalties(&self.terminal_kinds, ratio, scale, max);
    }

    /// Remember the current violations as the baseline for the next update
    pub fn store_violation(&mut self) {
        for block in &mut self.stage {
            block.store_violation(&self.stage_kinds);
        }
        self.terminal.store_violation(&self.terminal_kinds);
    }

    /// Worst violation over all knots and components
    pub fn c_max(&self) -> f64 {
        self.stage
            .iter()
            .map(|b| b.c_max(&self.stage_kinds))
            .fold(self.terminal.c_max(&self.terminal_kinds), f64::max)
    }

    /// Largest penalty over all components
    pub fn max_penalty(&self) -> f64 {
        self.stage
            .iter()
            .chain(std::iter::once(&self.terminal))
            .flat_map(|b| b.mu.iter().copied())
            .fold(0.0, f64::max)
    }

    /// λ = 0 and μ = `penalty` everywhere
    pub fn reset(&mut self, penalty: f64) {
        for block in &mut self.stage {
            block.reset(penalty);
        }
        self.terminal.reset(penalty);
    }
}
