//! Discretized trajectory representation and interpolation
//!
//! A trajectory is N knot points. Knots 0..N-1 carry a state, the control
//! applied over the following interval and that interval's length; the
//! terminal knot carries only a state (its control is kept zero and its
//! interval length is 0).
//!
//! Buffers are allocated once. The solver copies between trajectories
//! with [`Trajectory::copy_from`], which never reallocates.

use nalgebra::{DMatrix, DVector};

use trajopt_core::dynamics::DiscreteDynamics;
use trajopt_core::math::max_abs;

/// One discretization point
#[derive(Debug, Clone, PartialEq)]
pub struct KnotPoint {
    /// State x_k
    pub x: DVector<f64>,
    /// Control u_k, held over [t, t + dt)
    pub u: DVector<f64>,
    /// Interval length [s]; 0 at the terminal knot
    pub dt: f64,
    /// Time stamp [s]
    pub t: f64,
}

impl KnotPoint {
    pub fn zeros(state_dim: usize, control_dim: usize, t: f64, dt: f64) -> Self {
        Self {
            x: DVector::zeros(state_dim),
            u: DVector::zeros(control_dim),
            dt,
            t,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.dt == 0.0
    }
}

/// Sequence of N knot points on a uniform grid
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    knots: Vec<KnotPoint>,
}

impl Trajectory {
    /// Zero trajectory with `horizon` knots spaced by `dt`
    pub fn zeros(state_dim: usize, control_dim: usize, horizon: usize, dt: f64) -> Self {
        let knots = (0..horizon)
            .map(|k| {
                let step = if k + 1 == horizon { 0.0 } else { dt };
                KnotPoint::zeros(state_dim, control_dim, k as f64 * dt, step)
            })
            .collect();
        Self { knots }
    }

    /// Trajectory starting at `x0` with the given stage controls
    ///
    /// States other than x_0 are left at zero until [`Trajectory::rollout`].
    /// `controls` must hold one entry per stage knot (horizon - 1).
    pub fn with_controls(x0: &DVector<f64>, controls: &[DVector<f64>], dt: f64) -> Self {
        let control_dim = controls.first().map_or(0, |u| u.len());
        let mut trajectory = Self::zeros(x0.len(), control_dim, controls.len() + 1, dt);
        trajectory.knots[0].x.copy_from(x0);
        for (knot, u) in trajectory.knots.iter_mut().zip(controls) {
            knot.u.copy_from(u);
        }
        trajectory
    }

    /// Number of knot points N
    pub fn len(&self) -> usize {
        self.knots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.knots.is_empty()
    }

    /// Number of control intervals N-1
    pub fn num_intervals(&self) -> usize {
        self.knots.len().saturating_sub(1)
    }

    pub fn state_dim(&self) -> usize {
        self.knots.first().map_or(0, |k| k.x.len())
    }

    pub fn control_dim(&self) -> usize {
        self.knots.first().map_or(0, |k| k.u.len())
    }

    pub fn knots(&self) -> &[KnotPoint] {
        &self.knots
    }

    pub fn knots_mut(&mut self) -> &mut [KnotPoint] {
        &mut self.knots
    }

    pub fn knot(&self, k: usize) -> &KnotPoint {
        &self.knots[k]
    }

    pub fn state(&self, k: usize) -> &DVector<f64> {
        &self.knots[k].x
    }

    pub fn control(&self, k: usize) -> &DVector<f64> {
        &self.knots[k].u
    }

    /// States x_0..x_{N-1}
    pub fn states(&self) -> impl Iterator<Item = &DVector<f64>> {
        self.knots.iter().map(|k| &k.x)
    }

    /// Stage controls u_0..u_{N-2}
    pub fn controls(&self) -> impl Iterator<Item = &DVector<f64>> {
        self.knots[..self.num_intervals()].iter().map(|k| &k.u)
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.knots.iter().map(|k| k.t)
    }

    pub fn initial_state(&self) -> &DVector<f64> {
        &self.knots[0].x
    }

    pub fn final_state(&self) -> &DVector<f64> {
        &self.knots[self.knots.len() - 1].x
    }

    /// Total duration [s]
    pub fn duration(&self) -> f64 {
        self.knots.last().map_or(0.0, |k| k.t)
    }

    /// Overwrite every knot with `other`'s values without reallocating
    ///
    /// Both trajectories must share horizon and dimensions.
    pub fn copy_from(&mut self, other: &Trajectory) {
        for (dst, src) in self.knots.iter_mut().zip(&other.knots) {
            dst.x.copy_from(&src.x);
            dst.u.copy_from(&src.u);
            dst.dt = src.dt;
            dst.t = src.t;
        }
    }

    /// Open-loop simulation from x_0 with the stored controls
    pub fn rollout<D: DiscreteDynamics>(&mut self, dynamics: &D) {
        for k in 0..self.num_intervals() {
            let (head, tail) = self.knots.split_at_mut(k + 1);
            let knot = &head[k];
            dynamics.step(&knot.x, &knot.u, knot.dt, &mut tail[0].x);
        }
    }

    /// Largest |x_i| over all knots (NaN if any component is NaN)
    pub fn max_state(&self) -> f64 {
        self.knots.iter().map(|k| max_abs(&k.x)).fold(0.0, nan_max)
    }

    /// Largest |u_i| over the stage knots (NaN if any component is NaN)
    pub fn max_control(&self) -> f64 {
        self.controls().map(max_abs).fold(0.0, nan_max)
    }

    /// Linearly interpolated state at time t, clamped to the horizon
    pub fn state_at(&self, t: f64) -> DVector<f64> {
        let last = self.knots.len() - 1;
        if last == 0 || t <= self.knots[0].t {
            return self.knots[0].x.clone();
        }
        if t >= self.knots[last].t {
            return self.knots[last].x.clone();
        }

        let idx = self.interval_index(t);
        let k0 = &self.knots[idx];
        let k1 = &self.knots[idx + 1];
        let alpha = (t - k0.t) / (k1.t - k0.t);
        k0.x.lerp(&k1.x, alpha)
    }

    /// Zero-order-hold control at time t, clamped to the stage knots
    pub fn control_at(&self, t: f64) -> DVector<f64> {
        let intervals = self.num_intervals();
        if intervals == 0 {
            return self.knots[0].u.clone();
        }
        if t <= self.knots[0].t {
            return self.knots[0].u.clone();
        }
        let idx = self.interval_index(t).min(intervals - 1);
        self.knots[idx].u.clone()
    }

    fn interval_index(&self, t: f64) -> usize {
        self.knots
            .iter()
            .position(|k| k.t > t)
            .unwrap_or(self.knots.len() - 1)
            .saturating_sub(1)
    }
}

fn nan_max(acc: f64, value: f64) -> f64 {
    if acc.is_nan() || value.is_nan() {
        f64::NAN
    } else {
        acc.max(value)
    }
}

/// Time-varying affine feedback law around a nominal trajectory
///
/// u_k(x) = ū_k + K_k (x − x̄_k). The feedforward term is already folded
/// into the nominal controls once the solver accepts a step.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackPolicy {
    nominal: Trajectory,
    gains: Vec<DMatrix<f64>>,
}

impl FeedbackPolicy {
    pub fn new(nominal: Trajectory, gains: Vec<DMatrix<f64>>) -> Self {
        Self { nominal, gains }
    }

    pub fn nominal(&self) -> &Trajectory {
        &self.nominal
    }

    /// Feedback gain K_k (m×n)
    pub fn gain(&self, k: usize) -> &DMatrix<f64> {
        &self.gains[k]
    }

    /// Control at stage k for measured state x
    pub fn control(&self, k: usize, x: &DVector<f64>) -> DVector<f64> {
        let knot = self.nominal.knot(k);
        &knot.u + &self.gains[k] * (x - &knot.x)
    }

    /// Closed-loop rollout from `x0` through `dynamics`
    pub fn simulate<D: DiscreteDynamics>(&self, dynamics: &D, x0: &DVector<f64>) -> Trajectory {
        let mut out = self.nominal.clone();
        out.knots[0].x.copy_from(x0);
        for k in 0..out.num_intervals() {
            let u = self.control(k, &out.knots[k].x);
            out.knots[k].u.copy_from(&u);
            let (head, tail) = out.knots.split_at_mut(k + 1);
            dynamics.step(&head[k].x, &head[k].u, head[k].dt, &mut tail[0].x);
        }
        out
    }
}
