//! Solver configuration
//!
//! Options for the iLQR inner solver and the augmented Lagrangian outer
//! loop. Every struct has documented defaults and round-trips through
//! serde, so configurations can live in whatever file format the caller
//! prefers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("{field} must lie in [{lower}, {upper}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        lower: f64,
        upper: f64,
    },
    #[error("{field} must be at least {min}, got {value}")]
    TooSmall {
        field: &'static str,
        value: usize,
        min: usize,
    },
    #[error("Inconsistent configuration: {0}")]
    Inconsistent(String),
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn in_range(field: &'static str, value: f64, lower: f64, upper: f64) -> Result<(), ConfigError> {
    if value >= lower && value <= upper {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            lower,
            upper,
        })
    }
}

fn at_least(field: &'static str, value: usize, min: usize) -> Result<(), ConfigError> {
    if value >= min {
        Ok(())
    } else {
        Err(ConfigError::TooSmall { field, value, min })
    }
}

/// Main solver configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Inner (unconstrained) iLQR solver
    pub ilqr: IlqrConfig,
    /// Augmented Lagrangian outer loop
    pub augmented_lagrangian: AlConfig,
}

impl SolverConfig {
    /// Check every option for range and consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ilqr.validate()?;
        self.augmented_lagrangian.validate()
    }
}

/// Measure used for the gradient-norm convergence test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GradientNormType {
    /// mean over k of ‖d_k‖ / (‖u_k‖ + 1)
    #[default]
    Relative,
    /// mean over k of ‖d_k‖
    Feedforward,
}

/// iLQR convergence driver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IlqrConfig {
    /// Converged once the accepted cost decrease falls below this
    pub cost_tolerance: f64,
    /// Converged once the gradient measure falls below this
    pub gradient_norm_tolerance: f64,
    /// Gradient measure variant
    pub gradient_norm: GradientNormType,
    /// Iteration budget per inner solve
    pub max_iterations: usize,
    /// Consecutive line-search failures tolerated before giving up
    pub dj_counter_limit: usize,
    /// Backtracking line search
    pub line_search: LineSearchConfig,
    /// Backward-pass regularization schedule
    pub regularization: RegularizationConfig,
    /// Divergence guards
    pub bounds: NumericBounds,
}

impl Default for IlqrConfig {
    fn default() -> Self {
        Self {
            cost_tolerance: 1e-4,
            gradient_norm_tolerance: 1e-5,
            gradient_norm: GradientNormType::Relative,
            max_iterations: 300,
            dj_counter_limit: 10,
            line_search: LineSearchConfig::default(),
            regularization: RegularizationConfig::default(),
            bounds: NumericBounds::default(),
        }
    }
}

impl IlqrConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("cost_tolerance", self.cost_tolerance)?;
        positive("gradient_norm_tolerance", self.gradient_norm_tolerance)?;
        at_least("max_iterations", self.max_iterations, 1)?;
        self.line_search.validate()?;
        self.regularization.validate()?;
        self.bounds.validate()
    }
}

/// Backtracking line search configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSearchConfig {
    /// Smallest accepted ratio of actual to expected decrease
    pub lower_bound: f64,
    /// Largest accepted ratio of actual to expected decrease
    pub upper_bound: f64,
    /// Step sizes tried before declaring the search exhausted
    pub max_iterations: usize,
    /// Step-size multiplier between attempts, in (0, 1)
    pub backtrack_factor: f64,
}

impl Default for LineSearchConfig {
    fn default() -> Self {
        Self {
            lower_bound: 1e-8,
            upper_bound: 10.0,
            max_iterations: 20,
            backtrack_factor: 0.5,
        }
    }
}

impl LineSearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        at_least("line_search.max_iterations", self.max_iterations, 1)?;
        if !(self.backtrack_factor > 0.0 && self.backtrack_factor < 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "line_search.backtrack_factor",
                value: self.backtrack_factor,
                lower: 0.0,
                upper: 1.0,
            });
        }
        if !(self.lower_bound < self.upper_bound) {
            return Err(ConfigError::Inconsistent(format!(
                "line search lower bound {} is not below upper bound {}",
                self.lower_bound, self.upper_bound
            )));
        }
        Ok(())
    }
}

/// Where the backward pass adds its damping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RegularizationMode {
    /// Quu + ρI
    #[default]
    Control,
    /// Quu and Qux computed against S + ρI
    State,
}

/// Regularization schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegularizationConfig {
    /// ρ at solver start and after reset (0 or within [min, max])
    pub initial: f64,
    /// ρ below this snaps to zero on decrease
    pub min: f64,
    /// Largest ρ; failing beyond it is fatal
    pub max: f64,
    /// Multiplicative growth factor (> 1)
    pub increase_factor: f64,
    /// Additive bump applied when the line search is exhausted
    pub forward_pass_bump: f64,
    pub mode: RegularizationMode,
}

impl Default for RegularizationConfig {
    fn default() -> Self {
        Self {
            initial: 0.0,
            min: 1e-8,
            max: 1e8,
            increase_factor: 1.6,
            forward_pass_bump: 10.0,
            mode: RegularizationMode::Control,
        }
    }
}

impl RegularizationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("regularization.min", self.min)?;
        positive("regularization.max", self.max)?;
        if self.min > self.max {
            return Err(ConfigError::Inconsistent(format!(
                "regularization min {} exceeds max {}",
                self.min, self.max
            )));
        }
        if self.initial != 0.0 {
            in_range("regularization.initial", self.initial, self.min, self.max)?;
        }
        if !(self.increase_factor > 1.0 && self.increase_factor.is_finite()) {
            return Err(ConfigError::OutOfRange {
                field: "regularization.increase_factor",
                value: self.increase_factor,
                lower: 1.0,
                upper: f64::INFINITY,
            });
        }
        in_range("regularization.forward_pass_bump", self.forward_pass_bump, 0.0, self.max)
    }
}

/// Divergence guards checked on every rollout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericBounds {
    pub max_cost: f64,
    /// Largest admissible |xᵢ|
    pub max_state: f64,
    /// Largest admissible |uᵢ|
    pub max_control: f64,
}

impl Default for NumericBounds {
    fn default() -> Self {
        Self {
            max_cost: 1e8,
            max_state: 1e8,
            max_control: 1e8,
        }
    }
}

impl NumericBounds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("bounds.max_cost", self.max_cost)?;
        positive("bounds.max_state", self.max_state)?;
        positive("bounds.max_control", self.max_control)
    }
}

/// Augmented Lagrangian outer loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlConfig {
    /// Solved once the worst violation c_max falls below this
    pub constraint_tolerance: f64,
    /// Outer iteration budget
    pub max_outer_iterations: usize,
    /// Penalty μ for every component at start and after reset
    pub penalty_initial: f64,
    /// Multiplier applied to μ for components that did not improve
    pub penalty_scale: f64,
    /// Penalty ceiling
    pub penalty_max: f64,
    /// Multipliers are clamped to [-dual_max, dual_max]
    pub dual_max: f64,
    /// A component "improved" when its violation shrank below this
    /// fraction of the previous outer iteration's violation
    pub constraint_decrease_ratio: f64,
    /// Inner cost tolerance while constraints are still violated
    pub cost_tolerance_intermediate: f64,
    /// Inner gradient tolerance while constraints are still violated
    pub gradient_norm_tolerance_intermediate: f64,
}

impl Default for AlConfig {
    fn default() -> Self {
        Self {
            constraint_tolerance: 1e-4,
            max_outer_iterations: 30,
            penalty_initial: 1.0,
            penalty_scale: 10.0,
            penalty_max: 1e8,
            dual_max: 1e8,
            constraint_decrease_ratio: 0.25,
            cost_tolerance_intermediate: 1e-3,
            gradient_norm_tolerance_intermediate: 1e-5,
        }
    }
}

impl AlConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("augmented_lagrangian.constraint_tolerance", self.constraint_tolerance)?;
        at_least("augmented_lagrangian.max_outer_iterations", self.max_outer_iterations, 1)?;
        positive("augmented_lagrangian.penalty_initial", self.penalty_initial)?;
        positive("augmented_lagrangian.penalty_max", self.penalty_max)?;
        positive("augmented_lagrangian.dual_max", self.dual_max)?;
        positive("augmented_lagrangian.cost_tolerance_intermediate", self.cost_tolerance_intermediate)?;
        positive(
            "augmented_lagrangian.gradient_norm_tolerance_intermediate",
            self.gradient_norm_tolerance_intermediate,
        )?;
        in_range(
            "augmented_lagrangian.penalty_scale",
            self.penalty_scale,
            1.0,
            f64::INFINITY,
        )?;
        in_range(
            "augmented_lagrangian.constraint_decrease_ratio",
            self.constraint_decrease_ratio,
            0.0,
            1.0,
        )?;
        if self.penalty_initial > self.penalty_max {
            return Err(ConfigError::Inconsistent(format!(
                "initial penalty {} exceeds penalty max {}",
                self.penalty_initial, self.penalty_max
            )));
        }
        Ok(())
    }
}
