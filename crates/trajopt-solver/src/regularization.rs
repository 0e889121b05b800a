//! Backward-pass regularization schedule
//!
//! ρ grows geometrically when the backward pass meets a Quu that is not
//! positive definite, shrinks geometrically after accepted steps, and gets
//! an additive bump when the line search runs dry. Outside of a fatal
//! failure, ρ is always 0 or within [ρ_min, ρ_max].

use thiserror::Error;

use crate::config::RegularizationConfig;

/// ρ is already at its ceiling and cannot grow further
#[derive(Debug, Error, Clone, Copy, PartialEq)]
#[error("Regularization exceeded its maximum ({max})")]
pub struct RegularizationExceeded {
    pub max: f64,
}

/// Current ρ and its geometric rate dρ
#[derive(Debug, Clone, PartialEq)]
pub struct Regularization {
    rho: f64,
    d_rho: f64,
    config: RegularizationConfig,
}

impl Regularization {
    pub fn new(config: RegularizationConfig) -> Self {
        Self {
            rho: config.initial,
            d_rho: 0.0,
            config,
        }
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }

    pub fn rate(&self) -> f64 {
        self.d_rho
    }

    pub fn config(&self) -> &RegularizationConfig {
        &self.config
    }

    /// Grow ρ after a failed backward pass
    ///
    /// dρ = max(dρ·f, f), ρ = max(ρ·dρ, ρ_min), clamped to ρ_max. Fails
    /// when ρ was already at ρ_max, i.e. the previous attempt ran at the
    /// ceiling and still did not succeed.
    pub fn increase(&mut self) -> Result<f64, RegularizationExceeded> {
        if self.rho >= self.config.max {
            return Err(RegularizationExceeded {
                max: self.config.max,
            });
        }
        let factor = self.config.increase_factor;
        self.d_rho = (self.d_rho * factor).max(factor);
        self.rho = (self.rho * self.d_rho)
            .max(self.config.min)
            .min(self.config.max);
        Ok(self.rho)
    }

    /// Shrink ρ after an accepted step
    ///
    /// dρ = min(dρ/f, 1/f), ρ = ρ·dρ, snapping to 0 below ρ_min.
    pub fn decrease(&mut self) {
        let factor = self.config.increase_factor;
        self.d_rho = (self.d_rho / factor).min(1.0 / factor);
        self.rho *= self.d_rho;
        if self.rho < self.config.min {
            self.rho = 0.0;
        }
    }

    /// Additive bump after an exhausted line search, clamped to ρ_max
    pub fn bump(&mut self) {
        self.rho = (self.rho + self.config.forward_pass_bump).min(self.config.max);
        if self.rho > 0.0 && self.rho < self.config.min {
            self.rho = self.config.min;
        }
    }

    /// Back to the configured initial value
    pub fn reset(&mut self) {
        self.rho = self.config.initial;
        self.d_rho = 0.0;
    }
}
