//! Mitigation configuration.
//!
//! One [`MitigationConfig`] drives the whole calibration session: the
//! register-width ceiling, how foreign labels are treated, which inverse
//! is built and the numeric tolerances it uses. All fields have defaults,
//! so a YAML or JSON file only needs the keys it wants to change:
//!
//! ```yaml
//! strategy: constrained_least_squares
//! label_policy: lenient
//! tolerance: 1.0e-12
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MitigationError, MitigationResult};

/// Default absolute tolerance for near-singularity and near-zero checks.
pub const DEFAULT_TOLERANCE: f64 = 1e-10;

/// Default register-width ceiling (a 4096 × 4096 calibration matrix).
pub const DEFAULT_MAX_QUBITS: usize = 12;

/// How the calibration matrix is inverted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionStrategy {
    /// Moore–Penrose pseudo-inverse via truncated SVD.
    #[default]
    PseudoInverse,
    /// Least squares restricted to the probability simplex, solved per query.
    ConstrainedLeastSquares,
}

impl fmt::Display for CorrectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrectionStrategy::PseudoInverse => write!(f, "pseudo-inverse"),
            CorrectionStrategy::ConstrainedLeastSquares => write!(f, "constrained"),
        }
    }
}

impl FromStr for CorrectionStrategy {
    type Err = MitigationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "pseudo-inverse" | "pinv" => Ok(CorrectionStrategy::PseudoInverse),
            "constrained" | "constrained-least-squares" | "lsq" => {
                Ok(CorrectionStrategy::ConstrainedLeastSquares)
            }
            other => Err(MitigationError::InvalidConfiguration(format!(
                "unsupported correction mode '{other}' (expected pseudo-inverse or constrained)"
            ))),
        }
    }
}

/// What to do with outcome labels that are not part of the calibrated basis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelPolicy {
    /// Reject with [`MitigationError::LabelMismatch`].
    #[default]
    Strict,
    /// Drop the label and its counts.
    Lenient,
}

/// Configuration for a calibration session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MitigationConfig {
    /// Inversion strategy.
    pub strategy: CorrectionStrategy,
    /// Absolute tolerance for near-zero entries and solver convergence.
    pub tolerance: f64,
    /// Relative singular-value cutoff; `None` means `f64::EPSILON × dim`.
    pub rcond: Option<f64>,
    /// Fail with `SingularMatrix` when the condition number exceeds the ceiling.
    pub require_invertible: bool,
    /// Condition-number ceiling used when `require_invertible` is set.
    pub max_condition_number: f64,
    /// Handling of labels outside the basis.
    pub label_policy: LabelPolicy,
    /// Mitigated entries with an expected count at or below this are dropped.
    /// Zero drops only exact zeros.
    pub negligible_count: f64,
    /// Largest register width accepted.
    pub max_qubits: usize,
    /// Iteration cap for the constrained solver.
    pub max_iterations: usize,
}

impl Default for MitigationConfig {
    fn default() -> Self {
        Self {
            strategy: CorrectionStrategy::PseudoInverse,
            tolerance: DEFAULT_TOLERANCE,
            rcond: None,
            require_invertible: false,
            max_condition_number: 1e12,
            label_policy: LabelPolicy::Strict,
            negligible_count: 0.0,
            max_qubits: DEFAULT_MAX_QUBITS,
            max_iterations: 10_000,
        }
    }
}

impl MitigationConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the inversion strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: CorrectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the absolute tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the relative singular-value cutoff.
    #[must_use]
    pub fn with_rcond(mut self, rcond: f64) -> Self {
        self.rcond = Some(rcond);
        self
    }

    /// Require the matrix to be invertible within `max_condition_number`.
    #[must_use]
    pub fn with_required_invertibility(mut self, max_condition_number: f64) -> Self {
        self.require_invertible = true;
        self.max_condition_number = max_condition_number;
        self
    }

    /// Set the label policy.
    #[must_use]
    pub fn with_label_policy(mut self, policy: LabelPolicy) -> Self {
        self.label_policy = policy;
        self
    }

    /// Drop mitigated entries whose expected count is at or below `threshold`.
    #[must_use]
    pub fn with_negligible_count(mut self, threshold: f64) -> Self {
        self.negligible_count = threshold;
        self
    }

    /// Set the register-width ceiling.
    #[must_use]
    pub fn with_max_qubits(mut self, max_qubits: usize) -> Self {
        self.max_qubits = max_qubits;
        self
    }

    /// Set the constrained solver's iteration cap.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Check that every numeric setting is usable.
    pub fn validate(&self) -> MitigationResult<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(invalid(format!(
                "tolerance must be positive and finite, got {}",
                self.tolerance
            )));
        }
        if let Some(rcond) = self.rcond {
            if !(rcond.is_finite() && rcond > 0.0 && rcond < 1.0) {
                return Err(invalid(format!("rcond must lie in (0, 1), got {rcond}")));
            }
        }
        if !(self.max_condition_number >= 1.0) {
            return Err(invalid(format!(
                "max_condition_number must be at least 1, got {}",
                self.max_condition_number
            )));
        }
        if !(self.negligible_count.is_finite() && self.negligible_count >= 0.0) {
            return Err(invalid(format!(
                "negligible_count must be non-negative, got {}",
                self.negligible_count
            )));
        }
        if self.max_qubits == 0 {
            return Err(invalid("max_qubits must be at least 1".into()));
        }
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations must be at least 1".into()));
        }
        Ok(())
    }

    /// Parse a configuration from JSON and validate it.
    pub fn from_json(json: &str) -> MitigationResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

fn invalid(msg: String) -> MitigationError {
    MitigationError::InvalidConfiguration(msg)
}
