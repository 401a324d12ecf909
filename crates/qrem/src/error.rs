//! Error types for the mitigation engine.

use thiserror::Error;

/// Errors produced while calibrating or applying a measurement filter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MitigationError {
    /// Bad qubit count, tolerance, mode or persisted record.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A prepared basis state has no usable calibration shots.
    #[error("Insufficient calibration data for prepared state '{label}': {reason}")]
    InsufficientCalibrationData {
        /// Label of the prepared basis state.
        label: String,
        /// What was wrong with its data.
        reason: String,
    },

    /// An outcome label does not belong to the calibrated basis.
    #[error("Label '{label}' is not a {n_qubits}-bit basis label")]
    LabelMismatch {
        /// The offending label.
        label: String,
        /// Register width the basis was built for.
        n_qubits: usize,
    },

    /// Exact invertibility was requested but the matrix is too ill-conditioned.
    #[error("Calibration matrix is singular: condition number {condition_number:e} exceeds {ceiling:e}")]
    SingularMatrix {
        /// Ratio of the largest to the smallest singular value.
        condition_number: f64,
        /// Configured ceiling.
        ceiling: f64,
    },

    /// The constrained solve had no feasible point.
    ///
    /// The probability simplex is never empty, so this indicates a bug.
    #[error("No feasible solution: {0}")]
    NoFeasibleSolution(String),

    /// A vector or matrix had the wrong size for the calibrated basis.
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected length.
        expected: usize,
        /// Actual length.
        found: usize,
    },

    /// The singular value decomposition did not produce its factors.
    #[error("Matrix decomposition failed: {0}")]
    Decomposition(String),

    /// The calibration runner failed to deliver results.
    #[error("Calibration runner error: {0}")]
    Runner(String),

    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for mitigation operations.
pub type MitigationResult<T> = Result<T, MitigationError>;
