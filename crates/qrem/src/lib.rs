//! `qrem`: readout error mitigation.
//!
//! Learns the confusion matrix of a measurement apparatus from calibration
//! experiments and inverts it to correct noisy outcome counts:
//!
//! - [`basis`] enumerates the `2^n` basis labels that index everything else
//! - [`calibration`] builds the column-stochastic calibration matrix
//!   (full, or tensored from per-qubit data)
//! - [`solver`] derives a pseudo-inverse or a simplex-constrained
//!   least-squares corrector
//! - [`filter`] applies the corrector to count tables
//! - [`runner`] drives a calibration session against a [`CalibrationRunner`]
//!
//! # Quick start
//!
//! ```rust
//! use qrem::{MeasurementFilter, MitigationConfig, OutcomeCounts, build_calibration};
//!
//! let config = MitigationConfig::default();
//! let preparations = vec![
//!     OutcomeCounts::from_pairs([("0", 95), ("1", 5)]),  // prepared |0⟩
//!     OutcomeCounts::from_pairs([("0", 10), ("1", 90)]), // prepared |1⟩
//! ];
//! let matrix = build_calibration(&preparations, 1, &config).unwrap();
//! let filter = MeasurementFilter::new(matrix, config).unwrap();
//!
//! let noisy = OutcomeCounts::from_pairs([("0", 60), ("1", 40)]);
//! let mitigated = filter.apply(&noisy).unwrap();
//! assert_eq!(mitigated.get("0"), 59);
//! assert_eq!(mitigated.total_shots(), 100);
//! ```

pub mod basis;
pub mod calibration;
pub mod config;
pub mod counts;
pub mod error;
pub mod filter;
pub mod runner;
pub mod solver;

pub use basis::{BasisLabels, enumerate_basis};
pub use calibration::{
    CalibrationKind, CalibrationMatrix, CalibrationRecord, QubitCalibration, build_calibration,
    build_calibration_from_labeled, build_tensored_calibration,
};
pub use config::{CorrectionStrategy, LabelPolicy, MitigationConfig};
pub use counts::OutcomeCounts;
pub use error::{MitigationError, MitigationResult};
pub use filter::{MeasurementFilter, MitigatedDistribution, apply_filter};
pub use runner::{CalibrationRunner, SimulatedReadout, calibrate, calibrate_tensored};
pub use solver::{CorrectionOperator, build_corrector};
