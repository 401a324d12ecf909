//! Calibration matrix construction.
//!
//! A calibration (confusion) matrix `M` has one column per prepared basis
//! state and one row per observed outcome:
//!
//!   M[i][j] = count(observe i | prepared j) / shots(prepared j)
//!
//! so every column is a probability distribution. The full builder needs
//! `2^n` experiments. The tensored builder needs `2n` single-qubit
//! experiments and assumes readout errors are independent across qubits:
//!
//!   M = M_{n-1} ⊗ … ⊗ M_1 ⊗ M_0
//!
//! Both produce the same [`CalibrationMatrix`] type, so the solver and the
//! filter do not care how the matrix was obtained.

use std::collections::BTreeMap;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::basis::{BasisLabels, enumerate_basis};
use crate::config::{DEFAULT_MAX_QUBITS, LabelPolicy, MitigationConfig};
use crate::counts::OutcomeCounts;
use crate::error::{MitigationError, MitigationResult};

/// Column sums must be within this of one.
const COLUMN_SUM_TOLERANCE: f64 = 1e-9;

/// How a calibration matrix was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationKind {
    /// One experiment per basis state.
    Full,
    /// Kronecker product of per-qubit matrices.
    Tensored,
    /// Supplied directly or generated from an error model.
    Synthetic,
}

/// Single-qubit calibration data for the tensored builder.
///
/// Both tables are keyed by `"0"` and `"1"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QubitCalibration {
    /// Outcomes observed after preparing `|0⟩`.
    pub prepared_zero: OutcomeCounts,
    /// Outcomes observed after preparing `|1⟩`.
    pub prepared_one: OutcomeCounts,
}

impl QubitCalibration {
    /// Create from the two single-qubit outcome tables.
    pub fn new(prepared_zero: OutcomeCounts, prepared_one: OutcomeCounts) -> Self {
        Self {
            prepared_zero,
            prepared_one,
        }
    }
}

/// Column-stochastic confusion matrix over a fixed basis.
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationMatrix {
    basis: BasisLabels,
    matrix: Array2<f64>,
    shots: Vec<u64>,
    kind: CalibrationKind,
}

/// Build a full calibration matrix.
///
/// `preparations[j]` holds the outcomes observed when basis state `j`
/// (in [`enumerate_basis`] order) was prepared.
#[instrument(skip(preparations, config), fields(n_preparations = preparations.len()))]
pub fn build_calibration(
    preparations: &[OutcomeCounts],
    n_qubits: usize,
    config: &MitigationConfig,
) -> MitigationResult<CalibrationMatrix> {
    config.validate()?;
    let basis = enumerate_basis(n_qubits, config.max_qubits)?;

    if preparations.len() > basis.len() {
        return Err(MitigationError::InvalidConfiguration(format!(
            "{} preparations supplied for a {}-state basis",
            preparations.len(),
            basis.len()
        )));
    }
    if let Some(missing) = basis.label(preparations.len()) {
        return Err(MitigationError::InsufficientCalibrationData {
            label: missing.to_string(),
            reason: "no preparation recorded".into(),
        });
    }

    let ordered: Vec<&OutcomeCounts> = preparations.iter().collect();
    CalibrationMatrix::assemble(basis, &ordered, config.label_policy, CalibrationKind::Full)
}

/// Build a full calibration matrix from data keyed by prepared label.
pub fn build_calibration_from_labeled(
    preparations: &BTreeMap<String, OutcomeCounts>,
    n_qubits: usize,
    config: &MitigationConfig,
) -> MitigationResult<CalibrationMatrix> {
    config.validate()?;
    let basis = enumerate_basis(n_qubits, config.max_qubits)?;

    for prepared in preparations.keys() {
        if basis.index_of(prepared).is_none() {
            match config.label_policy {
                LabelPolicy::Strict => {
                    return Err(MitigationError::LabelMismatch {
                        label: prepared.clone(),
                        n_qubits,
                    });
                }
                LabelPolicy::Lenient => debug!(label = %prepared, "ignoring unknown preparation"),
            }
        }
    }

    let ordered = basis
        .iter()
        .map(|label| {
            preparations
                .get(label)
                .ok_or_else(|| MitigationError::InsufficientCalibrationData {
                    label: label.to_string(),
                    reason: "no preparation recorded".into(),
                })
        })
        .collect::<MitigationResult<Vec<_>>>()?;

    CalibrationMatrix::assemble(basis, &ordered, config.label_policy, CalibrationKind::Full)
}

/// Build a calibration matrix as the Kronecker product of per-qubit matrices.
///
/// `per_qubit[q]` describes qubit `q`, which is the `q`-th bit from the right
/// of every basis label.
#[instrument(skip(per_qubit, config), fields(n_qubits = per_qubit.len()))]
pub fn build_tensored_calibration(
    per_qubit: &[QubitCalibration],
    config: &MitigationConfig,
) -> MitigationResult<CalibrationMatrix> {
    config.validate()?;
    let n_qubits = per_qubit.len();
    let basis = enumerate_basis(n_qubits, config.max_qubits)?;
    let single = enumerate_basis(1, 1)?;

    let mut factors = Vec::with_capacity(n_qubits);
    let mut shots = Vec::with_capacity(2 * n_qubits);
    for (q, cal) in per_qubit.iter().enumerate() {
        let m = CalibrationMatrix::assemble(
            single.clone(),
            &[&cal.prepared_zero, &cal.prepared_one],
            config.label_policy,
            CalibrationKind::Full,
        )
        .map_err(|e| match e {
            MitigationError::InsufficientCalibrationData { label, reason } => {
                MitigationError::InsufficientCalibrationData {
                    label: format!("q{q}={label}"),
                    reason,
                }
            }
            other => other,
        })?;
        shots.extend_from_slice(&m.shots);
        factors.push(m.matrix);
    }

    let matrix = Array2::from_shape_fn((basis.len(), basis.len()), |(i, j)| {
        factors
            .iter()
            .enumerate()
            .map(|(q, m)| m[[BasisLabels::bit(i, q), BasisLabels::bit(j, q)]])
            .product::<f64>()
    });

    let cal = CalibrationMatrix {
        basis,
        matrix,
        shots,
        kind: CalibrationKind::Tensored,
    };
    debug!(
        average_fidelity = cal.average_fidelity(),
        "built tensored calibration matrix"
    );
    Ok(cal)
}

impl CalibrationMatrix {
    fn assemble(
        basis: BasisLabels,
        preparations: &[&OutcomeCounts],
        policy: LabelPolicy,
        kind: CalibrationKind,
    ) -> MitigationResult<Self> {
        let dim = basis.len();
        let mut matrix = Array2::<f64>::zeros((dim, dim));
        let mut shots = Vec::with_capacity(dim);

        for (j, counts) in preparations.iter().enumerate() {
            let prepared = basis.label(j).unwrap_or_default();
            let mut column = vec![0u64; dim];
            let mut kept = 0u64;

            for (label, &count) in counts.iter() {
                match basis.index_of(label) {
                    Some(i) => {
                        column[i] += count;
                        kept += count;
                    }
                    None if policy == LabelPolicy::Strict => {
                        return Err(MitigationError::LabelMismatch {
                            label: label.clone(),
                            n_qubits: basis.n_qubits(),
                        });
                    }
                    None => debug!(%label, prepared, count, "dropping unknown outcome label"),
                }
            }

            if kept == 0 {
                let reason = if counts.total_shots() == 0 {
                    "zero shots recorded"
                } else {
                    "no shots landed on basis labels"
                };
                return Err(MitigationError::InsufficientCalibrationData {
                    label: prepared.to_string(),
                    reason: reason.into(),
                });
            }

            #[allow(clippy::cast_precision_loss)]
            for (i, &c) in column.iter().enumerate() {
                matrix[[i, j]] = c as f64 / kept as f64;
            }
            shots.push(kept);
        }

        let cal = Self {
            basis,
            matrix,
            shots,
            kind,
        };
        debug!(
            n_qubits = cal.n_qubits(),
            average_fidelity = cal.average_fidelity(),
            "built calibration matrix"
        );
        Ok(cal)
    }

    /// Wrap an existing column-stochastic matrix.
    ///
    /// No [`MitigationConfig`] is involved, so the register width is checked
    /// against the fixed [`DEFAULT_MAX_QUBITS`] ceiling, not a configured
    /// `max_qubits`.
    pub fn from_dense(n_qubits: usize, matrix: Array2<f64>) -> MitigationResult<Self> {
        let basis = enumerate_basis(n_qubits, DEFAULT_MAX_QUBITS)?;
        check_stochastic(&basis, &matrix)?;
        Ok(Self {
            basis,
            matrix,
            shots: Vec::new(),
            kind: CalibrationKind::Synthetic,
        })
    }

    /// Matrix for independent, symmetric bit flips with probability `error_rate`.
    ///
    /// Like [`from_dense`](Self::from_dense), the width ceiling is the fixed
    /// [`DEFAULT_MAX_QUBITS`].
    pub fn from_error_rate(n_qubits: usize, error_rate: f64) -> MitigationResult<Self> {
        if !(0.0..=1.0).contains(&error_rate) {
            return Err(MitigationError::InvalidConfiguration(format!(
                "error rate must lie in [0, 1], got {error_rate}"
            )));
        }
        let basis = enumerate_basis(n_qubits, DEFAULT_MAX_QUBITS)?;
        let dim = basis.len();

        #[allow(clippy::cast_possible_wrap)]
        let matrix = Array2::from_shape_fn((dim, dim), |(i, j)| {
            let flips = (i ^ j).count_ones() as i32;
            error_rate.powi(flips) * (1.0 - error_rate).powi(n_qubits as i32 - flips)
        });

        Ok(Self {
            basis,
            matrix,
            shots: Vec::new(),
            kind: CalibrationKind::Synthetic,
        })
    }

    /// Register width.
    pub fn n_qubits(&self) -> usize {
        self.basis.n_qubits()
    }

    /// Matrix dimension (`2^n`).
    pub fn dim(&self) -> usize {
        self.basis.len()
    }

    /// The basis ordering rows and columns follow.
    pub fn basis(&self) -> &BasisLabels {
        &self.basis
    }

    /// The dense matrix, `M[[observed, prepared]]`.
    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    /// `P(observe i | prepared j)`.
    pub fn entry(&self, observed: usize, prepared: usize) -> Option<f64> {
        self.matrix.get((observed, prepared)).copied()
    }

    /// Shot totals of the experiments the matrix was built from, in run order.
    ///
    /// Full: one per basis state. Tensored: `prepared 0` then `prepared 1`
    /// for each qubit. Synthetic: empty.
    pub fn shots(&self) -> &[u64] {
        &self.shots
    }

    /// How the matrix was obtained.
    pub fn kind(&self) -> CalibrationKind {
        self.kind
    }

    /// Probability of reading `state` correctly.
    pub fn readout_fidelity(&self, state: usize) -> Option<f64> {
        self.entry(state, state)
    }

    /// Mean of the diagonal.
    #[allow(clippy::cast_precision_loss)]
    pub fn average_fidelity(&self) -> f64 {
        self.matrix.diag().sum() / self.dim() as f64
    }

    /// Sum of each column.
    pub fn column_sums(&self) -> Vec<f64> {
        self.matrix.columns().into_iter().map(|c| c.sum()).collect()
    }

    /// True if every entry is within `tolerance` of the identity.
    pub fn is_identity(&self, tolerance: f64) -> bool {
        self.matrix.indexed_iter().all(|((i, j), &v)| {
            let expected = if i == j { 1.0 } else { 0.0 };
            (v - expected).abs() <= tolerance
        })
    }

    /// Snapshot for persistence.
    pub fn to_record(&self) -> CalibrationRecord {
        CalibrationRecord {
            n_qubits: self.n_qubits(),
            labels: self.basis.as_slice().to_vec(),
            kind: self.kind,
            shots: self.shots.clone(),
            matrix: self.matrix.rows().into_iter().map(|r| r.to_vec()).collect(),
        }
    }

    /// Rebuild from a persisted record, checking it is self-consistent.
    ///
    /// Records wider than [`DEFAULT_MAX_QUBITS`] are rejected before anything
    /// is allocated for them.
    pub fn from_record(record: CalibrationRecord) -> MitigationResult<Self> {
        if record.n_qubits > DEFAULT_MAX_QUBITS {
            return Err(MitigationError::InvalidConfiguration(format!(
                "persisted record claims {} qubits, above the ceiling of {DEFAULT_MAX_QUBITS}",
                record.n_qubits
            )));
        }
        let expected_labels = 1usize << record.n_qubits;
        if record.labels.len() != expected_labels {
            return Err(MitigationError::InvalidConfiguration(format!(
                "persisted record lists {} labels, a {}-qubit basis has {expected_labels}",
                record.labels.len(),
                record.n_qubits
            )));
        }
        let basis = enumerate_basis(record.n_qubits, DEFAULT_MAX_QUBITS)?;
        if record.labels != basis.as_slice() {
            return Err(MitigationError::InvalidConfiguration(
                "persisted labels do not match the canonical basis ordering".into(),
            ));
        }

        let dim = basis.len();
        let expected_shots = match record.kind {
            CalibrationKind::Full => dim,
            CalibrationKind::Tensored => 2 * record.n_qubits,
            CalibrationKind::Synthetic => 0,
        };
        if record.shots.len() != expected_shots {
            return Err(MitigationError::DimensionMismatch {
                expected: expected_shots,
                found: record.shots.len(),
            });
        }
        if record.matrix.len() != dim {
            return Err(MitigationError::DimensionMismatch {
                expected: dim,
                found: record.matrix.len(),
            });
        }
        if let Some(row) = record.matrix.iter().find(|r| r.len() != dim) {
            return Err(MitigationError::DimensionMismatch {
                expected: dim,
                found: row.len(),
            });
        }

        let flat: Vec<f64> = record.matrix.into_iter().flatten().collect();
        let matrix = Array2::from_shape_vec((dim, dim), flat)
            .map_err(|e| MitigationError::InvalidConfiguration(e.to_string()))?;
        check_stochastic(&basis, &matrix)?;

        Ok(Self {
            basis,
            matrix,
            shots: record.shots,
            kind: record.kind,
        })
    }

    /// Encode as JSON.
    pub fn to_json(&self) -> MitigationResult<String> {
        Ok(serde_json::to_string_pretty(&self.to_record())?)
    }

    /// Decode from JSON produced by [`to_json`](Self::to_json).
    pub fn from_json(json: &str) -> MitigationResult<Self> {
        let record: CalibrationRecord = serde_json::from_str(json)?;
        Self::from_record(record)
    }
}

/// Serializable form of a [`CalibrationMatrix`]; `matrix` is row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    /// Register width.
    pub n_qubits: usize,
    /// Basis labels in canonical order.
    pub labels: Vec<String>,
    /// How the matrix was obtained.
    pub kind: CalibrationKind,
    /// Shot totals, see [`CalibrationMatrix::shots`].
    pub shots: Vec<u64>,
    /// Rows of the matrix.
    pub matrix: Vec<Vec<f64>>,
}

fn check_stochastic(basis: &BasisLabels, matrix: &Array2<f64>) -> MitigationResult<()> {
    let dim = basis.len();
    if matrix.dim() != (dim, dim) {
        return Err(MitigationError::DimensionMismatch {
            expected: dim,
            found: matrix.nrows().max(matrix.ncols()),
        });
    }
    if let Some(((i, j), v)) = matrix
        .indexed_iter()
        .find(|&(_, &v)| !(v.is_finite() && (0.0..=1.0).contains(&v)))
    {
        return Err(MitigationError::InvalidConfiguration(format!(
            "entry ({i}, {j}) = {v} is not a probability"
        )));
    }
    for (j, column) in matrix.columns().into_iter().enumerate() {
        let sum = column.sum();
        if (sum - 1.0).abs() > COLUMN_SUM_TOLERANCE {
            return Err(MitigationError::InvalidConfiguration(format!(
                "column '{}' sums to {sum}, not 1",
                basis.label(j).unwrap_or_default()
            )));
        }
    }
    Ok(())
}
