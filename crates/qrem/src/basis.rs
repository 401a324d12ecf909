//! Computational basis labels.
//!
//! The label of index `k` is `k` written in binary and zero-padded to the
//! register width, so `n = 2` enumerates `00, 01, 10, 11`. The rightmost
//! character is qubit 0 (OpenQASM 3 convention). Every matrix row, column
//! and dense vector in this crate is indexed by this ordering.

use rustc_hash::FxHashMap;

use crate::error::{MitigationError, MitigationResult};

/// The ordered set of `2^n` basis labels for an `n`-qubit register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasisLabels {
    n_qubits: usize,
    labels: Vec<String>,
    index: FxHashMap<String, usize>,
}

/// Enumerate all `2^n` basis labels in strictly increasing binary order.
///
/// `max_qubits` is the exponential blow-up guard: the calibration matrix
/// has `4^n` entries, so registers wider than the ceiling are rejected.
pub fn enumerate_basis(n_qubits: usize, max_qubits: usize) -> MitigationResult<BasisLabels> {
    if n_qubits < 1 {
        return Err(MitigationError::InvalidConfiguration(
            "register width must be at least 1 qubit".into(),
        ));
    }
    if n_qubits > max_qubits || n_qubits >= usize::BITS as usize {
        return Err(MitigationError::InvalidConfiguration(format!(
            "{n_qubits} qubits exceeds the ceiling of {max_qubits} (2^{n_qubits} basis states)"
        )));
    }

    let dim = 1usize << n_qubits;
    let labels: Vec<String> = (0..dim).map(|k| format_label(k, n_qubits)).collect();
    let index = labels
        .iter()
        .enumerate()
        .map(|(i, label)| (label.clone(), i))
        .collect();

    Ok(BasisLabels {
        n_qubits,
        labels,
        index,
    })
}

/// Format `value` as an `n_qubits`-wide bit-string.
pub fn format_label(value: usize, n_qubits: usize) -> String {
    format!("{value:0n_qubits$b}")
}

/// Parse an `n_qubits`-wide bit-string into its basis index.
pub fn parse_label(label: &str, n_qubits: usize) -> Option<usize> {
    if label.len() != n_qubits || n_qubits >= usize::BITS as usize {
        return None;
    }
    label.bytes().try_fold(0usize, |acc, b| match b {
        b'0' => Some(acc << 1),
        b'1' => Some((acc << 1) | 1),
        _ => None,
    })
}

impl BasisLabels {
    /// Register width.
    pub fn n_qubits(&self) -> usize {
        self.n_qubits
    }

    /// Number of basis states (`2^n`).
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Always false for a successfully enumerated basis.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Position of `label` in the canonical ordering.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    /// Label at position `index`.
    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Labels in canonical order.
    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }

    /// Iterate labels in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    /// Value of bit `qubit` (0 = rightmost) of basis index `index`.
    pub fn bit(index: usize, qubit: usize) -> usize {
        (index >> qubit) & 1
    }
}
