//! Measurement filter.
//!
//! The filter is the serving-time half of the engine: it owns a calibration
//! matrix and the correction operator derived from it, and turns noisy
//! outcome counts into mitigated ones:
//!
//! ```text
//!   counts ──→ dense p_noisy ──→ correct ──→ clip + renormalize ──→ round ──→ counts
//! ```
//!
//! Clipping sets negative (and near-zero) entries to zero and rescales the
//! rest to sum to one. Rounding uses the largest-remainder rule, so the
//! mitigated counts always add up to exactly the input total. The filter
//! holds no mutable state and may be shared across threads.

use ndarray::Array1;
use tracing::{debug, warn};

use crate::basis::BasisLabels;
use crate::calibration::CalibrationMatrix;
use crate::config::{LabelPolicy, MitigationConfig};
use crate::counts::OutcomeCounts;
use crate::error::{MitigationError, MitigationResult};
use crate::solver::CorrectionOperator;

/// Reusable readout-error filter for one calibration session.
#[derive(Debug, Clone)]
pub struct MeasurementFilter {
    calibration: CalibrationMatrix,
    operator: CorrectionOperator,
    config: MitigationConfig,
}

impl MeasurementFilter {
    /// Derive the correction operator for `calibration` and take ownership of both.
    pub fn new(calibration: CalibrationMatrix, config: MitigationConfig) -> MitigationResult<Self> {
        let operator = CorrectionOperator::new(&calibration, &config)?;
        Ok(Self {
            calibration,
            operator,
            config,
        })
    }

    /// The calibration matrix this filter was built from.
    pub fn calibration(&self) -> &CalibrationMatrix {
        &self.calibration
    }

    /// The correction operator.
    pub fn operator(&self) -> &CorrectionOperator {
        &self.operator
    }

    /// The configuration in effect.
    pub fn config(&self) -> &MitigationConfig {
        &self.config
    }

    /// Mitigate `noisy`, returning integer counts with the same total.
    pub fn apply(&self, noisy: &OutcomeCounts) -> MitigationResult<OutcomeCounts> {
        apply_filter(&self.operator, noisy, &self.config)
    }

    /// Mitigate `noisy`, returning the real-valued distribution.
    pub fn apply_distribution(
        &self,
        noisy: &OutcomeCounts,
    ) -> MitigationResult<MitigatedDistribution<'_>> {
        mitigate(&self.operator, noisy, &self.config)
    }
}

/// Mitigate `noisy` with a standalone operator.
pub fn apply_filter(
    operator: &CorrectionOperator,
    noisy: &OutcomeCounts,
    config: &MitigationConfig,
) -> MitigationResult<OutcomeCounts> {
    Ok(mitigate(operator, noisy, config)?.to_counts())
}

/// Real-valued result of mitigating one count table.
#[derive(Debug, Clone)]
pub struct MitigatedDistribution<'a> {
    basis: &'a BasisLabels,
    noisy: Array1<f64>,
    quasi: Array1<f64>,
    probabilities: Array1<f64>,
    total_shots: u64,
}

impl MitigatedDistribution<'_> {
    /// Noisy input as a dense probability vector.
    pub fn noisy_probabilities(&self) -> &Array1<f64> {
        &self.noisy
    }

    /// Operator output before clipping. May be negative in pseudo-inverse mode.
    pub fn quasi_probabilities(&self) -> &Array1<f64> {
        &self.quasi
    }

    /// Clipped, renormalized mitigated distribution.
    pub fn probabilities(&self) -> &Array1<f64> {
        &self.probabilities
    }

    /// Shots the distribution is scaled to.
    pub fn total_shots(&self) -> u64 {
        self.total_shots
    }

    /// Probability of `label`, if it is a basis label.
    pub fn probability(&self, label: &str) -> Option<f64> {
        self.basis.index_of(label).map(|i| self.probabilities[i])
    }

    /// Real-valued expected counts (`probabilities × total_shots`).
    #[allow(clippy::cast_precision_loss)]
    pub fn expected_counts(&self) -> Array1<f64> {
        &self.probabilities * self.total_shots as f64
    }

    /// Integer counts summing to exactly `total_shots`, zeros omitted.
    pub fn to_counts(&self) -> OutcomeCounts {
        let rounded = round_preserving_total(&self.expected_counts(), self.total_shots);
        rounded
            .into_iter()
            .enumerate()
            .filter(|&(_, c)| c > 0)
            .filter_map(|(i, c)| self.basis.label(i).map(|l| (l.to_string(), c)))
            .collect()
    }
}

#[allow(clippy::cast_precision_loss)]
fn mitigate<'a>(
    operator: &'a CorrectionOperator,
    noisy: &OutcomeCounts,
    config: &MitigationConfig,
) -> MitigationResult<MitigatedDistribution<'a>> {
    let basis = operator.basis();
    let dim = basis.len();

    let mut dense = Array1::<f64>::zeros(dim);
    let mut retained = 0u64;
    for (label, &count) in noisy.iter() {
        match basis.index_of(label) {
            Some(i) => {
                dense[i] += count as f64;
                retained += count;
            }
            None => match config.label_policy {
                LabelPolicy::Strict => {
                    return Err(MitigationError::LabelMismatch {
                        label: label.clone(),
                        n_qubits: basis.n_qubits(),
                    });
                }
                LabelPolicy::Lenient => debug!(%label, count, "dropping unknown outcome label"),
            },
        }
    }

    if retained == 0 {
        return Ok(MitigatedDistribution {
            basis,
            noisy: dense.clone(),
            quasi: dense.clone(),
            probabilities: dense,
            total_shots: 0,
        });
    }

    // Dropped labels shrink the support, not the shot total.
    let total_shots = noisy.total_shots();
    let noisy_probs = dense / retained as f64;
    let quasi = operator.correct(&noisy_probs)?;

    let tolerance = operator.tolerance();
    let probabilities = match clip_and_renormalize(&quasi, tolerance) {
        Some(p) => p,
        None => {
            warn!("no positive mass survived correction, keeping the noisy distribution");
            noisy_probs.clone()
        }
    };
    let probabilities = drop_negligible(probabilities, total_shots, config.negligible_count);

    Ok(MitigatedDistribution {
        basis,
        noisy: noisy_probs,
        quasi,
        probabilities,
        total_shots,
    })
}

/// Zero entries at or below `tolerance` and rescale the rest to sum to one.
fn clip_and_renormalize(quasi: &Array1<f64>, tolerance: f64) -> Option<Array1<f64>> {
    let clipped = quasi.mapv(|v| if v > tolerance { v } else { 0.0 });
    let mass = clipped.sum();
    (mass > tolerance).then(|| clipped / mass)
}

/// Zero entries whose expected count is at or below `threshold`.
///
/// A zero threshold is a no-op; exact zeros are omitted when counts are built.
#[allow(clippy::cast_precision_loss)]
fn drop_negligible(probabilities: Array1<f64>, total: u64, threshold: f64) -> Array1<f64> {
    if threshold <= 0.0 {
        return probabilities;
    }
    let cutoff = threshold / total as f64;
    let kept = probabilities.mapv(|p| if p > cutoff { p } else { 0.0 });
    let mass = kept.sum();
    if mass > 0.0 {
        kept / mass
    } else {
        warn!(threshold, "negligible-count threshold would drop every outcome, ignoring it");
        probabilities
    }
}

/// Round non-negative reals to integers summing to `total`.
///
/// Every entry is floored; the shortfall is handed out one unit at a time in
/// order of descending fractional part, ties to the lower index.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn round_preserving_total(expected: &Array1<f64>, total: u64) -> Vec<u64> {
    let mut rounded: Vec<u64> = expected.iter().map(|&x| x.max(0.0).floor() as u64).collect();
    if rounded.is_empty() {
        return rounded;
    }
    let fraction = |i: usize| expected[i].max(0.0) - rounded[i] as f64;

    let mut order: Vec<usize> = (0..rounded.len()).collect();
    order.sort_by(|&a, &b| fraction(b).total_cmp(&fraction(a)).then(a.cmp(&b)));

    let assigned: u64 = rounded.iter().sum();
    if assigned <= total {
        let deficit = usize::try_from(total - assigned).unwrap_or(usize::MAX);
        for &i in order.iter().cycle().take(deficit) {
            rounded[i] += 1;
        }
    } else {
        let mut surplus = assigned - total;
        for &i in order.iter().rev() {
            if surplus == 0 {
                break;
            }
            let take = rounded[i].min(surplus);
            rounded[i] -= take;
            surplus -= take;
        }
    }
    rounded
}
