//! Calibration session driver and the device seam.
//!
//! Running calibration experiments is the job of whatever talks to the
//! hardware. The engine only needs one thing from it: given the basis
//! labels to prepare and a shot budget, the outcome counts observed for
//! each preparation. That contract is [`CalibrationRunner`].
//!
//! [`SimulatedReadout`] implements it with an independent, asymmetric
//! bit-flip channel per qubit. It is a stand-in for a device in tests and
//! dry runs, not a circuit simulator.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, instrument};

use crate::basis::{BasisLabels, enumerate_basis, format_label, parse_label};
use crate::calibration::{
    CalibrationMatrix, QubitCalibration, build_calibration, build_tensored_calibration,
};
use crate::config::{DEFAULT_MAX_QUBITS, LabelPolicy, MitigationConfig};
use crate::counts::OutcomeCounts;
use crate::error::{MitigationError, MitigationResult};
use crate::filter::MeasurementFilter;

/// Source of calibration data.
pub trait CalibrationRunner {
    /// Prepare each label in `labels`, measure it `shots` times and return
    /// one outcome table per label, in the same order.
    fn run_calibration(
        &mut self,
        labels: &[String],
        shots: u64,
    ) -> MitigationResult<Vec<OutcomeCounts>>;
}

/// Run a full calibration session and build its filter.
#[instrument(skip(runner, config))]
pub fn calibrate<R: CalibrationRunner + ?Sized>(
    runner: &mut R,
    n_qubits: usize,
    shots: u64,
    config: &MitigationConfig,
) -> MitigationResult<MeasurementFilter> {
    if shots == 0 {
        return Err(MitigationError::InvalidConfiguration(
            "calibration needs at least one shot per preparation".into(),
        ));
    }
    let basis = enumerate_basis(n_qubits, config.max_qubits)?;
    let results = runner.run_calibration(basis.as_slice(), shots)?;
    if results.len() > basis.len() {
        return Err(MitigationError::Runner(format!(
            "runner returned {} outcome tables for {} preparations",
            results.len(),
            basis.len()
        )));
    }
    let calibration = build_calibration(&results, n_qubits, config)?;

    info!(
        average_fidelity = calibration.average_fidelity(),
        experiments = basis.len(),
        "calibration complete"
    );
    MeasurementFilter::new(calibration, config.clone())
}

/// Run a tensored calibration session (two experiments) and build its filter.
///
/// Prepares all-zeros and all-ones and reads each qubit's 2×2 matrix off the
/// marginals. Correlated readout errors are not captured.
#[instrument(skip(runner, config))]
pub fn calibrate_tensored<R: CalibrationRunner + ?Sized>(
    runner: &mut R,
    n_qubits: usize,
    shots: u64,
    config: &MitigationConfig,
) -> MitigationResult<MeasurementFilter> {
    if shots == 0 {
        return Err(MitigationError::InvalidConfiguration(
            "calibration needs at least one shot per preparation".into(),
        ));
    }
    let basis = enumerate_basis(n_qubits, config.max_qubits)?;
    let zeros = format_label(0, n_qubits);
    let ones = format_label(basis.len() - 1, n_qubits);

    let results = runner.run_calibration(&[zeros.clone(), ones.clone()], shots)?;
    let [from_zeros, from_ones] = results.as_slice() else {
        if results.len() > 2 {
            return Err(MitigationError::Runner(format!(
                "runner returned {} outcome tables for 2 preparations",
                results.len()
            )));
        }
        return Err(MitigationError::InsufficientCalibrationData {
            label: if results.is_empty() { zeros } else { ones },
            reason: format!("runner returned {} of 2 outcome tables", results.len()),
        });
    };

    let per_qubit = (0..n_qubits)
        .map(|q| {
            Ok(QubitCalibration::new(
                marginal(from_zeros, q, n_qubits, config.label_policy)?,
                marginal(from_ones, q, n_qubits, config.label_policy)?,
            ))
        })
        .collect::<MitigationResult<Vec<_>>>()?;

    let calibration = build_tensored_calibration(&per_qubit, config)?;
    info!(
        average_fidelity = calibration.average_fidelity(),
        "tensored calibration complete"
    );
    MeasurementFilter::new(calibration, config.clone())
}

/// Single-qubit counts of bit `qubit` (0 = rightmost).
fn marginal(
    counts: &OutcomeCounts,
    qubit: usize,
    n_qubits: usize,
    policy: LabelPolicy,
) -> MitigationResult<OutcomeCounts> {
    let mut out = OutcomeCounts::new();
    for (label, &count) in counts.iter() {
        match parse_label(label, n_qubits) {
            Some(index) => out.insert(format_label(BasisLabels::bit(index, qubit), 1), count),
            None if policy == LabelPolicy::Strict => {
                return Err(MitigationError::LabelMismatch {
                    label: label.clone(),
                    n_qubits,
                });
            }
            None => {}
        }
    }
    Ok(out)
}

/// Seeded readout channel with independent per-qubit flip probabilities.
#[derive(Debug, Clone)]
pub struct SimulatedReadout {
    /// P(read 1 | prepared 0), per qubit.
    p01: Vec<f64>,
    /// P(read 0 | prepared 1), per qubit.
    p10: Vec<f64>,
    rng: StdRng,
}

impl SimulatedReadout {
    /// Same flip probabilities on every qubit.
    pub fn uniform(n_qubits: usize, p01: f64, p10: f64, seed: u64) -> MitigationResult<Self> {
        check_width(n_qubits)?;
        Self::with_rates(vec![p01; n_qubits], vec![p10; n_qubits], seed)
    }

    /// Per-qubit flip probabilities; index `q` is qubit `q`.
    ///
    /// At most [`DEFAULT_MAX_QUBITS`] qubits: sampling tallies every basis state.
    pub fn with_rates(p01: Vec<f64>, p10: Vec<f64>, seed: u64) -> MitigationResult<Self> {
        if p01.is_empty() || p01.len() != p10.len() {
            return Err(MitigationError::InvalidConfiguration(format!(
                "need matching non-empty rate lists, got {} and {}",
                p01.len(),
                p10.len()
            )));
        }
        check_width(p01.len())?;
        if let Some(p) = p01
            .iter()
            .chain(&p10)
            .find(|p| !(0.0..=1.0).contains(*p))
        {
            return Err(MitigationError::InvalidConfiguration(format!(
                "flip probability {p} is outside [0, 1]"
            )));
        }
        Ok(Self {
            p01,
            p10,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// A channel that never flips.
    pub fn noiseless(n_qubits: usize, seed: u64) -> MitigationResult<Self> {
        Self::uniform(n_qubits, 0.0, 0.0, seed)
    }

    /// Register width.
    pub fn n_qubits(&self) -> usize {
        self.p01.len()
    }

    /// The exact confusion matrix of this channel.
    pub fn expected_matrix(&self) -> MitigationResult<CalibrationMatrix> {
        let n = self.n_qubits();
        let dim = 1usize << n;
        let matrix = Array2::from_shape_fn((dim, dim), |(observed, prepared)| {
            (0..n)
                .map(|q| {
                    let flip = match BasisLabels::bit(prepared, q) {
                        0 => self.p01[q],
                        _ => self.p10[q],
                    };
                    if BasisLabels::bit(observed, q) == BasisLabels::bit(prepared, q) {
                        1.0 - flip
                    } else {
                        flip
                    }
                })
                .product::<f64>()
        });
        CalibrationMatrix::from_dense(n, matrix)
    }

    /// Push every shot in `ideal` through the channel.
    pub fn measure(&mut self, ideal: &OutcomeCounts) -> MitigationResult<OutcomeCounts> {
        let n = self.n_qubits();
        let mut tally = vec![0u64; 1usize << n];

        // Sorted so a given seed always draws in the same order.
        let mut entries: Vec<_> = ideal.iter().collect();
        entries.sort();

        for (label, &count) in entries {
            let prepared = parse_label(label, n).ok_or_else(|| MitigationError::LabelMismatch {
                label: label.clone(),
                n_qubits: n,
            })?;
            for _ in 0..count {
                tally[self.sample_shot(prepared)] += 1;
            }
        }

        Ok(tally
            .into_iter()
            .enumerate()
            .filter(|&(_, c)| c > 0)
            .map(|(i, c)| (format_label(i, n), c))
            .collect())
    }

    fn sample_shot(&mut self, prepared: usize) -> usize {
        let mut observed = prepared;
        for q in 0..self.n_qubits() {
            let flip = match BasisLabels::bit(prepared, q) {
                0 => self.p01[q],
                _ => self.p10[q],
            };
            if self.rng.gen_bool(flip) {
                observed ^= 1 << q;
            }
        }
        observed
    }
}

fn check_width(n_qubits: usize) -> MitigationResult<()> {
    if n_qubits > DEFAULT_MAX_QUBITS {
        return Err(MitigationError::InvalidConfiguration(format!(
            "simulated register of {n_qubits} qubits exceeds the ceiling of {DEFAULT_MAX_QUBITS}"
        )));
    }
    Ok(())
}

impl CalibrationRunner for SimulatedReadout {
    fn run_calibration(
        &mut self,
        labels: &[String],
        shots: u64,
    ) -> MitigationResult<Vec<OutcomeCounts>> {
        labels
            .iter()
            .map(|label| self.measure(&OutcomeCounts::from_pairs([(label.as_str(), shots)])))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_rates() {
        assert!(SimulatedReadout::uniform(2, 1.5, 0.0, 0).is_err());
        assert!(SimulatedReadout::with_rates(vec![0.1], vec![0.1, 0.2], 0).is_err());
        assert!(SimulatedReadout::with_rates(vec![], vec![], 0).is_err());
    }

    #[test]
    fn test_rejects_wide_register() {
        assert!(SimulatedReadout::uniform(DEFAULT_MAX_QUBITS, 0.1, 0.1, 0).is_ok());
        for n in [DEFAULT_MAX_QUBITS + 1, 64, 200] {
            assert!(matches!(
                SimulatedReadout::uniform(n, 0.1, 0.1, 0),
                Err(MitigationError::InvalidConfiguration(_))
            ));
            assert!(matches!(
                SimulatedReadout::with_rates(vec![0.0; n], vec![0.0; n], 0),
                Err(MitigationError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn test_noiseless_measure_is_exact() {
        let mut sim = SimulatedReadout::noiseless(2, 1).unwrap();
        let ideal = OutcomeCounts::from_pairs([("01", 300), ("10", 700)]);
        assert_eq!(sim.measure(&ideal).unwrap(), ideal);
    }

    #[test]
    fn test_measure_rejects_wrong_width() {
        let mut sim = SimulatedReadout::noiseless(2, 1).unwrap();
        let bad = OutcomeCounts::from_pairs([("011", 1)]);
        assert!(matches!(
            sim.measure(&bad),
            Err(MitigationError::LabelMismatch { .. })
        ));
    }

    #[test]
    fn test_seed_is_reproducible() {
        let ideal = OutcomeCounts::from_pairs([("00", 500), ("11", 500)]);
        let mut a = SimulatedReadout::uniform(2, 0.1, 0.2, 42).unwrap();
        let mut b = SimulatedReadout::uniform(2, 0.1, 0.2, 42).unwrap();
        assert_eq!(a.measure(&ideal).unwrap(), b.measure(&ideal).unwrap());
    }

    #[test]
    fn test_marginal_extracts_rightmost_bit() {
        let counts = OutcomeCounts::from_pairs([("01", 3), ("10", 5), ("11", 2)]);
        let q0 = marginal(&counts, 0, 2, LabelPolicy::Strict).unwrap();
        assert_eq!(q0.get("1"), 5);
        assert_eq!(q0.get("0"), 5);
        let q1 = marginal(&counts, 1, 2, LabelPolicy::Strict).unwrap();
        assert_eq!(q1.get("1"), 7);
        assert_eq!(q1.get("0"), 3);
    }

    /// Returns a fixed number of noiseless tables regardless of the request.
    struct ShortRunner(usize);

    impl CalibrationRunner for ShortRunner {
        fn run_calibration(
            &mut self,
            labels: &[String],
            shots: u64,
        ) -> MitigationResult<Vec<OutcomeCounts>> {
            Ok(labels
                .iter()
                .cycle()
                .take(self.0)
                .map(|l| OutcomeCounts::from_pairs([(l.as_str(), shots)]))
                .collect())
        }
    }

    #[test]
    fn test_runner_table_count_checked() {
        let config = MitigationConfig::default();
        match calibrate(&mut ShortRunner(3), 2, 10, &config) {
            Err(MitigationError::InsufficientCalibrationData { label, .. }) => {
                assert_eq!(label, "11");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(
            calibrate(&mut ShortRunner(5), 2, 10, &config),
            Err(MitigationError::Runner(_))
        ));
        assert!(matches!(
            calibrate_tensored(&mut ShortRunner(1), 2, 10, &config),
            Err(MitigationError::InsufficientCalibrationData { .. })
        ));
        assert!(calibrate(&mut ShortRunner(4), 2, 10, &config).is_ok());
    }

    #[test]
    fn test_zero_shot_calibration_rejected() {
        let mut sim = SimulatedReadout::noiseless(1, 0).unwrap();
        assert!(matches!(
            calibrate(&mut sim, 1, 0, &MitigationConfig::default()),
            Err(MitigationError::InvalidConfiguration(_))
        ));
    }
}
