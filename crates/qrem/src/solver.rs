//! Generalized inverse of a calibration matrix.
//!
//! Two strategies are available:
//!
//! - **Pseudo-inverse**: `M⁺ = V Σ⁺ Uᵀ` from the SVD of `M`, with singular
//!   values below `max(rcond · σ_max, tolerance)` discarded. Closed form and
//!   fast, but the corrected vector may leave the probability simplex.
//! - **Constrained least squares**: for each noisy vector `q`,
//!
//!   ```text
//!   minimize ‖M p − q‖₂   subject to   p ≥ 0,  Σ p = 1
//!   ```
//!
//!   solved by accelerated projected gradient (FISTA) with step `1/σ_max²`
//!   and an exact Euclidean projection onto the simplex. The feasible set is
//!   the probability simplex itself, which is never empty, so the solve
//!   always has a solution and [`MitigationError::NoFeasibleSolution`] is
//!   not produced here.
//!
//! # Reference
//! A. Beck, M. Teboulle, "A Fast Iterative Shrinkage-Thresholding Algorithm
//! for Linear Inverse Problems", SIAM J. Imaging Sci. 2 (2009).
//! J. Duchi et al., "Efficient Projections onto the ℓ1-Ball for Learning in
//! High Dimensions", ICML (2008).

use nalgebra::DMatrix;
use ndarray::{Array1, Array2};
use tracing::{debug, instrument, warn};

use crate::basis::BasisLabels;
use crate::calibration::CalibrationMatrix;
use crate::config::{CorrectionStrategy, MitigationConfig};
use crate::error::{MitigationError, MitigationResult};

#[derive(Debug, Clone)]
enum Kernel {
    /// Dense pseudo-inverse, applied by a matrix-vector product.
    PseudoInverse(Array2<f64>),
    /// Calibration matrix kept for per-query solves.
    Constrained {
        matrix: Array2<f64>,
        /// Lipschitz constant of the gradient, σ_max².
        lipschitz: f64,
        max_iterations: usize,
    },
}

/// Maps a noisy probability vector to a mitigated one.
///
/// Immutable after construction; shareable across threads.
#[derive(Debug, Clone)]
pub struct CorrectionOperator {
    basis: BasisLabels,
    strategy: CorrectionStrategy,
    kernel: Kernel,
    condition_number: f64,
    rank: usize,
    tolerance: f64,
}

/// Build the correction operator selected by `config.strategy`.
pub fn build_corrector(
    calibration: &CalibrationMatrix,
    config: &MitigationConfig,
) -> MitigationResult<CorrectionOperator> {
    CorrectionOperator::new(calibration, config)
}

impl CorrectionOperator {
    /// Decompose `calibration` and prepare the configured strategy.
    #[instrument(skip_all, fields(dim = calibration.dim(), strategy = %config.strategy))]
    pub fn new(
        calibration: &CalibrationMatrix,
        config: &MitigationConfig,
    ) -> MitigationResult<Self> {
        config.validate()?;
        let matrix = calibration.matrix();
        let dim = calibration.dim();

        let decomposition = DMatrix::from_fn(dim, dim, |i, j| matrix[[i, j]]).svd(true, true);
        let u = decomposition
            .u
            .as_ref()
            .ok_or_else(|| MitigationError::Decomposition("SVD did not return U".into()))?;
        let v_t = decomposition
            .v_t
            .as_ref()
            .ok_or_else(|| MitigationError::Decomposition("SVD did not return Vᵀ".into()))?;
        let sigma = &decomposition.singular_values;

        let sigma_max = sigma.iter().copied().fold(0.0, f64::max);
        let sigma_min = sigma.iter().copied().fold(f64::INFINITY, f64::min);
        if !(sigma_max.is_finite() && sigma_max > 0.0) {
            return Err(MitigationError::Decomposition(format!(
                "largest singular value is {sigma_max}"
            )));
        }
        let condition_number = if sigma_min > 0.0 {
            sigma_max / sigma_min
        } else {
            f64::INFINITY
        };

        if config.require_invertible && condition_number > config.max_condition_number {
            return Err(MitigationError::SingularMatrix {
                condition_number,
                ceiling: config.max_condition_number,
            });
        }

        #[allow(clippy::cast_precision_loss)]
        let rcond = config.rcond.unwrap_or(f64::EPSILON * dim as f64);
        let cutoff = (rcond * sigma_max).max(config.tolerance);
        let kept: Vec<usize> = (0..sigma.len()).filter(|&k| sigma[k] > cutoff).collect();
        let rank = kept.len();
        if rank < dim {
            warn!(
                rank,
                dim, condition_number, "calibration matrix is rank deficient, truncating"
            );
        }

        let kernel = match config.strategy {
            CorrectionStrategy::PseudoInverse => {
                let pinv = Array2::from_shape_fn((dim, dim), |(i, j)| {
                    kept.iter()
                        .map(|&k| v_t[(k, i)] * u[(j, k)] / sigma[k])
                        .sum::<f64>()
                });
                Kernel::PseudoInverse(pinv)
            }
            CorrectionStrategy::ConstrainedLeastSquares => Kernel::Constrained {
                matrix: matrix.clone(),
                lipschitz: sigma_max * sigma_max,
                max_iterations: config.max_iterations,
            },
        };

        debug!(rank, condition_number, cutoff, "built correction operator");

        Ok(Self {
            basis: calibration.basis().clone(),
            strategy: config.strategy,
            kernel,
            condition_number,
            rank,
            tolerance: config.tolerance,
        })
    }

    /// Strategy in use.
    pub fn strategy(&self) -> CorrectionStrategy {
        self.strategy
    }

    /// Basis ordering expected by [`correct`](Self::correct).
    pub fn basis(&self) -> &BasisLabels {
        &self.basis
    }

    /// Vector length expected by [`correct`](Self::correct).
    pub fn dim(&self) -> usize {
        self.basis.len()
    }

    /// `σ_max / σ_min` of the calibration matrix (infinite when singular).
    pub fn condition_number(&self) -> f64 {
        self.condition_number
    }

    /// Number of singular values kept.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Absolute tolerance used for convergence and near-zero detection.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// The dense pseudo-inverse, when that strategy is in use.
    pub fn pseudo_inverse(&self) -> Option<&Array2<f64>> {
        match &self.kernel {
            Kernel::PseudoInverse(pinv) => Some(pinv),
            Kernel::Constrained { .. } => None,
        }
    }

    /// Correct a dense noisy probability vector.
    ///
    /// The result is returned as computed: in pseudo-inverse mode it may
    /// contain negative entries; in constrained mode it lies on the simplex.
    pub fn correct(&self, noisy: &Array1<f64>) -> MitigationResult<Array1<f64>> {
        if noisy.len() != self.dim() {
            return Err(MitigationError::DimensionMismatch {
                expected: self.dim(),
                found: noisy.len(),
            });
        }

        match &self.kernel {
            Kernel::PseudoInverse(pinv) => Ok(pinv.dot(noisy)),
            Kernel::Constrained {
                matrix,
                lipschitz,
                max_iterations,
            } => {
                let (solution, iterations, converged) =
                    solve_on_simplex(matrix, noisy, *lipschitz, self.tolerance, *max_iterations);
                if converged {
                    debug!(iterations, "constrained solve converged");
                } else {
                    warn!(
                        iterations,
                        "constrained solve hit the iteration cap, returning last iterate"
                    );
                }
                Ok(solution)
            }
        }
    }
}

/// FISTA on `½‖M p − q‖²` over the probability simplex.
///
/// Returns the iterate, the number of iterations run and whether the
/// ∞-norm step fell below `tolerance`.
fn solve_on_simplex(
    matrix: &Array2<f64>,
    target: &Array1<f64>,
    lipschitz: f64,
    tolerance: f64,
    max_iterations: usize,
) -> (Array1<f64>, usize, bool) {
    let step = 1.0 / lipschitz;
    let mut x = project_onto_simplex(target);
    let mut y = x.clone();
    let mut t = 1.0f64;

    for iteration in 1..=max_iterations {
        let residual = matrix.dot(&y) - target;
        let gradient = matrix.t().dot(&residual);
        let x_next = project_onto_simplex(&(&y - &(gradient * step)));

        let delta = &x_next - &x;
        let change = delta.iter().fold(0.0f64, |acc, d| acc.max(d.abs()));

        let t_next = (1.0 + (1.0 + 4.0 * t * t).sqrt()) / 2.0;
        y = &x_next + &(delta * ((t - 1.0) / t_next));
        x = x_next;
        t = t_next;

        if change <= tolerance {
            return (x, iteration, true);
        }
    }
    (x, max_iterations, false)
}

/// Euclidean projection onto `{p : p ≥ 0, Σ p = 1}`.
pub fn project_onto_simplex(v: &Array1<f64>) -> Array1<f64> {
    let mut sorted = v.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut cumulative = 0.0;
    let mut theta = 0.0;
    for (k, &value) in sorted.iter().enumerate() {
        cumulative += value;
        #[allow(clippy::cast_precision_loss)]
        let candidate = (cumulative - 1.0) / (k + 1) as f64;
        if value - candidate > 0.0 {
            theta = candidate;
        }
    }
    v.mapv(|x| (x - theta).max(0.0))
}
