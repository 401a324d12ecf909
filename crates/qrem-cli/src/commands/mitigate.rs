//! Mitigate command implementation.
//!
//! Applies a stored calibration matrix to a table of noisy counts.

use anyhow::{Context, Result};
use console::style;

use qrem::{CorrectionStrategy, MeasurementFilter, OutcomeCounts};

use super::common::{load_config, load_counts, load_matrix, ordered_counts, print_counts};

/// Mitigate the counts at `counts` and return the corrected table.
pub fn run(
    matrix: &str,
    counts: &str,
    mode: Option<&str>,
    config: Option<&str>,
) -> Result<OutcomeCounts> {
    let mut config = load_config(config)?;
    if let Some(mode) = mode {
        config = config.with_strategy(mode.parse::<CorrectionStrategy>()?);
    }

    let calibration = load_matrix(matrix)?;
    let noisy = load_counts(counts)?;
    let filter = MeasurementFilter::new(calibration, config)
        .context("Failed to build correction operator")?;
    filter.apply(&noisy).context("Mitigation failed")
}

/// Execute the mitigate command.
pub fn execute(
    matrix: &str,
    counts: &str,
    mode: Option<&str>,
    config: Option<&str>,
    format: &str,
) -> Result<()> {
    let mitigated = run(matrix, counts, mode, config)?;

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&ordered_counts(&mitigated))
                .context("JSON serialization failed")?;
            println!("{json}");
        }
        "table" => {
            eprintln!(
                "{} Mitigating {} with {}",
                style("→").cyan().bold(),
                style(counts).dim(),
                style(matrix).dim()
            );
            print_counts("Mitigated counts", &mitigated);
        }
        other => anyhow::bail!("Unknown format: '{other}'. Available: table, json"),
    }
    Ok(())
}
