//! Calibrate command implementation.
//!
//! Turns recorded preparations into a persisted calibration matrix.

use anyhow::{Context, Result};
use console::style;
use tracing::warn;

use qrem::{
    CalibrationMatrix, LabelPolicy, MitigationConfig, build_calibration_from_labeled,
    build_corrector,
};

use super::common::{load_calibration_data, load_config, write_file};

/// Load the config at `path`, relaxing the label policy if asked to.
pub fn resolve_config(path: Option<&str>, lenient: bool) -> Result<MitigationConfig> {
    let config = load_config(path)?;
    Ok(if lenient {
        config.with_label_policy(LabelPolicy::Lenient)
    } else {
        config
    })
}

/// Build the calibration matrix described by the data at `input`.
pub fn run(input: &str, config: &MitigationConfig) -> Result<CalibrationMatrix> {
    let data = load_calibration_data(input)?;
    let n_qubits = data.n_qubits()?;
    for (label, total) in data.shot_mismatches() {
        warn!(
            prepared = label,
            recorded = total,
            expected = data.shots,
            "preparation shot total differs from the recorded budget"
        );
    }
    build_calibration_from_labeled(&data.preparations, n_qubits, config)
        .context("Failed to build calibration matrix")
}

/// Execute the calibrate command.
pub fn execute(input: &str, output: &str, lenient: bool, config: Option<&str>) -> Result<()> {
    println!(
        "{} Building calibration matrix from {}",
        style("→").cyan().bold(),
        style(input).dim()
    );

    let config = resolve_config(config, lenient)?;
    let matrix = run(input, &config)?;
    write_file(output, &matrix.to_json()?)?;

    let operator = build_corrector(&matrix, &config)?;

    println!("\n{} Calibration summary:", style("✓").green().bold());
    println!("  Qubits:            {}", matrix.n_qubits());
    println!(
        "  Average fidelity:  {}",
        style(format!("{:.4}", matrix.average_fidelity())).yellow()
    );
    println!("  Condition number:  {:.3e}", operator.condition_number());
    println!("  Rank:              {}/{}", operator.rank(), matrix.dim());

    println!("  Readout fidelity:");
    for (state, label) in matrix.basis().iter().enumerate().take(16) {
        if let Some(fidelity) = matrix.readout_fidelity(state) {
            println!("    {}: {:.4}", style(label).cyan(), fidelity);
        }
    }
    if matrix.dim() > 16 {
        println!("    ... and {} more states", matrix.dim() - 16);
    }

    println!("\n  Matrix written to {}", style(output).dim());
    Ok(())
}
