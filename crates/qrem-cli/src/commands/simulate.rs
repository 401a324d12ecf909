//! Simulate command implementation.
//!
//! Runs every basis preparation through a seeded bit-flip readout channel
//! and records the outcomes as calibration data.

use anyhow::{Context, Result};
use console::style;
use tracing::info;

use qrem::config::DEFAULT_MAX_QUBITS;
use qrem::{CalibrationRunner, SimulatedReadout, enumerate_basis};

use super::common::{CalibrationData, write_file};

/// Generate calibration data without writing it.
pub fn run(n_qubits: usize, p01: f64, p10: f64, shots: u64, seed: u64) -> Result<CalibrationData> {
    if shots == 0 {
        anyhow::bail!("Shots must be at least 1");
    }
    let basis = enumerate_basis(n_qubits, DEFAULT_MAX_QUBITS)?;
    let mut readout = SimulatedReadout::uniform(n_qubits, p01, p10, seed)?;
    let tables = readout
        .run_calibration(basis.as_slice(), shots)
        .context("Simulated calibration failed")?;

    info!(n_qubits, shots, seed, "simulated calibration");
    Ok(CalibrationData {
        shots,
        preparations: basis.as_slice().iter().cloned().zip(tables).collect(),
    })
}

/// Execute the simulate command.
pub fn execute(
    n_qubits: usize,
    p01: f64,
    p10: f64,
    shots: u64,
    seed: u64,
    output: &str,
) -> Result<()> {
    println!(
        "{} Simulating calibration for {} qubits (p01={}, p10={})",
        style("→").cyan().bold(),
        n_qubits,
        p01,
        p10
    );

    let data = run(n_qubits, p01, p10, shots, seed)?;
    let json = serde_json::to_string_pretty(&data).context("JSON serialization failed")?;
    write_file(output, &json)?;

    println!(
        "{} Calibration data written to {}",
        style("✓").green().bold(),
        style(output).dim()
    );
    Ok(())
}
