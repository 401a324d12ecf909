//! Shared helpers for CLI commands.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use qrem::{CalibrationMatrix, MitigationConfig, OutcomeCounts};

/// Recorded calibration experiments: one outcome table per prepared label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationData {
    /// Shots requested per preparation.
    pub shots: u64,
    /// Observed outcomes keyed by the prepared basis label.
    pub preparations: BTreeMap<String, OutcomeCounts>,
}

impl CalibrationData {
    /// Register width, read off the prepared labels.
    pub fn n_qubits(&self) -> Result<usize> {
        let mut widths = self.preparations.keys().map(String::len);
        let Some(width) = widths.next() else {
            anyhow::bail!("Calibration data has no preparations");
        };
        if widths.any(|w| w != width) {
            anyhow::bail!("Prepared labels have inconsistent widths");
        }
        Ok(width)
    }

    /// Preparations whose recorded total differs from `shots`, with that total.
    pub fn shot_mismatches(&self) -> Vec<(&str, u64)> {
        self.preparations
            .iter()
            .map(|(label, counts)| (label.as_str(), counts.total_shots()))
            .filter(|&(_, total)| total != self.shots)
            .collect()
    }
}

fn read_source(path: &str) -> Result<String> {
    if !Path::new(path).exists() {
        anyhow::bail!("File not found: {path}");
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read file: {path}"))
}

/// Load a mitigation config from YAML or JSON, or the defaults if `path` is `None`.
pub fn load_config(path: Option<&str>) -> Result<MitigationConfig> {
    let Some(path) = path else {
        return Ok(MitigationConfig::default());
    };
    let source = read_source(path)?;
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    let config: MitigationConfig = match ext.to_lowercase().as_str() {
        "json" => serde_json::from_str(&source)
            .with_context(|| format!("Invalid JSON config: {path}"))?,
        _ => serde_yaml_ng::from_str(&source)
            .with_context(|| format!("Invalid YAML config: {path}"))?,
    };
    config
        .validate()
        .with_context(|| format!("Invalid config: {path}"))?;
    Ok(config)
}

/// Load recorded calibration experiments.
pub fn load_calibration_data(path: &str) -> Result<CalibrationData> {
    let source = read_source(path)?;
    serde_json::from_str(&source).with_context(|| format!("Invalid calibration data: {path}"))
}

/// Load a persisted calibration matrix.
pub fn load_matrix(path: &str) -> Result<CalibrationMatrix> {
    let source = read_source(path)?;
    CalibrationMatrix::from_json(&source)
        .with_context(|| format!("Invalid calibration matrix: {path}"))
}

/// Load an outcome-count table.
pub fn load_counts(path: &str) -> Result<OutcomeCounts> {
    let source = read_source(path)?;
    serde_json::from_str(&source).with_context(|| format!("Invalid counts file: {path}"))
}

/// Write `contents` to `path`, creating parent directories as needed.
pub fn write_file(path: &str, contents: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }
    fs::write(path, contents).with_context(|| format!("Failed to write file: {path}"))
}

/// Counts as a label-ordered map, for stable JSON output.
pub fn ordered_counts(counts: &OutcomeCounts) -> BTreeMap<&str, u64> {
    counts.iter().map(|(k, &v)| (k.as_str(), v)).collect()
}

/// Print counts as a histogram.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn print_counts(title: &str, counts: &OutcomeCounts) {
    use console::style;

    println!(
        "\n{} {} ({} shots):",
        style("✓").green().bold(),
        title,
        counts.total_shots()
    );

    let sorted = counts.sorted();
    let total = counts.total_shots().max(1) as f64;

    for (bitstring, count) in sorted.iter().take(16) {
        let prob = **count as f64 / total * 100.0;
        let bar_len = (prob / 2.0).round() as usize;
        let bar: String = "█".repeat(bar_len);

        println!(
            "  {}: {:>6} ({:>5.2}%) {}",
            style(bitstring).cyan(),
            count,
            prob,
            style(bar).green()
        );
    }

    if sorted.len() > 16 {
        println!("  ... and {} more outcomes", sorted.len() - 16);
    }
}
