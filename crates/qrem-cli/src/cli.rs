//! Command-line arguments.

use clap::{Parser, Subcommand};

/// qrem - readout error mitigation for quantum measurement results
#[derive(Debug, Parser)]
#[command(name = "qrem")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate calibration data from a simulated noisy readout channel
    Simulate {
        /// Register width
        #[arg(short, long)]
        qubits: usize,

        /// P(read 1 | prepared 0)
        #[arg(long, default_value = "0.02")]
        p01: f64,

        /// P(read 0 | prepared 1)
        #[arg(long, default_value = "0.05")]
        p10: f64,

        /// Shots per preparation
        #[arg(short, long, default_value = "8192")]
        shots: u64,

        /// RNG seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Output file (JSON)
        #[arg(short, long)]
        output: String,
    },

    /// Build a calibration matrix from recorded preparations
    Calibrate {
        /// Calibration data file (JSON)
        #[arg(short, long)]
        input: String,

        /// Output file for the calibration matrix (JSON)
        #[arg(short, long)]
        output: String,

        /// Drop unknown outcome labels instead of failing
        #[arg(long)]
        lenient: bool,

        /// Mitigation config (YAML or JSON)
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Mitigate measured counts with a stored calibration matrix
    Mitigate {
        /// Calibration matrix file (JSON)
        #[arg(short, long)]
        matrix: String,

        /// Noisy counts file (JSON object of bit-string to count)
        #[arg(long)]
        counts: String,

        /// Correction mode (pseudo-inverse, constrained)
        #[arg(long)]
        mode: Option<String>,

        /// Mitigation config (YAML or JSON)
        #[arg(short, long)]
        config: Option<String>,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Show version information
    Version,
}
