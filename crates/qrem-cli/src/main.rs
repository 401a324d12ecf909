//! qrem command-line interface.
//!
//! ```text
//!   qrem simulate  --qubits 2 --output cal.json
//!   qrem calibrate --input cal.json --output matrix.json
//!   qrem mitigate  --matrix matrix.json --counts noisy.json
//! ```

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::Parser;
use console::style;
use tracing_subscriber::EnvFilter;

use qrem_cli::cli::{Cli, Commands};
use qrem_cli::commands::{calibrate, mitigate, simulate, version};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Simulate {
            qubits,
            p01,
            p10,
            shots,
            seed,
            output,
        } => simulate::execute(qubits, p01, p10, shots, seed, &output),

        Commands::Calibrate {
            input,
            output,
            lenient,
            config,
        } => calibrate::execute(&input, &output, lenient, config.as_deref()),

        Commands::Mitigate {
            matrix,
            counts,
            mode,
            config,
            format,
        } => mitigate::execute(
            &matrix,
            &counts,
            mode.as_deref(),
            config.as_deref(),
            &format,
        ),

        Commands::Version => {
            version::execute();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
