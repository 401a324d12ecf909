//! Version command implementation.

use console::style;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - readout error mitigation",
        style("qrem").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Correction modes:");
    println!("  pseudo-inverse  Moore-Penrose inverse via truncated SVD (default)");
    println!("  constrained     Least squares on the probability simplex");
    println!();
    println!("License: {}", style(env!("CARGO_PKG_LICENSE")).dim());
}
