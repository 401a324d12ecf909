//! Library half of the `qrem` binary: argument definitions and command
//! implementations, kept out of `main.rs` so they can be tested directly.

pub mod cli;
pub mod commands;
