//! CLI command implementations.

pub mod calibrate;
pub mod common;
pub mod mitigate;
pub mod simulate;
pub mod version;
