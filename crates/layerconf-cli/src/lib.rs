//! layerconf CLI library
//!
//! Exposes the CLI entry point so other binaries can embed the same commands.

mod cli;

pub use cli::run;
