//! # lumen-cli - Command-line front end for lumen-core
//!
//! Reads detector payloads from JSON files, runs the explanation handlers and
//! prints JSON. Also ships a seeded synthetic building-sensor generator for
//! demos and end-to-end tests.

pub mod commands;
pub mod synth;

pub use commands::CommandOutput;
pub use synth::{BuildingGenerator, InjectedAnomaly, SynthConfig};
