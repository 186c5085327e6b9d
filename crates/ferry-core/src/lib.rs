//! ferry-core — wire format, reassembly engine and configuration.
//! The other Ferry crates depend on this one.

pub mod config;
pub mod reassembly;
pub mod wire;

pub use config::FerryConfig;
pub use reassembly::{Action, ReassemblySession};
pub use wire::{Chunk, WireError, EOF_SENTINEL};
