//! Schema module - Configuration types for the coevolution engine.

mod config;

pub use config::*;
