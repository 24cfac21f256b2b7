//! Configuration management for the process logger.
//!
//! Provides environment detection, configuration loading from YAML files
//! and the shared logger configuration types.

mod environment;
mod load;
pub mod shared;

pub use environment::*;
pub use load::*;
pub use shared::*;
