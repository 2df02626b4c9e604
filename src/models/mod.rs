//! Core data models for handsweep.
//!
//! - `space`: DOFs, ranges and the parameter space swept per run
//! - `sample`: sample payloads, run counters and summaries
//! - `config`: TOML configuration
//! - `error`: error taxonomy

mod config;
mod error;
mod sample;
mod space;

pub use config::*;
pub use error::*;
pub use sample::*;
pub use space::*;
