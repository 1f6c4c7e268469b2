//! Configuration management
//!
//! Settings are layered from built-in defaults, an optional `config.toml`
//! and `CCB_`-prefixed environment variables.

pub mod settings;
pub mod validation;

pub use settings::*;
