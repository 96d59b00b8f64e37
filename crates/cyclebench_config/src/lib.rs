//! Parsing and validation of `cyclebench.toml` run configuration files.
//!
//! This crate reads the run configuration file and produces a strongly-typed
//! [`RunConfig`] with defaults filled in, relative paths anchored to the file's
//! directory, and sentinel, clock and memory settings checked for consistency.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, validate_config, CONFIG_FILE_NAME};
pub use resolve::resolve_paths;
pub use types::*;
