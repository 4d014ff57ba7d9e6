//! Configuration module for the tracking daemon.
//!
//! Handles loading and validating configuration from TOML files.

mod settings;

pub use settings::*;
