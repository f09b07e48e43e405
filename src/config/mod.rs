//! Warden Configuration Module
//!
//! Provides every interval, probe endpoint, repair path and management
//! command as an operator-tunable TOML value.
//!
//! ## Loading Order
//!
//! 1. `DEPWARDEN_CONFIG` environment variable (path to TOML file)
//! 2. `depwarden.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! The config is loaded once in `main` and handed to each service
//! constructor; nothing reads it through a global.
//!
//! ```ignore
//! let config = WardenConfig::load();
//! let threshold = config.monitor.failure_threshold;
//! ```

mod warden_config;
pub mod defaults;
pub mod validation;

pub use warden_config::*;
