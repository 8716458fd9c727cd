//! Configuration module for the backup store
//!
//! This module provides configuration management including:
//! - XDG-compliant path resolution
//! - Settings persistence (retention rules, alert threshold)

pub mod paths;
pub mod settings;

pub use paths::StorePaths;
pub use settings::Settings;
