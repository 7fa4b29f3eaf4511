//! Forge configuration
//!
//! Provides the inputs of a forge run:
//! - Library manifest (`dependencies.yaml`) describing every third-party library
//! - Library selection (required, optional, groups, explicit subsets)
//! - Tool settings (`~/.forge/config.toml`, `./forge.toml`, `FORGE_*` env)
//!
//! # Settings Hierarchy
//!
//! Settings are merged in the following order (later overrides earlier):
//! 1. Global settings (~/.forge/config.toml)
//! 2. Project settings (./forge.toml)
//! 3. Environment variables (FORGE_*)
//! 4. CLI flags
//!
//! # Example
//!
//! ```no_run
//! use forge_config::Manifest;
//! use std::path::Path;
//!
//! let manifest = Manifest::from_file(Path::new("dependencies.yaml")).unwrap();
//! println!("{} libraries", manifest.libraries.len());
//! ```

pub mod manifest;
pub mod options;
pub mod settings;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid YAML in {file}: {error}")]
    YamlParseError {
        file: PathBuf,
        error: serde_yaml::Error,
    },

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Library '{library}' depends on unknown library '{dependency}'")]
    UnknownDependency { library: String, dependency: String },

    #[error("Unknown library: {0}")]
    UnknownLibrary(String),

    #[error("Unknown optional group: {0}")]
    UnknownGroup(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use manifest::{
    BuildSpec, BuildSystem, CopyFile, LibraryConfig, LibrarySelection, Manifest, SourceKind,
    SourceSpec,
};
pub use options::{BuildOptions, OptionValue};
pub use settings::{ForgeSettings, ResolvedSettings, SettingsLoader};
