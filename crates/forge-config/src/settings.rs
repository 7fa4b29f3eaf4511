//! Tool settings
//!
//! Directory roots and parallelism defaults, loaded from the global
//! settings file, the project `forge.toml` and `FORGE_*` environment
//! variables. CLI flags are applied last by the caller.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Default install root (relative to the working directory)
pub const DEFAULT_INSTALL_DIR: &str = "forge_install_thirdparty";
/// Default source cache root (relative to the working directory)
pub const DEFAULT_SOURCE_DIR: &str = "forge_source_thirdparty";
/// Default build root (relative to the working directory)
pub const DEFAULT_BUILD_DIR: &str = "forge_build_thirdparty";

/// Project settings file name
pub const PROJECT_SETTINGS_FILE: &str = "forge.toml";

/// Settings as written in a settings file; every field optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForgeSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_dir: Option<PathBuf>,

    /// Maximum concurrent build jobs (0 = CPU count)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,

    /// Compile jobs handed to each library build (0 = auto)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs_per_lib: Option<usize>,

    /// Copy CMake/pkg-config files into the install root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_cmake_configs: Option<bool>,
}

impl ForgeSettings {
    /// Load settings from a TOML file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })
    }

    /// Overlay `other` on top of `self` (fields set in `other` win)
    pub fn merge(self, other: ForgeSettings) -> ForgeSettings {
        ForgeSettings {
            install_dir: other.install_dir.or(self.install_dir),
            source_dir: other.source_dir.or(self.source_dir),
            build_dir: other.build_dir.or(self.build_dir),
            max_parallel: other.max_parallel.or(self.max_parallel),
            jobs_per_lib: other.jobs_per_lib.or(self.jobs_per_lib),
            include_cmake_configs: other.include_cmake_configs.or(self.include_cmake_configs),
        }
    }

    /// Fill unset fields with defaults, resolving relative paths against `cwd`
    pub fn resolve(&self, cwd: &Path) -> ResolvedSettings {
        let dir = |value: &Option<PathBuf>, default: &str| {
            let path = value.clone().unwrap_or_else(|| PathBuf::from(default));
            if path.is_absolute() {
                path
            } else {
                cwd.join(path)
            }
        };

        ResolvedSettings {
            install_dir: dir(&self.install_dir, DEFAULT_INSTALL_DIR),
            source_dir: dir(&self.source_dir, DEFAULT_SOURCE_DIR),
            build_dir: dir(&self.build_dir, DEFAULT_BUILD_DIR),
            max_parallel: self.max_parallel.unwrap_or(0),
            jobs_per_lib: self.jobs_per_lib.unwrap_or(0),
            include_cmake_configs: self.include_cmake_configs.unwrap_or(false),
        }
    }
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSettings {
    pub install_dir: PathBuf,
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub max_parallel: usize,
    pub jobs_per_lib: usize,
    pub include_cmake_configs: bool,
}

/// Settings loader
///
/// Precedence: global file < project file < environment.
#[derive(Debug, Default)]
pub struct SettingsLoader {
    global_path: Option<PathBuf>,
}

impl SettingsLoader {
    /// Create a loader using `~/.forge/config.toml` as the global file
    pub fn new() -> Self {
        Self { global_path: None }
    }

    /// Use an explicit global settings file
    pub fn with_global_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_path = Some(path.into());
        self
    }

    /// Default global settings path
    pub fn default_global_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".forge").join("config.toml"))
    }

    /// Load and merge settings for a project directory
    pub fn load(&self, project_dir: &Path) -> ConfigResult<ForgeSettings> {
        let global_path = match &self.global_path {
            Some(path) => Some(path.clone()),
            None => Self::default_global_path().ok(),
        };

        let mut settings = ForgeSettings::default();

        if let Some(path) = global_path.filter(|p| p.exists()) {
            settings = settings.merge(ForgeSettings::load_from_file(&path)?);
        }

        let project_path = project_dir.join(PROJECT_SETTINGS_FILE);
        if project_path.exists() {
            settings = settings.merge(ForgeSettings::load_from_file(&project_path)?);
        }

        Ok(settings.merge(env_overrides()?))
    }
}

/// Settings taken from `FORGE_*` environment variables
pub fn env_overrides() -> ConfigResult<ForgeSettings> {
    Ok(ForgeSettings {
        install_dir: env::var_os("FORGE_INSTALL_DIR").map(PathBuf::from),
        source_dir: env::var_os("FORGE_SOURCE_DIR").map(PathBuf::from),
        build_dir: env::var_os("FORGE_BUILD_DIR").map(PathBuf::from),
        max_parallel: parse_env_usize("FORGE_MAX_PARALLEL")?,
        jobs_per_lib: parse_env_usize("FORGE_JOBS_PER_LIB")?,
        include_cmake_configs: None,
    })
}

fn parse_env_usize(name: &str) -> ConfigResult<Option<usize>> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                field: name.to_string(),
                reason: format!("expected a non-negative integer, got '{}'", value),
            }),
        Err(_) => Ok(None),
    }
}
