//! CLI configuration via environment variables

use std::env;

/// CLI configuration loaded from environment variables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    /// Log filter directives (FORGE_LOG=debug, FORGE_LOG=forge_build=trace)
    pub log_filter: Option<String>,
    /// Disable colored output (FORGE_NO_COLOR=1 or NO_COLOR=1)
    pub no_color: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            log_filter: lookup("FORGE_LOG").filter(|v| !v.trim().is_empty()),
            no_color: lookup("FORGE_NO_COLOR").is_some() || lookup("NO_COLOR").is_some(),
        }
    }

    /// Filter directives for the tracing subscriber; `-v` forces debug
    pub fn filter_directives(&self, verbose: bool) -> String {
        if verbose {
            return "debug".to_string();
        }
        self.log_filter.clone().unwrap_or_else(|| "info".to_string())
    }
}
