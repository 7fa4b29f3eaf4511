//! Build targets
//!
//! A target is one (OS, arch, config, link type, toolset) combination. Its
//! path component (`macos_arm64_static_debug`, `windows_x86_64_vc143_shared`)
//! names the per-target build and library directories; its platform component
//! (the OS name) names the shared header directory.

use crate::error::{BuildError, BuildResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Toolset used for Windows targets when none is given
pub const DEFAULT_WINDOWS_TOOLSET: &str = "vc143";

/// Target operating system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Macos,
    Ios,
    Linux,
    Android,
    Windows,
}

impl Os {
    /// All operating systems
    pub fn all() -> [Os; 5] {
        [Self::Macos, Self::Ios, Self::Linux, Self::Android, Self::Windows]
    }

    /// Get OS name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Macos => "macos",
            Self::Ios => "ios",
            Self::Linux => "linux",
            Self::Android => "android",
            Self::Windows => "windows",
        }
    }

    /// Whether shared library builds are supported
    pub fn supports_shared(&self) -> bool {
        !matches!(self, Self::Ios | Self::Android)
    }

    /// Whether install names need rewriting for shared libraries
    pub fn is_apple(&self) -> bool {
        matches!(self, Self::Macos | Self::Ios)
    }

    /// Detect the host operating system
    pub fn host() -> BuildResult<Self> {
        match std::env::consts::OS {
            "macos" => Ok(Self::Macos),
            "linux" => Ok(Self::Linux),
            "windows" => Ok(Self::Windows),
            other => Err(BuildError::InvalidTarget(format!(
                "unsupported host OS: {}",
                other
            ))),
        }
    }
}

impl FromStr for Os {
    type Err = BuildError;

    fn from_str(s: &str) -> BuildResult<Self> {
        Self::all()
            .into_iter()
            .find(|os| os.name() == s.to_lowercase())
            .ok_or_else(|| BuildError::InvalidTarget(format!("unknown OS: {}", s)))
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Target CPU architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
    Arm64,
    X86_64,
    Armv7,
    X86,
}

impl Arch {
    /// All architectures; longer names first so prefix matching is unambiguous
    pub fn all() -> [Arch; 4] {
        [Self::X86_64, Self::Arm64, Self::Armv7, Self::X86]
    }

    /// Get architecture name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Arm64 => "arm64",
            Self::X86_64 => "x86_64",
            Self::Armv7 => "armv7",
            Self::X86 => "x86",
        }
    }

    /// Detect the host architecture
    pub fn host() -> BuildResult<Self> {
        match std::env::consts::ARCH {
            "aarch64" => Ok(Self::Arm64),
            "x86_64" => Ok(Self::X86_64),
            "arm" => Ok(Self::Armv7),
            "x86" => Ok(Self::X86),
            other => Err(BuildError::InvalidTarget(format!(
                "unsupported host architecture: {}",
                other
            ))),
        }
    }
}

impl FromStr for Arch {
    type Err = BuildError;

    fn from_str(s: &str) -> BuildResult<Self> {
        let lower = s.to_lowercase();
        match lower.as_str() {
            "aarch64" => return Ok(Self::Arm64),
            "amd64" | "x64" => return Ok(Self::X86_64),
            _ => {}
        }
        Self::all()
            .into_iter()
            .find(|arch| arch.name() == lower)
            .ok_or_else(|| BuildError::InvalidTarget(format!("unknown architecture: {}", s)))
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildConfig {
    Debug,
    Release,
}

impl BuildConfig {
    /// Get config name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }
}

impl FromStr for BuildConfig {
    type Err = BuildError;

    fn from_str(s: &str) -> BuildResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "release" => Ok(Self::Release),
            other => Err(BuildError::InvalidTarget(format!("unknown config: {}", other))),
        }
    }
}

impl fmt::Display for BuildConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Library link type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Static,
    Shared,
}

impl LinkType {
    /// Get link type name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Shared => "shared",
        }
    }
}

impl FromStr for LinkType {
    type Err = BuildError;

    fn from_str(s: &str) -> BuildResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "shared" => Ok(Self::Shared),
            other => Err(BuildError::InvalidTarget(format!(
                "unknown link type: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One build configuration of a library
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildTarget {
    pub os: Os,
    pub arch: Arch,
    pub config: BuildConfig,
    pub link: LinkType,
    /// Compiler toolset tag (Windows only, e.g. `vc143`)
    pub toolset: Option<String>,
}

impl BuildTarget {
    /// Create a target; Windows targets get the default toolset
    pub fn new(os: Os, arch: Arch, config: BuildConfig, link: LinkType) -> Self {
        let toolset = (os == Os::Windows).then(|| DEFAULT_WINDOWS_TOOLSET.to_string());
        Self {
            os,
            arch,
            config,
            link,
            toolset,
        }
    }

    /// Set the toolset (ignored for non-Windows targets)
    pub fn with_toolset(mut self, toolset: impl Into<String>) -> Self {
        if self.os == Os::Windows {
            self.toolset = Some(toolset.into());
        }
        self
    }

    /// Directory name for per-target outputs
    pub fn path_component(&self) -> String {
        let mut parts = vec![self.os.name(), self.arch.name()];
        if let Some(toolset) = &self.toolset {
            parts.push(toolset);
        }
        parts.push(self.link.name());
        if self.is_debug() {
            parts.push("debug");
        }
        parts.join("_")
    }

    /// Directory name for headers (OS only)
    pub fn platform_component(&self) -> &'static str {
        self.os.name()
    }

    pub fn is_debug(&self) -> bool {
        self.config == BuildConfig::Debug
    }

    pub fn is_shared(&self) -> bool {
        self.link == LinkType::Shared
    }

    /// Expand platforms × configs × link types, dropping shared builds for
    /// operating systems that do not support them
    pub fn expand(
        platforms: &[(Os, Arch)],
        configs: &[BuildConfig],
        links: &[LinkType],
        toolset: Option<&str>,
    ) -> Vec<BuildTarget> {
        let mut targets = Vec::new();
        for &(os, arch) in platforms {
            for &config in configs {
                for &link in links {
                    if link == LinkType::Shared && !os.supports_shared() {
                        continue;
                    }
                    let mut target = BuildTarget::new(os, arch, config, link);
                    if let Some(toolset) = toolset {
                        target = target.with_toolset(toolset);
                    }
                    targets.push(target);
                }
            }
        }
        targets
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path_component())
    }
}

impl FromStr for BuildTarget {
    type Err = BuildError;

    /// Parse `os_arch[_toolset]_link[_debug|_release]`
    fn from_str(s: &str) -> BuildResult<Self> {
        let invalid = || {
            BuildError::InvalidTarget(format!(
                "{} (expected os_arch[_toolset]_link[_debug])",
                s
            ))
        };

        let lower = s.to_lowercase();
        let (os_part, rest) = lower.split_once('_').ok_or_else(invalid)?;
        let os: Os = os_part.parse()?;

        let arch = Arch::all()
            .into_iter()
            .find(|arch| {
                rest.strip_prefix(arch.name())
                    .is_some_and(|tail| tail.starts_with('_'))
            })
            .ok_or_else(invalid)?;
        let mut parts = rest[arch.name().len() + 1..].split('_').peekable();

        let mut toolset = None;
        if parts.peek().is_some_and(|p| p.starts_with("vc")) {
            toolset = parts.next().map(str::to_string);
        }

        let link: LinkType = parts.next().ok_or_else(invalid)?.parse()?;
        let config = match parts.next() {
            None => BuildConfig::Release,
            Some(config) => config.parse()?,
        };
        if parts.next().is_some() {
            return Err(invalid());
        }

        let mut target = BuildTarget::new(os, arch, config, link);
        if let Some(toolset) = toolset {
            target = target.with_toolset(toolset);
        }
        Ok(target)
    }
}

/// Parse an `os_arch` platform string (`ios_arm64`, `android_x86_64`)
pub fn parse_platform(s: &str) -> BuildResult<(Os, Arch)> {
    let lower = s.trim().to_lowercase();
    let (os, arch) = lower.split_once('_').ok_or_else(|| {
        BuildError::InvalidTarget(format!("{} (expected os_arch, e.g. ios_arm64)", s))
    })?;
    Ok((os.parse()?, arch.parse()?))
}

/// Platforms built when none are requested: iOS plus the host on macOS,
/// the host elsewhere
pub fn default_platforms() -> BuildResult<Vec<(Os, Arch)>> {
    let os = Os::host()?;
    let arch = Arch::host()?;
    if os == Os::Macos {
        Ok(vec![(Os::Ios, Arch::Arm64), (Os::Macos, arch)])
    } else {
        Ok(vec![(os, arch)])
    }
}

/// Link types built when none are requested
pub fn default_link_types() -> Vec<LinkType> {
    if cfg!(windows) {
        vec![LinkType::Static, LinkType::Shared]
    } else {
        vec![LinkType::Static]
    }
}
