//! Library Manifest
//!
//! Describes every third-party library forge knows how to build: where its
//! source comes from, how it is built, what it depends on and which
//! platforms/link types it supports.

use crate::options::BuildOptions;
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Where a library's source comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Version control clone (git)
    Git,
    /// Downloaded archive (.tar.gz, .tgz, .tar, .zip)
    Archive,
    /// Local directory copy
    Local,
}

impl SourceKind {
    /// Name as written in the manifest
    pub fn name(&self) -> &'static str {
        match self {
            Self::Git => "git",
            Self::Archive => "archive",
            Self::Local => "local",
        }
    }
}

/// A file or directory overlaid onto the fetched source tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyFile {
    /// Source path (relative to the manifest directory)
    pub src: PathBuf,
    /// Destination path (relative to the source tree)
    pub dest: PathBuf,
}

/// Source descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSpec {
    /// Source kind
    #[serde(rename = "type")]
    pub kind: SourceKind,

    /// Repository URL (git) or archive URL (archive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Tag, branch or commit id (git)
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    /// Fetch only the history needed for `ref`
    #[serde(default = "default_shallow")]
    pub shallow: bool,

    /// Explicit archive URL (takes precedence over `url` for archives)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_url: Option<String>,

    /// Local directory (relative paths resolve against the manifest directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,

    /// Patch applied after fetching (relative to the manifest directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<PathBuf>,

    /// Files overlaid after fetching
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub copy_files: Vec<CopyFile>,

    /// Subdirectory of the fetched tree that holds the buildable project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_subdir: Option<PathBuf>,
}

fn default_shallow() -> bool {
    true
}

impl SourceSpec {
    fn with_kind(kind: SourceKind) -> Self {
        Self {
            kind,
            url: None,
            reference: None,
            shallow: true,
            archive_url: None,
            local_path: None,
            patch: None,
            copy_files: Vec::new(),
            source_subdir: None,
        }
    }

    /// Create a git source
    pub fn git(url: impl Into<String>, reference: impl Into<String>) -> Self {
        let mut spec = Self::with_kind(SourceKind::Git);
        spec.url = Some(url.into());
        spec.reference = Some(reference.into());
        spec
    }

    /// Create an archive source
    pub fn archive(url: impl Into<String>) -> Self {
        let mut spec = Self::with_kind(SourceKind::Archive);
        spec.archive_url = Some(url.into());
        spec
    }

    /// Create a local directory source
    pub fn local(path: impl Into<PathBuf>) -> Self {
        let mut spec = Self::with_kind(SourceKind::Local);
        spec.local_path = Some(path.into());
        spec
    }

    /// Set shallow fetching
    pub fn with_shallow(mut self, shallow: bool) -> Self {
        self.shallow = shallow;
        self
    }

    /// Set the patch file
    pub fn with_patch(mut self, patch: impl Into<PathBuf>) -> Self {
        self.patch = Some(patch.into());
        self
    }

    /// Add an overlay file
    pub fn with_copy_file(mut self, src: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        self.copy_files.push(CopyFile {
            src: src.into(),
            dest: dest.into(),
        });
        self
    }

    /// Set the source subdirectory
    pub fn with_source_subdir(mut self, subdir: impl Into<PathBuf>) -> Self {
        self.source_subdir = Some(subdir.into());
        self
    }

    /// URL to download for archive sources
    pub fn archive_location(&self) -> Option<&str> {
        self.archive_url.as_deref().or(self.url.as_deref())
    }

    /// Validate that the fields required by `kind` are present
    pub fn validate(&self, library: &str) -> ConfigResult<()> {
        let missing = |field: &str| ConfigError::InvalidValue {
            field: format!("{}.source.{}", library, field),
            reason: format!("required for {} sources", self.kind.name()),
        };

        match self.kind {
            SourceKind::Git => {
                if self.url.as_deref().is_none_or(str::is_empty) {
                    return Err(missing("url"));
                }
            }
            SourceKind::Archive => {
                if self.archive_location().is_none_or(str::is_empty) {
                    return Err(missing("archive_url"));
                }
            }
            SourceKind::Local => {
                if self.local_path.is_none() {
                    return Err(missing("local_path"));
                }
            }
        }

        Ok(())
    }
}

/// Build system used for a library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildSystem {
    Cmake,
    HeaderOnly,
    Script,
}

impl BuildSystem {
    /// Name as written in the manifest
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cmake => "cmake",
            Self::HeaderOnly => "header_only",
            Self::Script => "script",
        }
    }
}

impl std::fmt::Display for BuildSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Build descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSpec {
    /// Build system
    #[serde(default = "default_system")]
    pub system: BuildSystem,

    /// Options for every configuration
    #[serde(default)]
    pub options: BuildOptions,

    /// Options for static builds only
    #[serde(default)]
    pub options_static: BuildOptions,

    /// Options for shared builds only
    #[serde(default)]
    pub options_shared: BuildOptions,

    /// Options for debug builds only
    #[serde(default)]
    pub options_debug: BuildOptions,

    /// Options for release builds only
    #[serde(default)]
    pub options_release: BuildOptions,

    /// Shell script for `script` builds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

fn default_system() -> BuildSystem {
    BuildSystem::Cmake
}

impl Default for BuildSpec {
    fn default() -> Self {
        Self {
            system: default_system(),
            options: BuildOptions::new(),
            options_static: BuildOptions::new(),
            options_shared: BuildOptions::new(),
            options_debug: BuildOptions::new(),
            options_release: BuildOptions::new(),
            script: None,
        }
    }
}

impl BuildSpec {
    /// Merge common, link-type and config options (later wins)
    ///
    /// `link_type` is `static` or `shared`, `config` is `debug` or `release`.
    pub fn merged_options(&self, link_type: &str, config: &str) -> BuildOptions {
        let mut merged = self.options.clone();

        let link_options = match link_type {
            "static" => Some(&self.options_static),
            "shared" => Some(&self.options_shared),
            _ => None,
        };
        let config_options = match config {
            "debug" => Some(&self.options_debug),
            "release" => Some(&self.options_release),
            _ => None,
        };

        for extra in [link_options, config_options].into_iter().flatten() {
            for (key, value) in extra {
                merged.insert(key.clone(), value.clone());
            }
        }

        merged
    }
}

/// A library description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LibraryConfig {
    /// Library name (the manifest key)
    #[serde(skip)]
    pub name: String,

    /// Library version
    pub version: String,

    /// Human readable description
    #[serde(default)]
    pub description: String,

    /// Source descriptor
    pub source: SourceSpec,

    /// Build descriptor
    #[serde(default)]
    pub build: BuildSpec,

    /// Names of libraries this one depends on
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Supported platforms (OS names); empty means all
    #[serde(default)]
    pub platforms: Vec<String>,

    /// Supported link types; empty means all
    #[serde(default)]
    pub link_types: Vec<String>,

    /// Only built on request
    #[serde(default)]
    pub optional: bool,

    /// Optional group this library belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional_group: Option<String>,
}

impl LibraryConfig {
    /// Create a new library with default build settings
    pub fn new(name: impl Into<String>, version: impl Into<String>, source: SourceSpec) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            source,
            build: BuildSpec::default(),
            dependencies: Vec::new(),
            platforms: Vec::new(),
            link_types: Vec::new(),
            optional: false,
            optional_group: None,
        }
    }

    /// Set dependencies
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Set the build descriptor
    pub fn with_build(mut self, build: BuildSpec) -> Self {
        self.build = build;
        self
    }

    /// Set the build system
    pub fn with_system(mut self, system: BuildSystem) -> Self {
        self.build.system = system;
        self
    }

    /// Restrict supported platforms
    pub fn with_platforms(mut self, platforms: Vec<String>) -> Self {
        self.platforms = platforms;
        self
    }

    /// Restrict supported link types
    pub fn with_link_types(mut self, link_types: Vec<String>) -> Self {
        self.link_types = link_types;
        self
    }

    /// Mark optional, optionally inside a group
    pub fn with_optional(mut self, group: Option<String>) -> Self {
        self.optional = true;
        self.optional_group = group;
        self
    }

    /// Whether this library can be built for the given OS
    pub fn supports_platform(&self, os: &str) -> bool {
        self.platforms.is_empty() || self.platforms.iter().any(|p| p == os)
    }

    /// Whether this library can be built with the given link type
    pub fn supports_link_type(&self, link_type: &str) -> bool {
        self.link_types.is_empty() || self.link_types.iter().any(|l| l == link_type)
    }
}

/// Which libraries to build
#[derive(Debug, Clone, Default)]
pub struct LibrarySelection {
    /// Optional libraries to include by name
    pub with_libs: Vec<String>,
    /// Optional groups to include
    pub with_groups: Vec<String>,
    /// Include every library
    pub build_all: bool,
    /// Keep only libraries supporting at least one of these OS names
    pub platforms: Option<Vec<String>>,
}

/// The library manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Libraries by name
    #[serde(default)]
    pub libraries: BTreeMap<String, LibraryConfig>,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Manifest {
    /// Load a manifest from a YAML file
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Self::parse(&content, path, base_dir)
    }

    /// Parse a manifest from YAML text
    pub fn from_yaml_str(content: &str, base_dir: impl Into<PathBuf>) -> ConfigResult<Self> {
        Self::parse(content, Path::new("<inline>"), base_dir.into())
    }

    fn parse(content: &str, file: &Path, base_dir: PathBuf) -> ConfigResult<Self> {
        let mut manifest: Self =
            serde_yaml::from_str(content).map_err(|e| ConfigError::YamlParseError {
                file: file.to_path_buf(),
                error: e,
            })?;

        for (name, library) in manifest.libraries.iter_mut() {
            library.name = name.clone();
        }
        manifest.base_dir = base_dir;

        manifest.validate()?;
        Ok(manifest)
    }

    /// Build a manifest from library configs
    pub fn from_libraries(
        libraries: impl IntoIterator<Item = LibraryConfig>,
        base_dir: impl Into<PathBuf>,
    ) -> ConfigResult<Self> {
        let manifest = Self {
            libraries: libraries
                .into_iter()
                .map(|lib| (lib.name.clone(), lib))
                .collect(),
            base_dir: base_dir.into(),
        };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate field presence and dependency references
    ///
    /// Cycles are detected when the dependency graph is built.
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, library) in &self.libraries {
            if library.version.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}.version", name),
                    reason: "version cannot be empty".to_string(),
                });
            }

            library.source.validate(name)?;

            if library.build.system == BuildSystem::Script && library.build.script.is_none() {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}.build.script", name),
                    reason: "required for script builds".to_string(),
                });
            }

            for dependency in &library.dependencies {
                if !self.libraries.contains_key(dependency) {
                    return Err(ConfigError::UnknownDependency {
                        library: name.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Get a library by name
    pub fn library(&self, name: &str) -> ConfigResult<&LibraryConfig> {
        self.libraries
            .get(name)
            .ok_or_else(|| ConfigError::UnknownLibrary(name.to_string()))
    }

    /// Optional libraries by name
    pub fn optional_libraries(&self) -> BTreeMap<&str, &LibraryConfig> {
        self.libraries
            .iter()
            .filter(|(_, lib)| lib.optional)
            .map(|(name, lib)| (name.as_str(), lib))
            .collect()
    }

    /// Optional groups (group -> sorted member names)
    pub fn optional_groups(&self) -> BTreeMap<String, Vec<String>> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, library) in &self.libraries {
            if let Some(group) = &library.optional_group {
                groups.entry(group.clone()).or_default().push(name.clone());
            }
        }
        groups
    }

    /// Select libraries to build, closed over dependencies
    pub fn filter_libraries(
        &self,
        selection: &LibrarySelection,
    ) -> ConfigResult<BTreeMap<String, LibraryConfig>> {
        let mut chosen: BTreeSet<String> = BTreeSet::new();

        if selection.build_all {
            chosen.extend(self.libraries.keys().cloned());
        } else {
            chosen.extend(
                self.libraries
                    .iter()
                    .filter(|(_, lib)| !lib.optional)
                    .map(|(name, _)| name.clone()),
            );

            for name in &selection.with_libs {
                self.library(name)?;
                chosen.insert(name.clone());
            }

            let groups = self.optional_groups();
            for group in &selection.with_groups {
                let members = groups
                    .get(group)
                    .ok_or_else(|| ConfigError::UnknownGroup(group.clone()))?;
                chosen.extend(members.iter().cloned());
            }
        }

        if let Some(platforms) = &selection.platforms {
            chosen.retain(|name| {
                self.libraries
                    .get(name)
                    .is_some_and(|lib| platforms.iter().any(|p| lib.supports_platform(p)))
            });
        }

        let roots: Vec<String> = chosen.into_iter().collect();
        self.with_dependencies(&roots)
    }

    /// The named libraries plus all of their transitive dependencies
    pub fn with_dependencies(
        &self,
        names: &[String],
    ) -> ConfigResult<BTreeMap<String, LibraryConfig>> {
        let mut selected = BTreeMap::new();
        let mut stack: Vec<String> = names.to_vec();

        while let Some(name) = stack.pop() {
            if selected.contains_key(&name) {
                continue;
            }
            let library = self.library(&name)?;
            stack.extend(library.dependencies.iter().cloned());
            selected.insert(name, library.clone());
        }

        Ok(selected)
    }

    /// Resolve a manifest-relative path
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}
