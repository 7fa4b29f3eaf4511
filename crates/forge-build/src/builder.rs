//! Builder contract
//!
//! A builder turns a fetched source tree into a raw install tree for one
//! target. The orchestrator calls `configure`, `build` and `install` in
//! order through a [`BuildContext`].

use crate::builders::{CmakeBuilder, HeaderOnlyBuilder, ScriptBuilder};
use crate::error::{BuildError, BuildResult};
use crate::process::ProcessRunner;
use crate::target::BuildTarget;
use forge_config::{BuildOptions, BuildSystem};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a builder needs for one (library, target) job
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Library name
    pub library_name: String,
    /// Library version
    pub version: String,
    /// Source tree (already scoped to `source_subdir`)
    pub source_dir: PathBuf,
    /// Scratch build directory
    pub build_dir: PathBuf,
    /// Raw install directory
    pub install_dir: PathBuf,
    /// Build target
    pub target: BuildTarget,
    /// Raw install directories of dependencies, by name
    pub dependency_dirs: BTreeMap<String, PathBuf>,
    /// Merged build options
    pub build_options: BuildOptions,
    /// Shell script for script builds
    pub script: Option<String>,
    /// Compile parallelism hint
    pub jobs: usize,
    /// Log file receiving tool output
    pub log_file: PathBuf,
}

impl BuildContext {
    /// Process runner appending to this job's log
    pub fn runner(&self) -> ProcessRunner {
        ProcessRunner::new().with_log_file(&self.log_file)
    }
}

/// Build phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Configure,
    Build,
    Install,
}

impl BuildPhase {
    /// Phases in execution order
    pub const ALL: [BuildPhase; 3] = [Self::Configure, Self::Build, Self::Install];

    /// Run this phase of `builder`
    pub fn run(&self, builder: &dyn Builder, ctx: &BuildContext) -> BuildResult<()> {
        match self {
            Self::Configure => builder.configure(ctx),
            Self::Build => builder.build(ctx),
            Self::Install => builder.install(ctx),
        }
    }

    /// Get phase name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::Build => "build",
            Self::Install => "install",
        }
    }
}

/// Build system adapter
pub trait Builder: Send + Sync {
    /// Prepare the build directory
    fn configure(&self, ctx: &BuildContext) -> BuildResult<()>;

    /// Compile
    fn build(&self, ctx: &BuildContext) -> BuildResult<()>;

    /// Populate `ctx.install_dir`
    fn install(&self, ctx: &BuildContext) -> BuildResult<()>;
}

/// Builders by build system
#[derive(Clone)]
pub struct BuilderRegistry {
    builders: HashMap<BuildSystem, Arc<dyn Builder>>,
}

impl BuilderRegistry {
    /// Create an empty registry
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Register (or replace) the builder for a build system
    pub fn with_builder(mut self, system: BuildSystem, builder: Arc<dyn Builder>) -> Self {
        self.builders.insert(system, builder);
        self
    }

    /// Look up the builder for a build system
    pub fn get(&self, system: BuildSystem) -> BuildResult<Arc<dyn Builder>> {
        self.builders
            .get(&system)
            .cloned()
            .ok_or_else(|| BuildError::NoBuilder(system.name().to_string()))
    }
}

impl Default for BuilderRegistry {
    fn default() -> Self {
        Self::empty()
            .with_builder(BuildSystem::Cmake, Arc::new(CmakeBuilder))
            .with_builder(BuildSystem::HeaderOnly, Arc::new(HeaderOnlyBuilder))
            .with_builder(BuildSystem::Script, Arc::new(ScriptBuilder))
    }
}
