//! Forge build orchestration
//!
//! Builds native third-party libraries for many targets at once:
//! - Build targets (OS, architecture, config, link type, toolset)
//! - Dependency graph with level decomposition
//! - Shared source cache with per-library locking and failure memoization
//! - Builder contract with header-only, script and CMake adapters
//! - Output reorganization into `h/<os>` and `lib/<target>`
//! - Locked, atomic build metadata
//! - Level-barrier parallel scheduling and timing statistics

pub mod builder;
pub mod builders;
pub mod dirs;
pub mod error;
pub mod fetch;
pub mod fsutil;
pub mod graph;
pub mod metadata;
pub mod orchestrator;
pub mod process;
pub mod reorganize;
pub mod stats;
pub mod target;

// Re-export main types
pub use builder::{BuildContext, BuildPhase, Builder, BuilderRegistry};
pub use builders::{CmakeBuilder, HeaderOnlyBuilder, ScriptBuilder};
pub use dirs::{BuildPaths, DirectoryManager};
pub use error::{BuildError, BuildResult};
pub use fetch::{DefaultBackend, SourceBackend, SourceFetcher};
pub use graph::{DependencyGraph, LibraryNode};
pub use metadata::{BuildMetadata, SourceInfo};
pub use orchestrator::{BuildJob, JobResult, Orchestrator, OrchestratorConfig};
pub use process::{ProcessOutput, ProcessRunner};
pub use reorganize::{normalize_debug_lib_name, Reorganizer};
pub use stats::{format_duration, BuildStats, LibraryStats};
pub use target::{Arch, BuildConfig, BuildTarget, LinkType, Os};

// Re-export forge-config types for convenience
pub use forge_config::{LibraryConfig, Manifest};
