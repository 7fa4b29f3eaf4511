//! Build orchestration
//!
//! Libraries are built level by level. Every job of a level, across all
//! targets, runs on a bounded worker pool and the whole level drains before
//! the next one starts, so a dependent never configures against a partially
//! built dependency.

use crate::builder::{BuildContext, BuildPhase, BuilderRegistry};
use crate::dirs::DirectoryManager;
use crate::error::{BuildError, BuildResult};
use crate::fetch::SourceFetcher;
use crate::graph::DependencyGraph;
use crate::metadata::SourceInfo;
use crate::reorganize::Reorganizer;
use crate::stats::BuildStats;
use crate::target::BuildTarget;
use forge_config::LibraryConfig;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Scheduling knobs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Maximum concurrent jobs (0 = CPU count)
    pub max_parallel: usize,
    /// Compile parallelism passed to builders (0 = a quarter of the CPUs)
    pub jobs_per_lib: usize,
    /// Copy CMake and pkg-config files to the central location
    pub include_cmake_configs: bool,
}

impl OrchestratorConfig {
    /// Concurrent job bound with the automatic default applied
    pub fn effective_max_parallel(&self) -> usize {
        if self.max_parallel == 0 {
            num_cpus::get().max(1)
        } else {
            self.max_parallel
        }
    }

    /// Per-job compile parallelism with the automatic default applied
    pub fn effective_jobs_per_lib(&self) -> usize {
        if self.jobs_per_lib == 0 {
            (num_cpus::get() / 4).max(1)
        } else {
            self.jobs_per_lib
        }
    }
}

/// One library built for one target
#[derive(Debug, Clone, PartialEq)]
pub struct BuildJob {
    pub library: LibraryConfig,
    pub target: BuildTarget,
}

/// Outcome of a successful job
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    pub library: String,
    /// Target path component
    pub target: String,
    /// Reorganized output directory of the library
    pub install_path: PathBuf,
    pub duration: Duration,
}

/// Drives a selected library set through fetch, build and reorganization
pub struct Orchestrator {
    libraries: BTreeMap<String, LibraryConfig>,
    versions: BTreeMap<String, String>,
    graph: DependencyGraph,
    targets: Vec<BuildTarget>,
    config: OrchestratorConfig,
    dirs: Arc<DirectoryManager>,
    fetcher: SourceFetcher,
    builders: BuilderRegistry,
    reorganizer: Reorganizer,
}

impl Orchestrator {
    /// Create an orchestrator over the selected libraries
    ///
    /// Fails if a dependency is outside the selection or the graph has a cycle.
    pub fn new(
        libraries: BTreeMap<String, LibraryConfig>,
        targets: Vec<BuildTarget>,
        dirs: Arc<DirectoryManager>,
        manifest_dir: impl Into<PathBuf>,
        config: OrchestratorConfig,
    ) -> BuildResult<Self> {
        let graph = DependencyGraph::from_libraries(libraries.values())?;
        let versions = libraries
            .iter()
            .map(|(name, lib)| (name.clone(), lib.version.clone()))
            .collect();
        let fetcher = SourceFetcher::new(Arc::clone(&dirs), manifest_dir);
        let reorganizer = Reorganizer::new(dirs.install_root())
            .with_cmake_configs(config.include_cmake_configs);

        Ok(Self {
            libraries,
            versions,
            graph,
            targets,
            config,
            dirs,
            fetcher,
            builders: BuilderRegistry::default(),
            reorganizer,
        })
    }

    /// Replace the source fetcher
    pub fn with_fetcher(mut self, fetcher: SourceFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Replace the builder registry
    pub fn with_builders(mut self, builders: BuilderRegistry) -> Self {
        self.builders = builders;
        self
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn targets(&self) -> &[BuildTarget] {
        &self.targets
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &SourceFetcher {
        &self.fetcher
    }

    /// Jobs per level, filtered by platform and link support
    ///
    /// Levels without any job are dropped.
    pub fn plan(&self) -> BuildResult<Vec<Vec<BuildJob>>> {
        let levels = self.graph.get_build_levels()?;
        let mut plan = Vec::with_capacity(levels.len());

        for level in levels {
            let mut jobs = Vec::new();
            for name in &level {
                let library = self
                    .libraries
                    .get(name)
                    .ok_or_else(|| BuildError::UnknownLibrary(name.clone()))?;
                for target in &self.targets {
                    if library.supports_platform(target.os.name())
                        && library.supports_link_type(target.link.name())
                    {
                        jobs.push(BuildJob {
                            library: library.clone(),
                            target: target.clone(),
                        });
                    }
                }
            }
            if !jobs.is_empty() {
                plan.push(jobs);
            }
        }

        Ok(plan)
    }

    /// Build everything, level by level
    ///
    /// On failure the current level still drains, no later level starts and
    /// the first failure is returned.
    pub fn run(&self) -> BuildResult<BuildStats> {
        let plan = self.plan()?;
        let max_parallel = self.config.effective_max_parallel();
        let total: usize = plan.iter().map(Vec::len).sum();

        info!(
            libraries = self.libraries.len(),
            targets = self.targets.len(),
            jobs = total,
            max_parallel,
            jobs_per_lib = self.config.effective_jobs_per_lib(),
            "starting build"
        );

        let mut stats = BuildStats::start();
        let outcome = self.run_levels(&plan, max_parallel, &mut stats);
        stats.finish();

        outcome.map(|()| stats)
    }

    fn run_levels(
        &self,
        plan: &[Vec<BuildJob>],
        max_parallel: usize,
        stats: &mut BuildStats,
    ) -> BuildResult<()> {
        for (index, jobs) in plan.iter().enumerate() {
            let mut names: Vec<&str> = jobs.iter().map(|j| j.library.name.as_str()).collect();
            names.dedup();
            info!(level = index, jobs = jobs.len(), libraries = %names.join(", "), "building level");

            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(max_parallel.min(jobs.len()).max(1))
                .thread_name(|i| format!("forge-worker-{}", i))
                .build()?;
            let results: Vec<BuildResult<JobResult>> =
                pool.install(|| jobs.par_iter().map(|job| self.execute_job(job)).collect());

            let mut first_error = None;
            for (job, result) in jobs.iter().zip(results) {
                match result {
                    Ok(result) => {
                        info!(
                            library = %result.library,
                            target = %result.target,
                            duration = %crate::stats::format_duration(result.duration),
                            "built"
                        );
                        stats.add_result(result);
                    }
                    Err(e) => {
                        error!(library = %job.library.name, target = %job.target, error = %e, "build failed");
                        first_error.get_or_insert(e);
                    }
                }
            }

            if let Some(e) = first_error {
                return Err(e);
            }
        }
        Ok(())
    }

    /// Run one job: fetch, configure, build, install, reorganize, record
    pub fn execute_job(&self, job: &BuildJob) -> BuildResult<JobResult> {
        let started = Instant::now();
        let library = &job.library;
        let target = &job.target;
        debug!(library = %library.name, target = %target, "job started");

        let fetched = self
            .fetcher
            .fetch(&library.name, &library.version, &library.source)?;
        let paths = self.dirs.build_paths(&library.name, &library.version, target);
        let source_dir = match &library.source.source_subdir {
            Some(subdir) => fetched.join(subdir),
            None => fetched,
        };

        let ctx = BuildContext {
            library_name: library.name.clone(),
            version: library.version.clone(),
            source_dir,
            build_dir: paths.build_dir.clone(),
            install_dir: paths.install_dir.clone(),
            target: target.clone(),
            dependency_dirs: self
                .dirs
                .dependency_dirs(&library.dependencies, &self.versions, target),
            build_options: library
                .build
                .merged_options(target.link.name(), target.config.name()),
            script: library.build.script.clone(),
            jobs: self.config.effective_jobs_per_lib(),
            log_file: paths.build_dir.join("build.log"),
        };

        let builder = self.builders.get(library.build.system)?;
        for phase in BuildPhase::ALL {
            debug!(library = %library.name, target = %target, phase = phase.name(), "running phase");
            phase.run(builder.as_ref(), &ctx)?;
        }

        self.reorganizer
            .reorganize(&library.name, target, &paths.install_dir, &paths.final_dir)?;

        let source = SourceInfo::from_spec(
            &library.source,
            self.fetcher.actual_commit(&library.name, &library.version),
        );
        self.dirs
            .write_build_metadata(&library.name, &library.version, target, &source)?;

        Ok(JobResult {
            library: library.name.clone(),
            target: target.path_component(),
            install_path: paths.final_dir,
            duration: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{Arch, BuildConfig, LinkType, Os};
    use forge_config::SourceSpec;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn lib(name: &str, deps: &[&str]) -> LibraryConfig {
        LibraryConfig::new(name, "1.0", SourceSpec::local(name))
            .with_dependencies(deps.iter().map(|d| d.to_string()).collect())
    }

    fn orchestrator(temp: &TempDir, libs: Vec<LibraryConfig>, targets: Vec<BuildTarget>) -> Orchestrator {
        let dirs = Arc::new(DirectoryManager::new(
            temp.path().join("install"),
            temp.path().join("sources"),
            temp.path().join("builds"),
        ));
        let libraries = libs.into_iter().map(|l| (l.name.clone(), l)).collect();
        Orchestrator::new(libraries, targets, dirs, temp.path(), OrchestratorConfig::default()).unwrap()
    }

    #[test]
    fn test_effective_defaults() {
        let config = OrchestratorConfig::default();
        assert!(config.effective_max_parallel() >= 1);
        assert!(config.effective_jobs_per_lib() >= 1);

        let explicit = OrchestratorConfig {
            max_parallel: 3,
            jobs_per_lib: 2,
            include_cmake_configs: false,
        };
        assert_eq!(explicit.effective_max_parallel(), 3);
        assert_eq!(explicit.effective_jobs_per_lib(), 2);
    }

    #[test]
    fn test_plan_filters_by_platform_and_link() {
        let temp = TempDir::new().unwrap();
        let targets = vec![
            BuildTarget::new(Os::Linux, Arch::X86_64, BuildConfig::Release, LinkType::Static),
            BuildTarget::new(Os::Linux, Arch::X86_64, BuildConfig::Release, LinkType::Shared),
            BuildTarget::new(Os::Macos, Arch::Arm64, BuildConfig::Release, LinkType::Static),
        ];
        let libs = vec![
            lib("zlib", &[]),
            lib("mac_only", &[]).with_platforms(vec!["macos".to_string()]),
            lib("static_only", &["zlib"]).with_link_types(vec!["static".to_string()]),
        ];
        let orch = orchestrator(&temp, libs, targets);

        let plan = orch.plan().unwrap();
        let summary: Vec<Vec<String>> = plan
            .iter()
            .map(|level| {
                level
                    .iter()
                    .map(|j| format!("{}@{}", j.library.name, j.target))
                    .collect()
            })
            .collect();

        assert_eq!(
            summary,
            vec![
                vec![
                    "mac_only@macos_arm64_static".to_string(),
                    "zlib@linux_x86_64_static".to_string(),
                    "zlib@linux_x86_64_shared".to_string(),
                    "zlib@macos_arm64_static".to_string(),
                ],
                vec![
                    "static_only@linux_x86_64_static".to_string(),
                    "static_only@macos_arm64_static".to_string(),
                ],
            ]
        );
    }

    #[test]
    fn test_dependency_outside_selection_is_rejected() {
        let temp = TempDir::new().unwrap();
        let dirs = Arc::new(DirectoryManager::new(
            temp.path().join("i"),
            temp.path().join("s"),
            temp.path().join("b"),
        ));
        let libraries: BTreeMap<_, _> = [lib("libpng", &["zlib"])]
            .into_iter()
            .map(|l| (l.name.clone(), l))
            .collect();

        let result = Orchestrator::new(libraries, Vec::new(), dirs, temp.path(), OrchestratorConfig::default());
        assert!(matches!(result, Err(BuildError::UnknownDependency { .. })));
    }
}
