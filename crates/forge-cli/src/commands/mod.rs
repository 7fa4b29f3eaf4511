//! Command implementations and the argument groups they share

pub mod build;
pub mod clean;
pub mod list;
pub mod plan;

use anyhow::{bail, Context, Result};
use clap::Args;
use forge_build::target::{default_link_types, default_platforms, parse_platform};
use forge_build::{
    Arch, BuildConfig, BuildTarget, DirectoryManager, LinkType, Orchestrator, OrchestratorConfig,
    Os,
};
use forge_config::{
    ForgeSettings, LibraryConfig, LibrarySelection, Manifest, ResolvedSettings, SettingsLoader,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Which libraries and targets to work on
#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Library manifest
    #[arg(long, short = 'm', default_value = "dependencies.yaml")]
    pub manifest: PathBuf,

    /// Target platforms as os_arch (ios_arm64, linux_x86_64, ...)
    #[arg(long = "target", short = 't', value_delimiter = ',')]
    pub targets: Vec<String>,

    /// Build configurations (debug, release)
    #[arg(long = "config", short = 'c', value_delimiter = ',')]
    pub configs: Vec<String>,

    /// Link types (static, shared)
    #[arg(long = "link", short = 'l', value_delimiter = ',')]
    pub links: Vec<String>,

    /// Optional libraries to include
    #[arg(long = "with", value_delimiter = ',')]
    pub with_libs: Vec<String>,

    /// Optional groups to include
    #[arg(long = "with-group", value_delimiter = ',')]
    pub with_groups: Vec<String>,

    /// Include every library, optional ones too
    #[arg(long)]
    pub all: bool,

    /// Only these libraries (and what they depend on)
    #[arg(long = "library", short = 'L', value_delimiter = ',')]
    pub libraries: Vec<String>,

    /// MSVC toolset for Windows targets (vc143, ...)
    #[arg(long)]
    pub toolset: Option<String>,
}

/// Directory overrides, layered over forge.toml and FORGE_* variables
#[derive(Args, Debug, Clone, Default)]
pub struct DirArgs {
    /// Final output directory
    #[arg(long)]
    pub install_dir: Option<PathBuf>,

    /// Source cache directory
    #[arg(long)]
    pub source_dir: Option<PathBuf>,

    /// Scratch build directory
    #[arg(long)]
    pub build_dir: Option<PathBuf>,

    /// Global settings file (defaults to ~/.forge/config.toml)
    #[arg(long, env = "FORGE_GLOBAL_CONFIG", hide_env_values = true)]
    pub global_config: Option<PathBuf>,
}

/// Libraries and targets chosen for one invocation
#[derive(Debug)]
pub struct Selection {
    pub manifest: Manifest,
    pub libraries: BTreeMap<String, LibraryConfig>,
    pub targets: Vec<BuildTarget>,
}

/// Merge settings files, environment and command line flags
pub fn resolve_settings(dirs: &DirArgs, overrides: ForgeSettings) -> Result<ResolvedSettings> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;

    let mut loader = SettingsLoader::new();
    if let Some(path) = &dirs.global_config {
        loader = loader.with_global_path(path);
    }

    let settings = loader
        .load(&cwd)
        .context("Failed to load forge settings")?
        .merge(ForgeSettings {
            install_dir: dirs.install_dir.clone(),
            source_dir: dirs.source_dir.clone(),
            build_dir: dirs.build_dir.clone(),
            ..overrides
        });

    Ok(settings.resolve(&cwd))
}

/// Load the manifest relative to the working directory
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to read current directory")?
            .join(path)
    };
    Manifest::from_file(&path).with_context(|| format!("Failed to load manifest {}", path.display()))
}

/// Resolve the manifest, the targets and the library subset to build
pub fn resolve_selection(args: &SelectionArgs) -> Result<Selection> {
    let manifest = load_manifest(&args.manifest)?;
    let targets = resolve_targets(args)?;

    let platforms: BTreeSet<String> = targets.iter().map(|t| t.os.name().to_string()).collect();
    let selection = LibrarySelection {
        with_libs: non_empty(&args.with_libs),
        with_groups: non_empty(&args.with_groups),
        build_all: args.all,
        platforms: Some(platforms.into_iter().collect()),
    };
    let mut libraries = manifest.filter_libraries(&selection)?;

    let requested = non_empty(&args.libraries);
    if !requested.is_empty() {
        let needed = manifest.with_dependencies(&requested)?;
        libraries.retain(|name, _| needed.contains_key(name));
        if libraries.is_empty() {
            bail!(
                "None of the requested libraries are selected for these targets: {}",
                requested.join(", ")
            );
        }
    }

    tracing::debug!(
        libraries = libraries.len(),
        targets = targets.len(),
        "Resolved selection"
    );

    Ok(Selection {
        manifest,
        libraries,
        targets,
    })
}

/// Build an orchestrator over a selection
pub fn orchestrator(selection: Selection, settings: &ResolvedSettings) -> Result<Orchestrator> {
    let dirs = Arc::new(DirectoryManager::new(
        &settings.install_dir,
        &settings.source_dir,
        &settings.build_dir,
    ));
    let config = OrchestratorConfig {
        max_parallel: settings.max_parallel,
        jobs_per_lib: settings.jobs_per_lib,
        include_cmake_configs: settings.include_cmake_configs,
    };
    let orchestrator = Orchestrator::new(
        selection.libraries,
        selection.targets,
        dirs,
        selection.manifest.base_dir,
        config,
    )?;
    Ok(orchestrator)
}

/// Expand --target/--config/--link into concrete build targets
pub fn resolve_targets(args: &SelectionArgs) -> Result<Vec<BuildTarget>> {
    let platforms: Vec<(Os, Arch)> = {
        let requested = non_empty(&args.targets);
        if requested.is_empty() {
            default_platforms()?
        } else {
            requested
                .iter()
                .map(|t| parse_platform(t))
                .collect::<Result<_, _>>()?
        }
    };

    let configs: Vec<BuildConfig> = {
        let requested = non_empty(&args.configs);
        if requested.is_empty() {
            vec![BuildConfig::Debug, BuildConfig::Release]
        } else {
            requested
                .iter()
                .map(|c| c.parse::<BuildConfig>())
                .collect::<Result<_, _>>()?
        }
    };

    let links: Vec<LinkType> = {
        let requested = non_empty(&args.links);
        if requested.is_empty() {
            default_link_types()
        } else {
            requested
                .iter()
                .map(|l| l.parse::<LinkType>())
                .collect::<Result<_, _>>()?
        }
    };

    if links.contains(&LinkType::Shared) {
        for (os, _) in platforms.iter().filter(|(os, _)| !os.supports_shared()) {
            tracing::info!("Skipping shared builds for {} (not supported)", os.name());
        }
    }

    let targets = BuildTarget::expand(&platforms, &configs, &links, args.toolset.as_deref());
    if targets.is_empty() {
        bail!("No valid targets remain after filtering");
    }
    Ok(targets)
}

fn non_empty(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}
