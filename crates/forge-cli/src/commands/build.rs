//! Build command - fetch, build and reorganize every selected library

use super::{orchestrator, plan, resolve_selection, resolve_settings, DirArgs, SelectionArgs};
use anyhow::{Context, Result};
use forge_build::DirectoryManager;
use forge_config::ForgeSettings;
use serde_json::json;
use tracing::info;

/// Build command arguments
pub struct BuildArgs {
    pub selection: SelectionArgs,
    pub dirs: DirArgs,
    /// Concurrent jobs across libraries
    pub parallel: Option<usize>,
    /// Compiler jobs inside each build
    pub jobs: Option<usize>,
    /// Print the plan instead of building
    pub dry_run: bool,
    /// Wipe caches and outputs first
    pub clean: bool,
    /// Collect CMake and pkg-config package files
    pub with_cmake_configs: bool,
    pub json: bool,
}

/// Run the build command
pub fn run(args: BuildArgs) -> Result<()> {
    let overrides = ForgeSettings {
        max_parallel: args.parallel,
        jobs_per_lib: args.jobs,
        include_cmake_configs: args.with_cmake_configs.then_some(true),
        ..Default::default()
    };
    let settings = resolve_settings(&args.dirs, overrides)?;
    let selection = resolve_selection(&args.selection)?;

    if args.dry_run {
        let orchestrator = orchestrator(selection, &settings)?;
        return plan::print_plan(&orchestrator, args.json);
    }

    if args.clean {
        info!("Cleaning caches and outputs");
        DirectoryManager::new(
            &settings.install_dir,
            &settings.source_dir,
            &settings.build_dir,
        )
        .clean_all()
        .context("Failed to clean")?;
    }

    let orchestrator = orchestrator(selection, &settings)?;
    let stats = orchestrator.run().context("Build failed")?;

    if args.json {
        let results: Vec<_> = stats
            .results()
            .iter()
            .map(|r| {
                json!({
                    "library": r.library,
                    "target": r.target,
                    "install_path": r.install_path,
                    "seconds": r.duration.as_secs_f64(),
                })
            })
            .collect();
        let output = json!({
            "success": true,
            "builds": results,
            "cumulative_seconds": stats.cumulative().as_secs_f64(),
            "wall_clock_seconds": stats.wall_clock().as_secs_f64(),
            "parallelism": stats.parallelism(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialize build summary")?
        );
        return Ok(());
    }

    let summary = stats.to_string();
    if !summary.is_empty() {
        println!("{}", summary);
        println!();
    }
    println!(
        "Built {} jobs into {}",
        stats.results().len(),
        settings.install_dir.display()
    );
    Ok(())
}
