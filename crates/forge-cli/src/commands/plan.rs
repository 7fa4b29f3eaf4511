//! Plan command - show what a build would do without running it

use super::{orchestrator, resolve_selection, resolve_settings, DirArgs, SelectionArgs};
use anyhow::{Context, Result};
use forge_build::{BuildJob, Orchestrator};
use forge_config::ForgeSettings;
use serde_json::json;

/// Plan command arguments
pub struct PlanArgs {
    pub selection: SelectionArgs,
    pub dirs: DirArgs,
    pub json: bool,
}

/// Run the plan command
pub fn run(args: PlanArgs) -> Result<()> {
    let settings = resolve_settings(&args.dirs, ForgeSettings::default())?;
    let selection = resolve_selection(&args.selection)?;

    let orchestrator = orchestrator(selection, &settings)?;

    print_plan(&orchestrator, args.json)
}

/// Print the level-by-level job plan
pub fn print_plan(orchestrator: &Orchestrator, json: bool) -> Result<()> {
    let levels = orchestrator.plan()?;

    if json {
        let levels: Vec<_> = levels
            .iter()
            .enumerate()
            .map(|(index, jobs)| {
                json!({
                    "level": index,
                    "jobs": jobs.iter().map(|job| json!({
                        "library": job.library.name,
                        "version": job.library.version,
                        "target": job.target.path_component(),
                    })).collect::<Vec<_>>(),
                })
            })
            .collect();
        let output = json!({
            "libraries": orchestrator.graph().len(),
            "targets": orchestrator.targets().iter().map(|t| t.path_component()).collect::<Vec<_>>(),
            "levels": levels,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialize plan")?
        );
        return Ok(());
    }

    let total: usize = levels.iter().map(Vec::len).sum();
    println!(
        "Build plan: {} libraries, {} targets, {} jobs",
        orchestrator.graph().len(),
        orchestrator.targets().len(),
        total
    );
    println!(
        "Max parallel: {}, jobs per library: {}",
        orchestrator.config().effective_max_parallel(),
        orchestrator.config().effective_jobs_per_lib()
    );

    for (index, jobs) in levels.iter().enumerate() {
        let grouped = group_by_library(jobs);
        println!();
        println!(
            "Level {} ({} libraries, {} jobs)",
            index,
            grouped.len(),
            jobs.len()
        );
        for (name, version, targets) in grouped {
            println!("  {} {}: {}", name, version, targets.join(", "));
        }
    }

    Ok(())
}

/// Jobs grouped per library, keeping plan order
fn group_by_library(jobs: &[BuildJob]) -> Vec<(&str, &str, Vec<String>)> {
    let mut grouped: Vec<(&str, &str, Vec<String>)> = Vec::new();
    for job in jobs {
        let target = job.target.path_component();
        match grouped.iter_mut().find(|(name, _, _)| *name == job.library.name) {
            Some((_, _, targets)) => targets.push(target),
            None => grouped.push((
                job.library.name.as_str(),
                job.library.version.as_str(),
                vec![target],
            )),
        }
    }
    grouped
}
