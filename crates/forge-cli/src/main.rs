use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

use commands::{DirArgs, SelectionArgs};

/// Forge builds native third-party libraries for many targets at once.
///
/// Libraries are described in a manifest (dependencies.yaml). Forge fetches
/// each source once, builds every library for every requested target in
/// dependency order, and collects the results into one tree:
/// <install>/<library>/h/<os> for headers and <install>/<library>/lib/<target>
/// for binaries.
///
/// EXAMPLES:
///     forge build                               Build required libraries for the host
///     forge build -t ios_arm64,macos_arm64      Build for two platforms
///     forge build --with-group imaging -j 8     Include an optional group, 8 parallel jobs
///     forge build -L libpng -c release          Only libpng and its dependencies
///     forge plan --json                         Show the job plan as JSON
///     forge list --optional                     Show optional libraries and groups
///     forge clean --all                         Remove caches and outputs
///
/// ENVIRONMENT VARIABLES:
///     FORGE_LOG            Log filter (info, debug, forge_build=trace)
///     FORGE_INSTALL_DIR    Final output directory
///     FORGE_SOURCE_DIR     Source cache directory
///     FORGE_BUILD_DIR      Scratch build directory
///     FORGE_MAX_PARALLEL   Concurrent jobs across libraries
///     FORGE_JOBS_PER_LIB   Compiler jobs inside each build
///     FORGE_GLOBAL_CONFIG  Global settings file (default ~/.forge/config.toml)
///     NO_COLOR             Set to disable colored output
#[derive(Parser)]
#[command(name = "forge")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose logging (same as FORGE_LOG=debug)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build libraries for the requested targets
    ///
    /// Fetches sources, builds libraries level by level with a bounded
    /// number of concurrent jobs and reorganizes the results.
    ///
    /// EXAMPLES:
    ///     forge build -t linux_x86_64 -c release     One platform, release only
    ///     forge build -l static,shared                Static and shared builds
    ///     forge build --all --clean                   Everything, from scratch
    ///     forge build --dry-run                       Print the plan only
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        selection: SelectionArgs,
        #[command(flatten)]
        dirs: DirArgs,
        /// Concurrent jobs across libraries (0 = CPU count)
        #[arg(long, short = 'j')]
        parallel: Option<usize>,
        /// Compiler jobs inside each build (0 = CPU count / 4)
        #[arg(long)]
        jobs: Option<usize>,
        /// Print the plan without building
        #[arg(long)]
        dry_run: bool,
        /// Remove caches and outputs before building
        #[arg(long)]
        clean: bool,
        /// Also collect CMake and pkg-config package files
        #[arg(long)]
        with_cmake_configs: bool,
        /// JSON output
        #[arg(long)]
        json: bool,
    },

    /// Show the build plan without running it
    ///
    /// EXAMPLES:
    ///     forge plan -t android_arm64,android_x86_64
    ///     forge plan --with openexr --json
    #[command(visible_alias = "p")]
    Plan {
        #[command(flatten)]
        selection: SelectionArgs,
        #[command(flatten)]
        dirs: DirArgs,
        /// JSON output
        #[arg(long)]
        json: bool,
    },

    /// Remove cached sources, build trees or library outputs
    ///
    /// EXAMPLES:
    ///     forge clean --builds            Remove scratch build trees
    ///     forge clean --library libpng    Remove everything for libpng
    Clean {
        #[command(flatten)]
        dirs: DirArgs,
        /// Remove the source cache
        #[arg(long)]
        sources: bool,
        /// Remove the build directory
        #[arg(long)]
        builds: bool,
        /// Remove sources, builds and outputs
        #[arg(long)]
        all: bool,
        /// Remove sources, builds and outputs of these libraries
        #[arg(long = "library", short = 'L', value_delimiter = ',')]
        libraries: Vec<String>,
    },

    /// List the libraries in a manifest
    ///
    /// EXAMPLES:
    ///     forge list
    ///     forge list --optional
    #[command(visible_alias = "ls")]
    List {
        /// Library manifest
        #[arg(long, short = 'm', default_value = "dependencies.yaml")]
        manifest: std::path::PathBuf,
        /// Only optional libraries, by group
        #[arg(long)]
        optional: bool,
    },
}

fn init_logging(verbose: bool, config: &config::Config) {
    let env_filter = EnvFilter::try_new(config.filter_directives(verbose))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(!config.no_color)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cli_config = config::Config::from_env();
    init_logging(cli.verbose, &cli_config);

    match cli.command {
        Commands::Build {
            selection,
            dirs,
            parallel,
            jobs,
            dry_run,
            clean,
            with_cmake_configs,
            json,
        } => {
            let args = commands::build::BuildArgs {
                selection,
                dirs,
                parallel,
                jobs,
                dry_run,
                clean,
                with_cmake_configs,
                json,
            };
            commands::build::run(args)?;
        }
        Commands::Plan {
            selection,
            dirs,
            json,
        } => {
            commands::plan::run(commands::plan::PlanArgs {
                selection,
                dirs,
                json,
            })?;
        }
        Commands::Clean {
            dirs,
            sources,
            builds,
            all,
            libraries,
        } => {
            commands::clean::run(commands::clean::CleanArgs {
                dirs,
                sources,
                builds,
                all,
                libraries,
            })?;
        }
        Commands::List { manifest, optional } => {
            commands::list::run(commands::list::ListArgs { manifest, optional })?;
        }
    }

    Ok(())
}
