//! Clean command - remove cached sources, build trees or outputs

use super::{resolve_settings, DirArgs};
use anyhow::{bail, Context, Result};
use forge_build::DirectoryManager;
use forge_config::ForgeSettings;

/// Clean command arguments
pub struct CleanArgs {
    pub dirs: DirArgs,
    pub sources: bool,
    pub builds: bool,
    pub all: bool,
    /// Libraries whose sources, builds and outputs are removed
    pub libraries: Vec<String>,
}

/// Run the clean command
pub fn run(args: CleanArgs) -> Result<()> {
    if !(args.sources || args.builds || args.all) && args.libraries.is_empty() {
        bail!("Nothing to clean; pass --sources, --builds, --all or --library");
    }

    let settings = resolve_settings(&args.dirs, ForgeSettings::default())?;
    let dirs = DirectoryManager::new(
        &settings.install_dir,
        &settings.source_dir,
        &settings.build_dir,
    );

    for library in &args.libraries {
        dirs.clean_library(library)
            .with_context(|| format!("Failed to clean {}", library))?;
        println!("Removed {}", library);
    }

    if args.all {
        dirs.clean_all().context("Failed to clean")?;
        println!("Removed {}", settings.source_dir.display());
        println!("Removed {}", settings.build_dir.display());
        println!("Removed {}", settings.install_dir.display());
        return Ok(());
    }
    if args.sources {
        dirs.clean_sources().context("Failed to clean sources")?;
        println!("Removed {}", settings.source_dir.display());
    }
    if args.builds {
        dirs.clean_builds().context("Failed to clean builds")?;
        println!("Removed {}", settings.build_dir.display());
    }
    Ok(())
}
