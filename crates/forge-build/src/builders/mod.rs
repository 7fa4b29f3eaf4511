//! Builder adapters
mod cmake;
mod header_only;
mod script;

pub use cmake::CmakeBuilder;
pub use header_only::HeaderOnlyBuilder;
pub use script::ScriptBuilder;

use crate::builder::BuildContext;
use crate::error::{BuildError, BuildResult};
use std::fs;

/// Create the build and install directories of a job
pub(crate) fn prepare_dirs(ctx: &BuildContext) -> BuildResult<()> {
    for dir in [&ctx.build_dir, &ctx.install_dir] {
        fs::create_dir_all(dir).map_err(|e| BuildError::io(dir, e))?;
    }
    Ok(())
}
