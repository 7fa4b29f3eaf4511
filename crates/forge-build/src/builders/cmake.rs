use super::prepare_dirs;
use crate::builder::{BuildContext, BuildPhase, Builder};
use crate::error::{BuildError, BuildResult};
use crate::target::{Arch, Os};
use forge_config::OptionValue;
use std::process::Command;
use tracing::debug;

/// Host CMake builder
///
/// Configures with the host toolchain. Targets for another OS or architecture
/// need a `CMAKE_TOOLCHAIN_FILE` option in the manifest.
#[derive(Debug, Default, Clone, Copy)]
pub struct CmakeBuilder;

impl CmakeBuilder {
    /// Arguments for `cmake` in the configure phase
    pub fn configure_args(ctx: &BuildContext) -> Vec<String> {
        let mut args = vec![
            "-S".to_string(),
            ctx.source_dir.display().to_string(),
            "-B".to_string(),
            ctx.build_dir.display().to_string(),
            format!("-DCMAKE_BUILD_TYPE={}", cmake_config(ctx)),
            format!("-DCMAKE_INSTALL_PREFIX={}", ctx.install_dir.display()),
            format!(
                "-DBUILD_SHARED_LIBS={}",
                if ctx.target.is_shared() { "ON" } else { "OFF" }
            ),
            "-DCMAKE_POSITION_INDEPENDENT_CODE=ON".to_string(),
        ];

        if !ctx.dependency_dirs.is_empty() {
            let prefix: Vec<String> = ctx
                .dependency_dirs
                .values()
                .map(|p| p.display().to_string())
                .collect();
            args.push(format!("-DCMAKE_PREFIX_PATH={}", prefix.join(";")));
        }

        for (key, value) in &ctx.build_options {
            let rendered = match value {
                OptionValue::Bool(true) => "ON".to_string(),
                OptionValue::Bool(false) => "OFF".to_string(),
                other => other.to_string(),
            };
            args.push(format!("-D{}={}", key, rendered));
        }

        args
    }

    fn check_host(ctx: &BuildContext) -> BuildResult<()> {
        if ctx.build_options.contains_key("CMAKE_TOOLCHAIN_FILE") {
            return Ok(());
        }
        let host = (Os::host()?, Arch::host()?);
        if (ctx.target.os, ctx.target.arch) != host {
            return Err(BuildError::Builder {
                library: ctx.library_name.clone(),
                phase: BuildPhase::Configure.name().to_string(),
                exit_code: None,
                output: format!(
                    "target {} is not the host ({}_{}) and no CMAKE_TOOLCHAIN_FILE is set",
                    ctx.target, host.0, host.1
                ),
            });
        }
        Ok(())
    }
}

fn cmake_config(ctx: &BuildContext) -> &'static str {
    if ctx.target.is_debug() {
        "Debug"
    } else {
        "Release"
    }
}

impl Builder for CmakeBuilder {
    fn configure(&self, ctx: &BuildContext) -> BuildResult<()> {
        Self::check_host(ctx)?;
        prepare_dirs(ctx)?;

        debug!(library = %ctx.library_name, target = %ctx.target, "cmake configure");
        ctx.runner().run_checked(
            Command::new("cmake").args(Self::configure_args(ctx)),
            &ctx.library_name,
            BuildPhase::Configure.name(),
        )?;
        Ok(())
    }

    fn build(&self, ctx: &BuildContext) -> BuildResult<()> {
        ctx.runner().run_checked(
            Command::new("cmake")
                .arg("--build")
                .arg(&ctx.build_dir)
                .args(["--config", cmake_config(ctx)])
                .args(["--parallel", &ctx.jobs.max(1).to_string()]),
            &ctx.library_name,
            BuildPhase::Build.name(),
        )?;
        Ok(())
    }

    fn install(&self, ctx: &BuildContext) -> BuildResult<()> {
        ctx.runner().run_checked(
            Command::new("cmake")
                .arg("--install")
                .arg(&ctx.build_dir)
                .args(["--config", cmake_config(ctx)]),
            &ctx.library_name,
            BuildPhase::Install.name(),
        )?;
        Ok(())
    }
}
