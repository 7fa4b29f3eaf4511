use super::prepare_dirs;
use crate::builder::{BuildContext, BuildPhase, Builder};
use crate::error::{BuildError, BuildResult};
use std::collections::BTreeMap;
use std::process::Command;
use tracing::debug;

/// Runs the manifest's shell script with `sh -c`
///
/// The script runs in the source directory during the build phase and is
/// expected to populate `$FORGE_INSTALL_DIR`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptBuilder;

impl ScriptBuilder {
    /// Environment variables exported to the script
    pub fn environment(ctx: &BuildContext) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        let mut set = |key: &str, value: String| {
            env.insert(key.to_string(), value);
        };

        set("FORGE_LIBRARY", ctx.library_name.clone());
        set("FORGE_VERSION", ctx.version.clone());
        set("FORGE_SOURCE_DIR", ctx.source_dir.display().to_string());
        set("FORGE_BUILD_DIR", ctx.build_dir.display().to_string());
        set("FORGE_INSTALL_DIR", ctx.install_dir.display().to_string());
        set("FORGE_TARGET", ctx.target.path_component());
        set("FORGE_OS", ctx.target.os.name().to_string());
        set("FORGE_ARCH", ctx.target.arch.name().to_string());
        set("FORGE_CONFIG", ctx.target.config.name().to_string());
        set("FORGE_LINK_TYPE", ctx.target.link.name().to_string());
        set("FORGE_JOBS", ctx.jobs.to_string());

        for (name, dir) in &ctx.dependency_dirs {
            set(&format!("FORGE_DEP_{}_DIR", env_key(name)), dir.display().to_string());
        }
        for (key, value) in &ctx.build_options {
            set(&format!("FORGE_OPT_{}", env_key(key)), value.to_string());
        }

        env
    }
}

/// Uppercase, with anything outside `[A-Z0-9_]` replaced by `_`
fn env_key(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

impl Builder for ScriptBuilder {
    fn configure(&self, ctx: &BuildContext) -> BuildResult<()> {
        prepare_dirs(ctx)
    }

    fn build(&self, ctx: &BuildContext) -> BuildResult<()> {
        let script = ctx.script.as_deref().ok_or_else(|| BuildError::Builder {
            library: ctx.library_name.clone(),
            phase: BuildPhase::Build.name().to_string(),
            exit_code: None,
            output: "no build script configured".to_string(),
        })?;

        debug!(library = %ctx.library_name, target = %ctx.target, "running build script");
        ctx.runner().run_checked(
            Command::new("sh")
                .arg("-c")
                .arg(script)
                .current_dir(&ctx.source_dir)
                .envs(Self::environment(ctx)),
            &ctx.library_name,
            BuildPhase::Build.name(),
        )?;
        Ok(())
    }

    fn install(&self, ctx: &BuildContext) -> BuildResult<()> {
        if !ctx.install_dir.is_dir() {
            return Err(BuildError::Builder {
                library: ctx.library_name.clone(),
                phase: BuildPhase::Install.name().to_string(),
                exit_code: None,
                output: format!("script removed {}", ctx.install_dir.display()),
            });
        }
        Ok(())
    }
}
