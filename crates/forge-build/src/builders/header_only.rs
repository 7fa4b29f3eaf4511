use super::prepare_dirs;
use crate::builder::{BuildContext, BuildPhase, Builder};
use crate::error::{BuildError, BuildResult};
use crate::fsutil::copy_dir_recursive;

/// Copies a header tree into `install/include`
///
/// The tree is `include/` of the source, or the `include_dir` option.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderOnlyBuilder;

impl Builder for HeaderOnlyBuilder {
    fn configure(&self, ctx: &BuildContext) -> BuildResult<()> {
        prepare_dirs(ctx)
    }

    fn build(&self, _ctx: &BuildContext) -> BuildResult<()> {
        Ok(())
    }

    fn install(&self, ctx: &BuildContext) -> BuildResult<()> {
        let include = ctx
            .build_options
            .get("include_dir")
            .map(ToString::to_string)
            .unwrap_or_else(|| "include".to_string());
        let src = ctx.source_dir.join(&include);

        if !src.is_dir() {
            return Err(BuildError::Builder {
                library: ctx.library_name.clone(),
                phase: BuildPhase::Install.name().to_string(),
                exit_code: None,
                output: format!("header directory not found: {}", src.display()),
            });
        }

        copy_dir_recursive(&src, &ctx.install_dir.join("include"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::test_support::context;
    use forge_config::OptionValue;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_copies_include_dir() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path());
        fs::create_dir_all(ctx.source_dir.join("include/glm")).unwrap();
        fs::write(ctx.source_dir.join("include/glm/glm.hpp"), "").unwrap();

        let builder = HeaderOnlyBuilder;
        builder.configure(&ctx).unwrap();
        builder.build(&ctx).unwrap();
        builder.install(&ctx).unwrap();

        assert!(ctx.install_dir.join("include/glm/glm.hpp").is_file());
    }

    #[test]
    fn test_custom_include_dir() {
        let temp = TempDir::new().unwrap();
        let mut ctx = context(temp.path());
        ctx.build_options
            .insert("include_dir".to_string(), OptionValue::from("Eigen"));
        fs::create_dir_all(ctx.source_dir.join("Eigen")).unwrap();
        fs::write(ctx.source_dir.join("Eigen/Core"), "").unwrap();

        HeaderOnlyBuilder.install(&ctx).unwrap();
        assert!(ctx.install_dir.join("include/Core").is_file());
    }

    #[test]
    fn test_missing_headers() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path());
        let err = HeaderOnlyBuilder.install(&ctx).unwrap_err();
        assert!(matches!(err, BuildError::Builder { ref phase, .. } if phase == "install"));
    }
}
