//! Filesystem helpers shared by fetching, builders and reorganization
use crate::error::{BuildError, BuildResult};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Recursively copy `src` into `dst`, skipping `.git` directories
///
/// Symlinks are recreated as symlinks on Unix and copied as files elsewhere.
/// Existing destination files are replaced.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> BuildResult<()> {
    copy_dir_filtered(src, dst, |_| true)
}

/// Recursively copy the files of `src` accepted by `keep` into `dst`
pub fn copy_dir_filtered(
    src: &Path,
    dst: &Path,
    keep: impl Fn(&Path) -> bool,
) -> BuildResult<()> {
    fs::create_dir_all(dst).map_err(|e| BuildError::io(dst, e))?;

    let walker = WalkDir::new(src)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            BuildError::io(path, e.into())
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| BuildError::io(entry.path(), std::io::Error::other(e)))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| BuildError::io(&target, e))?;
            continue;
        }
        if !keep(entry.path()) {
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
        if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| BuildError::io(entry.path(), e))?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> BuildResult<()> {
    let link = fs::read_link(src).map_err(|e| BuildError::io(src, e))?;
    if dst.symlink_metadata().is_ok() {
        fs::remove_file(dst).map_err(|e| BuildError::io(dst, e))?;
    }
    std::os::unix::fs::symlink(&link, dst).map_err(|e| BuildError::io(dst, e))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> BuildResult<()> {
    if src.exists() {
        fs::copy(src, dst).map_err(|e| BuildError::io(src, e))?;
    }
    Ok(())
}

/// Create `link` pointing at `original` (a sibling file name)
///
/// Falls back to copying where symlinks are unavailable.
pub fn symlink_or_copy(original: &Path, link: &Path) -> BuildResult<()> {
    #[cfg(unix)]
    {
        let target = original.file_name().map(Path::new).unwrap_or(original);
        std::os::unix::fs::symlink(target, link).map_err(|e| BuildError::io(link, e))
    }
    #[cfg(not(unix))]
    {
        fs::copy(original, link)
            .map(|_| ())
            .map_err(|e| BuildError::io(link, e))
    }
}
