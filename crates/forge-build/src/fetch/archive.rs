//! Archive download and extraction
use crate::error::{BuildError, BuildResult};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tar::Archive;
use tracing::debug;
use zip::ZipArchive;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Tar,
    Zip,
}

impl ArchiveFormat {
    /// Detect the format from a URL or file name
    pub fn detect(location: &str) -> Option<Self> {
        let name = location
            .split(['?', '#'])
            .next()
            .unwrap_or(location)
            .to_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

/// Download `url` into `dest`, extract it and flatten a single top-level directory
pub fn fetch_archive(url: &str, dest: &Path) -> BuildResult<()> {
    let format = ArchiveFormat::detect(url)
        .ok_or_else(|| BuildError::process("extract", format!("unsupported archive format: {}", url)))?;

    let parent = dest.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    let mut download = tempfile::NamedTempFile::new_in(parent).map_err(|e| BuildError::io(parent, e))?;

    download_to(url, download.as_file_mut())?;
    extract(download.path(), format, dest)?;
    flatten_single_root(dest)
}

/// Fetch `url` into `file`; `file://` URLs are read from disk
fn download_to(url: &str, file: &mut File) -> BuildResult<()> {
    debug!(url, "downloading");

    if let Some(path) = url.strip_prefix("file://") {
        let mut source = File::open(path).map_err(|e| BuildError::io(path, e))?;
        io::copy(&mut source, file).map_err(|e| BuildError::io(path, e))?;
        return Ok(());
    }

    let client = reqwest::blocking::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .map_err(|e| BuildError::process(url, e))?;
    let mut response = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| BuildError::process(url, e))?;
    response
        .copy_to(file)
        .map_err(|e| BuildError::process(url, e))?;
    Ok(())
}

/// Extract an archive into `dest`, rejecting entries that escape it
pub fn extract(archive: &Path, format: ArchiveFormat, dest: &Path) -> BuildResult<()> {
    fs::create_dir_all(dest).map_err(|e| BuildError::io(dest, e))?;
    let file = File::open(archive).map_err(|e| BuildError::io(archive, e))?;

    match format {
        ArchiveFormat::TarGz => extract_tar(Archive::new(GzDecoder::new(file)), dest),
        ArchiveFormat::Tar => extract_tar(Archive::new(file), dest),
        ArchiveFormat::Zip => extract_zip(file, dest),
    }
}

fn extract_tar<R: io::Read>(mut archive: Archive<R>, dest: &Path) -> BuildResult<()> {
    let entries = archive.entries().map_err(|e| BuildError::io(dest, e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| BuildError::io(dest, e))?;
        let entry_path = entry
            .path()
            .map_err(|e| BuildError::io(dest, e))?
            .to_path_buf();

        if safe_output_path(dest, &entry_path).is_none() {
            return Err(traversal(&entry_path));
        }
        entry
            .unpack_in(dest)
            .map_err(|e| BuildError::io(dest.join(&entry_path), e))?;
    }
    Ok(())
}

fn extract_zip(file: File, dest: &Path) -> BuildResult<()> {
    let mut archive = ZipArchive::new(file).map_err(|e| BuildError::io(dest, e.into()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| BuildError::io(dest, e.into()))?;
        let name = PathBuf::from(entry.name());
        let out_path = safe_output_path(dest, &name).ok_or_else(|| traversal(&name))?;

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| BuildError::io(&out_path, e))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }

        // Symlinks store their target as the entry body. Elsewhere they
        // land as regular files holding that target.
        #[cfg(unix)]
        if entry.unix_mode().is_some_and(|mode| mode & 0o170000 == 0o120000) {
            let mut target = String::new();
            io::Read::read_to_string(&mut entry, &mut target)
                .map_err(|e| BuildError::io(&out_path, e))?;
            let target = PathBuf::from(target);
            let resolved = name.parent().unwrap_or(Path::new("")).join(&target);
            if safe_output_path(dest, &resolved).is_none() {
                return Err(traversal(&name));
            }
            std::os::unix::fs::symlink(&target, &out_path)
                .map_err(|e| BuildError::io(&out_path, e))?;
            continue;
        }

        let mut out = File::create(&out_path).map_err(|e| BuildError::io(&out_path, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| BuildError::io(&out_path, e))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode))
                .map_err(|e| BuildError::io(&out_path, e))?;
        }
    }
    Ok(())
}

fn traversal(entry: &Path) -> BuildError {
    BuildError::process(
        "extract",
        format!("archive entry escapes destination: {}", entry.display()),
    )
}

/// Resolve an archive entry under `output_dir`, or `None` if it would escape
fn safe_output_path(output_dir: &Path, entry: &Path) -> Option<PathBuf> {
    let mut components = Vec::new();
    for component in entry.components() {
        match component {
            Component::ParentDir => {
                components.pop()?;
            }
            Component::CurDir => {}
            Component::Normal(part) => components.push(part),
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(components.iter().fold(output_dir.to_path_buf(), |p, c| p.join(c)))
}

/// Move the contents of a sole top-level directory up into `dest`
///
/// Leaves `dest` alone when it holds files or more than one directory.
pub fn flatten_single_root(dest: &Path) -> BuildResult<()> {
    let entries: Vec<PathBuf> = fs::read_dir(dest)
        .map_err(|e| BuildError::io(dest, e))?
        .map(|e| e.map(|e| e.path()))
        .collect::<io::Result<_>>()
        .map_err(|e| BuildError::io(dest, e))?;

    let [root] = entries.as_slice() else {
        return Ok(());
    };
    if !root.is_dir() || root.is_symlink() {
        return Ok(());
    }

    // The root may contain an entry with its own name, so move it aside first
    let staging = dest.join(".forge-flatten");
    fs::rename(root, &staging).map_err(|e| BuildError::io(root, e))?;

    for entry in fs::read_dir(&staging).map_err(|e| BuildError::io(&staging, e))? {
        let entry = entry.map_err(|e| BuildError::io(&staging, e))?;
        let target = dest.join(entry.file_name());
        fs::rename(entry.path(), &target).map_err(|e| BuildError::io(&target, e))?;
    }
    fs::remove_dir(&staging).map_err(|e| BuildError::io(&staging, e))?;

    debug!(path = %dest.display(), "flattened archive root");
    Ok(())
}
