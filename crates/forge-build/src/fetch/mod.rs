//! Source fetching with a shared on-disk cache
//!
//! Each (library, version) source tree is fetched at most once per process:
//! - a `.fetched` marker makes a completed tree reusable across runs
//! - a per-library lock serializes concurrent requests for the same source
//! - a failed fetch is remembered and never retried within the process

pub mod archive;
pub mod git;

use crate::dirs::DirectoryManager;
use crate::error::{BuildError, BuildResult};
use crate::fsutil::copy_dir_recursive;
use crate::process::ProcessRunner;
use forge_config::{SourceKind, SourceSpec};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Mechanism that materializes a source tree
pub trait SourceBackend: Send + Sync {
    /// Populate `dest` (which does not exist yet) from `source`
    ///
    /// Relative local paths resolve against `base_dir`. Returns the commit
    /// that was checked out, for version-controlled sources.
    fn fetch(
        &self,
        library: &str,
        source: &SourceSpec,
        dest: &Path,
        base_dir: &Path,
    ) -> BuildResult<Option<String>>;
}

/// Git, archive and local directory fetching
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBackend;

impl SourceBackend for DefaultBackend {
    fn fetch(
        &self,
        library: &str,
        source: &SourceSpec,
        dest: &Path,
        base_dir: &Path,
    ) -> BuildResult<Option<String>> {
        match source.kind {
            SourceKind::Git => {
                let url = source.url.as_deref().ok_or_else(|| {
                    BuildError::process("git", format!("{} has no repository url", library))
                })?;
                info!(library, url, reference = ?source.reference, "cloning");
                git::fetch_git(url, source.reference.as_deref(), source.shallow, dest).map(Some)
            }
            SourceKind::Archive => {
                let url = source.archive_location().ok_or_else(|| {
                    BuildError::process("download", format!("{} has no archive url", library))
                })?;
                info!(library, url, "downloading");
                archive::fetch_archive(url, dest).map(|_| None)
            }
            SourceKind::Local => {
                let path = source.local_path.as_deref().ok_or_else(|| {
                    BuildError::process("copy", format!("{} has no local path", library))
                })?;
                let path = resolve(base_dir, path);
                if !path.is_dir() {
                    return Err(BuildError::process(
                        "copy",
                        format!("local source not found: {}", path.display()),
                    ));
                }
                info!(library, path = %path.display(), "copying local source");
                copy_dir_recursive(&path, dest).map(|_| None)
            }
        }
    }
}

/// Thread-safe cached source fetcher
pub struct SourceFetcher {
    dirs: Arc<DirectoryManager>,
    base_dir: PathBuf,
    backend: Arc<dyn SourceBackend>,
    library_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    failures: Mutex<HashMap<(String, String), String>>,
}

impl SourceFetcher {
    /// Create a fetcher; `base_dir` anchors relative local, patch and overlay paths
    pub fn new(dirs: Arc<DirectoryManager>, base_dir: impl Into<PathBuf>) -> Self {
        Self::with_backend(dirs, base_dir, Arc::new(DefaultBackend))
    }

    /// Create a fetcher with a custom backend
    pub fn with_backend(
        dirs: Arc<DirectoryManager>,
        base_dir: impl Into<PathBuf>,
        backend: Arc<dyn SourceBackend>,
    ) -> Self {
        Self {
            dirs,
            base_dir: base_dir.into(),
            backend,
            library_locks: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn dirs(&self) -> &DirectoryManager {
        &self.dirs
    }

    /// Get the source tree for a library version, fetching it if needed
    ///
    /// All callers for the same (library, version) get the same path, and
    /// the backend runs at most once for it. A failure is permanent: later
    /// calls fail with the same message without fetching again.
    pub fn fetch(&self, library: &str, version: &str, source: &SourceSpec) -> BuildResult<PathBuf> {
        let dir = self.dirs.source_dir(library, version);

        self.check_failed(library, version)?;
        if self.dirs.is_fetched(library, version) {
            return Ok(dir);
        }

        let lock = self
            .library_locks
            .lock()
            .entry(library.to_string())
            .or_default()
            .clone();
        let _guard = lock.lock();

        // Another caller may have finished (or failed) while we waited
        self.check_failed(library, version)?;
        if self.dirs.is_fetched(library, version) {
            debug!(library, version, "source already fetched");
            return Ok(dir);
        }

        match self.fetch_uncached(library, version, source, &dir) {
            Ok(()) => Ok(dir),
            Err(e) => {
                if dir.exists() {
                    if let Err(cleanup) = fs::remove_dir_all(&dir) {
                        warn!(library, error = %cleanup, "failed to remove partial source tree");
                    }
                }
                let message = match e {
                    BuildError::Fetch { message, .. } => message,
                    other => other.to_string(),
                };
                self.failures
                    .lock()
                    .insert((library.to_string(), version.to_string()), message.clone());
                Err(BuildError::fetch(library, version, message))
            }
        }
    }

    /// Commit recorded when the source was fetched
    pub fn actual_commit(&self, library: &str, version: &str) -> Option<String> {
        self.dirs.read_fetched_marker(library, version)
    }

    /// Whether a fetch for this key has failed in this process
    pub fn has_failed(&self, library: &str, version: &str) -> bool {
        self.failures
            .lock()
            .contains_key(&(library.to_string(), version.to_string()))
    }

    fn check_failed(&self, library: &str, version: &str) -> BuildResult<()> {
        match self
            .failures
            .lock()
            .get(&(library.to_string(), version.to_string()))
        {
            Some(message) => Err(BuildError::fetch(library, version, message)),
            None => Ok(()),
        }
    }

    fn fetch_uncached(
        &self,
        library: &str,
        version: &str,
        source: &SourceSpec,
        dir: &Path,
    ) -> BuildResult<()> {
        // Leftovers from an interrupted run are never trusted
        if dir.exists() {
            fs::remove_dir_all(dir).map_err(|e| BuildError::io(dir, e))?;
        }
        if let Some(parent) = dir.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }

        let commit = self.backend.fetch(library, source, dir, &self.base_dir)?;
        fs::create_dir_all(dir).map_err(|e| BuildError::io(dir, e))?;
        self.apply_overlays(library, source, dir)?;
        self.dirs
            .write_fetched_marker(library, version, commit.as_deref())?;

        info!(library, version, commit = ?commit, "source ready");
        Ok(())
    }

    /// Copy overlay files into the (subdir-scoped) tree, then apply the patch
    fn apply_overlays(&self, library: &str, source: &SourceSpec, dir: &Path) -> BuildResult<()> {
        let root = match &source.source_subdir {
            Some(subdir) => dir.join(subdir),
            None => dir.to_path_buf(),
        };

        for copy in &source.copy_files {
            let src = resolve(&self.base_dir, &copy.src);
            let dest = root.join(&copy.dest);
            debug!(library, src = %src.display(), dest = %dest.display(), "overlay");

            if src.is_dir() {
                copy_dir_recursive(&src, &dest)?;
            } else if src.is_file() {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
                }
                fs::copy(&src, &dest).map_err(|e| BuildError::io(&src, e))?;
            } else {
                return Err(BuildError::fetch(
                    library,
                    "",
                    format!("overlay source not found: {}", src.display()),
                ));
            }
        }

        if let Some(patch) = &source.patch {
            apply_patch(library, &resolve(&self.base_dir, patch), dir)?;
        }
        Ok(())
    }
}

/// Apply a patch with `git apply`, falling back to `patch -p1 -N`
fn apply_patch(library: &str, patch: &Path, dir: &Path) -> BuildResult<()> {
    if !patch.is_file() {
        return Err(BuildError::fetch(
            library,
            "",
            format!("patch not found: {}", patch.display()),
        ));
    }

    let runner = ProcessRunner::new();
    let git = runner.run(
        Command::new("git")
            .args(["apply", "--whitespace=nowarn"])
            .arg(patch)
            .current_dir(dir),
    );
    if matches!(&git, Ok(output) if output.success()) {
        debug!(library, patch = %patch.display(), "applied patch with git");
        return Ok(());
    }

    let fallback = runner.run(
        Command::new("patch")
            .args(["-p1", "-N", "-i"])
            .arg(patch)
            .current_dir(dir),
    );
    match fallback {
        Ok(output) if output.success() => {
            debug!(library, patch = %patch.display(), "applied patch with patch(1)");
            Ok(())
        }
        Ok(output) => Err(BuildError::fetch(
            library,
            "",
            format!("failed to apply {}: {}", patch.display(), output.output().trim()),
        )),
        Err(e) => Err(BuildError::fetch(
            library,
            "",
            format!("failed to apply {}: {}", patch.display(), e),
        )),
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
