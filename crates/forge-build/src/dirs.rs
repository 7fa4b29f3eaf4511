//! Cache, build and install directory layout
//!
//! Every path is derived from the three roots plus (library, version,
//! target); computing a path never touches the filesystem.
//!
//! ```text
//! <source-root>/<lib>/<version>/            shared source tree + .fetched marker
//! <build-root>/<lib>/<version>/<target>/build/
//! <build-root>/<lib>/<version>/<target>/install/
//! <install-root>/<lib>/h/<os>/              headers
//! <install-root>/<lib>/lib/<target>/        libraries
//! <install-root>/<lib>/.build_metadata.json
//! ```

use crate::error::{BuildError, BuildResult};
use crate::target::BuildTarget;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Marker written into a source tree once it is completely fetched
pub const FETCHED_MARKER: &str = ".fetched";
/// Per-library metadata document
pub const METADATA_FILE: &str = ".build_metadata.json";
/// Lock file guarding the metadata document across processes
pub const METADATA_LOCK_FILE: &str = ".build_metadata.lock";

/// Paths used by one (library, target) build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPaths {
    /// Shared source tree
    pub source_dir: PathBuf,
    /// Scratch build tree
    pub build_dir: PathBuf,
    /// Raw install tree produced by the builder
    pub install_dir: PathBuf,
    /// Reorganized per-library output directory
    pub final_dir: PathBuf,
}

/// Directory manager
#[derive(Debug)]
pub struct DirectoryManager {
    install_root: PathBuf,
    source_root: PathBuf,
    build_root: PathBuf,
    /// In-process locks for metadata documents, keyed by document path
    pub(crate) metadata_locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl DirectoryManager {
    /// Create a manager over the given roots
    pub fn new(
        install_root: impl Into<PathBuf>,
        source_root: impl Into<PathBuf>,
        build_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            install_root: install_root.into(),
            source_root: source_root.into(),
            build_root: build_root.into(),
            metadata_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn build_root(&self) -> &Path {
        &self.build_root
    }

    /// Shared source tree for a library version
    pub fn source_dir(&self, library: &str, version: &str) -> PathBuf {
        self.source_root.join(library).join(version)
    }

    /// Scratch and raw install directories for one target
    pub fn target_dir(&self, library: &str, version: &str, target: &BuildTarget) -> PathBuf {
        self.build_root
            .join(library)
            .join(version)
            .join(target.path_component())
    }

    /// Reorganized output directory for a library
    pub fn final_dir(&self, library: &str) -> PathBuf {
        self.install_root.join(library)
    }

    /// All paths for one (library, version, target)
    pub fn build_paths(&self, library: &str, version: &str, target: &BuildTarget) -> BuildPaths {
        let target_dir = self.target_dir(library, version, target);
        BuildPaths {
            source_dir: self.source_dir(library, version),
            build_dir: target_dir.join("build"),
            install_dir: target_dir.join("install"),
            final_dir: self.final_dir(library),
        }
    }

    /// Raw install directories of the given dependencies for the same target
    ///
    /// Dependencies missing from `versions` are skipped.
    pub fn dependency_dirs(
        &self,
        dependencies: &[String],
        versions: &BTreeMap<String, String>,
        target: &BuildTarget,
    ) -> BTreeMap<String, PathBuf> {
        dependencies
            .iter()
            .filter_map(|dep| {
                versions.get(dep).map(|version| {
                    (
                        dep.clone(),
                        self.target_dir(dep, version, target).join("install"),
                    )
                })
            })
            .collect()
    }

    /// Metadata document path for a library
    pub fn metadata_path(&self, library: &str) -> PathBuf {
        self.final_dir(library).join(METADATA_FILE)
    }

    /// Metadata lock file path for a library
    pub fn metadata_lock_path(&self, library: &str) -> PathBuf {
        self.final_dir(library).join(METADATA_LOCK_FILE)
    }

    fn marker_path(&self, library: &str, version: &str) -> PathBuf {
        self.source_dir(library, version).join(FETCHED_MARKER)
    }

    /// Whether the source tree is completely fetched
    pub fn is_fetched(&self, library: &str, version: &str) -> bool {
        self.marker_path(library, version).is_file()
    }

    /// Mark a source tree as fetched, recording the commit if known
    pub fn write_fetched_marker(
        &self,
        library: &str,
        version: &str,
        commit: Option<&str>,
    ) -> BuildResult<()> {
        let path = self.marker_path(library, version);
        let contents = commit.map(|c| format!("{}\n", c)).unwrap_or_default();
        fs::write(&path, contents).map_err(|e| BuildError::io(&path, e))
    }

    /// Commit recorded in the fetched marker
    pub fn read_fetched_marker(&self, library: &str, version: &str) -> Option<String> {
        let contents = fs::read_to_string(self.marker_path(library, version)).ok()?;
        let commit = contents.trim();
        (!commit.is_empty()).then(|| commit.to_string())
    }

    /// Remove every cached tree of one library
    pub fn clean_library(&self, library: &str) -> BuildResult<()> {
        for dir in [
            self.source_root.join(library),
            self.build_root.join(library),
            self.final_dir(library),
        ] {
            remove_dir_if_exists(&dir)?;
        }
        Ok(())
    }

    /// Remove all cached sources
    pub fn clean_sources(&self) -> BuildResult<()> {
        remove_dir_if_exists(&self.source_root)
    }

    /// Remove all build trees
    pub fn clean_builds(&self) -> BuildResult<()> {
        remove_dir_if_exists(&self.build_root)
    }

    /// Remove sources, builds and installed output
    pub fn clean_all(&self) -> BuildResult<()> {
        self.clean_sources()?;
        self.clean_builds()?;
        remove_dir_if_exists(&self.install_root)
    }
}

fn remove_dir_if_exists(dir: &Path) -> BuildResult<()> {
    if dir.exists() {
        debug!(path = %dir.display(), "removing");
        fs::remove_dir_all(dir).map_err(|e| BuildError::io(dir, e))?;
    }
    Ok(())
}
