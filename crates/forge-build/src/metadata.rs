//! Per-library build metadata
//!
//! Records where a library's source came from and which targets have been
//! built into its output directory. Concurrent writers (threads of this
//! process and other processes sharing the install root) merge their
//! targets instead of overwriting each other.

use crate::dirs::DirectoryManager;
use crate::error::{BuildError, BuildResult};
use crate::target::BuildTarget;
use chrono::Utc;
use forge_config::SourceSpec;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::warn;

/// Source provenance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: Option<String>,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    pub fetched_commit: Option<String>,
}

impl SourceInfo {
    /// Provenance of a source descriptor, with the commit actually fetched
    pub fn from_spec(source: &SourceSpec, fetched_commit: Option<String>) -> Self {
        let url = match source.kind {
            forge_config::SourceKind::Archive => source.archive_location().map(str::to_string),
            forge_config::SourceKind::Local => {
                source.local_path.as_ref().map(|p| p.display().to_string())
            }
            forge_config::SourceKind::Git => source.url.clone(),
        };
        Self {
            kind: source.kind.name().to_string(),
            url,
            reference: source.reference.clone(),
            fetched_commit,
        }
    }
}

/// Metadata document stored at `<install-root>/<lib>/.build_metadata.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMetadata {
    pub library: String,
    pub version: String,
    pub source: SourceInfo,
    /// Target path components, kept sorted
    pub targets_built: BTreeSet<String>,
    /// RFC 3339 timestamp of the last successful write
    pub last_built: String,
}

impl BuildMetadata {
    fn empty(library: &str, version: &str) -> Self {
        Self {
            library: library.to_string(),
            version: version.to_string(),
            source: SourceInfo::default(),
            targets_built: BTreeSet::new(),
            last_built: String::new(),
        }
    }

    fn load(path: &Path) -> BuildResult<Option<Self>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BuildError::io(path, e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| BuildError::metadata(path, e))
    }
}

impl DirectoryManager {
    fn metadata_lock(&self, path: &Path) -> Arc<Mutex<()>> {
        self.metadata_locks
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .clone()
    }

    /// Read a library's metadata document, if present
    pub fn read_build_metadata(&self, library: &str) -> BuildResult<Option<BuildMetadata>> {
        BuildMetadata::load(&self.metadata_path(library))
    }

    /// Record a successfully built target
    ///
    /// Holds the in-process lock for the document and an exclusive OS lock
    /// on the sibling lock file for the whole read-modify-write. The
    /// document is replaced by atomic rename, so readers never see a
    /// partial write. A corrupt document, or one for another version, is
    /// started over.
    pub fn write_build_metadata(
        &self,
        library: &str,
        version: &str,
        target: &BuildTarget,
        source: &SourceInfo,
    ) -> BuildResult<BuildMetadata> {
        let dir = self.final_dir(library);
        fs::create_dir_all(&dir).map_err(|e| BuildError::io(&dir, e))?;

        let path = self.metadata_path(library);
        let lock_path = self.metadata_lock_path(library);

        let process_lock = self.metadata_lock(&path);
        let _process_guard = process_lock.lock();

        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| BuildError::io(&lock_path, e))?;
        lock_file
            .lock()
            .map_err(|e| BuildError::io(&lock_path, e))?;

        let mut metadata = match BuildMetadata::load(&path) {
            Ok(Some(existing)) if existing.version == version => existing,
            Ok(Some(existing)) => {
                warn!(
                    library,
                    old = %existing.version,
                    new = version,
                    "version changed, resetting build metadata"
                );
                BuildMetadata::empty(library, version)
            }
            Ok(None) => BuildMetadata::empty(library, version),
            Err(e) => {
                warn!(library, error = %e, "resetting unreadable build metadata");
                BuildMetadata::empty(library, version)
            }
        };

        metadata.source = source.clone();
        metadata.targets_built.insert(target.path_component());
        metadata.last_built = Utc::now().to_rfc3339();

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| BuildError::io(&dir, e))?;
        serde_json::to_writer_pretty(&mut tmp, &metadata)
            .map_err(|e| BuildError::metadata(&path, e))?;
        tmp.write_all(b"\n")
            .and_then(|_| tmp.flush())
            .map_err(|e| BuildError::io(tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| BuildError::io(&path, e.error))?;

        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{Arch, BuildConfig, LinkType, Os};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn manager(temp: &TempDir) -> DirectoryManager {
        DirectoryManager::new(
            temp.path().join("install"),
            temp.path().join("sources"),
            temp.path().join("builds"),
        )
    }

    fn source() -> SourceInfo {
        SourceInfo::from_spec(
            &SourceSpec::git("https://github.com/madler/zlib.git", "v1.3.1"),
            Some("51b7f2abdade71cd9bb0e7a373ef2610ec6f9daf".to_string()),
        )
    }

    fn target(config: BuildConfig) -> BuildTarget {
        BuildTarget::new(Os::Linux, Arch::X86_64, config, LinkType::Static)
    }

    #[test]
    fn test_document_shape() {
        let temp = TempDir::new().unwrap();
        let dirs = manager(&temp);
        dirs.write_build_metadata("zlib", "1.3.1", &target(BuildConfig::Release), &source())
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dirs.metadata_path("zlib")).unwrap())
                .unwrap();
        assert_eq!(raw["library"], "zlib");
        assert_eq!(raw["version"], "1.3.1");
        assert_eq!(raw["source"]["type"], "git");
        assert_eq!(raw["source"]["ref"], "v1.3.1");
        assert_eq!(
            raw["source"]["fetched_commit"],
            "51b7f2abdade71cd9bb0e7a373ef2610ec6f9daf"
        );
        assert_eq!(raw["targets_built"], serde_json::json!(["linux_x86_64_static"]));
        assert!(chrono::DateTime::parse_from_rfc3339(raw["last_built"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_targets_accumulate_sorted() {
        let temp = TempDir::new().unwrap();
        let dirs = manager(&temp);
        dirs.write_build_metadata("zlib", "1.3.1", &target(BuildConfig::Release), &source())
            .unwrap();
        dirs.write_build_metadata("zlib", "1.3.1", &target(BuildConfig::Debug), &source())
            .unwrap();
        dirs.write_build_metadata("zlib", "1.3.1", &target(BuildConfig::Release), &source())
            .unwrap();

        let metadata = dirs.read_build_metadata("zlib").unwrap().unwrap();
        assert_eq!(
            metadata.targets_built.into_iter().collect::<Vec<_>>(),
            vec!["linux_x86_64_static", "linux_x86_64_static_debug"]
        );
    }

    #[test]
    fn test_corrupt_document_is_reset() {
        let temp = TempDir::new().unwrap();
        let dirs = manager(&temp);
        fs::create_dir_all(dirs.final_dir("zlib")).unwrap();
        fs::write(dirs.metadata_path("zlib"), "{ not json").unwrap();

        assert!(dirs.read_build_metadata("zlib").is_err());

        let metadata = dirs
            .write_build_metadata("zlib", "1.3.1", &target(BuildConfig::Debug), &source())
            .unwrap();
        assert_eq!(metadata.targets_built.len(), 1);
        assert!(dirs.read_build_metadata("zlib").unwrap().is_some());
    }

    #[test]
    fn test_version_change_resets_targets() {
        let temp = TempDir::new().unwrap();
        let dirs = manager(&temp);
        dirs.write_build_metadata("zlib", "1.3.0", &target(BuildConfig::Debug), &source())
            .unwrap();
        let metadata = dirs
            .write_build_metadata("zlib", "1.3.1", &target(BuildConfig::Release), &source())
            .unwrap();

        assert_eq!(metadata.version, "1.3.1");
        assert_eq!(metadata.targets_built.len(), 1);
        assert!(metadata.targets_built.contains("linux_x86_64_static"));
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let temp = TempDir::new().unwrap();
        let dirs = manager(&temp);
        dirs.write_build_metadata("zlib", "1.3.1", &target(BuildConfig::Debug), &source())
            .unwrap();

        let mut names: Vec<String> = fs::read_dir(dirs.final_dir("zlib"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec![".build_metadata.json", ".build_metadata.lock"]);
    }

    #[test]
    fn test_source_info_for_archive_and_local() {
        let archive = SourceInfo::from_spec(&SourceSpec::archive("https://x/y.tar.gz"), None);
        assert_eq!(archive.kind, "archive");
        assert_eq!(archive.url.as_deref(), Some("https://x/y.tar.gz"));

        let local = SourceInfo::from_spec(&SourceSpec::local("vendor/eigen"), None);
        assert_eq!(local.kind, "local");
        assert_eq!(local.url.as_deref(), Some("vendor/eigen"));
        assert_eq!(local.reference, None);
    }
}
