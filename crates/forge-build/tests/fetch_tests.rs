//! Source cache behavior: single fetch under contention, permanent failures,
//! archive flattening, local overlays and patches

use flate2::write::GzEncoder;
use flate2::Compression;
use forge_build::{BuildError, BuildResult, DirectoryManager, SourceBackend, SourceFetcher};
use forge_config::SourceSpec;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

/// Counts invocations; slow enough that concurrent callers overlap
struct CountingBackend {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingBackend {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SourceBackend for CountingBackend {
    fn fetch(
        &self,
        _library: &str,
        _source: &SourceSpec,
        dest: &Path,
        _base_dir: &Path,
    ) -> BuildResult<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        if self.fail {
            return Err(BuildError::process("git", "could not resolve host"));
        }
        fs::create_dir_all(dest)?;
        fs::write(dest.join("CMakeLists.txt"), "project(counted)")?;
        Ok(Some("0123456789abcdef0123456789abcdef01234567".to_string()))
    }
}

fn manager(temp: &TempDir) -> Arc<DirectoryManager> {
    Arc::new(DirectoryManager::new(
        temp.path().join("install"),
        temp.path().join("sources"),
        temp.path().join("builds"),
    ))
}

fn git_source() -> SourceSpec {
    SourceSpec::git("https://example.invalid/zlib.git", "v1.3.1")
}

#[test]
fn test_concurrent_fetch_runs_backend_once() {
    let temp = TempDir::new().unwrap();
    let backend = CountingBackend::new(false);
    let fetcher = SourceFetcher::with_backend(manager(&temp), temp.path(), backend.clone());
    let source = git_source();

    let paths: Vec<PathBuf> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| fetcher.fetch("zlib", "1.3.1", &source).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(backend.calls(), 1);
    assert!(paths.windows(2).all(|w| w[0] == w[1]));
    assert!(paths[0].join("CMakeLists.txt").is_file());
    assert_eq!(
        fetcher.actual_commit("zlib", "1.3.1").as_deref(),
        Some("0123456789abcdef0123456789abcdef01234567")
    );
}

#[test]
fn test_different_libraries_fetch_independently() {
    let temp = TempDir::new().unwrap();
    let backend = CountingBackend::new(false);
    let fetcher = SourceFetcher::with_backend(manager(&temp), temp.path(), backend.clone());
    let source = git_source();

    thread::scope(|scope| {
        for name in ["zlib", "libpng", "glm"] {
            let fetcher = &fetcher;
            let source = &source;
            scope.spawn(move || fetcher.fetch(name, "1.0", source).unwrap());
        }
    });

    assert_eq!(backend.calls(), 3);
}

#[test]
fn test_marker_survives_new_fetcher() {
    let temp = TempDir::new().unwrap();
    let first = CountingBackend::new(false);
    SourceFetcher::with_backend(manager(&temp), temp.path(), first.clone())
        .fetch("zlib", "1.3.1", &git_source())
        .unwrap();

    let second = CountingBackend::new(false);
    SourceFetcher::with_backend(manager(&temp), temp.path(), second.clone())
        .fetch("zlib", "1.3.1", &git_source())
        .unwrap();

    assert_eq!(first.calls(), 1);
    assert_eq!(second.calls(), 0);
}

#[test]
fn test_failure_is_permanent_for_the_process() {
    let temp = TempDir::new().unwrap();
    let backend = CountingBackend::new(true);
    let dirs = manager(&temp);
    let fetcher = SourceFetcher::with_backend(Arc::clone(&dirs), temp.path(), backend.clone());

    let first = fetcher.fetch("zlib", "1.3.1", &git_source()).unwrap_err();
    assert!(matches!(first, BuildError::Fetch { .. }));
    assert!(!dirs.source_dir("zlib", "1.3.1").exists());

    let errors: Vec<BuildError> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| fetcher.fetch("zlib", "1.3.1", &git_source()).unwrap_err()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(backend.calls(), 1);
    for err in errors {
        assert!(err.to_string().contains("could not resolve host"));
    }
    assert!(fetcher.has_failed("zlib", "1.3.1"));
    assert!(!fetcher.has_failed("zlib", "1.3.2"));
}

#[cfg(unix)]
#[test]
fn test_archive_single_root_is_flattened() {
    let temp = TempDir::new().unwrap();
    let staging = temp.path().join("staging/foo-1.2.3");
    fs::create_dir_all(staging.join("src")).unwrap();
    fs::write(staging.join("CMakeLists.txt"), "project(foo)").unwrap();
    fs::write(staging.join("src/foo.c"), "int foo(void) { return 1; }").unwrap();

    let archive_path = temp.path().join("foo-1.2.3.tar.gz");
    let encoder = GzEncoder::new(fs::File::create(&archive_path).unwrap(), Compression::default());
    let mut tar = tar::Builder::new(encoder);
    tar.append_dir_all("foo-1.2.3", &staging).unwrap();
    tar.into_inner().unwrap().finish().unwrap();

    let dirs = manager(&temp);
    let fetcher = SourceFetcher::new(Arc::clone(&dirs), temp.path());
    let source = SourceSpec::archive(format!("file://{}", archive_path.display()));

    let dir = fetcher.fetch("foo", "1.2.3", &source).unwrap();
    assert_eq!(dir, dirs.source_dir("foo", "1.2.3"));
    assert!(dir.join("CMakeLists.txt").is_file());
    assert!(dir.join("src/foo.c").is_file());
    assert!(!dir.join("foo-1.2.3").exists());
    assert!(dirs.is_fetched("foo", "1.2.3"));
    assert_eq!(fetcher.actual_commit("foo", "1.2.3"), None);
}

#[test]
fn test_local_source_with_overlay() {
    let temp = TempDir::new().unwrap();
    let manifest_dir = temp.path().join("manifest");
    fs::create_dir_all(manifest_dir.join("vendor/mylib/cmake")).unwrap();
    fs::create_dir_all(manifest_dir.join("vendor/mylib/.git")).unwrap();
    fs::write(manifest_dir.join("vendor/mylib/cmake/CMakeLists.txt"), "project(mylib)").unwrap();
    fs::write(manifest_dir.join("vendor/mylib/.git/HEAD"), "ref").unwrap();
    fs::create_dir_all(manifest_dir.join("overlays")).unwrap();
    fs::write(manifest_dir.join("overlays/config.h"), "#define MYLIB 1").unwrap();

    let dirs = manager(&temp);
    let fetcher = SourceFetcher::new(Arc::clone(&dirs), &manifest_dir);
    let source = SourceSpec::local("vendor/mylib")
        .with_source_subdir("cmake")
        .with_copy_file("overlays/config.h", "include/config.h");

    let dir = fetcher.fetch("mylib", "0.1", &source).unwrap();
    assert!(dir.join("cmake/CMakeLists.txt").is_file());
    assert!(dir.join("cmake/include/config.h").is_file());
    assert!(!dir.join(".git").exists());
}

const HELLO: &str = "/* hello */\n#include <stdio.h>\n\nint main(void) {\n    printf(\"hello\\n\");\n    return 0;\n}\n\n/* end */\n";

fn tool_available(tool: &str) -> bool {
    Command::new(tool).arg("--version").output().is_ok_and(|o| o.status.success())
}

/// Hunk replacing the printf line, with `include` as its first context line
fn hello_patch(include: &str, function: &str) -> String {
    format!(
        "--- a/hello.c\n+++ b/hello.c\n@@ -2,7 +2,7 @@\n \
         #include <{include}>\n \n {function} {{\n\
         -    printf(\"hello\\n\");\n+    printf(\"patched\\n\");\n     return 0;\n }}\n \n"
    )
}

/// Local `hello` source under `<temp>/manifest/vendor/hello` plus a patch file
fn patched_source(temp: &TempDir, patch: Option<&str>) -> (PathBuf, SourceSpec) {
    let manifest_dir = temp.path().join("manifest");
    fs::create_dir_all(manifest_dir.join("vendor/hello")).unwrap();
    fs::create_dir_all(manifest_dir.join("patches")).unwrap();
    fs::write(manifest_dir.join("vendor/hello/hello.c"), HELLO).unwrap();
    if let Some(patch) = patch {
        fs::write(manifest_dir.join("patches/hello.patch"), patch).unwrap();
    }
    let source = SourceSpec::local("vendor/hello").with_patch("patches/hello.patch");
    (manifest_dir, source)
}

#[test]
fn test_patch_applied_with_git() {
    if !tool_available("git") {
        return;
    }
    let temp = TempDir::new().unwrap();
    let (manifest_dir, source) = patched_source(&temp, Some(&hello_patch("stdio.h", "int main(void)")));
    let dirs = manager(&temp);
    let fetcher = SourceFetcher::new(Arc::clone(&dirs), &manifest_dir);

    let dir = fetcher.fetch("hello", "1.0", &source).unwrap();
    let patched = fs::read_to_string(dir.join("hello.c")).unwrap();
    assert!(patched.contains("printf(\"patched\\n\")"));
    assert!(!patched.contains("printf(\"hello\\n\")"));
    assert!(!dir.join("hello.c.rej").exists());
    assert!(dirs.is_fetched("hello", "1.0"));

    // The original tree is untouched
    assert_eq!(fs::read_to_string(manifest_dir.join("vendor/hello/hello.c")).unwrap(), HELLO);
}

#[test]
fn test_patch_falls_back_to_patch_tool() {
    if !tool_available("git") || !tool_available("patch") {
        return;
    }
    // Stale first context line: git apply refuses it, patch(1) accepts it with fuzz
    let temp = TempDir::new().unwrap();
    let (manifest_dir, source) = patched_source(&temp, Some(&hello_patch("stdlib.h", "int main(void)")));
    let dirs = manager(&temp);
    let fetcher = SourceFetcher::new(Arc::clone(&dirs), &manifest_dir);

    let dir = fetcher.fetch("hello", "1.0", &source).unwrap();
    let patched = fs::read_to_string(dir.join("hello.c")).unwrap();
    assert!(patched.contains("printf(\"patched\\n\")"));
    assert!(patched.contains("#include <stdio.h>"));
    assert!(dirs.is_fetched("hello", "1.0"));
}

#[test]
fn test_patch_that_does_not_apply_fails_fetch() {
    let temp = TempDir::new().unwrap();
    let (manifest_dir, source) = patched_source(&temp, Some(&hello_patch("nothing.h", "int other(void)")));
    let dirs = manager(&temp);
    let fetcher = SourceFetcher::new(Arc::clone(&dirs), &manifest_dir);

    let err = fetcher.fetch("hello", "1.0", &source).unwrap_err();
    assert!(matches!(err, BuildError::Fetch { .. }));
    assert!(err.to_string().contains("failed to apply"), "{err}");
    assert!(!dirs.source_dir("hello", "1.0").exists());
    assert!(!dirs.is_fetched("hello", "1.0"));
    assert!(fetcher.has_failed("hello", "1.0"));

    // Fixing the patch does not help within the same process
    fs::write(manifest_dir.join("patches/hello.patch"), hello_patch("stdio.h", "int main(void)")).unwrap();
    let again = fetcher.fetch("hello", "1.0", &source).unwrap_err();
    assert_eq!(again.to_string(), err.to_string());
    assert!(!dirs.source_dir("hello", "1.0").exists());
}

#[test]
fn test_missing_patch_fails_fetch() {
    let temp = TempDir::new().unwrap();
    let (manifest_dir, source) = patched_source(&temp, None);
    let dirs = manager(&temp);
    let fetcher = SourceFetcher::new(Arc::clone(&dirs), &manifest_dir);

    let err = fetcher.fetch("hello", "1.0", &source).unwrap_err();
    assert!(matches!(err, BuildError::Fetch { .. }));
    assert!(err.to_string().contains("patch not found"), "{err}");
    assert!(err.to_string().contains("hello.patch"), "{err}");
    assert!(!dirs.source_dir("hello", "1.0").exists());
    assert!(fetcher.has_failed("hello", "1.0"));
}
