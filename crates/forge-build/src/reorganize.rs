//! Output reorganization
//!
//! Build systems install into `install/{include,lib,bin,share}` with their
//! own conventions. The reorganizer normalizes that into:
//!
//! ```text
//! <install-root>/<lib>/h/<os>/            headers, shared by every target of an OS
//! <install-root>/<lib>/lib/<target>/      flattened library files
//! <install-root>/{cmake,pkgconfig}/<lib>/ package configs (opt-in)
//! ```
//!
//! Existing destination files are never overwritten, so reorganizing the
//! same inputs twice leaves the tree unchanged.

use crate::error::{BuildError, BuildResult};
use crate::fsutil::{copy_dir_filtered, copy_dir_recursive, symlink_or_copy};
use crate::process::ProcessRunner;
use crate::target::{BuildTarget, Os};
use parking_lot::Mutex;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extensions kept when copying headers
pub const HEADER_EXTENSIONS: &[&str] = &["h", "hpp", "hxx", "inl", "inc", "cpp", "c", "cxx", "cc"];

/// Extensions never copied into a library directory
pub const UNWANTED_EXTENSIONS: &[&str] = &["md", "json", "lock", "cmake", "txt", "rst", "3", "pc"];

const STATIC_SKIP_EXTENSIONS: &[&str] = &["dylib", "so", "dll"];
const SHARED_SKIP_EXTENSIONS: &[&str] = &["a"];
const DEBUG_SUFFIX_EXTENSIONS: &[&str] = &[".a", ".dylib", ".so", ".lib", ".dll"];

/// Normalizes raw install trees into the final layout
pub struct Reorganizer {
    install_root: PathBuf,
    include_cmake_configs: bool,
    header_locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl Reorganizer {
    /// Create a reorganizer writing central configs under `install_root`
    pub fn new(install_root: impl Into<PathBuf>) -> Self {
        Self {
            install_root: install_root.into(),
            include_cmake_configs: false,
            header_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Also copy CMake and pkg-config files to the central location
    pub fn with_cmake_configs(mut self, include: bool) -> Self {
        self.include_cmake_configs = include;
        self
    }

    /// Reorganize one target's raw install tree into `final_dir`
    pub fn reorganize(
        &self,
        library: &str,
        target: &BuildTarget,
        install_dir: &Path,
        final_dir: &Path,
    ) -> BuildResult<()> {
        if !install_dir.is_dir() {
            return Err(BuildError::reorganize(
                library,
                target,
                format!("install directory {} does not exist", install_dir.display()),
            ));
        }
        if !["include", "lib", "bin"]
            .iter()
            .any(|d| install_dir.join(d).is_dir())
        {
            return Err(BuildError::reorganize(
                library,
                target,
                format!(
                    "install directory {} has no include/, lib/ or bin/",
                    install_dir.display()
                ),
            ));
        }

        fs::create_dir_all(final_dir).map_err(|e| BuildError::io(final_dir, e))?;

        self.copy_headers(install_dir, final_dir, target)?;

        let final_lib = final_dir.join("lib").join(target.path_component());
        let copied = self.copy_libraries(library, install_dir, &final_lib, target)?;

        if target.is_shared() && target.os.is_apple() {
            let dylibs: Vec<&PathBuf> = copied
                .iter()
                .filter(|p| p.extension().is_some_and(|e| e == "dylib"))
                .collect();
            for dylib in dylibs {
                if let Err(e) = fix_install_names(dylib) {
                    warn!(library, path = %dylib.display(), error = %e, "failed to rewrite install names");
                }
            }
        }

        if target.is_shared() && target.os == Os::Windows {
            copy_windows_dlls(install_dir, &final_lib, target.is_debug())?;
        }

        if target.is_shared() && target.is_debug() && final_lib.is_dir() {
            create_debug_symlinks(&final_lib)?;
        }

        if self.include_cmake_configs {
            self.copy_package_configs(library, install_dir)?;
        }

        Ok(())
    }

    fn header_lock(&self, dest: &Path) -> Arc<Mutex<()>> {
        self.header_locks
            .lock()
            .entry(dest.to_path_buf())
            .or_default()
            .clone()
    }

    fn copy_headers(&self, install_dir: &Path, final_dir: &Path, target: &BuildTarget) -> BuildResult<()> {
        let src = install_dir.join("include");
        if !src.is_dir() {
            return Ok(());
        }

        let platform = target.platform_component();
        let dest = final_dir.join("h").join(platform);
        let lock = self.header_lock(&dest);
        let _guard = lock.lock();

        if dest.exists() {
            return Ok(());
        }

        // Staged so an interrupted copy never looks complete
        let staging = final_dir.join("h").join(format!(".{}.partial", platform));
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| BuildError::io(&staging, e))?;
        }
        copy_dir_filtered(&src, &staging, |path| {
            extension_lower(path).is_some_and(|ext| HEADER_EXTENSIONS.contains(&ext.as_str()))
        })?;
        fs::rename(&staging, &dest).map_err(|e| BuildError::io(&dest, e))?;

        debug!(dest = %dest.display(), "copied headers");
        Ok(())
    }

    /// Copy library files from `install/lib`; returns the newly created files
    fn copy_libraries(
        &self,
        library: &str,
        install_dir: &Path,
        final_lib: &Path,
        target: &BuildTarget,
    ) -> BuildResult<Vec<PathBuf>> {
        let src = install_dir.join("lib");
        if !src.is_dir() {
            return Ok(Vec::new());
        }
        fs::create_dir_all(final_lib).map_err(|e| BuildError::io(final_lib, e))?;

        let walker = WalkDir::new(&src)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if !e.file_type().is_dir() {
                    return true;
                }
                let name = e.file_name().to_string_lossy();
                let config_dir = e.depth() == 1 && (name == "cmake" || name == "pkgconfig");
                !config_dir && !name.ends_with(".framework")
            });

        let mut candidates = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&src).to_path_buf();
                BuildError::io(path, e.into())
            })?;
            if !entry.file_type().is_dir() {
                candidates.push(entry.into_path());
            }
        }

        let source_names: HashSet<String> = candidates
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();

        let mut copied = Vec::new();
        for path in candidates {
            // Follows symlinks; dangling links and links to directories are skipped
            let Ok(meta) = fs::metadata(&path) else {
                debug!(library, path = %path.display(), "skipping dangling symlink");
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let Some(mut dest_name) = library_dest_name(&name, target, &source_names, final_lib) else {
                continue;
            };
            if target.is_debug() {
                dest_name = normalize_debug_lib_name(&dest_name);
            }

            let dest = final_lib.join(&dest_name);
            if dest.symlink_metadata().is_ok() {
                continue;
            }
            fs::copy(&path, &dest).map_err(|e| BuildError::io(&path, e))?;
            copied.push(dest);
        }

        Ok(copied)
    }

    fn copy_package_configs(&self, library: &str, install_dir: &Path) -> BuildResult<()> {
        let sources = [
            ("cmake", ["lib/cmake", "share/cmake", "cmake"].as_slice()),
            ("pkgconfig", ["lib/pkgconfig", "share/pkgconfig"].as_slice()),
        ];

        for (kind, candidates) in sources {
            let dest = self.install_root.join(kind).join(library);
            if dest.exists() {
                continue;
            }
            if let Some(src) = candidates
                .iter()
                .map(|c| install_dir.join(c))
                .find(|p| p.is_dir())
            {
                copy_dir_recursive(&src, &dest)?;
                debug!(library, dest = %dest.display(), "copied package configs");
            }
        }
        Ok(())
    }
}

/// Destination name for a library file, or `None` when it is filtered out
fn library_dest_name(
    name: &str,
    target: &BuildTarget,
    source_names: &HashSet<String>,
    final_lib: &Path,
) -> Option<String> {
    let ext = extension_lower(Path::new(name)).unwrap_or_default();

    if UNWANTED_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }

    if !target.is_shared() {
        if STATIC_SKIP_EXTENSIONS.contains(&ext.as_str()) || name.contains(".so.") {
            return None;
        }
        return Some(name.to_string());
    }

    if SHARED_SKIP_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    if !is_versioned_lib(name) {
        return Some(name.to_string());
    }

    let base = base_lib_name(name);
    if base == name {
        // Hyphen-versioned names have no derivable unversioned form
        return None;
    }
    let present = source_names.contains(&base)
        || final_lib.join(&base).symlink_metadata().is_ok()
        || final_lib.join(normalize_debug_lib_name(&base)).symlink_metadata().is_ok();
    (!present).then_some(base)
}

fn extension_lower(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

fn hyphen_version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-\d+\.\d+").expect("hyphen version regex must compile"))
}

fn hyphen_three_component_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^lib.*-\d+\.\d+\.\d+.*\.dylib$").expect("hyphen dylib regex must compile")
    })
}

fn versioned_dylib_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(lib[^.]+)(\.\d+)+\.dylib$").expect("versioned dylib regex must compile")
    })
}

fn versioned_so_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(lib[^.]+\.so)(\.\d+)+$").expect("versioned so regex must compile")
    })
}

/// Whether a file name carries a soname-style version
///
/// `libz.1.3.1.dylib`, `libz.so.1` and `libwx_baseu-3.3.1.dylib` are
/// versioned; `libz.dylib` and the two-component `libwx_baseu-3.3.dylib` are not.
pub fn is_versioned_lib(name: &str) -> bool {
    if name.contains('-') && hyphen_version_re().is_match(name) {
        return hyphen_three_component_re().is_match(name);
    }
    versioned_dylib_re().is_match(name) || versioned_so_re().is_match(name)
}

/// Strip soname version components (`libz.1.3.1.dylib` -> `libz.dylib`)
pub fn base_lib_name(name: &str) -> String {
    if let Some(caps) = versioned_dylib_re().captures(name) {
        return format!("{}.dylib", &caps[1]);
    }
    if let Some(caps) = versioned_so_re().captures(name) {
        return caps[1].to_string();
    }
    name.to_string()
}

/// Ensure a library name carries the `d` debug suffix
///
/// `libz.a` -> `libzd.a`, `libcurl-d.a` -> `libcurld.a`, `libz.so.1` ->
/// `libzd.so.1`. Names already ending in `d` are unchanged.
pub fn normalize_debug_lib_name(name: &str) -> String {
    fn suffixed(base: &str, rest: &str) -> String {
        if let Some(stem) = base.strip_suffix("-d") {
            format!("{}d{}", stem, rest)
        } else if base.ends_with('d') {
            format!("{}{}", base, rest)
        } else {
            format!("{}d{}", base, rest)
        }
    }

    for ext in DEBUG_SUFFIX_EXTENSIONS {
        if let Some(base) = name.strip_suffix(ext) {
            return suffixed(base, ext);
        }
    }
    if let Some(idx) = name.find(".so.") {
        return suffixed(&name[..idx], &name[idx..]);
    }
    name.to_string()
}

fn copy_windows_dlls(install_dir: &Path, final_lib: &Path, debug: bool) -> BuildResult<()> {
    let bin = install_dir.join("bin");
    if !bin.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(final_lib).map_err(|e| BuildError::io(final_lib, e))?;

    for entry in WalkDir::new(&bin).into_iter().filter_map(Result::ok) {
        let path = entry.path();
        if !entry.file_type().is_file() || extension_lower(path).as_deref() != Some("dll") {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        let dest_name = if debug {
            normalize_debug_lib_name(&name)
        } else {
            name.into_owned()
        };
        let dest = final_lib.join(dest_name);
        if !dest.exists() {
            fs::copy(path, &dest).map_err(|e| BuildError::io(path, e))?;
        }
    }
    Ok(())
}

/// Link `libfoo.dylib` to `libfood.dylib` (and `.so`) for name-based lookups
fn create_debug_symlinks(lib_dir: &Path) -> BuildResult<()> {
    let entries = fs::read_dir(lib_dir).map_err(|e| BuildError::io(lib_dir, e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .map(|e| e.path())
        .collect();
    files.sort();

    for file in files {
        let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some((base, ext)) = [".dylib", ".so"]
            .iter()
            .find_map(|ext| name.strip_suffix(ext).map(|b| (b, *ext)))
        else {
            continue;
        };
        let Some(release_base) = base.strip_suffix('d') else {
            continue;
        };

        let link = lib_dir.join(format!("{}{}", release_base, ext));
        if link.symlink_metadata().is_err() {
            symlink_or_copy(&file, &link)?;
            debug!(link = %link.display(), "created debug alias");
        }
    }
    Ok(())
}

/// Rewrite a dylib's install id and references to unversioned names
fn fix_install_names(dylib: &Path) -> BuildResult<()> {
    let runner = ProcessRunner::new();

    let listing = runner.run(Command::new("otool").arg("-L").arg(dylib))?;
    if !listing.success() {
        return Err(BuildError::process("otool", listing.output()));
    }

    let mut changes = Vec::new();
    for line in listing.stdout.lines().skip(1) {
        let reference = line.trim().split(" (").next().unwrap_or("").trim();
        let Some(file_name) = Path::new(reference).file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if is_versioned_lib(file_name) {
            let renamed = reference.replace(file_name, &base_lib_name(file_name));
            changes.push((reference.to_string(), renamed));
        }
    }

    if !changes.is_empty() {
        let mut cmd = Command::new("install_name_tool");
        for (old, new) in &changes {
            cmd.arg("-change").arg(old).arg(new);
        }
        cmd.arg(dylib);
        let result = runner.run(&mut cmd)?;
        if !result.success() {
            return Err(BuildError::process("install_name_tool", result.output()));
        }
    }

    let id = runner.run(Command::new("otool").arg("-D").arg(dylib))?;
    if !id.success() {
        return Err(BuildError::process("otool", id.output()));
    }
    if let Some(current) = id.stdout.lines().nth(1).map(str::trim) {
        if let Some(file_name) = Path::new(current).file_name().and_then(|n| n.to_str()) {
            if is_versioned_lib(file_name) {
                let new_id = current.replace(file_name, &base_lib_name(file_name));
                let result = runner.run(
                    Command::new("install_name_tool")
                        .arg("-id")
                        .arg(&new_id)
                        .arg(dylib),
                )?;
                if !result.success() {
                    return Err(BuildError::process("install_name_tool", result.output()));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{Arch, BuildConfig, LinkType};
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("libz.a", "libzd.a")]
    #[case("libcurl-d.a", "libcurld.a")]
    #[case("libfreetyped.a", "libfreetyped.a")]
    #[case("libz.so.1", "libzd.so.1")]
    #[case("zlib.lib", "zlibd.lib")]
    #[case("libgif.dylib", "libgifd.dylib")]
    #[case("README", "README")]
    fn test_normalize_debug_lib_name(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_debug_lib_name(input), expected);
    }

    #[rstest]
    #[case("libz.1.3.1.dylib", true)]
    #[case("libz.1.dylib", true)]
    #[case("libz.so.1.3.1", true)]
    #[case("libz.so.1", true)]
    #[case("libwx_baseu-3.3.1.dylib", true)]
    #[case("libz.dylib", false)]
    #[case("libz.so", false)]
    #[case("libz.a", false)]
    #[case("libwx_baseu-3.3.dylib", false)]
    fn test_is_versioned_lib(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_versioned_lib(name), expected);
    }

    #[rstest]
    #[case("libz.1.3.1.dylib", "libz.dylib")]
    #[case("libpng16.16.dylib", "libpng16.dylib")]
    #[case("libz.so.1.3.1", "libz.so")]
    #[case("libz.a", "libz.a")]
    fn test_base_lib_name(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(base_lib_name(name), expected);
    }

    fn linux(config: BuildConfig, link: LinkType) -> BuildTarget {
        BuildTarget::new(Os::Linux, Arch::X86_64, config, link)
    }

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_missing_install_tree() {
        let temp = TempDir::new().unwrap();
        let reorganizer = Reorganizer::new(temp.path());
        let target = linux(BuildConfig::Release, LinkType::Static);

        let err = reorganizer
            .reorganize("zlib", &target, &temp.path().join("nope"), &temp.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, BuildError::Reorganize { .. }));

        let empty = temp.path().join("empty");
        fs::create_dir_all(empty.join("share")).unwrap();
        assert!(reorganizer
            .reorganize("zlib", &target, &empty, &temp.path().join("out"))
            .is_err());
    }

    #[test]
    fn test_static_release_layout() {
        let temp = TempDir::new().unwrap();
        let install = temp.path().join("install");
        write(&install.join("include/zlib.h"), "h");
        write(&install.join("include/README.md"), "docs");
        write(&install.join("lib/libz.a"), "a");
        write(&install.join("lib/libz.so.1.3.1"), "so");
        write(&install.join("lib/libz.so"), "so");
        write(&install.join("lib/nested/deeper/libextra.a"), "a");
        write(&install.join("lib/pkgconfig/zlib.pc"), "pc");
        write(&install.join("lib/Foo.framework/Foo"), "fw");
        write(&install.join("lib/notes.txt"), "txt");

        let final_dir = temp.path().join("out/zlib");
        let target = linux(BuildConfig::Release, LinkType::Static);
        Reorganizer::new(temp.path().join("out"))
            .reorganize("zlib", &target, &install, &final_dir)
            .unwrap();

        assert!(final_dir.join("h/linux/zlib.h").is_file());
        assert!(!final_dir.join("h/linux/README.md").exists());

        let lib = final_dir.join("lib/linux_x86_64_static");
        let mut names: Vec<String> = fs::read_dir(&lib)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["libextra.a", "libz.a"]);
        assert!(!temp.path().join("out/pkgconfig/zlib").exists());
    }

    #[test]
    fn test_shared_versioned_names() {
        let temp = TempDir::new().unwrap();
        let install = temp.path().join("install");
        write(&install.join("lib/libz.so.1.3.1"), "real");
        write(&install.join("lib/libz.so"), "real");
        write(&install.join("lib/libbar.so.2"), "bar");
        write(&install.join("lib/libz.a"), "static");

        let final_dir = temp.path().join("out/zlib");
        let target = linux(BuildConfig::Release, LinkType::Shared);
        Reorganizer::new(temp.path().join("out"))
            .reorganize("zlib", &target, &install, &final_dir)
            .unwrap();

        let lib = final_dir.join("lib/linux_x86_64_shared");
        assert!(lib.join("libz.so").is_file());
        assert!(!lib.join("libz.so.1.3.1").exists());
        assert_eq!(fs::read_to_string(lib.join("libbar.so")).unwrap(), "bar");
        assert!(!lib.join("libz.a").exists());
    }

    #[test]
    fn test_debug_static_suffix() {
        let temp = TempDir::new().unwrap();
        let install = temp.path().join("install");
        write(&install.join("lib/libz.a"), "a");
        write(&install.join("lib/libcurl-d.a"), "a");

        let final_dir = temp.path().join("out/z");
        let target = linux(BuildConfig::Debug, LinkType::Static);
        Reorganizer::new(temp.path().join("out"))
            .reorganize("z", &target, &install, &final_dir)
            .unwrap();

        let lib = final_dir.join("lib/linux_x86_64_static_debug");
        assert!(lib.join("libzd.a").is_file());
        assert!(lib.join("libcurld.a").is_file());
        assert!(!lib.join("libz.a").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_copied_under_link_name() {
        let temp = TempDir::new().unwrap();
        let install = temp.path().join("install");
        write(&install.join("lib/libpng16.a"), "png");
        std::os::unix::fs::symlink("libpng16.a", install.join("lib/libpng.a")).unwrap();
        std::os::unix::fs::symlink("missing.a", install.join("lib/libdangling.a")).unwrap();

        let final_dir = temp.path().join("out/png");
        let target = linux(BuildConfig::Release, LinkType::Static);
        Reorganizer::new(temp.path().join("out"))
            .reorganize("png", &target, &install, &final_dir)
            .unwrap();

        let lib = final_dir.join("lib/linux_x86_64_static");
        let link_copy = lib.join("libpng.a");
        assert!(!link_copy.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(link_copy).unwrap(), "png");
        assert!(!lib.join("libdangling.a").exists());
    }

    #[test]
    fn test_never_overwrites_existing_files() {
        let temp = TempDir::new().unwrap();
        let install = temp.path().join("install");
        write(&install.join("include/a.h"), "new");
        write(&install.join("lib/liba.a"), "new");

        let final_dir = temp.path().join("out/a");
        write(&final_dir.join("h/linux/a.h"), "old");
        write(&final_dir.join("lib/linux_x86_64_static/liba.a"), "old");

        let target = linux(BuildConfig::Release, LinkType::Static);
        Reorganizer::new(temp.path().join("out"))
            .reorganize("a", &target, &install, &final_dir)
            .unwrap();

        assert_eq!(fs::read_to_string(final_dir.join("h/linux/a.h")).unwrap(), "old");
        assert_eq!(
            fs::read_to_string(final_dir.join("lib/linux_x86_64_static/liba.a")).unwrap(),
            "old"
        );
    }

    #[test]
    fn test_central_package_configs() {
        let temp = TempDir::new().unwrap();
        let install = temp.path().join("install");
        write(&install.join("lib/libz.a"), "a");
        write(&install.join("lib/cmake/ZLIB/ZLIBConfig.cmake"), "cmake");
        write(&install.join("share/pkgconfig/zlib.pc"), "pc");

        let out = temp.path().join("out");
        let target = linux(BuildConfig::Release, LinkType::Static);
        Reorganizer::new(&out)
            .with_cmake_configs(true)
            .reorganize("zlib", &target, &install, &out.join("zlib"))
            .unwrap();

        assert!(out.join("cmake/zlib/ZLIB/ZLIBConfig.cmake").is_file());
        assert!(out.join("pkgconfig/zlib/zlib.pc").is_file());
        assert!(!out.join("zlib/lib/linux_x86_64_static/ZLIBConfig.cmake").exists());
    }

    #[test]
    fn test_windows_shared_dlls_from_bin() {
        let temp = TempDir::new().unwrap();
        let install = temp.path().join("install");
        write(&install.join("lib/zlib.lib"), "import");
        write(&install.join("bin/zlib1.dll"), "dll");
        write(&install.join("bin/tools/extra.dll"), "dll");

        let final_dir = temp.path().join("out/zlib");
        let target = BuildTarget::new(Os::Windows, Arch::X86_64, BuildConfig::Release, LinkType::Shared);
        Reorganizer::new(temp.path().join("out"))
            .reorganize("zlib", &target, &install, &final_dir)
            .unwrap();

        let lib = final_dir.join("lib/windows_x86_64_vc143_shared");
        assert!(lib.join("zlib.lib").is_file());
        assert!(lib.join("zlib1.dll").is_file());
        assert!(lib.join("extra.dll").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_linux_shared_debug_alias() {
        let temp = TempDir::new().unwrap();
        let install = temp.path().join("install");
        write(&install.join("lib/libz.so"), "so");

        let final_dir = temp.path().join("out/zlib");
        let target = linux(BuildConfig::Debug, LinkType::Shared);
        Reorganizer::new(temp.path().join("out"))
            .reorganize("zlib", &target, &install, &final_dir)
            .unwrap();

        let lib = final_dir.join("lib/linux_x86_64_shared_debug");
        assert!(lib.join("libzd.so").is_file());
        let alias = lib.join("libz.so");
        assert!(alias.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(alias).unwrap(), PathBuf::from("libzd.so"));
    }
}
