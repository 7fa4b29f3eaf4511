//! Git source fetching
use crate::error::{BuildError, BuildResult};
use crate::process::ProcessRunner;
use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

/// Whether a ref looks like a commit id (7 to 40 hex characters)
pub fn is_commit_hash(reference: &str) -> bool {
    (7..=40).contains(&reference.len()) && reference.chars().all(|c| c.is_ascii_hexdigit())
}

/// Clone `url` at `reference` into `dest` and return the checked out commit
///
/// `dest` must not exist yet.
pub fn fetch_git(
    url: &str,
    reference: Option<&str>,
    shallow: bool,
    dest: &Path,
) -> BuildResult<String> {
    let runner = ProcessRunner::new();

    match reference {
        Some(commit) if shallow && is_commit_hash(commit) => {
            fetch_commit(&runner, url, commit, dest)?;
        }
        _ if shallow => {
            let mut args = vec!["clone", "--depth", "1"];
            if let Some(reference) = reference {
                args.extend(["--branch", reference]);
            }
            args.extend(["--recurse-submodules", "--shallow-submodules"]);
            run_git(&runner, None, &args, Some((url, dest)))?;
        }
        _ => {
            run_git(&runner, None, &["clone"], Some((url, dest)))?;
            if let Some(reference) = reference {
                run_git(&runner, Some(dest), &["checkout", reference], None)?;
            }
            run_git(
                &runner,
                Some(dest),
                &["submodule", "update", "--init", "--recursive"],
                None,
            )?;
        }
    }

    let head = run_git(&runner, Some(dest), &["rev-parse", "HEAD"], None)?;
    Ok(head.trim().to_string())
}

/// Shallow-fetch a single commit
///
/// Servers that refuse commit-addressed fetches get a deeper fetch of the
/// default history instead.
fn fetch_commit(runner: &ProcessRunner, url: &str, commit: &str, dest: &Path) -> BuildResult<()> {
    fs::create_dir_all(dest).map_err(|e| BuildError::io(dest, e))?;
    run_git(runner, Some(dest), &["init", "--quiet"], None)?;
    run_git(runner, Some(dest), &["remote", "add", "origin", url], None)?;

    if let Err(e) = run_git(
        runner,
        Some(dest),
        &["fetch", "--depth", "1", "origin", commit],
        None,
    ) {
        warn!(url, commit, error = %e, "commit fetch rejected, fetching recent history");
        run_git(runner, Some(dest), &["fetch", "--depth", "100", "origin"], None)?;
    }

    run_git(runner, Some(dest), &["checkout", "--quiet", commit], None)?;
    run_git(
        runner,
        Some(dest),
        &["submodule", "update", "--init", "--recursive", "--depth", "1"],
        None,
    )?;
    Ok(())
}

/// Run git, returning stdout; `url_dest` appends a clone's URL and destination
fn run_git(
    runner: &ProcessRunner,
    cwd: Option<&Path>,
    args: &[&str],
    url_dest: Option<(&str, &Path)>,
) -> BuildResult<String> {
    let mut command = Command::new("git");
    command.args(args).env("GIT_TERMINAL_PROMPT", "0");
    if let Some((url, dest)) = url_dest {
        command.arg(url).arg(dest);
    }
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }

    debug!(args = ?args, "git");
    let output = runner.run(&mut command)?;
    if !output.success() {
        return Err(BuildError::process(
            format!("git {}", args.join(" ")),
            output.stderr.trim(),
        ));
    }
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("51b7f2a", true)]
    #[case("51b7f2abdade71cd9bb0e7a373ef2610ec6f9daf", true)]
    #[case("ABCDEF0123", true)]
    #[case("abc123", false)]
    #[case("v1.3.1", false)]
    #[case("main", false)]
    #[case("51b7f2abdade71cd9bb0e7a373ef2610ec6f9dafa", false)]
    fn test_is_commit_hash(#[case] reference: &str, #[case] expected: bool) {
        assert_eq!(is_commit_hash(reference), expected);
    }

    fn git(cwd: &Path, args: &[&str]) -> Option<String> {
        let output = Command::new("git")
            .args(["-c", "user.name=forge", "-c", "user.email=forge@localhost"])
            .args(args)
            .current_dir(cwd)
            .output()
            .ok()?;
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Local repository with two commits; None when git is unavailable
    fn repo(root: &Path) -> Option<(std::path::PathBuf, String, String)> {
        let repo = root.join("upstream");
        fs::create_dir_all(&repo).ok()?;
        git(&repo, &["init", "--quiet"])?;
        fs::write(repo.join("zlib.h"), "// v1\n").ok()?;
        git(&repo, &["add", "."])?;
        git(&repo, &["commit", "--quiet", "-m", "v1"])?;
        let first = git(&repo, &["rev-parse", "HEAD"])?;
        fs::write(repo.join("zlib.h"), "// v2\n").ok()?;
        git(&repo, &["commit", "--quiet", "-am", "v2"])?;
        let second = git(&repo, &["rev-parse", "HEAD"])?;
        Some((repo, first, second))
    }

    #[test]
    fn test_full_clone_checks_out_ref() {
        let temp = tempfile::TempDir::new().unwrap();
        let Some((repo, first, _)) = repo(temp.path()) else {
            return;
        };
        let url = repo.to_string_lossy().to_string();
        let dest = temp.path().join("src");

        let head = fetch_git(&url, Some(&first), false, &dest).unwrap();
        assert_eq!(head, first);
        assert_eq!(fs::read_to_string(dest.join("zlib.h")).unwrap(), "// v1\n");
    }

    #[test]
    fn test_shallow_clone_default_branch() {
        let temp = tempfile::TempDir::new().unwrap();
        let Some((repo, _, second)) = repo(temp.path()) else {
            return;
        };
        let url = format!("file://{}", repo.display());
        let dest = temp.path().join("src");

        let head = fetch_git(&url, None, true, &dest).unwrap();
        assert_eq!(head, second);
    }

    #[test]
    fn test_shallow_fetch_by_commit() {
        let temp = tempfile::TempDir::new().unwrap();
        let Some((repo, first, _)) = repo(temp.path()) else {
            return;
        };
        let url = format!("file://{}", repo.display());
        let dest = temp.path().join("src");

        let head = fetch_git(&url, Some(&first), true, &dest).unwrap();
        assert_eq!(head, first);
        assert_eq!(fs::read_to_string(dest.join("zlib.h")).unwrap(), "// v1\n");
        assert_eq!(git(&dest, &["rev-parse", "--is-shallow-repository"]).as_deref(), Some("true"));
    }

    #[test]
    fn test_shallow_fetch_by_short_commit_uses_history() {
        // Servers never resolve abbreviated ids, so this goes through the deeper fetch
        let temp = tempfile::TempDir::new().unwrap();
        let Some((repo, first, _)) = repo(temp.path()) else {
            return;
        };
        let url = format!("file://{}", repo.display());
        let dest = temp.path().join("src");

        let head = fetch_git(&url, Some(&first[..10]), true, &dest).unwrap();
        assert_eq!(head, first);
        assert_eq!(fs::read_to_string(dest.join("zlib.h")).unwrap(), "// v1\n");
    }

    #[test]
    fn test_unknown_ref_fails() {
        let temp = tempfile::TempDir::new().unwrap();
        let Some((repo, _, _)) = repo(temp.path()) else {
            return;
        };
        let url = format!("file://{}", repo.display());
        let dest = temp.path().join("src");

        let err = fetch_git(&url, Some("no-such-branch"), true, &dest).unwrap_err();
        assert!(matches!(err, BuildError::Process { .. }));
    }
}
