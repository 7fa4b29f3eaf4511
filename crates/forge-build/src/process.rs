//! External process execution with captured output
//!
//! Builders and fetch backends run tools (`git`, `cmake`, `sh`) through a
//! [`ProcessRunner`], which captures stdout/stderr and appends both to the
//! job's log file.

use crate::error::{BuildError, BuildResult};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::debug;

/// Output of a finished process
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Exit code (`None` if terminated by a signal)
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ProcessOutput {
    /// Check if the process succeeded
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Get combined output
    pub fn output(&self) -> String {
        let mut output = String::new();
        if !self.stdout.is_empty() {
            output.push_str("STDOUT:\n");
            output.push_str(&self.stdout);
            output.push('\n');
        }
        if !self.stderr.is_empty() {
            output.push_str("STDERR:\n");
            output.push_str(&self.stderr);
        }
        output
    }
}

/// Runs commands, capturing output and appending it to a log
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    log_file: Option<PathBuf>,
}

impl ProcessRunner {
    /// Create a runner without a log file
    pub fn new() -> Self {
        Self { log_file: None }
    }

    /// Append all command output to `path`
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Log file, if any
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Run a command to completion
    ///
    /// A non-zero exit is not an error here; see [`ProcessRunner::run_checked`].
    pub fn run(&self, command: &mut Command) -> BuildResult<ProcessOutput> {
        let program = describe(command);
        debug!(command = %program, "running");

        let start = Instant::now();
        let output = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BuildError::process(&program, e))?
            .wait_with_output()
            .map_err(|e| BuildError::process(&program, e))?;

        let result = ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration: start.elapsed(),
        };

        self.append_log(&program, &result)?;
        Ok(result)
    }

    /// Run a command and fail with a builder error on non-zero exit
    pub fn run_checked(
        &self,
        command: &mut Command,
        library: &str,
        phase: &str,
    ) -> BuildResult<ProcessOutput> {
        let result = self.run(command)?;
        if !result.success() {
            return Err(BuildError::Builder {
                library: library.to_string(),
                phase: phase.to_string(),
                exit_code: result.exit_code,
                output: result.output(),
            });
        }
        Ok(result)
    }

    fn append_log(&self, program: &str, result: &ProcessOutput) -> BuildResult<()> {
        let Some(path) = &self.log_file else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| BuildError::io(path, e))?;

        let exit = result
            .exit_code
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        write!(
            file,
            "$ {}\n{}{}[exit: {}, {:.1}s]\n\n",
            program,
            result.stdout,
            result.stderr,
            exit,
            result.duration.as_secs_f64()
        )
        .map_err(|e| BuildError::io(path, e))
    }
}

/// Render a command line for logs and errors
fn describe(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|s| s.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_captures_output() {
        let result = ProcessRunner::new()
            .run(Command::new("sh").args(["-c", "echo out; echo err >&2"]))
            .unwrap();
        assert!(result.success());
        assert_eq!(result.stdout.trim(), "out");
        assert_eq!(result.stderr.trim(), "err");
        assert!(result.output().contains("STDERR:\nerr"));
    }

    #[test]
    fn test_run_checked_reports_exit_code() {
        let err = ProcessRunner::new()
            .run_checked(
                Command::new("sh").args(["-c", "echo broken >&2; exit 3"]),
                "zlib",
                "configure",
            )
            .unwrap_err();

        match err {
            BuildError::Builder {
                library,
                phase,
                exit_code,
                output,
            } => {
                assert_eq!(library, "zlib");
                assert_eq!(phase, "configure");
                assert_eq!(exit_code, Some(3));
                assert!(output.contains("broken"));
            }
            other => panic!("Expected Builder error, got {:?}", other),
        }
    }

    #[test]
    fn test_appends_to_log() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("logs").join("build.log");
        let runner = ProcessRunner::new().with_log_file(&log);

        runner.run(Command::new("sh").args(["-c", "echo first"])).unwrap();
        runner.run(Command::new("sh").args(["-c", "echo second"])).unwrap();

        let contents = std::fs::read_to_string(&log).unwrap();
        assert!(contents.contains("$ sh -c echo first"));
        assert!(contents.find("first").unwrap() < contents.find("second").unwrap());
    }

    #[test]
    fn test_missing_program() {
        let err = ProcessRunner::new()
            .run(&mut Command::new("definitely-not-a-real-program-forge"))
            .unwrap_err();
        assert!(matches!(err, BuildError::Process { .. }));
    }
}
