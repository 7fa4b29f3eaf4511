/// Build error types
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Library '{library}' depends on unknown library '{dependency}'")]
    UnknownDependency { library: String, dependency: String },

    #[error("Circular dependency detected among: {}", nodes.join(", "))]
    CircularDependency { nodes: Vec<String> },

    #[error("Library '{0}' is defined more than once")]
    DuplicateLibrary(String),

    #[error("Unknown library: {0}")]
    UnknownLibrary(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Failed to fetch {library} {version}: {message}")]
    Fetch {
        library: String,
        version: String,
        message: String,
    },

    #[error("{phase} failed for '{library}' (exit code {}):\n{output}", exit_code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    Builder {
        library: String,
        phase: String,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("Failed to reorganize {library} for {target}: {message}")]
    Reorganize {
        library: String,
        target: String,
        message: String,
    },

    #[error("Build metadata error at {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    #[error("Failed to run '{program}': {error}")]
    Process { program: String, error: String },

    #[error("No builder registered for build system '{0}'")]
    NoBuilder(String),

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] forge_config::ConfigError),
}

impl BuildError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Create a fetch error
    pub fn fetch(library: impl Into<String>, version: impl Into<String>, message: impl ToString) -> Self {
        Self::Fetch {
            library: library.into(),
            version: version.into(),
            message: message.to_string(),
        }
    }

    /// Create a reorganize error
    pub fn reorganize(
        library: impl Into<String>,
        target: impl ToString,
        message: impl ToString,
    ) -> Self {
        Self::Reorganize {
            library: library.into(),
            target: target.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a metadata error
    pub fn metadata(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Metadata {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a process spawn error
    pub fn process(program: impl Into<String>, error: impl ToString) -> Self {
        Self::Process {
            program: program.into(),
            error: error.to_string(),
        }
    }
}
