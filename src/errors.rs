use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while orchestrating a training launch.
///
/// Every step of a run is fail-fast: the first error aborts the run at
/// that step and is surfaced to the caller with enough context (host,
/// command, captured output) to reproduce the failure manually.
#[derive(Error, Debug)]
pub enum LaunchError {
    /// No nodes were supplied to the topology resolver.
    #[error("no nodes supplied; a training run requires at least one node")]
    EmptyTopology,

    /// A config block could not be written to the working directory.
    #[error("failed to materialize config block '{name}' at {path}: {source}")]
    Materialization {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The SSH private key is absent from its distributed-filesystem
    /// location. Remediation differs from a generic I/O failure, so
    /// this is kept distinct.
    #[error(
        "SSH private key not found at '{path}'; run the one-time \
         passwordless-SSH setup on the cluster before launching"
    )]
    MissingCredential { path: String },

    /// A secure copy (push or pull) exited non-zero.
    #[error("scp {operation} with host '{host}' failed: {output}")]
    Transfer {
        operation: String,
        host: String,
        output: String,
    },

    /// The trainer or launcher exited non-zero.
    #[error(
        "remote command on '{host}' exited with status {exit_code}: \
         {command}\n{output}"
    )]
    RemoteExecution {
        host: String,
        command: String,
        exit_code: i32,
        output: String,
    },

    /// Merging or remote-directory creation failed while preparing
    /// distributed input. A half-staged input must never be used.
    #[error("input staging failed: {0}")]
    DataStaging(String),

    /// A distributed-filesystem command exited non-zero.
    #[error("distributed filesystem operation failed: {0}")]
    Dfs(String),

    /// Configuration error (invalid config, missing fields, etc.)
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error occurred (file operations, process spawn, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for launch operations.
pub type Result<T> = std::result::Result<T, LaunchError>;

impl From<toml::ser::Error> for LaunchError {
    fn from(e: toml::ser::Error) -> Self {
        LaunchError::Config(e.to_string())
    }
}

impl From<toml::de::Error> for LaunchError {
    fn from(e: toml::de::Error) -> Self {
        LaunchError::Config(e.to_string())
    }
}
