//! Secure copy between the local host and remote nodes.

use crate::errors::{LaunchError, Result};
use crate::runner::CommandRunner;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Pushes and pulls files or directories over `scp` using the staged
/// key. Directories are copied recursively; each transfer is a
/// synchronous all-or-nothing operation with no partial-transfer
/// recovery.
pub struct SecureCopy<'a> {
    runner: &'a dyn CommandRunner,
    key_path: PathBuf,
    user: String,
}

impl<'a> SecureCopy<'a> {
    pub fn new(runner: &'a dyn CommandRunner, key_path: &Path, user: impl Into<String>) -> Self {
        Self {
            runner,
            key_path: key_path.to_path_buf(),
            user: user.into(),
        }
    }

    /// Copy a local file or directory to `host:remote_path`.
    pub fn push(&self, local: &Path, host: &str, remote_path: &str) -> Result<()> {
        debug!(
            local = %local.display(),
            host = %host,
            remote = %remote_path,
            "Pushing to remote host"
        );
        self.scp(
            "push",
            host,
            local.display().to_string(),
            format!("{}@{}:{}", self.user, host, remote_path),
        )
    }

    /// Copy `host:remote_path` to a local file or directory.
    pub fn pull(&self, host: &str, remote_path: &str, local: &Path) -> Result<()> {
        debug!(
            host = %host,
            remote = %remote_path,
            local = %local.display(),
            "Pulling from remote host"
        );
        self.scp(
            "pull",
            host,
            format!("{}@{}:{}", self.user, host, remote_path),
            local.display().to_string(),
        )
    }

    fn scp(&self, operation: &str, host: &str, source: String, dest: String) -> Result<()> {
        let args = vec![
            "-r".to_string(),
            "-i".to_string(),
            self.key_path.display().to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            source,
            dest,
        ];

        let out = self.runner.run("scp", &args)?;
        if !out.success() {
            return Err(LaunchError::Transfer {
                operation: operation.to_string(),
                host: host.to_string(),
                output: out.output,
            });
        }

        info!(operation = %operation, host = %host, "Transfer complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandOutput, MockRunner};

    #[test]
    fn test_push_builds_recursive_scp() {
        let runner = MockRunner::new();
        let scp = SecureCopy::new(&runner, Path::new("/k/id_rsa"), "u");

        scp.push(Path::new("/runs/exp-7"), "gpu-a", "/runs").unwrap();

        assert_eq!(
            runner.invocations(),
            vec![
                "scp -r -i /k/id_rsa -o StrictHostKeyChecking=no \
                 /runs/exp-7 u@gpu-a:/runs"
            ]
        );
    }

    #[test]
    fn test_pull_reverses_direction() {
        let runner = MockRunner::new();
        let scp = SecureCopy::new(&runner, Path::new("/k/id_rsa"), "u");

        scp.pull("gpu-a", "/runs/exp-7/out/Models", Path::new("/runs/exp-7/out"))
            .unwrap();

        assert_eq!(
            runner.invocations(),
            vec![
                "scp -r -i /k/id_rsa -o StrictHostKeyChecking=no \
                 u@gpu-a:/runs/exp-7/out/Models /runs/exp-7/out"
            ]
        );
    }

    #[test]
    fn test_failed_transfer_carries_operation_host_output() {
        let runner = MockRunner::with_responses(vec![CommandOutput {
            exit_code: 1,
            output: "lost connection".to_string(),
        }]);
        let scp = SecureCopy::new(&runner, Path::new("/k"), "u");

        let err = scp.push(Path::new("/x"), "gpu-b", "/y").unwrap_err();
        match err {
            LaunchError::Transfer {
                operation,
                host,
                output,
            } => {
                assert_eq!(operation, "push");
                assert_eq!(host, "gpu-b");
                assert_eq!(output, "lost connection");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
