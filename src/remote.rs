//! Remote command execution over SSH.

use crate::errors::{LaunchError, Result};
use crate::runner::CommandRunner;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where an assembled command executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecTarget {
    /// Run as a local child process.
    Local,
    /// Run over SSH on the named host.
    Remote(String),
}

/// The final assembled argument vector plus its execution target.
/// Constructed once per run, executed once, discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub target: ExecTarget,
}

impl CommandInvocation {
    /// The full command line as one string, for logs and errors.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Executes commands on remote hosts through `ssh` with the staged
/// key, host-key prompts disabled. The environment is assumed to be a
/// private network where host identity is established out of band.
pub struct RemoteShell<'a> {
    runner: &'a dyn CommandRunner,
    key_path: PathBuf,
    user: String,
}

impl<'a> RemoteShell<'a> {
    pub fn new(runner: &'a dyn CommandRunner, key_path: &Path, user: impl Into<String>) -> Self {
        Self {
            runner,
            key_path: key_path.to_path_buf(),
            user: user.into(),
        }
    }

    /// Execute an assembled invocation, capturing combined output.
    ///
    /// # Errors
    ///
    /// Non-zero exit raises `LaunchError::RemoteExecution` carrying the
    /// host, the full command line, the exit status, and the captured
    /// output. No output streaming is attempted; runs are long and
    /// monitored externally, so batch capture is sufficient.
    pub fn execute(&self, invocation: &CommandInvocation) -> Result<String> {
        let command_line = invocation.command_line();

        let (host, out) = match &invocation.target {
            ExecTarget::Local => {
                debug!(command = %command_line, "Executing local invocation");
                let out = self.runner.run(&invocation.program, &invocation.args)?;
                ("localhost".to_string(), out)
            }
            ExecTarget::Remote(host) => {
                debug!(host = %host, command = %command_line, "Executing remote invocation");
                let mut args = self.ssh_args(host);
                args.push(invocation.program.clone());
                args.extend(invocation.args.iter().cloned());
                let out = self.runner.run("ssh", &args)?;
                (host.clone(), out)
            }
        };

        if !out.success() {
            return Err(LaunchError::RemoteExecution {
                host,
                command: command_line,
                exit_code: out.exit_code,
                output: out.output,
            });
        }

        info!(host = %host, "Invocation completed");
        Ok(out.output)
    }

    /// Run a short remote shell command (e.g. `mkdir -p`, `rm -rf`).
    pub fn exec(&self, host: &str, program: &str, args: &[&str]) -> Result<String> {
        let invocation = CommandInvocation {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            target: ExecTarget::Remote(host.to_string()),
        };
        self.execute(&invocation)
    }

    fn ssh_args(&self, host: &str) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.key_path.display().to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            format!("{}@{}", self.user, host),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandOutput, MockRunner};

    fn invocation(target: ExecTarget) -> CommandInvocation {
        CommandInvocation {
            program: "cntk".to_string(),
            args: vec!["configFile=/run/base.cntk".to_string()],
            target,
        }
    }

    #[test]
    fn test_remote_execution_wraps_in_ssh() {
        let runner = MockRunner::new();
        let shell = RemoteShell::new(&runner, Path::new("/home/u/.trainlaunch/ssh/id_rsa"), "u");

        shell
            .execute(&invocation(ExecTarget::Remote("gpu-a".to_string())))
            .unwrap();

        assert_eq!(
            runner.invocations(),
            vec![
                "ssh -i /home/u/.trainlaunch/ssh/id_rsa -o StrictHostKeyChecking=no \
                 u@gpu-a cntk configFile=/run/base.cntk"
            ]
        );
    }

    #[test]
    fn test_local_execution_spawns_directly() {
        let runner = MockRunner::new();
        let shell = RemoteShell::new(&runner, Path::new("/k"), "u");

        shell.execute(&invocation(ExecTarget::Local)).unwrap();

        assert_eq!(runner.invocations(), vec!["cntk configFile=/run/base.cntk"]);
    }

    #[test]
    fn test_nonzero_exit_surfaces_full_context() {
        let runner = MockRunner::with_responses(vec![CommandOutput {
            exit_code: 2,
            output: "bad config".to_string(),
        }]);
        let shell = RemoteShell::new(&runner, Path::new("/k"), "u");

        let err = shell
            .execute(&invocation(ExecTarget::Remote("gpu-a".to_string())))
            .unwrap_err();

        match err {
            LaunchError::RemoteExecution {
                host,
                command,
                exit_code,
                output,
            } => {
                assert_eq!(host, "gpu-a");
                assert_eq!(exit_code, 2);
                assert_eq!(output, "bad config");
                assert!(command.starts_with("cntk "));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_success_returns_captured_output() {
        let runner = MockRunner::with_responses(vec![CommandOutput {
            exit_code: 0,
            output: "epoch 1 done".to_string(),
        }]);
        let shell = RemoteShell::new(&runner, Path::new("/k"), "u");

        let captured = shell.exec("gpu-a", "mkdir", &["-p", "/data/mount"]).unwrap();
        assert_eq!(captured, "epoch 1 done");
    }
}
