//! Command runner abstraction for invoking external processes.
//!
//! Every external tool this orchestrator drives (`ssh`, `scp`,
//! `hdfs dfs`, the trainer itself) goes through the [`CommandRunner`]
//! seam, so tests can script the cluster without one. Execution is
//! strictly synchronous: each invocation blocks until the process
//! exits, matching the sequential staging model of a run.

use crate::errors::Result;
use std::cell::RefCell;
use std::process::Command;
use tracing::debug;

/// Captured result of one external process invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Process exit code; -1 when the process was terminated by a
    /// signal and no code is available.
    pub exit_code: i32,

    /// Combined stdout and stderr, batch-captured after exit.
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Trait for executing an external program with arguments.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Production runner that spawns the program directly and captures
/// its combined output.
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        debug!(program = %program, args = ?args, "Spawning external command");

        let out = Command::new(program).args(args).output()?;

        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        if !out.stderr.is_empty() {
            if !output.is_empty() && !output.ends_with('\n') {
                output.push('\n');
            }
            output.push_str(&String::from_utf8_lossy(&out.stderr));
        }

        let exit_code = out.status.code().unwrap_or(-1);
        debug!(program = %program, exit_code, "External command finished");

        Ok(CommandOutput { exit_code, output })
    }
}

/// Scripted test double that records every invocation and returns
/// pre-configured outputs in order.
///
/// Once the scripted outputs are exhausted it answers with exit code 0
/// and empty output, so tests only script the invocations they care
/// about.
pub struct MockRunner {
    responses: RefCell<Vec<CommandOutput>>,
    invocations: RefCell<Vec<String>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self {
            responses: RefCell::new(Vec::new()),
            invocations: RefCell::new(Vec::new()),
        }
    }

    pub fn with_responses(responses: Vec<CommandOutput>) -> Self {
        let mut reversed = responses;
        reversed.reverse();
        Self {
            responses: RefCell::new(reversed),
            invocations: RefCell::new(Vec::new()),
        }
    }

    /// Every command line run so far, as `program arg1 arg2 ...`.
    pub fn invocations(&self) -> Vec<String> {
        self.invocations.borrow().clone()
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let mut line = program.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        self.invocations.borrow_mut().push(line);

        Ok(self.responses.borrow_mut().pop().unwrap_or(CommandOutput {
            exit_code: 0,
            output: String::new(),
        }))
    }
}
