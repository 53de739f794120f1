//! Command assembly for single-node and distributed launches.
//!
//! Config rendering is factored into one path shared by both
//! invocation shapes, so file-based vs. inline behavior can never
//! diverge between local and distributed execution. The distributed
//! shape wraps the exact trainer argument vector the single-node shape
//! would produce.

use crate::config::blocks::{materialize, ConfigBlock};
use crate::config::{LauncherConfig, TrainerConfig};
use crate::errors::Result;
use crate::remote::{CommandInvocation, ExecTarget};
use crate::topology::NodeTopology;
use std::path::Path;
use tracing::debug;

/// How config blocks become trainer arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigRendering {
    /// Materialize each block to a file and pass `configFile=<path>`.
    FileBased,
    /// Pass each block's lines inline, joined by spaces.
    Inline,
}

/// Render blocks into trainer arguments, preserving declaration order.
///
/// In file-based mode every block is materialized into `working_dir`
/// and referenced as exactly one `configFile=` argument; in inline
/// mode each block contributes its space-joined text instead.
pub fn render_blocks(
    blocks: &[ConfigBlock],
    rendering: ConfigRendering,
    working_dir: &Path,
    ext: &str,
) -> Result<Vec<String>> {
    let mut args = Vec::with_capacity(blocks.len());
    for block in blocks {
        match rendering {
            ConfigRendering::FileBased => {
                let path = materialize(block, working_dir, ext)?;
                args.push(format!("configFile={}", path.display()));
            }
            ConfigRendering::Inline => args.push(block.inline_text()),
        }
    }
    Ok(args)
}

/// A command builder that can be assembled into a concrete
/// [`CommandInvocation`].
pub trait Invocation {
    fn assemble(&self) -> Result<CommandInvocation>;
}

/// Single-process trainer invocation.
pub struct LocalInvocation<'a> {
    trainer: &'a TrainerConfig,
    blocks: &'a [ConfigBlock],
    rendering: ConfigRendering,
    working_dir: &'a Path,
    host: Option<String>,
}

impl<'a> LocalInvocation<'a> {
    pub fn new(
        trainer: &'a TrainerConfig,
        blocks: &'a [ConfigBlock],
        rendering: ConfigRendering,
        working_dir: &'a Path,
    ) -> Self {
        Self {
            trainer,
            blocks,
            rendering,
            working_dir,
            host: None,
        }
    }

    /// Target a remote host instead of the local machine.
    pub fn on_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }
}

impl Invocation for LocalInvocation<'_> {
    fn assemble(&self) -> Result<CommandInvocation> {
        let args = render_blocks(
            self.blocks,
            self.rendering,
            self.working_dir,
            &self.trainer.config_ext,
        )?;

        let target = match &self.host {
            Some(host) => ExecTarget::Remote(host.clone()),
            None => ExecTarget::Local,
        };

        let invocation = CommandInvocation {
            program: self.trainer.command.clone(),
            args,
            target,
        };
        debug!(command = %invocation.command_line(), "Assembled single-node invocation");
        Ok(invocation)
    }
}

/// Multi-process distributed launcher invocation wrapping the trainer.
///
/// The process count comes from the primary node's worker count. The
/// launcher injects the trainer's runtime library search path and
/// executable path before the trainer sub-command runs, because the
/// remote host's default environment does not include them.
pub struct DistributedInvocation<'a> {
    trainer: &'a TrainerConfig,
    launcher: &'a LauncherConfig,
    blocks: &'a [ConfigBlock],
    rendering: ConfigRendering,
    working_dir: &'a Path,
    topology: &'a NodeTopology,
}

impl<'a> DistributedInvocation<'a> {
    pub fn new(
        trainer: &'a TrainerConfig,
        launcher: &'a LauncherConfig,
        blocks: &'a [ConfigBlock],
        rendering: ConfigRendering,
        working_dir: &'a Path,
        topology: &'a NodeTopology,
    ) -> Self {
        Self {
            trainer,
            launcher,
            blocks,
            rendering,
            working_dir,
            topology,
        }
    }
}

impl Invocation for DistributedInvocation<'_> {
    fn assemble(&self) -> Result<CommandInvocation> {
        // Same rendering path as the single-node shape; the wrapped
        // trainer sub-command must be byte-identical to it.
        let trainer_args = render_blocks(
            self.blocks,
            self.rendering,
            self.working_dir,
            &self.trainer.config_ext,
        )?;

        let primary = self.topology.primary();

        let mut args = vec![
            "-n".to_string(),
            primary.workers.to_string(),
            "--host".to_string(),
            primary.host.clone(),
            "-x".to_string(),
            format!("LD_LIBRARY_PATH={}", self.trainer.lib_path),
            "-x".to_string(),
            format!("PATH={}", self.trainer.bin_path),
            self.trainer.command.clone(),
        ];
        args.extend(trainer_args);
        args.push("parallelTrain=true".to_string());

        let invocation = CommandInvocation {
            program: self.launcher.command.clone(),
            args,
            target: ExecTarget::Remote(primary.host.clone()),
        };
        debug!(
            processes = primary.workers,
            primary = %primary.host,
            command = %invocation.command_line(),
            "Assembled distributed invocation"
        );
        Ok(invocation)
    }
}
