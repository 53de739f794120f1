//! End-to-end launch orchestration.
//!
//! A run is strictly sequential: credential staging, optional input
//! staging, working-directory shipment, trainer execution, artifact
//! retrieval, then best-effort cleanup. Every step finishes before the
//! next begins; the first failure aborts the remainder of the forward
//! path, and cleanup still runs for whatever was created.

use crate::cleanup::{Cleanup, CleanupTargets};
use crate::command::{
    ConfigRendering, DistributedInvocation, Invocation, LocalInvocation,
};
use crate::config::{ConfigBlock, LaunchConfig};
use crate::dfs::Dfs;
use crate::errors::Result;
use crate::remote::RemoteShell;
use crate::runner::CommandRunner;
use crate::stage::{CredentialStager, DataStager, DfsInput, StagedInput};
use crate::topology::NodeTopology;
use crate::transfer::SecureCopy;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, info_span, warn};
use uuid::Uuid;

/// Everything one launch needs beyond the persistent [`LaunchConfig`].
///
/// The working directory is assumed to resolve to the same absolute
/// path on the local machine and on every remote host, so file-based
/// `configFile=` arguments stay valid after the directory is shipped.
pub struct RunContext {
    pub run_id: Uuid,
    pub working_dir: PathBuf,
    pub output_dir: String,
    pub blocks: Vec<ConfigBlock>,
    pub topology: NodeTopology,
    pub rendering: ConfigRendering,
    pub dfs_input: Option<DfsInput>,
    pub key_path: Option<PathBuf>,
}

impl RunContext {
    pub fn new(working_dir: impl Into<PathBuf>, topology: NodeTopology) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            working_dir: working_dir.into(),
            output_dir: "output".to_string(),
            blocks: Vec::new(),
            topology,
            rendering: ConfigRendering::FileBased,
            dfs_input: None,
            key_path: None,
        }
    }

    pub fn with_blocks(mut self, blocks: Vec<ConfigBlock>) -> Self {
        self.blocks = blocks;
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<String>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_rendering(mut self, rendering: ConfigRendering) -> Self {
        self.rendering = rendering;
        self
    }

    pub fn with_dfs_input(mut self, input: DfsInput) -> Self {
        self.dfs_input = Some(input);
        self
    }

    /// Override where the SSH key is staged locally.
    pub fn with_key_path(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(key_path.into());
        self
    }
}

/// One-shot launch executor wired to a command runner and a
/// distributed filesystem.
pub struct LaunchRun<'a> {
    config: &'a LaunchConfig,
    runner: &'a dyn CommandRunner,
    dfs: &'a dyn Dfs,
}

impl<'a> LaunchRun<'a> {
    pub fn new(config: &'a LaunchConfig, runner: &'a dyn CommandRunner, dfs: &'a dyn Dfs) -> Self {
        Self {
            config,
            runner,
            dfs,
        }
    }

    /// Execute a full launch and return the trainer's captured output.
    ///
    /// Cleanup runs whether the forward path succeeded or not, with
    /// one exception: if the credential itself cannot be staged there
    /// is nothing to clean up and no way to reach the remote host, so
    /// the error returns immediately.
    pub fn execute(&self, ctx: &RunContext) -> Result<String> {
        let span = info_span!("launch", run_id = %ctx.run_id);
        let _guard = span.enter();

        let key_path = match &ctx.key_path {
            Some(path) => path.clone(),
            None => LaunchConfig::default_key_path()?,
        };
        let credential = CredentialStager::new(self.dfs)
            .stage_to(&self.config.dfs.credential_path, &key_path)?;

        let shell = RemoteShell::new(self.runner, &credential.local_path, &self.config.remote.user);
        let transfer = SecureCopy::new(self.runner, &credential.local_path, &self.config.remote.user);

        let mut staged_input: Option<StagedInput> = None;
        let outcome = self.execute_staged(ctx, &shell, &transfer, &mut staged_input);

        // DFS targets are cleaned only once staging actually produced
        // them; a run that failed before the merge leaves the input
        // intact for a retry.
        let targets = CleanupTargets {
            remote_workdir: Some(ctx.working_dir.display().to_string()),
            dfs_source_dir: staged_input.as_ref().map(|s| s.source_dir.clone()),
            remote_mount_dir: staged_input.as_ref().map(|s| s.mount_dir.clone()),
        };
        let primary = ctx.topology.primary().host.clone();
        Cleanup::new(&shell, self.dfs).best_effort(&primary, &targets);

        match &outcome {
            Ok(_) => info!(run_id = %ctx.run_id, "Launch completed"),
            Err(e) => warn!(run_id = %ctx.run_id, error = %e, "Launch failed"),
        }
        outcome
    }

    fn execute_staged(
        &self,
        ctx: &RunContext,
        shell: &RemoteShell<'_>,
        transfer: &SecureCopy<'_>,
        staged_input: &mut Option<StagedInput>,
    ) -> Result<String> {
        let primary = ctx.topology.primary().host.clone();

        if let Some(input) = &ctx.dfs_input {
            let staged =
                DataStager::new(self.dfs, shell, transfer).stage(input, &primary, &ctx.working_dir)?;
            *staged_input = Some(staged);
        }

        // Materializes file-based blocks into the working directory,
        // so assembly must precede shipment.
        let invocation = if ctx.topology.is_distributed() {
            DistributedInvocation::new(
                &self.config.trainer,
                &self.config.launcher,
                &ctx.blocks,
                ctx.rendering,
                &ctx.working_dir,
                &ctx.topology,
            )
            .assemble()?
        } else {
            LocalInvocation::new(
                &self.config.trainer,
                &ctx.blocks,
                ctx.rendering,
                &ctx.working_dir,
            )
            .on_host(&primary)
            .assemble()?
        };

        self.ship_working_dir(ctx, shell, transfer, &primary)?;

        let output = shell.execute(&invocation)?;

        self.retrieve_artifacts(ctx, transfer, &primary)?;

        Ok(output)
    }

    fn ship_working_dir(
        &self,
        ctx: &RunContext,
        shell: &RemoteShell<'_>,
        transfer: &SecureCopy<'_>,
        host: &str,
    ) -> Result<()> {
        fs::create_dir_all(&ctx.working_dir)?;
        let parent = ctx
            .working_dir
            .parent()
            .unwrap_or_else(|| Path::new("/"))
            .display()
            .to_string();
        shell.exec(host, "mkdir", &["-p", &parent])?;
        transfer.push(&ctx.working_dir, host, &parent)?;
        info!(host = %host, dir = %ctx.working_dir.display(), "Working directory shipped");
        Ok(())
    }

    fn retrieve_artifacts(
        &self,
        ctx: &RunContext,
        transfer: &SecureCopy<'_>,
        host: &str,
    ) -> Result<()> {
        let local_out = ctx.working_dir.join(&ctx.output_dir);
        fs::create_dir_all(&local_out)?;
        let remote_models = format!("{}/Models", local_out.display());
        transfer.pull(host, &remote_models, &local_out)?;
        info!(dir = %local_out.display(), "Artifacts retrieved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dfs::MockDfs;
    use crate::errors::LaunchError;
    use crate::runner::{CommandOutput, MockRunner};

    fn config() -> LaunchConfig {
        LaunchConfig::default()
    }

    fn topology(specs: &[&str]) -> NodeTopology {
        let specs: Vec<String> = specs.iter().map(|s| s.to_string()).collect();
        NodeTopology::resolve(&specs).unwrap()
    }

    fn context(tmp: &tempfile::TempDir, topology: NodeTopology) -> RunContext {
        RunContext::new(tmp.path().join("run"), topology)
            .with_blocks(vec![ConfigBlock::new(
                "base",
                vec!["A=1".to_string()],
            )])
            .with_key_path(tmp.path().join("id_rsa"))
    }

    #[test]
    fn test_single_node_run_sequences_steps() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = MockRunner::new();
        let dfs = MockDfs::new();
        dfs.insert("/shared/keys/id_rsa", "KEY");
        let config = config();

        let ctx = context(&tmp, topology(&["gpu-a,1"]));
        LaunchRun::new(&config, &runner, &dfs).execute(&ctx).unwrap();

        let calls = runner.invocations();
        // mkdir, push, trainer, pull, cleanup rm.
        assert_eq!(calls.len(), 5);
        assert!(calls[0].contains("mkdir -p"));
        assert!(calls[1].starts_with("scp"));
        assert!(calls[2].contains("trainer@gpu-a cntk configFile="));
        assert!(calls[3].starts_with("scp"));
        assert!(calls[3].contains(":"));
        assert!(calls[4].contains("rm -rf"));
    }

    #[test]
    fn test_distributed_run_uses_launcher() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = MockRunner::new();
        let dfs = MockDfs::new();
        dfs.insert("/shared/keys/id_rsa", "KEY");
        let config = config();

        let ctx = context(&tmp, topology(&["gpu-a,4", "gpu-b,2"]));
        LaunchRun::new(&config, &runner, &dfs).execute(&ctx).unwrap();

        let trainer_call = runner
            .invocations()
            .into_iter()
            .find(|c| c.contains("mpiexec"))
            .unwrap();
        assert!(trainer_call.contains("-n 4"));
        assert!(trainer_call.contains("parallelTrain=true"));
        assert!(trainer_call.contains("trainer@gpu-a"));
    }

    #[test]
    fn test_missing_credential_stops_before_any_remote_work() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = MockRunner::new();
        let dfs = MockDfs::new();
        let config = config();

        let ctx = context(&tmp, topology(&["gpu-a,1"]));
        let err = LaunchRun::new(&config, &runner, &dfs)
            .execute(&ctx)
            .unwrap_err();

        assert!(matches!(err, LaunchError::MissingCredential { .. }));
        assert!(runner.invocations().is_empty());
    }

    #[test]
    fn test_failed_training_still_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        // mkdir ok, push ok, trainer fails, then cleanup rm.
        let runner = MockRunner::with_responses(vec![
            CommandOutput {
                exit_code: 0,
                output: String::new(),
            },
            CommandOutput {
                exit_code: 0,
                output: String::new(),
            },
            CommandOutput {
                exit_code: 1,
                output: "CUDA out of memory".to_string(),
            },
        ]);
        let dfs = MockDfs::new();
        dfs.insert("/shared/keys/id_rsa", "KEY");
        let config = config();

        let ctx = context(&tmp, topology(&["gpu-a,1"]));
        let err = LaunchRun::new(&config, &runner, &dfs)
            .execute(&ctx)
            .unwrap_err();

        match err {
            LaunchError::RemoteExecution { output, .. } => {
                assert!(output.contains("CUDA out of memory"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let calls = runner.invocations();
        // No artifact pull after the failed trainer; cleanup still ran.
        assert!(calls.last().unwrap().contains("rm -rf"));
        assert!(!calls.iter().any(|c| c.starts_with("scp") && c.contains("Models")));
    }

    #[test]
    fn test_failed_input_staging_leaves_dfs_source_intact() {
        let tmp = tempfile::tempdir().unwrap();
        // The data-staging mkdir on the remote host fails.
        let runner = MockRunner::with_responses(vec![CommandOutput {
            exit_code: 1,
            output: "permission denied".to_string(),
        }]);
        let dfs = MockDfs::new();
        dfs.insert("/shared/keys/id_rsa", "KEY");
        dfs.insert("/data/input/part-00000", "row\n");
        let config = config();

        let ctx = context(&tmp, topology(&["gpu-a,1"])).with_dfs_input(DfsInput {
            namenode_uri: String::new(),
            source_dir: "/data/input".to_string(),
            mounted_dir: "/data/mount".to_string(),
        });
        let err = LaunchRun::new(&config, &runner, &dfs)
            .execute(&ctx)
            .unwrap_err();

        assert!(matches!(err, LaunchError::DataStaging(_)));
        // The un-consumed input survives for a retry; only the
        // working directory gets the cleanup pass.
        assert!(dfs.removed().is_empty());
        let calls = runner.invocations();
        assert!(calls.last().unwrap().contains("rm -rf"));
        assert!(!calls.iter().any(|c| c.contains("rm -rf /data/mount")));
    }

    #[test]
    fn test_dfs_input_staged_and_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = MockRunner::new();
        let dfs = MockDfs::new();
        dfs.insert("/shared/keys/id_rsa", "KEY");
        dfs.insert("/data/input/part-00000", "row\n");
        let config = config();

        let ctx = context(&tmp, topology(&["gpu-a,1"])).with_dfs_input(DfsInput {
            namenode_uri: config.dfs.namenode_uri.clone(),
            source_dir: "/data/input".to_string(),
            mounted_dir: "/data/mount".to_string(),
        });
        LaunchRun::new(&config, &runner, &dfs).execute(&ctx).unwrap();

        assert!(ctx.working_dir.join("merged-input.txt").exists());
        assert_eq!(dfs.removed(), vec!["/data/input"]);

        let calls = runner.invocations();
        assert!(calls.iter().any(|c| c.ends_with("merged-input.txt")));
        assert!(calls.iter().any(|c| c.ends_with("rm -rf /data/mount")));
    }
}
