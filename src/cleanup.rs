//! Best-effort teardown of run-scoped state.
//!
//! Cleanup runs after every launch, successful or not. A failure here
//! is logged and swallowed; it never changes the outcome of the run.

use crate::dfs::Dfs;
use crate::remote::RemoteShell;
use std::path::Path;
use tracing::{info, warn};

/// Targets removed after a run. Fields left `None` were never created
/// and are skipped.
#[derive(Debug, Default, Clone)]
pub struct CleanupTargets {
    /// Working directory on the remote host.
    pub remote_workdir: Option<String>,
    /// Distributed-filesystem input directory consumed by staging.
    pub dfs_source_dir: Option<String>,
    /// Remote mount directory holding the merged input.
    pub remote_mount_dir: Option<String>,
}

pub struct Cleanup<'a> {
    shell: &'a RemoteShell<'a>,
    dfs: &'a dyn Dfs,
}

impl<'a> Cleanup<'a> {
    pub fn new(shell: &'a RemoteShell<'a>, dfs: &'a dyn Dfs) -> Self {
        Self { shell, dfs }
    }

    /// Remove everything in `targets` from `host`, attempting each
    /// target exactly once and continuing past failures.
    pub fn best_effort(&self, host: &str, targets: &CleanupTargets) {
        if let Some(workdir) = &targets.remote_workdir {
            self.remove_remote_dir(host, workdir);
        }
        if let Some(source) = &targets.dfs_source_dir {
            if let Err(e) = self.dfs.remove_recursive(source) {
                warn!(path = %source, error = %e, "Failed to remove staged input source");
            } else {
                info!(path = %source, "Removed staged input source");
            }
        }
        if let Some(mount) = &targets.remote_mount_dir {
            self.remove_remote_dir(host, mount);
        }
    }

    fn remove_remote_dir(&self, host: &str, dir: &str) {
        // Refuse to rm -rf the filesystem root on a malformed target.
        if dir.is_empty() || Path::new(dir) == Path::new("/") {
            warn!(host = %host, dir = %dir, "Skipping unsafe cleanup target");
            return;
        }
        match self.shell.exec(host, "rm", &["-rf", dir]) {
            Ok(_) => info!(host = %host, dir = %dir, "Removed remote directory"),
            Err(e) => warn!(host = %host, dir = %dir, error = %e, "Failed to remove remote directory"),
        }
    }
}
