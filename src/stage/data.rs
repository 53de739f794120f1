//! Distributed-input staging: merge part-files and place the result on
//! the remote host before the trainer starts.

use crate::dfs::Dfs;
use crate::errors::{LaunchError, Result};
use crate::remote::RemoteShell;
use crate::transfer::SecureCopy;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Fixed name of the merged input file on the remote mount directory.
pub const MERGED_INPUT_FILE: &str = "merged-input.txt";

/// Location triple for training input that lives in the distributed
/// filesystem rather than being pre-staged locally.
#[derive(Debug, Clone)]
pub struct DfsInput {
    /// Namenode URI of the distributed filesystem.
    pub namenode_uri: String,
    /// Directory holding the input part-files.
    pub source_dir: String,
    /// Directory on the remote host where the merged input is mounted.
    pub mounted_dir: String,
}

/// A fully staged input; partial staging never produces one.
#[derive(Debug, Clone)]
pub struct StagedInput {
    /// Distributed-filesystem directory the part-files came from.
    pub source_dir: String,
    /// Normalized absolute remote mount directory.
    pub mount_dir: String,
    /// Local copy of the merged file, kept in the working directory.
    pub local_merged: PathBuf,
}

/// Normalize the configured mount directory to an absolute path
/// without a trailing slash.
pub fn normalize_mount_dir(mounted_dir: &str) -> String {
    let trimmed = mounted_dir.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Merges distributed part-files into one local file and pushes it to
/// the remote mount directory. Each step is independently failable and
/// aborts the run before the trainer is invoked; a half-staged input
/// must never be used for training.
pub struct DataStager<'a> {
    dfs: &'a dyn Dfs,
    shell: &'a RemoteShell<'a>,
    transfer: &'a SecureCopy<'a>,
}

impl<'a> DataStager<'a> {
    pub fn new(
        dfs: &'a dyn Dfs,
        shell: &'a RemoteShell<'a>,
        transfer: &'a SecureCopy<'a>,
    ) -> Self {
        Self {
            dfs,
            shell,
            transfer,
        }
    }

    /// Stage `input` onto `host`, merging locally under `working_dir`.
    ///
    /// Part-file concatenation order is whatever the distributed
    /// filesystem returns for a wildcard listing; it is not sorted
    /// here, and order-sensitive trainers cannot rely on it.
    pub fn stage(&self, input: &DfsInput, host: &str, working_dir: &Path) -> Result<StagedInput> {
        let mount_dir = normalize_mount_dir(&input.mounted_dir);
        debug!(
            source = %input.source_dir,
            mount = %mount_dir,
            host = %host,
            "Staging distributed input"
        );

        self.shell
            .exec(host, "mkdir", &["-p", &mount_dir])
            .map_err(|e| {
                LaunchError::DataStaging(format!(
                    "could not create mount directory '{}' on '{}': {}",
                    mount_dir, host, e
                ))
            })?;

        fs::create_dir_all(working_dir)?;
        let local_merged = working_dir.join(MERGED_INPUT_FILE);
        self.dfs
            .merge_to_local(&input.source_dir, &local_merged)
            .map_err(|e| {
                LaunchError::DataStaging(format!(
                    "could not merge part-files under '{}': {}",
                    input.source_dir, e
                ))
            })?;

        let remote_path = format!("{}/{}", mount_dir, MERGED_INPUT_FILE);
        self.transfer.push(&local_merged, host, &remote_path)?;

        info!(
            source = %input.source_dir,
            remote = %remote_path,
            "Distributed input staged"
        );

        Ok(StagedInput {
            source_dir: input.source_dir.clone(),
            mount_dir,
            local_merged,
        })
    }
}
