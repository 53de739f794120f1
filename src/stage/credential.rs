//! SSH credential staging from the distributed filesystem.

use crate::dfs::Dfs;
use crate::errors::{LaunchError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// The SSH private key copied from distributed storage to a fixed
/// local path. Read repeatedly during a run, never deleted by this
/// subsystem; the fixed path lets later runs reuse it.
#[derive(Debug, Clone)]
pub struct StagedCredential {
    pub remote_source: String,
    pub local_path: PathBuf,
}

/// Fetches the pre-provisioned private key into a local,
/// permission-restricted path. Must complete before any transfer or
/// remote execution.
pub struct CredentialStager<'a> {
    dfs: &'a dyn Dfs,
}

impl<'a> CredentialStager<'a> {
    pub fn new(dfs: &'a dyn Dfs) -> Self {
        Self { dfs }
    }

    /// Stage the key from `remote_source` to `local_path`.
    ///
    /// A key already present at `local_path` is reused without
    /// touching the distributed filesystem. When fetching, the
    /// distributed-side copy also gets a `chmod 600`; that step is
    /// advisory bookkeeping, not a security boundary, and its failure
    /// is logged rather than raised.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError::MissingCredential` when `remote_source`
    /// does not exist, so the operator learns to run the one-time
    /// passwordless-SSH setup rather than chase a generic I/O error.
    pub fn stage_to(&self, remote_source: &str, local_path: &Path) -> Result<StagedCredential> {
        if local_path.exists() {
            debug!(path = %local_path.display(), "Reusing previously staged key");
            return Ok(StagedCredential {
                remote_source: remote_source.to_string(),
                local_path: local_path.to_path_buf(),
            });
        }

        if !self.dfs.exists(remote_source)? {
            return Err(LaunchError::MissingCredential {
                path: remote_source.to_string(),
            });
        }

        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.dfs.copy_to_local(remote_source, local_path)?;
        restrict_permissions(local_path)?;

        if let Err(e) = self.dfs.chmod(remote_source, "600") {
            warn!(path = %remote_source, error = %e, "Advisory chmod on staged key source failed");
        }

        info!(
            source = %remote_source,
            path = %local_path.display(),
            "SSH credential staged"
        );

        Ok(StagedCredential {
            remote_source: remote_source.to_string(),
            local_path: local_path.to_path_buf(),
        })
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
