//! Distributed filesystem access seam.
//!
//! The orchestrator needs only a narrow slice of the distributed
//! filesystem: existence checks, copy-to-local, merge-to-local,
//! permission changes, and recursive removal. [`Dfs`] captures that
//! slice; [`HdfsCli`] implements it by shelling out to `hdfs dfs`
//! through the [`CommandRunner`] seam, and [`MockDfs`] scripts it for
//! tests.

use crate::errors::{LaunchError, Result};
use crate::runner::CommandRunner;
use std::cell::RefCell;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Narrow distributed-filesystem interface used by staging and cleanup.
pub trait Dfs {
    /// Whether a file or directory exists at `path`.
    fn exists(&self, path: &str) -> Result<bool>;

    /// Copy a single file from the distributed filesystem to `local`.
    fn copy_to_local(&self, path: &str, local: &Path) -> Result<()>;

    /// Concatenate every part-file under `dir` into one local file.
    ///
    /// Part-file order is whatever the filesystem returns for a
    /// wildcard listing; it is not guaranteed to be sorted, and
    /// callers must not depend on it.
    fn merge_to_local(&self, dir: &str, local: &Path) -> Result<()>;

    /// Change permissions of `path` (e.g. `"600"`). Advisory.
    fn chmod(&self, path: &str, mode: &str) -> Result<()>;

    /// Recursively remove `path`.
    fn remove_recursive(&self, path: &str) -> Result<()>;
}

/// `hdfs dfs` command-line client.
pub struct HdfsCli<'a> {
    runner: &'a dyn CommandRunner,
    namenode_uri: String,
}

impl<'a> HdfsCli<'a> {
    pub fn new(runner: &'a dyn CommandRunner, namenode_uri: impl Into<String>) -> Self {
        Self {
            runner,
            namenode_uri: namenode_uri.into(),
        }
    }

    fn dfs(&self, args: Vec<String>) -> Result<crate::runner::CommandOutput> {
        let mut full = vec!["dfs".to_string()];
        if !self.namenode_uri.is_empty() {
            full.push("-fs".to_string());
            full.push(self.namenode_uri.clone());
        }
        full.extend(args);
        self.runner.run("hdfs", &full)
    }

    fn dfs_checked(&self, args: Vec<String>, what: &str) -> Result<()> {
        let out = self.dfs(args)?;
        if !out.success() {
            return Err(LaunchError::Dfs(format!(
                "{} exited with status {}: {}",
                what, out.exit_code, out.output
            )));
        }
        Ok(())
    }
}

impl Dfs for HdfsCli<'_> {
    fn exists(&self, path: &str) -> Result<bool> {
        // -test -e exits 0 when present, 1 when absent.
        let out = self.dfs(vec!["-test".to_string(), "-e".to_string(), path.to_string()])?;
        debug!(path = %path, exists = out.success(), "DFS existence check");
        Ok(out.success())
    }

    fn copy_to_local(&self, path: &str, local: &Path) -> Result<()> {
        self.dfs_checked(
            vec![
                "-copyToLocal".to_string(),
                "-f".to_string(),
                path.to_string(),
                local.display().to_string(),
            ],
            "copyToLocal",
        )
    }

    fn merge_to_local(&self, dir: &str, local: &Path) -> Result<()> {
        self.dfs_checked(
            vec![
                "-getmerge".to_string(),
                format!("{}/*", dir.trim_end_matches('/')),
                local.display().to_string(),
            ],
            "getmerge",
        )
    }

    fn chmod(&self, path: &str, mode: &str) -> Result<()> {
        self.dfs_checked(
            vec!["-chmod".to_string(), mode.to_string(), path.to_string()],
            "chmod",
        )
    }

    fn remove_recursive(&self, path: &str) -> Result<()> {
        self.dfs_checked(
            vec![
                "-rm".to_string(),
                "-r".to_string(),
                "-skipTrash".to_string(),
                path.to_string(),
            ],
            "rm -r",
        )
    }
}

/// In-memory test double for the distributed filesystem.
///
/// Paths registered with [`MockDfs::insert`] exist; `copy_to_local`
/// and `merge_to_local` write the registered content to the local
/// path. Every operation is recorded for assertion.
pub struct MockDfs {
    entries: RefCell<std::collections::HashMap<String, String>>,
    removed: RefCell<HashSet<String>>,
    operations: RefCell<Vec<String>>,
}

impl MockDfs {
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(std::collections::HashMap::new()),
            removed: RefCell::new(HashSet::new()),
            operations: RefCell::new(Vec::new()),
        }
    }

    pub fn insert(&self, path: impl Into<String>, content: impl Into<String>) {
        self.entries.borrow_mut().insert(path.into(), content.into());
    }

    pub fn operations(&self) -> Vec<String> {
        self.operations.borrow().clone()
    }

    pub fn removed(&self) -> Vec<String> {
        let mut removed: Vec<String> = self.removed.borrow().iter().cloned().collect();
        removed.sort();
        removed
    }

    fn record(&self, op: String) {
        self.operations.borrow_mut().push(op);
    }
}

impl Default for MockDfs {
    fn default() -> Self {
        Self::new()
    }
}

impl Dfs for MockDfs {
    fn exists(&self, path: &str) -> Result<bool> {
        self.record(format!("exists {}", path));
        Ok(self.entries.borrow().contains_key(path))
    }

    fn copy_to_local(&self, path: &str, local: &Path) -> Result<()> {
        self.record(format!("copy_to_local {} -> {}", path, local.display()));
        let entries = self.entries.borrow();
        let content = entries
            .get(path)
            .ok_or_else(|| LaunchError::Dfs(format!("no such path: {}", path)))?;
        if let Some(parent) = local.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(local, content)?;
        Ok(())
    }

    fn merge_to_local(&self, dir: &str, local: &Path) -> Result<()> {
        self.record(format!("merge_to_local {} -> {}", dir, local.display()));
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let entries = self.entries.borrow();
        let mut merged = String::new();
        for (path, content) in entries.iter() {
            if path.starts_with(&prefix) {
                merged.push_str(content);
            }
        }
        if let Some(parent) = local.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(local, merged)?;
        Ok(())
    }

    fn chmod(&self, path: &str, mode: &str) -> Result<()> {
        self.record(format!("chmod {} {}", mode, path));
        Ok(())
    }

    fn remove_recursive(&self, path: &str) -> Result<()> {
        self.record(format!("rm -r {}", path));
        self.removed.borrow_mut().insert(path.to_string());
        let prefix = format!("{}/", path.trim_end_matches('/'));
        self.entries
            .borrow_mut()
            .retain(|p, _| p != path && !p.starts_with(&prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::MockRunner;

    #[test]
    fn test_hdfs_exists_maps_exit_status() {
        let runner = MockRunner::with_responses(vec![
            crate::runner::CommandOutput {
                exit_code: 0,
                output: String::new(),
            },
            crate::runner::CommandOutput {
                exit_code: 1,
                output: String::new(),
            },
        ]);
        let dfs = HdfsCli::new(&runner, "hdfs://nn:8020");

        assert!(dfs.exists("/present").unwrap());
        assert!(!dfs.exists("/absent").unwrap());

        let calls = runner.invocations();
        assert_eq!(
            calls[0],
            "hdfs dfs -fs hdfs://nn:8020 -test -e /present"
        );
    }

    #[test]
    fn test_hdfs_getmerge_uses_wildcard_listing() {
        let runner = MockRunner::new();
        let dfs = HdfsCli::new(&runner, "");
        dfs.merge_to_local("/data/input/", Path::new("/tmp/merged-input.txt"))
            .unwrap();

        assert_eq!(
            runner.invocations(),
            vec!["hdfs dfs -getmerge /data/input/* /tmp/merged-input.txt"]
        );
    }

    #[test]
    fn test_hdfs_failure_carries_output() {
        let runner = MockRunner::with_responses(vec![crate::runner::CommandOutput {
            exit_code: 1,
            output: "rm: `/data': No such file or directory".to_string(),
        }]);
        let dfs = HdfsCli::new(&runner, "");

        let err = dfs.remove_recursive("/data").unwrap_err();
        assert!(err.to_string().contains("No such file or directory"));
    }

    #[test]
    fn test_mock_dfs_copy_and_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let dfs = MockDfs::new();
        dfs.insert("/keys/id_rsa", "KEYMATERIAL");

        let local = tmp.path().join("id_rsa");
        dfs.copy_to_local("/keys/id_rsa", &local).unwrap();
        assert_eq!(std::fs::read_to_string(&local).unwrap(), "KEYMATERIAL");

        dfs.remove_recursive("/keys").unwrap();
        assert!(!dfs.exists("/keys/id_rsa").unwrap());
        assert_eq!(dfs.removed(), vec!["/keys"]);
    }
}
