//! A driver backed by btrfs subvolumes, so `Clone` is a snapshot rather
//! than a copy. Requires the build root to live on a btrfs filesystem;
//! `kilnd` picks this driver via `Config.file_system = "btrfs"`.

use async_trait::async_trait;
use kiln_core::command;
use kiln_core::error::{self, Result};
use kiln_core::fs_driver::FileSystemDriver;
use log::debug;
use std::path::Path;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub struct BtrfsDriver;

#[async_trait]
impl FileSystemDriver for BtrfsDriver {
    fn create_argv(&self, path: &Path) -> Vec<String> {
        vec![
            "btrfs".to_string(),
            "subvolume".to_string(),
            "create".to_string(),
            path.display().to_string(),
        ]
    }

    fn clone_argv(&self, src: &Path, dst: &Path) -> Vec<String> {
        vec![
            "btrfs".to_string(),
            "subvolume".to_string(),
            "snapshot".to_string(),
            src.display().to_string(),
            dst.display().to_string(),
        ]
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        debug!("deleting btrfs subvolume {}", path.display());
        let argv = vec![
            "btrfs".to_string(),
            "subvolume".to_string(),
            "delete".to_string(),
            path.display().to_string(),
        ];
        // Deletion isn't interruptible: the subvolume must either go away
        // or the caller finds out it didn't, so there's no cancellation
        // token to plumb through here.
        let cancel = CancellationToken::new();
        let status = command::run_argv(&argv, &cancel, &mut tokio::io::sink())
            .await
            .map_err(|source| source.context(format!("removing subvolume {}", path.display())))?;

        if status.success() {
            Ok(())
        } else {
            Err(error::Error::FileSystemDriver {
                path: path.to_path_buf(),
                source: format!("btrfs subvolume delete exited with {status}").into(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_argv_uses_subvolume_create() {
        let driver = BtrfsDriver;
        assert_eq!(
            driver.create_argv(Path::new("/build/x")),
            vec!["btrfs", "subvolume", "create", "/build/x"]
        );
    }

    #[test]
    fn clone_argv_uses_subvolume_snapshot() {
        let driver = BtrfsDriver;
        assert_eq!(
            driver.clone_argv(Path::new("/a"), Path::new("/b")),
            vec!["btrfs", "subvolume", "snapshot", "/a", "/b"]
        );
    }

    #[tokio::test]
    async fn remove_is_idempotent_on_missing_path() {
        let driver = BtrfsDriver;
        let dir = tempfile::tempdir().unwrap();
        driver.remove(&dir.path().join("gone")).await.unwrap();
    }
}
