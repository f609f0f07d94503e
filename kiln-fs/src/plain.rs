//! The default driver: plain directories, copied with `cp -a`.
//!
//! `--reflink=auto` lets `cp` fall back to a full copy transparently when
//! the underlying filesystem (e.g. overlayfs, most cloud block devices)
//! doesn't support reflinks, so this driver works everywhere `BtrfsDriver`
//! would but without the copy-on-write speedup.

use async_trait::async_trait;
use kiln_core::error::{self, Result};
use kiln_core::fs_driver::FileSystemDriver;
use snafu::ResultExt;
use std::path::Path;

#[derive(Debug, Default)]
pub struct PlainDriver;

#[async_trait]
impl FileSystemDriver for PlainDriver {
    fn create_argv(&self, path: &Path) -> Vec<String> {
        vec![
            "mkdir".to_string(),
            "-p".to_string(),
            path.display().to_string(),
        ]
    }

    fn clone_argv(&self, src: &Path, dst: &Path) -> Vec<String> {
        vec![
            "cp".to_string(),
            "-a".to_string(),
            "--reflink=auto".to_string(),
            src.display().to_string(),
            dst.display().to_string(),
        ]
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(source).context(error::DirectoryRemoveSnafu {
                path: path.to_path_buf(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_argv_uses_mkdir_p() {
        let driver = PlainDriver;
        assert_eq!(
            driver.create_argv(Path::new("/tmp/x")),
            vec!["mkdir", "-p", "/tmp/x"]
        );
    }

    #[test]
    fn clone_argv_prefers_reflink() {
        let driver = PlainDriver;
        let argv = driver.clone_argv(Path::new("/a"), Path::new("/b"));
        assert_eq!(argv, vec!["cp", "-a", "--reflink=auto", "/a", "/b"]);
    }

    #[tokio::test]
    async fn remove_is_idempotent_on_missing_path() {
        let driver = PlainDriver;
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        driver.remove(&missing).await.unwrap();
    }

    #[tokio::test]
    async fn remove_deletes_directory_tree() {
        let driver = PlainDriver;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("build");
        std::fs::create_dir_all(target.join("data")).unwrap();
        std::fs::write(target.join("data").join("f"), b"x").unwrap();

        driver.remove(&target).await.unwrap();
        assert!(!target.exists());
    }
}
