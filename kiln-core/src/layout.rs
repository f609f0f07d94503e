//! Pure derivation of every per-job path from `(root_build_path, project,
//! fingerprint, group)`. Never fails; holds no state beyond its fields.
//!
//! The essential design point (spec.md §4.1): ready and pending paths share
//! the fingerprint but differ only in the top-level subdirectory, so
//! publication is a single rename within one filesystem.

use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct DataDirs {
    pub data_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub params_dir: PathBuf,
}

impl DataDirs {
    fn under(build_path: &Path) -> Self {
        let data_dir = build_path.join("data");
        Self {
            artifacts_dir: data_dir.join("artifacts"),
            cache_dir: data_dir.join("cache"),
            params_dir: data_dir.join("params"),
            data_dir,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PathLayout {
    pub root_build_path: PathBuf,
    pub project: String,
    pub fingerprint: String,
    pub group: String,

    pub pending_build_path: PathBuf,
    pub ready_build_path: PathBuf,
    pub latest_build_path: PathBuf,
    pub build_log_path: PathBuf,
    pub build_result_file_path: PathBuf,
    pub pending_data: DataDirs,
    pub ready_data: DataDirs,
}

impl PathLayout {
    pub fn new(
        root_build_path: impl Into<PathBuf>,
        project: impl Into<String>,
        fingerprint: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        let root_build_path = root_build_path.into();
        let project = project.into();
        let fingerprint = fingerprint.into();
        let group = group.into();

        let pending_build_path = root_build_path.join("pending").join(&fingerprint);
        let ready_build_path = root_build_path.join("ready").join(&fingerprint);
        let latest_build_path = if group.is_empty() {
            root_build_path.join("latest")
        } else {
            root_build_path.join("groups").join(&group)
        };
        let build_log_path = pending_build_path.join("out.log");
        let build_result_file_path = pending_build_path.join("build_info.json");
        let pending_data = DataDirs::under(&pending_build_path);
        let ready_data = DataDirs::under(&ready_build_path);

        Self {
            root_build_path,
            project,
            fingerprint,
            group,
            pending_build_path,
            ready_build_path,
            latest_build_path,
            build_log_path,
            build_result_file_path,
            pending_data,
            ready_data,
        }
    }

    pub fn is_grouped(&self) -> bool {
        !self.group.is_empty()
    }

    pub fn project_root(&self) -> PathBuf {
        self.root_build_path.clone()
    }

    pub fn project_pending_root(&self) -> PathBuf {
        self.root_build_path.join("pending")
    }

    pub fn project_ready_root(&self) -> PathBuf {
        self.root_build_path.join("ready")
    }

    pub fn project_groups_root(&self) -> PathBuf {
        self.root_build_path.join("groups")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pending_and_ready_share_fingerprint() {
        let layout = PathLayout::new("/builds", "alpha", "abc123", "");
        assert_eq!(
            layout.pending_build_path.file_name(),
            layout.ready_build_path.file_name()
        );
        assert_eq!(layout.latest_build_path, PathBuf::from("/builds/latest"));
    }

    #[test]
    fn grouped_latest_uses_group_path() {
        let layout = PathLayout::new("/builds", "alpha", "abc123", "g1");
        assert_eq!(
            layout.latest_build_path,
            PathBuf::from("/builds/groups/g1")
        );
    }

    #[test]
    fn data_dirs_nest_under_build_path() {
        let layout = PathLayout::new("/builds", "alpha", "abc123", "");
        assert_eq!(
            layout.pending_data.params_dir,
            PathBuf::from("/builds/pending/abc123/data/params")
        );
    }
}
