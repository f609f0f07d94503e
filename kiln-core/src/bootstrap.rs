//! ENSURE_PROJECT / BOOTSTRAP_BUILD_DIR's project-level half (spec.md §4.4,
//! §4.8): verify the project exists, then idempotently create its
//! `pending/`, `ready/`, and (if grouped) `groups/` directories under
//! `ProjectLock`.

use crate::error::{self, Result};
use crate::layout::PathLayout;
use crate::project_lock::ProjectLock;
use log::debug;
use snafu::{ensure, ResultExt};
use std::path::Path;

/// Verify `projects_path/<project>` exists. Spec.md client error kind 1.
pub fn ensure_project_exists(projects_path: &Path, project: &str) -> Result<()> {
    let project_dir = projects_path.join(project);
    ensure!(
        project_dir.is_dir(),
        error::UnknownProjectSnafu { project }
    );
    Ok(())
}

/// Idempotently create `pending/`, `ready/`, and (if grouped) `groups/`
/// under the project's build root. Must be called while holding the
/// project's [`ProjectLock`] guard.
pub fn bootstrap_project(layout: &PathLayout) -> Result<()> {
    create_dir_all(&layout.project_pending_root())?;
    create_dir_all(&layout.project_ready_root())?;
    if layout.is_grouped() {
        create_dir_all(&layout.project_groups_root())?;
    }
    Ok(())
}

/// Run [`ensure_project_exists`] then [`bootstrap_project`] under the given
/// [`ProjectLock`], exactly as spec.md §4.4 ENSURE_PROJECT prescribes.
pub async fn ensure_project(
    projects_path: &Path,
    project_lock: &ProjectLock,
    layout: &PathLayout,
) -> Result<()> {
    ensure_project_exists(projects_path, &layout.project)?;

    let _guard = project_lock.lock(&layout.project).await;
    debug!("bootstrapping project '{}'", layout.project);
    bootstrap_project(layout)
}

fn create_dir_all(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).context(error::DirectoryCreateSnafu { path })
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn unknown_project_is_an_error() {
        let projects = tempdir().unwrap();
        let err = ensure_project_exists(projects.path(), "zzz").unwrap_err();
        assert!(matches!(err, error::Error::UnknownProject { .. }));
    }

    #[tokio::test]
    async fn bootstrap_is_idempotent() {
        let projects = tempdir().unwrap();
        std::fs::create_dir(projects.path().join("alpha")).unwrap();
        let builds = tempdir().unwrap();
        let layout = PathLayout::new(builds.path(), "alpha", "fp1", "g1");
        let lock = ProjectLock::new();

        ensure_project(projects.path(), &lock, &layout)
            .await
            .unwrap();
        ensure_project(projects.path(), &lock, &layout)
            .await
            .unwrap();

        assert!(layout.project_pending_root().is_dir());
        assert!(layout.project_ready_root().is_dir());
        assert!(layout.project_groups_root().is_dir());
    }
}
