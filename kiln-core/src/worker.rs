//! The Work pipeline (spec.md §4.4): given a job, decide whether to serve a
//! cached result, coalesce onto an in-flight twin, or perform a fresh
//! build; stage the filesystem, run the sandbox, and publish atomically.

use crate::bootstrap::ensure_project;
use crate::codec;
use crate::command::run_argv;
use crate::error::{self, Result};
use crate::fs_driver::FileSystemDriver;
use crate::job::Job;
use crate::layout::PathLayout;
use crate::project_lock::ProjectLock;
use crate::queue::JobQueue;
use crate::result::{BuildResult, TransportMethod};
use crate::sandbox::{BuildSandbox, ContainerConfig};
use log::{debug, info, warn};
use snafu::ResultExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// Interval between `POLL_READY` re-stats (spec.md §8 boundary behavior:
/// "poll interval is exactly 2 seconds").
const POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct Worker {
    queue: Arc<JobQueue>,
    project_lock: Arc<ProjectLock>,
    fs_driver: Arc<dyn FileSystemDriver>,
    sandbox: Arc<dyn BuildSandbox>,
    projects_path: PathBuf,
    root_build_path: PathBuf,
    uid: u32,
}

impl Worker {
    pub fn new(
        projects_path: impl Into<PathBuf>,
        root_build_path: impl Into<PathBuf>,
        uid: u32,
        fs_driver: Arc<dyn FileSystemDriver>,
        sandbox: Arc<dyn BuildSandbox>,
    ) -> Self {
        Self {
            queue: Arc::new(JobQueue::new()),
            project_lock: Arc::new(ProjectLock::new()),
            fs_driver,
            sandbox,
            projects_path: projects_path.into(),
            root_build_path: root_build_path.into(),
            uid,
        }
    }

    /// Best-effort sweep of `pending/` at startup (spec.md §9: "an
    /// implementer may add a best-effort sweep of `pending/` at startup").
    /// A freshly started process has an empty `JobQueue`, so every pending
    /// directory on disk is orphaned residue from a prior crash.
    pub async fn sweep_orphaned_pending(&self) -> Result<()> {
        let pending_root = self.root_build_path.join("pending");
        let entries = match std::fs::read_dir(&pending_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(error::Error::Stat {
                    path: pending_root,
                    source,
                })
            }
        };
        for entry in entries {
            let entry = entry.context(error::StatSnafu {
                path: pending_root.clone(),
            })?;
            let path = entry.path();
            warn!(
                "removing orphaned pending build directory {}",
                path.display()
            );
            self.fs_driver.remove(&path).await?;
        }
        Ok(())
    }

    /// The Work pipeline itself: `CHECK_READY` → `TRY_ADMIT` →
    /// (`POLL_READY` | build-and-publish).
    pub async fn work(&self, job: &Job, cancel: &CancellationToken) -> Result<BuildResult> {
        let layout = PathLayout::new(
            &self.root_build_path,
            job.project.clone(),
            job.fingerprint.clone(),
            job.group.clone(),
        );

        if let Some(result) = self.check_ready(&layout)? {
            debug!("cache hit for fingerprint {}", job.fingerprint);
            return Ok(result);
        }

        if !self.queue.add(&job.fingerprint) {
            debug!("coalescing onto in-flight build of {}", job.fingerprint);
            return self.poll_ready(&layout, cancel).await;
        }

        // From here on, the queue entry for this fingerprint must be
        // removed on every exit path, success or failure — Drop handles
        // that unconditionally since dequeuing is plain synchronous state.
        let _queue_guard = QueueGuard {
            queue: &self.queue,
            fingerprint: &job.fingerprint,
        };

        info!("admitted build for fingerprint {}", job.fingerprint);
        self.build_and_publish(&layout, job, cancel).await
    }

    fn check_ready(&self, layout: &PathLayout) -> Result<Option<BuildResult>> {
        match std::fs::metadata(&layout.ready_build_path) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(error::Error::Stat {
                    path: layout.ready_build_path.clone(),
                    source,
                })
            }
        }

        let mut result = self.read_published_result(layout)?;
        result.cached = true;
        result.coalesced = false;
        Ok(Some(result))
    }

    /// Poll `ReadyBuildPath` every 2s until it appears or `cancel` fires.
    /// Polling (rather than a condition variable) stays correct when
    /// publication happens out of process — a crash-recovered worker or a
    /// second server instance sharing the same filesystem.
    async fn poll_ready(&self, layout: &PathLayout, cancel: &CancellationToken) -> Result<BuildResult> {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(error::Error::WaitCancelled {
                        fingerprint: layout.fingerprint.clone(),
                    });
                }
                _ = ticker.tick() => {
                    if let Some(mut result) = self.check_ready(layout)? {
                        result.cached = false;
                        result.coalesced = true;
                        return Ok(result);
                    }
                }
            }
        }
    }

    fn read_published_result(&self, layout: &PathLayout) -> Result<BuildResult> {
        codec::decode(&layout.build_result_file_path).map_err(|(_partial, e)| e)
    }

    async fn build_and_publish(
        &self,
        layout: &PathLayout,
        job: &Job,
        cancel: &CancellationToken,
    ) -> Result<BuildResult> {
        ensure_project(&self.projects_path, &self.project_lock, layout)
            .await
            .map_err(|e| e.context("ensuring project exists"))?;

        let clone_src = if layout.is_grouped() {
            resolve_clone_src(&layout.latest_build_path)
        } else {
            None
        };

        // `FileSystemDriver::create`/`clone` itself may already have left a
        // directory behind even when it errors (e.g. a `btrfs subvolume
        // create` that succeeded before a later step in the same command
        // failed), and the per-job subdirectories it ensures afterward run
        // only once that Create/Clone has committed us to cleanup-on-failure
        // (spec.md §4.4). So every failure from here on, not just
        // `stage_and_run`'s, is routed through `cleanup_pending`.
        if let Err(e) = self.bootstrap_build_dir(layout, clone_src.as_deref()).await {
            return Err(self.cleanup_pending(layout, e.context("staging build directory")).await);
        }

        let staged = self.stage_and_run(layout, job, cancel).await;

        let result = match staged {
            Ok(result) => result,
            Err(e) => return Err(self.cleanup_pending(layout, e).await),
        };

        self.publish(layout, result).await
    }

    /// Create (or copy-on-write clone) the pending directory, and ensure
    /// its four data subdirectories exist. If cloned, stale params from the
    /// prior build are removed so they cannot leak into this job.
    ///
    /// Filesystem staging is not one of the phases spec.md §5 lists as
    /// cancellable ("Cancellation is honored only in POLL_READY, in image
    /// build, and in container run"), so the Create/Clone invocation runs
    /// against a token of its own that nothing ever drives to cancellation,
    /// the same pattern `BtrfsDriver::remove` uses for its own
    /// non-interruptible cleanup command.
    async fn bootstrap_build_dir(&self, layout: &PathLayout, clone_src: Option<&Path>) -> Result<()> {
        let mut log = NullSink;
        let argv = match clone_src {
            Some(src) => self.fs_driver.clone_argv(src, &layout.pending_build_path),
            None => self.fs_driver.create_argv(&layout.pending_build_path),
        };
        let uncancellable = CancellationToken::new();
        let status = run_argv(&argv, &uncancellable, &mut log).await?;
        if !status.success() {
            return Err(error::Error::FileSystemDriver {
                path: layout.pending_build_path.clone(),
                source: format!("driver command exited with {status}").into(),
            });
        }

        if clone_src.is_some() {
            // Stale params from the source build must not survive into
            // this job's workspace.
            let _ = std::fs::remove_dir_all(&layout.pending_data.params_dir);
        }

        for dir in [
            &layout.pending_data.data_dir,
            &layout.pending_data.cache_dir,
            &layout.pending_data.artifacts_dir,
            &layout.pending_data.params_dir,
        ] {
            std::fs::create_dir_all(dir).context(error::DirectoryCreateSnafu { path: dir })?;
        }

        Ok(())
    }

    /// `WRITE_PARAMS` → `OPEN_LOG` → `BUILD_IMAGE` → `RUN_CONTAINER` →
    /// `WRITE_RESULT`. Everything here runs with a pending directory
    /// already on disk; the caller is responsible for cleaning it up if
    /// this returns `Err`.
    async fn stage_and_run(
        &self,
        layout: &PathLayout,
        job: &Job,
        cancel: &CancellationToken,
    ) -> Result<BuildResult> {
        self.write_params(layout, job)?;

        let mut log_file = tokio::fs::File::create(&layout.build_log_path)
            .await
            .context(error::OpenLogSnafu {
                path: &layout.build_log_path,
            })?;

        let build_outcome = self.run_sandbox(layout, job, cancel, &mut log_file).await;

        let close_result = log_file.flush().await.context(error::CloseLogSnafu {
            path: &layout.build_log_path,
        });

        let exit_code = match (build_outcome, close_result) {
            (Ok(exit_code), Ok(())) => exit_code,
            (Ok(_), Err(close_err)) => return Err(close_err),
            (Err(build_err), Ok(())) => return Err(build_err),
            (Err(build_err), Err(close_err)) => return Err(build_err.with_cleanup_failure(close_err)),
        };

        let result = BuildResult {
            exit_code,
            path: layout.ready_data.artifacts_dir.display().to_string(),
            transport_method: TransportMethod::Rsync,
            params: job.params.clone(),
            cached: false,
            coalesced: false,
        };

        codec::encode(&result, &layout.build_result_file_path)?;
        Ok(result)
    }

    async fn run_sandbox(
        &self,
        layout: &PathLayout,
        job: &Job,
        cancel: &CancellationToken,
        log_file: &mut tokio::fs::File,
    ) -> Result<i32> {
        let project_dir = self.projects_path.join(&job.project);
        self.sandbox
            .build_image(cancel, &project_dir, &job.fingerprint, self.uid, log_file)
            .await
            .map_err(|source| error::Error::SandboxBuildImage {
                fingerprint: job.fingerprint.clone(),
                source,
            })?;

        let config = ContainerConfig {
            fingerprint: job.fingerprint.clone(),
            project: job.project.clone(),
            data_dir: layout.pending_data.data_dir.clone(),
            uid: self.uid,
        };

        // A non-zero exit is data, not an error (spec.md §7 kind 4); only
        // a failure to launch the container at all is `Err` here.
        self.sandbox
            .start_container(cancel, &config, log_file)
            .await
            .map_err(|source| error::Error::SandboxRunContainer {
                fingerprint: job.fingerprint.clone(),
                source,
            })
    }

    fn write_params(&self, layout: &PathLayout, job: &Job) -> Result<()> {
        for (key, value) in &job.params {
            let path = layout.pending_data.params_dir.join(key);
            std::fs::write(&path, value).context(error::WriteFileSnafu { path: &path })?;
            set_mode_0644(&path)?;
        }
        Ok(())
    }

    async fn cleanup_pending(&self, layout: &PathLayout, primary: error::Error) -> error::Error {
        match self.fs_driver.remove(&layout.pending_build_path).await {
            Ok(()) => primary,
            Err(cleanup) => primary.with_cleanup_failure(cleanup),
        }
    }

    /// `PUBLISH`: atomic rename, then (non-atomically) repoint the latest
    /// pointer. Once the rename succeeds, the directory is no longer
    /// "pending" and is never cleaned up by this worker again — invariant 1
    /// (a ready path is always complete) must hold from this point on.
    async fn publish(&self, layout: &PathLayout, mut result: BuildResult) -> Result<BuildResult> {
        std::fs::rename(&layout.pending_build_path, &layout.ready_build_path).context(
            error::RenameSnafu {
                from: &layout.pending_build_path,
                to: &layout.ready_build_path,
            },
        )?;

        if let Err(e) = update_latest_pointer(&layout.latest_build_path, &layout.ready_build_path) {
            warn!(
                "published {} but failed to update latest pointer {}: {e}",
                layout.ready_build_path.display(),
                layout.latest_build_path.display()
            );
            return Err(e);
        }

        result.path = layout.ready_data.artifacts_dir.display().to_string();
        Ok(result)
    }
}

struct QueueGuard<'a> {
    queue: &'a JobQueue,
    fingerprint: &'a str,
}

impl Drop for QueueGuard<'_> {
    fn drop(&mut self) {
        self.queue.delete(self.fingerprint);
    }
}

/// `AsyncWrite` sink that discards everything, used for the small
/// filesystem-driver commands (`mkdir`, `cp --reflink`, `btrfs subvolume
/// create`) whose output doesn't belong in the build log.
struct NullSink;

impl tokio::io::AsyncWrite for NullSink {
    fn poll_write(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        std::task::Poll::Ready(Ok(buf.len()))
    }
    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::task::Poll::Ready(Ok(()))
    }
    fn poll_shutdown(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::task::Poll::Ready(Ok(()))
    }
}

/// Resolve `latest_build_path` to the build it points at. Symlink errors
/// are never fatal (spec.md §4.4): a missing or broken link just means a
/// fresh build instead of a clone.
fn resolve_clone_src(latest_build_path: &Path) -> Option<PathBuf> {
    let target = match std::fs::read_link(latest_build_path) {
        Ok(target) => target,
        Err(e) => {
            debug!(
                "no latest pointer at {} ({e}); building from scratch",
                latest_build_path.display()
            );
            return None;
        }
    };

    let resolved = if target.is_absolute() {
        target
    } else {
        latest_build_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(target)
    };

    if resolved.exists() {
        Some(resolved)
    } else {
        warn!(
            "latest pointer {} targets missing path {}; building from scratch",
            latest_build_path.display(),
            resolved.display()
        );
        None
    }
}

/// Repoint `latest` at `ready_build_path`. Not atomic with the rename that
/// preceded it (spec.md §4.4/§9): a reader observing the old pointer in the
/// gap just gets a valid older build.
fn update_latest_pointer(latest_build_path: &Path, ready_build_path: &Path) -> Result<()> {
    match std::fs::symlink_metadata(latest_build_path) {
        Ok(_) => {
            std::fs::remove_file(latest_build_path).context(error::RemoveLinkSnafu {
                path: latest_build_path,
            })?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(error::Error::Stat {
                path: latest_build_path.to_path_buf(),
                source,
            })
        }
    }

    std::os::unix::fs::symlink(ready_build_path, latest_build_path).context(
        error::CreateLinkSnafu {
            link: latest_build_path,
            target: ready_build_path,
        },
    )
}

fn set_mode_0644(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let permissions = std::fs::Permissions::from_mode(0o644);
    std::fs::set_permissions(path, permissions).context(error::WriteFileSnafu { path })
}
