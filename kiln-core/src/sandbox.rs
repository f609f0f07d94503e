//! The `BuildSandbox` interface consumed by [`crate::worker`] (spec.md §6):
//! build an image, then run a container from it, producing an exit code and
//! logs. Errors from this trait are infrastructure failures; a non-zero
//! container exit is reported through `exit_code`, never through `Err`.

use async_trait::async_trait;
use std::error::Error as StdError;
use std::path::Path;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

pub type SandboxError = Box<dyn StdError + Send + Sync>;

/// Everything the sandbox needs to run a job's container: where its staged
/// data directory lives on the host, and what UID the process inside should
/// run as.
#[derive(Clone, Debug)]
pub struct ContainerConfig {
    pub fingerprint: String,
    pub project: String,
    pub data_dir: std::path::PathBuf,
    pub uid: u32,
}

#[async_trait]
pub trait BuildSandbox: Send + Sync {
    /// Build the image for this job against the per-project build
    /// definition at `project_dir` (spec.md §1: "Builds run inside
    /// container sandboxes produced from per-project build definitions"),
    /// streaming combined output into `log_sink`.
    async fn build_image(
        &self,
        cancel: &CancellationToken,
        project_dir: &Path,
        fingerprint: &str,
        uid: u32,
        log_sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<(), SandboxError>;

    /// Run the container built by `build_image`, streaming combined output
    /// into `log_sink`. The returned exit code is captured verbatim,
    /// including non-zero values; only a failure to launch the container at
    /// all is `Err`.
    async fn start_container(
        &self,
        cancel: &CancellationToken,
        config: &ContainerConfig,
        log_sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<i32, SandboxError>;
}
