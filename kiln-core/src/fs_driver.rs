//! The `FileSystemDriver` interface consumed by [`crate::worker`] (spec.md
//! §6). `create_argv`/`clone_argv` are pure — they produce the argv of a
//! command that [`crate::command::run_argv`] executes, so a single runner
//! captures output uniformly, the same shape `buildsys::builder::docker`
//! uses for shelling out to `docker`. `remove` executes directly and
//! reports its own error, matching spec.md's `Remove(path) -> error`.

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait FileSystemDriver: Send + Sync {
    /// Produce the argv of a command that creates `path` as a fresh build
    /// root.
    fn create_argv(&self, path: &Path) -> Vec<String>;

    /// Produce the argv of a command that copy-on-write clones `src` to
    /// `dst`.
    fn clone_argv(&self, src: &Path, dst: &Path) -> Vec<String>;

    /// Remove a build root.
    async fn remove(&self, path: &Path) -> Result<()>;
}
