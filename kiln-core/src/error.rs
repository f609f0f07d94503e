use snafu::Snafu;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Unknown project '{project}'"))]
    UnknownProject { project: String },

    #[snafu(display("failed to create directory {}: {source}", path.display()))]
    DirectoryCreate {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to remove directory {}: {source}", path.display()))]
    DirectoryRemove {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to stat {}: {source}", path.display()))]
    Stat {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to read symlink {}: {source}", path.display()))]
    ReadLink {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to remove symlink {}: {source}", path.display()))]
    RemoveLink {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to create symlink {} -> {}: {source}", link.display(), target.display()))]
    CreateLink {
        link: PathBuf,
        target: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to rename {} to {}: {source}", from.display(), to.display()))]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to write {}: {source}", path.display()))]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to read {}: {source}", path.display()))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to open {} for logging: {source}", path.display()))]
    OpenLog {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to close {}: {source}", path.display()))]
    CloseLog {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to decode build result at {}: {source}", path.display()))]
    DecodeResult {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("failed to encode build result for {}: {source}", path.display()))]
    EncodeResult {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("filesystem driver failed for {}: {source}", path.display()))]
    FileSystemDriver {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[snafu(display("sandbox failed to build image for {fingerprint}: {source}"))]
    SandboxBuildImage {
        fingerprint: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[snafu(display("sandbox failed to start container for {fingerprint}: {source}"))]
    SandboxRunContainer {
        fingerprint: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[snafu(display("context cancelled while waiting for pending build of {fingerprint}"))]
    WaitCancelled { fingerprint: String },

    #[snafu(display("failed to load configuration from {}: {source}", path.display()))]
    LoadConfig {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[snafu(display("work: {message}: {source}"))]
    Work {
        message: String,
        source: Box<Error>,
    },

    #[snafu(display("work: {message} (cleanup also failed: {cleanup})"))]
    WorkWithCleanupFailure {
        message: String,
        source: Box<Error>,
        cleanup: Box<Error>,
    },
}

impl Error {
    /// Wrap this error with a short, human-readable description of the stage
    /// that failed, in the style `"work: staging build directory: <cause>"`.
    pub fn context(self, message: impl Into<String>) -> Error {
        Error::Work {
            message: message.into(),
            source: Box::new(self),
        }
    }

    /// Compose a cleanup failure into the primary error rather than letting
    /// it replace or silently discard the root cause (spec.md error kind 5).
    pub fn with_cleanup_failure(self, cleanup: Error) -> Error {
        match self {
            Error::Work { message, source } => Error::WorkWithCleanupFailure {
                message,
                source,
                cleanup: Box::new(cleanup),
            },
            other => Error::WorkWithCleanupFailure {
                message: "cleanup after failure".to_string(),
                source: Box::new(other),
                cleanup: Box::new(cleanup),
            },
        }
    }
}
