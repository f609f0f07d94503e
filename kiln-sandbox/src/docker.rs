//! `BuildSandbox` backed by the `docker` CLI.
//!
//! `build_image` retries a handful of known-transient Docker/BuildKit
//! failures by re-running the build from scratch, recognized by matching
//! their signature against captured output. `start_container` never
//! retries: once the container has actually run, a non-zero exit is a
//! real result, not a flake, and is reported through the exit code rather
//! than `Err`.

use crate::retry::{is_retryable, DOCKER_BUILD_MAX_ATTEMPTS};
use async_trait::async_trait;
use kiln_core::sandbox::{BuildSandbox, ContainerConfig, SandboxError};
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub struct DockerSandbox;

impl DockerSandbox {
    fn image_tag(fingerprint: &str) -> String {
        format!("kiln-build-{fingerprint}")
    }

    fn container_name(fingerprint: &str) -> String {
        format!("kiln-run-{fingerprint}")
    }
}

#[async_trait]
impl BuildSandbox for DockerSandbox {
    async fn build_image(
        &self,
        cancel: &CancellationToken,
        project_dir: &Path,
        fingerprint: &str,
        uid: u32,
        log_sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<(), SandboxError> {
        let tag = Self::image_tag(fingerprint);
        let dockerfile = project_dir.join("Dockerfile");
        let argv = vec![
            "build".to_string(),
            "--network".to_string(),
            "host".to_string(),
            "--build-arg".to_string(),
            format!("BUILD_UID={uid}"),
            "--tag".to_string(),
            tag.clone(),
            "--file".to_string(),
            dockerfile.display().to_string(),
            project_dir.display().to_string(),
        ];

        let mut attempt: u16 = 1;
        loop {
            let (status, combined) = run_docker(&argv, cancel, log_sink).await?;
            if status.success() {
                return Ok(());
            }
            let max_attempts = DOCKER_BUILD_MAX_ATTEMPTS.get();
            if attempt < max_attempts && is_retryable(&combined) {
                log::warn!(
                    "docker build for {fingerprint} failed with a known-transient error \
                     (attempt {attempt}/{max_attempts}), retrying"
                );
                attempt += 1;
                continue;
            }
            return Err(format!("docker build exited with {status}").into());
        }
    }

    async fn start_container(
        &self,
        cancel: &CancellationToken,
        config: &ContainerConfig,
        log_sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<i32, SandboxError> {
        let tag = Self::image_tag(&config.fingerprint);
        let name = Self::container_name(&config.fingerprint);
        let argv = vec![
            "run".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            name,
            "--network".to_string(),
            "host".to_string(),
            "-u".to_string(),
            config.uid.to_string(),
            "-v".to_string(),
            format!("{}:/build/data", config.data_dir.display()),
            tag,
        ];

        let (status, _) = run_docker(&argv, cancel, log_sink).await?;
        Ok(status.code().unwrap_or(-1))
    }
}

/// Run `docker <argv>`, streaming combined output into `log_sink` and also
/// returning it so callers can inspect it for retryable failure signatures.
async fn run_docker(
    argv: &[String],
    cancel: &CancellationToken,
    log_sink: &mut (dyn AsyncWrite + Send + Unpin),
) -> Result<(std::process::ExitStatus, String), SandboxError> {
    let mut child = Command::new("docker")
        .args(argv)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let mut stdout = child.stdout.take().expect("piped stdout");
    let mut stderr = child.stderr.take().expect("piped stderr");

    let status = tokio::select! {
        _ = cancel.cancelled() => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err("docker invocation cancelled".into());
        }
        result = drain(&mut child, &mut stdout, &mut stderr, log_sink) => result?,
    };

    status
}

async fn drain(
    child: &mut tokio::process::Child,
    stdout: &mut (impl tokio::io::AsyncRead + Unpin),
    stderr: &mut (impl tokio::io::AsyncRead + Unpin),
    log_sink: &mut (dyn AsyncWrite + Send + Unpin),
) -> Result<(std::process::ExitStatus, String), SandboxError> {
    let mut out_buf = Vec::new();
    let mut err_buf = Vec::new();
    let (out_result, err_result) = tokio::join!(
        stdout.read_to_end(&mut out_buf),
        stderr.read_to_end(&mut err_buf),
    );
    out_result?;
    err_result?;

    let mut combined = out_buf;
    combined.extend_from_slice(&err_buf);
    log_sink.write_all(&combined).await?;

    let status = child.wait().await?;
    Ok((status, String::from_utf8_lossy(&combined).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_tag_and_container_name_are_derived_from_fingerprint() {
        assert_eq!(DockerSandbox::image_tag("abc123"), "kiln-build-abc123");
        assert_eq!(DockerSandbox::container_name("abc123"), "kiln-run-abc123");
    }
}
