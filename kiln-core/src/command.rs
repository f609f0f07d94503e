//! A single command-runner that executes the argv produced by
//! `FileSystemDriver::create`/`clone_into`, capturing combined output
//! uniformly (spec.md §6: "[the driver] returns argv rather than executing
//! directly so that a single command-runner can capture output uniformly").

use crate::error::{self, Result};
use snafu::ResultExt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Run `argv[0] argv[1..]`, streaming combined stdout/stderr into
/// `log_sink`. If `cancel` fires before the child exits, the child is
/// killed and the wait is abandoned.
pub async fn run_argv(
    argv: &[String],
    cancel: &CancellationToken,
    log_sink: &mut (dyn AsyncWrite + Send + Unpin),
) -> Result<std::process::ExitStatus> {
    let (program, args) = argv
        .split_first()
        .expect("FileSystemDriver must never produce an empty argv");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context(error::FileSystemDriverSnafu {
            path: PathBuf::from(program),
        })?;

    let mut stdout = child.stdout.take().expect("piped stdout");
    let mut stderr = child.stderr.take().expect("piped stderr");

    let status = tokio::select! {
        _ = cancel.cancelled() => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(error::Error::FileSystemDriver {
                path: PathBuf::from(program),
                source: "command cancelled".into(),
            });
        }
        result = drain_and_wait(&mut child, &mut stdout, &mut stderr, log_sink) => result?,
    };

    Ok(status)
}

async fn drain_and_wait(
    child: &mut tokio::process::Child,
    stdout: &mut (impl AsyncRead + Unpin),
    stderr: &mut (impl AsyncRead + Unpin),
    log_sink: &mut (dyn AsyncWrite + Send + Unpin),
) -> Result<std::process::ExitStatus> {
    // Read both pipes concurrently; reading them sequentially risks a
    // deadlock if the child fills the pipe we haven't gotten to yet.
    let mut out_buf = Vec::new();
    let mut err_buf = Vec::new();
    let (out_result, err_result) = tokio::join!(
        stdout.read_to_end(&mut out_buf),
        stderr.read_to_end(&mut err_buf),
    );
    out_result.context(error::ReadFileSnafu {
        path: PathBuf::from("<child stdout>"),
    })?;
    err_result.context(error::ReadFileSnafu {
        path: PathBuf::from("<child stderr>"),
    })?;

    let mut combined = out_buf;
    combined.extend_from_slice(&err_buf);
    log_sink
        .write_all(&combined)
        .await
        .context(error::WriteFileSnafu {
            path: PathBuf::from("<log sink>"),
        })?;

    child.wait().await.context(error::FileSystemDriverSnafu {
        path: PathBuf::from("<child process>"),
    })
}
