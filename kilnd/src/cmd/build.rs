use anyhow::{Context, Result};
use clap::Parser;
use kiln_core::config::{Config, FileSystemKind};
use kiln_core::job::Job;
use kiln_core::worker::Worker;
use kiln_fs::{BtrfsDriver, PlainDriver};
use kiln_sandbox::DockerSandbox;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Run a single build job to completion.
#[derive(Debug, Parser)]
pub(crate) struct Build {
    /// Path to the server's `kiln.toml` configuration file.
    #[clap(long, env = "KILN_CONFIG", default_value = "kiln.toml")]
    config: PathBuf,

    /// Project name, matching a directory under `projects_path`.
    #[clap(long)]
    project: String,

    /// A `KEY=VALUE` build parameter. May be given more than once.
    #[clap(long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Optional group key; repeated builds in the same group clone the
    /// group's previous build instead of its own prior fingerprint.
    #[clap(long, default_value = "")]
    group: String,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}

impl Build {
    pub(crate) async fn execute(self) -> Result<()> {
        let config = Config::from_file(&self.config)
            .with_context(|| format!("loading configuration from {}", self.config.display()))?;

        let params: BTreeMap<String, String> = self.params.into_iter().collect();
        let fingerprint = kiln_core::fingerprint::fingerprint(&self.project, &params, &self.group);
        let job = Job::new(&self.project, params, &self.group, fingerprint);

        let worker = build_worker(&config);
        worker
            .sweep_orphaned_pending()
            .await
            .context("sweeping orphaned pending directories")?;

        let cancel = CancellationToken::new();
        let ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctrl_c.cancel();
            }
        });

        let result = worker
            .work(&job, &cancel)
            .await
            .with_context(|| format!("running job {}", job.fingerprint))?;

        println!("{}", serde_json::to_string_pretty(&result)?);
        Ok(())
    }
}

fn build_worker(config: &Config) -> Worker {
    let fs_driver: Arc<dyn kiln_core::fs_driver::FileSystemDriver> = match config.file_system {
        FileSystemKind::Plain => Arc::new(PlainDriver),
        FileSystemKind::Btrfs => Arc::new(BtrfsDriver),
    };

    Worker::new(
        config.projects_path.clone(),
        config.root_build_path.clone(),
        config.uid,
        fs_driver,
        Arc::new(DockerSandbox),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_param() {
        assert_eq!(
            parse_param("VERSION=1.2.3").unwrap(),
            ("VERSION".to_string(), "1.2.3".to_string())
        );
    }

    #[test]
    fn rejects_param_without_equals() {
        assert!(parse_param("VERSION").is_err());
    }

    #[test]
    fn param_value_may_itself_contain_equals() {
        assert_eq!(
            parse_param("FLAGS=a=b").unwrap(),
            ("FLAGS".to_string(), "a=b".to_string())
        );
    }
}
