//! A [`kiln_core::sandbox::BuildSandbox`] backed by the `docker` CLI.

mod docker;
mod retry;

pub use docker::DockerSandbox;
