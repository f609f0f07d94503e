use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sentinel exit code used when `build_info.json` is missing or malformed.
pub const UNREADABLE_EXIT_CODE: i32 = -999;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransportMethod {
    Rsync,
}

/// Persisted output descriptor, written as `build_info.json` inside the
/// pending directory and never mutated once a build is published.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildResult {
    #[serde(rename = "ExitCode")]
    pub exit_code: i32,
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "TransportMethod")]
    pub transport_method: TransportMethod,
    #[serde(rename = "Params")]
    pub params: BTreeMap<String, String>,
    #[serde(rename = "Cached")]
    pub cached: bool,
    #[serde(rename = "Coalesced")]
    pub coalesced: bool,
}

impl BuildResult {
    pub fn unreadable(path: impl Into<String>, params: BTreeMap<String, String>) -> Self {
        Self {
            exit_code: UNREADABLE_EXIT_CODE,
            path: path.into(),
            transport_method: TransportMethod::Rsync,
            params,
            cached: false,
            coalesced: false,
        }
    }
}
