//! Encode/decode of the persisted [`BuildResult`] descriptor.

use crate::error::{self, Result};
use crate::result::{BuildResult, UNREADABLE_EXIT_CODE};
use snafu::ResultExt;
use std::path::Path;

/// Serialize `result` as JSON to `path`. Writes are not fsync'd; the caller
/// (`Worker::work`) is responsible for the containing directory's lifecycle.
pub fn encode(result: &BuildResult, path: &Path) -> Result<()> {
    let body = serde_json::to_vec_pretty(result).context(error::EncodeResultSnafu { path })?;
    std::fs::write(path, body).context(error::WriteFileSnafu { path })?;
    Ok(())
}

/// Decode a [`BuildResult`] from `path`. Any failure to read or parse the
/// file is reported as `ExitCode = -999` per spec.md §4.5/§8, alongside the
/// underlying error so the cause is never silently discarded.
pub fn decode(path: &Path) -> std::result::Result<BuildResult, (BuildResult, error::Error)> {
    let read = std::fs::read(path).context(error::ReadFileSnafu { path });
    let body = match read {
        Ok(body) => body,
        Err(e) => {
            return Err((unreadable(path), e));
        }
    };
    match serde_json::from_slice::<BuildResult>(&body) {
        Ok(result) => Ok(result),
        Err(source) => Err((
            unreadable(path),
            error::Error::DecodeResult {
                path: path.to_path_buf(),
                source,
            },
        )),
    }
}

fn unreadable(path: &Path) -> BuildResult {
    BuildResult::unreadable(path.display().to_string(), Default::default())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::result::TransportMethod;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[test]
    fn round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("build_info.json");
        let mut params = BTreeMap::new();
        params.insert("VERSION".to_string(), "1".to_string());

        let result = BuildResult {
            exit_code: 0,
            path: "/builds/ready/abc".to_string(),
            transport_method: TransportMethod::Rsync,
            params,
            cached: false,
            coalesced: false,
        };

        encode(&result, &path).unwrap();
        let decoded = decode(&path).unwrap();
        assert_eq!(decoded, result);
    }

    #[test]
    fn missing_file_is_unreadable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");
        let (result, _err) = decode(&path).unwrap_err();
        assert_eq!(result.exit_code, UNREADABLE_EXIT_CODE);
    }

    #[test]
    fn malformed_file_is_unreadable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("build_info.json");
        std::fs::write(&path, b"not json").unwrap();
        let (result, _err) = decode(&path).unwrap_err();
        assert_eq!(result.exit_code, UNREADABLE_EXIT_CODE);
    }
}
