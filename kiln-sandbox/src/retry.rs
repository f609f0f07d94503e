//! Signatures of Docker/BuildKit failures known to be transient, carried
//! over from the retry list used for variant and package builds: BuildKit
//! frontend crashes, a dead-record race fixed in some but not all BuildKit
//! releases, and a bare "unexpected EOF" that shows up under load.

use lazy_static::lazy_static;
use nonzero_ext::nonzero;
use regex::Regex;
use std::num::NonZeroU16;

pub static DOCKER_BUILD_MAX_ATTEMPTS: NonZeroU16 = nonzero!(10u16);

lazy_static! {
    static ref DOCKER_BUILD_FRONTEND_ERROR: Regex = Regex::new(concat!(
        r#"failed to solve with frontend dockerfile.v0: "#,
        r#"failed to solve with frontend gateway.v0: "#,
        r#"frontend grpc server closed unexpectedly"#
    ))
    .unwrap();
    static ref DOCKER_BUILD_DEAD_RECORD_ERROR: Regex = Regex::new(concat!(
        r#"failed to solve with frontend dockerfile.v0: "#,
        r#"failed to solve with frontend gateway.v0: "#,
        r#"rpc error: code = Unknown desc = failed to build LLB: "#,
        r#"failed to get dead record"#,
    ))
    .unwrap();
    static ref UNEXPECTED_EOF_ERROR: Regex = Regex::new("(?m)unexpected EOF$").unwrap();
    static ref RETRY_PATTERNS: Vec<&'static Regex> = vec![
        &*DOCKER_BUILD_FRONTEND_ERROR,
        &*DOCKER_BUILD_DEAD_RECORD_ERROR,
        &*UNEXPECTED_EOF_ERROR,
    ];
}

pub fn is_retryable(combined_output: &str) -> bool {
    RETRY_PATTERNS.iter().any(|m| m.is_match(combined_output))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_frontend_crash() {
        let output = "some preamble\nfailed to solve with frontend dockerfile.v0: \
            failed to solve with frontend gateway.v0: frontend grpc server closed unexpectedly\n";
        assert!(is_retryable(output));
    }

    #[test]
    fn recognizes_unexpected_eof() {
        assert!(is_retryable("stream closed\nunexpected EOF\n"));
    }

    #[test]
    fn does_not_retry_unrelated_failures() {
        assert!(!is_retryable("Dockerfile:12: syntax error near unexpected token\n"));
    }
}
