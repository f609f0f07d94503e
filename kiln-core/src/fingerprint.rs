//! Deterministic digest over (project, params, group).
//!
//! The front end is the authority on fingerprints in production (spec.md
//! treats `Job::Fingerprint` as opaque and pre-computed); this module exists
//! so that tests and the `kilnd` demo CLI can derive one the same way,
//! following the same "hash a canonical string, hex-encode, truncate" shape
//! as `buildsys::builder::token`.

use sha2::{Digest, Sha512};
use std::collections::BTreeMap;

const FINGERPRINT_LEN: usize = 16;

/// Compute a fingerprint for `(project, params, group)`. `params` is a
/// `BTreeMap` so that insertion order never affects the digest, matching
/// spec.md's "keys unique, insertion order irrelevant" requirement.
pub fn fingerprint(project: &str, params: &BTreeMap<String, String>, group: &str) -> String {
    let mut digest = Sha512::new();
    digest.update(b"project=");
    digest.update(project.as_bytes());
    digest.update(b"\0group=");
    digest.update(group.as_bytes());
    for (k, v) in params {
        digest.update(b"\0param=");
        digest.update(k.as_bytes());
        digest.update(b"=");
        digest.update(v.as_bytes());
    }
    let hex = hex::encode(digest.finalize());
    hex[..FINGERPRINT_LEN].to_string()
}
