//! The in-memory set of currently-running jobs, keyed by fingerprint.
//!
//! `Add` is the sole admission gate (spec.md §4.3): only the caller whose
//! `add` returns `true` may create a pending build directory for that
//! fingerprint. The mutex is never held across I/O.

use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Default)]
pub struct JobQueue {
    inflight: Mutex<HashSet<String>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `fingerprint` if absent. Returns `true` iff this call inserted
    /// it, i.e. the caller is now the sole owner of that fingerprint's
    /// pending build.
    pub fn add(&self, fingerprint: &str) -> bool {
        self.inflight
            .lock()
            .expect("job queue mutex poisoned")
            .insert(fingerprint.to_string())
    }

    /// Remove `fingerprint`. No-op if absent.
    pub fn delete(&self, fingerprint: &str) {
        self.inflight
            .lock()
            .expect("job queue mutex poisoned")
            .remove(fingerprint);
    }

    pub fn exists(&self, fingerprint: &str) -> bool {
        self.inflight
            .lock()
            .expect("job queue mutex poisoned")
            .contains(fingerprint)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn add_is_sole_admission_gate() {
        let queue = JobQueue::new();
        assert!(queue.add("fp1"));
        assert!(!queue.add("fp1"));
        assert!(queue.exists("fp1"));
    }

    #[test]
    fn delete_is_noop_if_absent() {
        let queue = JobQueue::new();
        queue.delete("fp1");
        assert!(!queue.exists("fp1"));
    }

    #[test]
    fn independent_fingerprints_are_independent() {
        let queue = JobQueue::new();
        assert!(queue.add("fp1"));
        assert!(queue.add("fp2"));
        queue.delete("fp1");
        assert!(!queue.exists("fp1"));
        assert!(queue.exists("fp2"));
    }
}
