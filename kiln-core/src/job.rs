use std::collections::BTreeMap;

/// A build job, identified by a fingerprint computed (by the front end, or
/// by [`crate::fingerprint::fingerprint`] for callers that want the same
/// derivation) over the project, parameters, and group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    pub project: String,
    pub params: BTreeMap<String, String>,
    pub group: String,
    pub fingerprint: String,
}

impl Job {
    pub fn new(
        project: impl Into<String>,
        params: BTreeMap<String, String>,
        group: impl Into<String>,
        fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            params,
            group: group.into(),
            fingerprint: fingerprint.into(),
        }
    }

    pub fn is_grouped(&self) -> bool {
        !self.group.is_empty()
    }
}
