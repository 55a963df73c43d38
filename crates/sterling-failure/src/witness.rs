//! Failure construction and the append-only witness store (§6.4).

use crate::models::{CertifiedFailure, FailureReason};
use std::path::Path;
use sterling_ledger::canonicalize::{canonical_json_hash, prefix};

/// Computes a certified failure's content hash: `{failure_type, severity,
/// gate_id, context, required_artifact, search_keys (sorted),
/// artifact_ids_checked (sorted), recovery_options}`. `recorded_at` is
/// deliberately excluded - two failures raised for the same reason, in the
/// same gate, over the same context are the *same* witness regardless of
/// when they were observed.
pub fn failure_content_hash(failure: &CertifiedFailure) -> String {
    let mut search_keys = failure.search_keys.clone();
    search_keys.sort();
    let mut artifact_ids_checked = failure.artifact_ids_checked.clone();
    artifact_ids_checked.sort();

    let preimage = serde_json::json!({
        "failure_type": failure.failure_type,
        "severity": failure.severity,
        "gate_id": failure.gate_id,
        "context": failure.context,
        "required_artifact": failure.required_artifact,
        "search_keys": search_keys,
        "artifact_ids_checked": artifact_ids_checked,
        "recovery_options": failure.recovery_options,
    });
    canonical_json_hash(&preimage, prefix::FAILURE_CANON)
}

/// Builds a `CertifiedFailure` with the reason's default severity and
/// recovery options, computing `record_id` from the content hash.
pub struct FailureBuilder {
    failure: CertifiedFailure,
}

impl FailureBuilder {
    pub fn new(reason: FailureReason, gate_id: impl Into<String>, context: serde_json::Value, recorded_at: chrono::DateTime<chrono::Utc>) -> Self {
        FailureBuilder {
            failure: CertifiedFailure {
                record_id: String::new(),
                failure_type: reason,
                severity: reason.default_severity(),
                gate_id: gate_id.into(),
                context,
                recovery_options: reason.default_recovery_options(),
                required_artifact: None,
                search_keys: Vec::new(),
                artifact_ids_checked: Vec::new(),
                recorded_at,
            },
        }
    }

    pub fn severity(mut self, severity: crate::models::FailureSeverity) -> Self {
        self.failure.severity = severity;
        self
    }

    pub fn required_artifact(mut self, artifact: impl Into<String>) -> Self {
        self.failure.required_artifact = Some(artifact.into());
        self
    }

    pub fn search_keys(mut self, keys: Vec<String>) -> Self {
        self.failure.search_keys = keys;
        self
    }

    pub fn artifact_ids_checked(mut self, ids: Vec<String>) -> Self {
        self.failure.artifact_ids_checked = ids;
        self
    }

    pub fn build(mut self) -> CertifiedFailure {
        self.failure.record_id = failure_content_hash(&self.failure);
        self.failure
    }
}

const FAILURE_TREE: &str = "failures";

/// Append-only store of certified failures, deduplicated by `record_id` (the
/// same reason recorded twice for the same gate and context is one witness,
/// not two).
#[derive(Clone)]
pub struct WitnessStore {
    tree: sled::Tree,
}

impl WitnessStore {
    pub fn open<P: AsRef<Path>>(path: P) -> sled::Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { tree: db.open_tree(FAILURE_TREE)? })
    }

    pub fn temporary() -> sled::Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { tree: db.open_tree(FAILURE_TREE)? })
    }

    /// Records a failure. A failure with a `record_id` already present is
    /// left untouched - the first witness for a given failure is the
    /// authoritative one.
    pub fn record(&self, failure: &CertifiedFailure) -> sled::Result<()> {
        if self.tree.contains_key(failure.record_id.as_bytes())? {
            return Ok(());
        }
        let bytes = serde_json::to_vec(failure).expect("CertifiedFailure serialization cannot fail");
        self.tree.insert(failure.record_id.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn get(&self, record_id: &str) -> sled::Result<Option<CertifiedFailure>> {
        Ok(self
            .tree
            .get(record_id.as_bytes())?
            .map(|bytes| serde_json::from_slice(&bytes).expect("stored CertifiedFailure is well-formed")))
    }

    pub fn list(&self) -> sled::Result<Vec<CertifiedFailure>> {
        let mut out = Vec::new();
        for entry in self.tree.iter() {
            let (_, bytes) = entry?;
            out.push(serde_json::from_slice(&bytes).expect("stored CertifiedFailure is well-formed"));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CertifiedFailure {
        FailureBuilder::new(
            FailureReason::MissingEvidence,
            "assemble_packet",
            serde_json::json!({"schema_id": "sterling.person.v1"}),
            chrono::Utc::now(),
        )
        .search_keys(vec!["alice".to_string()])
        .build()
    }

    #[test]
    fn hash_excludes_recorded_at() {
        let a = FailureBuilder::new(FailureReason::ToolFailure, "g", serde_json::json!({}), chrono::DateTime::UNIX_EPOCH).build();
        let b = FailureBuilder::new(FailureReason::ToolFailure, "g", serde_json::json!({}), chrono::Utc::now()).build();
        assert_eq!(a.record_id, b.record_id);
    }

    #[test]
    fn record_is_idempotent() {
        let store = WitnessStore::temporary().unwrap();
        let failure = sample();
        store.record(&failure).unwrap();
        store.record(&failure).unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn default_recovery_options_are_reason_specific() {
        let failure = sample();
        assert!(failure.recovery_options.contains(&crate::models::RecoveryOption::AddEvidence));
    }
}
