//! # Claim signatures and the claim store (C3)
//!
//! A claim's identity is its canonical signature, recomputed on every commit
//! and never trusted when supplied by a caller (I1). The claim store
//! deduplicates by signature (I6) and tombstones on delete rather than
//! removing rows (I5).

use crate::canonicalize::{canonical_json_hash, prefix};
use crate::models::{ClaimError, ClaimInstance, ClaimRow, Signature, SlotValue};
use crate::storage::Storage;
use std::collections::HashMap;
use std::sync::Mutex;

/// Computes the canonical signature preimage per §4.3:
/// `{schema_id, slots, epistemic_status, polarity, qualifiers, modal_scope, temporal_scope}`.
/// Excludes `support_set`, `derivation_op_id`, `canonical_signature`.
///
/// Unordered multi-valued slots are sorted lexicographically on their canonical
/// string form before hashing (per the open question in §9, resolved in
/// `DESIGN.md`); ordered slots preserve their given order.
pub fn claim_signature(claim: &ClaimInstance, ordered_slots: &std::collections::HashSet<String>) -> String {
    let mut slots = serde_json::Map::new();
    for (role, value) in &claim.slots {
        let canonical_value = match value {
            SlotValue::One(v) => serde_json::Value::String(v.clone()),
            SlotValue::Many(values) => {
                let mut values = values.clone();
                if !ordered_slots.contains(role) {
                    values.sort();
                }
                serde_json::Value::Array(values.into_iter().map(serde_json::Value::String).collect())
            }
        };
        slots.insert(role.clone(), canonical_value);
    }

    let preimage = serde_json::json!({
        "schema_id": claim.schema_id,
        "slots": slots,
        "epistemic_status": claim.epistemic_status,
        "polarity": claim.polarity,
        "qualifiers": claim.qualifiers,
        "modal_scope": claim.modal_scope,
        "temporal_scope": claim.temporal_scope,
    });

    canonical_json_hash(&preimage, prefix::CLAIM_SIG)
}

/// In-memory index over the persisted claim store: signature -> row. Mirrors
/// the storage tree so reads don't round-trip through Sled on the hot path;
/// rebuilt from storage on open, same as the schema registry's index.
pub struct ClaimStore {
    storage: Storage,
    rows: Mutex<HashMap<Signature, ClaimRow>>,
}

impl ClaimStore {
    pub fn open(storage: Storage) -> sled::Result<Self> {
        let mut rows = HashMap::new();
        for row in storage.list_claims()? {
            rows.insert(row.signature.clone(), row);
        }
        Ok(Self { storage, rows: Mutex::new(rows) })
    }

    pub fn get(&self, signature: &str) -> Option<ClaimRow> {
        self.rows.lock().expect("claim store lock poisoned").get(signature).cloned()
    }

    pub fn list_by_schema(&self, schema_id: &str, include_tombstoned: bool) -> Vec<ClaimRow> {
        self.rows
            .lock()
            .expect("claim store lock poisoned")
            .values()
            .filter(|r| r.claim.schema_id == schema_id && (include_tombstoned || !r.tombstoned))
            .cloned()
            .collect()
    }

    pub fn list_all(&self, include_tombstoned: bool) -> Vec<ClaimRow> {
        self.rows
            .lock()
            .expect("claim store lock poisoned")
            .values()
            .filter(|r| include_tombstoned || !r.tombstoned)
            .cloned()
            .collect()
    }

    /// Adds a claim. If the signature already exists, unions support sets
    /// (first-seen order, then appended) and writes no new row (I6). Returns
    /// the signature either way.
    pub fn add(&self, claim: ClaimInstance, op_id: &str, signature: Signature) -> Result<Signature, ClaimError> {
        let mut rows = self.rows.lock().expect("claim store lock poisoned");
        match rows.get_mut(&signature) {
            Some(existing) if !existing.tombstoned => {
                for evidence in &claim.support_set {
                    if !existing.claim.support_set.contains(evidence) {
                        existing.claim.support_set.push(evidence.clone());
                    }
                }
                self.storage.store_claim(existing)?;
                Ok(signature)
            }
            _ => {
                let mut claim = claim;
                claim.canonical_signature = Some(signature.clone());
                let row = ClaimRow {
                    signature: signature.clone(),
                    claim,
                    tombstoned: false,
                    created_by_op_id: op_id.to_string(),
                };
                self.storage.store_claim(&row)?;
                rows.insert(signature.clone(), row);
                Ok(signature)
            }
        }
    }

    /// Replaces a row's slots in place, preserving its signature key (the
    /// "preserve signature" branch of an Update that did not change semantic
    /// content). Callers detect a signature change themselves and route
    /// through delete-then-add instead (see `DESIGN.md`'s Open Question
    /// resolution and `ledger::apply_update`).
    pub fn replace_in_place(&self, signature: &str, claim: ClaimInstance) -> Result<(), ClaimError> {
        let mut rows = self.rows.lock().expect("claim store lock poisoned");
        let row = rows
            .get_mut(signature)
            .ok_or_else(|| ClaimError::UnknownSchema(format!("no row for signature {signature}")))?;
        row.claim = claim;
        self.storage.store_claim(row)?;
        Ok(())
    }

    /// Tombstones a row. Idempotent: deleting an already-tombstoned signature
    /// is a no-op, not a double tombstone.
    pub fn delete(&self, signature: &str) -> Result<(), ClaimError> {
        let mut rows = self.rows.lock().expect("claim store lock poisoned");
        if let Some(row) = rows.get_mut(signature) {
            if !row.tombstoned {
                row.tombstoned = true;
                self.storage.store_claim(row)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use std::collections::{BTreeMap, HashSet};

    fn claim(name: &str, support: &[&str]) -> ClaimInstance {
        let mut slots = BTreeMap::new();
        slots.insert("name".to_string(), SlotValue::One(name.to_string()));
        ClaimInstance {
            schema_id: "sterling.person.v1".to_string(),
            slots,
            epistemic_status: EpistemicStatus::Asserted,
            qualifiers: BTreeMap::new(),
            polarity: Polarity::Pos,
            support_set: support.iter().map(|s| s.to_string()).collect(),
            derivation_op_id: None,
            canonical_signature: None,
            temporal_scope: None,
            modal_scope: ModalScope::ACTUAL,
        }
    }

    #[test]
    fn signature_is_stable_across_identical_content() {
        let ordered = HashSet::new();
        let a = claim("Alice", &["e1"]);
        let b = claim("Alice", &["e2"]);
        assert_eq!(claim_signature(&a, &ordered), claim_signature(&b, &ordered));
    }

    #[test]
    fn signature_changes_with_semantic_content() {
        let ordered = HashSet::new();
        let a = claim("Alice", &["e1"]);
        let b = claim("Bob", &["e1"]);
        assert_ne!(claim_signature(&a, &ordered), claim_signature(&b, &ordered));
    }

    #[test]
    fn add_dedups_and_unions_support() {
        let store = ClaimStore::open(Storage::temporary().unwrap()).unwrap();
        let ordered = HashSet::new();
        let sig = claim_signature(&claim("Alice", &[]), &ordered);

        store.add(claim("Alice", &["e1"]), "op1", sig.clone()).unwrap();
        store.add(claim("Alice", &["e2"]), "op2", sig.clone()).unwrap();

        let row = store.get(&sig).unwrap();
        assert_eq!(row.claim.support_set, vec!["e1".to_string(), "e2".to_string()]);
    }

    #[test]
    fn delete_is_idempotent_tombstone() {
        let store = ClaimStore::open(Storage::temporary().unwrap()).unwrap();
        let ordered = HashSet::new();
        let sig = claim_signature(&claim("Alice", &[]), &ordered);
        store.add(claim("Alice", &["e1"]), "op1", sig.clone()).unwrap();

        store.delete(&sig).unwrap();
        store.delete(&sig).unwrap();

        let row = store.get(&sig).unwrap();
        assert!(row.tombstoned);
        assert_eq!(store.list_by_schema("sterling.person.v1", false).len(), 0);
        assert_eq!(store.list_by_schema("sterling.person.v1", true).len(), 1);
    }
}
