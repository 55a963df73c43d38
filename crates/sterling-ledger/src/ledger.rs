//! # Ledger (C4): the append-only operator log
//!
//! Wraps the schema registry and claim store behind a single `commit`
//! entry point. A commit's delta is applied in the fixed phase order
//! Updates -> Deletes -> Merges -> Splits -> Adds (I7) regardless of the
//! order fields appear in the submitted `ClaimDelta`; this is what lets
//! an Add and a Delete targeting the same identity-key coexist in one op
//! without a race between them.
//!
//! Strict commits validate every entry in the delta before mutating
//! anything, so a rejection aborts with storage untouched. Permissive
//! commits validate each entry independently, skip the ones that fail,
//! and still commit and hash the op with a `skipped` list attached.

use crate::canonicalize::{canonical_json_hash, prefix};
use crate::claim::{claim_signature, ClaimStore};
use crate::models::{
    ClaimDelta, ClaimError, ClaimInstance, LedgerError, MergeDelta, SchemaDef, SemanticOp, Signature,
    SkippedEntry, SplitDelta,
};
use crate::schema::SchemaRegistry;
use crate::storage::Storage;
use std::collections::{BTreeMap, HashSet};

/// A proposed commit, before an `op_id`/`content_hash` have been assigned.
pub struct CommitRequest {
    pub operator_id: String,
    pub args: BTreeMap<String, serde_json::Value>,
    pub delta: ClaimDelta,
    pub support: Vec<String>,
    /// Strict aborts the whole op on any single rejection (§5 failure-closed
    /// rule); permissive skips offending entries and commits the remainder.
    pub strict: bool,
}

/// Facade over the schema registry and claim store: the append-only operator
/// log described in §4.4.
pub struct Ledger {
    pub schemas: SchemaRegistry,
    pub claims: ClaimStore,
    storage: Storage,
}

impl Ledger {
    pub fn open(storage: Storage) -> sled::Result<Self> {
        let schemas = SchemaRegistry::open(storage.clone())?;
        let claims = ClaimStore::open(storage.clone())?;
        Ok(Self { schemas, claims, storage })
    }

    pub fn lookup_by_signature(&self, signature: &str) -> Option<ClaimInstance> {
        self.claims.get(signature).filter(|r| !r.tombstoned).map(|r| r.claim)
    }

    pub fn list_by_schema(&self, schema_id: &str) -> Vec<ClaimInstance> {
        self.claims.list_by_schema(schema_id, false).into_iter().map(|r| r.claim).collect()
    }

    pub fn op_log(&self) -> sled::Result<Vec<SemanticOp>> {
        self.storage.list_ops()
    }

    /// Commits a delta. See the module doc for the fixed apply order and the
    /// strict/permissive distinction.
    pub fn commit(&self, request: CommitRequest, op_id: String, timestamp: chrono::DateTime<chrono::Utc>) -> Result<SemanticOp, LedgerError> {
        let strict = request.strict;
        let mut skipped = Vec::new();

        // Phase 0: pre-validate every entry. In strict mode nothing is applied
        // until this whole pass succeeds, so a single rejection leaves the
        // store untouched.
        let valid_updates = self.filter_valid(&request.delta.updates, strict, &mut skipped, |c| self.check_update(c))?;
        let valid_deletes = self.filter_valid(&request.delta.deletes, strict, &mut skipped, |s| self.check_signature_exists(s))?;
        let valid_merges = self.filter_valid(&request.delta.merges, strict, &mut skipped, |m| self.check_merge(m))?;
        let valid_splits = self.filter_valid(&request.delta.splits, strict, &mut skipped, |s| self.check_split(s))?;
        let valid_adds = self.filter_valid(&request.delta.adds, strict, &mut skipped, |c| self.check_add(c))?;

        // Phases 1-5, fixed order (I7).
        let mut update_sigs = Vec::new();
        for claim in valid_updates {
            let (new_sig, _old_sig) = self.apply_update(claim, &op_id)?;
            update_sigs.push(new_sig);
        }

        for sig in &valid_deletes {
            self.claims.delete(sig).map_err(LedgerError::from)?;
        }

        let mut merge_sigs = Vec::new();
        for merge in valid_merges {
            for source in &merge.sources {
                self.claims.delete(source).map_err(LedgerError::from)?;
            }
            let schema = self.schema_of(&merge.merged_claim)?;
            let ordered = ordered_slot_roles(&schema);
            let sig = claim_signature(&merge.merged_claim, &ordered);
            self.claims.add(merge.merged_claim.clone(), &op_id, sig.clone()).map_err(LedgerError::from)?;
            let mut sources_sorted = merge.sources.clone();
            sources_sorted.sort();
            merge_sigs.push((sources_sorted, sig));
        }

        let mut split_sigs = Vec::new();
        for split in valid_splits {
            self.claims.delete(&split.source).map_err(LedgerError::from)?;
            let mut sigs = Vec::new();
            for claim in &split.split_claims {
                let schema = self.schema_of(claim)?;
                let ordered = ordered_slot_roles(&schema);
                let sig = claim_signature(claim, &ordered);
                self.claims.add(claim.clone(), &op_id, sig.clone()).map_err(LedgerError::from)?;
                sigs.push(sig);
            }
            sigs.sort();
            split_sigs.push((split.source.clone(), sigs));
        }

        let mut add_sigs = Vec::new();
        for claim in valid_adds {
            let schema = self.schema_of(&claim)?;
            let ordered = ordered_slot_roles(&schema);
            let sig = claim_signature(&claim, &ordered);
            self.claims.add(claim, &op_id, sig.clone()).map_err(LedgerError::from)?;
            add_sigs.push(sig);
        }

        let mut deletes_sorted = valid_deletes;
        deletes_sorted.sort();
        update_sigs.sort();
        add_sigs.sort();
        merge_sigs.sort();
        split_sigs.sort();

        let content_hash = op_content_hash(
            &request.operator_id,
            &request.args,
            &add_sigs,
            &update_sigs,
            &deletes_sorted,
            &merge_sigs,
            &split_sigs,
        );

        let op = SemanticOp {
            op_id,
            operator_id: request.operator_id,
            args: request.args,
            delta: request.delta,
            timestamp,
            content_hash,
            support: request.support,
            skipped,
        };
        self.storage.append_op(&op)?;
        Ok(op)
    }

    fn schema_of(&self, claim: &ClaimInstance) -> Result<SchemaDef, LedgerError> {
        self.schemas
            .get(&claim.schema_id)
            .ok_or_else(|| LedgerError::Claim(ClaimError::UnknownSchema(claim.schema_id.clone())))
    }

    fn check_add(&self, claim: &ClaimInstance) -> Result<(), ClaimError> {
        self.schemas.validate_claim(claim)
    }

    fn check_update(&self, claim: &ClaimInstance) -> Result<(), ClaimError> {
        let target = claim
            .canonical_signature
            .as_ref()
            .ok_or(ClaimError::UnknownSchema("update is missing its target signature".to_string()))?;
        if self.claims.get(target).filter(|r| !r.tombstoned).is_none() {
            return Err(ClaimError::UnknownSchema(format!("no live claim at signature {target}")));
        }
        self.schemas.validate_claim(claim)
    }

    fn check_signature_exists(&self, signature: &str) -> Result<(), ClaimError> {
        if self.claims.get(signature).filter(|r| !r.tombstoned).is_none() {
            return Err(ClaimError::UnknownSchema(format!("no live claim at signature {signature}")));
        }
        Ok(())
    }

    fn check_merge(&self, merge: &MergeDelta) -> Result<(), ClaimError> {
        for source in &merge.sources {
            self.check_signature_exists(source)?;
        }
        self.schemas.validate_claim(&merge.merged_claim)
    }

    fn check_split(&self, split: &SplitDelta) -> Result<(), ClaimError> {
        self.check_signature_exists(&split.source)?;
        for claim in &split.split_claims {
            self.schemas.validate_claim(claim)?;
        }
        Ok(())
    }

    /// Applies an already-validated update. If the recomputed signature
    /// differs from the claim's declared target (its content changed), this
    /// is a delete-of-old plus add-of-new rather than a key-preserving
    /// replace — the resolution to the open question on update semantics.
    fn apply_update(&self, claim: ClaimInstance, op_id: &str) -> Result<(Signature, Signature), LedgerError> {
        let target = claim.canonical_signature.clone().expect("checked in check_update");
        let schema = self.schema_of(&claim)?;
        let ordered = ordered_slot_roles(&schema);
        let new_sig = claim_signature(&claim, &ordered);

        if new_sig == target {
            let mut updated = claim;
            updated.canonical_signature = Some(new_sig.clone());
            self.claims.replace_in_place(&target, updated)?;
        } else {
            self.claims.delete(&target)?;
            let mut updated = claim;
            updated.canonical_signature = Some(new_sig.clone());
            self.claims.add(updated, op_id, new_sig.clone())?;
        }
        Ok((new_sig, target))
    }

    fn filter_valid<T: Clone>(
        &self,
        items: &[T],
        strict: bool,
        skipped: &mut Vec<SkippedEntry>,
        check: impl Fn(&T) -> Result<(), ClaimError>,
    ) -> Result<Vec<T>, LedgerError> {
        let mut valid = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match check(item) {
                Ok(()) => valid.push(item.clone()),
                Err(e) => {
                    if strict {
                        return Err(LedgerError::StrictAbort(e.to_string()));
                    }
                    skipped.push(SkippedEntry { signature_or_index: index.to_string(), reason: e.to_string() });
                }
            }
        }
        Ok(valid)
    }
}

fn ordered_slot_roles(schema: &SchemaDef) -> HashSet<String> {
    schema.slots.iter().filter(|s| s.ordered).map(|s| s.role.clone()).collect()
}

/// Computes a `SemanticOp`'s content hash per §4.4: `{operator_id, args, delta}`
/// where `delta` holds the recomputed, sorted signature sets for every phase
/// rather than the raw submitted claims.
fn op_content_hash(
    operator_id: &str,
    args: &BTreeMap<String, serde_json::Value>,
    adds: &[Signature],
    updates: &[Signature],
    deletes: &[Signature],
    merges: &[(Vec<Signature>, Signature)],
    splits: &[(Signature, Vec<Signature>)],
) -> String {
    let preimage = serde_json::json!({
        "operator_id": operator_id,
        "args": args,
        "delta": {
            "adds": adds,
            "updates": updates,
            "deletes": deletes,
            "merges": merges,
            "splits": splits,
        },
    });
    canonical_json_hash(&preimage, prefix::OP_CANON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use std::collections::BTreeMap as Map;

    fn person_schema() -> SchemaDef {
        SchemaDef {
            schema_id: "sterling.person.v1".to_string(),
            kind: SchemaKind::ENTITY,
            slots: vec![SlotDef {
                role: "name".to_string(),
                slot_type: SlotType::LiteralID,
                cardinality: Cardinality::One,
                ordered: true,
                resolver: None,
                canonicalizer: None,
                indexable: true,
            }],
            constraints: vec![],
            evidence_policy: EvidencePolicy { min_evidence: 1, allowed_modalities: vec!["text".into()] },
            index_policy: IndexPolicy { primary_slots: vec!["name".to_string()] },
            migration_policy: None,
            external_anchors: vec![],
            description: None,
        }
    }

    fn person(name: &str) -> ClaimInstance {
        let mut slots = Map::new();
        slots.insert("name".to_string(), SlotValue::One(name.to_string()));
        ClaimInstance {
            schema_id: "sterling.person.v1".to_string(),
            slots,
            epistemic_status: EpistemicStatus::Asserted,
            qualifiers: Map::new(),
            polarity: Polarity::Pos,
            support_set: vec!["e1".to_string()],
            derivation_op_id: None,
            canonical_signature: None,
            temporal_scope: None,
            modal_scope: ModalScope::ACTUAL,
        }
    }

    fn ledger() -> Ledger {
        let storage = Storage::temporary().unwrap();
        let ledger = Ledger::open(storage).unwrap();
        ledger.schemas.register(person_schema()).unwrap();
        ledger
    }

    fn request(delta: ClaimDelta, strict: bool) -> CommitRequest {
        CommitRequest {
            operator_id: "test.operator".to_string(),
            args: Map::new(),
            delta,
            support: vec!["e1".to_string()],
            strict,
        }
    }

    #[test]
    fn commit_add_persists_claim() {
        let ledger = ledger();
        let delta = ClaimDelta { adds: vec![person("Alice")], ..Default::default() };
        let op = ledger.commit(request(delta, true), "op1".to_string(), chrono::Utc::now()).unwrap();
        assert!(op.skipped.is_empty());
        assert_eq!(ledger.list_by_schema("sterling.person.v1").len(), 1);
    }

    #[test]
    fn duplicate_add_dedups_across_two_commits() {
        let ledger = ledger();
        let delta1 = ClaimDelta { adds: vec![person("Alice")], ..Default::default() };
        ledger.commit(request(delta1, true), "op1".to_string(), chrono::Utc::now()).unwrap();
        let delta2 = ClaimDelta { adds: vec![person("Alice")], ..Default::default() };
        ledger.commit(request(delta2, true), "op2".to_string(), chrono::Utc::now()).unwrap();
        assert_eq!(ledger.list_by_schema("sterling.person.v1").len(), 1);
    }

    #[test]
    fn strict_commit_aborts_on_unknown_schema() {
        let ledger = ledger();
        let mut bad = person("Alice");
        bad.schema_id = "not.registered".to_string();
        let delta = ClaimDelta { adds: vec![bad], ..Default::default() };
        let err = ledger.commit(request(delta, true), "op1".to_string(), chrono::Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::StrictAbort(_)));
        assert_eq!(ledger.list_by_schema("sterling.person.v1").len(), 0);
    }

    #[test]
    fn permissive_commit_skips_bad_entries_and_keeps_good_ones() {
        let ledger = ledger();
        let mut bad = person("Bob");
        bad.schema_id = "not.registered".to_string();
        let delta = ClaimDelta { adds: vec![person("Alice"), bad], ..Default::default() };
        let op = ledger.commit(request(delta, false), "op1".to_string(), chrono::Utc::now()).unwrap();
        assert_eq!(op.skipped.len(), 1);
        assert_eq!(ledger.list_by_schema("sterling.person.v1").len(), 1);
    }

    #[test]
    fn update_with_changed_content_replaces_signature() {
        let ledger = ledger();
        let add_delta = ClaimDelta { adds: vec![person("Alice")], ..Default::default() };
        ledger.commit(request(add_delta, true), "op1".to_string(), chrono::Utc::now()).unwrap();

        let old_sig = ledger.list_by_schema("sterling.person.v1")[0].canonical_signature.clone().unwrap();
        let mut updated = person("Alicia");
        updated.canonical_signature = Some(old_sig.clone());
        let update_delta = ClaimDelta { updates: vec![updated], ..Default::default() };
        ledger.commit(request(update_delta, true), "op2".to_string(), chrono::Utc::now()).unwrap();

        assert!(ledger.lookup_by_signature(&old_sig).is_none());
        let claims = ledger.list_by_schema("sterling.person.v1");
        assert_eq!(claims.len(), 1);
    }

    #[test]
    fn op_content_hash_is_stable_across_rebuild() {
        let args = Map::new();
        let a = op_content_hash("op", &args, &["sig1".to_string()], &[], &[], &[], &[]);
        let b = op_content_hash("op", &args, &["sig1".to_string()], &[], &[], &[], &[]);
        assert_eq!(a, b);
    }
}
