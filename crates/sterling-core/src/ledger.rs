//! # The `Ledger` facade
//!
//! Wires the schema registry, claim store, conflict engine and packet
//! assembler behind one `parking_lot::RwLock`: commits take the write lock
//! (single writer, per §5), queries and packet assembly take the read lock
//! (many concurrent readers). Conflicts are recomputed for every schema a
//! commit touched, immediately after that commit's write lock is held,
//! so a reader taking the lock right after a commit never observes a
//! claim store and conflict index that disagree.

use crate::config::SterlingConfig;
use crate::error::{CommitError, QueryError};
use crate::intent::RunIntent;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use sterling_conflict::ConflictEngine;
use sterling_failure::{CertifiedFailure, WitnessStore};
use sterling_ledger::{
    ClaimDelta, ClaimInstance, SchemaDef, SchemaRegistrationError, SemanticOp, Signature, Storage,
};
use sterling_packet::{DecisionPacket, TaskSpec};

struct Inner {
    ledger: sterling_ledger::Ledger,
    conflicts: ConflictEngine,
    witnesses: WitnessStore,
}

/// The single-writer/many-reader governance facade over one ledger instance.
pub struct Ledger {
    inner: RwLock<Inner>,
    config: SterlingConfig,
}

impl Ledger {
    pub fn open<P: AsRef<Path>>(path: P, config: SterlingConfig) -> Result<Self, CommitError> {
        let storage = Storage::open(&path)?;
        let witnesses = WitnessStore::open(path.as_ref().join("witnesses"))?;
        Self::from_parts(storage, witnesses, config)
    }

    pub fn temporary(config: SterlingConfig) -> Result<Self, CommitError> {
        let storage = Storage::temporary()?;
        let witnesses = WitnessStore::temporary()?;
        Self::from_parts(storage, witnesses, config)
    }

    fn from_parts(storage: Storage, witnesses: WitnessStore, config: SterlingConfig) -> Result<Self, CommitError> {
        let ledger = sterling_ledger::Ledger::open(storage)?;
        let inner = Inner { ledger, conflicts: ConflictEngine::new(), witnesses };
        Ok(Self { inner: RwLock::new(inner), config })
    }

    /// Registers a schema (C2). Takes the write lock: schema registration is
    /// serialized the same as a commit.
    pub fn register_schema(&self, schema: SchemaDef) -> Result<(), SchemaRegistrationError> {
        self.inner.write().ledger.schemas.register(schema)
    }

    pub fn migrate_schema(&self, schema_id: &str, new_def: SchemaDef, description: String) -> Result<(), SchemaRegistrationError> {
        self.inner.write().ledger.schemas.migrate(schema_id, new_def, description)
    }

    /// Commits a delta under the given intent (§6.1). Strictness is decided
    /// by `intent.is_strict()`; certified failures from a strict abort are
    /// the caller's responsibility to construct and record via
    /// `certify_failure` - the ledger itself only reports the error.
    pub fn commit(
        &self,
        operator_id: String,
        args: BTreeMap<String, serde_json::Value>,
        delta: ClaimDelta,
        support: Vec<String>,
        intent: RunIntent,
    ) -> Result<SemanticOp, CommitError> {
        let op_id = uuid::Uuid::new_v4().to_string();
        let timestamp = Utc::now();
        self.commit_at(operator_id, args, delta, support, intent, op_id, timestamp)
    }

    /// Same as `commit`, but with an explicit `op_id`/`timestamp` - used by
    /// replay, which must reproduce the original op's identity exactly.
    pub fn commit_at(
        &self,
        operator_id: String,
        args: BTreeMap<String, serde_json::Value>,
        delta: ClaimDelta,
        support: Vec<String>,
        intent: RunIntent,
        op_id: String,
        timestamp: DateTime<Utc>,
    ) -> Result<SemanticOp, CommitError> {
        let mut inner = self.inner.write();
        let touched = touched_schema_ids(&inner.ledger, &delta);
        let request = sterling_ledger::CommitRequest { operator_id, args, delta, support, strict: intent.is_strict() };
        let op = inner.ledger.commit(request, op_id, timestamp)?;

        if self.config.global.recompute_conflicts_on_commit {
            for schema_id in touched {
                if let Some(schema) = inner.ledger.schemas.get(&schema_id) {
                    let candidates = live_candidates(&inner.ledger, &schema_id);
                    inner.conflicts.recompute_schema(&schema, &candidates);
                }
            }
        }
        Ok(op)
    }

    pub fn lookup_by_signature(&self, signature: &str) -> Option<ClaimInstance> {
        self.inner.read().ledger.lookup_by_signature(signature)
    }

    pub fn list_by_schema(&self, schema_id: &str) -> Vec<ClaimInstance> {
        self.inner.read().ledger.list_by_schema(schema_id)
    }

    pub fn conflicts_touching(&self, signature: &str) -> Vec<sterling_conflict::ConflictSet> {
        self.inner.read().conflicts.conflicts_touching(signature)
    }

    pub fn op_log(&self) -> Result<Vec<SemanticOp>, CommitError> {
        Ok(self.inner.read().ledger.op_log()?)
    }

    /// Assembles a decision packet (C6) over every registered schema unless
    /// the task names specific ones. Falls back to `task.budget`, then this
    /// ledger's configured default budget. Under `task.strict`, a packet
    /// with no slices is certified as a `CertifiedFailure` (spec line 217)
    /// and recorded in the witness store rather than returned as-is.
    pub fn assemble_packet(&self, task: &TaskSpec, as_of: DateTime<Utc>) -> Result<DecisionPacket, QueryError> {
        let packet = {
            let inner = self.inner.read();
            let mut task = task.clone();
            if task.budget.is_none() {
                task.budget = Some(self.config.packet.default_budget);
            }

            let schema_ids: Vec<String> = if task.schema_ids.is_empty() {
                inner.ledger.schemas.list().iter().map(|s| s.schema_id.clone()).collect()
            } else {
                task.schema_ids.clone()
            };

            let mut candidates = Vec::new();
            for schema_id in &schema_ids {
                candidates.extend(live_candidates(&inner.ledger, schema_id));
            }

            let schema_kind_of = |schema_id: &str| inner.ledger.schemas.get(schema_id).map(|s| s.kind);
            let conflicts_for = |sig: &str| inner.conflicts.conflicts_touching(sig);
            sterling_packet::assemble(&task, &candidates, schema_kind_of, conflicts_for, as_of)?
        };

        if packet.task.strict && packet.slices.is_empty() {
            let failure = sterling_failure::FailureBuilder::new(
                sterling_failure::FailureReason::MissingEvidence,
                "assemble_packet",
                serde_json::json!({"schema_ids": packet.task.schema_ids}),
                as_of,
            )
            .search_keys(packet.task.schema_ids.clone())
            .build();
            self.certify_failure(&failure)?;
            return Err(QueryError::CertifiedFailure(failure));
        }

        Ok(packet)
    }

    /// Records a certified failure (C7). Takes the write lock since it
    /// appends to the witness store.
    pub fn certify_failure(&self, failure: &CertifiedFailure) -> Result<(), CommitError> {
        self.inner.write().witnesses.record(failure)?;
        Ok(())
    }

    pub fn witness(&self, record_id: &str) -> Result<Option<CertifiedFailure>, CommitError> {
        Ok(self.inner.read().witnesses.get(record_id)?)
    }

    pub fn list_witnesses(&self) -> Result<Vec<CertifiedFailure>, CommitError> {
        Ok(self.inner.read().witnesses.list()?)
    }
}

fn live_candidates(ledger: &sterling_ledger::Ledger, schema_id: &str) -> Vec<(Signature, ClaimInstance)> {
    ledger
        .list_by_schema(schema_id)
        .into_iter()
        .filter_map(|claim| claim.canonical_signature.clone().map(|sig| (sig, claim)))
        .collect()
}

/// Every schema id a delta's adds/updates/merges/splits/deletes could affect.
/// Deletes are resolved back to a schema id through the (still-tombstoned)
/// claim row, since the row is never removed outright (I5).
fn touched_schema_ids(ledger: &sterling_ledger::Ledger, delta: &ClaimDelta) -> BTreeSet<String> {
    let mut schemas = BTreeSet::new();
    for claim in delta.adds.iter().chain(delta.updates.iter()) {
        schemas.insert(claim.schema_id.clone());
    }
    for merge in &delta.merges {
        schemas.insert(merge.merged_claim.schema_id.clone());
        for source in &merge.sources {
            if let Some(row) = ledger.claims.get(source) {
                schemas.insert(row.claim.schema_id.clone());
            }
        }
    }
    for split in &delta.splits {
        if let Some(row) = ledger.claims.get(&split.source) {
            schemas.insert(row.claim.schema_id.clone());
        }
        for claim in &split.split_claims {
            schemas.insert(claim.schema_id.clone());
        }
    }
    for signature in &delta.deletes {
        if let Some(row) = ledger.claims.get(signature) {
            schemas.insert(row.claim.schema_id.clone());
        }
    }
    schemas
}

#[cfg(test)]
mod tests {
    use super::*;
    use sterling_ledger::*;

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

    fn person(name: &str, polarity: Polarity) -> ClaimInstance {
        let mut slots = BTreeMap::new();
        slots.insert("name".to_string(), SlotValue::One(name.to_string()));
        ClaimInstance {
            schema_id: "sterling.person.v1".to_string(),
            slots,
            epistemic_status: EpistemicStatus::Asserted,
            qualifiers: BTreeMap::new(),
            polarity,
            support_set: vec!["e1".to_string()],
            derivation_op_id: None,
            canonical_signature: None,
            temporal_scope: None,
            modal_scope: ModalScope::ACTUAL,
        }
    }

    #[test]
    fn commit_recomputes_conflicts_for_touched_schema() {
        let ledger = Ledger::temporary(SterlingConfig::default()).unwrap();
        ledger.register_schema(person_schema()).unwrap();

        let delta = ClaimDelta { adds: vec![person("Alice", Polarity::Pos), person("Alice", Polarity::Neg)], ..Default::default() };
        ledger.commit("test.op".to_string(), BTreeMap::new(), delta, vec![], RunIntent::Dev).unwrap();

        let claims = ledger.list_by_schema("sterling.person.v1");
        assert_eq!(claims.len(), 2);
        let sig = claims[0].canonical_signature.clone().unwrap();
        assert!(!ledger.conflicts_touching(&sig).is_empty());
    }

    #[test]
    fn assemble_packet_returns_registered_claims() {
        let ledger = Ledger::temporary(SterlingConfig::default()).unwrap();
        ledger.register_schema(person_schema()).unwrap();
        let delta = ClaimDelta { adds: vec![person("Alice", Polarity::Pos)], ..Default::default() };
        ledger.commit("test.op".to_string(), BTreeMap::new(), delta, vec![], RunIntent::Dev).unwrap();

        let task = TaskSpec { schema_ids: vec![], allow_meta: false, budget: None, time_window: None, strict: false };
        let packet = ledger.assemble_packet(&task, Utc::now()).unwrap();
        assert_eq!(packet.slices.len(), 1);
    }
}
