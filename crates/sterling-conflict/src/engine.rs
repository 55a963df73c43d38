//! # Conflict Engine (C5)
//!
//! Groups live, conflict-eligible claims by identity key and raises a
//! `ConflictSet` whenever a group disagrees on polarity or overlaps in time.
//! Detection is deterministic and re-derivable from the claim store at any
//! point — the engine caches its last computation behind two indexes
//! (signature -> conflicts, identity key -> conflicts) so queries don't
//! rescan the whole store, but `recompute_schema` is the source of truth.

use crate::identity::{identity_key_roles, identity_key_values, is_conflict_eligible};
use crate::models::{ConflictReason, ConflictSet, DEFAULT_POLICY_ID};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use sterling_ledger::canonicalize::{canonical_json_hash, prefix};
use sterling_ledger::{ClaimInstance, Granularity, SchemaDef, Signature, TemporalScope};

fn eternal_scope() -> TemporalScope {
    TemporalScope { valid_from: None, valid_until: None, granularity: Granularity::Eternal }
}

fn conflict_content_hash(conflict: &ConflictSet) -> String {
    let preimage = serde_json::json!({
        "schema_id": conflict.schema_id,
        "policy_id": conflict.policy_id,
        "identity_key_roles": conflict.identity_key_roles,
        "identity_key_values": conflict.identity_key_values,
        "claim_signatures": conflict.claim_signatures,
        "reason": conflict.reason,
        "modal_scope": conflict.modal_scope,
    });
    canonical_json_hash(&preimage, prefix::CONFLICT_CANON)
}

/// Maintains the conflict indexes for one ledger instance.
#[derive(Default)]
pub struct ConflictEngine {
    conflicts: RwLock<BTreeMap<String, ConflictSet>>,
    by_signature: RwLock<BTreeMap<Signature, BTreeSet<String>>>,
    by_identity: RwLock<BTreeMap<String, BTreeSet<String>>>,
}

impl ConflictEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, conflict_id: &str) -> Option<ConflictSet> {
        self.conflicts.read().get(conflict_id).cloned()
    }

    /// All conflicts touching a given claim signature.
    pub fn conflicts_touching(&self, signature: &str) -> Vec<ConflictSet> {
        let conflicts = self.conflicts.read();
        self.by_signature
            .read()
            .get(signature)
            .into_iter()
            .flatten()
            .filter_map(|id| conflicts.get(id).cloned())
            .collect()
    }

    pub fn all(&self) -> Vec<ConflictSet> {
        self.conflicts.read().values().cloned().collect()
    }

    /// Recomputes every conflict for one schema from its current set of live
    /// claims, replacing whatever this engine previously knew about that
    /// schema. Claims that were deleted or updated out of eligibility since
    /// the last recompute simply don't reappear, which is how conflicts are
    /// retired — no separate "retire" bookkeeping needed.
    pub fn recompute_schema(
        &self,
        schema: &SchemaDef,
        live_claims: &[(Signature, ClaimInstance)],
    ) -> Vec<ConflictSet> {
        let roles = match identity_key_roles(schema) {
            Ok(roles) => roles,
            Err(_) => {
                self.clear_schema(&schema.schema_id);
                return Vec::new();
            }
        };

        let mut groups: BTreeMap<Vec<String>, Vec<(Signature, ClaimInstance)>> = BTreeMap::new();
        for (sig, claim) in live_claims {
            if !is_conflict_eligible(claim) {
                continue;
            }
            if let Some(values) = identity_key_values(&roles, claim) {
                groups.entry(values).or_default().push((sig.clone(), claim.clone()));
            }
        }

        let mut fresh = Vec::new();
        for (values, members) in groups {
            if members.len() < 2 {
                continue;
            }
            if let Some(c) = polarity_conflict(schema, &roles, &values, &members) {
                fresh.push(c);
            }
            if let Some(c) = temporal_conflict(schema, &roles, &values, &members) {
                fresh.push(c);
            }
        }

        self.replace_schema(&schema.schema_id, fresh.clone());
        fresh
    }

    fn clear_schema(&self, schema_id: &str) {
        self.replace_schema(schema_id, Vec::new());
    }

    fn replace_schema(&self, schema_id: &str, fresh: Vec<ConflictSet>) {
        let mut conflicts = self.conflicts.write();
        let mut by_signature = self.by_signature.write();
        let mut by_identity = self.by_identity.write();

        let stale: Vec<String> = conflicts
            .iter()
            .filter(|(_, c)| c.schema_id == schema_id)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            conflicts.remove(id);
        }
        for set in by_signature.values_mut() {
            for id in &stale {
                set.remove(id);
            }
        }
        for set in by_identity.values_mut() {
            for id in &stale {
                set.remove(id);
            }
        }

        for conflict in fresh {
            let id = conflict.conflict_id.clone();
            for sig in &conflict.claim_signatures {
                by_signature.entry(sig.clone()).or_default().insert(id.clone());
            }
            let identity_key = conflict.identity_key_values.join("|");
            by_identity.entry(identity_key).or_default().insert(id.clone());
            conflicts.insert(id, conflict);
        }
    }
}

fn polarity_conflict(
    schema: &SchemaDef,
    roles: &[String],
    values: &[String],
    members: &[(Signature, ClaimInstance)],
) -> Option<ConflictSet> {
    let has_pos = members.iter().any(|(_, c)| c.polarity == sterling_ledger::Polarity::Pos);
    let has_neg = members.iter().any(|(_, c)| c.polarity == sterling_ledger::Polarity::Neg);
    if !(has_pos && has_neg) {
        return None;
    }
    let mut sigs: Vec<Signature> = members.iter().map(|(s, _)| s.clone()).collect();
    sigs.sort();
    sigs.dedup();
    Some(build_conflict(schema, roles, values, sigs, ConflictReason::PolarityMismatch))
}

fn temporal_conflict(
    schema: &SchemaDef,
    roles: &[String],
    values: &[String],
    members: &[(Signature, ClaimInstance)],
) -> Option<ConflictSet> {
    let mut overlapping: BTreeSet<Signature> = BTreeSet::new();
    for i in 0..members.len() {
        for j in (i + 1)..members.len() {
            let (sig_a, claim_a) = &members[i];
            let (sig_b, claim_b) = &members[j];
            let scope_a = claim_a.temporal_scope.clone().unwrap_or_else(eternal_scope);
            let scope_b = claim_b.temporal_scope.clone().unwrap_or_else(eternal_scope);
            if scope_a.overlaps(&scope_b) {
                overlapping.insert(sig_a.clone());
                overlapping.insert(sig_b.clone());
            }
        }
    }
    if overlapping.len() < 2 {
        return None;
    }
    let sigs: Vec<Signature> = overlapping.into_iter().collect();
    Some(build_conflict(schema, roles, values, sigs, ConflictReason::TemporalOverlap))
}

fn build_conflict(
    schema: &SchemaDef,
    roles: &[String],
    values: &[String],
    claim_signatures: Vec<Signature>,
    reason: ConflictReason,
) -> ConflictSet {
    let mut conflict = ConflictSet {
        conflict_id: String::new(),
        schema_id: schema.schema_id.clone(),
        policy_id: DEFAULT_POLICY_ID.to_string(),
        identity_key_roles: roles.to_vec(),
        identity_key_values: values.to_vec(),
        claim_signatures,
        reason,
        modal_scope: sterling_ledger::ModalScope::ACTUAL,
    };
    conflict.conflict_id = conflict_content_hash(&conflict);
    conflict
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;
    use sterling_ledger::*;

    fn schema() -> SchemaDef {
        SchemaDef {
            schema_id: "sterling.location.v1".to_string(),
            kind: SchemaKind::STATE,
            slots: vec![
                SlotDef {
                    role: "entity".to_string(),
                    slot_type: SlotType::EntityID,
                    cardinality: Cardinality::One,
                    ordered: true,
                    resolver: None,
                    canonicalizer: None,
                    indexable: true,
                },
                SlotDef {
                    role: "place".to_string(),
                    slot_type: SlotType::ConceptID,
                    cardinality: Cardinality::One,
                    ordered: true,
                    resolver: None,
                    canonicalizer: None,
                    indexable: true,
                },
            ],
            constraints: vec![],
            evidence_policy: EvidencePolicy { min_evidence: 1, allowed_modalities: vec!["text".into()] },
            index_policy: IndexPolicy { primary_slots: vec!["entity".to_string()] },
            migration_policy: None,
            external_anchors: vec![],
            description: None,
        }
    }

    fn claim(place: &str, polarity: Polarity, scope: Option<TemporalScope>) -> ClaimInstance {
        let mut slots = Map::new();
        slots.insert("entity".to_string(), SlotValue::One("alice".to_string()));
        slots.insert("place".to_string(), SlotValue::One(place.to_string()));
        ClaimInstance {
            schema_id: "sterling.location.v1".to_string(),
            slots,
            epistemic_status: EpistemicStatus::Asserted,
            qualifiers: Map::new(),
            polarity,
            support_set: vec!["e1".to_string()],
            derivation_op_id: None,
            canonical_signature: None,
            temporal_scope: scope,
            modal_scope: ModalScope::ACTUAL,
        }
    }

    #[test]
    fn detects_polarity_mismatch() {
        let schema = schema();
        let engine = ConflictEngine::new();
        let members = vec![
            ("sig1".to_string(), claim("paris", Polarity::Pos, None)),
            ("sig2".to_string(), claim("paris", Polarity::Neg, None)),
        ];
        let conflicts = engine.recompute_schema(&schema, &members);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].reason, ConflictReason::PolarityMismatch);
    }

    #[test]
    fn detects_temporal_overlap() {
        let schema = schema();
        let engine = ConflictEngine::new();
        let overlapping = Some(TemporalScope {
            valid_from: Some("2024-01-01".to_string()),
            valid_until: Some("2024-06-01".to_string()),
            granularity: Granularity::Day,
        });
        let also_overlapping = Some(TemporalScope {
            valid_from: Some("2024-03-01".to_string()),
            valid_until: Some("2024-09-01".to_string()),
            granularity: Granularity::Day,
        });
        let members = vec![
            ("sig1".to_string(), claim("paris", Polarity::Pos, overlapping)),
            ("sig2".to_string(), claim("berlin", Polarity::Pos, also_overlapping)),
        ];
        let conflicts = engine.recompute_schema(&schema, &members);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].reason, ConflictReason::TemporalOverlap);
    }

    #[test]
    fn unk_polarity_never_conflicts() {
        let schema = schema();
        let engine = ConflictEngine::new();
        let members = vec![
            ("sig1".to_string(), claim("paris", Polarity::Unk, None)),
            ("sig2".to_string(), claim("paris", Polarity::Neg, None)),
        ];
        let conflicts = engine.recompute_schema(&schema, &members);
        assert!(conflicts.is_empty());
    }

    #[test]
    fn recompute_retires_conflicts_no_longer_present() {
        let schema = schema();
        let engine = ConflictEngine::new();
        let members = vec![
            ("sig1".to_string(), claim("paris", Polarity::Pos, None)),
            ("sig2".to_string(), claim("paris", Polarity::Neg, None)),
        ];
        engine.recompute_schema(&schema, &members);
        assert!(!engine.conflicts_touching("sig1").is_empty());

        engine.recompute_schema(&schema, &[members[0].clone()]);
        assert!(engine.conflicts_touching("sig1").is_empty());
        assert!(engine.all().is_empty());
    }
}
