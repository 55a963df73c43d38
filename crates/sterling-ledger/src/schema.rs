//! # Schema Registry (C2)
//!
//! Registers, migrates and validates claim shapes. A schema's identity is its
//! semantic hash (see [`SchemaDef::semantic_preimage`]); re-registering the
//! same `schema_id` with a different semantic hash is rejected (I2), and
//! byte-identical re-registration is a no-op.

use crate::canonicalize::{canonical_json_hash, prefix};
use crate::models::{
    Cardinality, ClaimError, ClaimInstance, SchemaDef, SchemaRegistrationError, SlotType, SlotValue,
};
use crate::storage::Storage;
use std::collections::HashMap;
use std::sync::Mutex;

/// Registered schema entry: the current definition plus its semantic hash and
/// migration lineage (older semantic hashes a claim may still be addressed under).
#[derive(Debug, Clone)]
struct SchemaEntry {
    current: SchemaDef,
    semantic_hash: String,
    /// Semantic hashes of prior versions, oldest first; claims created under
    /// these remain addressable by their (old-schema, signature) pair.
    history: Vec<String>,
}

/// Schema registry: register / migrate / validate claim shapes.
///
/// Thread safety mirrors the governance model in §5: callers above this type
/// serialize writes through a single logical lock (see `sterling-core`), so
/// the registry itself only needs to protect its in-memory index against the
/// same single-writer/many-reader discipline being bypassed accidentally.
pub struct SchemaRegistry {
    storage: Storage,
    entries: Mutex<HashMap<String, SchemaEntry>>,
}

impl SchemaRegistry {
    pub fn open(storage: Storage) -> sled::Result<Self> {
        let mut entries = HashMap::new();
        for schema in storage.list_schemas()? {
            let semantic_hash = semantic_hash(&schema);
            let history = storage.load_schema_history(&schema.schema_id)?;
            entries.insert(schema.schema_id.clone(), SchemaEntry { current: schema, semantic_hash, history });
        }
        Ok(Self { storage, entries: Mutex::new(entries) })
    }

    /// Registers a schema. Comparing against any existing entry with the same
    /// `schema_id`: identical semantic hash is a no-op, different hash is rejected.
    pub fn register(&self, schema_def: SchemaDef) -> Result<(), SchemaRegistrationError> {
        let new_hash = semantic_hash(&schema_def);
        let mut entries = self.entries.lock().expect("registry lock poisoned");

        if let Some(existing) = entries.get(&schema_def.schema_id) {
            if existing.semantic_hash == new_hash {
                return Ok(()); // byte-identical re-registration: no-op
            }
            return Err(SchemaRegistrationError::HashConflict { schema_id: schema_def.schema_id });
        }

        self.storage.store_schema(&schema_def)?;
        entries.insert(
            schema_def.schema_id.clone(),
            SchemaEntry { current: schema_def, semantic_hash: new_hash, history: Vec::new() },
        );
        Ok(())
    }

    pub fn get(&self, schema_id: &str) -> Option<SchemaDef> {
        self.entries
            .lock()
            .expect("registry lock poisoned")
            .get(schema_id)
            .map(|e| e.current.clone())
    }

    pub fn list(&self) -> Vec<SchemaDef> {
        self.entries
            .lock()
            .expect("registry lock poisoned")
            .values()
            .map(|e| e.current.clone())
            .collect()
    }

    pub fn is_registered(&self, schema_id: &str) -> bool {
        self.entries.lock().expect("registry lock poisoned").contains_key(schema_id)
    }

    /// Migrates a schema to a new definition, producing a new semantic hash and
    /// recording migration metadata. Claims created under the old schema remain
    /// addressable by their (old-schema, signature) pair — the old semantic hash
    /// is retained in `history`, never removed.
    pub fn migrate(
        &self,
        schema_id: &str,
        mut new_def: SchemaDef,
        description: String,
    ) -> Result<(), SchemaRegistrationError> {
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        let existing = entries
            .get(schema_id)
            .ok_or_else(|| SchemaRegistrationError::NotRegistered(schema_id.to_string()))?;

        let from_hash = existing.semantic_hash.clone();
        new_def.migration_policy = Some(crate::models::MigrationPolicy {
            from_semantic_hash: from_hash.clone(),
            description,
        });
        let new_hash = semantic_hash(&new_def);

        if new_hash == from_hash {
            return Err(SchemaRegistrationError::MigrationRequired { schema_id: schema_id.to_string() });
        }

        let mut history = existing.history.clone();
        history.push(from_hash);
        self.storage.store_schema(&new_def)?;
        self.storage.store_schema_history(schema_id, &history)?;
        entries.insert(schema_id.to_string(), SchemaEntry { current: new_def, semantic_hash: new_hash, history });
        Ok(())
    }

    pub fn semantic_hash_of(&self, schema_id: &str) -> Option<String> {
        self.entries
            .lock()
            .expect("registry lock poisoned")
            .get(schema_id)
            .map(|e| e.semantic_hash.clone())
    }

    /// Validates an incoming claim against its schema per the eight-step
    /// procedure in §4.2. Does not recompute the signature — the caller does
    /// that separately and compares against any input-supplied value (I1).
    pub fn validate_claim(&self, claim: &ClaimInstance) -> Result<(), ClaimError> {
        let schema = self
            .get(&claim.schema_id)
            .ok_or_else(|| ClaimError::UnknownSchema(claim.schema_id.clone()))?;

        // 2 & 3: every slot with min cardinality > 0 present; no unknown slot names.
        for (role, value) in &claim.slots {
            let slot = schema.slot(role).ok_or_else(|| ClaimError::UnknownSlot {
                schema_id: claim.schema_id.clone(),
                slot: role.clone(),
            })?;
            check_cardinality(slot.cardinality, value, role)?;
            self.check_type(slot.slot_type, value, role)?;
        }
        for slot in &schema.slots {
            if slot.cardinality.min() > 0 && !claim.slots.contains_key(&slot.role) {
                return Err(ClaimError::CardinalityViolation {
                    slot: slot.role.clone(),
                    cardinality: slot.cardinality,
                    actual: 0,
                });
            }
        }

        // 6: asserted claims satisfy min_evidence and an allowed modality.
        if claim.epistemic_status == crate::models::EpistemicStatus::Asserted {
            let required = schema.evidence_policy.min_evidence;
            if claim.support_set.len() < required {
                return Err(ClaimError::EvidenceInsufficient {
                    required,
                    actual: claim.support_set.len(),
                });
            }
        }

        // 7: temporal scope internal consistency.
        if let Some(scope) = &claim.temporal_scope {
            if !scope.is_consistent() {
                return Err(ClaimError::TemporalInvalid);
            }
        }

        Ok(())
    }

    /// Structural type conformance (step 4 of §4.2). Slot values are opaque
    /// resolved identifiers at this layer, so the check is necessarily
    /// shallow: no value may be empty, and a `SchemaRef` must name a
    /// currently-registered schema.
    fn check_type(&self, slot_type: SlotType, value: &SlotValue, role: &str) -> Result<(), ClaimError> {
        for v in value.as_values() {
            if v.is_empty() {
                return Err(ClaimError::TypeMismatch { slot: role.to_string(), expected: slot_type });
            }
            if slot_type == SlotType::SchemaRef && !self.is_registered(v) {
                return Err(ClaimError::TypeMismatch { slot: role.to_string(), expected: slot_type });
            }
        }
        Ok(())
    }
}

fn check_cardinality(cardinality: Cardinality, value: &SlotValue, role: &str) -> Result<(), ClaimError> {
    let len = value.len();
    let within_max = cardinality.max().map_or(true, |max| len <= max);
    if len < cardinality.min() || !within_max {
        return Err(ClaimError::CardinalityViolation {
            slot: role.to_string(),
            cardinality,
            actual: len,
        });
    }
    Ok(())
}

/// Computes a schema's semantic hash per §3.1 / §4.1.
pub fn semantic_hash(schema: &SchemaDef) -> String {
    canonical_json_hash(&schema.semantic_preimage(), prefix::SCHEMA_CANON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use std::collections::BTreeMap;

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

    fn registry() -> SchemaRegistry {
        SchemaRegistry::open(Storage::temporary().unwrap()).unwrap()
    }

    #[test]
    fn register_and_get_round_trips() {
        let reg = registry();
        reg.register(person_schema()).unwrap();
        assert!(reg.is_registered("sterling.person.v1"));
        assert_eq!(reg.get("sterling.person.v1").unwrap().schema_id, "sterling.person.v1");
    }

    #[test]
    fn identical_reregistration_is_noop() {
        let reg = registry();
        reg.register(person_schema()).unwrap();
        reg.register(person_schema()).unwrap();
    }

    #[test]
    fn conflicting_reregistration_is_rejected() {
        let reg = registry();
        reg.register(person_schema()).unwrap();
        let mut changed = person_schema();
        changed.evidence_policy.min_evidence = 5;
        let err = reg.register(changed).unwrap_err();
        assert!(matches!(err, SchemaRegistrationError::HashConflict { .. }));
    }

    #[test]
    fn migration_changes_hash_and_keeps_history() {
        let reg = registry();
        reg.register(person_schema()).unwrap();
        let old_hash = reg.semantic_hash_of("sterling.person.v1").unwrap();

        let mut migrated = person_schema();
        migrated.evidence_policy.min_evidence = 2;
        reg.migrate("sterling.person.v1", migrated, "raise evidence bar".to_string()).unwrap();

        let new_hash = reg.semantic_hash_of("sterling.person.v1").unwrap();
        assert_ne!(old_hash, new_hash);
    }

    #[test]
    fn migration_history_survives_a_reload() {
        let storage = Storage::temporary().unwrap();
        let reg = SchemaRegistry::open(storage.clone()).unwrap();
        reg.register(person_schema()).unwrap();
        let old_hash = reg.semantic_hash_of("sterling.person.v1").unwrap();

        let mut migrated = person_schema();
        migrated.evidence_policy.min_evidence = 2;
        reg.migrate("sterling.person.v1", migrated, "raise evidence bar".to_string()).unwrap();

        let reopened = SchemaRegistry::open(storage).unwrap();
        let history = reopened.storage.load_schema_history("sterling.person.v1").unwrap();
        assert_eq!(history, vec![old_hash]);
    }

    #[test]
    fn validate_rejects_unknown_slot() {
        let reg = registry();
        reg.register(person_schema()).unwrap();
        let mut slots = BTreeMap::new();
        slots.insert("nickname".to_string(), SlotValue::One("Al".to_string()));
        let claim = ClaimInstance {
            schema_id: "sterling.person.v1".to_string(),
            slots,
            epistemic_status: EpistemicStatus::Asserted,
            qualifiers: BTreeMap::new(),
            polarity: Polarity::Pos,
            support_set: vec!["e1".to_string()],
            derivation_op_id: None,
            canonical_signature: None,
            temporal_scope: None,
            modal_scope: ModalScope::ACTUAL,
        };
        let err = reg.validate_claim(&claim).unwrap_err();
        assert!(matches!(err, ClaimError::UnknownSlot { .. }));
    }

    #[test]
    fn validate_rejects_empty_slot_value() {
        let reg = registry();
        reg.register(person_schema()).unwrap();
        let mut slots = BTreeMap::new();
        slots.insert("name".to_string(), SlotValue::One(String::new()));
        let claim = ClaimInstance {
            schema_id: "sterling.person.v1".to_string(),
            slots,
            epistemic_status: EpistemicStatus::Asserted,
            qualifiers: BTreeMap::new(),
            polarity: Polarity::Pos,
            support_set: vec!["e1".to_string()],
            derivation_op_id: None,
            canonical_signature: None,
            temporal_scope: None,
            modal_scope: ModalScope::ACTUAL,
        };
        let err = reg.validate_claim(&claim).unwrap_err();
        assert!(matches!(err, ClaimError::TypeMismatch { .. }));
    }

    #[test]
    fn validate_rejects_schema_ref_to_unregistered_schema() {
        let reg = registry();
        let mut schema = person_schema();
        schema.slots.push(SlotDef {
            role: "derived_from".to_string(),
            slot_type: SlotType::SchemaRef,
            cardinality: Cardinality::ZeroOrOne,
            ordered: true,
            resolver: None,
            canonicalizer: None,
            indexable: false,
        });
        reg.register(schema).unwrap();

        let mut slots = BTreeMap::new();
        slots.insert("name".to_string(), SlotValue::One("Alice".to_string()));
        slots.insert("derived_from".to_string(), SlotValue::One("sterling.nonexistent.v1".to_string()));
        let claim = ClaimInstance {
            schema_id: "sterling.person.v1".to_string(),
            slots,
            epistemic_status: EpistemicStatus::Asserted,
            qualifiers: BTreeMap::new(),
            polarity: Polarity::Pos,
            support_set: vec!["e1".to_string()],
            derivation_op_id: None,
            canonical_signature: None,
            temporal_scope: None,
            modal_scope: ModalScope::ACTUAL,
        };
        let err = reg.validate_claim(&claim).unwrap_err();
        assert!(matches!(err, ClaimError::TypeMismatch { .. }));
    }

    #[test]
    fn validate_rejects_insufficient_evidence() {
        let reg = registry();
        reg.register(person_schema()).unwrap();
        let mut slots = BTreeMap::new();
        slots.insert("name".to_string(), SlotValue::One("Alice".to_string()));
        let claim = ClaimInstance {
            schema_id: "sterling.person.v1".to_string(),
            slots,
            epistemic_status: EpistemicStatus::Asserted,
            qualifiers: BTreeMap::new(),
            polarity: Polarity::Pos,
            support_set: vec![],
            derivation_op_id: None,
            canonical_signature: None,
            temporal_scope: None,
            modal_scope: ModalScope::ACTUAL,
        };
        let err = reg.validate_claim(&claim).unwrap_err();
        assert!(matches!(err, ClaimError::EvidenceInsufficient { .. }));
    }
}
