//! Core data model: slots, schemas, claims, temporal scopes and operator deltas.
//!
//! Types here mirror §3 of the ledger specification directly. Each type's doc
//! comment states which fields are hash-critical (the "semantic core") versus
//! which are metadata excluded from any content hash.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A SHA-256 digest. Kept as raw bytes for any caller that wants binary equality;
/// hashes that identify artifacts externally are hex strings (see `canonicalize`).
pub const HASH_SIZE: usize = 32;
pub type Hash = [u8; HASH_SIZE];

/// A recomputed, content-addressed signature. Never trusted when supplied by a
/// caller — see invariant I1.
pub type Signature = String;

/// The type a slot's value resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SlotType {
    EntityID,
    ConceptID,
    LiteralID,
    SchemaRef,
}

/// Cardinality bound on a slot's value set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Cardinality {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "0..1")]
    ZeroOrOne,
    #[serde(rename = "1..*")]
    OneOrMore,
    #[serde(rename = "0..*")]
    ZeroOrMore,
}

impl Cardinality {
    pub fn min(self) -> usize {
        match self {
            Cardinality::One | Cardinality::OneOrMore => 1,
            Cardinality::ZeroOrOne | Cardinality::ZeroOrMore => 0,
        }
    }

    pub fn max(self) -> Option<usize> {
        match self {
            Cardinality::One => Some(1),
            Cardinality::ZeroOrOne => Some(1),
            Cardinality::OneOrMore | Cardinality::ZeroOrMore => None,
        }
    }
}

/// Schema role: a single slot definition.
///
/// Semantic core (hash-critical): `{role, type, cardinality, ordered}`.
/// `resolver`, `canonicalizer` and `indexable` are metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotDef {
    pub role: String,
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    pub cardinality: Cardinality,
    pub ordered: bool,
    #[serde(default)]
    pub resolver: Option<String>,
    #[serde(default)]
    pub canonicalizer: Option<String>,
    #[serde(default)]
    pub indexable: bool,
}

impl SlotDef {
    /// The hash-critical subset of this slot, used when computing a schema's
    /// semantic hash.
    pub fn semantic_core(&self) -> serde_json::Value {
        serde_json::json!({
            "role": self.role,
            "type": self.slot_type,
            "cardinality": self.cardinality,
            "ordered": self.ordered,
        })
    }
}

/// Schema kind. `META` schemas are excluded from decision packets by default (I9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SchemaKind {
    ENTITY,
    RELATION,
    EVENT,
    STATE,
    GOAL,
    CONSTRAINT,
    META,
}

/// Minimum evidence required for an asserted claim, and which modalities count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidencePolicy {
    pub min_evidence: usize,
    pub allowed_modalities: Vec<String>,
}

/// Which slots are indexable primary slots for identity-key derivation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexPolicy {
    pub primary_slots: Vec<String>,
}

/// Migration metadata recorded when a schema is migrated to a new semantic hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationPolicy {
    pub from_semantic_hash: String,
    pub description: String,
}

/// Schema definition: a registered claim shape.
///
/// Semantic hash over `{schema_id, kind, slots sorted by role, constraints sorted,
/// evidence_policy, migration_policy}`. Excludes `index_policy`, `description`,
/// `external_anchors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDef {
    pub schema_id: String,
    pub kind: SchemaKind,
    pub slots: Vec<SlotDef>,
    #[serde(default)]
    pub constraints: Vec<String>,
    pub evidence_policy: EvidencePolicy,
    #[serde(default)]
    pub index_policy: IndexPolicy,
    #[serde(default)]
    pub migration_policy: Option<MigrationPolicy>,
    #[serde(default)]
    pub external_anchors: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl SchemaDef {
    /// Builds the ordered preimage used to compute this schema's semantic hash.
    pub fn semantic_preimage(&self) -> serde_json::Value {
        let mut slots_sorted = self.slots.clone();
        slots_sorted.sort_by(|a, b| a.role.cmp(&b.role));
        let mut constraints_sorted = self.constraints.clone();
        constraints_sorted.sort();

        serde_json::json!({
            "schema_id": self.schema_id,
            "kind": self.kind,
            "slots": slots_sorted.iter().map(SlotDef::semantic_core).collect::<Vec<_>>(),
            "constraints": constraints_sorted,
            "evidence_policy": self.evidence_policy,
            "migration_policy": self.migration_policy,
        })
    }

    pub fn slot(&self, role: &str) -> Option<&SlotDef> {
        self.slots.iter().find(|s| s.role == role)
    }
}

/// Epistemic status of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpistemicStatus {
    Asserted,
    Hypothesis,
}

/// Truth polarity of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Pos,
    Neg,
    Unk,
}

/// World context of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModalScope {
    ACTUAL,
    HYPOTHETICAL,
    COUNTERFACTUAL,
}

/// Granularity of a temporal scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Instant,
    Day,
    Epoch,
    Eternal,
}

/// An unbounded start sorts before any ISO-8601 string; an unbounded end sorts after.
const UNBOUNDED_START: &str = "";
const UNBOUNDED_END: &str = "~";

/// `valid_from` / `valid_until`, ISO-8601 or unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalScope {
    /// `None` means unbounded start.
    pub valid_from: Option<String>,
    /// `None` means unbounded end.
    pub valid_until: Option<String>,
    pub granularity: Granularity,
}

impl TemporalScope {
    fn start_key(&self) -> &str {
        self.valid_from.as_deref().unwrap_or(UNBOUNDED_START)
    }

    fn end_key(&self) -> &str {
        self.valid_until.as_deref().unwrap_or(UNBOUNDED_END)
    }

    /// Internal consistency: start ≤ end under the unbounded sort convention.
    pub fn is_consistent(&self) -> bool {
        self.start_key() <= self.end_key()
    }

    /// Two scopes overlap iff `self_start ≤ other_end ∧ other_start ≤ self_end`.
    pub fn overlaps(&self, other: &TemporalScope) -> bool {
        self.start_key() <= other.end_key() && other.start_key() <= self.end_key()
    }
}

/// A single committed semantic claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimInstance {
    pub schema_id: String,
    pub slots: BTreeMap<String, SlotValue>,
    pub epistemic_status: EpistemicStatus,
    #[serde(default)]
    pub qualifiers: BTreeMap<String, String>,
    pub polarity: Polarity,
    pub support_set: Vec<String>,
    #[serde(default)]
    pub derivation_op_id: Option<String>,
    #[serde(default)]
    pub canonical_signature: Option<Signature>,
    #[serde(default)]
    pub temporal_scope: Option<TemporalScope>,
    pub modal_scope: ModalScope,
}

/// The value(s) bound to a slot. Single-valued slots are `One`; multi-valued
/// slots preserve insertion order in `Many` (ordering is resolved against the
/// slot's `ordered` flag at signature time, not here).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotValue {
    One(String),
    Many(Vec<String>),
}

impl SlotValue {
    pub fn len(&self) -> usize {
        match self {
            SlotValue::One(_) => 1,
            SlotValue::Many(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_values(&self) -> Vec<&str> {
        match self {
            SlotValue::One(v) => vec![v.as_str()],
            SlotValue::Many(v) => v.iter().map(String::as_str).collect(),
        }
    }
}

/// Unordered groups describing a single commit's mutations to the claim store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimDelta {
    #[serde(default)]
    pub adds: Vec<ClaimInstance>,
    #[serde(default)]
    pub updates: Vec<ClaimInstance>,
    #[serde(default)]
    pub deletes: Vec<Signature>,
    #[serde(default)]
    pub merges: Vec<MergeDelta>,
    #[serde(default)]
    pub splits: Vec<SplitDelta>,
}

impl ClaimDelta {
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty()
            && self.updates.is_empty()
            && self.deletes.is_empty()
            && self.merges.is_empty()
            && self.splits.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeDelta {
    pub sources: Vec<Signature>,
    pub merged_claim: ClaimInstance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitDelta {
    pub source: Signature,
    pub split_claims: Vec<ClaimInstance>,
}

/// A committed ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticOp {
    pub op_id: String,
    pub operator_id: String,
    pub args: BTreeMap<String, serde_json::Value>,
    pub delta: ClaimDelta,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub content_hash: String,
    pub support: Vec<String>,
    /// Entries skipped in permissive mode, with the reason they were skipped.
    /// Empty in strict mode (any rejection there aborts the whole op).
    #[serde(default)]
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub signature_or_index: String,
    pub reason: String,
}

/// A row in the claim store: the claim plus its tombstone state (I5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRow {
    pub signature: Signature,
    pub claim: ClaimInstance,
    pub tombstoned: bool,
    pub created_by_op_id: String,
}

/// Raised when an identity-path value is not serializable and must fail hard
/// rather than being silently coerced to a string.
#[derive(Debug, Error)]
pub enum CanonicalHashError {
    #[error("value at path '{path}' is not serializable for hashing")]
    NonSerializable { path: String },
    #[error("domain prefix missing for artifact kind '{0}'")]
    PrefixMissing(String),
}

/// Errors raised by schema registration and migration (C2).
#[derive(Debug, Error)]
pub enum SchemaRegistrationError {
    #[error("schema '{schema_id}' already registered with a different semantic hash")]
    HashConflict { schema_id: String },
    #[error("schema '{0}' is not registered")]
    NotRegistered(String),
    #[error("migration for '{schema_id}' produced an identical semantic hash; use register() for no-ops")]
    MigrationRequired { schema_id: String },
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while validating or applying a claim (§4.2 validation, §4.4 apply).
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("schema '{0}' is not registered")]
    UnknownSchema(String),
    #[error("slot '{slot}' is not declared on schema '{schema_id}'")]
    UnknownSlot { schema_id: String, slot: String },
    #[error("slot '{slot}' violates cardinality {cardinality:?} with {actual} value(s)")]
    CardinalityViolation {
        slot: String,
        cardinality: Cardinality,
        actual: usize,
    },
    #[error("slot '{slot}' value does not conform to declared type {expected:?}")]
    TypeMismatch { slot: String, expected: SlotType },
    #[error("asserted claim has {actual} evidence item(s), schema requires {required}")]
    EvidenceInsufficient { required: usize, actual: usize },
    #[error("temporal scope is internally inconsistent (valid_from after valid_until)")]
    TemporalInvalid,
    #[error("canonical hashing failed: {0}")]
    Hashing(#[from] CanonicalHashError),
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while committing a `SemanticOp` (C4, §6.1 typed codes).
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Claim(#[from] ClaimError),
    #[error(transparent)]
    Registration(#[from] SchemaRegistrationError),
    #[error("delta application order was violated")]
    OrderViolation,
    #[error("input-supplied signature does not match recomputed signature")]
    SignatureRejected,
    #[error("strict mode abort: {0}")]
    StrictAbort(String),
    #[error("referenced signature '{0}' does not exist in the claim store")]
    UnknownSignature(String),
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
