//! Conflict types: the identity key a conflict is anchored on, and the
//! `ConflictSet` produced when two or more live claims sharing that key
//! disagree (I4).

use serde::{Deserialize, Serialize};
use sterling_ledger::{ModalScope, Signature};

/// Why a `ConflictSet` was raised. Polarity mismatch and temporal overlap are
/// detected independently, so a single identity-key group that triggers both
/// produces two distinct `ConflictSet` rows rather than one merged row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    PolarityMismatch,
    TemporalOverlap,
}

/// A detected conflict among claims sharing an identity key within one
/// schema. `conflict_id` is this set's content hash and doubles as its
/// identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictSet {
    pub conflict_id: String,
    pub schema_id: String,
    pub policy_id: String,
    pub identity_key_roles: Vec<String>,
    pub identity_key_values: Vec<String>,
    /// Sorted, deduplicated signatures of the claims in conflict.
    pub claim_signatures: Vec<Signature>,
    pub reason: ConflictReason,
    pub modal_scope: ModalScope,
}

/// The default conflict policy applied when a caller doesn't name one.
/// Sterling ships only the deterministic polarity/temporal detector described
/// in the ledger specification; there is no pluggable policy registry yet.
pub const DEFAULT_POLICY_ID: &str = "sterling.conflict.default/v1";
