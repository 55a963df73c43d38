//! Error types raised while detecting or querying conflicts.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConflictError {
    #[error("schema '{0}' declares no primary_slots in its index_policy; conflict detection needs at least one identity-key slot")]
    NoIdentityKey(String),

    #[error("slot '{slot}' named in index_policy.primary_slots is not declared on schema '{schema_id}'")]
    UnknownIdentitySlot { schema_id: String, slot: String },

    #[error("slot '{slot}' named in index_policy.primary_slots on schema '{schema_id}' is not indexable")]
    NotIndexable { schema_id: String, slot: String },
}
