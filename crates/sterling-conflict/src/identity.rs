//! Identity-key derivation: the tuple of primary-slot values that groups
//! claims for conflict detection.

use crate::error::ConflictError;
use sterling_ledger::{ClaimInstance, EpistemicStatus, ModalScope, Polarity, SchemaDef};

/// A claim only participates in conflict detection when it is actually
/// asserted in the real world (I4): `ACTUAL` modal scope, `asserted`
/// epistemic status, and a definite polarity. `unk` polarity never conflicts
/// with anything, by design — an "unknown" claim makes no assertion to
/// contradict.
pub fn is_conflict_eligible(claim: &ClaimInstance) -> bool {
    claim.modal_scope == ModalScope::ACTUAL
        && claim.epistemic_status == EpistemicStatus::Asserted
        && claim.polarity != Polarity::Unk
}

/// The schema's primary slots, sorted by role, validated against its slot list.
pub fn identity_key_roles(schema: &SchemaDef) -> Result<Vec<String>, ConflictError> {
    if schema.index_policy.primary_slots.is_empty() {
        return Err(ConflictError::NoIdentityKey(schema.schema_id.clone()));
    }
    let mut roles = schema.index_policy.primary_slots.clone();
    roles.sort();
    for role in &roles {
        let slot = schema.slot(role).ok_or_else(|| ConflictError::UnknownIdentitySlot {
            schema_id: schema.schema_id.clone(),
            slot: role.clone(),
        })?;
        if !slot.indexable {
            return Err(ConflictError::NotIndexable { schema_id: schema.schema_id.clone(), slot: role.clone() });
        }
    }
    Ok(roles)
}

/// The identity-key values for a claim, one per role in `roles` (already
/// sorted). A multi-valued slot contributes its values sorted and joined with
/// `,` so the key stays a flat, comparable string per role. Returns `None` if
/// the claim is missing one of the identity roles outright.
pub fn identity_key_values(roles: &[String], claim: &ClaimInstance) -> Option<Vec<String>> {
    let mut values = Vec::with_capacity(roles.len());
    for role in roles {
        let value = claim.slots.get(role)?;
        let mut parts: Vec<&str> = value.as_values();
        parts.sort_unstable();
        values.push(parts.join(","));
    }
    Some(values)
}
