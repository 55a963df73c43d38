//! # Decision Packet Assembler (C6)
//!
//! Ranks eligible claims by salience, then greedily packs a budget-bounded
//! prefix into a `DecisionPacket`. META-kind claims are excluded unless the
//! task explicitly opts in (I9). Drilldown slices are packed in a second
//! pass, after their parent, so a drilldown can never outrank the slice it
//! depends on (I10) — a drilldown whose parent didn't make the first pass is
//! dropped rather than included orphaned.

use crate::error::PacketError;
use crate::models::{DecisionPacket, Metrics, PacketBudget, Slice, SliceKind, TaskSpec};
use crate::salience::salience_for;
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use sterling_conflict::ConflictSet;
use sterling_ledger::canonicalize::{canonical_json_hash, prefix};
use sterling_ledger::{ClaimInstance, SchemaKind, Signature};

/// The closed set of `Metrics.exhaustion_reason` tokens. A caller matches on
/// these literal strings, so they must never grow a prose explanation.
const REASON_MAX_CLAIMS: &str = "max_claims";
const REASON_MAX_ASSEMBLY_TIME_MS: &str = "max_assembly_time_ms";

fn is_meta_excluded(schema_id: &str, task: &TaskSpec, schema_kind_of: &impl Fn(&str) -> Option<SchemaKind>) -> bool {
    if task.allow_meta || task.schema_ids.iter().any(|s| s == schema_id) {
        return false;
    }
    schema_kind_of(schema_id) == Some(SchemaKind::META)
}

fn slice_kind_and_parent(claim: &ClaimInstance) -> (SliceKind, Option<Signature>) {
    if let Some(parent) = claim.qualifiers.get("parent_signature") {
        return (SliceKind::Drilldown, Some(parent.clone()));
    }
    match claim.qualifiers.get("abstraction").map(String::as_str) {
        Some("abstract") => (SliceKind::Abstract, None),
        _ => (SliceKind::Atomic, None),
    }
}

/// Assembles a packet from a candidate claim set. `schema_kind_of` and
/// `conflicts_for` let the caller keep the assembler free of a direct
/// dependency on the schema registry or conflict engine's storage, passing
/// in just the facts this function needs. `conflicts_for` also supplies the
/// `ConflictSet`s attached to the packet, not just a contested/not signal.
pub fn assemble(
    task: &TaskSpec,
    candidates: &[(Signature, ClaimInstance)],
    schema_kind_of: impl Fn(&str) -> Option<SchemaKind>,
    conflicts_for: impl Fn(&str) -> Vec<ConflictSet>,
    as_of: DateTime<Utc>,
) -> Result<DecisionPacket, PacketError> {
    let budget = task.budget.unwrap_or_default();
    if budget.max_claims == 0 {
        return Err(PacketError::DegenerateBudget);
    }
    let deadline = Duration::from_millis(budget.max_assembly_time_ms);
    let clock = Instant::now();

    let mut ranked: Vec<(f64, Signature, ClaimInstance)> = candidates
        .iter()
        .filter(|(_, claim)| !is_meta_excluded(&claim.schema_id, task, &schema_kind_of))
        .map(|(sig, claim)| {
            let salience = salience_for(claim, task, as_of, !conflicts_for(sig).is_empty());
            (salience, sig.clone(), claim.clone())
        })
        .collect();

    ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.1.cmp(&b.1)));

    let mut slices = Vec::new();
    let mut included_signatures = std::collections::HashSet::new();
    let mut deferred_drilldowns = Vec::new();
    let mut budget_exhausted = false;
    let mut exhaustion_reason: Option<&'static str> = None;

    for (salience, sig, claim) in &ranked {
        if clock.elapsed() >= deadline {
            budget_exhausted = true;
            exhaustion_reason = Some(REASON_MAX_ASSEMBLY_TIME_MS);
            break;
        }
        if slices.len() >= budget.max_claims {
            budget_exhausted = true;
            exhaustion_reason = Some(REASON_MAX_CLAIMS);
            break;
        }
        let (kind, parent) = slice_kind_and_parent(claim);
        if kind == SliceKind::Drilldown {
            deferred_drilldowns.push((*salience, sig.clone(), parent));
            continue;
        }
        slices.push(Slice { signature: sig.clone(), kind, rank: slices.len(), parent_signature: parent, salience: *salience });
        included_signatures.insert(sig.clone());
    }

    deferred_drilldowns.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.1.cmp(&b.1)));
    for (salience, sig, parent) in deferred_drilldowns {
        if clock.elapsed() >= deadline {
            budget_exhausted = true;
            exhaustion_reason = Some(REASON_MAX_ASSEMBLY_TIME_MS);
            break;
        }
        if slices.len() >= budget.max_claims {
            budget_exhausted = true;
            exhaustion_reason = Some(REASON_MAX_CLAIMS);
            break;
        }
        let Some(parent_sig) = parent else { continue };
        if !included_signatures.contains(&parent_sig) {
            continue; // orphaned drilldown: parent never made the packet
        }
        slices.push(Slice {
            signature: sig,
            kind: SliceKind::Drilldown,
            rank: slices.len(),
            parent_signature: Some(parent_sig),
            salience,
        });
    }

    let mut conflicts: Vec<ConflictSet> = slices.iter().flat_map(|s| conflicts_for(&s.signature)).collect();
    conflicts.sort_by(|a, b| a.conflict_id.cmp(&b.conflict_id));
    conflicts.dedup_by(|a, b| a.conflict_id == b.conflict_id);

    let metrics = Metrics {
        claims_considered: candidates.len(),
        claims_included: slices.len(),
        budget_exhausted,
        exhaustion_reason: exhaustion_reason.map(str::to_string),
        indexed_retrieval: true,
    };

    let mut packet = DecisionPacket {
        packet_id: String::new(),
        task: task.clone(),
        budget,
        slices,
        conflicts,
        metrics,
    };
    packet.packet_id = packet_content_hash(&packet);
    Ok(packet)
}

/// Content hash over the packet's identity-bearing fields: task, budget,
/// slices (signature/kind/rank/parent only - not salience, which is a
/// process artifact) and conflicts - not metrics, which describe the run
/// rather than the result.
fn packet_content_hash(packet: &DecisionPacket) -> String {
    let slice_identity: Vec<_> = packet
        .slices
        .iter()
        .map(|s| serde_json::json!({"signature": s.signature, "kind": s.kind, "rank": s.rank, "parent_signature": s.parent_signature}))
        .collect();
    let preimage = serde_json::json!({
        "task": packet.task,
        "budget": packet.budget,
        "slices": slice_identity,
        "conflicts": packet.conflicts,
    });
    canonical_json_hash(&preimage, prefix::PACKET_CANON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use sterling_ledger::*;

    fn claim(schema_id: &str, abstraction: Option<&str>, parent: Option<&str>) -> ClaimInstance {
        let mut qualifiers = BTreeMap::new();
        if let Some(a) = abstraction {
            qualifiers.insert("abstraction".to_string(), a.to_string());
        }
        if let Some(p) = parent {
            qualifiers.insert("parent_signature".to_string(), p.to_string());
        }
        ClaimInstance {
            schema_id: schema_id.to_string(),
            slots: BTreeMap::new(),
            epistemic_status: EpistemicStatus::Asserted,
            qualifiers,
            polarity: Polarity::Pos,
            support_set: vec!["e1".to_string()],
            derivation_op_id: None,
            canonical_signature: None,
            temporal_scope: None,
            modal_scope: ModalScope::ACTUAL,
        }
    }

    fn task() -> TaskSpec {
        TaskSpec { schema_ids: vec![], allow_meta: false, budget: None, time_window: None, strict: false }
    }

    fn no_conflicts(_: &str) -> Vec<ConflictSet> {
        Vec::new()
    }

    #[test]
    fn excludes_meta_schemas_by_default() {
        let candidates = vec![("sig1".to_string(), claim("sterling.meta.v1", None, None))];
        let packet = assemble(&task(), &candidates, |_| Some(SchemaKind::META), no_conflicts, Utc::now()).unwrap();
        assert!(packet.slices.is_empty());
    }

    #[test]
    fn includes_meta_when_allowed() {
        let mut t = task();
        t.allow_meta = true;
        let candidates = vec![("sig1".to_string(), claim("sterling.meta.v1", None, None))];
        let packet = assemble(&t, &candidates, |_| Some(SchemaKind::META), no_conflicts, Utc::now()).unwrap();
        assert_eq!(packet.slices.len(), 1);
    }

    #[test]
    fn drilldown_is_dropped_when_parent_absent() {
        let candidates = vec![("sig1".to_string(), claim("sterling.fact.v1", None, Some("missing-parent")))];
        let packet = assemble(&task(), &candidates, |_| Some(SchemaKind::ENTITY), no_conflicts, Utc::now()).unwrap();
        assert!(packet.slices.is_empty());
    }

    #[test]
    fn drilldown_ranks_after_its_parent() {
        let candidates = vec![
            ("parent".to_string(), claim("sterling.fact.v1", Some("abstract"), None)),
            ("child".to_string(), claim("sterling.fact.v1", None, Some("parent"))),
        ];
        let packet = assemble(&task(), &candidates, |_| Some(SchemaKind::ENTITY), no_conflicts, Utc::now()).unwrap();
        assert_eq!(packet.slices.len(), 2);
        let parent_rank = packet.slices.iter().find(|s| s.signature == "parent").unwrap().rank;
        let child_rank = packet.slices.iter().find(|s| s.signature == "child").unwrap().rank;
        assert!(parent_rank < child_rank);
    }

    #[test]
    fn budget_exhaustion_is_recorded() {
        let candidates: Vec<_> = (0..5)
            .map(|i| (format!("sig{i}"), claim("sterling.fact.v1", None, None)))
            .collect();
        let mut t = task();
        t.budget = Some(PacketBudget { max_claims: 2, max_ops_fetched: 10, max_assembly_time_ms: 5_000 });
        let packet = assemble(&t, &candidates, |_| Some(SchemaKind::ENTITY), no_conflicts, Utc::now()).unwrap();
        assert_eq!(packet.slices.len(), 2);
        assert!(packet.metrics.budget_exhausted);
        assert_eq!(packet.metrics.exhaustion_reason.as_deref(), Some("max_claims"));
    }

    #[test]
    fn time_budget_exhaustion_is_recorded_distinctly() {
        let candidates: Vec<_> = (0..5)
            .map(|i| (format!("sig{i}"), claim("sterling.fact.v1", None, None)))
            .collect();
        let mut t = task();
        t.budget = Some(PacketBudget { max_claims: 64, max_ops_fetched: 10, max_assembly_time_ms: 0 });
        let packet = assemble(&t, &candidates, |_| Some(SchemaKind::ENTITY), no_conflicts, Utc::now()).unwrap();
        assert!(packet.metrics.budget_exhausted);
        assert_eq!(packet.metrics.exhaustion_reason.as_deref(), Some("max_assembly_time_ms"));
    }

    #[test]
    fn conflicts_touching_an_included_slice_are_attached_to_the_packet() {
        let candidates = vec![("sig1".to_string(), claim("sterling.fact.v1", None, None))];
        let conflict = ConflictSet {
            conflict_id: "c1".to_string(),
            schema_id: "sterling.fact.v1".to_string(),
            policy_id: sterling_conflict::DEFAULT_POLICY_ID.to_string(),
            identity_key_roles: vec!["entity".to_string()],
            identity_key_values: vec!["alice".to_string()],
            claim_signatures: vec!["sig1".to_string()],
            reason: sterling_conflict::ConflictReason::PolarityMismatch,
            modal_scope: ModalScope::ACTUAL,
        };
        let lookup = |sig: &str| if sig == "sig1" { vec![conflict.clone()] } else { Vec::new() };
        let packet = assemble(&task(), &candidates, |_| Some(SchemaKind::ENTITY), lookup, Utc::now()).unwrap();
        assert_eq!(packet.conflicts.len(), 1);
        assert_eq!(packet.conflicts[0].conflict_id, "c1");
    }
}
