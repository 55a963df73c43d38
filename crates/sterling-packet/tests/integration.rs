//! # Decision Packet Integration Tests
//!
//! Exercises the assembler and salience scorer together over a realistic
//! candidate set spanning atomic, abstract and drilldown claims.

use chrono::Utc;
use std::collections::BTreeMap;
use sterling_ledger::{ClaimInstance, EpistemicStatus, ModalScope, Polarity, SchemaKind, SlotValue};
use sterling_packet::{assemble, PacketBudget, TaskSpec};

fn claim(schema_id: &str, name: &str, status: EpistemicStatus) -> ClaimInstance {
    let mut slots = BTreeMap::new();
    slots.insert("name".to_string(), SlotValue::One(name.to_string()));
    ClaimInstance {
        schema_id: schema_id.to_string(),
        slots,
        epistemic_status: status,
        qualifiers: BTreeMap::new(),
        polarity: Polarity::Pos,
        support_set: vec!["e1".to_string(), "e2".to_string()],
        derivation_op_id: None,
        canonical_signature: None,
        temporal_scope: None,
        modal_scope: ModalScope::ACTUAL,
    }
}

#[test]
fn drilldown_present_when_parent_included() {
    let parent = claim("sterling.person.v1", "Alice", EpistemicStatus::Asserted);
    let mut drilldown = claim("sterling.person.v1", "Alice-detail", EpistemicStatus::Asserted);
    drilldown.qualifiers.insert("parent_signature".to_string(), "parent-sig".to_string());

    let candidates = vec![("parent-sig".to_string(), parent), ("child-sig".to_string(), drilldown)];
    let task = TaskSpec { schema_ids: vec![], allow_meta: false, budget: None, time_window: None, strict: false };
    let packet = assemble(&task, &candidates, |_| Some(SchemaKind::ENTITY), |_| Vec::new(), Utc::now()).unwrap();

    assert_eq!(packet.slices.len(), 2);
    let parent_rank = packet.slices.iter().find(|s| s.signature == "parent-sig").unwrap().rank;
    let child_rank = packet.slices.iter().find(|s| s.signature == "child-sig").unwrap().rank;
    assert!(child_rank > parent_rank);
}

#[test]
fn hypothesis_claims_rank_below_asserted_ones() {
    let asserted = claim("sterling.person.v1", "Alice", EpistemicStatus::Asserted);
    let hypothesis = claim("sterling.person.v1", "Bob", EpistemicStatus::Hypothesis);

    let candidates = vec![("asserted-sig".to_string(), asserted), ("hypothesis-sig".to_string(), hypothesis)];
    let task = TaskSpec { schema_ids: vec![], allow_meta: false, budget: None, time_window: None, strict: false };
    let packet = assemble(&task, &candidates, |_| Some(SchemaKind::ENTITY), |_| Vec::new(), Utc::now()).unwrap();

    assert_eq!(packet.slices[0].signature, "asserted-sig");
    assert_eq!(packet.slices[1].signature, "hypothesis-sig");
}

#[test]
fn budget_of_one_keeps_only_the_top_ranked_claim() {
    let candidates: Vec<_> = (0..5)
        .map(|i| (format!("sig-{i}"), claim("sterling.person.v1", &format!("Person{i}"), EpistemicStatus::Asserted)))
        .collect();
    let task = TaskSpec {
        schema_ids: vec![],
        allow_meta: false,
        budget: Some(PacketBudget { max_claims: 1, max_ops_fetched: 512, max_assembly_time_ms: 250 }),
        time_window: None,
        strict: false,
    };
    let packet = assemble(&task, &candidates, |_| Some(SchemaKind::ENTITY), |_| Vec::new(), Utc::now()).unwrap();

    assert_eq!(packet.slices.len(), 1);
    assert!(packet.metrics.budget_exhausted);
}
