//! Salience scoring: the composite ranking formula that orders claims before
//! budget-bounded packing picks a prefix of them.

use crate::models::TaskSpec;
use chrono::{DateTime, Utc};
use sterling_ledger::{ClaimInstance, EpistemicStatus, TemporalScope};

const SUPPORT_MASS_CAP: usize = 3;
const CONFLICT_ATTENTION_BONUS: f64 = 1.0;
/// `trust_tier` is bounded to this range regardless of source: a default by
/// epistemic status, or an explicit qualifier override.
const TRUST_TIER_MIN: f64 = 0.8;
const TRUST_TIER_MAX: f64 = 1.0;

/// The individual factors that go into one claim's salience score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SalienceInputs {
    pub task_match: f64,
    pub trust_tier: f64,
    pub abstraction_status: f64,
    pub temporal_relevance: f64,
    pub support_mass: f64,
    pub conflict_attention: f64,
}

/// `task_match * trust_tier * abstraction_status * (0.5 + 0.5*temporal_relevance)
///  * (0.5 + 0.5*support_mass) + conflict_attention`.
///
/// The multiplicative factors gate each other down to zero when a claim is
/// entirely out of scope (`task_match == 0`); the two `0.5 + 0.5*x` terms
/// keep temporal staleness and thin evidence from zeroing out an otherwise
/// relevant claim outright. `conflict_attention` is additive so a contested
/// claim surfaces even when its other factors are modest.
pub fn score(inputs: &SalienceInputs) -> f64 {
    inputs.task_match
        * inputs.trust_tier
        * inputs.abstraction_status
        * (0.5 + 0.5 * inputs.temporal_relevance)
        * (0.5 + 0.5 * inputs.support_mass)
        + inputs.conflict_attention
}

fn task_match(claim: &ClaimInstance, task: &TaskSpec) -> f64 {
    if task.schema_ids.is_empty() || task.schema_ids.iter().any(|s| s == &claim.schema_id) {
        1.0
    } else {
        0.0
    }
}

/// `1.0` for an asserted claim, `0.8` for a hypothesis, unless the claim
/// carries a `trust_tier` qualifier override (e.g. from handover metadata),
/// in which case that value is used, clamped into `[0.8, 1.0]`.
fn trust_tier(claim: &ClaimInstance) -> f64 {
    if let Some(override_value) = claim.qualifiers.get("trust_tier").and_then(|v| v.parse::<f64>().ok()) {
        return override_value.clamp(TRUST_TIER_MIN, TRUST_TIER_MAX);
    }
    match claim.epistemic_status {
        EpistemicStatus::Asserted => 1.0,
        EpistemicStatus::Hypothesis => TRUST_TIER_MIN,
    }
}

/// `1.0` for an atomic claim. An abstraction scores `1.0 + source_claim_count
/// / 100`, rewarding abstractions that summarize more underlying claims.
fn abstraction_status(claim: &ClaimInstance) -> f64 {
    if claim.qualifiers.get("abstraction").map(String::as_str) != Some("abstract") {
        return 1.0;
    }
    let source_claim_count =
        claim.qualifiers.get("source_claim_count").and_then(|v| v.parse::<f64>().ok()).unwrap_or(0.0);
    1.0 + source_claim_count / 100.0
}

fn parse_instant(s: &str) -> Option<f64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp() as f64);
    }
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp() as f64)
}

/// `(start, end)` as Unix timestamps, with an absent or unparseable bound
/// treated as unbounded (`-inf`/`+inf`) rather than a hard error - a scope
/// whose bounds don't parse is eternal for relevance purposes, not a zero.
fn bounds(scope: Option<&TemporalScope>) -> (f64, f64) {
    match scope {
        None => (f64::NEG_INFINITY, f64::INFINITY),
        Some(s) => (
            s.valid_from.as_deref().and_then(parse_instant).unwrap_or(f64::NEG_INFINITY),
            s.valid_until.as_deref().and_then(parse_instant).unwrap_or(f64::INFINITY),
        ),
    }
}

/// Continuous overlap fraction between the claim's temporal scope and the
/// task's `time_window`, mapped into `[0.1, 1.0]` so a claim with no overlap
/// at all still carries a residual floor rather than being zeroed outright.
/// When the task names no window, relevance is judged against the single
/// instant `as_of` - a claim scope containing that instant scores `1.0`.
fn temporal_relevance(claim: &ClaimInstance, task: &TaskSpec, as_of: DateTime<Utc>) -> f64 {
    let (claim_start, claim_end) = bounds(claim.temporal_scope.as_ref());
    let (window_start, window_end) = match &task.time_window {
        Some(scope) => bounds(Some(scope)),
        None => {
            let point = as_of.timestamp() as f64;
            (point, point)
        }
    };

    let overlap_start = claim_start.max(window_start);
    let overlap_end = claim_end.min(window_end);
    if overlap_start > overlap_end {
        return 0.1;
    }

    let window_len = window_end - window_start;
    if !window_len.is_finite() || window_len <= 0.0 {
        return 1.0;
    }
    let ratio = ((overlap_end - overlap_start) / window_len).clamp(0.0, 1.0);
    0.1 + 0.9 * ratio
}

fn support_mass(claim: &ClaimInstance) -> f64 {
    (claim.support_set.len().min(SUPPORT_MASS_CAP) as f64) / SUPPORT_MASS_CAP as f64
}

/// Builds a claim's `SalienceInputs` and scores it in one step.
pub fn salience_for(claim: &ClaimInstance, task: &TaskSpec, as_of: DateTime<Utc>, has_conflict: bool) -> f64 {
    let inputs = SalienceInputs {
        task_match: task_match(claim, task),
        trust_tier: trust_tier(claim),
        abstraction_status: abstraction_status(claim),
        temporal_relevance: temporal_relevance(claim, task, as_of),
        support_mass: support_mass(claim),
        conflict_attention: if has_conflict { CONFLICT_ATTENTION_BONUS } else { 0.0 },
    };
    score(&inputs)
}
