//! Decision packet types: the bounded, ranked slice of the claim store handed
//! to a consumer for one task.

use serde::{Deserialize, Serialize};
use sterling_conflict::ConflictSet;
use sterling_ledger::{Signature, TemporalScope};

/// Budget a packet assembly run must respect. Mirrors the shape of a
/// gas budget: a fixed allowance, consumed greedily, with exhaustion
/// tracked rather than silently truncated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PacketBudget {
    pub max_claims: usize,
    pub max_ops_fetched: usize,
    pub max_assembly_time_ms: u64,
}

impl Default for PacketBudget {
    fn default() -> Self {
        PacketBudget { max_claims: 64, max_ops_fetched: 512, max_assembly_time_ms: 250 }
    }
}

/// What a packet is being assembled for: which schemas are in scope and any
/// budget override for this particular call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Empty means "no schema filter" - every non-META schema is eligible.
    pub schema_ids: Vec<String>,
    /// META-kind claims are excluded unless this is set, or a META schema id
    /// is named explicitly in `schema_ids` (I9).
    #[serde(default)]
    pub allow_meta: bool,
    #[serde(default)]
    pub budget: Option<PacketBudget>,
    /// The window of interest salience's `temporal_relevance` factor scores
    /// claims against. `None` falls back to scoring relevance against the
    /// single instant the packet is assembled `as_of`.
    #[serde(default)]
    pub time_window: Option<TemporalScope>,
    /// When set, an empty packet (no claim survives filtering) is a
    /// `CertifiedFailure` rather than a valid, empty result (spec line 217).
    #[serde(default)]
    pub strict: bool,
}

/// The role a slice plays relative to the rest of the packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceKind {
    /// A self-contained claim, includable on its own.
    Atomic,
    /// A higher-level summary claim standing in for finer detail.
    Abstract,
    /// Detail claim that only makes sense alongside an already-included
    /// parent slice (I10: the parent must be in the packet at a strictly
    /// lower rank).
    Drilldown,
}

/// One claim's place in the assembled packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    pub signature: Signature,
    pub kind: SliceKind,
    /// 0-based position in the final ranked, budget-accepted order.
    pub rank: usize,
    #[serde(default)]
    pub parent_signature: Option<Signature>,
    pub salience: f64,
}

/// Bookkeeping about how assembly went, for callers deciding whether to
/// escalate to a certified failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub claims_considered: usize,
    pub claims_included: usize,
    pub budget_exhausted: bool,
    #[serde(default)]
    pub exhaustion_reason: Option<String>,
    pub indexed_retrieval: bool,
}

/// A bounded, ranked slice of the claim store assembled for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionPacket {
    pub packet_id: String,
    pub task: TaskSpec,
    pub budget: PacketBudget,
    pub slices: Vec<Slice>,
    /// Every `ConflictSet` touching an included slice, sorted by
    /// `conflict_id`. Lets a caller see which claims are contested without
    /// issuing a separate `conflicts_touching` call per slice.
    pub conflicts: Vec<ConflictSet>,
    pub metrics: Metrics,
}
