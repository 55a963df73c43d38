//! Certified failure types (C7): a closed vocabulary of reasons, severities
//! and recovery options, each modeled as a real enum rather than a free-text
//! string so a caller can match exhaustively instead of parsing prose.

use serde::{Deserialize, Serialize};

/// Why a gate could not produce a result. Closed per the ledger's failure
/// taxonomy - a new failure mode is a code change, not a new string constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    MissingEvidence,
    UnresolvedConflict,
    BudgetExhausted,
    PartialObservability,
    PolicyBlocked,
    ToolFailure,
    AbstractionExpansionExhausted,
}

/// How serious the failure is to whatever called the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureSeverity {
    /// The caller cannot proceed at all.
    Blocking,
    /// The caller can proceed, but with a degraded result.
    Degraded,
    /// The caller can retry after a cheap corrective action.
    Recoverable,
}

/// A concrete action that could resolve the failure on retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOption {
    AddEvidence,
    DowngradeToHypothesis,
    IncreaseBudget,
    NarrowScope,
}

impl FailureReason {
    /// The severity a given reason implies by default. Callers may override
    /// this when they have more context than the reason alone provides.
    pub fn default_severity(self) -> FailureSeverity {
        match self {
            FailureReason::MissingEvidence => FailureSeverity::Blocking,
            FailureReason::UnresolvedConflict => FailureSeverity::Blocking,
            FailureReason::BudgetExhausted => FailureSeverity::Degraded,
            FailureReason::PartialObservability => FailureSeverity::Degraded,
            FailureReason::PolicyBlocked => FailureSeverity::Blocking,
            FailureReason::ToolFailure => FailureSeverity::Recoverable,
            FailureReason::AbstractionExpansionExhausted => FailureSeverity::Degraded,
        }
    }

    /// The recovery options that make sense for this reason, in priority order.
    pub fn default_recovery_options(self) -> Vec<RecoveryOption> {
        match self {
            FailureReason::MissingEvidence => vec![RecoveryOption::AddEvidence, RecoveryOption::DowngradeToHypothesis],
            FailureReason::UnresolvedConflict => vec![RecoveryOption::AddEvidence, RecoveryOption::NarrowScope],
            FailureReason::BudgetExhausted => vec![RecoveryOption::IncreaseBudget, RecoveryOption::NarrowScope],
            FailureReason::PartialObservability => vec![RecoveryOption::AddEvidence, RecoveryOption::NarrowScope],
            FailureReason::PolicyBlocked => vec![RecoveryOption::NarrowScope],
            FailureReason::ToolFailure => vec![RecoveryOption::IncreaseBudget],
            FailureReason::AbstractionExpansionExhausted => vec![RecoveryOption::NarrowScope, RecoveryOption::IncreaseBudget],
        }
    }
}

/// A certified failure: a first-class artifact recorded when a gate cannot
/// produce a result, rather than an exception the caller has to reconstruct
/// context for after the fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertifiedFailure {
    /// This failure's content hash - see `failure_content_hash`.
    pub record_id: String,
    pub failure_type: FailureReason,
    pub severity: FailureSeverity,
    /// Which gate/operation raised this failure, e.g. `"assemble_packet"`.
    pub gate_id: String,
    /// Structured, hash-critical context: what was being attempted and why
    /// it failed. No stack traces or timestamps belong here.
    pub context: serde_json::Value,
    pub recovery_options: Vec<RecoveryOption>,
    #[serde(default)]
    pub required_artifact: Option<String>,
    #[serde(default)]
    pub search_keys: Vec<String>,
    #[serde(default)]
    pub artifact_ids_checked: Vec<String>,
    /// Wall-clock time the failure was recorded. Metadata, excluded from the hash.
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}
