//! # Sterling Failure - Certified Failure Artifacts
//!
//! When a gate cannot produce a result - evidence is missing, a conflict is
//! unresolved, a budget ran out - this crate gives the caller a first-class
//! record of *why*, instead of an exception whose context evaporates the
//! moment it's caught.
//!
//! A `CertifiedFailure` names a closed [`FailureReason`], carries structured
//! context about the attempt, and suggests concrete [`RecoveryOption`]s. Its
//! `record_id` is a content hash over the reason, gate, context and recovery
//! set - the same failure observed twice collapses to one witness in the
//! append-only [`WitnessStore`], the way a claim collapses to one row by
//! signature in the ledger.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │                  STERLING FAILURE                 │
//! ├───────────────────────────────────────────────────┤
//! │                                                     │
//! │   FailureBuilder::new(reason, gate, context, now)   │
//! │                  │                                  │
//! │                  ▼                                  │
//! │          CertifiedFailure (record_id = hash)         │
//! │                  │                                  │
//! │                  ▼                                  │
//! │        WitnessStore::record (idempotent by hash)     │
//! └───────────────────────────────────────────────────┘
//! ```

pub mod models;
pub mod witness;

pub use models::{CertifiedFailure, FailureReason, FailureSeverity, RecoveryOption};
pub use witness::{failure_content_hash, FailureBuilder, WitnessStore};
