//! # Sterling Core - The Governance Facade
//!
//! Wires the ledger, conflict engine, packet assembler and witness store
//! behind one entry point with single-writer/many-reader concurrency (§5).
//! Everything else in the Sterling workspace is a library; this crate is
//! what an application actually holds onto.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        STERLING CORE                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │                      ┌─────────────────┐                        │
//! │                      │     Ledger      │  ← RwLock facade       │
//! │                      └────────┬────────┘                        │
//! │                               │                                 │
//! │        ┌──────────────────────┼──────────────────────┐          │
//! │        ▼                      ▼                      ▼          │
//! │  ┌───────────┐        ┌──────────────┐       ┌──────────────┐  │
//! │  │  sterling-│        │  sterling-   │       │  sterling-   │  │
//! │  │  ledger    │        │  conflict    │       │  packet      │  │
//! │  │  (schemas, │        │  (identity-  │       │  (salience,  │  │
//! │  │  claims,   │        │  key conflict│       │  budget-     │  │
//! │  │  commits)  │        │  detection)  │       │  bounded     │  │
//! │  └───────────┘        └──────────────┘       │  packing)    │  │
//! │                                                └──────────────┘  │
//! │                      ┌──────────────┐                            │
//! │                      │  sterling-   │                            │
//! │                      │  failure     │                            │
//! │                      │  (certified  │                            │
//! │                      │  failures)   │                            │
//! │                      └──────────────┘                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! A commit takes the facade's write lock: schema registration, migration
//! and delta application are serialized, one writer at a time, same as a
//! single-writer append-only log. Queries - signature lookup, schema
//! listing, conflict lookup, packet assembly - take the read lock and run
//! concurrently with each other, never with a commit in flight.

mod config;
mod error;
mod intent;
mod ledger;

pub use config::{GlobalConfig, PacketConfig, SterlingConfig};
pub use error::{CommitError, QueryError};
pub use intent::RunIntent;
pub use ledger::Ledger;

// Re-export component types for convenience, the way an application using
// this facade would otherwise have to depend on every component crate itself.
pub use sterling_conflict::{ConflictReason, ConflictSet};
pub use sterling_failure::{CertifiedFailure, FailureBuilder, FailureReason, FailureSeverity, RecoveryOption, WitnessStore};
pub use sterling_ledger::{
    ClaimDelta, ClaimInstance, EpistemicStatus, LedgerError, ModalScope, Polarity, SchemaDef, SchemaKind,
    SemanticOp, Signature, TemporalScope,
};
pub use sterling_packet::{DecisionPacket, PacketBudget, Slice, SliceKind, TaskSpec};
