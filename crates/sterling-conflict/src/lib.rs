//! # Sterling Conflict - Identity-Key Conflict Detection
//!
//! Groups live claims sharing an identity key (the schema's declared primary
//! slots) and raises a `ConflictSet` when the group disagrees: either a
//! polarity mismatch (some claims assert, others deny the same fact) or a
//! temporal overlap (two claims hold incompatible values over intersecting
//! time ranges). Detection only considers claims that are actually asserted
//! in the real world — `ACTUAL` modal scope, `asserted` epistemic status, a
//! definite polarity (I4) — so hypotheses, counterfactuals and claims of
//! unknown polarity never participate.
//!
//! Detection is a pure function of the live claim set: `ConflictEngine`
//! caches its last computation behind a signature index and an identity-key
//! index so repeated queries don't rescan the store, but calling
//! `recompute_schema` again with an updated claim list is always correct —
//! conflicts that no longer apply simply drop out, which is how retirement
//! on claim delete or update works.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CONFLICT ENGINE                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                               │
//! │   live claims ──▶ identity.rs ──▶ group by identity key       │
//! │                                         │                     │
//! │                                         ▼                     │
//! │                         polarity_conflict / temporal_conflict │
//! │                                         │                     │
//! │                                         ▼                     │
//! │                    ConflictSet (content-hashed conflict_id)   │
//! │                                         │                     │
//! │              ┌──────────────────────────┴─────────┐          │
//! │              ▼                                     ▼          │
//! │     by_signature index                    by_identity index   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod engine;
pub mod error;
pub mod identity;
pub mod models;

pub use engine::ConflictEngine;
pub use error::ConflictError;
pub use identity::{identity_key_roles, identity_key_values, is_conflict_eligible};
pub use models::{ConflictReason, ConflictSet, DEFAULT_POLICY_ID};
