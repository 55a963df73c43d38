//! # Sterling Ledger - Canonical Hashing, Schema Registry and the Claim Store
//!
//! `sterling-ledger` is the foundation crate of the Sterling semantic ledger:
//! every other Sterling crate builds on the types and operations defined here.
//! It owns four things:
//!
//! 1. **RFC 8785 canonicalization** - deterministic JSON serialization so that
//!    semantically identical schemas, claims and operators hash identically
//!    regardless of field order.
//!
//! 2. **Schema registry** - registers claim shapes, rejects incompatible
//!    re-registration under the same `schema_id`, and tracks migration
//!    lineage so old claims stay addressable.
//!
//! 3. **Claim store** - the append-only, content-addressed store of
//!    `ClaimInstance` rows, deduplicated by recomputed signature and
//!    tombstoned (never hard-deleted) on retraction.
//!
//! 4. **Ledger** - the commit entry point that applies a `ClaimDelta` in the
//!    fixed phase order Updates -> Deletes -> Merges -> Splits -> Adds and
//!    records the result as a content-hashed `SemanticOp`.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                          STERLING LEDGER                         │
//! ├───────────────────────────────────────────────────────────────────┤
//! │                                                                   │
//! │  ┌───────────────────┐        ┌─────────────────────────────┐    │
//! │  │   CANONICALIZER    │        │      SCHEMA REGISTRY        │    │
//! │  │                    │ hash   │                              │    │
//! │  │  RFC 8785 JSON     │──────▶ │  register / migrate /        │    │
//! │  │  Normalization     │        │  validate_claim               │    │
//! │  │  + domain prefixes │        │                              │    │
//! │  └────────────────────┘        └──────────────┬───────────────┘    │
//! │                                                │                   │
//! │                                                ▼                   │
//! │  ┌────────────────────┐        ┌─────────────────────────────┐    │
//! │  │    CLAIM STORE      │◀──────▶│           LEDGER             │    │
//! │  │                     │        │                              │    │
//! │  │  signature-dedup'd  │        │  fixed apply order,          │    │
//! │  │  tombstone-on-      │        │  content-hashed SemanticOp,  │    │
//! │  │  delete             │        │  strict / permissive commit  │    │
//! │  └─────────────────────┘        └──────────────┬───────────────┘    │
//! │                                                 │                   │
//! │                                                 ▼                   │
//! │                                      ┌─────────────────────┐        │
//! │                                      │    SLED STORAGE      │        │
//! │                                      │  schemas/claims/ops  │        │
//! │                                      └─────────────────────┘        │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## References
//!
//! - **RFC 8785 (2020)** - "JSON Canonicalization Scheme (JCS)".
//!   <https://www.rfc-editor.org/rfc/rfc8785>
//! - **NIST FIPS 180-4** - "Secure Hash Standard (SHS)".
//!   <https://csrc.nist.gov/publications/detail/fips/180/4/final>
//! - **Sled Documentation** - embedded database for persistent storage.
//!   <https://sled.rs/>

pub mod canonicalize;
pub mod claim;
pub mod ledger;
pub mod models;
pub mod schema;
pub mod storage;

pub use claim::{claim_signature, ClaimStore};
pub use ledger::{CommitRequest, Ledger};
pub use models::{
    Cardinality, ClaimDelta, ClaimError, ClaimInstance, ClaimRow, EpistemicStatus, EvidencePolicy,
    Granularity, Hash, IndexPolicy, LedgerError, MergeDelta, ModalScope, Polarity, SchemaDef, SchemaKind,
    SchemaRegistrationError, SemanticOp, Signature, SkippedEntry, SlotDef, SlotType, SlotValue, SplitDelta,
    TemporalScope,
};
pub use schema::SchemaRegistry;
pub use storage::Storage;
