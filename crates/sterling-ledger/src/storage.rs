//! # Persistent Storage Layer
//!
//! Embedded, content-addressed persistence for schema definitions, claim rows
//! and operator rows, backed by Sled. Per §6.5, each artifact is addressed by
//! `(schema_id, content_hash, key)`, and the claim/conflict indexes are
//! deterministic projections rebuildable by replaying the operator sequence —
//! this module only persists the operator log and the latest row snapshots;
//! indexes live in memory and are rebuilt from the trees on open.
//!
//! ## Storage Structure
//!
//! | Tree | Key | Value |
//! |------|-----|-------|
//! | `schemas` | schema_id | serialized `SchemaDef` (latest version) |
//! | `schema_history` | schema_id | serialized `Vec<String>` (prior semantic hashes, oldest first) |
//! | `claims` | signature | serialized `ClaimRow` |
//! | `ops` | op_id | serialized `SemanticOp` |

use crate::models::{ClaimRow, SchemaDef, SemanticOp};
use std::path::Path;

const SCHEMA_TREE: &str = "schemas";
const SCHEMA_HISTORY_TREE: &str = "schema_history";
const CLAIM_TREE: &str = "claims";
const OP_TREE: &str = "ops";

/// Wrapper around a Sled database for ledger storage.
#[derive(Clone)]
pub struct Storage {
    db: sled::Db,
    schemas: sled::Tree,
    schema_history: sled::Tree,
    claims: sled::Tree,
    ops: sled::Tree,
}

impl Storage {
    /// Opens or creates a storage database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> sled::Result<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Creates a temporary in-memory storage for testing.
    pub fn temporary() -> sled::Result<Self> {
        let config = sled::Config::new().temporary(true);
        Self::from_db(config.open()?)
    }

    fn from_db(db: sled::Db) -> sled::Result<Self> {
        let schemas = db.open_tree(SCHEMA_TREE)?;
        let schema_history = db.open_tree(SCHEMA_HISTORY_TREE)?;
        let claims = db.open_tree(CLAIM_TREE)?;
        let ops = db.open_tree(OP_TREE)?;
        Ok(Storage { db, schemas, schema_history, claims, ops })
    }

    pub fn store_schema(&self, schema: &SchemaDef) -> sled::Result<()> {
        let bytes = serde_json::to_vec(schema).expect("SchemaDef serialization cannot fail");
        self.schemas.insert(schema.schema_id.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn load_schema(&self, schema_id: &str) -> sled::Result<Option<SchemaDef>> {
        Ok(self
            .schemas
            .get(schema_id.as_bytes())?
            .map(|bytes| serde_json::from_slice(&bytes).expect("stored SchemaDef is well-formed")))
    }

    pub fn list_schemas(&self) -> sled::Result<Vec<SchemaDef>> {
        let mut out = Vec::new();
        for entry in self.schemas.iter() {
            let (_, bytes) = entry?;
            out.push(serde_json::from_slice(&bytes).expect("stored SchemaDef is well-formed"));
        }
        Ok(out)
    }

    /// Persists a schema's migration lineage (prior semantic hashes, oldest
    /// first) so it survives a process restart.
    pub fn store_schema_history(&self, schema_id: &str, history: &[String]) -> sled::Result<()> {
        let bytes = serde_json::to_vec(history).expect("schema history serialization cannot fail");
        self.schema_history.insert(schema_id.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn load_schema_history(&self, schema_id: &str) -> sled::Result<Vec<String>> {
        Ok(self
            .schema_history
            .get(schema_id.as_bytes())?
            .map(|bytes| serde_json::from_slice(&bytes).expect("stored schema history is well-formed"))
            .unwrap_or_default())
    }

    pub fn store_claim(&self, row: &ClaimRow) -> sled::Result<()> {
        let bytes = serde_json::to_vec(row).expect("ClaimRow serialization cannot fail");
        self.claims.insert(row.signature.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn load_claim(&self, signature: &str) -> sled::Result<Option<ClaimRow>> {
        Ok(self
            .claims
            .get(signature.as_bytes())?
            .map(|bytes| serde_json::from_slice(&bytes).expect("stored ClaimRow is well-formed")))
    }

    pub fn list_claims(&self) -> sled::Result<Vec<ClaimRow>> {
        let mut out = Vec::new();
        for entry in self.claims.iter() {
            let (_, bytes) = entry?;
            out.push(serde_json::from_slice(&bytes).expect("stored ClaimRow is well-formed"));
        }
        Ok(out)
    }

    pub fn append_op(&self, op: &SemanticOp) -> sled::Result<()> {
        let bytes = serde_json::to_vec(op).expect("SemanticOp serialization cannot fail");
        self.ops.insert(op.op_id.as_bytes(), bytes)?;
        Ok(())
    }

    /// Replays the operator log in commit order (the tree's natural key order
    /// is not commit order, so ops must carry a sortable `op_id` if exact
    /// replay ordering matters to the caller).
    pub fn list_ops(&self) -> sled::Result<Vec<SemanticOp>> {
        let mut out = Vec::new();
        for entry in self.ops.iter() {
            let (_, bytes) = entry?;
            out.push(serde_json::from_slice(&bytes).expect("stored SemanticOp is well-formed"));
        }
        Ok(out)
    }

    pub fn flush(&self) -> sled::Result<usize> {
        self.db.flush()
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("schemas", &self.schemas.len())
            .field("schema_history", &self.schema_history.len())
            .field("claims", &self.claims.len())
            .field("ops", &self.ops.len())
            .finish()
    }
}
