//! Error types for the Sterling ledger facade.

use sterling_failure::CertifiedFailure;
use thiserror::Error;

/// Errors raised while committing a delta.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error(transparent)]
    Ledger(#[from] sterling_ledger::LedgerError),
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
}

/// Errors raised while querying the ledger or assembling a packet.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Packet(#[from] sterling_packet::PacketError),
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error(transparent)]
    Commit(#[from] CommitError),
    /// A `strict` task produced no claim, so a `CertifiedFailure` was
    /// recorded in the witness store instead of returning an empty packet
    /// (spec line 217).
    #[error("task required a non-empty packet under strict mode: {0:?}")]
    CertifiedFailure(CertifiedFailure),
}
