//! Error types raised during decision packet assembly.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("packet budget is degenerate: max_claims must be at least 1")]
    DegenerateBudget,
}
