//! # Sterling Packet - Bounded Decision Packet Assembly
//!
//! Turns an unbounded claim store into a small, ranked, budget-bounded slice
//! suitable for handing to a downstream consumer in one call.
//!
//! ## Pipeline
//!
//! 1. **Filter** - drop META-kind claims unless the task opts in (I9).
//! 2. **Score** - rank remaining claims by the composite salience formula in
//!    [`salience`], which blends task relevance, trust, temporal freshness,
//!    evidentiary mass, and conflict attention.
//! 3. **Pack** - greedily accept claims in ranked order until the budget is
//!    exhausted, then append drilldown slices whose parent made the cut
//!    (I10), in a second pass so a drilldown never outranks its parent.
//!
//! Assembly never touches storage directly - callers pass in the candidate
//! claim set plus two small closures (schema kind lookup, conflict lookup).
//! The conflict lookup's `ConflictSet`s are attached to the assembled
//! packet (spec §3.1's decision-packet shape), which is why this crate
//! depends on `sterling-conflict`'s public types directly rather than just
//! taking a boolean "is this claim contested" signal.

pub mod assembler;
pub mod error;
pub mod models;
pub mod salience;

pub use assembler::assemble;
pub use error::PacketError;
pub use models::{DecisionPacket, Metrics, PacketBudget, Slice, SliceKind, TaskSpec};
pub use salience::{salience_for, score, SalienceInputs};
