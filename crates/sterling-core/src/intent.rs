//! Run intents: the caller's declared reason for a commit, which decides
//! whether a rejected entry aborts the whole op or is merely skipped.

use serde::{Deserialize, Serialize};

/// Why a commit is being made. Certifying, promotion and replay runs are
/// strict: any single rejected entry aborts the entire commit, leaving the
/// store untouched (§5's failure-closed rule). Dev runs are permissive, so
/// exploratory work isn't blocked by one malformed claim in a larger batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunIntent {
    Dev,
    Certifying,
    Promotion,
    Replay,
}

impl RunIntent {
    pub fn is_strict(self) -> bool {
        !matches!(self, RunIntent::Dev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_is_permissive_everything_else_is_strict() {
        assert!(!RunIntent::Dev.is_strict());
        assert!(RunIntent::Certifying.is_strict());
        assert!(RunIntent::Promotion.is_strict());
        assert!(RunIntent::Replay.is_strict());
    }
}
