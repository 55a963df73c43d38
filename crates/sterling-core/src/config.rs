//! Configuration types for the Sterling ledger facade.

use serde::{Deserialize, Serialize};

/// Configuration for the `Ledger` facade.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SterlingConfig {
    pub global: GlobalConfig,
    pub packet: PacketConfig,
}

/// Global governance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Whether commits default to strict (abort on any rejection) mode when
    /// the caller's `RunIntent` doesn't already force one or the other.
    pub fail_closed: bool,
    /// Recompute conflicts for every touched schema after each commit.
    /// Disabling this is only useful for bulk replay where conflicts are
    /// recomputed once at the end instead of after every op.
    pub recompute_conflicts_on_commit: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self { fail_closed: true, recompute_conflicts_on_commit: true }
    }
}

/// Default packet assembly settings, overridable per `TaskSpec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketConfig {
    pub default_budget: sterling_packet::PacketBudget,
}

impl Default for PacketConfig {
    fn default() -> Self {
        Self { default_budget: sterling_packet::PacketBudget::default() }
    }
}
