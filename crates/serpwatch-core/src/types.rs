//! Domain enums shared across the pipeline.
//!
//! All three enums map to plain lowercase strings in Postgres; the DB layer
//! stores them as `TEXT` columns rather than native enums so adding a variant
//! never requires a type migration.

use serde::{Deserialize, Serialize};

/// Dispatch priority of a tracked term.
///
/// Ordering is significant: `Critical` terms are selected before `High`,
/// and so on. [`Priority::rank`] gives the sort key used by the eligibility
/// query (`0` = most urgent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Normal,
    Low,
}

impl Priority {
    /// Sort key: lower is dispatched first.
    #[must_use]
    pub fn rank(self) -> i16 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Normal => 2,
            Priority::Low => 3,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }

    /// Parses the DB string form. Unknown values fall back to `Normal`
    /// rather than failing the whole row.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "critical" => Priority::Critical,
            "high" => Priority::High,
            "low" => Priority::Low,
            _ => Priority::Normal,
        }
    }
}

/// Direction of the most recent rank movement for a tracked term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankStatus {
    /// First ranked observation (or first after a reset to unranked).
    New,
    Up,
    Down,
    NoChange,
}

impl RankStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RankStatus::New => "new",
            RankStatus::Up => "up",
            RankStatus::Down => "down",
            RankStatus::NoChange => "no_change",
        }
    }

}

/// How much the latest movement matters to the customer, per the
/// configurable [`crate::ImpactPolicy`] table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    No,
    Low,
    Medium,
    High,
}

impl Impact {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Impact::No => "no",
            Impact::Low => "low",
            Impact::Medium => "medium",
            Impact::High => "high",
        }
    }

}
