//! Structured result-page types.
//!
//! [`SerpArtifact`] is the JSON document persisted to the object store —
//! the parsed page plus enough metadata (term, project, locale, timestamp)
//! to reprocess it without the database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One result entry, organic or sponsored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerpEntry {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: Option<String>,
}

/// Presence flags for SERP feature sections. Boolean presence only — the
/// sections themselves are not parsed further.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerpFeatures {
    pub map_pack: bool,
    pub video: bool,
    pub image: bool,
    pub snippet: bool,
    pub people_also_ask: bool,
    pub knowledge_panel: bool,
    pub shopping: bool,
    pub news: bool,
    pub related_searches: bool,
}

/// Output of [`crate::parse_serp`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedSerp {
    pub organic: Vec<SerpEntry>,
    pub sponsored: Vec<SerpEntry>,
    pub features: SerpFeatures,
}

/// The document written to the object store for each extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerpArtifact {
    pub term: String,
    pub project_id: i64,
    pub locale: String,
    pub observed_at: DateTime<Utc>,
    pub serp: ParsedSerp,
}
