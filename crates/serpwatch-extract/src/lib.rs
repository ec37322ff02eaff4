//! Ranking extraction: raw SERP markup in, rank observation out.
//!
//! The pipeline is parse → domain-rank resolution → artifact persistence.
//! The structured artifact is written to the object store *before* any
//! observation is created, so an observation can never point at a missing
//! artifact.

pub mod domain;
mod error;
mod extractor;
mod parse;
mod store;
mod types;

pub use domain::{domains_match, normalize_domain};
pub use error::ExtractError;
pub use extractor::{extract, RankedResult, TermContext};
pub use parse::parse_serp;
pub use store::{artifact_path, term_slug, FsObjectStore, ObjectStore};
pub use types::{ParsedSerp, SerpArtifact, SerpEntry, SerpFeatures};
