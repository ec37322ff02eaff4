//! Domain-rank resolution: turns parsed markup into a rank observation.

use chrono::{NaiveDate, Utc};
use serpwatch_core::{MAX_SCAN_DEPTH, UNRANKED};

use crate::domain::{domains_match, normalize_domain};
use crate::error::ExtractError;
use crate::parse::parse_serp;
use crate::store::{artifact_path, ObjectStore};
use crate::types::{ParsedSerp, SerpArtifact, SerpEntry, SerpFeatures};

/// What the extractor needs to know about the term being processed.
#[derive(Debug, Clone)]
pub struct TermContext {
    pub term_id: i64,
    pub project_id: i64,
    pub term: String,
    pub locale: String,
    /// The project's tracked domain, in any form; normalized here.
    pub domain: String,
}

/// One rank observation, ready to commit.
#[derive(Debug, Clone)]
pub struct RankedResult {
    /// 1-indexed position, or 0 when the domain was not found.
    pub position: i32,
    /// `false` only when the match came from the sponsored list. Unranked
    /// results keep the default `true`.
    pub is_organic: bool,
    pub features: SerpFeatures,
    /// Object-store path of the persisted structured artifact.
    pub artifact_ref: String,
    /// URL of the matching result, if any.
    pub rank_url: Option<String>,
}

/// Runs the full extraction: parse, resolve the domain's position, persist
/// the structured artifact, and return the observation data.
///
/// The artifact write happens before the result is returned; if it fails
/// the extraction is aborted so no observation can ever reference a
/// missing artifact. An absent domain is *not* an error, it yields the
/// unranked sentinel position.
///
/// # Errors
///
/// Returns [`ExtractError::Store`] if the artifact cannot be persisted, or
/// [`ExtractError::Serialize`] if the parsed document cannot be encoded.
pub async fn extract<S: ObjectStore>(
    store: &S,
    ctx: &TermContext,
    html: &str,
    observed_on: NaiveDate,
) -> Result<RankedResult, ExtractError> {
    let parsed = parse_serp(html);
    let target = normalize_domain(&ctx.domain);
    let (position, is_organic, rank_url) = resolve_rank(&parsed, &target);

    tracing::debug!(
        term_id = ctx.term_id,
        target = %target,
        position,
        is_organic,
        organic_count = parsed.organic.len(),
        sponsored_count = parsed.sponsored.len(),
        "resolved domain rank"
    );

    let features = parsed.features;
    let path = artifact_path(&target, &ctx.term, observed_on);
    let artifact = SerpArtifact {
        term: ctx.term.clone(),
        project_id: ctx.project_id,
        locale: ctx.locale.clone(),
        observed_at: Utc::now(),
        serp: parsed,
    };
    let bytes = serde_json::to_vec(&artifact)?;
    store.put(&path, &bytes).await?;

    Ok(RankedResult {
        position,
        is_organic,
        features,
        artifact_ref: path,
        rank_url,
    })
}

/// Scans organic results first, then sponsored, both capped at
/// [`MAX_SCAN_DEPTH`]. First match wins; position is the 1-indexed scan
/// index within the matched list.
fn resolve_rank(parsed: &ParsedSerp, target: &str) -> (i32, bool, Option<String>) {
    if let Some((position, url)) = scan(&parsed.organic, target) {
        return (position, true, Some(url));
    }
    if let Some((position, url)) = scan(&parsed.sponsored, target) {
        return (position, false, Some(url));
    }
    (UNRANKED, true, None)
}

fn scan(entries: &[SerpEntry], target: &str) -> Option<(i32, String)> {
    entries
        .iter()
        .take(MAX_SCAN_DEPTH)
        .enumerate()
        .find(|(_, entry)| domains_match(&normalize_domain(&entry.url), target))
        .map(|(idx, entry)| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let position = (idx + 1) as i32;
            (position, entry.url.clone())
        })
}

#[cfg(test)]
#[path = "extractor_test.rs"]
mod tests;
