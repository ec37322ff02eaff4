//! Object storage for parsed-result artifacts.
//!
//! Paths are deterministic — `{domain}/{term-slug}/{YYYY-MM-DD}.json` — so
//! any artifact can be found (or re-derived) without a side table.

use std::path::PathBuf;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::ExtractError;

/// Durable key/value blob storage addressed by a relative path.
pub trait ObjectStore {
    /// Writes `bytes` at `path`, replacing any existing object.
    fn put(
        &self,
        path: &str,
        bytes: &[u8],
    ) -> impl std::future::Future<Output = Result<(), ExtractError>> + Send;

    /// Reads the object at `path`; `None` if absent.
    fn get(
        &self,
        path: &str,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>, ExtractError>> + Send;
}

/// Filesystem-backed [`ObjectStore`] rooted at a directory.
///
/// Writes go to a temp file in the same directory and are renamed into
/// place, so a crash mid-write never leaves a truncated artifact at the
/// final path.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl ObjectStore for FsObjectStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), ExtractError> {
        let full = self.full_path(path);
        let store_err = |source: std::io::Error| ExtractError::Store {
            path: path.to_owned(),
            source,
        };

        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(store_err)?;
        }

        let tmp = full.with_extension(format!("tmp.{}", Uuid::new_v4()));
        if let Err(e) = tokio::fs::write(&tmp, bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(store_err(e));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &full).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(store_err(e));
        }
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, ExtractError> {
        match tokio::fs::read(self.full_path(path)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ExtractError::Store {
                path: path.to_owned(),
                source: e,
            }),
        }
    }
}

/// Slugifies a search term for use as a path segment: lowercase, `[a-z0-9]`
/// kept, runs of anything else collapsed to a single `-`.
#[must_use]
pub fn term_slug(term: &str) -> String {
    let mut slug = String::with_capacity(term.len());
    let mut pending_dash = false;
    for c in term.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("term");
    }
    slug
}

/// Deterministic artifact path: `{domain}/{term-slug}/{YYYY-MM-DD}.json`.
#[must_use]
pub fn artifact_path(domain: &str, term: &str, date: NaiveDate) -> String {
    format!("{domain}/{}/{}.json", term_slug(term), date.format("%Y-%m-%d"))
}
