//! Rotating storage for raw fetched markup.
//!
//! One file per term per day at `{project_id}/{term_id}/{YYYY-MM-DD}.html`.
//! Writing is idempotent within a day: a second fetch on the same day keeps
//! the first file. After a write the per-term directory is trimmed to the
//! configured keep count, oldest files first. Date-stamped names sort
//! lexicographically in chronological order, so trimming never needs mtimes.

use std::path::PathBuf;

use chrono::NaiveDate;
use uuid::Uuid;

/// Result of one rotation write.
#[derive(Debug, Clone)]
pub struct RotationOutcome {
    /// Relative path of today's raw artifact.
    pub path: String,
    /// All retained artifact paths for the term, oldest first.
    pub retained: Vec<String>,
    /// Paths deleted by the trim.
    pub deleted: Vec<String>,
    /// `true` when today's file already existed and was kept as-is.
    pub reused: bool,
}

#[derive(Debug, Clone)]
pub struct RotationStore {
    root: PathBuf,
    keep: usize,
}

impl RotationStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, keep: usize) -> Self {
        Self {
            root: root.into(),
            // keep = 0 would delete the file just written
            keep: keep.max(1),
        }
    }

    /// Stores raw markup for a term's fetch on `date` and trims old files.
    ///
    /// # Errors
    ///
    /// Returns [`std::io::Error`] if the write or the directory scan fails.
    /// Trim deletion failures are logged and skipped; a file that cannot be
    /// deleted today is retried on the next rotation.
    pub async fn write(
        &self,
        project_id: i64,
        term_id: i64,
        date: NaiveDate,
        html: &str,
    ) -> Result<RotationOutcome, std::io::Error> {
        let rel_dir = format!("{project_id}/{term_id}");
        let file_name = format!("{}.html", date.format("%Y-%m-%d"));
        let rel_path = format!("{rel_dir}/{file_name}");
        let dir = self.root.join(&rel_dir);
        let full = dir.join(&file_name);

        let reused = tokio::fs::try_exists(&full).await.unwrap_or(false);
        if reused {
            tracing::debug!(path = %rel_path, "raw artifact already stored for this day");
        } else {
            tokio::fs::create_dir_all(&dir).await?;
            let tmp = full.with_extension(format!("tmp.{}", Uuid::new_v4()));
            if let Err(e) = tokio::fs::write(&tmp, html).await {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(e);
            }
            if let Err(e) = tokio::fs::rename(&tmp, &full).await {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(e);
            }
        }

        let (retained, deleted) = self.trim(&rel_dir).await?;
        Ok(RotationOutcome {
            path: rel_path,
            retained,
            deleted,
            reused,
        })
    }

    /// Reads a stored raw artifact back by its relative path.
    ///
    /// # Errors
    ///
    /// Returns [`std::io::Error`] if the file cannot be read.
    pub async fn read(&self, rel_path: &str) -> Result<String, std::io::Error> {
        tokio::fs::read_to_string(self.root.join(rel_path)).await
    }

    /// Deletes the oldest `.html` files beyond the keep count. Returns the
    /// retained paths (oldest first) and the deleted ones.
    async fn trim(&self, rel_dir: &str) -> Result<(Vec<String>, Vec<String>), std::io::Error> {
        let dir = self.root.join(rel_dir);
        let mut names: Vec<String> = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".html") {
                names.push(name);
            }
        }
        names.sort_unstable();

        let excess = names.len().saturating_sub(self.keep);
        let mut deleted = Vec::new();
        for name in names.drain(..excess) {
            let rel = format!("{rel_dir}/{name}");
            match tokio::fs::remove_file(dir.join(&name)).await {
                Ok(()) => deleted.push(rel),
                Err(e) => {
                    tracing::warn!(path = %rel, error = %e, "failed to delete rotated artifact");
                }
            }
        }

        let retained = names.iter().map(|n| format!("{rel_dir}/{n}")).collect();
        Ok((retained, deleted))
    }
}
