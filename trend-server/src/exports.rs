//! Local export store
//!
//! Every processed upload is also saved as `<slug>-<stamp>.html|csv` in the
//! exports directory, served read-only under [`EXPORTS_URL_PREFIX`]. The
//! last published links are kept next to them in `latest.json`.

use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tracing::{debug, warn};

use crate::publish::PublishedLinks;

pub const EXPORTS_URL_PREFIX: &str = "/static/exports";
pub const LATEST_FILE: &str = "latest.json";
/// How many exports the index page lists
pub const RECENT_LIMIT: usize = 30;

static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// One hosted viewer in the exports directory
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExportEntry {
    pub slug: String,
    pub html: String,
    pub csv: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExportStore {
    root: PathBuf,
}

impl ExportStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the exports directory if missing (idempotent)
    pub fn ensure_dir(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    /// Write `<base>.html` and `<base>.csv`.
    pub async fn save(&self, base: &str, html: &[u8], csv: &[u8]) -> io::Result<()> {
        tokio::fs::write(self.root.join(format!("{}.html", base)), html).await?;
        tokio::fs::write(self.root.join(format!("{}.csv", base)), csv).await?;
        debug!(base, dir = %self.root.display(), "Saved local export");
        Ok(())
    }

    /// Newest hosted viewers first, by modification time.
    pub async fn recent(&self, limit: usize) -> io::Result<Vec<ExportEntry>> {
        let mut found: Vec<(SystemTime, String)> = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(".html") {
                continue;
            }
            let modified = entry
                .metadata()
                .await
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((modified, name));
        }
        found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));

        let mut entries = Vec::with_capacity(found.len().min(limit));
        for (_, name) in found.into_iter().take(limit) {
            let slug = name.trim_end_matches(".html").to_string();
            let csv_name = format!("{}.csv", slug);
            let csv = tokio::fs::try_exists(self.root.join(&csv_name))
                .await
                .unwrap_or(false)
                .then(|| format!("{}/{}", EXPORTS_URL_PREFIX, csv_name));
            entries.push(ExportEntry {
                html: format!("{}/{}", EXPORTS_URL_PREFIX, name),
                csv,
                slug,
            });
        }
        Ok(entries)
    }

    /// Last published links; a missing or corrupt file reads as empty.
    pub async fn read_latest(&self) -> PublishedLinks {
        let path = self.root.join(LATEST_FILE);
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!("Ignoring unreadable {}: {}", path.display(), e);
                PublishedLinks::default()
            }),
            Err(_) => PublishedLinks::default(),
        }
    }

    /// Replace `latest.json` atomically: write a private temp file, then
    /// rename it over the old one. Concurrent writers never interleave.
    pub async fn write_latest(&self, links: &PublishedLinks) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(links).map_err(io::Error::other)?;
        let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = self
            .root
            .join(format!(".{}.{}-{}.tmp", LATEST_FILE, std::process::id(), seq));

        if let Err(e) = tokio::fs::write(&tmp, json).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        if let Err(e) = tokio::fs::rename(&tmp, self.root.join(LATEST_FILE)).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(())
    }
}
