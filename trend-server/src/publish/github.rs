//! Static-site publishing through the GitHub contents API
//!
//! Each artifact is committed as a file at
//! `<base path>/<YYYY/MM/DD>/<name>` on the configured branch. Re-uploading
//! an existing path updates it in place (the current blob `sha` is looked
//! up first).

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use trend_common::config::GitHubConfig;
use trend_common::naming::{dated_path, join_path};

use super::{Artifacts, LinkPair};

pub const GITHUB_API_BASE: &str = "https://api.github.com";
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// GitHub publishing errors
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("GitHub upload failed: {0} {1}")]
    Api(u16, String),
}

#[derive(Debug, Deserialize)]
struct ContentInfo {
    sha: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutContent<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Clone)]
pub struct GitHubPublisher {
    http: reqwest::Client,
    config: GitHubConfig,
    api_base: String,
}

impl GitHubPublisher {
    pub fn new(http: reqwest::Client, config: GitHubConfig) -> Self {
        Self {
            http,
            config,
            api_base: GITHUB_API_BASE.to_string(),
        }
    }

    /// Point at a different API host (GitHub Enterprise)
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Repository path for an artifact file name
    pub fn artifact_path(&self, name: &str, at: chrono::DateTime<chrono::Utc>) -> String {
        let dated = if self.config.dated_subfolders {
            dated_path(at)
        } else {
            String::new()
        };
        join_path(&[&self.config.path, &dated, name])
    }

    /// Public URL of a published path, if a site base is configured
    pub fn site_url(&self, path: &str) -> Option<String> {
        self.config
            .site_base
            .as_ref()
            .map(|base| format!("{}/{}", base, path))
    }

    fn contents_url(&self, path: &str) -> String {
        format!("{}/repos/{}/contents/{}", self.api_base, self.config.repo, path)
    }

    /// Blob sha of an existing file on the branch, if any
    async fn existing_sha(&self, path: &str) -> Result<Option<String>, GitHubError> {
        let response = self
            .http
            .get(self.contents_url(path))
            .query(&[("ref", self.config.branch.as_str())])
            .bearer_auth(&self.config.token)
            .header("Accept", "application/vnd.github+json")
            .timeout(LOOKUP_TIMEOUT)
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::OK {
            return Ok(None);
        }
        // A directory listing is an array, which has no sha
        Ok(response
            .json::<ContentInfo>()
            .await
            .ok()
            .and_then(|info| info.sha))
    }

    /// Create or update one file
    pub async fn put_file(&self, path: &str, content: &[u8], message: &str) -> Result<(), GitHubError> {
        let sha = self.existing_sha(path).await?;
        let body = PutContent {
            message,
            content: base64::engine::general_purpose::STANDARD.encode(content),
            branch: &self.config.branch,
            sha,
        };

        let response = self
            .http
            .put(self.contents_url(path))
            .bearer_auth(&self.config.token)
            .header("Accept", "application/vnd.github+json")
            .timeout(UPLOAD_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::OK || status == reqwest::StatusCode::CREATED {
            tracing::debug!(path, "Published to GitHub");
            Ok(())
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(GitHubError::Api(status.as_u16(), text))
        }
    }

    /// Upload the HTML viewer and CSV; returns site links and warnings.
    pub async fn publish(&self, artifacts: Artifacts<'_>) -> (LinkPair, Vec<String>) {
        let html_name = artifacts.html_name();
        let csv_name = artifacts.csv_name();
        let html_path = self.artifact_path(&html_name, artifacts.created_at);
        let csv_path = self.artifact_path(&csv_name, artifacts.created_at);

        let html_result = self
            .put_file(&html_path, artifacts.html, &format!("Add viewer {}", html_name))
            .await;
        let csv_result = self
            .put_file(&csv_path, artifacts.csv, &format!("Add CSV {}", csv_name))
            .await;

        let mut links = LinkPair::default();
        let mut warnings = Vec::new();
        match html_result {
            Ok(()) => links.html = self.site_url(&html_path),
            Err(e) => warnings.push(format!("GitHub upload warning: {}", e)),
        }
        match csv_result {
            Ok(()) => links.csv = self.site_url(&csv_path),
            Err(e) => warnings.push(format!("GitHub upload warning: {}", e)),
        }
        (links, warnings)
    }
}
