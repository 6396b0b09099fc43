//! Optional publishing of exported artifacts
//!
//! Two independent targets, each enabled by configuration:
//! - a git-backed static site (GitHub contents API)
//! - a cloud drive folder (Google Drive, service account)
//!
//! Publishing never fails a request. Problems are collected as warnings
//! alongside whatever links were produced.

pub mod gdrive;
pub mod github;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use trend_common::config::ServiceConfig;

pub use gdrive::{DriveClient, DriveError};
pub use github::{GitHubError, GitHubPublisher};

/// Links to one exported HTML/CSV pair on a publishing target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkPair {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv: Option<String>,
}

impl LinkPair {
    pub fn is_empty(&self) -> bool {
        self.html.is_none() && self.csv.is_none()
    }
}

/// Result of one publishing round, persisted as `latest.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishedLinks {
    pub github: LinkPair,
    pub gdrive: LinkPair,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl PublishedLinks {
    pub fn is_empty(&self) -> bool {
        self.github.is_empty() && self.gdrive.is_empty()
    }
}

/// The pair of files produced for one upload
#[derive(Debug, Clone, Copy)]
pub struct Artifacts<'a> {
    /// `<slug>-<stamp>` without extension
    pub base_name: &'a str,
    pub html: &'a [u8],
    pub csv: &'a [u8],
    pub created_at: DateTime<Utc>,
}

impl Artifacts<'_> {
    pub fn html_name(&self) -> String {
        format!("{}.html", self.base_name)
    }

    pub fn csv_name(&self) -> String {
        format!("{}.csv", self.base_name)
    }
}

/// The enabled publishing targets
#[derive(Clone, Default)]
pub struct Publishers {
    pub github: Option<GitHubPublisher>,
    pub drive: Option<DriveClient>,
}

impl Publishers {
    pub fn from_config(http: &reqwest::Client, config: &ServiceConfig) -> Self {
        Self {
            github: config
                .github
                .clone()
                .map(|c| GitHubPublisher::new(http.clone(), c)),
            drive: config
                .drive
                .clone()
                .map(|c| DriveClient::new(http.clone(), c)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.github.is_some() || self.drive.is_some()
    }

    /// Publish to every enabled target concurrently.
    pub async fn publish_all(&self, artifacts: Artifacts<'_>) -> PublishedLinks {
        let github = async {
            match &self.github {
                Some(publisher) => publisher.publish(artifacts).await,
                None => (LinkPair::default(), Vec::new()),
            }
        };
        let drive = async {
            match &self.drive {
                Some(client) => client.publish(artifacts).await,
                None => (LinkPair::default(), Vec::new()),
            }
        };
        let ((github, mut warnings), (gdrive, drive_warnings)) = tokio::join!(github, drive);
        warnings.extend(drive_warnings);

        for w in &warnings {
            warn!("Publish warning: {}", w);
        }
        if self.is_enabled() {
            info!(
                github = !github.is_empty(),
                gdrive = !gdrive.is_empty(),
                "Publishing finished for {}",
                artifacts.base_name
            );
        }

        PublishedLinks {
            github,
            gdrive,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_serialization_skips_empty() {
        let links = PublishedLinks {
            github: LinkPair {
                html: Some("https://x/a.html".into()),
                csv: None,
            },
            ..Default::default()
        };
        let json = serde_json::to_value(&links).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"github": {"html": "https://x/a.html"}, "gdrive": {}})
        );
        assert!(!links.is_empty());
        assert!(PublishedLinks::default().is_empty());
    }

    #[test]
    fn test_links_deserialize_partial() {
        let links: PublishedLinks = serde_json::from_str(r#"{"gdrive": {"csv": "c"}}"#).unwrap();
        assert_eq!(links.gdrive.csv.as_deref(), Some("c"));
        assert!(links.github.is_empty());
        assert!(links.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_publish_all_with_nothing_enabled() {
        let publishers = Publishers::default();
        assert!(!publishers.is_enabled());
        let links = publishers
            .publish_all(Artifacts {
                base_name: "v-1",
                html: b"h",
                csv: b"c",
                created_at: Utc::now(),
            })
            .await;
        assert!(links.is_empty());
        assert!(links.warnings.is_empty());
    }

    #[test]
    fn test_artifact_names() {
        let a = Artifacts {
            base_name: "cw-loop-20240101-000000",
            html: b"",
            csv: b"",
            created_at: Utc::now(),
        };
        assert_eq!(a.html_name(), "cw-loop-20240101-000000.html");
        assert_eq!(a.csv_name(), "cw-loop-20240101-000000.csv");
    }
}
