//! Google Drive uploads with a service account
//!
//! Token flow: an RS256-signed JWT assertion is exchanged at the key's
//! `token_uri` for a short-lived access token. Files are created in the
//! configured folder, their content uploaded, and link sharing opened to
//! anyone with the link.

use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use trend_common::config::{DriveConfig, ServiceAccountKey};

use super::{Artifacts, LinkPair};

pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
pub const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
pub const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";
const JWT_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Drive client errors
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Drive auth error: {0}")]
    Auth(String),

    #[error("Service account key error: {0}")]
    Key(#[from] jsonwebtoken::errors::Error),

    #[error("Drive API error {0}: {1}")]
    Api(u16, String),
}

/// JWT claims for the service account assertion
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl AssertionClaims {
    pub fn new(key: &ServiceAccountKey, now: DateTime<Utc>) -> Self {
        let iat = now.timestamp();
        Self {
            iss: key.client_email.clone(),
            scope: DRIVE_SCOPE.to_string(),
            aud: key.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        }
    }
}

/// Sign the token-exchange assertion with the service account key
pub fn sign_assertion(key: &ServiceAccountKey, now: DateTime<Utc>) -> Result<String, DriveError> {
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
    let claims = AssertionClaims::new(key, now);
    Ok(encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)?)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedFile {
    id: String,
    web_view_link: Option<String>,
}

#[derive(Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    config: DriveConfig,
    files_url: String,
    upload_url: String,
}

impl DriveClient {
    pub fn new(http: reqwest::Client, config: DriveConfig) -> Self {
        Self {
            http,
            config,
            files_url: DRIVE_FILES_URL.to_string(),
            upload_url: DRIVE_UPLOAD_URL.to_string(),
        }
    }

    /// Point the files and media-upload endpoints at another host
    pub fn with_endpoints(mut self, files_url: impl Into<String>, upload_url: impl Into<String>) -> Self {
        self.files_url = files_url.into().trim_end_matches('/').to_string();
        self.upload_url = upload_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn access_token(&self) -> Result<String, DriveError> {
        let assertion = sign_assertion(&self.config.key, Utc::now())?;
        let response = self
            .http
            .post(&self.config.key.token_uri)
            .timeout(REQUEST_TIMEOUT)
            .form(&[("grant_type", JWT_GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(DriveError::Auth(format!("token exchange failed: {} {}", status, text)));
        }
        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    /// Create a file in the destination folder and upload its content.
    /// Returns the browser link.
    pub async fn upload(
        &self,
        token: &str,
        name: &str,
        mime_type: &str,
        content: &[u8],
    ) -> Result<Option<String>, DriveError> {
        let metadata = json!({
            "name": name,
            "parents": [self.config.folder_id],
            "mimeType": mime_type,
        });
        let response = self
            .http
            .post(&self.files_url)
            .query(&[("fields", "id,webViewLink"), ("supportsAllDrives", "true")])
            .bearer_auth(token)
            .timeout(REQUEST_TIMEOUT)
            .json(&metadata)
            .send()
            .await?;
        let created: CreatedFile = checked(response).await?.json().await?;

        let response = self
            .http
            .patch(format!("{}/{}", self.upload_url, created.id))
            .query(&[("uploadType", "media"), ("supportsAllDrives", "true")])
            .bearer_auth(token)
            .header("Content-Type", mime_type)
            .timeout(REQUEST_TIMEOUT)
            .body(content.to_vec())
            .send()
            .await?;
        checked(response).await?;

        self.make_public(token, &created.id).await;
        debug!(name, id = %created.id, "Uploaded to Drive");
        Ok(created.web_view_link)
    }

    /// Open link sharing. Failure leaves the file private.
    async fn make_public(&self, token: &str, file_id: &str) {
        let result = self
            .http
            .post(format!("{}/{}/permissions", self.files_url, file_id))
            .query(&[("supportsAllDrives", "true")])
            .bearer_auth(token)
            .timeout(REQUEST_TIMEOUT)
            .json(&json!({ "role": "reader", "type": "anyone" }))
            .send()
            .await;
        match result {
            Ok(r) if r.status().is_success() => {}
            Ok(r) => debug!(file_id, status = r.status().as_u16(), "Drive sharing not applied"),
            Err(e) => debug!(file_id, "Drive sharing not applied: {}", e),
        }
    }

    /// Upload the HTML viewer and CSV; returns Drive links and warnings.
    pub async fn publish(&self, artifacts: Artifacts<'_>) -> (LinkPair, Vec<String>) {
        let mut links = LinkPair::default();
        let result = async {
            let token = self.access_token().await?;
            links.html = self
                .upload(&token, &artifacts.html_name(), "text/html", artifacts.html)
                .await?;
            links.csv = self
                .upload(&token, &artifacts.csv_name(), "text/csv", artifacts.csv)
                .await?;
            Ok::<(), DriveError>(())
        }
        .await;

        let warnings = match result {
            Ok(()) => Vec::new(),
            Err(e) => vec![format!("Drive upload warning: {}", e)],
        };
        (links, warnings)
    }
}

async fn checked(response: reqwest::Response) -> Result<reqwest::Response, DriveError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let text = response.text().await.unwrap_or_default();
        Err(DriveError::Api(status.as_u16(), text))
    }
}
