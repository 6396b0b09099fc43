//! Configuration loading and resolution
//!
//! Resolution priority, highest first:
//! 1. Command-line argument
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default
//!
//! Command-line and environment values for server settings arrive together
//! through clap (`#[arg(env = ...)]`) as [`ServerOverrides`]. Publishing
//! integrations are driven by fixed environment variable names with TOML
//! fallback for everything except secrets.

use crate::{Error, Result};
use base64::Engine;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 64;
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

pub const ENV_GH_TOKEN: &str = "GH_TOKEN";
pub const ENV_STATIC_REPO: &str = "STATIC_REPO";
pub const ENV_STATIC_BRANCH: &str = "STATIC_BRANCH";
pub const ENV_STATIC_PATH: &str = "STATIC_PATH";
pub const ENV_STATIC_SITE_BASE: &str = "STATIC_SITE_BASE";
pub const ENV_STATIC_DATED_SUBFOLDERS: &str = "STATIC_DATED_SUBFOLDERS";
pub const ENV_GDRIVE_SA_JSON_B64: &str = "GDRIVE_SA_JSON_B64";
pub const ENV_GDRIVE_FOLDER_ID: &str = "GDRIVE_FOLDER_ID";

/// TOML config file contents. Every field is optional.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerSection,
    pub github: GitHubSection,
    pub gdrive: DriveSection,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub exports_dir: Option<PathBuf>,
    pub max_upload_mb: Option<u64>,
}

/// Static-site publishing settings. The token is environment-only.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubSection {
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub path: Option<String>,
    pub site_base: Option<String>,
    pub dated_subfolders: Option<bool>,
}

/// Drive settings. Credentials are environment-only.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct DriveSection {
    pub folder_id: Option<String>,
}

/// Server settings supplied on the command line or via environment
#[derive(Debug, Default, Clone)]
pub struct ServerOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub exports_dir: Option<PathBuf>,
    pub max_upload_mb: Option<u64>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub exports_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub github: Option<GitHubConfig>,
    pub drive: Option<DriveConfig>,
}

impl ServiceConfig {
    /// Resolve from overrides, TOML, and an environment lookup.
    ///
    /// A Drive credential that fails to decode disables the Drive
    /// integration with a warning rather than refusing to start.
    pub fn resolve<F>(overrides: ServerOverrides, toml: &TomlConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = overrides
            .host
            .or_else(|| toml.server.host.clone())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = overrides
            .port
            .or(toml.server.port)
            .unwrap_or(DEFAULT_PORT);
        let exports_dir = overrides
            .exports_dir
            .or_else(|| toml.server.exports_dir.clone())
            .unwrap_or_else(default_exports_dir);
        let max_upload_mb = overrides
            .max_upload_mb
            .or(toml.server.max_upload_mb)
            .unwrap_or(DEFAULT_MAX_UPLOAD_MB);

        let github = GitHubConfig::resolve(&lookup, &toml.github);
        let drive = match DriveConfig::resolve(&lookup, &toml.gdrive) {
            Ok(drive) => drive,
            Err(e) => {
                warn!("Drive upload disabled: {}", e);
                None
            }
        };

        Self {
            host,
            port,
            exports_dir,
            max_upload_bytes: (max_upload_mb as usize).saturating_mul(1024 * 1024),
            github,
            drive,
        }
    }

    /// Resolve against the real process environment
    pub fn from_env(overrides: ServerOverrides, toml: &TomlConfig) -> Self {
        Self::resolve(overrides, toml, env_lookup)
    }
}

/// GitHub contents API publishing target
#[derive(Clone)]
pub struct GitHubConfig {
    pub token: String,
    /// `owner/name`
    pub repo: String,
    pub branch: String,
    /// Base folder inside the repo, no leading or trailing `/`
    pub path: String,
    /// Public URL prefix of the static site, no trailing `/`
    pub site_base: Option<String>,
    pub dated_subfolders: bool,
}

impl GitHubConfig {
    /// Enabled only when both token and repo are present.
    pub fn resolve<F>(lookup: &F, toml: &GitHubSection) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = non_empty(lookup(ENV_GH_TOKEN))?;
        let repo = non_empty(lookup(ENV_STATIC_REPO)).or_else(|| non_empty(toml.repo.clone()))?;

        let branch = non_empty(lookup(ENV_STATIC_BRANCH))
            .or_else(|| non_empty(toml.branch.clone()))
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string());
        let path = non_empty(lookup(ENV_STATIC_PATH))
            .or_else(|| toml.path.clone())
            .unwrap_or_default()
            .trim()
            .trim_matches('/')
            .to_string();
        let site_base = non_empty(lookup(ENV_STATIC_SITE_BASE))
            .or_else(|| non_empty(toml.site_base.clone()))
            .map(|s| s.trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty());
        let dated_subfolders = match non_empty(lookup(ENV_STATIC_DATED_SUBFOLDERS)) {
            Some(v) => is_truthy(&v),
            None => toml.dated_subfolders.unwrap_or(true),
        };

        Some(Self {
            token,
            repo,
            branch,
            path,
            site_base,
            dated_subfolders,
        })
    }
}

impl fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("token", &"<redacted>")
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("path", &self.path)
            .field("site_base", &self.site_base)
            .field("dated_subfolders", &self.dated_subfolders)
            .finish()
    }
}

/// Google service account key (the subset of fields the token flow needs)
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

/// Drive upload destination
#[derive(Debug, Clone)]
pub struct DriveConfig {
    pub key: ServiceAccountKey,
    pub folder_id: String,
}

impl DriveConfig {
    /// `Ok(None)` when not configured, `Err` when configured but unusable.
    pub fn resolve<F>(lookup: &F, toml: &DriveSection) -> Result<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let folder_id = non_empty(lookup(ENV_GDRIVE_FOLDER_ID))
            .or_else(|| non_empty(toml.folder_id.clone()))
            .map(|s| s.trim().to_string());
        let (Some(folder_id), Some(encoded)) = (folder_id, non_empty(lookup(ENV_GDRIVE_SA_JSON_B64)))
        else {
            return Ok(None);
        };

        let key = decode_service_account(&encoded)?;
        Ok(Some(Self { key, folder_id }))
    }
}

/// Decode a base64-encoded service account JSON document
pub fn decode_service_account(encoded: &str) -> Result<ServiceAccountKey> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| Error::Config(format!("{} is not valid base64: {}", ENV_GDRIVE_SA_JSON_B64, e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::Config(format!("Service account JSON invalid: {}", e)))
}

/// Load the TOML config file.
///
/// An explicit path that does not exist, or no path at all with no file at
/// the platform default location, yields defaults. A file that exists but
/// does not parse is an error.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) => p,
            None => return Ok(TomlConfig::default()),
        },
    };

    if !path.exists() {
        if explicit.is_some() {
            warn!("Config file not found: {} (using defaults)", path.display());
        }
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config = toml::from_str::<TomlConfig>(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// Platform config file location: `<config dir>/trendmerge/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("trendmerge").join("config.toml"))
}

/// Platform exports directory, falling back to `./static/exports`
pub fn default_exports_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("trendmerge").join("exports"))
        .unwrap_or_else(|| PathBuf::from("static").join("exports"))
}

/// Truthy flag values: `1`, `true`, `yes`, `on` (case-insensitive)
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
