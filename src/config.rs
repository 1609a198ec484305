//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/docsync.sqlite"
//!
//! [server]
//! bind = "127.0.0.1:7340"
//! admin_token_env = "DOCSYNC_ADMIN_TOKEN"
//!
//! [sync]
//! concurrency = 4
//! request_timeout_secs = 30
//!
//! [sites.handbook]
//! root = "docs"
//! path_prefix = "/handbook/"
//! read_token_env = "HANDBOOK_READ_TOKEN"
//!
//! [sites.handbook.github]
//! owner = "acme"
//! repo = "handbook"
//! branch = "main"
//! token_env = "GITHUB_TOKEN"
//!
//! [sites.notes]
//! [sites.notes.local]
//! path = "/srv/notes"
//! ```
//!
//! Every site names exactly one source (`github` or `local`). The site
//! name is the tenant the site's documents are stored under.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::filter::GlobFilter;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub sites: BTreeMap<String, SiteConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Environment variable holding the bearer token for `POST /reconcile`.
    /// Unset means the endpoint is open.
    #[serde(default)]
    pub admin_token_env: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            admin_token_env: None,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Maximum in-flight content fetches per run.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl SyncConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_concurrency() -> usize {
    4
}
fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct SiteConfig {
    /// Directory within the source that holds the site's documents.
    #[serde(default)]
    pub root: String,
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,
    #[serde(default)]
    pub path_suffix: String,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Environment variable holding the bearer token that may search this
    /// site over HTTP. Unset means the site is publicly searchable.
    #[serde(default)]
    pub read_token_env: Option<String>,
    #[serde(default)]
    pub github: Option<GitHubSourceConfig>,
    #[serde(default)]
    pub local: Option<LocalSourceConfig>,
}

fn default_path_prefix() -> String {
    "/".to_string()
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string()]
}

/// Which provider feeds a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    GitHub,
    Local,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::GitHub => "github",
            SourceKind::Local => "local",
        }
    }
}

impl SiteConfig {
    /// The configured provider. Validated by [`load_config`].
    pub fn source_kind(&self) -> SourceKind {
        if self.github.is_some() {
            SourceKind::GitHub
        } else {
            SourceKind::Local
        }
    }

    /// Human-readable location of the site's documents.
    pub fn location(&self) -> String {
        let root = self.root.trim_matches('/');
        match (&self.github, &self.local) {
            (Some(gh), _) => {
                let branch = gh.branch.as_deref().unwrap_or("HEAD");
                format!("{}/{}@{}:/{}", gh.owner, gh.repo, branch, root)
            }
            (None, Some(local)) => local.path.join(root).display().to_string(),
            (None, None) => String::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitHubSourceConfig {
    pub owner: String,
    pub repo: String,
    /// Branch, tag, or commit. Defaults to the repository's default branch.
    #[serde(default)]
    pub branch: Option<String>,
    /// Environment variable holding an API token.
    #[serde(default)]
    pub token_env: Option<String>,
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocalSourceConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Config {
    pub fn site(&self, name: &str) -> Option<&SiteConfig> {
        self.sites.get(name)
    }

    pub fn site_names(&self) -> Vec<String> {
        self.sites.keys().cloned().collect()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.sync.concurrency == 0 {
        bail!("sync.concurrency must be > 0");
    }
    if config.sync.request_timeout_secs == 0 {
        bail!("sync.request_timeout_secs must be > 0");
    }
    if config.server.bind.trim().is_empty() {
        bail!("server.bind must not be empty");
    }

    for (name, site) in &config.sites {
        if name.trim().is_empty() || name.contains(',') {
            bail!("invalid site name '{}': must be non-empty and contain no commas", name);
        }
        match (&site.github, &site.local) {
            (Some(_), Some(_)) => bail!("site '{}' configures both github and local sources", name),
            (None, None) => bail!("site '{}' must configure a github or local source", name),
            (Some(gh), None) => {
                if gh.owner.trim().is_empty() || gh.repo.trim().is_empty() {
                    bail!("site '{}': github.owner and github.repo must not be empty", name);
                }
                reqwest::Url::parse(&gh.api_url)
                    .with_context(|| format!("site '{}': invalid github.api_url", name))?;
            }
            (None, Some(_)) => {}
        }
        if site.read_token_env.as_deref().is_some_and(|v| v.trim().is_empty()) {
            bail!("site '{}': read_token_env must not be empty", name);
        }
        if site.include_globs.is_empty() {
            bail!("site '{}': include_globs must not be empty", name);
        }
        GlobFilter::new(&site.include_globs, &site.exclude_globs)
            .with_context(|| format!("site '{}': invalid glob pattern", name))?;
    }

    Ok(())
}
