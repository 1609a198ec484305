//! GitHub repository source.
//!
//! Reads a directory tree through the GitHub contents API:
//!
//! - `GET /repos/{owner}/{repo}/contents/{path}?ref={branch}` lists a
//!   directory, one request per directory, driven by an explicit worklist.
//! - Files are identified by their git blob SHA, which changes exactly when
//!   the content changes.
//! - Content of a listed file is read from `GET /repos/{owner}/{repo}/git/blobs/{sha}`,
//!   so the text always matches the identity it was listed under, even if
//!   the branch moves mid-run. Paths that were never listed fall back to
//!   the contents API, and files too large for it are downloaded from
//!   their `download_url`.
//!
//! # Error mapping
//!
//! | Response | Error |
//! |----------|-------|
//! | 404 for the root | `InvalidScope` |
//! | 429, 403 with exhausted rate limit, 5xx, timeouts | `TransientFetch` |
//! | 401, other 4xx, malformed bodies | `Source` |
//!
//! # Environment Variables
//!
//! The token is read from the variable named by `github.token_env`
//! (commonly `GITHUB_TOKEN`). Public repositories work without one, at a
//! much lower rate limit.

use anyhow::{bail, Context};
use async_trait::async_trait;
use base64::Engine;
use docsync_core::error::{Result, SyncError};
use docsync_core::models::RepoItem;
use docsync_core::source::SourceTree;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::{header, StatusCode, Url};
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

use crate::config::GitHubSourceConfig;

pub struct GitHubTree {
    client: reqwest::Client,
    api_url: Url,
    owner: String,
    repo: String,
    branch: Option<String>,
    token: Option<String>,
    /// Repository path → blob SHA, as listed by the last enumeration.
    listed: Mutex<HashMap<String, String>>,
}

/// A git blob.
#[derive(Debug, Deserialize)]
struct Blob {
    content: String,
    #[serde(default)]
    encoding: Option<String>,
}

/// One entry of a contents API response.
#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    sha: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
}

/// A directory lists as an array, a file as a single object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing {
    Dir(Vec<ContentEntry>),
    File(Box<ContentEntry>),
}

/// Traversal state: directories still to list, and files already listed.
struct Walk {
    dirs: VecDeque<String>,
    ready: VecDeque<RepoItem>,
}

impl GitHubTree {
    /// Build a client for one repository. Fails if `token_env` names an
    /// unset variable.
    pub fn new(config: &GitHubSourceConfig, timeout: Duration) -> anyhow::Result<Self> {
        let token = match &config.token_env {
            Some(var) => match std::env::var(var) {
                Ok(value) if !value.trim().is_empty() => Some(value),
                _ => bail!("GitHub token variable {} is not set", var),
            },
            None => None,
        };

        let client = reqwest::Client::builder()
            .user_agent(concat!("docsync/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: Url::parse(&config.api_url).with_context(|| format!("Invalid GitHub API URL: {}", config.api_url))?,
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
            token,
            listed: Mutex::new(HashMap::new()),
        })
    }

    fn api_path(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::Source(format!("GitHub API URL cannot be a base: {}", self.api_url)))?
            .pop_if_empty()
            .extend(["repos", self.owner.as_str(), self.repo.as_str()])
            .extend(segments);
        Ok(url)
    }

    /// URL of the blobs endpoint for one SHA.
    fn blob_url(&self, sha: &str) -> Result<Url> {
        self.api_path(&["git", "blobs", sha])
    }

    fn remember(&self, repo_path: String, sha: &str) {
        self.listed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(repo_path, sha.to_string());
    }

    fn listed_sha(&self, repo_path: &str) -> Option<String> {
        self.listed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(repo_path)
            .cloned()
    }

    /// URL of the contents endpoint for a repository path.
    fn contents_url(&self, repo_path: &str) -> Result<Url> {
        let mut segments = vec!["contents"];
        segments.extend(repo_path.split('/').filter(|s| !s.is_empty()));
        let mut url = self.api_path(&segments)?;
        if let Some(branch) = &self.branch {
            url.query_pairs_mut().append_pair("ref", branch);
        }
        Ok(url)
    }

    async fn get(&self, url: Url, operation: &str) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request
            .send()
            .await
            .map_err(|e| SyncError::transient(operation, e))
    }

    /// List one directory below `root`. `dir` is relative to `root`.
    async fn list_dir(&self, root: &str, dir: &str) -> Result<Vec<ContentEntry>> {
        let repo_path = join_path(root, dir);
        let operation = format!("list {}/{}:/{}", self.owner, self.repo, repo_path);
        let resp = self.get(self.contents_url(&repo_path)?, &operation).await?;

        let status = resp.status();
        if !status.is_success() {
            let rate_limited = rate_limit_exhausted(resp.headers());
            let body = resp.text().await.unwrap_or_default();
            if status == StatusCode::NOT_FOUND && dir.is_empty() {
                return Err(SyncError::InvalidScope(format!(
                    "root '{}' not found in {}/{}",
                    root, self.owner, self.repo
                )));
            }
            return Err(classify_status(status, rate_limited, &operation, &body));
        }

        let listing: Listing = resp
            .json()
            .await
            .map_err(|e| SyncError::Source(format!("{}: malformed response: {}", operation, e)))?;
        match listing {
            Listing::Dir(entries) => Ok(entries),
            Listing::File(_) => Err(SyncError::InvalidScope(format!(
                "'{}' is a file, not a directory",
                repo_path
            ))),
        }
    }

    async fn download(&self, url: &str, operation: &str) -> Result<String> {
        let url = Url::parse(url).map_err(|e| SyncError::Source(format!("{}: bad download_url: {}", operation, e)))?;
        let resp = self.get(url, operation).await?;
        let status = resp.status();
        if !status.is_success() {
            let rate_limited = rate_limit_exhausted(resp.headers());
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, rate_limited, operation, &body));
        }
        resp.text().await.map_err(|e| SyncError::transient(operation, e))
    }

    async fn fetch_blob(&self, sha: &str, operation: &str) -> Result<String> {
        let resp = self.get(self.blob_url(sha)?, operation).await?;
        let status = resp.status();
        if !status.is_success() {
            let rate_limited = rate_limit_exhausted(resp.headers());
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, rate_limited, operation, &body));
        }
        let blob: Blob = resp
            .json()
            .await
            .map_err(|e| SyncError::Source(format!("{}: malformed response: {}", operation, e)))?;
        match blob.encoding.as_deref() {
            Some("base64") | None => {
                decode_content(&blob.content).map_err(|e| SyncError::Source(format!("{}: {}", operation, e)))
            }
            Some(_) => Ok(blob.content),
        }
    }

    async fn fetch_by_path(&self, repo_path: &str, operation: &str) -> Result<String> {
        let resp = self.get(self.contents_url(repo_path)?, operation).await?;

        let status = resp.status();
        if !status.is_success() {
            let rate_limited = rate_limit_exhausted(resp.headers());
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, rate_limited, operation, &body));
        }

        let entry = match resp.json::<Listing>().await {
            Ok(Listing::File(entry)) => entry,
            Ok(Listing::Dir(_)) => {
                return Err(SyncError::Source(format!("{}: path is a directory", operation)));
            }
            Err(e) => return Err(SyncError::Source(format!("{}: malformed response: {}", operation, e))),
        };

        match (entry.encoding.as_deref(), entry.content.as_deref()) {
            (Some("base64"), Some(content)) if !content.is_empty() => decode_content(content)
                .map_err(|e| SyncError::Source(format!("{}: {}", operation, e))),
            _ => match entry.download_url.as_deref() {
                Some(url) => self.download(url, operation).await,
                None => Ok(String::new()),
            },
        }
    }
}

#[async_trait]
impl SourceTree for GitHubTree {
    fn enumerate<'a>(&'a self, root: &'a str) -> BoxStream<'a, Result<RepoItem>> {
        let start = Walk {
            dirs: VecDeque::from([String::new()]),
            ready: VecDeque::new(),
        };
        stream::try_unfold(start, move |mut walk| async move {
            loop {
                if let Some(item) = walk.ready.pop_front() {
                    return Ok::<_, SyncError>(Some((item, walk)));
                }
                let Some(dir) = walk.dirs.pop_front() else {
                    return Ok(None);
                };
                let entries = self.list_dir(root, &dir).await?;
                debug!(dir = %join_path(root, &dir), entries = entries.len(), "listed directory");
                for entry in entries {
                    let path = join_path(&dir, &entry.name);
                    match entry.kind.as_str() {
                        "dir" => walk.dirs.push_back(path),
                        "file" => {
                            self.remember(join_path(root, &path), &entry.sha);
                            walk.ready.push_back(RepoItem::new(entry.sha, path));
                        }
                        other => debug!(path = %path, kind = other, "skipping entry"),
                    }
                }
            }
        })
        .boxed()
    }

    async fn fetch_content(&self, root: &str, relative_path: &str) -> Result<String> {
        let repo_path = join_path(root, relative_path);
        let operation = format!("fetch {}/{}:/{}", self.owner, self.repo, repo_path);
        match self.listed_sha(&repo_path) {
            Some(sha) => self.fetch_blob(&sha, &operation).await,
            None => self.fetch_by_path(&repo_path, &operation).await,
        }
    }
}

/// Join two repository path fragments with exactly one `/` between them.
fn join_path(base: &str, rest: &str) -> String {
    let base = base.trim_matches('/');
    let rest = rest.trim_matches('/');
    match (base.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{}/{}", base, rest),
    }
}

/// Decode a base64 content field. GitHub wraps it at 60 columns.
fn decode_content(content: &str) -> anyhow::Result<String> {
    let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .context("invalid base64 content")?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn rate_limit_exhausted(headers: &header::HeaderMap) -> bool {
    headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "0")
        .unwrap_or(false)
}

fn classify_status(status: StatusCode, rate_limited: bool, operation: &str, body: &str) -> SyncError {
    let detail: String = body.chars().take(300).collect();
    if status == StatusCode::TOO_MANY_REQUESTS || (status == StatusCode::FORBIDDEN && rate_limited) {
        SyncError::transient(operation, format!("rate limited (HTTP {})", status.as_u16()))
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        SyncError::transient(operation, format!("HTTP {}: {}", status.as_u16(), detail))
    } else if status == StatusCode::UNAUTHORIZED {
        SyncError::Source(format!("{}: authentication failed", operation))
    } else {
        SyncError::Source(format!("{}: HTTP {}: {}", operation, status.as_u16(), detail))
    }
}
