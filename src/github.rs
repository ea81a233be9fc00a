//! GitHub REST client.
//!
//! [`RepoHost`] is the seam the ingestion pipeline and [`crate::pipeline::PipelineSupervisor::analyze`]
//! talk to; [`GitHubClient`] is the production implementation. Tests plug
//! in an in-memory host.
//!
//! Endpoints used:
//!
//! | Call | Endpoint |
//! |------|----------|
//! | [`RepoHost::get_contents`] | `GET /repos/{owner}/{repo}/contents/{path}` |
//! | [`RepoHost::get_file_content`] | same, single file |
//! | [`RepoHost::get_metadata`] | `/repos/{o}/{r}`, `/branches`, `/contributors`, `/languages`, `/commits?per_page=1` |

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use std::time::Duration;

use repolens_core::error::RepolensError;
use repolens_core::models::RepoMetadata;

use crate::config::GithubConfig;

const COLLABORATOR: &str = "GitHub";

/// One entry of a contents listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
}

/// Result of a contents call: a directory listing or a single file.
#[derive(Debug, Clone, PartialEq)]
pub enum Contents {
    Dir(Vec<ContentEntry>),
    File(ContentEntry),
}

/// Body of a single file as returned by the contents API.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileContent {
    pub content: Option<String>,
    pub encoding: Option<String>,
}

#[async_trait]
pub trait RepoHost: Send + Sync {
    async fn get_contents(&self, owner: &str, repo: &str, path: &str) -> Result<Contents>;

    async fn get_file_content(&self, owner: &str, repo: &str, path: &str) -> Result<FileContent>;

    async fn get_metadata(&self, owner: &str, repo: &str) -> Result<RepoMetadata>;
}

/// A validated GitHub repository reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
    /// URL with trailing slashes and a `.git` suffix removed.
    pub url: String,
}

/// Normalise and validate a GitHub repository URL.
///
/// ```rust
/// use repolens::github::parse_repo_url;
///
/// let r = parse_repo_url("https://github.com/rust-lang/cargo.git/").unwrap();
/// assert_eq!(r.owner, "rust-lang");
/// assert_eq!(r.name, "cargo");
/// assert_eq!(r.url, "https://github.com/rust-lang/cargo");
/// ```
pub fn parse_repo_url(url: &str) -> Result<RepoRef, RepolensError> {
    let trimmed = url.trim().trim_end_matches('/');
    let normalized = trimmed.strip_suffix(".git").unwrap_or(trimmed);

    let invalid = || RepolensError::Validation(format!("Invalid GitHub repository URL: '{}'", url));

    let start = normalized.find("github.com/").ok_or_else(invalid)? + "github.com/".len();
    let mut parts = normalized[start..].split('/');
    let owner = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
    let name = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;

    Ok(RepoRef {
        owner: owner.to_string(),
        name: name.to_string(),
        url: normalized.to_string(),
    })
}

/// Decode a file body into text.
///
/// `base64` bodies are decoded with embedded whitespace ignored, then
/// converted lossily to UTF-8. Other encodings are taken verbatim. A
/// missing body is empty text.
pub fn decode_content(file: &FileContent) -> Result<String> {
    let raw = match &file.content {
        Some(raw) => raw,
        None => return Ok(String::new()),
    };

    match file.encoding.as_deref() {
        Some("base64") => {
            let compact: String = raw.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(compact.as_bytes())
                .context("Invalid base64 file content")?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => Ok(raw.clone()),
    }
}

/// Extract `N` from the `&page=N>; rel="last"` part of a `Link` header.
pub fn parse_last_page(link: &str) -> Option<u64> {
    link.split(',')
        .find(|part| part.contains("rel=\"last\""))
        .and_then(|part| {
            let url_end = part.find('>')?;
            let url = &part[..url_end];
            let page_start = url.rfind("page=")? + "page=".len();
            let digits: String = url[page_start..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse().ok()
        })
}

/// Contents API URL for `path`, each segment percent-encoded so names
/// containing `#`, `?` or `%` reach GitHub intact.
pub fn contents_url(api_url: &str, owner: &str, repo: &str, path: &str) -> Result<reqwest::Url> {
    let mut url = reqwest::Url::parse(api_url)
        .with_context(|| format!("Invalid GitHub API URL: {}", api_url))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("GitHub API URL cannot be a base: {}", api_url))?
        .pop_if_empty()
        .extend(["repos", owner, repo, "contents"])
        .extend(path.split('/').filter(|s| !s.is_empty()));
    Ok(url)
}

// ============ REST client ============

#[derive(Deserialize)]
struct ContentItem {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

impl ContentItem {
    fn entry(&self) -> ContentEntry {
        ContentEntry {
            name: self.name.clone(),
            path: self.path.clone(),
            is_dir: self.kind == "dir",
            size: self.size,
        }
    }
}

#[derive(Deserialize)]
struct RepoInfo {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    #[serde(default)]
    subscribers_count: u64,
}

#[derive(Deserialize)]
struct NamedItem {
    name: String,
}

#[derive(Deserialize)]
struct Contributor {
    login: String,
}

/// [`RepoHost`] backed by the GitHub REST API.
pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(config: &GithubConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("repolens/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token(),
        })
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response> {
        let url = reqwest::Url::parse(&format!("{}{}", self.api_url, path))
            .with_context(|| format!("Invalid GitHub API URL for {}", path))?;
        self.get_url(url, path).await
    }

    async fn get_url(&self, url: reqwest::Url, path: &str) -> Result<reqwest::Response> {
        let mut req = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| RepolensError::unavailable(COLLABORATOR, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RepolensError::unavailable(
                COLLABORATOR,
                format!("GET {} returned {}: {}", path, status, body),
            )
            .into());
        }
        Ok(resp)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.get(path).await?;
        resp.json::<T>()
            .await
            .with_context(|| format!("Unexpected GitHub response for {}", path))
    }

    async fn contents(&self, owner: &str, repo: &str, path: &str) -> Result<serde_json::Value> {
        let url = contents_url(&self.api_url, owner, repo, path)?;
        let resp = self.get_url(url, path).await?;
        resp.json()
            .await
            .with_context(|| format!("Unexpected GitHub response for {}", path))
    }

    async fn commit_count(&self, owner: &str, repo: &str) -> Result<u64> {
        let resp = self
            .get(&format!("/repos/{}/{}/commits?per_page=1", owner, repo))
            .await?;

        let last_page = resp
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_last_page);
        if let Some(n) = last_page {
            return Ok(n);
        }

        let items: Vec<serde_json::Value> = resp.json().await?;
        Ok(items.len() as u64)
    }
}

#[async_trait]
impl RepoHost for GitHubClient {
    async fn get_contents(&self, owner: &str, repo: &str, path: &str) -> Result<Contents> {
        let value = self.contents(owner, repo, path).await?;
        if value.is_array() {
            let items: Vec<ContentItem> = serde_json::from_value(value)?;
            Ok(Contents::Dir(items.iter().map(ContentItem::entry).collect()))
        } else {
            let item: ContentItem = serde_json::from_value(value)?;
            Ok(Contents::File(item.entry()))
        }
    }

    async fn get_file_content(&self, owner: &str, repo: &str, path: &str) -> Result<FileContent> {
        let value = self.contents(owner, repo, path).await?;
        if value.is_array() {
            return Err(RepolensError::Validation(format!("{} is a directory", path)).into());
        }
        let item: ContentItem = serde_json::from_value(value)?;
        Ok(FileContent {
            content: item.content,
            encoding: item.encoding,
        })
    }

    async fn get_metadata(&self, owner: &str, repo: &str) -> Result<RepoMetadata> {
        let base = format!("/repos/{}/{}", owner, repo);

        let info: RepoInfo = self.get_json(&base).await?;
        let branches: Vec<NamedItem> = self
            .get_json(&format!("{}/branches?per_page=100", base))
            .await?;
        let contributors: Vec<Contributor> = self
            .get_json(&format!("{}/contributors?per_page=100", base))
            .await?;
        let languages: serde_json::Map<String, serde_json::Value> =
            self.get_json(&format!("{}/languages", base)).await?;

        let commit_count = match self.commit_count(owner, repo).await {
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(owner, repo, error = %e, "commit count unavailable, using 0");
                0
            }
        };

        Ok(RepoMetadata {
            name: info.name,
            description: info.description.unwrap_or_default(),
            stars: info.stargazers_count,
            forks: info.forks_count,
            watchers: info.subscribers_count,
            commit_count,
            branches: branches.into_iter().map(|b| b.name).collect(),
            contributors: contributors.into_iter().map(|c| c.login).collect(),
            languages: languages.into_iter().map(|(k, _)| k).collect(),
        })
    }
}
