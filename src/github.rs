use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::GithubConfig;
use crate::error::Result;

/// Descriptive repository metadata as returned by the code-host API.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoDetails {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub languages_url: Option<String>,
    #[serde(default)]
    pub contributors_url: Option<String>,
    #[serde(default)]
    pub owner: Option<RepoOwner>,
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoOwner {
    pub login: String,
}

/// Source of repository metadata for lazily-created repository rows. The
/// resolver is written against this trait so tests can stub the code host.
pub trait RepoMetadataSource: Send + Sync {
    fn fetch_repository(&self, repo_url: &str) -> Result<RepoDetails>;
}

/// Code-host API client, authenticated with a static token.
pub struct CodeHostClient {
    client: reqwest::blocking::Client,
    token: String,
}

impl CodeHostClient {
    pub fn new(config: &GithubConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("kudos/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            token: config.token.clone(),
        })
    }
}

impl RepoMetadataSource for CodeHostClient {
    fn fetch_repository(&self, repo_url: &str) -> Result<RepoDetails> {
        let mut req = self.client.get(repo_url);
        if !self.token.is_empty() {
            req = req.bearer_auth(&self.token);
        }

        let details = req.send()?.error_for_status()?.json()?;
        Ok(details)
    }
}
