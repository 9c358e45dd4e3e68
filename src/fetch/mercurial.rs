// Mercurial source provider: raw file content from an hgweb server

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::SourceProvider;

const REQUEST_TIMEOUT_SECS: u64 = 30;

pub(crate) fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .user_agent(concat!("bugrefine/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")
}

/// Reads files via `{base}/{repo}/raw-file/{revision}/{path}`
pub struct MercurialSourceProvider {
    client: Client,
    base_url: String,
    repository: String,
    revision: String,
}

impl MercurialSourceProvider {
    pub fn new(base_url: String, repository: String, revision: String) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            repository,
            revision,
        })
    }

    fn file_url(&self, path: &str) -> String {
        format!(
            "{}/{}/raw-file/{}/{}",
            self.base_url,
            self.repository,
            self.revision,
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl SourceProvider for MercurialSourceProvider {
    async fn file_content(&self, path: &str) -> Result<String> {
        let url = self.file_url(path);
        tracing::debug!(%url, "Fetching raw file");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("GET {} returned {}", url, status);
        }

        response
            .text()
            .await
            .with_context(|| format!("Failed to read body of {}", url))
    }

    fn name(&self) -> &str {
        "hg"
    }
}
