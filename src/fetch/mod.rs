// Evidence fetching: routes critic data requests to source/search providers
//
// `DataFetcher::fetch` never fails: lookup problems come back as an
// error-carrying artifact so the refinement loop keeps going.

pub mod local;
pub mod mercurial;
pub mod searchfox;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{RefineConfig, SourcesConfig};
use crate::refinement::types::{DataRequest, FetchedArtifact, RequestKind};

pub use local::{LocalSearchProvider, LocalSourceProvider};
pub use mercurial::MercurialSourceProvider;
pub use searchfox::SearchfoxProvider;

pub const FILE_NOT_FOUND: &str = "File not found or inaccessible";
pub const SEARCH_FAILED: &str = "Code search failed or unavailable";
pub const NO_SEARCH_RESULTS: &str = "No search results found.";
pub const TRUNCATION_MARKER: &str = "\n... (truncated)";

/// One code-search match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub path: String,
    pub context: String,
}

/// Looks up file content by path
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn file_content(&self, path: &str) -> Result<String>;

    fn name(&self) -> &str;
}

/// Looks up code matches for a query
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// `Ok(vec![])` means the search ran and found nothing
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;

    fn name(&self) -> &str;
}

/// Turns a data request into a fetched artifact
#[async_trait]
pub trait DataFetcher: Send + Sync {
    async fn fetch(&self, request: &DataRequest) -> FetchedArtifact;
}

/// `DataFetcher` backed by one source provider and one search provider
pub struct ProviderFetcher {
    source: Arc<dyn SourceProvider>,
    search: Arc<dyn SearchProvider>,
    content_cap: usize,
    hit_limit: usize,
}

impl ProviderFetcher {
    pub fn new(
        source: Arc<dyn SourceProvider>,
        search: Arc<dyn SearchProvider>,
        content_cap: usize,
        hit_limit: usize,
    ) -> Self {
        Self {
            source,
            search,
            content_cap,
            hit_limit,
        }
    }

    /// Build providers for the configured backend
    pub fn from_config(sources: &SourcesConfig, refine: &RefineConfig) -> Result<Self> {
        let (source, search): (Arc<dyn SourceProvider>, Arc<dyn SearchProvider>) = match sources
        {
            SourcesConfig::Local { root } => (
                Arc::new(LocalSourceProvider::new(root.clone())),
                Arc::new(LocalSearchProvider::new(root.clone())),
            ),
            SourcesConfig::Mozilla {
                hg_base_url,
                searchfox_base_url,
                repository,
                revision,
            } => (
                Arc::new(MercurialSourceProvider::new(
                    hg_base_url.clone(),
                    repository.clone(),
                    revision.clone(),
                )?),
                Arc::new(SearchfoxProvider::new(
                    searchfox_base_url.clone(),
                    repository.clone(),
                )?),
            ),
        };

        Ok(Self::new(
            source,
            search,
            refine.fetch_content_cap,
            refine.search_hit_limit,
        ))
    }

    async fn read_file(&self, request: &DataRequest) -> FetchedArtifact {
        tracing::info!(
            target_path = %request.target,
            provider = self.source.name(),
            "Reading file"
        );
        match self.source.file_content(&request.target).await {
            Ok(content) if !content.is_empty() => {
                tracing::info!(chars = content.chars().count(), "Fetched file content");
                FetchedArtifact::content(request, truncate_content(&content, self.content_cap))
            }
            Ok(_) => {
                tracing::warn!(target_path = %request.target, "File is empty");
                FetchedArtifact::error(request, FILE_NOT_FOUND)
            }
            Err(e) => {
                tracing::warn!(target_path = %request.target, "Failed to fetch file: {:#}", e);
                FetchedArtifact::error(request, FILE_NOT_FOUND)
            }
        }
    }

    async fn search_code(&self, request: &DataRequest) -> FetchedArtifact {
        tracing::info!(
            query = %request.target,
            provider = self.search.name(),
            "Searching code"
        );
        match self.search.search(&request.target).await {
            Ok(hits) if hits.is_empty() => {
                tracing::info!(query = %request.target, "No search results");
                FetchedArtifact::content(request, NO_SEARCH_RESULTS)
            }
            Ok(hits) => {
                tracing::info!(hits = hits.len(), "Search returned results");
                FetchedArtifact::content(request, format_hits(&hits, self.hit_limit))
            }
            Err(e) => {
                tracing::warn!(query = %request.target, "Code search failed: {:#}", e);
                FetchedArtifact::error(request, SEARCH_FAILED)
            }
        }
    }
}

#[async_trait]
impl DataFetcher for ProviderFetcher {
    async fn fetch(&self, request: &DataRequest) -> FetchedArtifact {
        match request.kind {
            RequestKind::ReadFile => self.read_file(request).await,
            RequestKind::SearchCode => self.search_code(request).await,
        }
    }
}

/// Keep at most `cap` characters, marking the cut explicitly.
pub fn truncate_content(content: &str, cap: usize) -> String {
    match content.char_indices().nth(cap) {
        Some((byte_idx, _)) => format!("{}{}", &content[..byte_idx], TRUNCATION_MARKER),
        None => content.to_string(),
    }
}

/// Render the first `limit` hits as one text blob
pub fn format_hits(hits: &[SearchHit], limit: usize) -> String {
    hits.iter()
        .take(limit)
        .map(|hit| format!("File: {}\nContext: {}", hit.path, hit.context))
        .collect::<Vec<_>>()
        .join("\n---\n")
}
