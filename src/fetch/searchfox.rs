// Searchfox search provider

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;

use super::mercurial::http_client;
use super::{SearchHit, SearchProvider};

const RESULT_LIMIT: u32 = 20;

/// Queries `{base}/{repo}/search?q=...` and reads the `normal` results
pub struct SearchfoxProvider {
    client: Client,
    base_url: String,
    repository: String,
}

impl SearchfoxProvider {
    pub fn new(base_url: String, repository: String) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            repository,
        })
    }
}

#[async_trait]
impl SearchProvider for SearchfoxProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let url = format!("{}/{}/search", self.base_url, self.repository);
        let limit = RESULT_LIMIT.to_string();

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .query(&[("q", query), ("limit", limit.as_str())])
            .send()
            .await
            .with_context(|| format!("Failed to query {}", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Searchfox returned {}", status);
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false);
        if !is_json {
            anyhow::bail!("Searchfox returned non-JSON content");
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to parse Searchfox response")?;

        Ok(parse_normal_hits(&body))
    }

    fn name(&self) -> &str {
        "searchfox"
    }
}

/// Pull hits out of the `normal` section.
///
/// Accepts a flat list of `{path, context}` or the grouped shape
/// `{category: [{path, lines: [{line}]}]}`. Missing section means no hits.
pub fn parse_normal_hits(body: &Value) -> Vec<SearchHit> {
    match body.get("normal") {
        Some(Value::Array(items)) => items.iter().filter_map(flat_hit).collect(),
        Some(Value::Object(groups)) => groups
            .values()
            .filter_map(Value::as_array)
            .flatten()
            .flat_map(grouped_hits)
            .collect(),
        _ => Vec::new(),
    }
}

fn flat_hit(item: &Value) -> Option<SearchHit> {
    let obj = item.as_object()?;
    Some(SearchHit {
        path: obj
            .get("path")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        context: obj
            .get("context")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
    })
}

fn grouped_hits(file: &Value) -> Vec<SearchHit> {
    let path = file
        .get("path")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    match file.get("lines").and_then(Value::as_array) {
        Some(lines) if !lines.is_empty() => lines
            .iter()
            .map(|l| SearchHit {
                path: path.to_string(),
                context: l
                    .get("line")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .trim()
                    .to_string(),
            })
            .collect(),
        _ => vec![SearchHit {
            path: path.to_string(),
            context: String::new(),
        }],
    }
}
