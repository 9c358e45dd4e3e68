// Local checkout providers: file reads and literal code search under a root directory

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use super::{SearchHit, SearchProvider, SourceProvider};

/// Upper bound on hits collected per search
const MAX_HITS: usize = 20;
const MAX_DEPTH: usize = 20;
/// Longest line kept as hit context
const MAX_CONTEXT_CHARS: usize = 240;

/// Resolve `relative` under `root`, refusing anything that climbs out of it.
fn resolve_under(root: &Path, relative: &str) -> Result<PathBuf> {
    let relative = Path::new(relative.trim_start_matches('/'));
    for component in relative.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => bail!("Path escapes the source root: {}", relative.display()),
        }
    }
    Ok(root.join(relative))
}

/// Reads files from a local checkout
pub struct LocalSourceProvider {
    root: PathBuf,
}

impl LocalSourceProvider {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl SourceProvider for LocalSourceProvider {
    async fn file_content(&self, path: &str) -> Result<String> {
        let full = resolve_under(&self.root, path)?;
        let root = tokio::fs::canonicalize(&self.root)
            .await
            .with_context(|| format!("Source root unavailable: {}", self.root.display()))?;
        let real = tokio::fs::canonicalize(&full)
            .await
            .with_context(|| format!("Failed to resolve file: {}", full.display()))?;
        if !real.starts_with(&root) {
            bail!("Path escapes the source root: {}", path);
        }
        tokio::fs::read_to_string(&real)
            .await
            .with_context(|| format!("Failed to read file: {}", real.display()))
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// Literal text search over a local checkout
pub struct LocalSearchProvider {
    root: PathBuf,
    max_hits: usize,
}

impl LocalSearchProvider {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            max_hits: MAX_HITS,
        }
    }

    fn search_blocking(root: &Path, query: &str, max_hits: usize) -> Result<Vec<SearchHit>> {
        if !root.is_dir() {
            bail!("Search root is not a directory: {}", root.display());
        }
        let regex = Regex::new(&regex::escape(query))
            .with_context(|| format!("Invalid search query: {}", query))?;

        let mut hits = Vec::new();

        'outer: for entry in WalkDir::new(root)
            .max_depth(MAX_DEPTH)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }

            let contents = match fs::read_to_string(entry.path()) {
                Ok(c) => c,
                Err(_) => continue, // skip binary files
            };

            let rel = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .display()
                .to_string();

            for line in contents.lines().filter(|l| regex.is_match(l)) {
                hits.push(SearchHit {
                    path: rel.clone(),
                    context: line.trim().chars().take(MAX_CONTEXT_CHARS).collect(),
                });
                if hits.len() >= max_hits {
                    break 'outer;
                }
            }
        }

        Ok(hits)
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

#[async_trait]
impl SearchProvider for LocalSearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let root = self.root.clone();
        let query = query.to_string();
        let max_hits = self.max_hits;
        tokio::task::spawn_blocking(move || Self::search_blocking(&root, &query, max_hits))
            .await
            .context("Search task panicked")?
    }

    fn name(&self) -> &str {
        "local-grep"
    }
}
