// Project-wide constants
//
// Centralised here so defaults have one source of truth.
// Import via `use crate::config::constants::*;`.

/// Refinement rounds per run
pub const DEFAULT_MAX_ITERATIONS: usize = 3;

/// Score (out of 10) at which an analysis counts as converged
pub const DEFAULT_CONVERGE_THRESHOLD: u8 = 9;

/// Characters of fetched file content kept before truncation
pub const DEFAULT_FETCH_CONTENT_CAP: usize = 10_000;

/// Search hits folded into one artifact
pub const DEFAULT_SEARCH_HIT_LIMIT: usize = 5;

/// Consecutive critic failures that abort a run (1 = fail fast)
pub const DEFAULT_FAILURE_TOLERANCE: usize = 1;

/// Default model for the critic
pub const DEFAULT_CRITIC_MODEL: &str = "claude-sonnet-4-20250514";

/// Default maximum tokens for critic replies (improved analyses can be long).
pub const DEFAULT_MAX_TOKENS: u32 = 8000;

pub const DEFAULT_HG_BASE_URL: &str = "https://hg.mozilla.org";
pub const DEFAULT_SEARCHFOX_BASE_URL: &str = "https://searchfox.org";
pub const DEFAULT_REPOSITORY: &str = "mozilla-central";
pub const DEFAULT_REVISION: &str = "tip";

/// Config file location relative to the home directory
pub const CONFIG_RELATIVE_PATH: &str = ".bugrefine/config.toml";
