// Configuration structs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use super::constants::*;
use crate::critic::{SCORE_MAX, SCORE_MIN};

/// Rejected configuration. Raised before any round runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("converge_threshold {0} is outside the critic score range {min}..={max}", min = SCORE_MIN, max = SCORE_MAX)]
    ThresholdOutOfRange(u8),

    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Knobs for one refinement run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    /// Hard cap on critique rounds. Zero is a valid no-op run.
    pub max_iterations: usize,

    /// Score at or above which a round may converge
    pub converge_threshold: u8,

    /// Characters of file content kept per fetched artifact
    pub fetch_content_cap: usize,

    /// Search hits folded into one artifact
    pub search_hit_limit: usize,

    /// Consecutive critic failures tolerated; the run fails on reaching it
    pub failure_tolerance: usize,

    /// Upper bound on a single critic call
    pub critic_timeout_secs: Option<u64>,

    /// Upper bound on a single fetch
    pub fetch_timeout_secs: Option<u64>,

    /// Where per-iteration audit files go (none = not persisted)
    pub persist_dir: Option<PathBuf>,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            converge_threshold: DEFAULT_CONVERGE_THRESHOLD,
            fetch_content_cap: DEFAULT_FETCH_CONTENT_CAP,
            search_hit_limit: DEFAULT_SEARCH_HIT_LIMIT,
            failure_tolerance: DEFAULT_FAILURE_TOLERANCE,
            critic_timeout_secs: None,
            fetch_timeout_secs: None,
            persist_dir: None,
        }
    }
}

impl RefineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(SCORE_MIN..=SCORE_MAX).contains(&self.converge_threshold) {
            return Err(ConfigError::ThresholdOutOfRange(self.converge_threshold));
        }
        if self.fetch_content_cap == 0 {
            return Err(ConfigError::MustBePositive("fetch_content_cap"));
        }
        if self.search_hit_limit == 0 {
            return Err(ConfigError::MustBePositive("search_hit_limit"));
        }
        if self.failure_tolerance == 0 {
            return Err(ConfigError::MustBePositive("failure_tolerance"));
        }
        if self.critic_timeout_secs == Some(0) {
            return Err(ConfigError::MustBePositive("critic_timeout_secs"));
        }
        if self.fetch_timeout_secs == Some(0) {
            return Err(ConfigError::MustBePositive("fetch_timeout_secs"));
        }
        Ok(())
    }

    pub fn critic_timeout(&self) -> Option<Duration> {
        self.critic_timeout_secs.map(Duration::from_secs)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }
}

/// Critic LLM settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriticConfig {
    /// Anthropic API key (ANTHROPIC_API_KEY overrides)
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    /// Messages endpoint override
    pub api_url: Option<String>,
}

impl Default for CriticConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_CRITIC_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            api_url: None,
        }
    }
}

/// Where requested evidence comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum SourcesConfig {
    /// A local checkout
    Local { root: PathBuf },
    /// hg.mozilla.org for file content, Searchfox for code search
    Mozilla {
        #[serde(default = "default_hg_base_url")]
        hg_base_url: String,
        #[serde(default = "default_searchfox_base_url")]
        searchfox_base_url: String,
        #[serde(default = "default_repository")]
        repository: String,
        #[serde(default = "default_revision")]
        revision: String,
    },
}

impl Default for SourcesConfig {
    fn default() -> Self {
        SourcesConfig::Local {
            root: PathBuf::from("."),
        }
    }
}

impl SourcesConfig {
    pub fn mozilla() -> Self {
        SourcesConfig::Mozilla {
            hg_base_url: default_hg_base_url(),
            searchfox_base_url: default_searchfox_base_url(),
            repository: default_repository(),
            revision: default_revision(),
        }
    }
}

fn default_hg_base_url() -> String {
    DEFAULT_HG_BASE_URL.to_string()
}

fn default_searchfox_base_url() -> String {
    DEFAULT_SEARCHFOX_BASE_URL.to_string()
}

fn default_repository() -> String {
    DEFAULT_REPOSITORY.to_string()
}

fn default_revision() -> String {
    DEFAULT_REVISION.to_string()
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub refinement: RefineConfig,
    pub critic: CriticConfig,
    pub sources: SourcesConfig,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.refinement.validate()?;
        if self.critic.max_tokens == 0 {
            return Err(ConfigError::MustBePositive("critic.max_tokens").into());
        }
        if self.critic.model.trim().is_empty() {
            return Err(ConfigError::Invalid("critic.model is empty".to_string()).into());
        }
        Ok(())
    }
}
