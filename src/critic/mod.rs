// Critic: scores an analysis snapshot and proposes the next improvement
//
// The controller only ever sees a validated `Verdict` or a `CriticError`.
// Free-form model output is parsed and schema-checked in `parse`.

pub mod llm;
pub mod parse;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::refinement::types::{AnalysisSnapshot, ContextStore, DataRequest};

pub use llm::{LlmCritic, REVIEW_CHECKLIST};
pub use parse::parse_verdict;

/// Lowest score a critic may hand back
pub const SCORE_MIN: u8 = 1;
/// Highest score a critic may hand back
pub const SCORE_MAX: u8 = 10;

/// Structured output of one critique round
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    /// Quality score in `SCORE_MIN..=SCORE_MAX`
    pub score: u8,
    pub critique: String,
    /// At most one piece of additional evidence per round
    pub data_request: Option<DataRequest>,
    pub improved_analysis: Option<AnalysisSnapshot>,
}

impl Verdict {
    pub fn new(score: u8, critique: impl Into<String>) -> Self {
        Self {
            score,
            critique: critique.into(),
            data_request: None,
            improved_analysis: None,
        }
    }

    pub fn with_request(mut self, request: DataRequest) -> Self {
        self.data_request = Some(request);
        self
    }

    pub fn with_improvement(mut self, snapshot: AnalysisSnapshot) -> Self {
        self.improved_analysis = Some(snapshot);
        self
    }
}

/// The verdict did not match the expected schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Verdict is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("Verdict is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Score is not an integer: {0}")]
    InvalidScore(String),

    #[error("Score {0} is outside {min}..={max}", min = SCORE_MIN, max = SCORE_MAX)]
    ScoreOutOfRange(i64),

    #[error("Invalid data request: {0}")]
    InvalidDataRequest(String),

    #[error("improved_analysis must be a JSON object")]
    InvalidImprovedAnalysis,
}

/// A critique round that produced no usable verdict
#[derive(Error, Debug)]
pub enum CriticError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Critic backend failed: {0}")]
    Generator(String),

    #[error("Critic timed out after {0:?}")]
    Timeout(Duration),
}

/// Scores a snapshot against the gathered context.
#[async_trait]
pub trait Critic: Send + Sync {
    async fn critique(
        &self,
        snapshot: &AnalysisSnapshot,
        context: &ContextStore,
    ) -> Result<Verdict, CriticError>;

    /// Name for logging
    fn name(&self) -> &str;
}
