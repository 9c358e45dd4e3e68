// Refinement types: snapshots, data requests, fetched artifacts, iteration records

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Field set on an improved snapshot to carry the critique that produced it.
pub const REFINEMENT_CRITIQUE_FIELD: &str = "refinement_critique";

/// The current structured understanding of a bug.
///
/// Open-ended JSON object. The controller never edits one in place: every
/// improving round builds a fresh snapshot and swaps it in.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisSnapshot(Map<String, Value>);

impl AnalysisSnapshot {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Build a snapshot from an arbitrary JSON value. Only objects qualify.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume the snapshot, returning a copy that records `critique` as its
    /// `refinement_critique`.
    pub fn with_critique(mut self, critique: &str) -> Self {
        self.0.insert(
            REFINEMENT_CRITIQUE_FIELD.to_string(),
            Value::String(critique.to_string()),
        );
        self
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

/// What kind of evidence the critic asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    ReadFile,
    SearchCode,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::ReadFile => "read_file",
            RequestKind::SearchCode => "search_code",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "read_file" => Some(RequestKind::ReadFile),
            "search_code" => Some(RequestKind::SearchCode),
            _ => None,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One piece of external evidence requested by the critic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRequest {
    #[serde(rename = "type")]
    pub kind: RequestKind,
    /// File path for `ReadFile`, query string for `SearchCode`
    pub target: String,
}

impl DataRequest {
    pub fn read_file(target: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::ReadFile,
            target: target.into(),
        }
    }

    pub fn search_code(target: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::SearchCode,
            target: target.into(),
        }
    }
}

/// Outcome of a single fetch. Serializes as either a `content` or an `error` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOutcome {
    Content(String),
    Error(String),
}

/// A fetched piece of evidence, ready to be folded into the context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedArtifact {
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub target: String,
    #[serde(flatten)]
    pub outcome: FetchOutcome,
}

impl FetchedArtifact {
    pub fn content(request: &DataRequest, content: impl Into<String>) -> Self {
        Self {
            kind: request.kind,
            target: request.target.clone(),
            outcome: FetchOutcome::Content(content.into()),
        }
    }

    pub fn error(request: &DataRequest, error: impl Into<String>) -> Self {
        Self {
            kind: request.kind,
            target: request.target.clone(),
            outcome: FetchOutcome::Error(error.into()),
        }
    }

    pub fn content_text(&self) -> Option<&str> {
        match &self.outcome {
            FetchOutcome::Content(c) => Some(c),
            FetchOutcome::Error(_) => None,
        }
    }

    pub fn error_text(&self) -> Option<&str> {
        match &self.outcome {
            FetchOutcome::Error(e) => Some(e),
            FetchOutcome::Content(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, FetchOutcome::Error(_))
    }
}

/// A single slot in the context store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextEntry {
    /// Evidence fetched during a run
    Artifact(FetchedArtifact),
    /// Anything the caller handed in up front (file listings, crash stats, ...)
    Raw(Value),
}

impl ContextEntry {
    pub fn as_artifact(&self) -> Option<&FetchedArtifact> {
        match self {
            ContextEntry::Artifact(a) => Some(a),
            ContextEntry::Raw(_) => None,
        }
    }
}

/// Everything gathered so far, keyed by target. Last write for a key wins.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextStore {
    entries: BTreeMap<String, ContextEntry>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from a caller-supplied JSON value.
    ///
    /// Objects contribute one raw entry per key; any other value is stored
    /// under `repository_context`.
    pub fn from_value(value: Value) -> Self {
        let mut store = Self::new();
        match value {
            Value::Object(map) => {
                for (key, v) in map {
                    store.insert_raw(key, v);
                }
            }
            Value::Null => {}
            other => store.insert_raw("repository_context", other),
        }
        store
    }

    pub fn insert_raw(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), ContextEntry::Raw(value));
    }

    /// Store an artifact under its target, replacing whatever was there
    pub fn insert_artifact(&mut self, artifact: FetchedArtifact) {
        self.entries
            .insert(artifact.target.clone(), ContextEntry::Artifact(artifact));
    }

    pub fn get(&self, key: &str) -> Option<&ContextEntry> {
        self.entries.get(key)
    }

    pub fn artifact(&self, target: &str) -> Option<&FetchedArtifact> {
        self.entries.get(target).and_then(ContextEntry::as_artifact)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.entries).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Audit record for one round. Never modified after it lands in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-indexed round number
    pub index: usize,
    /// Best snapshot once this round finished
    pub snapshot_after: AnalysisSnapshot,
    pub critique: String,
    pub score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<DataRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_outcome: Option<FetchedArtifact>,
    /// True when the critic call failed for this round
    #[serde(default)]
    pub failed: bool,
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminatedBy {
    /// Score met the threshold with no pending data request
    Converged,
    /// Iteration budget ran out
    Exhausted,
    /// Critic failed (beyond the configured tolerance)
    Failed,
}

/// Returned from `RefinementController::run()`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub final_snapshot: AnalysisSnapshot,
    pub ledger: Vec<IterationRecord>,
    pub terminated_by: TerminatedBy,
    /// Context as it stood when the run ended
    pub context: ContextStore,
}

impl RunResult {
    /// Score of the last recorded round, if any round ran.
    pub fn last_score(&self) -> Option<u8> {
        self.ledger.last().map(|r| r.score)
    }

    pub fn iterations(&self) -> usize {
        self.ledger.len()
    }
}
