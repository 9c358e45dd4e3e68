// Verdict parsing: turn a model reply into a schema-checked Verdict

use serde::Deserialize;
use serde_json::Value;

use super::{SchemaError, Verdict, SCORE_MAX, SCORE_MIN};
use crate::refinement::types::{AnalysisSnapshot, DataRequest, RequestKind};

const DEFAULT_CRITIQUE: &str = "No critique";

/// Raw JSON shape from the model. Every field is optional here so that
/// missing vs. mistyped values can be reported separately.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(default)]
    score: Option<Value>,
    #[serde(default)]
    critique: Option<Value>,
    #[serde(default)]
    data_request: Option<Value>,
    #[serde(default)]
    improved_analysis: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawDataRequest {
    #[serde(rename = "type")]
    kind: String,
    target: String,
}

/// Parse and validate a critic reply.
///
/// The reply may be wrapped in markdown code fences or surrounded by prose;
/// the outermost `{...}` is tried when a direct parse fails.
pub fn parse_verdict(text: &str) -> Result<Verdict, SchemaError> {
    let stripped = strip_markdown_fences(text.trim());

    let raw = match serde_json::from_str::<RawVerdict>(stripped) {
        Ok(raw) => raw,
        Err(direct_err) => {
            let slice = match (stripped.find('{'), stripped.rfind('}')) {
                (Some(start), Some(end)) if start < end => &stripped[start..=end],
                _ => return Err(SchemaError::MalformedJson(direct_err.to_string())),
            };
            serde_json::from_str::<RawVerdict>(slice)
                .map_err(|e| SchemaError::MalformedJson(e.to_string()))?
        }
    };

    validate(raw)
}

fn validate(raw: RawVerdict) -> Result<Verdict, SchemaError> {
    let score = match raw.score {
        None | Some(Value::Null) => return Err(SchemaError::MissingField("score")),
        Some(value) => parse_score(&value)?,
    };

    let critique = match raw.critique {
        None | Some(Value::Null) => DEFAULT_CRITIQUE.to_string(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    };

    let data_request = match raw.data_request {
        None | Some(Value::Null) => None,
        Some(value) => Some(parse_request(value)?),
    };

    let improved_analysis = match raw.improved_analysis {
        None | Some(Value::Null) => None,
        Some(value) => {
            Some(AnalysisSnapshot::from_value(value).ok_or(SchemaError::InvalidImprovedAnalysis)?)
        }
    };

    Ok(Verdict {
        score,
        critique,
        data_request,
        improved_analysis,
    })
}

fn parse_score(value: &Value) -> Result<u8, SchemaError> {
    let n = value
        .as_i64()
        .ok_or_else(|| SchemaError::InvalidScore(value.to_string()))?;
    if n < SCORE_MIN as i64 || n > SCORE_MAX as i64 {
        return Err(SchemaError::ScoreOutOfRange(n));
    }
    Ok(n as u8)
}

fn parse_request(value: Value) -> Result<DataRequest, SchemaError> {
    let raw: RawDataRequest = serde_json::from_value(value)
        .map_err(|e| SchemaError::InvalidDataRequest(e.to_string()))?;

    let kind = RequestKind::parse(raw.kind.trim())
        .ok_or_else(|| SchemaError::InvalidDataRequest(format!("unknown type `{}`", raw.kind)))?;

    let target = raw.target.trim();
    if target.is_empty() {
        return Err(SchemaError::InvalidDataRequest("empty target".to_string()));
    }

    Ok(DataRequest {
        kind,
        target: target.to_string(),
    })
}

/// Strip leading/trailing markdown code fences (```json ... ``` or ``` ... ```)
fn strip_markdown_fences(s: &str) -> &str {
    let s = s.trim();
    let s = if let Some(rest) = s.strip_prefix("```json") {
        rest
    } else if let Some(rest) = s.strip_prefix("```") {
        rest
    } else {
        s
    };
    if let Some(rest) = s.strip_suffix("```") {
        rest.trim()
    } else {
        s.trim()
    }
}
