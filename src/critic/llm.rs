// LLM-backed critic: reviews an analysis against the AI-ready-issue checklist

use async_trait::async_trait;
use std::sync::Arc;

use super::{parse_verdict, Critic, CriticError, Verdict};
use crate::claude::Message;
use crate::generators::Generator;
use crate::refinement::types::{AnalysisSnapshot, ContextStore};

/// Checklist the reviewer scores against.
pub const REVIEW_CHECKLIST: &str = "\
CHECKS FOR AI-READY ISSUES:
1. Problem Definition: Is the problem statement clear? Are logs/screenshots included? Is the task scoped? Root cause identified?
2. Technical Context: Are relevant files/modules identified? Is a solution direction proposed? Is the component localized?
3. Acceptance: Is validation guidance provided?
4. Risk: Are side effects or backward compatibility risks considered?
5. Traceability: Is the information self-contained?";

/// Critic that asks a `Generator` for a JSON verdict.
pub struct LlmCritic {
    generator: Arc<dyn Generator>,
}

impl LlmCritic {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    fn build_prompt(snapshot: &AnalysisSnapshot, context: &ContextStore) -> String {
        format!(
            "You are a senior developer reviewing a bug analysis for an AI agent.\n\n\
             CHECKLIST:\n{checklist}\n\n\
             CURRENT ANALYSIS:\n{analysis}\n\n\
             REPOSITORY CONTEXT:\n{context}\n\n\
             Task:\n\
             1. Critique the \"CURRENT ANALYSIS\" based on the checklist.\n\
             2. Score it from 1-10.\n\
             3. Do you need more specific data? (read a file, search for usage/definitions). \
             Ask for at most one thing.\n\
             4. Generate an IMPROVED analysis.\n\n\
             Return JSON only, no markdown fences:\n\
             {{\n  \
               \"score\": 8,\n  \
               \"critique\": \"...\",\n  \
               \"data_request\": {{\"type\": \"read_file\", \"target\": \"path/to/file.cpp\"}} \
             OR {{\"type\": \"search_code\", \"target\": \"ClassName\"}} OR null,\n  \
               \"improved_analysis\": {{ ... }}\n\
             }}",
            checklist = REVIEW_CHECKLIST,
            analysis = snapshot.to_pretty_json(),
            context = context.to_pretty_json(),
        )
    }
}

#[async_trait]
impl Critic for LlmCritic {
    async fn critique(
        &self,
        snapshot: &AnalysisSnapshot,
        context: &ContextStore,
    ) -> Result<Verdict, CriticError> {
        let prompt = Self::build_prompt(snapshot, context);

        let response = self
            .generator
            .generate(vec![Message::user(prompt)])
            .await
            .map_err(|e| CriticError::Generator(format!("{:#}", e)))?;

        tracing::debug!(
            generator = self.generator.name(),
            chars = response.text.len(),
            "Critic reply received"
        );

        Ok(parse_verdict(&response.text)?)
    }

    fn name(&self) -> &str {
        self.generator.name()
    }
}
