// Refinement controller: bounded critique/improve loop with on-demand evidence

use std::sync::Arc;
use tracing::Instrument;

use super::ledger::IterationLedger;
use super::types::{
    AnalysisSnapshot, ContextStore, DataRequest, FetchedArtifact, IterationRecord, RunResult,
    TerminatedBy,
};
use crate::config::{ConfigError, RefineConfig};
use crate::critic::{Critic, CriticError, Verdict};
use crate::fetch::DataFetcher;
use crate::persist::IterationWriter;

/// Critique text recorded for a round whose critic call failed
pub const FAILURE_CRITIQUE: &str = "<failure>";

const CRITIQUE_PREVIEW_CHARS: usize = 100;

/// Outcome of the per-round stop check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// Score meets the threshold and nothing more was asked for
    Converged,
    /// The critic wants more evidence; always forces another round
    AwaitingEvidence,
    /// Below threshold, keep going
    Continuing,
}

/// Decide whether a round ends the run.
///
/// A pending data request wins over the score: even a perfect score keeps
/// the loop alive until the evidence has been seen.
pub fn check_convergence(score: u8, has_request: bool, threshold: u8) -> Convergence {
    if has_request {
        Convergence::AwaitingEvidence
    } else if score >= threshold {
        Convergence::Converged
    } else {
        Convergence::Continuing
    }
}

/// Drives critique rounds over one analysis.
///
/// Holds no per-run state, so one controller can serve many runs and several
/// runs can proceed in parallel, each with its own snapshot and context.
pub struct RefinementController {
    critic: Arc<dyn Critic>,
    fetcher: Arc<dyn DataFetcher>,
    config: RefineConfig,
    writer: Option<IterationWriter>,
}

impl RefinementController {
    pub fn new(
        critic: Arc<dyn Critic>,
        fetcher: Arc<dyn DataFetcher>,
        config: RefineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            critic,
            fetcher,
            config,
            writer: None,
        })
    }

    /// Persist every successful round through `writer`
    pub fn with_writer(mut self, writer: IterationWriter) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn config(&self) -> &RefineConfig {
        &self.config
    }

    /// Run up to `max_iterations` rounds starting from `initial`.
    ///
    /// Always returns a result: critic failures end the run as `Failed` with
    /// the best snapshot so far, fetch failures land in the context.
    pub async fn run(
        &self,
        run_id: &str,
        initial: AnalysisSnapshot,
        context: ContextStore,
    ) -> RunResult {
        let span = tracing::info_span!("refine", run_id = %run_id);
        self.run_rounds(run_id, initial, context)
            .instrument(span)
            .await
    }

    async fn run_rounds(
        &self,
        run_id: &str,
        initial: AnalysisSnapshot,
        mut context: ContextStore,
    ) -> RunResult {
        let max = self.config.max_iterations;
        let mut best = initial;
        let mut ledger = IterationLedger::with_capacity(max);
        let mut consecutive_failures = 0usize;

        tracing::info!(
            max_iterations = max,
            threshold = self.config.converge_threshold,
            "Starting refinement"
        );

        for index in 1..=max {
            tracing::info!("Refinement round {}/{}", index, max);

            let verdict = match self.call_critic(&best, &context).await {
                Ok(verdict) => {
                    consecutive_failures = 0;
                    verdict
                }
                Err(e) => {
                    consecutive_failures += 1;
                    tracing::error!(round = index, "Critic failed: {}", e);

                    let record = IterationRecord {
                        index,
                        snapshot_after: best.clone(),
                        critique: FAILURE_CRITIQUE.to_string(),
                        score: ledger.last_score(),
                        request: None,
                        fetch_outcome: None,
                        failed: true,
                    };
                    append(&mut ledger, record);

                    if consecutive_failures >= self.config.failure_tolerance {
                        tracing::warn!(
                            failures = consecutive_failures,
                            "Aborting refinement, keeping best snapshot so far"
                        );
                        return finish(best, ledger, TerminatedBy::Failed, context);
                    }
                    continue;
                }
            };

            let Verdict {
                score,
                critique,
                data_request,
                improved_analysis,
            } = verdict;

            tracing::info!(score, "Critique: {}", preview(&critique));

            if let Some(improved) = improved_analysis {
                best = improved.with_critique(&critique);
            }

            let convergence =
                check_convergence(score, data_request.is_some(), self.config.converge_threshold);

            let fetch_outcome = match &data_request {
                Some(request) => {
                    let artifact = self.call_fetcher(request).await;
                    context.insert_artifact(artifact.clone());
                    tracing::info!(target_path = %request.target, "Added new data to context");
                    Some(artifact)
                }
                None => None,
            };

            let record = IterationRecord {
                index,
                snapshot_after: best.clone(),
                critique,
                score,
                request: data_request,
                fetch_outcome,
                failed: false,
            };
            self.persist(run_id, &record);
            append(&mut ledger, record);

            if convergence == Convergence::Converged {
                tracing::info!(score, round = index, "Analysis meets quality standards");
                return finish(best, ledger, TerminatedBy::Converged, context);
            }
        }

        tracing::info!("Iteration budget exhausted");
        finish(best, ledger, TerminatedBy::Exhausted, context)
    }

    async fn call_critic(
        &self,
        snapshot: &AnalysisSnapshot,
        context: &ContextStore,
    ) -> Result<Verdict, CriticError> {
        let call = self.critic.critique(snapshot, context);
        match self.config.critic_timeout() {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(CriticError::Timeout(limit))),
            None => call.await,
        }
    }

    async fn call_fetcher(&self, request: &DataRequest) -> FetchedArtifact {
        tracing::info!(
            kind = %request.kind,
            target_path = %request.target,
            "Dispatching data request"
        );
        let call = self.fetcher.fetch(request);
        match self.config.fetch_timeout() {
            Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
                tracing::warn!(target_path = %request.target, "Fetch timed out after {:?}", limit);
                FetchedArtifact::error(request, format!("Fetch timed out after {:?}", limit))
            }),
            None => call.await,
        }
    }

    fn persist(&self, run_id: &str, record: &IterationRecord) {
        if let Some(writer) = &self.writer {
            match writer.write(run_id, record) {
                Ok(path) => tracing::info!("Saved round {}: {}", record.index, path.display()),
                Err(e) => tracing::warn!("Failed to save round {}: {:#}", record.index, e),
            }
        }
    }
}

fn append(ledger: &mut IterationLedger, record: IterationRecord) {
    if let Err(rejected) = ledger.append(record) {
        tracing::warn!("Ledger full, dropping record for round {}", rejected.index);
    }
}

fn finish(
    best: AnalysisSnapshot,
    ledger: IterationLedger,
    terminated_by: TerminatedBy,
    context: ContextStore,
) -> RunResult {
    RunResult {
        final_snapshot: best,
        ledger: ledger.into_records(),
        terminated_by,
        context,
    }
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(CRITIQUE_PREVIEW_CHARS).collect();
    if text.chars().count() > CRITIQUE_PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}
