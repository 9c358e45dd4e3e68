// Integration tests for the refinement loop: termination, evidence flow, failure policy

use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bugrefine::config::RefineConfig;
use bugrefine::critic::{Critic, CriticError, SchemaError, Verdict};
use bugrefine::fetch::{DataFetcher, FILE_NOT_FOUND};
use bugrefine::persist::IterationWriter;
use bugrefine::refinement::{
    AnalysisSnapshot, ContextStore, DataRequest, FetchedArtifact, RefinementController,
    TerminatedBy, FAILURE_CRITIQUE,
};

/// Critic that replays a fixed script and records what it was shown
#[derive(Default)]
struct ScriptedCritic {
    script: Mutex<VecDeque<Result<Verdict, CriticError>>>,
    seen: Mutex<Vec<(AnalysisSnapshot, ContextStore)>>,
}

impl ScriptedCritic {
    fn new(script: Vec<Result<Verdict, CriticError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    fn seen(&self, call: usize) -> (AnalysisSnapshot, ContextStore) {
        self.seen.lock().unwrap()[call].clone()
    }
}

#[async_trait]
impl Critic for ScriptedCritic {
    async fn critique(
        &self,
        snapshot: &AnalysisSnapshot,
        context: &ContextStore,
    ) -> Result<Verdict, CriticError> {
        self.seen
            .lock()
            .unwrap()
            .push((snapshot.clone(), context.clone()));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CriticError::Generator("script exhausted".to_string())))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Fetcher serving fixed file contents; everything else is an error artifact
#[derive(Default)]
struct MapFetcher {
    files: HashMap<String, String>,
    calls: AtomicUsize,
}

impl MapFetcher {
    fn with_file(path: &str, content: &str) -> Arc<Self> {
        let mut files = HashMap::new();
        files.insert(path.to_string(), content.to_string());
        Arc::new(Self {
            files,
            calls: AtomicUsize::new(0),
        })
    }

    fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl DataFetcher for MapFetcher {
    async fn fetch(&self, request: &DataRequest) -> FetchedArtifact {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.files.get(&request.target) {
            Some(content) => FetchedArtifact::content(request, content.clone()),
            None => FetchedArtifact::error(request, FILE_NOT_FOUND),
        }
    }
}

fn snapshot(value: serde_json::Value) -> AnalysisSnapshot {
    AnalysisSnapshot::from_value(value).unwrap()
}

fn initial() -> AnalysisSnapshot {
    snapshot(json!({"summary": "Crash in nsFrame::Destroy", "version": 0}))
}

fn improved(version: u64) -> AnalysisSnapshot {
    snapshot(json!({"summary": "Crash in nsFrame::Destroy", "version": version}))
}

fn config(max_iterations: usize) -> RefineConfig {
    RefineConfig {
        max_iterations,
        ..Default::default()
    }
}

fn controller(
    critic: Arc<ScriptedCritic>,
    fetcher: Arc<MapFetcher>,
    config: RefineConfig,
) -> RefinementController {
    RefinementController::new(critic, fetcher, config).unwrap()
}

#[tokio::test]
async fn test_converges_on_third_round() {
    let critic = ScriptedCritic::new(vec![
        Ok(Verdict::new(5, "thin").with_improvement(improved(1))),
        Ok(Verdict::new(7, "better").with_improvement(improved(2))),
        Ok(Verdict::new(9, "ready").with_improvement(improved(3))),
        Ok(Verdict::new(10, "never reached")),
    ]);
    let result = controller(critic.clone(), MapFetcher::empty(), config(5))
        .run("bug_1", initial(), ContextStore::new())
        .await;

    assert_eq!(result.terminated_by, TerminatedBy::Converged);
    assert_eq!(result.ledger.len(), 3);
    assert_eq!(critic.calls(), 3);
    assert_eq!(result.final_snapshot.get("version"), Some(&json!(3)));
    assert_eq!(
        result.final_snapshot.get("refinement_critique"),
        Some(&json!("ready"))
    );
    let scores: Vec<u8> = result.ledger.iter().map(|r| r.score).collect();
    assert_eq!(scores, vec![5, 7, 9]);
}

#[tokio::test]
async fn test_data_request_blocks_convergence_at_max_score() {
    let critic = ScriptedCritic::new(vec![
        Ok(Verdict::new(10, "need the source")
            .with_request(DataRequest::read_file("layout/generic/nsFrame.cpp"))),
        Ok(Verdict::new(10, "confirmed")),
    ]);
    let fetcher = MapFetcher::with_file("layout/generic/nsFrame.cpp", "void nsFrame::Destroy() {}");
    let result = controller(critic.clone(), fetcher.clone(), config(3))
        .run("bug_2", initial(), ContextStore::new())
        .await;

    assert_eq!(result.terminated_by, TerminatedBy::Converged);
    assert_eq!(result.ledger.len(), 2);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

    // round 2 saw the evidence fetched in round 1
    let (_, context) = critic.seen(1);
    assert_eq!(
        context
            .artifact("layout/generic/nsFrame.cpp")
            .and_then(|a| a.content_text()),
        Some("void nsFrame::Destroy() {}")
    );
    assert!(result.ledger[0].fetch_outcome.is_some());
}

#[tokio::test]
async fn test_zero_iterations_is_noop() {
    let critic = ScriptedCritic::new(vec![Ok(Verdict::new(10, "unused"))]);
    let result = controller(critic.clone(), MapFetcher::empty(), config(0))
        .run("bug_3", initial(), ContextStore::new())
        .await;

    assert_eq!(result.terminated_by, TerminatedBy::Exhausted);
    assert_eq!(result.final_snapshot, initial());
    assert!(result.ledger.is_empty());
    assert_eq!(critic.calls(), 0);
}

#[tokio::test]
async fn test_ledger_never_exceeds_budget() {
    for max in 0..5 {
        let script = (0..10)
            .map(|_| Ok(Verdict::new(3, "more").with_request(DataRequest::search_code("nsINode"))))
            .collect();
        let critic = ScriptedCritic::new(script);
        let result = controller(critic, MapFetcher::empty(), config(max))
            .run("bug_4", initial(), ContextStore::new())
            .await;

        assert_eq!(result.ledger.len(), max);
        assert_eq!(result.terminated_by, TerminatedBy::Exhausted);
    }
}

#[tokio::test]
async fn test_failed_fetch_lands_in_context() {
    let critic = ScriptedCritic::new(vec![
        Ok(Verdict::new(6, "check the file").with_request(DataRequest::read_file("gone.cpp"))),
        Ok(Verdict::new(6, "still unsure")),
        Ok(Verdict::new(7, "ok")),
    ]);
    let result = controller(critic.clone(), MapFetcher::empty(), config(3))
        .run("bug_5", initial(), ContextStore::new())
        .await;

    assert_eq!(result.terminated_by, TerminatedBy::Exhausted);
    assert_eq!(critic.calls(), 3);
    let artifact = result.context.artifact("gone.cpp").unwrap();
    assert_eq!(artifact.error_text(), Some(FILE_NOT_FOUND));
}

#[tokio::test]
async fn test_critic_failure_keeps_last_good_snapshot() {
    let critic = ScriptedCritic::new(vec![
        Ok(Verdict::new(6, "first pass").with_improvement(improved(1))),
        Err(CriticError::Schema(SchemaError::MissingField("score"))),
        Ok(Verdict::new(9, "never reached").with_improvement(improved(3))),
    ]);
    let result = controller(critic.clone(), MapFetcher::empty(), config(3))
        .run("bug_6", initial(), ContextStore::new())
        .await;

    assert_eq!(result.terminated_by, TerminatedBy::Failed);
    assert_eq!(critic.calls(), 2);
    assert_eq!(result.final_snapshot, improved(1).with_critique("first pass"));

    assert_eq!(result.ledger.len(), 2);
    let failed = &result.ledger[1];
    assert!(failed.failed);
    assert_eq!(failed.critique, FAILURE_CRITIQUE);
    assert_eq!(failed.score, 6);
    assert!(failed.request.is_none());
}

#[tokio::test]
async fn test_failure_on_first_round_scores_zero() {
    let critic = ScriptedCritic::new(vec![Err(CriticError::Generator("down".to_string()))]);
    let result = controller(critic, MapFetcher::empty(), config(3))
        .run("bug_7", initial(), ContextStore::new())
        .await;

    assert_eq!(result.terminated_by, TerminatedBy::Failed);
    assert_eq!(result.final_snapshot, initial());
    assert_eq!(result.ledger[0].score, 0);
}

#[tokio::test]
async fn test_failure_tolerance_counts_consecutive_failures() {
    let critic = ScriptedCritic::new(vec![
        Err(CriticError::Generator("blip".to_string())),
        Ok(Verdict::new(5, "recovered").with_improvement(improved(2))),
        Err(CriticError::Generator("blip".to_string())),
        Err(CriticError::Generator("blip".to_string())),
        Ok(Verdict::new(9, "never reached")),
    ]);
    let cfg = RefineConfig {
        max_iterations: 5,
        failure_tolerance: 2,
        ..Default::default()
    };
    let result = controller(critic.clone(), MapFetcher::empty(), cfg)
        .run("bug_8", initial(), ContextStore::new())
        .await;

    assert_eq!(result.terminated_by, TerminatedBy::Failed);
    assert_eq!(critic.calls(), 4);
    assert_eq!(result.ledger.len(), 4);
    assert_eq!(result.final_snapshot.get("version"), Some(&json!(2)));
}

#[tokio::test]
async fn test_round_without_improvement_keeps_snapshot() {
    let critic = ScriptedCritic::new(vec![
        Ok(Verdict::new(4, "no changes proposed")),
        Ok(Verdict::new(5, "still nothing")),
    ]);
    let result = controller(critic.clone(), MapFetcher::empty(), config(2))
        .run("bug_9", initial(), ContextStore::new())
        .await;

    assert_eq!(result.final_snapshot, initial());
    assert_eq!(result.ledger.len(), 2);
    assert_eq!(critic.seen(1).0, initial());
}

#[tokio::test]
async fn test_initial_context_reaches_critic() {
    let critic = ScriptedCritic::new(vec![Ok(Verdict::new(9, "fine"))]);
    let context = ContextStore::from_value(json!({"file_tree": ["dom/", "layout/"]}));
    controller(critic.clone(), MapFetcher::empty(), config(3))
        .run("bug_10", initial(), context.clone())
        .await;

    assert_eq!(critic.seen(0).1, context);
}

#[tokio::test]
async fn test_invalid_config_rejected_before_running() {
    let critic = ScriptedCritic::new(vec![]);
    let cfg = RefineConfig {
        converge_threshold: 0,
        ..Default::default()
    };
    assert!(RefinementController::new(critic.clone(), MapFetcher::empty(), cfg).is_err());
    assert_eq!(critic.calls(), 0);
}

/// Critic that never answers
struct HangingCritic;

#[async_trait]
impl Critic for HangingCritic {
    async fn critique(
        &self,
        _snapshot: &AnalysisSnapshot,
        _context: &ContextStore,
    ) -> Result<Verdict, CriticError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Verdict::new(10, "too late"))
    }

    fn name(&self) -> &str {
        "hanging"
    }
}

#[tokio::test(start_paused = true)]
async fn test_critic_timeout_is_a_failure() {
    let cfg = RefineConfig {
        critic_timeout_secs: Some(30),
        ..Default::default()
    };
    let controller =
        RefinementController::new(Arc::new(HangingCritic), MapFetcher::empty(), cfg).unwrap();
    let result = controller
        .run("bug_11", initial(), ContextStore::new())
        .await;

    assert_eq!(result.terminated_by, TerminatedBy::Failed);
    assert_eq!(result.ledger.len(), 1);
    assert_eq!(result.final_snapshot, initial());
}

/// Fetcher that never answers
struct HangingFetcher;

#[async_trait]
impl DataFetcher for HangingFetcher {
    async fn fetch(&self, request: &DataRequest) -> FetchedArtifact {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        FetchedArtifact::content(request, "too late")
    }
}

#[tokio::test(start_paused = true)]
async fn test_fetch_timeout_becomes_error_artifact() {
    let critic = ScriptedCritic::new(vec![
        Ok(Verdict::new(8, "need it").with_request(DataRequest::search_code("nsINode"))),
        Ok(Verdict::new(9, "fine without it")),
    ]);
    let cfg = RefineConfig {
        fetch_timeout_secs: Some(10),
        ..Default::default()
    };
    let controller = RefinementController::new(critic, Arc::new(HangingFetcher), cfg).unwrap();
    let result = controller
        .run("bug_12", initial(), ContextStore::new())
        .await;

    assert_eq!(result.terminated_by, TerminatedBy::Converged);
    let artifact = result.context.artifact("nsINode").unwrap();
    assert!(artifact.error_text().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_successful_rounds_are_persisted() {
    let dir = tempfile::TempDir::new().unwrap();
    let critic = ScriptedCritic::new(vec![
        Ok(Verdict::new(5, "first").with_improvement(improved(1))),
        Err(CriticError::Generator("down".to_string())),
        Ok(Verdict::new(9, "done")),
    ]);
    let cfg = RefineConfig {
        failure_tolerance: 2,
        ..Default::default()
    };
    let writer = IterationWriter::new(dir.path().to_path_buf()).unwrap();
    let result = controller(critic, MapFetcher::empty(), cfg)
        .with_writer(writer.clone())
        .run("bug_13", initial(), ContextStore::new())
        .await;

    assert_eq!(result.terminated_by, TerminatedBy::Converged);
    assert!(writer.path_for("bug_13", 1).exists());
    assert!(!writer.path_for("bug_13", 2).exists());
    assert!(writer.path_for("bug_13", 3).exists());
}

/// Critic whose verdict depends only on the snapshot, so concurrent runs
/// can share it
struct LadderCritic;

#[async_trait]
impl Critic for LadderCritic {
    async fn critique(
        &self,
        snapshot: &AnalysisSnapshot,
        _context: &ContextStore,
    ) -> Result<Verdict, CriticError> {
        let level = snapshot.get("level").and_then(|v| v.as_u64()).unwrap_or(0);
        let next = (level + 1).min(10);
        tokio::task::yield_now().await;
        Ok(Verdict::new(next as u8, format!("level {}", next))
            .with_improvement(snapshot_level(next)))
    }

    fn name(&self) -> &str {
        "ladder"
    }
}

fn snapshot_level(level: u64) -> AnalysisSnapshot {
    AnalysisSnapshot::from_value(json!({"level": level})).unwrap()
}

#[tokio::test]
async fn test_parallel_runs_are_independent() {
    let controller = RefinementController::new(
        Arc::new(LadderCritic),
        MapFetcher::empty(),
        config(10),
    )
    .unwrap();

    let (low, high) = tokio::join!(
        controller.run("bug_low", snapshot_level(2), ContextStore::new()),
        controller.run("bug_high", snapshot_level(7), ContextStore::new()),
    );

    assert_eq!(low.terminated_by, TerminatedBy::Converged);
    assert_eq!(low.ledger.len(), 7);
    assert_eq!(high.terminated_by, TerminatedBy::Converged);
    assert_eq!(high.ledger.len(), 2);
    assert_eq!(low.final_snapshot.get("level"), Some(&json!(9)));
    assert_eq!(high.final_snapshot.get("level"), Some(&json!(9)));
}
