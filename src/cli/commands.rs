// Command handling: wires config, critic, fetcher and controller together

use anyhow::{Context, Result};
use std::fs;
use std::sync::Arc;

use super::RefineArgs;
use crate::claude::ClaudeClient;
use crate::config::{Config, SourcesConfig};
use crate::critic::{Critic, LlmCritic};
use crate::fetch::{DataFetcher, ProviderFetcher};
use crate::generators::ClaudeGenerator;
use crate::persist::{write_run_result, IterationWriter};
use crate::refinement::{
    AnalysisSnapshot, ContextStore, DataRequest, RefinementController, RequestKind, RunResult,
};

/// Fold command-line flags into the loaded config
pub fn apply_overrides(config: &mut Config, args: &RefineArgs) {
    if let Some(n) = args.max_iterations {
        config.refinement.max_iterations = n;
    }
    if let Some(t) = args.threshold {
        config.refinement.converge_threshold = t;
    }
    if let Some(dir) = &args.persist_dir {
        config.refinement.persist_dir = Some(dir.clone());
    }
    if let Some(root) = &args.repo_root {
        config.sources = SourcesConfig::Local { root: root.clone() };
    }
}

fn build_critic(config: &Config) -> Result<Arc<dyn Critic>> {
    let api_key = config.critic.api_key.clone().context(
        "No critic API key configured. Set ANTHROPIC_API_KEY or [critic].api_key in the config file",
    )?;
    let client = match &config.critic.api_url {
        Some(url) => ClaudeClient::with_endpoint(api_key, url.clone())?,
        None => ClaudeClient::new(api_key)?,
    };
    let generator = ClaudeGenerator::new(
        Arc::new(client),
        config.critic.model.clone(),
        config.critic.max_tokens,
    );
    Ok(Arc::new(LlmCritic::new(Arc::new(generator))))
}

fn build_fetcher(config: &Config) -> Result<Arc<dyn DataFetcher>> {
    Ok(Arc::new(ProviderFetcher::from_config(
        &config.sources,
        &config.refinement,
    )?))
}

/// Controller for `config`, with a Claude-backed critic
pub fn build_controller(config: &Config) -> Result<RefinementController> {
    let controller = RefinementController::new(
        build_critic(config)?,
        build_fetcher(config)?,
        config.refinement.clone(),
    )?;

    match &config.refinement.persist_dir {
        Some(dir) => Ok(controller.with_writer(IterationWriter::new(dir.clone())?)),
        None => Ok(controller),
    }
}

fn read_json(path: &std::path::Path) -> Result<serde_json::Value> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// `bugrefine refine`
pub async fn run_refine(mut config: Config, args: RefineArgs) -> Result<RunResult> {
    apply_overrides(&mut config, &args);
    config.validate().context("Configuration validation failed")?;

    let initial = AnalysisSnapshot::from_value(read_json(&args.analysis)?)
        .with_context(|| format!("{} is not a JSON object", args.analysis.display()))?;
    let context = match &args.context {
        Some(path) => ContextStore::from_value(read_json(path)?),
        None => ContextStore::new(),
    };
    let run_id = args
        .run_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let controller = build_controller(&config)?;
    let result = controller.run(&run_id, initial, context).await;

    tracing::info!(
        run_id = %run_id,
        terminated_by = ?result.terminated_by,
        rounds = result.iterations(),
        last_score = ?result.last_score(),
        "Refinement finished"
    );

    match &args.output {
        Some(path) => write_run_result(path, &result)?,
        None => println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialize run result")?
        ),
    }

    Ok(result)
}

/// `bugrefine fetch`
pub async fn run_fetch(config: Config, kind: RequestKind, target: String) -> Result<()> {
    let fetcher = build_fetcher(&config)?;
    let request = DataRequest { kind, target };
    let artifact = fetcher.fetch(&request).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&artifact).context("Failed to serialize artifact")?
    );
    Ok(())
}
