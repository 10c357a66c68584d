use std::path::PathBuf;
use std::sync::Arc;

use action_flow::{CancellationToken, ExecutionTrace, RunOrchestrator};
use action_primitives::FixtureBrowser;
use agent_core::StaticPlanner;
use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::{info, warn};
use trace_compiler::compile;

use super::compile::{write_artifacts, WrittenArtifacts};
use crate::cli::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Plan file (JSON, or YAML with a .yaml/.yml extension)
    pub plan: PathBuf,

    /// Instruction the plan answers; recorded in the trace
    #[arg(short, long)]
    pub instruction: Option<String>,

    /// Site fixture the run is executed against
    #[arg(short, long, value_name = "FILE")]
    pub fixture: Option<PathBuf>,

    /// Output directory (overrides configuration)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Exit with an error unless every step succeeded
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunSummary<'a> {
    run_id: String,
    status: String,
    succeeded: usize,
    failed: usize,
    skipped: usize,
    artifacts: &'a WrittenArtifacts,
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext) -> Result<()> {
    let config = ctx.config();
    let fixture = args
        .fixture
        .clone()
        .or_else(|| config.fixture.clone())
        .context("no site fixture given; pass --fixture or set `fixture` in the configuration")?;
    let browser = FixtureBrowser::from_path(&fixture)
        .with_context(|| format!("loading fixture {}", fixture.display()))?;
    let planner = StaticPlanner::from_path(&args.plan)
        .with_context(|| format!("loading plan {}", args.plan.display()))?;
    let instruction = args
        .instruction
        .clone()
        .unwrap_or_else(|| default_instruction(&planner, &args.plan));

    let orchestrator = RunOrchestrator::new(Arc::new(browser))
        .with_resolver(Arc::new(config.locator_resolver()))
        .with_executor(Arc::new(config.step_executor()));

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; stopping after the current step");
                cancel.cancel();
            }
        })
    };
    let outcome = orchestrator
        .run_instruction(&planner, &instruction, &cancel)
        .await;
    ctrl_c.abort();
    let trace = outcome?;

    let artifact = compile(&trace)?;
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.output_dir.clone())
        .join(trace.run_id().to_string());
    let written = write_artifacts(&output_dir, Some(&trace), &artifact).await?;
    info!(run = %trace.run_id(), status = %trace.status(), "run finished");

    let summary = RunSummary {
        run_id: trace.run_id().to_string(),
        status: trace.status().to_string(),
        succeeded: trace.succeeded_count(),
        failed: trace.failed_count(),
        skipped: trace.skipped_count(),
        artifacts: &written,
    };
    ctx.output().emit(&summary, || print_human(&trace, &written))?;

    if args.strict && !trace.is_success() {
        bail!("run {} did not succeed ({})", trace.run_id(), trace.status());
    }
    Ok(())
}

fn default_instruction(planner: &StaticPlanner, plan_path: &std::path::Path) -> String {
    let reasoning = planner.plan().reasoning.trim();
    if reasoning.is_empty() {
        format!("run {}", plan_path.display())
    } else {
        reasoning.to_string()
    }
}

fn print_human(trace: &ExecutionTrace, written: &WrittenArtifacts) {
    println!("Run {} finished: {}", trace.run_id(), trace.status());
    for (position, result) in trace.results().iter().enumerate() {
        let selector = result
            .chosen_candidate
            .as_ref()
            .map(|candidate| format!(" via {}", candidate.expression))
            .unwrap_or_default();
        let error = result
            .error
            .as_ref()
            .map(|err| format!(" ({err})"))
            .unwrap_or_default();
        println!(
            "{:>3}. [{}] {}{}{}",
            position + 1,
            result.status.as_str(),
            result.step.describe(),
            selector,
            error
        );
    }
    println!(
        "Succeeded: {}  Failed: {}  Skipped: {}",
        trace.succeeded_count(),
        trace.failed_count(),
        trace.skipped_count()
    );
    if let Some(path) = &written.trace {
        println!("- trace: {}", path.display());
    }
    println!("- script: {}", written.script.display());
    println!("- export: {}", written.export.display());
}
