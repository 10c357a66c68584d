use std::path::PathBuf;
use std::sync::Arc;

use action_primitives::FixtureBrowser;
use anyhow::{bail, Context, Result};
use clap::Args;
use tokio::fs;
use trace_compiler::TraceExport;

use crate::cli::context::CliContext;
use crate::replay::{parse_overrides, ReplayReport, TraceReplayer};

#[derive(Args, Clone, Debug)]
pub struct ReplayArgs {
    /// JSON export produced by `run` or `compile`
    pub export: PathBuf,

    /// Site fixture to replay against
    #[arg(short, long, value_name = "FILE")]
    pub fixture: Option<PathBuf>,

    /// Placeholder values substituted for {{key}} in step arguments (key=value)
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Stop on first error
    #[arg(long)]
    pub fail_fast: bool,
}

pub async fn cmd_replay(args: ReplayArgs, ctx: &CliContext) -> Result<()> {
    let raw = fs::read_to_string(&args.export)
        .await
        .with_context(|| format!("reading {}", args.export.display()))?;
    let export: TraceExport = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", args.export.display()))?;
    let fixture = args
        .fixture
        .clone()
        .or_else(|| ctx.config().fixture.clone())
        .context("no site fixture given; pass --fixture or set `fixture` in the configuration")?;
    let browser = FixtureBrowser::from_path(&fixture)
        .with_context(|| format!("loading fixture {}", fixture.display()))?;

    let replayer = TraceReplayer::new(Arc::new(browser))
        .with_overrides(parse_overrides(&args.params)?)
        .with_fail_fast(args.fail_fast);
    let report = replayer.replay(&export).await?;

    ctx.output().emit(&report, || print_human(&report))?;
    if !report.success {
        bail!("replay failed on {} step(s)", report.failures());
    }
    Ok(())
}

fn print_human(report: &ReplayReport) {
    for step in &report.replayed {
        match &step.error {
            None => println!("{:>3}. {} ok ({} ms)", step.index, step.tool, step.duration_ms),
            Some(err) => println!("{:>3}. {} FAILED: {}", step.index, step.tool, err),
        }
    }
    if !report.not_replayable.is_empty() {
        let indexes: Vec<String> = report.not_replayable.iter().map(usize::to_string).collect();
        println!("Not replayable: {}", indexes.join(", "));
    }
    if let Some(index) = report.stopped_at {
        println!("Stopped at step {index}");
    }
    println!(
        "Replayed {} step(s), {} failure(s)",
        report.replayed.len(),
        report.failures()
    );
}
