use action_locator::{classify, strategy_kind_of, ConfidenceTier, StrategyKind};
use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::cli::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct ClassifyArgs {
    /// Selector expressions to classify
    #[arg(required = true)]
    pub selectors: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassifiedSelector {
    expression: String,
    strategy_kind: StrategyKind,
    confidence_tier: ConfidenceTier,
    ambiguity_risk: bool,
}

pub fn cmd_classify(args: ClassifyArgs, ctx: &CliContext) -> Result<()> {
    let rows: Vec<ClassifiedSelector> = args
        .selectors
        .into_iter()
        .map(|expression| {
            let classification = classify(&expression);
            ClassifiedSelector {
                strategy_kind: strategy_kind_of(&expression),
                confidence_tier: classification.tier,
                ambiguity_risk: classification.ambiguity_risk,
                expression,
            }
        })
        .collect();

    ctx.output().emit(&rows, || {
        for row in &rows {
            println!(
                "{:<8} {:<13} {}{}",
                row.confidence_tier.as_str(),
                row.strategy_kind.name(),
                row.expression,
                if row.ambiguity_risk { "  (may match several elements)" } else { "" }
            );
        }
    })
}
