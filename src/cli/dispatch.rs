use super::classify::cmd_classify;
use super::compile::cmd_compile;
use super::config::cmd_config;
use super::env::CliArgs;
use super::info::cmd_info;
use super::replay::cmd_replay;
use super::run::cmd_run;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Run(args) => cmd_run(args, ctx).await,
        Commands::Compile(args) => cmd_compile(args, ctx).await,
        Commands::Replay(args) => cmd_replay(args, ctx).await,
        Commands::Classify(args) => cmd_classify(args, ctx),
        Commands::Config(args) => cmd_config(args, ctx).await,
        Commands::Info => cmd_info(ctx),
    }
}
