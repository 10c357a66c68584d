use clap::Subcommand;

use super::classify::ClassifyArgs;
use super::compile::CompileArgs;
use super::config::ConfigArgs;
use super::replay::ReplayArgs;
use super::run::RunArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Execute a plan against a site and compile the resulting trace
    Run(RunArgs),

    /// Compile a saved trace or JSON export into a script and export
    Compile(CompileArgs),

    /// Re-dispatch the successful steps of a JSON export
    Replay(ReplayArgs),

    /// Classify selector expressions by confidence tier
    Classify(ClassifyArgs),

    /// Manage TraceCraft configuration
    Config(ConfigArgs),

    /// Show build and configuration information
    Info,
}
