pub mod app;
pub mod classify;
pub mod commands;
pub mod compile;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod info;
pub mod output;
pub mod replay;
pub mod run;
pub mod runtime;

pub use app::run as run_cli;
pub use env::CliArgs;
