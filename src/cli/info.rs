use action_flow::RetryPolicy;
use action_primitives::FixtureBrowser;
use anyhow::Result;
use serde::Serialize;

use crate::cli::context::CliContext;
use crate::config;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SystemInfo {
    version: &'static str,
    build_date: &'static str,
    git_commit: &'static str,
    git_branch: &'static str,
    config_path: String,
    config_file_present: bool,
    output_dir: String,
    max_attempts: u32,
    backoff_schedule_ms: Vec<u64>,
    default_step_timeout_ms: u64,
    max_candidates: usize,
    fixture: Option<FixtureInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FixtureInfo {
    path: String,
    loadable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn cmd_info(ctx: &CliContext) -> Result<()> {
    let config = ctx.config();
    let policy = config.retry_policy();
    let fixture = config.fixture.as_ref().map(|path| {
        let error = FixtureBrowser::from_path(path).err().map(|err| err.to_string());
        FixtureInfo {
            path: path.display().to_string(),
            loadable: error.is_none(),
            error,
        }
    });
    let info = SystemInfo {
        version: env!("CARGO_PKG_VERSION"),
        build_date: option_env!("BUILD_DATE").unwrap_or("unknown"),
        git_commit: option_env!("GIT_HASH").unwrap_or("unknown"),
        git_branch: option_env!("GIT_BRANCH").unwrap_or("unknown"),
        config_path: ctx.config_path().display().to_string(),
        config_file_present: ctx.config_path().exists(),
        output_dir: config.output_dir.display().to_string(),
        max_attempts: policy.max_attempts,
        backoff_schedule_ms: backoff_schedule(&policy),
        default_step_timeout_ms: config.default_step_timeout_ms,
        max_candidates: config.max_candidates,
        fixture,
    };

    ctx.output().emit(&info, || {
        println!("TraceCraft System Information");
        println!("=============================");
        println!("Version: {}", info.version);
        println!("Build Date: {}", info.build_date);
        println!("Git Commit: {} ({})", info.git_commit, info.git_branch);
        println!();

        println!("Configuration:");
        println!(
            "- Config File: {}{}",
            info.config_path,
            if info.config_file_present { "" } else { " (not found, defaults)" }
        );
        println!("- Output Directory: {}", info.output_dir);
        println!(
            "- Retry: {} attempts, backoff {:?} ms",
            info.max_attempts, info.backoff_schedule_ms
        );
        println!("- Step Timeout: {} ms", info.default_step_timeout_ms);
        println!("- Max Candidates: {}", info.max_candidates);
        match &info.fixture {
            Some(fixture) if fixture.loadable => println!("- Fixture: {} ✓", fixture.path),
            Some(fixture) => println!(
                "- Fixture: {} ✗ ({})",
                fixture.path,
                fixture.error.as_deref().unwrap_or("unreadable")
            ),
            None => println!("- Fixture: (none)"),
        }
        println!();
        println!(
            "Environment overrides: {}, {}, {}, {}",
            config::ENV_OUTPUT_DIR,
            config::ENV_MAX_ATTEMPTS,
            config::ENV_BACKOFF_MS,
            config::ENV_STEP_TIMEOUT_MS
        );
    })
}

/// Sleeps between consecutive attempts; none follows the last one.
fn backoff_schedule(policy: &RetryPolicy) -> Vec<u64> {
    (1..policy.max_attempts)
        .map(|attempt| policy.backoff(attempt).as_millis() as u64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_doubles_and_stops_before_last_attempt() {
        assert_eq!(backoff_schedule(&RetryPolicy::default()), vec![1000, 2000]);
        assert!(backoff_schedule(&RetryPolicy::new(1, 1000)).is_empty());
    }
}
