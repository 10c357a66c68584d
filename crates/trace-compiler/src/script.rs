//! Playwright script generation.
//!
//! Only steps that succeeded with a usable selector become executable
//! statements. Everything else (unresolved targets, failed page steps,
//! skipped steps, selectors that no longer classify as safe) is written as a
//! comment so the script always parses and never acts on a guess.

use std::fmt::Write as _;

use action_flow::{ExecutionTrace, StepResult, StepStatus};
use action_locator::{classify, ConfidenceTier};
use action_primitives::{ToolCall, ToolOutput};
use agent_core::{AssertionType, PlanStep, StepType, WaitCondition};

use crate::locators::{js_string, LocatorTable};

const INDENT: &str = "    ";

/// Which optional preamble pieces the body needs.
#[derive(Debug, Default)]
struct Usage {
    assert: bool,
    results: bool,
}

/// Render the whole script for `trace`.
pub fn render_script(trace: &ExecutionTrace) -> String {
    let mut table = LocatorTable::new();
    let mut usage = Usage::default();
    let bodies: Vec<Vec<String>> = trace
        .results()
        .iter()
        .map(|result| render_step(result, &mut table, &mut usage))
        .collect();

    let mut out = String::new();
    let _ = writeln!(out, "// Generated by tracecraft. Recompile from the trace export instead of editing.");
    let _ = writeln!(out, "// Run: {}", trace.run_id());
    let _ = writeln!(out, "// Instruction: {}", single_line(trace.instruction()));
    let _ = writeln!(out, "// Recorded: {}", trace.timestamp().to_rfc3339());
    let _ = writeln!(
        out,
        "// Status: {} ({} succeeded, {} failed, {} skipped)",
        trace.status(),
        trace.succeeded_count(),
        trace.failed_count(),
        trace.skipped_count()
    );
    out.push('\n');
    out.push_str("'use strict';\n\n");
    if usage.assert {
        out.push_str("const assert = require('node:assert/strict');\n");
    }
    out.push_str("const { chromium } = require('playwright');\n\n");
    out.push_str("(async () => {\n");
    let _ = writeln!(out, "{INDENT}const browser = await chromium.launch();");
    let _ = writeln!(out, "{INDENT}const page = await browser.newPage();");
    if usage.results {
        let _ = writeln!(out, "{INDENT}const results = {{}};");
    }

    if !table.is_empty() {
        out.push('\n');
        let _ = writeln!(out, "{INDENT}// Locators");
        for constant in table.constants() {
            let _ = writeln!(
                out,
                "{INDENT}const {} = {}; // {} [{}, {}]",
                constant.name,
                constant.code,
                single_line(&constant.expression),
                constant.kind,
                constant.classification.tier
            );
        }
    }

    out.push('\n');
    let _ = writeln!(out, "{INDENT}try {{");
    for (index, lines) in bodies.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        for line in lines {
            let _ = writeln!(out, "{INDENT}{INDENT}{line}");
        }
    }
    if usage.results {
        out.push('\n');
        let _ = writeln!(out, "{INDENT}{INDENT}console.log(JSON.stringify(results, null, 2));");
    }
    let _ = writeln!(out, "{INDENT}}} finally {{");
    let _ = writeln!(out, "{INDENT}{INDENT}await browser.close();");
    let _ = writeln!(out, "{INDENT}}}");
    out.push_str("})().catch((error) => {\n");
    let _ = writeln!(out, "{INDENT}console.error(error);");
    let _ = writeln!(out, "{INDENT}process.exitCode = 1;");
    out.push_str("});\n");
    out
}

fn render_step(result: &StepResult, table: &mut LocatorTable, usage: &mut Usage) -> Vec<String> {
    step_lines(result, table, usage)
        .into_iter()
        .map(|line| if line.starts_with("//") { comment_text(&line) } else { line })
        .collect()
}

fn step_lines(result: &StepResult, table: &mut LocatorTable, usage: &mut Usage) -> Vec<String> {
    let step = &result.step;
    let mut lines = vec![format!("// {}: {}", step.id, single_line(&step.describe()))];

    match result.status {
        StepStatus::Skipped => {
            let reason = result.error.as_deref().unwrap_or("run stopped");
            lines.push(format!("// SKIPPED ({}): {}", single_line(reason), would_be(result)));
        }
        StepStatus::Failed if step.targets_element() => {
            lines.push(format!(
                "// UNRESOLVED: no usable selector for {} ({})",
                js_string(step.target.trim()),
                result
                    .error_kind
                    .map(|kind| kind.to_string())
                    .unwrap_or_else(|| "failed".to_string())
            ));
            lines.push(format!("// tried: {}", tried_candidates(result)));
            if !result.rejected_candidates.is_empty() {
                lines.push(format!("// rejected: {}", rejected_candidates(result)));
            }
            lines.push(format!("// would run: {}", would_be(result)));
        }
        StepStatus::Failed => {
            let error = result.error.as_deref().unwrap_or("failed");
            lines.push(format!("// FAILED ({}): {}", single_line(error), would_be(result)));
        }
        StepStatus::Succeeded if step.targets_element() => {
            let Some(candidate) = &result.chosen_candidate else {
                lines.push(format!(
                    "// UNRESOLVED: no selector was recorded for {}",
                    js_string(step.target.trim())
                ));
                lines.push(format!("// would run: {}", would_be(result)));
                return lines;
            };
            let classification = classify(&candidate.expression);
            if classification.tier == ConfidenceTier::Rejected {
                lines.push(format!(
                    "// WARNING: selector {} is not safe to replay (REJECTED); step left out",
                    js_string(&candidate.expression)
                ));
                lines.push(format!("// would run: {}", would_be(result)));
                return lines;
            }
            let constant = table.intern(candidate);
            if classification.tier == ConfidenceTier::Low && classification.ambiguity_risk {
                lines.push(format!(
                    "// {} is a generic selector that may match several elements; using the first match",
                    js_string(&constant.expression)
                ));
                let locator = format!("{}.first()", constant.name);
                lines.push(statement(step, &locator, result, usage));
            } else {
                let locator = constant.name.clone();
                lines.push(statement(step, &locator, result, usage));
            }
        }
        StepStatus::Succeeded => lines.push(statement(step, "", result, usage)),
    }
    lines
}

/// The statement a step would have compiled to, with its target in place of a locator.
fn would_be(result: &StepResult) -> String {
    let placeholder = format!("<{}>", single_line(result.step.target.trim()));
    statement(&result.step, &placeholder, result, &mut Usage::default())
}

fn tried_candidates(result: &StepResult) -> String {
    if result.attempted_candidates.is_empty() {
        return "none".to_string();
    }
    result
        .attempted_candidates
        .iter()
        .map(|c| format!("{} ({}, {})", single_line(&c.expression), c.strategy_kind, c.confidence_tier))
        .collect::<Vec<_>>()
        .join("; ")
}

fn rejected_candidates(result: &StepResult) -> String {
    result
        .rejected_candidates
        .iter()
        .map(|c| format!("{} ({}, {})", single_line(&c.expression), c.strategy_kind, c.confidence_tier))
        .collect::<Vec<_>>()
        .join("; ")
}

fn statement(step: &PlanStep, locator: &str, result: &StepResult, usage: &mut Usage) -> String {
    let key = js_string(&step.id);
    match step.step_type {
        StepType::Navigate => format!("await page.goto({});", js_string(step.target.trim())),
        StepType::Click => format!("await {locator}.click();"),
        StepType::Fill => format!(
            "await {locator}.fill({});",
            js_string(step.value.as_deref().unwrap_or_default())
        ),
        StepType::Read => {
            usage.results = true;
            format!("results[{key}] = await {locator}.innerText();")
        }
        StepType::ReadAll => {
            usage.results = true;
            format!("results[{key}] = await {locator}.allInnerTexts();")
        }
        StepType::Screenshot => {
            let path = match &result.returned_data {
                Some(ToolOutput::Screenshot(out)) => out.path.clone(),
                _ => format!("{}.png", step.id),
            };
            format!(
                "await page.screenshot({{ path: {}, fullPage: {} }});",
                js_string(&path),
                step.full_page
            )
        }
        StepType::Wait => wait_statement(step, locator, result),
        StepType::Assert => {
            usage.assert = true;
            assert_statement(step, locator)
        }
    }
}

fn wait_statement(step: &PlanStep, locator: &str, result: &StepResult) -> String {
    let condition = step.effective_wait_condition();
    let recorded_timeout = match &result.tool_call {
        Some(ToolCall::WaitFor { timeout_ms, .. }) => Some(*timeout_ms),
        _ => step.timeout_ms,
    };
    match condition {
        WaitCondition::Duration => {
            let ms = step
                .value
                .as_deref()
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .unwrap_or(0);
            format!("await page.waitForTimeout({ms});")
        }
        WaitCondition::Load | WaitCondition::DomContentLoaded | WaitCondition::NetworkIdle => {
            format!("await page.waitForLoadState({});", js_string(condition.as_str()))
        }
        WaitCondition::Visible
        | WaitCondition::Hidden
        | WaitCondition::Attached
        | WaitCondition::Detached => match recorded_timeout {
            Some(timeout) => format!(
                "await {locator}.waitFor({{ state: {}, timeout: {timeout} }});",
                js_string(condition.as_str())
            ),
            None => format!(
                "await {locator}.waitFor({{ state: {} }});",
                js_string(condition.as_str())
            ),
        },
    }
}

fn assert_statement(step: &PlanStep, locator: &str) -> String {
    let expected = js_string(step.expected_value.as_deref().unwrap_or_default());
    match step.assertion_type.unwrap_or(AssertionType::Visible) {
        AssertionType::TextEquals => {
            format!("assert.equal((await {locator}.innerText()).trim(), {expected});")
        }
        AssertionType::TextContains => {
            format!("assert.ok((await {locator}.innerText()).includes({expected}));")
        }
        AssertionType::Visible => format!("assert.ok(await {locator}.isVisible());"),
        AssertionType::Hidden => format!("assert.ok(await {locator}.isHidden());"),
        AssertionType::UrlContains => format!("assert.ok(page.url().includes({expected}));"),
        AssertionType::TitleContains => {
            format!("assert.ok((await page.title()).includes({expected}));")
        }
    }
}

/// Collapse whitespace so text can sit inside a `//` comment.
///
/// `split_whitespace` also splits on U+2028 and U+2029.
fn single_line(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escape every JavaScript line terminator left in comment text.
fn comment_text(raw: &str) -> String {
    raw.replace('\r', "\\r")
        .replace('\n', "\\n")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_flow::{ErrorKind, RunStatus, TraceBuilder};
    use action_locator::{strategy_kind_of, SelectorCandidate};
    use action_primitives::{ClickOutput, NavigateOutput};

    fn succeeded_with(step: PlanStep, expression: &str) -> StepResult {
        let candidate = SelectorCandidate::new(expression, strategy_kind_of(expression), classify(expression));
        let mut result = StepResult::new(&step).with_success(
            ToolCall::Click {
                selector: expression.to_string(),
            },
            ToolOutput::Click(ClickOutput {
                status: "ok".into(),
                selector: expression.into(),
            }),
        );
        result.chosen_candidate = Some(candidate);
        result
    }

    fn navigated(url: &str) -> StepResult {
        StepResult::new(&PlanStep::navigate(url).with_id("step-1")).with_success(
            ToolCall::Navigate { url: url.into() },
            ToolOutput::Navigate(NavigateOutput {
                status: "ok".into(),
                url: url.into(),
                title: "Example".into(),
            }),
        )
    }

    fn trace_of(results: Vec<StepResult>) -> ExecutionTrace {
        let mut builder = TraceBuilder::new("do the thing\nplease");
        for result in results {
            builder.push(result);
        }
        builder.finish(RunStatus::Completed)
    }

    #[test]
    fn navigation_only_has_no_locators() {
        let script = render_script(&trace_of(vec![navigated("https://example.com")]));
        assert!(script.contains(r#"await page.goto("https://example.com");"#));
        assert!(!script.contains("// Locators"));
        assert!(!script.contains("node:assert"));
        assert!(script.contains("// Instruction: do the thing please"));
        assert_eq!(script.matches("page.goto").count(), 1);
    }

    #[test]
    fn rejected_selectors_become_warnings() {
        let step = PlanStep::click("second item").with_id("step-2");
        let script = render_script(&trace_of(vec![succeeded_with(step, "li:nth-child(2)")]));
        assert!(script.contains("WARNING"));
        assert!(!script.contains("// Locators"));
        for line in script.lines().filter(|l| !l.trim_start().starts_with("//")) {
            assert!(!line.contains("nth-child"), "{line}");
        }
    }

    #[test]
    fn generic_selectors_are_first_qualified() {
        let step = PlanStep::click("submit").with_id("step-2");
        let script = render_script(&trace_of(vec![succeeded_with(step, "button")]));
        assert!(script.contains("const CSS_BUTTON = page.locator(\"button\");"));
        assert!(script.contains("await CSS_BUTTON.first().click();"));
        assert!(script.contains("generic selector"));
    }

    #[test]
    fn unresolved_steps_are_comments() {
        let step = PlanStep::click("mystery button").with_id("step-2");
        let failed = StepResult::failed(&step, ErrorKind::Unresolvable, "no usable selector");
        let script = render_script(&trace_of(vec![failed]));
        assert!(script.contains(r#"// UNRESOLVED: no usable selector for "mystery button" (Unresolvable)"#));
        assert!(script.contains("// tried: none"));
        assert!(script.contains("// would run: await <mystery button>.click();"));
    }

    #[test]
    fn comment_text_escapes_every_line_terminator() {
        assert_eq!(
            comment_text("a\rb\nc\u{2028}d\u{2029}e"),
            "a\\rb\\nc\\u2028d\\u2029e"
        );
        assert_eq!(js_string("x\u{2028}y"), r#""x\u2028y""#);
    }

    #[test]
    fn skipped_fill_keeps_its_value_on_the_comment_line() {
        let step = PlanStep::fill("search box", "cats\u{2029}alert(1)").with_id("step-2");
        let script = render_script(&trace_of(vec![StepResult::skipped(&step, "run cancelled")]));
        let line = script
            .lines()
            .find(|line| line.contains("SKIPPED"))
            .unwrap();
        assert!(line.contains(r#"fill("cats\u2029alert(1)")"#), "{line}");
        assert!(!script.contains('\u{2029}'));
    }

    #[test]
    fn reads_collect_results() {
        let step = PlanStep::read("total").with_id("total");
        let script = render_script(&trace_of(vec![succeeded_with(step, "#total")]));
        assert!(script.contains("const results = {};"));
        assert!(script.contains(r#"results["total"] = await CSS_TOTAL.innerText();"#));
        assert!(script.contains("console.log(JSON.stringify(results, null, 2));"));
    }

    #[test]
    fn assertions_pull_in_node_assert() {
        let step = PlanStep::assert_that("", AssertionType::UrlContains, "/cart").with_id("check");
        let result = StepResult::new(&step).with_success(
            ToolCall::Assert {
                selector: None,
                assertion: AssertionType::UrlContains,
                expected: "/cart".into(),
            },
            ToolOutput::Assert(action_primitives::AssertOutput {
                status: "passed".into(),
                actual: "https://shop.test/cart".into(),
            }),
        );
        let script = render_script(&trace_of(vec![result]));
        assert!(script.contains("const assert = require('node:assert/strict');"));
        assert!(script.contains(r#"assert.ok(page.url().includes("/cart"));"#));
    }
}
