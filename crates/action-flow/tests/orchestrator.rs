use std::collections::HashMap;
use std::sync::Arc;

use action_flow::{
    CancellationToken, DefaultStepExecutor, ErrorKind, FlowError, RetryPolicy, RunOrchestrator,
    RunStatus, StepStatus,
};
use action_locator::{
    classify, LocatorResolver, ResolvedCandidates, SelectorCandidate, StrategyKind,
};
use action_primitives::{FixtureBrowser, FixturePage, PageSnapshot, SiteFixture, SnapshotNode};
use agent_core::{ExecutionPlan, PlanStep, StaticPlanner};

fn orchestrator(browser: &FixtureBrowser) -> RunOrchestrator {
    RunOrchestrator::new(Arc::new(browser.clone()))
        .with_executor(Arc::new(DefaultStepExecutor::new(RetryPolicy::new(3, 1))))
}

fn shop() -> SiteFixture {
    SiteFixture::new()
        .with_page(
            "https://shop.test/",
            FixturePage::new("Shop")
                .with_node(SnapshotNode::new("input").with_attribute("placeholder", "Search"))
                .with_node(
                    SnapshotNode::new("a")
                        .with_attribute("href", "/cart")
                        .with_text("Cart"),
                ),
        )
        .with_page(
            "https://shop.test/cart",
            FixturePage::new("Cart")
                .with_node(SnapshotNode::new("button").with_text("Checkout").disabled())
                .with_node(SnapshotNode::new("span").with_id("total").with_text("$42.00")),
        )
        .with_page("https://shop.test/crash", FixturePage::new("Crash").crashing())
}

/// Always proposes a single bare `input`, the way a page with nothing better would.
struct BareInputResolver;

impl LocatorResolver for BareInputResolver {
    fn resolve(&self, _step: &PlanStep, _snapshot: &PageSnapshot) -> ResolvedCandidates {
        ResolvedCandidates {
            candidates: vec![SelectorCandidate::new("input", StrategyKind::RawCss, classify("input"))],
            rejected: vec![],
        }
    }
}

#[tokio::test]
async fn single_navigation_succeeds() {
    let browser = FixtureBrowser::new(
        SiteFixture::new().with_page("https://example.com", FixturePage::new("Example Domain")),
    );
    let plan = ExecutionPlan::new(vec![PlanStep::navigate("https://example.com")]);
    let trace = orchestrator(&browser)
        .run("open example", &plan, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(trace.status(), RunStatus::Completed);
    assert_eq!(trace.results().len(), 1);
    assert!(trace.results()[0].succeeded());
    assert!(trace.is_success());
    assert_eq!(browser.sessions_created(), 1);
    assert_eq!(browser.sessions_closed(), 1);
}

#[tokio::test]
async fn generic_candidate_is_used_when_nothing_better_exists() {
    let browser = FixtureBrowser::new(shop());
    let plan = ExecutionPlan::new(vec![
        PlanStep::navigate("https://shop.test/"),
        PlanStep::fill("search box", "cats"),
    ]);
    let trace = orchestrator(&browser)
        .with_resolver(Arc::new(BareInputResolver))
        .run("search for cats", &plan, &CancellationToken::new())
        .await
        .unwrap();

    let fill = &trace.results()[1];
    assert!(fill.succeeded());
    let chosen = fill.chosen_candidate.as_ref().unwrap();
    assert_eq!(chosen.expression, "input");
    assert!(chosen.needs_first_match());
}

#[tokio::test]
async fn unknown_target_is_unresolvable_and_run_continues() {
    let browser = FixtureBrowser::new(shop());
    let plan = ExecutionPlan::new(vec![
        PlanStep::navigate("https://shop.test/"),
        PlanStep::click("mystery button"),
        PlanStep::screenshot(false),
    ]);
    let trace = orchestrator(&browser)
        .run("poke around", &plan, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(trace.status(), RunStatus::Completed);
    let click = &trace.results()[1];
    assert_eq!(click.status, StepStatus::Failed);
    assert_eq!(click.error_kind, Some(ErrorKind::Unresolvable));
    assert!(click.attempted_candidates.is_empty());
    assert!(trace.results()[2].succeeded());
    assert!(browser.call_log().iter().all(|call| call.tool != "click"));
}

#[tokio::test]
async fn critical_failure_skips_the_rest() {
    let browser = FixtureBrowser::new(shop());
    let plan = ExecutionPlan::new(vec![
        PlanStep::navigate("https://shop.test/cart"),
        PlanStep::click("Checkout button").critical(),
        PlanStep::read("#total"),
        PlanStep::screenshot(true),
    ]);
    let trace = orchestrator(&browser)
        .run("check out", &plan, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(trace.status(), RunStatus::CriticalFailure);
    assert_eq!(trace.results().len(), 4);
    let checkout = &trace.results()[1];
    assert_eq!(checkout.error_kind, Some(ErrorKind::AllCandidatesFailed));
    assert!(!checkout.attempted_candidates.is_empty());
    assert!(trace.results()[2..].iter().all(|r| r.status == StepStatus::Skipped));
    let ids: Vec<_> = trace.results().iter().map(|r| r.step.id.as_str()).collect();
    assert_eq!(ids, ["step-1", "step-2", "step-3", "step-4"]);
    assert!(browser.call_log().iter().all(|call| call.tool != "readText"));
}

#[tokio::test]
async fn no_candidate_exceeds_the_retry_budget() {
    let browser = FixtureBrowser::new(shop());
    let plan = ExecutionPlan::new(vec![
        PlanStep::navigate("https://shop.test/cart"),
        PlanStep::click("Checkout button"),
    ]);
    let trace = orchestrator(&browser)
        .run("check out", &plan, &CancellationToken::new())
        .await
        .unwrap();

    let mut per_selector: HashMap<String, usize> = HashMap::new();
    for call in browser.call_log().iter().filter(|call| call.tool == "click") {
        *per_selector.entry(call.selector.clone().unwrap()).or_default() += 1;
    }
    assert!(!per_selector.is_empty());
    assert!(per_selector.values().all(|count| *count <= 3));

    let click = &trace.results()[1];
    assert_eq!(click.attempts.len(), per_selector.values().sum::<usize>());
    // Non-critical: the run still completes.
    assert_eq!(trace.status(), RunStatus::Completed);
}

#[tokio::test]
async fn navigation_through_links_then_read() {
    let browser = FixtureBrowser::new(shop());
    let plan = ExecutionPlan::new(vec![
        PlanStep::navigate("https://shop.test/"),
        PlanStep::click("Cart link"),
        PlanStep::read("#total"),
    ]);
    let trace = orchestrator(&browser)
        .run("read the cart total", &plan, &CancellationToken::new())
        .await
        .unwrap();

    assert!(trace.is_success(), "{:?}", trace.results());
    let read = trace.results()[2].returned_data.as_ref().unwrap();
    assert_eq!(read.text(), Some("$42.00"));
}

#[tokio::test]
async fn cancelled_run_skips_everything() {
    let browser = FixtureBrowser::new(shop());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let plan = ExecutionPlan::new(vec![
        PlanStep::navigate("https://shop.test/"),
        PlanStep::screenshot(false),
    ]);
    let trace = orchestrator(&browser).run("x", &plan, &cancel).await.unwrap();

    assert_eq!(trace.status(), RunStatus::Aborted);
    assert_eq!(trace.skipped_count(), 2);
    assert_eq!(browser.sessions_created(), 0);
}

/// Cancels the run from inside the step it is resolving for.
struct CancellingResolver(CancellationToken);

impl LocatorResolver for CancellingResolver {
    fn resolve(&self, _step: &PlanStep, _snapshot: &PageSnapshot) -> ResolvedCandidates {
        self.0.cancel();
        ResolvedCandidates {
            candidates: vec![SelectorCandidate::new("#total", StrategyKind::RawCss, classify("#total"))],
            rejected: vec![],
        }
    }
}

#[tokio::test]
async fn cancel_during_the_last_step_aborts_after_it_completes() {
    let browser = FixtureBrowser::new(shop());
    let cancel = CancellationToken::new();
    let plan = ExecutionPlan::new(vec![
        PlanStep::navigate("https://shop.test/cart"),
        PlanStep::read("total"),
    ]);
    let trace = orchestrator(&browser)
        .with_resolver(Arc::new(CancellingResolver(cancel.clone())))
        .run("read total", &plan, &cancel)
        .await
        .unwrap();

    assert_eq!(trace.status(), RunStatus::Aborted);
    assert_eq!(trace.results()[1].status, StepStatus::Succeeded);
    assert_eq!(trace.skipped_count(), 0);
    assert_eq!(browser.sessions_closed(), 1);
}

#[tokio::test]
async fn lost_session_stops_the_run() {
    let browser = FixtureBrowser::new(shop());
    let plan = ExecutionPlan::new(vec![
        PlanStep::navigate("https://shop.test/crash"),
        PlanStep::screenshot(false),
    ]);
    let trace = orchestrator(&browser)
        .run("crash", &plan, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(trace.status(), RunStatus::SessionFatal);
    assert_eq!(trace.results()[0].error_kind, Some(ErrorKind::SessionFatal));
    assert_eq!(trace.results()[0].attempts.len(), 1);
    assert_eq!(trace.results()[1].status, StepStatus::Skipped);
    assert_eq!(browser.sessions_created(), 1);
}

#[tokio::test]
async fn invalid_plan_never_touches_the_browser() {
    let browser = FixtureBrowser::new(shop());
    let plan = ExecutionPlan::new(vec![PlanStep::navigate("not a url"), PlanStep::click("")]);
    let err = orchestrator(&browser)
        .run("broken", &plan, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        FlowError::PlanValidation(validation) => assert_eq!(validation.issues.len(), 2),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(browser.sessions_created(), 0);
}

#[test]
fn planner_feeds_the_orchestrator() {
    let browser = FixtureBrowser::new(shop());
    let planner = StaticPlanner::new(ExecutionPlan::new(vec![PlanStep::navigate(
        "https://shop.test/",
    )]));
    let trace = tokio_test::block_on(orchestrator(&browser).run_instruction(
        &planner,
        "open the shop",
        &CancellationToken::new(),
    ))
    .unwrap();
    assert_eq!(trace.instruction(), "open the shop");
    assert!(trace.is_success());
}
