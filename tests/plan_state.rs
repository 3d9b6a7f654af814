//! Unit-level coverage of `ExecutionPlan` bookkeeping, without the
//! scheduler loop or any queue backend.

use planloop::plan::{ExecutionPlan, StepState};
use planloop::remote::StepEvent;
use planloop_test_utils::builders::{PlanFileBuilder, StepConfigBuilder};

fn succeeded(step: &str) -> StepEvent {
    StepEvent::Succeeded {
        step: step.to_string(),
    }
}

fn failed(step: &str) -> StepEvent {
    StepEvent::Failed {
        step: step.to_string(),
        message: "boom".to_string(),
        trace: None,
    }
}

#[test]
fn test_ready_steps_marks_dispatched_and_hands_out_once() {
    let plan_file = PlanFileBuilder::new()
        .with_step("root", StepConfigBuilder::new("echo r").build())
        .with_step(
            "child",
            StepConfigBuilder::new("echo c").after("root").build(),
        )
        .build();
    let mut plan = ExecutionPlan::from_plan_file(&plan_file);

    let ready: Vec<_> = plan.ready_steps().into_iter().map(|s| s.id).collect();
    assert_eq!(ready, vec!["root"]);
    assert_eq!(plan.state_of("root"), Some(StepState::Dispatched));
    assert_eq!(plan.state_of("child"), Some(StepState::Pending));

    // A dispatched step is not handed out again.
    assert!(plan.ready_steps().is_empty());
}

#[test]
fn test_success_event_unlocks_dependents() {
    let plan_file = PlanFileBuilder::new()
        .with_step("root", StepConfigBuilder::new("echo r").build())
        .with_step(
            "child",
            StepConfigBuilder::new("echo c").after("root").build(),
        )
        .build();
    let mut plan = ExecutionPlan::from_plan_file(&plan_file);

    plan.ready_steps();
    plan.apply_event(&succeeded("root"));

    assert_eq!(plan.state_of("root"), Some(StepState::Succeeded));
    let ready: Vec<_> = plan.ready_steps().into_iter().map(|s| s.id).collect();
    assert_eq!(ready, vec!["child"]);
}

#[test]
fn test_failed_dependency_never_satisfies_a_dependent() {
    let plan_file = PlanFileBuilder::new()
        .with_step("root", StepConfigBuilder::new("echo r").build())
        .with_step(
            "child",
            StepConfigBuilder::new("echo c").after("root").build(),
        )
        .build();
    let mut plan = ExecutionPlan::from_plan_file(&plan_file);

    plan.ready_steps();
    plan.apply_event(&failed("root"));

    assert_eq!(plan.state_of("root"), Some(StepState::Failed));
    assert!(plan.ready_steps().is_empty());
    assert_eq!(plan.unreachable_candidates(), vec!["child".to_string()]);
}

#[test]
fn test_unreachable_propagates_through_chains_step_by_step() {
    let plan_file = PlanFileBuilder::new()
        .with_step("a", StepConfigBuilder::new("echo a").build())
        .with_step("b", StepConfigBuilder::new("echo b").after("a").build())
        .with_step("c", StepConfigBuilder::new("echo c").after("b").build())
        .build();
    let mut plan = ExecutionPlan::from_plan_file(&plan_file);

    plan.ready_steps();
    plan.apply_event(&failed("a"));

    // Only the direct dependent is a candidate at first.
    assert_eq!(plan.unreachable_candidates(), vec!["b".to_string()]);
    plan.mark_unreachable("b");

    // Marking b exposes c.
    assert_eq!(plan.unreachable_candidates(), vec!["c".to_string()]);
    plan.mark_unreachable("c");

    assert!(plan.unreachable_candidates().is_empty());
    assert!(plan.is_complete());
}

#[test]
fn test_is_complete_requires_every_step_terminal() {
    let plan_file = PlanFileBuilder::new()
        .with_step("one", StepConfigBuilder::new("echo 1").build())
        .with_step("two", StepConfigBuilder::new("echo 2").build())
        .build();
    let mut plan = ExecutionPlan::from_plan_file(&plan_file);

    assert!(!plan.is_complete());

    plan.ready_steps();
    plan.apply_event(&succeeded("one"));
    assert!(!plan.is_complete(), "a dispatched step is not terminal");

    plan.apply_event(&succeeded("two"));
    assert!(plan.is_complete());
}

#[test]
fn test_terminal_states_are_sticky() {
    let plan_file = PlanFileBuilder::new()
        .with_step("only", StepConfigBuilder::new("echo o").build())
        .build();
    let mut plan = ExecutionPlan::from_plan_file(&plan_file);

    plan.ready_steps();
    plan.apply_event(&failed("only"));
    assert_eq!(plan.state_of("only"), Some(StepState::Failed));

    // A late success event cannot resurrect a failed step.
    plan.apply_event(&succeeded("only"));
    assert_eq!(plan.state_of("only"), Some(StepState::Failed));

    // Nor can mark_failed downgrade a success elsewhere.
    plan.mark_unreachable("only");
    assert_eq!(plan.state_of("only"), Some(StepState::Failed));
}

#[test]
fn test_events_for_unknown_steps_are_ignored() {
    let plan_file = PlanFileBuilder::new()
        .with_step("known", StepConfigBuilder::new("echo k").build())
        .build();
    let mut plan = ExecutionPlan::from_plan_file(&plan_file);

    plan.apply_event(&succeeded("stranger"));
    plan.mark_failed("stranger");
    plan.mark_unreachable("stranger");

    assert_eq!(plan.state_of("known"), Some(StepState::Pending));
    assert!(plan.state_of("stranger").is_none());
}

#[test]
fn test_independent_roots_are_all_ready_at_once() {
    let plan_file = PlanFileBuilder::new()
        .with_step("x", StepConfigBuilder::new("echo x").build())
        .with_step("y", StepConfigBuilder::new("echo y").build())
        .with_step("z", StepConfigBuilder::new("echo z").after("x").build())
        .build();
    let mut plan = ExecutionPlan::from_plan_file(&plan_file);

    let mut ready: Vec<_> = plan.ready_steps().into_iter().map(|s| s.id).collect();
    ready.sort();
    assert_eq!(ready, vec!["x", "y"]);
}
