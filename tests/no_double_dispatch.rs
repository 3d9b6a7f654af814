use std::error::Error;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use planloop::plan::ExecutionPlan;
use planloop::sched::{InterruptMonitor, SchedulerLoop, SchedulerOptions};
use planloop_test_utils::builders::{PlanFileBuilder, StepConfigBuilder};
use planloop_test_utils::fake_queue::{FakeQueueClient, ScriptedOutcome};
use planloop_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn test_outstanding_step_is_never_submitted_twice() -> TestResult {
    init_tracing();

    // `slow` stays outstanding across many ticks; it must be submitted
    // exactly once, and its dependent exactly once after it completes.
    let plan_file = PlanFileBuilder::new()
        .with_step("slow", StepConfigBuilder::new("sleep 1").build())
        .with_step(
            "dependent",
            StepConfigBuilder::new("echo d").after("slow").build(),
        )
        .build();

    let client = FakeQueueClient::new();
    client.script("slow", ScriptedOutcome::Hold);
    let control = client.clone();

    let plan = ExecutionPlan::from_plan_file(&plan_file);
    let options = SchedulerOptions {
        tick: Duration::from_millis(5),
        run_priority: 0,
    };
    let (event_tx, _event_rx) = mpsc::channel(1024);

    let scheduler = SchedulerLoop::new(
        plan,
        client,
        InterruptMonitor::new(CancellationToken::new()),
        options,
        event_tx,
    );
    let run_handle = tokio::spawn(scheduler.run());

    // Let the loop tick several times with `slow` outstanding.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(control.submitted(), vec!["slow"]);

    control.release("slow");
    let result = with_timeout(async { run_handle.await.expect("scheduler task panicked") }).await;
    assert!(result.is_ok());

    assert_eq!(control.submitted(), vec!["slow", "dependent"]);

    Ok(())
}

#[tokio::test]
async fn test_diamond_dependency_runs_each_step_once() -> TestResult {
    init_tracing();

    //     top
    //    /   \
    //  left  right
    //    \   /
    //    bottom
    let plan_file = PlanFileBuilder::new()
        .with_step("top", StepConfigBuilder::new("echo t").build())
        .with_step("left", StepConfigBuilder::new("echo l").after("top").build())
        .with_step(
            "right",
            StepConfigBuilder::new("echo r").after("top").build(),
        )
        .with_step(
            "bottom",
            StepConfigBuilder::new("echo b")
                .after("left")
                .after("right")
                .build(),
        )
        .build();

    let client = FakeQueueClient::new();
    let control = client.clone();

    let plan = ExecutionPlan::from_plan_file(&plan_file);
    let options = SchedulerOptions {
        tick: Duration::from_millis(5),
        run_priority: 0,
    };
    let (event_tx, _event_rx) = mpsc::channel(1024);

    let scheduler = SchedulerLoop::new(
        plan,
        client,
        InterruptMonitor::new(CancellationToken::new()),
        options,
        event_tx,
    );
    let result = with_timeout(scheduler.run()).await;
    assert!(result.is_ok());

    let submitted = control.submitted();
    assert_eq!(submitted.len(), 4, "each step exactly once: {submitted:?}");
    assert_eq!(submitted[0], "top");
    assert_eq!(submitted[3], "bottom");
    // left/right share a tick; their mutual order is the lexicographic
    // tie-break.
    assert_eq!(submitted[1..3].to_vec(), vec!["left", "right"]);

    Ok(())
}
