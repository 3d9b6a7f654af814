// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod plan;
pub mod remote;
pub mod sched;
pub mod types;

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::PlanFile;
use crate::errors::Result;
use crate::plan::{ExecutionPlan, PlanGraph};
use crate::remote::LocalQueueClient;
use crate::sched::{InterruptMonitor, LifecycleEvent, SchedulerLoop, SchedulerOptions};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - plan loading and validation
/// - the execution plan and scheduler loop
/// - the local queue backend
/// - Ctrl-C handling
/// - lifecycle event logging
pub async fn run(args: CliArgs) -> Result<()> {
    let plan_path = PathBuf::from(&args.plan);
    let plan_file = load_and_validate(&plan_path)?;

    if args.dry_run {
        print_dry_run(&plan_file);
        return Ok(());
    }

    let roots = root_steps(&plan_file);
    info!(?roots, "plan roots (no dependencies)");

    let plan = ExecutionPlan::from_plan_file(&plan_file);
    let client = LocalQueueClient::from_plan(&plan_file);

    // Ctrl-C → drain-only mode.
    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            token.cancel();
        });
    }

    let mut options = SchedulerOptions {
        tick: Duration::from_millis(plan_file.run.tick_ms),
        run_priority: plan_file.run.priority,
    };
    if let Some(tick_ms) = args.tick_ms {
        options.tick = Duration::from_millis(tick_ms.max(1));
    }

    // Lifecycle event channel; the consumer just logs for the CLI.
    let (event_tx, mut event_rx) = mpsc::channel::<LifecycleEvent>(64);
    let logger = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            log_lifecycle_event(&event);
        }
    });

    let scheduler = SchedulerLoop::new(
        plan,
        client,
        InterruptMonitor::new(token),
        options,
        event_tx,
    );
    let result = scheduler.run().await;

    let _ = logger.await;

    result
}

/// Render one lifecycle event for the terminal.
fn log_lifecycle_event(event: &LifecycleEvent) {
    match event {
        LifecycleEvent::StepSubmitted { step, queue } => {
            info!(step = %step, queue = %queue, "submitted");
        }
        LifecycleEvent::StepSucceeded { step } => {
            info!(step = %step, "succeeded");
        }
        LifecycleEvent::StepFailed { step, message } => {
            warn!(step = %step, message = %message, "failed");
        }
        LifecycleEvent::StepSkipped { step } => {
            info!(step = %step, "skipped (upstream failure)");
        }
        LifecycleEvent::RunInterrupted => {
            warn!("run interrupted; draining outstanding steps");
        }
        LifecycleEvent::RunCompleted => {
            info!("run completed");
        }
    }
}

/// Steps with no `after = [...]` dependencies; these dispatch on the first
/// tick.
fn root_steps(plan: &PlanFile) -> Vec<String> {
    let graph = PlanGraph::from_plan_file(plan);
    graph
        .steps()
        .filter(|name| graph.dependencies_of(name).is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Simple dry-run output: print steps, queues, priorities and deps.
fn print_dry_run(plan: &PlanFile) {
    println!("planloop dry-run");
    println!("  run.tick_ms = {}", plan.run.tick_ms);
    println!("  run.priority = {}", plan.run.priority);
    println!("  run.default_queue = {}", plan.run.default_queue);
    println!();

    println!("queues:");
    for queue in plan.referenced_queues() {
        println!("  - {queue} (workers: {})", plan.workers_of(&queue));
    }
    println!();

    println!("steps ({}):", plan.step.len());
    for (name, step) in plan.step.iter() {
        println!("  - {name}");
        println!("      cmd: {}", step.cmd);
        println!("      queue: {}", plan.queue_of(step));
        if !step.after.is_empty() {
            println!("      after: {:?}", step.after);
        }
        if let Some(priority) = step.priority {
            println!("      priority: {priority}");
        }
    }
}
