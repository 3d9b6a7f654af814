// src/sched/run_loop.rs

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::{PlanloopError, Result};
use crate::plan::ExecutionPlan;
use crate::remote::QueueClient;
use crate::sched::{
    poller, Dispatcher, ErrorAggregator, InterruptMonitor, LifecycleEvent, LoopState,
    OutstandingSet, SchedulerOptions,
};

/// The top-level cooperative scheduler loop.
///
/// Owns all mutable run state (plan, outstanding handles, collected
/// errors) for the duration of one run; nothing else mutates them, so no
/// locking is needed. The loop never blocks on a single step: it polls all
/// outstanding handles each tick and sleeps between passes.
pub struct SchedulerLoop<C: QueueClient> {
    plan: ExecutionPlan,
    client: C,
    dispatcher: Dispatcher,
    interrupt: InterruptMonitor,
    errors: ErrorAggregator,
    outstanding: OutstandingSet,
    options: SchedulerOptions,
    events: mpsc::Sender<LifecycleEvent>,
    state: LoopState,
}

impl<C: QueueClient> SchedulerLoop<C> {
    pub fn new(
        plan: ExecutionPlan,
        client: C,
        interrupt: InterruptMonitor,
        options: SchedulerOptions,
        events: mpsc::Sender<LifecycleEvent>,
    ) -> Self {
        Self {
            plan,
            client,
            dispatcher: Dispatcher::new(),
            interrupt,
            errors: ErrorAggregator::new(),
            outstanding: OutstandingSet::new(),
            options,
            events,
            state: LoopState::Running,
        }
    }

    /// Replace the default no-retry dispatcher.
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Drive the plan to completion.
    ///
    /// Returns `Ok(())` on clean completion or clean interruption; returns
    /// the aggregated failure if any step error was recorded. Already-
    /// dispatched work is always drained before returning, whichever way
    /// the run ends.
    pub async fn run(mut self) -> Result<()> {
        info!("scheduler loop started");

        loop {
            self.tick().await;

            if self.state == LoopState::Done {
                break;
            }

            tokio::time::sleep(self.options.tick).await;
        }

        let interrupted = self.interrupt.stopping();
        if !interrupted && !self.errors.has_errors() {
            self.emit(LifecycleEvent::RunCompleted).await;
        }

        info!(
            interrupted,
            failed_steps = self.errors.len(),
            "scheduler loop finished"
        );

        self.errors
            .into_result()
            .map_err(PlanloopError::StepFailures)
    }

    /// One pass: interrupt check, harvest, unreachable marking, dispatch,
    /// completion check.
    async fn tick(&mut self) {
        if self.interrupt.check() {
            self.state = LoopState::Stopping;
            self.revoke_outstanding().await;
            self.emit(LifecycleEvent::RunInterrupted).await;
        }

        let harvested = poller::harvest(
            &mut self.plan,
            &mut self.client,
            &mut self.outstanding,
            &mut self.errors,
        )
        .await;
        self.emit_all(harvested).await;

        // Marking one step unreachable can make its own dependents
        // unreachable, so iterate to a fixpoint.
        loop {
            let blocked = self.plan.unreachable_candidates();
            if blocked.is_empty() {
                break;
            }
            for step in blocked {
                self.plan.mark_unreachable(&step);
                self.emit(LifecycleEvent::StepSkipped { step }).await;
            }
        }

        // Once the run is stopping or failing, already-dispatched steps
        // still drain, but nothing new starts.
        if !self.interrupt.stopping() && !self.errors.has_errors() {
            let dispatched = self
                .dispatcher
                .dispatch_ready(
                    &mut self.plan,
                    &mut self.client,
                    self.options.run_priority,
                    &mut self.outstanding,
                    &mut self.errors,
                )
                .await;
            self.emit_all(dispatched).await;
        }

        if self.outstanding.is_empty()
            && (self.plan.is_complete() || self.interrupt.stopping() || self.errors.has_errors())
        {
            debug!("nothing outstanding and nothing more to run; loop done");
            self.state = LoopState::Done;
        }
    }

    /// Best-effort revocation of every outstanding handle, in priority
    /// order. Revocations are observed later by the poller as `Revoked`
    /// outcomes (or the steps finish normally first).
    async fn revoke_outstanding(&mut self) {
        let entries: Vec<_> = self
            .outstanding
            .values()
            .map(|entry| (entry.step.clone(), entry.handle))
            .collect();

        for (step, handle) in entries {
            debug!(step = %step, "revoking outstanding step");
            self.client.revoke(handle).await;
        }
    }

    async fn emit(&self, event: LifecycleEvent) {
        // The consumer owning the receiver may have gone away; the loop's
        // own bookkeeping doesn't depend on delivery.
        let _ = self.events.send(event).await;
    }

    async fn emit_all(&self, events: Vec<LifecycleEvent>) {
        for event in events {
            self.emit(event).await;
        }
    }
}
