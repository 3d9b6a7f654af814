// src/remote/worker.rs

//! Individual step process runner for the local queue backend.

use std::process::Stdio;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::remote::events::{decode_event_line, events_from_exit};
use crate::remote::{StepEvent, StepPayload};

/// How a single step process ended, from the backend's point of view.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Process ran to completion; these are its emitted events.
    Completed(Vec<StepEvent>),
    /// The process was revoked before finishing; no events were produced.
    Cancelled,
}

/// Run a single step process, decoding `::planloop-event::` lines from its
/// stdout.
///
/// - If the cancel channel fires, the child process is killed and
///   [`ProcessOutcome::Cancelled`] is returned; any events already decoded
///   are discarded so a revoked step never reports an outcome.
/// - If the command prints no event lines, its exit status decides the
///   outcome; event lines take precedence over the exit status.
pub async fn run_step_process(
    payload: StepPayload,
    cancel_rx: &mut oneshot::Receiver<()>,
) -> Result<ProcessOutcome> {
    info!(
        step = %payload.step,
        cmd = %payload.cmd,
        "starting step process"
    );

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&payload.cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&payload.cmd);
        c
    };

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for step '{}'", payload.step))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // Collect event lines from stdout; everything else is logged at debug.
    let collected: Arc<Mutex<Vec<StepEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let stdout_task = stdout.map(|stdout| {
        let step = payload.step.clone();
        let collected = Arc::clone(&collected);
        tokio::spawn(async move {
            let reader = BufReader::new(stdout);
            let mut lines = reader.lines();

            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(event) = decode_event_line(&step, &line) {
                    collected.lock().unwrap().push(event);
                } else {
                    debug!(step = %step, "stdout: {}", line);
                }
            }
        })
    });

    // Always consume stderr so buffers don't fill; log at debug.
    if let Some(stderr) = stderr {
        let step = payload.step.clone();
        tokio::spawn(async move {
            let reader = BufReader::new(stderr);
            let mut lines = reader.lines();

            while let Ok(Some(line)) = lines.next_line().await {
                debug!(step = %step, "stderr: {}", line);
            }
        });
    }

    // Either the process exits on its own (normal case), or we receive a
    // revocation request from the client.
    tokio::select! {
        status_res = child.wait() => {
            let status = status_res.with_context(|| {
                format!("waiting for process of step '{}'", payload.step)
            })?;

            // Drain stdout fully before reading the collected events.
            if let Some(task) = stdout_task {
                let _ = task.await;
            }

            let code = status.code().unwrap_or(-1);
            info!(
                step = %payload.step,
                exit_code = code,
                success = status.success(),
                "step process exited"
            );

            let mut events = {
                let mut guard = collected.lock().unwrap();
                std::mem::take(&mut *guard)
            };
            if events.is_empty() {
                events = events_from_exit(&payload.step, status.success(), code);
            } else if !status.success() {
                debug!(
                    step = %payload.step,
                    exit_code = code,
                    "non-zero exit after explicit event lines; events take precedence"
                );
            }

            Ok(ProcessOutcome::Completed(events))
        }

        cancel = cancel_rx => {
            match cancel {
                Ok(()) => {
                    info!(
                        step = %payload.step,
                        "revocation requested for running step; killing process"
                    );
                    if let Err(e) = child.kill().await {
                        warn!(
                            step = %payload.step,
                            error = %e,
                            "failed to kill step process on revocation"
                        );
                    }
                }
                Err(e) => {
                    debug!(
                        step = %payload.step,
                        error = %e,
                        "cancel channel closed without explicit revocation"
                    );
                    // Child will be killed on drop due to kill_on_drop(true).
                }
            }
            Ok(ProcessOutcome::Cancelled)
        }
    }
}
