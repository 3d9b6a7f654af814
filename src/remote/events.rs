// src/remote/events.rs

//! Stdout event-line protocol for step workers.
//!
//! A step command may report structured outcomes by printing lines of the
//! form:
//!
//! ```text
//! ::planloop-event:: {"outcome":"failed","message":"upstream returned 503"}
//! ```
//!
//! Lines carrying the marker are decoded into [`StepEvent`]s; all other
//! stdout lines are ordinary output. When a command prints no event lines at
//! all, its exit status decides the outcome instead (see
//! [`events_from_exit`]).

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::remote::StepEvent;

/// Marker prefix a worker puts in front of a JSON event payload.
pub const EVENT_LINE_MARKER: &str = "::planloop-event::";

/// Wire form of a step event, without the step id (the backend knows which
/// step a process belongs to).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WireStepEvent {
    Succeeded,
    Failed {
        message: String,
        #[serde(default)]
        trace: Option<String>,
    },
}

/// Decode a single stdout line. Returns `None` for ordinary output and for
/// marker lines whose payload doesn't parse (those are logged and skipped
/// rather than failing the step).
pub fn decode_event_line(step: &str, line: &str) -> Option<StepEvent> {
    let payload = line.trim_start().strip_prefix(EVENT_LINE_MARKER)?;

    match serde_json::from_str::<WireStepEvent>(payload.trim()) {
        Ok(WireStepEvent::Succeeded) => Some(StepEvent::Succeeded {
            step: step.to_string(),
        }),
        Ok(WireStepEvent::Failed { message, trace }) => Some(StepEvent::Failed {
            step: step.to_string(),
            message,
            trace,
        }),
        Err(err) => {
            warn!(
                step = %step,
                error = %err,
                line = %line,
                "ignoring malformed event line from worker stdout"
            );
            None
        }
    }
}

/// Render a wire event as a marker line, for workers written in Rust (and
/// for tests exercising the decode path).
pub fn encode_event_line(event: &WireStepEvent) -> String {
    // WireStepEvent serialization cannot fail: it is an enum of plain strings.
    let payload = serde_json::to_string(event).expect("serializing WireStepEvent");
    format!("{EVENT_LINE_MARKER} {payload}")
}

/// Map a process exit status onto events, used when a command printed no
/// event lines of its own.
pub fn events_from_exit(step: &str, success: bool, code: i32) -> Vec<StepEvent> {
    if success {
        vec![StepEvent::Succeeded {
            step: step.to_string(),
        }]
    } else {
        vec![StepEvent::Failed {
            step: step.to_string(),
            message: format!("command exited with status {code}"),
            trace: None,
        }]
    }
}
