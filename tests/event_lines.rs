//! Decode/encode coverage for the worker stdout event-line protocol.

use planloop::remote::events::{
    decode_event_line, encode_event_line, events_from_exit, WireStepEvent,
};
use planloop::remote::StepEvent;

#[test]
fn test_ordinary_output_is_not_an_event() {
    assert!(decode_event_line("build", "compiling 42 objects").is_none());
    assert!(decode_event_line("build", "").is_none());
    // The marker must prefix the line, not merely appear in it.
    assert!(decode_event_line("build", "see ::planloop-event:: docs").is_none());
}

#[test]
fn test_failed_event_line_decodes_with_trace() {
    let line = r#"::planloop-event:: {"outcome":"failed","message":"no space left","trace":"at write()"}"#;
    let event = decode_event_line("upload", line).expect("decodes");
    assert_eq!(
        event,
        StepEvent::Failed {
            step: "upload".to_string(),
            message: "no space left".to_string(),
            trace: Some("at write()".to_string()),
        }
    );
}

#[test]
fn test_succeeded_event_line_decodes() {
    let line = r#"  ::planloop-event:: {"outcome":"succeeded"}"#;
    let event = decode_event_line("upload", line).expect("decodes");
    assert_eq!(
        event,
        StepEvent::Succeeded {
            step: "upload".to_string()
        }
    );
}

#[test]
fn test_malformed_payload_is_skipped_not_fatal() {
    let line = "::planloop-event:: {not json";
    assert!(decode_event_line("upload", line).is_none());
}

#[test]
fn test_encode_round_trips_through_decode() {
    let wire = WireStepEvent::Failed {
        message: "bad input".to_string(),
        trace: None,
    };
    let line = encode_event_line(&wire);
    let event = decode_event_line("check", &line).expect("round trip");
    assert_eq!(
        event,
        StepEvent::Failed {
            step: "check".to_string(),
            message: "bad input".to_string(),
            trace: None,
        }
    );
}

#[test]
fn test_exit_status_mapping() {
    assert_eq!(
        events_from_exit("job", true, 0),
        vec![StepEvent::Succeeded {
            step: "job".to_string()
        }]
    );

    let failed = events_from_exit("job", false, 3);
    match &failed[..] {
        [StepEvent::Failed { step, message, .. }] => {
            assert_eq!(step, "job");
            assert!(message.contains("status 3"));
        }
        other => panic!("unexpected events: {other:?}"),
    }
}
