use pretty_assertions::assert_eq;
use serde_json::json;
use std::io;
use wdb_ui::{Exit, MessageType, PauseEvent, UiError};

use crate::harness::{kinds, only, Harness, INNERMOST};

#[test]
fn open_sequence_announces_the_pause() {
    let mut harness = Harness::new();
    let exit = harness.run(&["quit"]).unwrap();
    assert_eq!(exit, Exit::Quit);

    let frames = harness.frames();
    assert_eq!(
        kinds(&frames),
        vec![
            MessageType::Title,
            MessageType::Trace,
            MessageType::SelectCheck,
            MessageType::Watched,
        ]
    );
    assert_eq!(
        only(&frames, MessageType::Title),
        json!({"title": "ValueError", "subtitle": "bad value"})
    );

    let trace = only(&frames, MessageType::Trace);
    assert!(trace["cwd"].is_string());
    assert_eq!(trace["trace"].as_array().map(Vec::len), Some(3));
    assert_eq!(trace["trace"][2]["function"], "compute");

    let check = only(&frames, MessageType::SelectCheck);
    assert_eq!(check["name"], "lib.py");
    assert_eq!(check["frame"]["level"], 2);
    assert_eq!(check["frame"]["lno"], 5);
    assert_eq!(only(&frames, MessageType::Watched), json!({}));
}

#[test]
fn pending_message_is_flushed_after_the_selection() {
    let mut harness = Harness::new();
    let event = PauseEvent::new(INNERMOST, "Breakpoint", "lib.py:5")
        .with_init_message("Echo|{\"for\":\"Hello\",\"val\":\"\"}");
    harness.run_event(event, &["ping", "quit"]).unwrap();

    assert_eq!(
        kinds(&harness.frames()),
        vec![
            MessageType::Title,
            MessageType::Trace,
            MessageType::SelectCheck,
            MessageType::Echo,
            MessageType::Watched,
            MessageType::Pong,
        ]
    );
}

#[test]
fn shell_sessions_skip_the_trace() {
    let mut harness = Harness::new();
    let event = PauseEvent::new(INNERMOST, "Wdb", "").shell();
    harness.run_event(event, &["eval|x", "quit"]).unwrap();

    let frames = harness.frames();
    assert_eq!(
        &kinds(&frames)[..3],
        &[MessageType::Title, MessageType::Shell, MessageType::Watched]
    );
    // The frame locals are not visible from a shell.
    let print = only(&frames, MessageType::Print);
    assert!(
        print["result"].as_str().unwrap().contains("NameError: name 'x' is not defined"),
        "{print}"
    );
}

#[test]
fn start_reports_breakpoints_and_resets_to_the_innermost_frame() {
    let mut harness = Harness::new();
    harness
        .run(&[
            r#"break|{"fn": "lib.py", "lno": 5, "temporary": false, "cond": null, "fun": null}"#,
            "select|0",
            "start",
            "quit",
        ])
        .unwrap();

    let frames = harness.replies();
    assert_eq!(
        kinds(&frames),
        vec![
            MessageType::BreakSet,
            MessageType::SelectCheck,
            MessageType::Watched,
            MessageType::Init,
            MessageType::Title,
            MessageType::Trace,
            MessageType::SelectCheck,
            MessageType::Watched,
        ]
    );

    let init = only(&frames, MessageType::Init);
    assert!(init["cwd"].is_string());
    assert!(!init["version"].as_str().unwrap().is_empty());
    assert_eq!(init["breaks"][0]["fn"], "lib.py");
    assert_eq!(init["breaks"][0]["lno"], 5);

    // `start` sends the trace without the working directory.
    let trace = only(&frames, MessageType::Trace);
    assert!(trace.get("cwd").is_none());

    let checks: Vec<_> = frames
        .iter()
        .filter(|(kind, _)| *kind == MessageType::SelectCheck)
        .map(|(_, payload)| payload.clone().unwrap())
        .collect();
    assert_eq!(checks[0]["frame"]["level"], 0);
    assert_eq!(checks[1]["frame"]["level"], 2);
}

#[test]
fn commands_are_case_insensitive_and_unknown_ones_are_dropped() {
    let mut harness = Harness::new();
    harness.run(&["bogus|payload", "PING", "Quit"]).unwrap();
    assert_eq!(kinds(&harness.replies()), vec![MessageType::Pong]);
}

#[test]
fn interrupt_while_waiting_quits() {
    let mut harness = Harness::new();
    harness.transport.push_error(io::ErrorKind::Interrupted);
    let exit = harness.run(&[]).unwrap();
    assert_eq!(exit, Exit::Quit);
    assert_eq!(harness.debugger.runtime().stop_trace_calls, 1);
}

#[test]
fn a_closed_transport_ends_the_interaction() {
    let mut harness = Harness::new();
    let err = harness.run(&[]).unwrap_err();
    assert!(matches!(err, UiError::Transport(ref source) if source.kind() == io::ErrorKind::UnexpectedEof));
}

#[test]
fn unknown_pause_frames_are_reported_before_anything_is_sent() {
    let mut harness = Harness::new();
    let err = harness
        .run_event(PauseEvent::new(42, "ValueError", ""), &["quit"])
        .unwrap_err();
    assert!(matches!(err, UiError::Runtime(_)), "{err}");
    assert!(harness.frames().is_empty());
}
