use pretty_assertions::assert_eq;
use serde_json::json;
use wdb_ui::MessageType;

use crate::harness::{all, kinds, only, Harness, INNERMOST, LIB_PY};

#[test]
fn select_moves_the_current_frame() {
    let mut harness = Harness::new();
    harness.run(&["select|0", "select|7", "select|x", "trace", "quit"]).unwrap();

    let replies = harness.replies();
    assert_eq!(
        kinds(&replies),
        vec![
            MessageType::SelectCheck,
            MessageType::Watched,
            MessageType::Echo,
            MessageType::Watched,
            MessageType::Echo,
            MessageType::Watched,
            MessageType::Trace,
        ]
    );
    let check = only(&replies, MessageType::SelectCheck);
    assert_eq!(check["name"], "main.py");
    assert_eq!(check["frame"]["function"], "<module>");

    let echoes = all(&replies, MessageType::Echo);
    assert_eq!(echoes[0]["for"], "Select failed");
    assert_eq!(
        echoes[0]["val"],
        "frame index 7 out of range (stack has 3 frames)"
    );
    assert_eq!(echoes[1]["for"], "Select failed");
}

#[test]
fn file_sends_the_requested_source() {
    let mut harness = Harness::new();
    harness.run(&["file|lib.py", "file|nowhere.py", "quit"]).unwrap();

    let selects = all(&harness.replies(), MessageType::Select);
    assert_eq!(selects[0]["name"], "lib.py");
    assert_eq!(selects[0]["file"], LIB_PY);
    assert_eq!(selects[0]["frame"]["lno"], 5);
    assert_eq!(selects[1]["name"], "nowhere.py");
    assert!(selects[1]["file"].is_null());
}

#[test]
fn jump_rewrites_the_current_line() {
    let mut harness = Harness::new();
    harness.run(&["jump|3", "quit"]).unwrap();

    assert_eq!(harness.debugger.runtime().lines_set, vec![(INNERMOST, 3)]);
    let replies = harness.replies();
    assert_eq!(kinds(&replies), vec![MessageType::Trace, MessageType::SelectCheck]);
    assert_eq!(only(&replies, MessageType::Trace)["trace"][2]["lno"], 3);
    assert_eq!(only(&replies, MessageType::SelectCheck)["frame"]["lno"], 3);
}

#[test]
fn jump_only_works_on_the_innermost_frame() {
    let mut harness = Harness::new();
    harness.run(&["select|1", "jump|3", "quit"]).unwrap();

    assert!(harness.debugger.runtime().lines_set.is_empty());
    assert_eq!(
        kinds(&harness.replies()),
        vec![MessageType::SelectCheck, MessageType::Watched]
    );
}

#[test]
fn refused_jumps_are_reported() {
    let mut harness = Harness::builder()
        .runtime(|rt| rt.refuse_line(1, "can't jump into the middle of a block"))
        .build();
    harness.run(&["jump|1", "jump|one", "quit"]).unwrap();

    let echoes = all(&harness.replies(), MessageType::Echo);
    assert_eq!(
        echoes[0],
        json!({
            "for": "Jump failed",
            "val": "cannot set line 1: can't jump into the middle of a block",
        })
    );
    assert_eq!(echoes[1]["for"], "Jump failed");
    assert!(harness.debugger.runtime().lines_set.is_empty());
}
