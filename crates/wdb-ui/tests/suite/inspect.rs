use pretty_assertions::assert_eq;
use serde_json::json;
use wdb_runtime::{CapturedException, MockExecution, ObjectRef, Value};
use wdb_ui::{Exit, MessageType};

use crate::harness::{all, frame, kinds, only, stack, Harness};

fn point() -> Value {
    Value::Object(
        ObjectRef::new(77, "Point", "Point(1, 2)")
            .with_attribute("x", Value::Int(1))
            .with_attribute("y", Value::Int(2))
            .with_doc("A point")
            .with_source("class Point: ..."),
    )
}

#[test]
fn dump_evaluates_and_lists_attributes() {
    let mut harness = Harness::builder()
        .runtime(|rt| rt.set_evaluation("p", Ok(point())))
        .build();
    harness.run(&["dump|p", "dump|missing", "quit"]).unwrap();

    let replies = harness.replies();
    assert_eq!(kinds(&replies), vec![MessageType::Dump, MessageType::Echo]);
    assert_eq!(
        only(&replies, MessageType::Dump),
        json!({
            "for": "p \u{27f6} Point(1, 2) ",
            "val": {"x": "1", "y": "2"},
            "doc": "A point",
            "source": "class Point: ...",
        })
    );
    let echo = only(&replies, MessageType::Echo);
    assert_eq!(echo["for"], "Dump failed");
    assert!(echo["val"]
        .as_str()
        .unwrap()
        .contains("NameError: name 'missing' is not defined"));
}

#[test]
fn printed_objects_can_be_inspected_by_handle() {
    let mut harness = Harness::builder()
        .runtime(|rt| rt.push_execution("p", MockExecution::value(point())))
        .build();
    harness.run(&["eval|p", "inspect|1", "quit"]).unwrap();

    let replies = harness.replies();
    assert_eq!(
        only(&replies, MessageType::Print)["result"],
        "<a href=\"1\" class=\"inspect\">Point(1, 2)</a>"
    );
    let dump = only(&replies, MessageType::Dump);
    assert_eq!(dump["for"], "Point(1, 2)");
    assert_eq!(dump["val"], json!({"x": "1", "y": "2"}));
    assert_eq!(dump["doc"], "A point");
}

#[test]
fn bad_handles_are_validation_failures() {
    let mut harness = Harness::new();
    harness.run(&["inspect|abc", "inspect|99", "ping", "quit"]).unwrap();

    let replies = harness.replies();
    let echoes = all(&replies, MessageType::Echo);
    assert_eq!(echoes.len(), 2);
    assert_eq!(echoes[0]["for"], "Inspect failed");
    assert_eq!(echoes[1]["for"], "Inspect failed");
    assert_eq!(echoes[1]["val"], "No object with handle 99");
    assert_eq!(kinds(&replies).last(), Some(&MessageType::Pong));
}

fn raising_harness() -> Harness {
    Harness::builder()
        .runtime(|rt| {
            rt.push_execution(
                "boom()",
                MockExecution::raise(
                    CapturedException::new("KeyError", "'k'").with_traceback(vec![3, 4]),
                ),
            );
            rt.set_stack(
                4,
                stack(vec![
                    frame(3, "lib.py", "compute", 5, &[("x", Value::Int(41))]),
                    frame(4, "lib.py", "helper", 9, &[("k", Value::str("k"))]),
                ]),
            );
        })
        .build()
}

#[test]
fn inspecting_an_exception_opens_a_nested_session() {
    let mut harness = raising_harness();
    let exit = harness
        .run(&["eval|boom()", "inspect|1", "eval|k", "continue", "ping", "quit"])
        .unwrap();
    assert_eq!(exit, Exit::Quit);

    let replies = harness.replies();
    assert_eq!(
        kinds(&replies),
        vec![
            MessageType::Print,
            MessageType::Watched,
            // Nested session.
            MessageType::Title,
            MessageType::Trace,
            MessageType::SelectCheck,
            MessageType::Watched,
            MessageType::Print,
            MessageType::Watched,
            // Back in the parent.
            MessageType::Title,
            MessageType::Trace,
            MessageType::SelectCheck,
            MessageType::Watched,
            MessageType::Pong,
        ]
    );

    let titles = all(&replies, MessageType::Title);
    assert_eq!(titles[0], json!({"title": "RECURSIVE KeyError", "subtitle": "'k'"}));
    assert_eq!(titles[1], json!({"title": "ValueError", "subtitle": "bad value"}));

    let checks = all(&replies, MessageType::SelectCheck);
    assert_eq!(checks[0]["frame"]["function"], "helper");
    assert_eq!(checks[1]["frame"]["function"], "compute");

    // The nested session evaluates in the traceback frame.
    assert_eq!(all(&replies, MessageType::Print)[1]["result"], "'k'");
    // Leaving a nested session does not resume the program.
    assert!(harness.debugger.runtime().resumed.is_empty());
}

#[test]
fn stepping_out_of_a_nested_session_leaves_the_program_paused() {
    let mut harness = raising_harness();
    // The parent session reopens, then the front-end hangs up.
    let result = harness.run(&["eval|boom()", "inspect|1", "step"]);
    assert!(result.is_err());

    assert!(!harness.debugger.is_stepping());
    assert!(harness.debugger.runtime().resumed.is_empty());
    let titles = all(&harness.frames(), MessageType::Title);
    assert_eq!(titles.len(), 3);
    assert_eq!(titles[2]["title"], titles[0]["title"]);
}

#[test]
fn quit_from_a_nested_session_ends_every_session() {
    let mut harness = raising_harness();
    let exit = harness
        .run(&["eval|boom()", "inspect|1", "quit"])
        .unwrap();
    assert_eq!(exit, Exit::Quit);
    assert_eq!(harness.debugger.runtime().stop_trace_calls, 1);

    let titles = all(&harness.frames(), MessageType::Title);
    assert_eq!(titles.len(), 2);
    assert_eq!(titles[1]["title"], "RECURSIVE KeyError");
}

#[test]
fn exceptions_without_a_traceback_are_dumped() {
    let mut harness = Harness::builder()
        .runtime(|rt| {
            rt.push_execution(
                "fail()",
                MockExecution::raise(CapturedException::new("OSError", "disk <full>")),
            );
        })
        .build();
    harness.run(&["eval|fail()", "inspect|1", "quit"]).unwrap();

    let dump = only(&harness.replies(), MessageType::Dump);
    assert_eq!(dump["for"], "OSError: disk <full>");
    assert_eq!(dump["val"]["__class__"], "OSError");
    assert_eq!(dump["val"]["args"], "disk &lt;full&gt;");
}
