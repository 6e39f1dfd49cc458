use pretty_assertions::assert_eq;
use serde_json::json;
use wdb_ui::MessageType;

use crate::harness::{all, kinds, only, Harness};

fn break_request(lno: serde_json::Value) -> String {
    let request = json!({
        "fn": "lib.py",
        "lno": lno,
        "temporary": false,
        "cond": null,
        "fun": null,
    });
    format!("break|{request}")
}

#[test]
fn executable_lines_accept_breakpoints() {
    let mut harness = Harness::new();
    harness
        .run(&[
            &break_request(json!(5)),
            r#"break|{"fn": "main.py", "lno": null, "temporary": true, "cond": "i > 1", "fun": "run"}"#,
            "quit",
        ])
        .unwrap();

    let sets = all(&harness.replies(), MessageType::BreakSet);
    assert_eq!(
        sets[0],
        json!({"fn": "lib.py", "lno": 5, "temporary": false, "cond": null, "fun": null})
    );
    assert_eq!(
        sets[1],
        json!({"fn": "main.py", "lno": null, "temporary": true, "cond": "i > 1", "fun": "run"})
    );
}

#[test]
fn numeric_strings_are_accepted_as_lines() {
    let mut harness = Harness::new();
    harness.run(&[&break_request(json!("3")), "quit"]).unwrap();
    assert_eq!(only(&harness.replies(), MessageType::BreakSet)["lno"], 3);
}

#[test]
fn invalid_lines_are_rejected_before_reaching_the_store() {
    let mut harness = Harness::new();
    harness
        .run(&[
            &break_request(json!(2)),
            &break_request(json!(4)),
            &break_request(json!(40)),
            &break_request(json!("abc")),
            "breakpoints",
            "quit",
        ])
        .unwrap();

    let replies = harness.replies();
    let echoes = all(&replies, MessageType::Echo);
    assert_eq!(
        echoes,
        vec![
            json!({"for": "Break on lib.py:2 failed", "val": "Blank line or comment"}),
            json!({"for": "Break on lib.py:4 failed", "val": "Blank line or comment"}),
            json!({"for": "Break on lib.py:40 failed", "val": "Line does not exist"}),
            json!({
                "for": "Break on lib.py:abc failed",
                "val": "Wrong breakpoint format must be [file][:lineno][#function][,condition].",
            }),
        ]
    );
    assert_eq!(
        only(&replies, MessageType::Print),
        json!({"for": "Breakpoints", "result": []})
    );
}

#[test]
fn unbreak_echoes_its_payload_and_clears_the_store() {
    let unbreak = r#"unbreak|{"fn": "lib.py", "lno": "5", "temporary": false, "cond": null, "fun": null}"#;
    let mut harness = Harness::new();
    harness
        .run(&[&break_request(json!(5)), "breakpoints", unbreak, "breakpoints", "quit"])
        .unwrap();

    let replies = harness.replies();
    assert_eq!(
        kinds(&replies),
        vec![
            MessageType::BreakSet,
            MessageType::Print,
            MessageType::BreakUnset,
            MessageType::Print,
        ]
    );
    let listings = all(&replies, MessageType::Print);
    assert_eq!(listings[0]["result"][0]["lno"], 5);
    assert_eq!(listings[1]["result"], json!([]));

    // The request is echoed verbatim, string line number included.
    let unset = only(&replies, MessageType::BreakUnset);
    assert_eq!(unset["lno"], "5");
    let raw = format!("BreakUnset|{}", &unbreak["unbreak|".len()..]);
    assert!(harness.transport.sent().contains(&raw));
}

#[test]
fn malformed_break_payloads_fail_the_command() {
    let mut harness = Harness::new();
    harness.run(&["break|not json", "ping", "quit"]).unwrap();

    let replies = harness.replies();
    assert_eq!(kinds(&replies), vec![MessageType::Echo, MessageType::Pong]);
    assert_eq!(only(&replies, MessageType::Echo)["for"], "Break failed");
}
