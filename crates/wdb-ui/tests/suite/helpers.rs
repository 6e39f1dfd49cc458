use pretty_assertions::assert_eq;
use serde_json::json;
use wdb_runtime::{CallSignature, Completion, MockCompleter, MockMimeSniffer, Value};
use wdb_ui::MessageType;

use crate::harness::{all, kinds, only, Harness};

#[test]
fn completions_and_signatures_are_suggested() {
    let mut completer = MockCompleter::new();
    completer.set_completions(vec![Completion {
        name: "compute".to_string(),
        complete: "pute".to_string(),
        description: "function: compute".to_string(),
    }]);
    completer.set_call_signatures(vec![CallSignature {
        params: vec!["x\n".to_string()],
        index: Some(0),
        module: Some("lib".to_string()),
        call_name: "compute".to_string(),
    }]);
    let mut harness = Harness::builder().completer(completer).build();
    harness.run(&["complete|com", "quit"]).unwrap();

    assert_eq!(
        only(&harness.replies(), MessageType::Suggest),
        json!({
            "params": [{
                "params": ["x"],
                "index": 0,
                "module": "lib",
                "call_name": "compute",
            }],
            "completions": [{
                "base": "com",
                "complete": "pute",
                "description": "function: compute",
            }],
        })
    );
}

#[test]
fn completion_failures_send_an_empty_suggestion_and_a_log() {
    let mut failing = MockCompleter::new();
    failing.fail_completions();
    let mut harness = Harness::builder().completer(failing).build();
    harness.run(&["complete|x.", "quit"]).unwrap();

    let replies = harness.replies();
    assert_eq!(kinds(&replies), vec![MessageType::Suggest, MessageType::Log]);
    assert_eq!(replies[0].1, None);
    assert_eq!(
        only(&replies, MessageType::Log),
        json!({"message": "Completion failed for x.\ncompletion engine unavailable"})
    );

    let mut failing = MockCompleter::new();
    failing.fail_call_signatures();
    let mut harness = Harness::builder().completer(failing).build();
    harness.run(&["complete|compute(", "quit"]).unwrap();
    assert_eq!(
        only(&harness.replies(), MessageType::Log)["message"],
        "Completion of function failed for compute(\nsignature lookup unavailable"
    );
}

#[test]
fn display_encodes_the_value() {
    let mut harness = Harness::new();
    harness.run(&["display|name", "display|text/plain;name", "quit"]).unwrap();

    let displays = all(&harness.replies(), MessageType::Display);
    assert_eq!(
        displays[0],
        json!({"for": "name (text/html)", "val": "d2Ri", "type": "text/html"})
    );
    assert_eq!(displays[1]["type"], "text/plain");
    assert_eq!(displays[1]["for"], "name (text/plain)");
}

#[test]
fn display_asks_the_sniffer_for_a_mime_type() {
    let mut harness = Harness::builder()
        .runtime(|rt| rt.set_evaluation("png", Ok(Value::Bytes(b"\x89PNG".to_vec()))))
        .mime(MockMimeSniffer::answering("image/png"))
        .build();
    harness.run(&["display|png", "display|nope", "quit"]).unwrap();

    let replies = harness.replies();
    assert_eq!(
        only(&replies, MessageType::Display),
        json!({"for": "png (image/png)", "val": "iVBORw==", "type": "image/png"})
    );
    assert_eq!(only(&replies, MessageType::Echo)["for"], "Display failed");
}

#[test]
fn diff_renders_an_html_table() {
    let mut harness = Harness::builder()
        .runtime(|rt| {
            rt.set_evaluation("old", Ok(Value::str("a\nb")));
            rt.set_evaluation("new", Ok(Value::str("a\nc")));
        })
        .build();
    harness
        .run(&["diff|old!new", "diff|old<>new", "diff|old", "diff|old!missing", "quit"])
        .unwrap();

    let replies = harness.replies();
    let tables = all(&replies, MessageType::RawHtml);
    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0]["for"], "Difference between old!new");
    assert_eq!(tables[1]["for"], "Difference between old<>new");
    assert!(tables[0]["val"]
        .as_str()
        .unwrap()
        .contains("<tr class=\"changed\"><td>b</td><td>c</td></tr>"));

    let echoes = all(&replies, MessageType::Echo);
    assert_eq!(
        echoes[0],
        json!({"for": "Diff failed", "val": "Two expressions separated by ! or &lt;&gt; are expected"})
    );
    assert_eq!(echoes[1]["for"], "Diff failed");
    assert!(echoes[1]["val"].as_str().unwrap().contains("NameError"));
}

#[test]
fn structured_diff_lists_changed_entries() {
    let dict = |b: i64| {
        Value::Dict(vec![
            (Value::str("a"), Value::Int(1)),
            (Value::str("b"), Value::Int(b)),
        ])
    };
    let mut harness = Harness::builder()
        .runtime(|rt| {
            rt.set_evaluation("left", Ok(dict(2)));
            rt.set_evaluation("right", Ok(dict(3)));
        })
        .build();
    harness
        .run(&["structureddiff|left!right", "structureddiff|left!x", "quit"])
        .unwrap();

    let echoes = all(&harness.replies(), MessageType::Echo);
    assert_eq!(
        echoes[0],
        json!({
            "for": "Difference of structures left!right",
            "val": "- 'b': 2<br />+ 'b': 3",
            "mode": "diff",
        })
    );
    assert_eq!(
        echoes[1],
        json!({"for": "TypeError", "val": "A structure was expected"})
    );
}

#[test]
fn save_backs_up_and_rewrites_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("module.py");
    std::fs::write(&file, "old = 1\n").unwrap();
    let file = file.display().to_string();
    let missing = dir.path().join("missing.py").display().to_string();

    let mut harness = Harness::new();
    harness
        .run(&[
            &format!("save|{file}|new = 2\n"),
            &format!("save|{missing}|x = 1\n"),
            "save|no-source",
            "quit",
        ])
        .unwrap();

    assert_eq!(std::fs::read_to_string(&file).unwrap(), "new = 2\n");
    assert!(!std::path::Path::new(&missing).exists());

    let echoes = all(&harness.replies(), MessageType::Echo);
    assert_eq!(
        echoes[0],
        json!({"for": "Save successful", "val": format!("Wrote {file}")})
    );
    assert_eq!(echoes[1]["for"], "Error during save");
    assert_eq!(echoes[1]["val"], format!("No such file: {missing}"));
    assert_eq!(
        echoes[2],
        json!({"for": "Save failed", "val": "Expected a file name and its source"})
    );
}
