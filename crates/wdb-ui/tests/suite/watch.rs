use pretty_assertions::assert_eq;
use serde_json::json;
use wdb_ui::MessageType;

use crate::harness::{all, kinds, Harness};

#[test]
fn watches_are_acknowledged_then_refreshed() {
    let mut harness = Harness::new();
    harness.run(&["watch|x", "watch|missing", "quit"]).unwrap();

    let replies = harness.replies();
    assert_eq!(
        kinds(&replies),
        vec![
            MessageType::Ack,
            MessageType::Watched,
            MessageType::Ack,
            MessageType::Watched,
        ]
    );
    let watched = all(&replies, MessageType::Watched);
    assert_eq!(watched[0], json!({"x": "41"}));
    // Failing expressions show the exception type only.
    assert_eq!(watched[1], json!({"x": "41", "missing": "NameError"}));
}

#[test]
fn unwatch_removes_the_expression() {
    let mut harness = Harness::new();
    harness
        .run(&["watch|x", "watch|name", "unwatch|x", "unwatch|never", "quit"])
        .unwrap();

    let watched = all(&harness.replies(), MessageType::Watched);
    assert_eq!(watched.len(), 4);
    assert_eq!(watched[1], json!({"x": "41", "name": "'wdb'"}));
    assert_eq!(watched[2], json!({"name": "'wdb'"}));
    assert_eq!(watched[3], json!({"name": "'wdb'"}));
    assert_eq!(harness.debugger.watchers().watched("lib.py"), &["name".to_string()]);
}

#[test]
fn watches_belong_to_the_file_they_were_set_in() {
    let mut harness = Harness::new();
    harness
        .run(&["watch|x", "watch|x", "select|1", "select|2", "quit"])
        .unwrap();

    let watched = all(&harness.replies(), MessageType::Watched);
    assert_eq!(
        watched,
        vec![
            json!({"x": "41"}),
            json!({"x": "41"}),
            json!({}),
            json!({"x": "41"}),
        ]
    );
    assert_eq!(harness.debugger.watchers().watched("lib.py").len(), 1);
}

#[test]
fn watches_survive_between_pauses() {
    let mut harness = Harness::new();
    harness.run(&["watch|x", "next"]).unwrap();
    harness.transport.take_sent();

    harness.run(&["quit"]).unwrap();
    assert_eq!(
        all(&harness.frames(), MessageType::Watched),
        vec![json!({"x": "41"})]
    );
}
