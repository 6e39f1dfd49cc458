use pretty_assertions::assert_eq;
use wdb_runtime::StepMode;
use wdb_ui::{Exit, MessageType};

use crate::harness::{kinds, Harness, INNERMOST};

#[test]
fn stepping_commands_resume_the_current_frame() {
    let cases = [
        ("step", StepMode::Step, true),
        ("next", StepMode::Next, true),
        ("return", StepMode::Return, true),
        ("until", StepMode::Until, true),
        ("continue", StepMode::Continue, false),
    ];
    for (command, mode, stepping) in cases {
        let mut harness = Harness::new();
        let exit = harness.run(&[command, "ping"]).unwrap();

        assert_eq!(exit, Exit::Resumed(mode), "{command}");
        assert_eq!(harness.debugger.runtime().resumed, vec![(INNERMOST, mode)], "{command}");
        assert_eq!(harness.debugger.is_stepping(), stepping, "{command}");
        // The interaction ends before the queued ping.
        assert!(harness.replies().is_empty(), "{command}");
        assert_eq!(harness.debugger.runtime().stop_trace_calls, 0, "{command}");
    }
}

#[test]
fn resume_targets_the_selected_frame() {
    let mut harness = Harness::new();
    let exit = harness.run(&["select|0", "step"]).unwrap();
    assert_eq!(exit, Exit::Resumed(StepMode::Step));
    assert_eq!(harness.debugger.runtime().resumed, vec![(1, StepMode::Step)]);
}

#[test]
fn continue_after_stepping_clears_the_flag() {
    let mut harness = Harness::new();
    harness.run(&["next"]).unwrap();
    assert!(harness.debugger.is_stepping());

    harness.run(&["continue"]).unwrap();
    assert!(!harness.debugger.is_stepping());
    assert_eq!(
        harness.debugger.runtime().resumed,
        vec![(INNERMOST, StepMode::Next), (INNERMOST, StepMode::Continue)]
    );
}

#[test]
fn disable_turns_the_debugger_off() {
    let mut harness = Harness::new();
    harness.run(&["step"]).unwrap();

    let exit = harness.run(&["disable", "ping"]).unwrap();
    assert_eq!(exit, Exit::Disabled);
    assert!(!harness.debugger.is_enabled());
    assert!(!harness.debugger.is_stepping());

    let runtime = harness.debugger.runtime();
    assert!(runtime.disabled);
    assert_eq!(runtime.stop_trace_calls, 1);
    assert_eq!(runtime.resumed.len(), 1);
}

#[test]
fn quit_stops_tracing() {
    let mut harness = Harness::new();
    harness.run(&["next"]).unwrap();
    let exit = harness.run(&["quit", "ping"]).unwrap();

    assert_eq!(exit, Exit::Quit);
    assert!(!harness.debugger.is_stepping());
    assert!(harness.debugger.is_enabled());
    assert_eq!(harness.debugger.runtime().stop_trace_calls, 1);
    assert!(!kinds(&harness.frames()).contains(&MessageType::Pong));
}
