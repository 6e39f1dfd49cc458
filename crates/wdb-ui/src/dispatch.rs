//! Command routing tables.

use wdb_runtime::StepMode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Start,
    Select,
    File,
    Inspect,
    Dump,
    Trace,
    Eval,
    Ping,
    Step,
    Next,
    Continue,
    Return,
    Until,
    Break,
    Unbreak,
    Breakpoints,
    Watch,
    Unwatch,
    Jump,
    Complete,
    Save,
    Display,
    Disable,
    Quit,
    Diff,
    StructuredDiff,
}

/// Wire name → command. Names are matched after lowercasing.
pub const COMMANDS: &[(&str, Command)] = &[
    ("start", Command::Start),
    ("select", Command::Select),
    ("file", Command::File),
    ("inspect", Command::Inspect),
    ("dump", Command::Dump),
    ("trace", Command::Trace),
    ("eval", Command::Eval),
    ("ping", Command::Ping),
    ("step", Command::Step),
    ("next", Command::Next),
    ("continue", Command::Continue),
    ("return", Command::Return),
    ("until", Command::Until),
    ("break", Command::Break),
    ("unbreak", Command::Unbreak),
    ("breakpoints", Command::Breakpoints),
    ("watch", Command::Watch),
    ("unwatch", Command::Unwatch),
    ("jump", Command::Jump),
    ("complete", Command::Complete),
    ("save", Command::Save),
    ("display", Command::Display),
    ("disable", Command::Disable),
    ("quit", Command::Quit),
    ("diff", Command::Diff),
    ("structureddiff", Command::StructuredDiff),
];

impl Command {
    pub fn from_name(name: &str) -> Option<Self> {
        COMMANDS
            .iter()
            .find(|(wire, _)| *wire == name)
            .map(|(_, command)| *command)
    }

    pub fn name(self) -> &'static str {
        COMMANDS
            .iter()
            .find(|(_, command)| *command == self)
            .map(|(wire, _)| *wire)
            .unwrap_or("unknown")
    }

    /// Resume mode for the stepping commands.
    pub fn step_mode(self) -> Option<StepMode> {
        match self {
            Command::Step => Some(StepMode::Step),
            Command::Next => Some(StepMode::Next),
            Command::Continue => Some(StepMode::Continue),
            Command::Return => Some(StepMode::Return),
            Command::Until => Some(StepMode::Until),
            _ => None,
        }
    }
}

/// Work run after a command (or the open sequence) completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hook {
    UpdateWatchers,
}

/// Events that can trigger hooks: a completed command or a session opening.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookEvent {
    Command(Command),
    Init,
}

pub const HOOKS: &[(Hook, &[HookEvent])] = &[(
    Hook::UpdateWatchers,
    &[
        HookEvent::Command(Command::Start),
        HookEvent::Command(Command::Eval),
        HookEvent::Command(Command::Watch),
        HookEvent::Init,
        HookEvent::Command(Command::Select),
        HookEvent::Command(Command::Unwatch),
    ],
)];

pub fn hooks_for(event: HookEvent) -> impl Iterator<Item = Hook> {
    HOOKS
        .iter()
        .filter(move |(_, events)| events.contains(&event))
        .map(|(hook, _)| *hook)
}
