use thiserror::Error;
use wdb_runtime::{Bindings, Frame, FrameId, Stack, TraceEntry};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Created, open sequence not sent yet.
    Opening,
    Active,
    /// A nested session drilled down from this one is running.
    NestedSuspended,
    Terminated,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("the runtime returned an empty stack")]
    EmptyStack,
    #[error("frame index {index} out of range (stack has {len} frames)")]
    FrameOutOfRange { index: usize, len: usize },
    #[error("invalid session transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },
}

/// Why the program paused, and what the front-end should be told about it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PauseEvent {
    /// Innermost frame of the pause.
    pub frame: FrameId,
    /// Traceback chain, outermost first, when pausing on an exception.
    pub traceback: Option<Vec<FrameId>>,
    pub title: String,
    pub subtitle: String,
    /// Frame sent verbatim once the session has opened.
    pub init_message: Option<String>,
    /// Interactive shell pause with its own empty scope.
    pub shell: bool,
}

impl PauseEvent {
    pub fn new(frame: FrameId, title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        Self {
            frame,
            traceback: None,
            title: title.into(),
            subtitle: subtitle.into(),
            init_message: None,
            shell: false,
        }
    }

    pub fn with_traceback(mut self, traceback: Vec<FrameId>) -> Self {
        self.traceback = Some(traceback);
        self
    }

    pub fn with_init_message(mut self, message: impl Into<String>) -> Self {
        self.init_message = Some(message.into());
        self
    }

    pub fn shell(mut self) -> Self {
        self.shell = true;
        self
    }
}

/// One paused stack as browsed by the front-end.
///
/// Invariant: `index < frames.len()`, and `locals`/`trace` have one entry per
/// frame.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    parent: Option<SessionId>,
    state: SessionState,
    frames: Vec<Frame>,
    locals: Vec<Bindings>,
    trace: Vec<TraceEntry>,
    index: usize,
    title: String,
    subtitle: String,
    shell: bool,
    init_message: Option<String>,
}

impl Session {
    pub fn new(
        id: SessionId,
        parent: Option<SessionId>,
        stack: Stack,
        event: PauseEvent,
    ) -> Result<Self, SessionError> {
        let Stack {
            frames,
            mut trace,
            current,
        } = stack;
        if frames.is_empty() {
            return Err(SessionError::EmptyStack);
        }
        if current >= frames.len() {
            return Err(SessionError::FrameOutOfRange {
                index: current,
                len: frames.len(),
            });
        }
        // Pad or cut the trace so every frame has a summary.
        trace.truncate(frames.len());
        while trace.len() < frames.len() {
            let level = trace.len();
            trace.push(TraceEntry {
                file: String::new(),
                function: String::new(),
                lno: 0,
                code: None,
                level,
                current: level == current,
            });
        }

        let mut locals: Vec<Bindings> = frames.iter().map(|frame| frame.locals.clone()).collect();
        if event.shell {
            locals[current] = Bindings::new();
        }

        Ok(Self {
            id,
            parent,
            state: SessionState::Opening,
            frames,
            locals,
            trace,
            index: current,
            title: event.title,
            subtitle: event.subtitle,
            shell: event.shell,
            init_message: event.init_message,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn parent(&self) -> Option<SessionId> {
        self.parent
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_shell(&self) -> bool {
        self.shell
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subtitle(&self) -> &str {
        &self.subtitle
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    pub fn current(&self) -> &TraceEntry {
        &self.trace[self.index]
    }

    pub fn current_frame(&self) -> &Frame {
        &self.frames[self.index]
    }

    pub fn current_file(&self) -> &str {
        &self.current().file
    }

    pub fn current_locals(&self) -> &Bindings {
        &self.locals[self.index]
    }

    pub fn set_current_locals(&mut self, locals: Bindings) {
        self.locals[self.index] = locals;
    }

    pub fn is_innermost(&self) -> bool {
        self.index + 1 == self.frames.len()
    }

    pub fn select(&mut self, index: usize) -> Result<(), SessionError> {
        if index >= self.frames.len() {
            return Err(SessionError::FrameOutOfRange {
                index,
                len: self.frames.len(),
            });
        }
        self.index = index;
        Ok(())
    }

    pub fn select_innermost(&mut self) {
        self.index = self.frames.len() - 1;
    }

    /// Records a successful line jump in the current trace entry.
    pub fn set_current_line(&mut self, lno: u32) {
        self.trace[self.index].lno = lno;
    }

    pub fn take_init_message(&mut self) -> Option<String> {
        self.init_message.take()
    }

    fn transition(&mut self, from: &[SessionState], to: SessionState) -> Result<(), SessionError> {
        if !from.contains(&self.state) {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        tracing::trace!(target: "wdb.ui", session = self.id.0, from = ?self.state, to = ?to, "session transition");
        self.state = to;
        Ok(())
    }

    /// Open sequence sent (also after a nested session returns).
    pub fn activate(&mut self) -> Result<(), SessionError> {
        self.transition(
            &[SessionState::Opening, SessionState::NestedSuspended],
            SessionState::Active,
        )
    }

    pub fn suspend(&mut self) -> Result<(), SessionError> {
        self.transition(&[SessionState::Active], SessionState::NestedSuspended)
    }

    pub fn terminate(&mut self) {
        self.state = SessionState::Terminated;
    }
}
