//! Collaborator contracts for the wdb session engine.
//!
//! `wdb-ui` drives a paused program exclusively through the traits in this
//! crate: an [`ExecutionRuntime`] that owns frames and evaluation, a
//! [`BreakpointStore`], and the optional helper services ([`Completer`],
//! [`Differ`], [`MimeSniffer`]).
//!
//! Deterministic in-memory doubles live in [`mock`] and are used by the
//! engine's integration tests.

pub mod mock;
mod value;

use serde::Serialize;
use thiserror::Error;

pub use mock::{MockBreakpointStore, MockCompleter, MockDiffer, MockExecution, MockMimeSniffer, MockRuntime};
pub use value::{Bindings, ObjectRef, Value};

pub type FrameId = u64;
pub type ObjectId = u64;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("no frame with id {0}")]
    UnknownFrame(FrameId),
    #[error("the runtime has no paused stack")]
    NotPaused,
    #[error("cannot set line {line}: {reason}")]
    InvalidLine { line: u32, reason: String },
    #[error("{0}")]
    Other(String),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Snapshot of one stack frame's scopes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    pub id: FrameId,
    pub globals: Bindings,
    pub locals: Bindings,
}

/// Per-frame summary sent to the front-end.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TraceEntry {
    pub file: String,
    pub function: String,
    pub lno: u32,
    /// Source line, `None` when the source is unavailable.
    pub code: Option<String>,
    pub level: usize,
    pub current: bool,
}

/// Stack as collected by the runtime, outermost frame first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Stack {
    pub frames: Vec<Frame>,
    pub trace: Vec<TraceEntry>,
    pub current: usize,
}

/// An exception raised by debugged code, captured with its traceback chain.
#[derive(Clone, Debug, PartialEq)]
pub struct CapturedException {
    pub type_name: String,
    pub message: String,
    /// Frames of the traceback, outermost first.
    pub traceback: Vec<FrameId>,
    /// Fully formatted traceback text.
    pub formatted: String,
}

impl CapturedException {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        let type_name = type_name.into();
        let message = message.into();
        let formatted = format!("{type_name}: {message}");
        Self {
            type_name,
            message,
            traceback: Vec::new(),
            formatted,
        }
    }

    pub fn with_traceback(mut self, traceback: Vec<FrameId>) -> Self {
        self.traceback = traceback;
        self
    }

    pub fn name_error(name: &str) -> Self {
        Self::new("NameError", format!("name '{name}' is not defined"))
    }

    /// The undefined name of a `NameError`, if this is one.
    pub fn undefined_name(&self) -> Option<&str> {
        if self.type_name != "NameError" {
            return None;
        }
        self.message
            .strip_prefix("name '")
            .and_then(|rest| rest.strip_suffix("' is not defined"))
    }

    pub fn deepest_frame(&self) -> Option<FrameId> {
        self.traceback.last().copied()
    }
}

/// Merged evaluation scope handed to the runtime.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scope {
    pub globals: Bindings,
    pub locals: Bindings,
}

impl Scope {
    /// Name lookup with locals shadowing globals.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.locals.get(name).or_else(|| self.globals.get(name))
    }
}

/// stdout/stderr text written while user code runs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutputCapture {
    stdout: String,
    stderr: String,
}

impl OutputCapture {
    pub fn write_stdout(&mut self, text: &str) {
        self.stdout.push_str(text);
    }

    pub fn write_stderr(&mut self, text: &str) {
        self.stderr.push_str(text);
    }

    pub fn stdout_lines(&self) -> Vec<String> {
        self.stdout.lines().map(str::to_owned).collect()
    }

    pub fn stderr_lines(&self) -> Vec<String> {
        self.stderr.lines().map(str::to_owned).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepMode {
    /// Step into.
    Step,
    /// Step over.
    Next,
    Continue,
    /// Step out.
    Return,
    /// Run until a line greater than the current one.
    Until,
}

/// The paused program.
pub trait ExecutionRuntime {
    /// Collects the stack rooted at `frame`. When `traceback` is given the
    /// stack follows that chain instead of the live frames.
    fn stack(&mut self, frame: FrameId, traceback: Option<&[FrameId]>) -> RuntimeResult<Stack>;

    /// Runs `code` in single-statement mode. The returned value is the one an
    /// interactive interpreter would display. Local rebinding is written into
    /// `scope.locals`.
    fn execute(
        &mut self,
        code: &str,
        scope: &mut Scope,
        output: &mut OutputCapture,
    ) -> Result<Option<Value>, CapturedException>;

    fn evaluate(&mut self, expression: &str, scope: &Scope) -> Result<Value, CapturedException>;

    fn is_importable(&self, module: &str) -> bool;

    fn set_line(&mut self, frame: FrameId, line: u32) -> RuntimeResult<()>;

    fn resume(&mut self, frame: FrameId, mode: StepMode) -> RuntimeResult<()>;

    fn stop_trace(&mut self);

    fn disable(&mut self);

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    /// Optional `cut` helper exposed to evaluated code.
    fn cut_helper(&self) -> Option<Value> {
        None
    }
}

/// Breakpoint as stored by the tracer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Breakpoint {
    #[serde(rename = "fn")]
    pub file: String,
    pub lno: Option<u32>,
    pub cond: Option<String>,
    pub fun: Option<String>,
    pub temporary: bool,
}

pub trait BreakpointStore {
    fn set_break(
        &mut self,
        file: &str,
        line: Option<u32>,
        temporary: bool,
        condition: Option<&str>,
        function: Option<&str>,
    ) -> RuntimeResult<Breakpoint>;

    fn clear_break(
        &mut self,
        file: &str,
        line: Option<u32>,
        temporary: bool,
        condition: Option<&str>,
        function: Option<&str>,
    ) -> RuntimeResult<()>;

    fn breakpoints(&self) -> Vec<Breakpoint>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Completion {
    /// Full completed identifier.
    pub name: String,
    /// Suffix of `name` still to be typed.
    pub complete: String,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CallSignature {
    pub params: Vec<String>,
    pub index: Option<usize>,
    pub module: Option<String>,
    pub call_name: String,
}

pub trait Completer {
    fn completions(&mut self, source: &str, scope: &Scope) -> RuntimeResult<Vec<Completion>>;

    fn call_signatures(&mut self, source: &str, scope: &Scope) -> RuntimeResult<Vec<CallSignature>>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiffError {
    #[error("cannot diff {left} against {right}")]
    NotDiffable { left: String, right: String },
}

pub trait Differ {
    /// Side-by-side HTML table comparing two texts line by line.
    fn html_diff(&self, left: &str, right: &str) -> String;

    fn structured_diff(&self, left: &Value, right: &Value) -> Result<String, DiffError>;
}

pub trait MimeSniffer {
    fn sniff(&self, bytes: &[u8]) -> Option<String>;
}
