use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::{
    Breakpoint, BreakpointStore, CallSignature, CapturedException, Completer, Completion,
    DiffError, Differ, ExecutionRuntime, FrameId, MimeSniffer, OutputCapture, RuntimeError,
    RuntimeResult, Scope, Stack, StepMode, Value,
};

/// Scripted outcome of one `execute` call.
#[derive(Clone, Debug)]
pub struct MockExecution {
    pub result: Result<Option<Value>, CapturedException>,
    pub stdout: String,
    pub stderr: String,
    pub bindings: Vec<(String, Value)>,
}

impl MockExecution {
    pub fn value(value: Value) -> Self {
        Self::with_result(Ok(Some(value)))
    }

    pub fn statement() -> Self {
        Self::with_result(Ok(None))
    }

    pub fn raise(exception: CapturedException) -> Self {
        Self::with_result(Err(exception))
    }

    fn with_result(result: Result<Option<Value>, CapturedException>) -> Self {
        Self {
            result,
            stdout: String::new(),
            stderr: String::new(),
            bindings: Vec::new(),
        }
    }

    pub fn stdout(mut self, text: impl Into<String>) -> Self {
        self.stdout = text.into();
        self
    }

    pub fn stderr(mut self, text: impl Into<String>) -> Self {
        self.stderr = text.into();
        self
    }

    /// Local rebinding performed by the statement.
    pub fn binds(mut self, name: impl Into<String>, value: Value) -> Self {
        self.bindings.push((name.into(), value));
        self
    }
}

/// Deterministic, in-memory execution runtime.
///
/// Scripted executions/evaluations are consumed in order per source text.
/// Unscripted sources fall back to a tiny interpreter that understands
/// identifiers, integer and quoted string literals, and `name = <atom>`.
#[derive(Default)]
pub struct MockRuntime {
    stacks: HashMap<FrameId, Stack>,
    executions: HashMap<String, VecDeque<MockExecution>>,
    evaluations: HashMap<String, VecDeque<Result<Value, CapturedException>>>,
    importable: BTreeSet<String>,
    refused_lines: HashMap<u32, String>,
    cut: Option<Value>,
    pub executed: Vec<String>,
    pub evaluated: Vec<String>,
    pub scopes: Vec<Scope>,
    pub resumed: Vec<(FrameId, StepMode)>,
    pub lines_set: Vec<(FrameId, u32)>,
    pub stop_trace_calls: usize,
    pub disabled: bool,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the stack returned for a session rooted at `frame`.
    pub fn set_stack(&mut self, frame: FrameId, stack: Stack) {
        self.stacks.insert(frame, stack);
    }

    pub fn push_execution(&mut self, code: impl Into<String>, execution: MockExecution) {
        self.executions
            .entry(code.into())
            .or_default()
            .push_back(execution);
    }

    pub fn set_evaluation(
        &mut self,
        expression: impl Into<String>,
        result: Result<Value, CapturedException>,
    ) {
        self.evaluations
            .entry(expression.into())
            .or_default()
            .push_back(result);
    }

    pub fn add_importable(&mut self, module: impl Into<String>) {
        self.importable.insert(module.into());
    }

    pub fn refuse_line(&mut self, line: u32, reason: impl Into<String>) {
        self.refused_lines.insert(line, reason.into());
    }

    pub fn set_cut_helper(&mut self, helper: Value) {
        self.cut = Some(helper);
    }

    fn next_scripted_evaluation(&mut self, expression: &str) -> Option<Result<Value, CapturedException>> {
        let queue = self.evaluations.get_mut(expression)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    fn next_scripted_execution(&mut self, code: &str) -> Option<MockExecution> {
        let queue = self.executions.get_mut(code)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_alphanumeric())
}

fn evaluate_atom(atom: &str, scope: &Scope) -> Result<Value, CapturedException> {
    let atom = atom.trim();
    if let Ok(int) = atom.parse::<i64>() {
        return Ok(Value::Int(int));
    }
    for quote in ['\'', '"'] {
        if atom.len() >= 2 && atom.starts_with(quote) && atom.ends_with(quote) {
            return Ok(Value::str(&atom[1..atom.len() - 1]));
        }
    }
    match atom {
        "None" => return Ok(Value::None),
        "True" => return Ok(Value::Bool(true)),
        "False" => return Ok(Value::Bool(false)),
        _ => {}
    }
    if is_identifier(atom) {
        return scope
            .lookup(atom)
            .cloned()
            .ok_or_else(|| CapturedException::name_error(atom));
    }
    Err(CapturedException::new("SyntaxError", "invalid syntax"))
}

impl ExecutionRuntime for MockRuntime {
    fn stack(&mut self, frame: FrameId, _traceback: Option<&[FrameId]>) -> RuntimeResult<Stack> {
        self.stacks
            .get(&frame)
            .cloned()
            .ok_or(RuntimeError::UnknownFrame(frame))
    }

    fn execute(
        &mut self,
        code: &str,
        scope: &mut Scope,
        output: &mut OutputCapture,
    ) -> Result<Option<Value>, CapturedException> {
        self.executed.push(code.to_string());
        self.scopes.push(scope.clone());

        if let Some(execution) = self.next_scripted_execution(code) {
            output.write_stdout(&execution.stdout);
            output.write_stderr(&execution.stderr);
            for (name, value) in execution.bindings {
                scope.locals.insert(name, value);
            }
            return execution.result;
        }

        let code = code.trim();
        if let Some((target, expr)) = code.split_once('=') {
            let target = target.trim();
            if is_identifier(target) && !expr.starts_with('=') {
                let value = evaluate_atom(expr, scope)?;
                scope.locals.insert(target.to_string(), value);
                return Ok(None);
            }
        }
        evaluate_atom(code, scope).map(Some)
    }

    fn evaluate(&mut self, expression: &str, scope: &Scope) -> Result<Value, CapturedException> {
        self.evaluated.push(expression.to_string());
        self.scopes.push(scope.clone());
        match self.next_scripted_evaluation(expression) {
            Some(result) => result,
            None => evaluate_atom(expression, scope),
        }
    }

    fn is_importable(&self, module: &str) -> bool {
        self.importable.contains(module)
    }

    fn set_line(&mut self, frame: FrameId, line: u32) -> RuntimeResult<()> {
        if let Some(reason) = self.refused_lines.get(&line) {
            return Err(RuntimeError::InvalidLine {
                line,
                reason: reason.clone(),
            });
        }
        tracing::debug!(target: "wdb.runtime", frame, line, "mock line jump");
        self.lines_set.push((frame, line));
        Ok(())
    }

    fn resume(&mut self, frame: FrameId, mode: StepMode) -> RuntimeResult<()> {
        tracing::debug!(target: "wdb.runtime", frame, ?mode, "mock resume");
        self.resumed.push((frame, mode));
        Ok(())
    }

    fn stop_trace(&mut self) {
        self.stop_trace_calls += 1;
    }

    fn disable(&mut self) {
        tracing::debug!(target: "wdb.runtime", "mock tracing disabled");
        self.disabled = true;
    }

    fn cut_helper(&self) -> Option<Value> {
        self.cut.clone()
    }
}

/// Breakpoint store backed by a plain list.
#[derive(Default)]
pub struct MockBreakpointStore {
    breakpoints: Vec<Breakpoint>,
    pub cleared: Vec<Breakpoint>,
}

impl MockBreakpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BreakpointStore for MockBreakpointStore {
    fn set_break(
        &mut self,
        file: &str,
        line: Option<u32>,
        temporary: bool,
        condition: Option<&str>,
        function: Option<&str>,
    ) -> RuntimeResult<Breakpoint> {
        let breakpoint = Breakpoint {
            file: file.to_string(),
            lno: line,
            cond: condition.map(str::to_owned),
            fun: function.map(str::to_owned),
            temporary,
        };
        if !self.breakpoints.contains(&breakpoint) {
            self.breakpoints.push(breakpoint.clone());
        }
        Ok(breakpoint)
    }

    fn clear_break(
        &mut self,
        file: &str,
        line: Option<u32>,
        temporary: bool,
        condition: Option<&str>,
        function: Option<&str>,
    ) -> RuntimeResult<()> {
        let target = Breakpoint {
            file: file.to_string(),
            lno: line,
            cond: condition.map(str::to_owned),
            fun: function.map(str::to_owned),
            temporary,
        };
        self.breakpoints.retain(|brk| brk != &target);
        self.cleared.push(target);
        Ok(())
    }

    fn breakpoints(&self) -> Vec<Breakpoint> {
        self.breakpoints.clone()
    }
}

#[derive(Default)]
pub struct MockCompleter {
    completions: Option<Vec<Completion>>,
    signatures: Option<Vec<CallSignature>>,
}

impl MockCompleter {
    pub fn new() -> Self {
        Self {
            completions: Some(Vec::new()),
            signatures: Some(Vec::new()),
        }
    }

    pub fn set_completions(&mut self, completions: Vec<Completion>) {
        self.completions = Some(completions);
    }

    pub fn set_call_signatures(&mut self, signatures: Vec<CallSignature>) {
        self.signatures = Some(signatures);
    }

    pub fn fail_completions(&mut self) {
        self.completions = None;
    }

    pub fn fail_call_signatures(&mut self) {
        self.signatures = None;
    }
}

impl Completer for MockCompleter {
    fn completions(&mut self, _source: &str, _scope: &Scope) -> RuntimeResult<Vec<Completion>> {
        self.completions
            .clone()
            .ok_or_else(|| RuntimeError::Other("completion engine unavailable".to_string()))
    }

    fn call_signatures(&mut self, _source: &str, _scope: &Scope) -> RuntimeResult<Vec<CallSignature>> {
        self.signatures
            .clone()
            .ok_or_else(|| RuntimeError::Other("signature lookup unavailable".to_string()))
    }
}

/// Line based differ producing a minimal two column table.
#[derive(Default)]
pub struct MockDiffer;

impl Differ for MockDiffer {
    fn html_diff(&self, left: &str, right: &str) -> String {
        let mut out = String::from("<table class=\"diff\">");
        let left_lines: Vec<&str> = left.lines().collect();
        let right_lines: Vec<&str> = right.lines().collect();
        for idx in 0..left_lines.len().max(right_lines.len()) {
            let l = left_lines.get(idx).copied().unwrap_or_default();
            let r = right_lines.get(idx).copied().unwrap_or_default();
            let class = if l == r { "same" } else { "changed" };
            out.push_str(&format!("<tr class=\"{class}\"><td>{l}</td><td>{r}</td></tr>"));
        }
        out.push_str("</table>");
        out
    }

    fn structured_diff(&self, left: &Value, right: &Value) -> Result<String, DiffError> {
        let (left_entries, right_entries) = match (left, right) {
            (Value::Dict(_), Value::Dict(_)) | (Value::List(_), Value::List(_)) => {
                (left.attributes(), right.attributes())
            }
            _ => {
                return Err(DiffError::NotDiffable {
                    left: left.type_name().to_string(),
                    right: right.type_name().to_string(),
                })
            }
        };

        let mut lines = Vec::new();
        for (key, value) in &left_entries {
            match right_entries.iter().find(|(k, _)| k == key) {
                Some((_, other)) if other == value => {}
                Some((_, other)) => {
                    lines.push(format!("- {key}: {}", value.repr()));
                    lines.push(format!("+ {key}: {}", other.repr()));
                }
                None => lines.push(format!("- {key}: {}", value.repr())),
            }
        }
        for (key, value) in &right_entries {
            if !left_entries.iter().any(|(k, _)| k == key) {
                lines.push(format!("+ {key}: {}", value.repr()));
            }
        }
        Ok(lines.join("\n"))
    }
}

/// Sniffer answering a fixed MIME type (or nothing).
#[derive(Default)]
pub struct MockMimeSniffer {
    pub answer: Option<String>,
}

impl MockMimeSniffer {
    pub fn answering(mime: impl Into<String>) -> Self {
        Self {
            answer: Some(mime.into()),
        }
    }
}

impl MimeSniffer for MockMimeSniffer {
    fn sniff(&self, _bytes: &[u8]) -> Option<String> {
        self.answer.clone()
    }
}
