//! Command handlers, run against one session and the debugger that owns it.

use std::io;
use std::path::{Path, MAIN_SEPARATOR};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::Context as _;
use base64::Engine as _;
use serde_json::json;
use wdb_runtime::{
    CapturedException, DiffError, ExecutionRuntime, ObjectRef, OutputCapture, Scope, StepMode,
    Value,
};

use crate::breakpoints::BreakRequest;
use crate::codec::{MessageType, Outgoing};
use crate::debugger::{Debugger, Exit, Flow};
use crate::dispatch::{hooks_for, Command, Hook, HookEvent};
use crate::eval::{compose_result, prepare_source, write_redirect, EvalInputError};
use crate::format::{display_input, dump_exception, dump_value, escape, exception_link, safe_repr};
use crate::object_cache::{CachedObject, ObjectHandle};
use crate::session::{PauseEvent, Session};
use crate::transport::Transport;

/// Identity used for the `___wdb` binding.
const DEBUGGER_OBJECT_ID: u64 = u64::MAX;

/// Handler context: the debugger plus the session the command targets.
pub(crate) struct Interaction<'a, R, T> {
    debugger: &'a mut Debugger<R, T>,
    session: &'a mut Session,
}

impl<'a, R: ExecutionRuntime, T: Transport> Interaction<'a, R, T> {
    pub(crate) fn new(debugger: &'a mut Debugger<R, T>, session: &'a mut Session) -> Self {
        Self { debugger, session }
    }

    pub(crate) fn dispatch(&mut self, command: Command, payload: &str) -> anyhow::Result<Flow> {
        match command {
            Command::Start => self.do_start(),
            Command::Select => self.do_select(payload),
            Command::File => self.do_file(payload),
            Command::Inspect => self.do_inspect(payload),
            Command::Dump => self.do_dump(payload),
            Command::Trace => self.do_trace(),
            Command::Eval => self.do_eval(payload),
            Command::Ping => self.do_ping(),
            Command::Step | Command::Next | Command::Continue | Command::Return | Command::Until => {
                let mode = command
                    .step_mode()
                    .context("stepping command without a step mode")?;
                self.resume(mode)
            }
            Command::Break => self.do_break(payload),
            Command::Unbreak => self.do_unbreak(payload),
            Command::Breakpoints => self.do_breakpoints(),
            Command::Watch => self.do_watch(payload),
            Command::Unwatch => self.do_unwatch(payload),
            Command::Jump => self.do_jump(payload),
            Command::Complete => self.do_complete(payload),
            Command::Save => self.do_save(payload),
            Command::Display => self.do_display(payload),
            Command::Disable => self.do_disable(),
            Command::Quit => self.do_quit(),
            Command::Diff => self.do_diff(payload),
            Command::StructuredDiff => self.do_structureddiff(payload),
        }
    }

    pub(crate) fn run_hooks(&mut self, event: HookEvent) -> io::Result<()> {
        for hook in hooks_for(event) {
            match hook {
                Hook::UpdateWatchers => self.update_watchers()?,
            }
        }
        Ok(())
    }

    /// Open sequence, sent when a session starts and when a child returns.
    pub(crate) fn open(&mut self) -> io::Result<()> {
        self.send_title()?;
        if self.session.is_shell() {
            self.send(Outgoing::bare(MessageType::Shell))?;
        } else {
            let trace = json!({ "trace": self.session.trace(), "cwd": cwd() });
            self.send(Outgoing::json(MessageType::Trace, &trace))?;
            self.send_select_check()?;
        }
        self.flush_init_message()?;
        self.run_hooks(HookEvent::Init)
    }

    fn send(&mut self, frame: Outgoing) -> io::Result<()> {
        self.debugger.send(&frame)
    }

    fn send_title(&mut self) -> io::Result<()> {
        let title = json!({
            "title": self.session.title(),
            "subtitle": self.session.subtitle(),
        });
        self.send(Outgoing::json(MessageType::Title, &title))
    }

    fn send_trace(&mut self) -> io::Result<()> {
        let trace = json!({ "trace": self.session.trace() });
        self.send(Outgoing::json(MessageType::Trace, &trace))
    }

    fn send_select_check(&mut self) -> io::Result<()> {
        let check = json!({
            "frame": self.session.current(),
            "name": self.session.current_file(),
        });
        self.send(Outgoing::json(MessageType::SelectCheck, &check))
    }

    fn flush_init_message(&mut self) -> io::Result<()> {
        match self.session.take_init_message() {
            Some(message) => self.debugger.transport.send(&message),
            None => Ok(()),
        }
    }

    fn echo(&mut self, title: &str, val: &str) -> io::Result<()> {
        self.send(Outgoing::json(
            MessageType::Echo,
            &json!({ "for": title, "val": val }),
        ))
    }

    /// Validation or I/O failure of `command`, with an explanatory message.
    fn fail(&mut self, command: &str, title: Option<&str>, message: &str) -> io::Result<()> {
        let title = escape(&title.map_or_else(|| format!("{command} failed"), str::to_owned));
        self.echo(&title, &escape(message))
    }

    /// Evaluation failure of `command`: the exception becomes inspectable.
    fn fail_with_exception(&mut self, command: &str, exception: &CapturedException) -> io::Result<()> {
        let link = exception_link(exception, &self.debugger.objects);
        self.echo(&format!("{command} failed"), &link)
    }

    /// I/O failure: `title` names the operation, the OS error is inspectable.
    fn fail_io(&mut self, title: &str, reason: &str) -> io::Result<()> {
        tracing::debug!(target: "wdb.ui", reason, "{title}");
        let exception = CapturedException::new("IOError", reason);
        let link = exception_link(&exception, &self.debugger.objects);
        self.echo(&escape(title), &link)
    }

    fn notify_exc(&mut self, message: &str, err: &dyn std::fmt::Display) -> io::Result<()> {
        tracing::info!(target: "wdb.ui", error = %err, "{message}");
        self.send(Outgoing::json(
            MessageType::Log,
            &json!({ "message": format!("{message}\n{err}") }),
        ))
    }

    /// Evaluation scope of the current frame.
    ///
    /// Globals are layered: frame globals, `_`, `cut`, `___wdb`, the frame
    /// locals, then injected variables, which are consumed.
    fn scope(&mut self) -> Scope {
        let mut globals = if self.session.is_shell() {
            Default::default()
        } else {
            self.session.current_frame().globals.clone()
        };
        globals.insert(
            "_".to_string(),
            self.debugger.last_value.clone().unwrap_or(Value::None),
        );
        if let Some(cut) = self.debugger.runtime.cut_helper() {
            globals.insert("cut".to_string(), cut);
        }
        globals.insert(
            "___wdb".to_string(),
            Value::Object(ObjectRef::new(DEBUGGER_OBJECT_ID, "Wdb", "<Wdb>")),
        );
        let locals = self.session.current_locals().clone();
        globals.extend(locals.clone());
        globals.extend(std::mem::take(&mut self.debugger.extra_vars));
        Scope { globals, locals }
    }

    fn update_watchers(&mut self) -> io::Result<()> {
        let file = self.session.current_file().to_string();
        let expressions = self.debugger.watchers.watched(&file).to_vec();
        let mut watched = serde_json::Map::new();
        if expressions.is_empty() {
            return self.send(Outgoing::json(MessageType::Watched, &watched));
        }
        let scope = self.scope();
        for expression in expressions {
            let rendered = match self.debugger.runtime.evaluate(&expression, &scope) {
                Ok(value) => safe_repr(&value, &self.debugger.objects),
                Err(exception) => exception.type_name,
            };
            watched.insert(expression, serde_json::Value::String(rendered));
        }
        self.send(Outgoing::json(MessageType::Watched, &watched))
    }

    fn do_start(&mut self) -> anyhow::Result<Flow> {
        tracing::debug!(target: "wdb.ui", "getting breakpoints");
        let init = json!({
            "cwd": cwd(),
            "version": self.debugger.runtime.version(),
            "breaks": self.debugger.services.breakpoints.breakpoints(),
        });
        self.send(Outgoing::json(MessageType::Init, &init))?;
        self.send_title()?;
        if self.session.is_shell() {
            self.send(Outgoing::bare(MessageType::Shell))?;
        } else {
            self.send_trace()?;
            // Always start on the innermost frame.
            self.session.select_innermost();
            self.send_select_check()?;
        }
        self.flush_init_message()?;
        Ok(Flow::Continue)
    }

    fn do_select(&mut self, payload: &str) -> anyhow::Result<Flow> {
        let selected = payload
            .trim()
            .parse::<usize>()
            .map_err(|err| err.to_string())
            .and_then(|index| self.session.select(index).map_err(|err| err.to_string()));
        match selected {
            Ok(()) => self.send_select_check()?,
            Err(message) => self.fail("Select", None, &message)?,
        }
        Ok(Flow::Continue)
    }

    fn do_file(&mut self, payload: &str) -> anyhow::Result<Flow> {
        let file = self.debugger.services.sources.file(payload);
        if file.is_none() {
            tracing::debug!(target: "wdb.ui", file = payload, "source unavailable");
        }
        let select = json!({
            "frame": self.session.current(),
            "name": payload,
            "file": file,
        });
        self.send(Outgoing::json(MessageType::Select, &select))?;
        Ok(Flow::Continue)
    }

    fn do_inspect(&mut self, payload: &str) -> anyhow::Result<Flow> {
        let handle = match payload.parse::<ObjectHandle>() {
            Ok(handle) => handle,
            Err(err) => {
                self.fail("Inspect", None, &format!("Invalid handle {payload:?}: {err}"))?;
                return Ok(Flow::Continue);
            }
        };
        let Some(object) = self.debugger.objects.get(handle) else {
            self.fail("Inspect", None, &format!("No object with handle {handle}"))?;
            return Ok(Flow::Continue);
        };

        match object {
            CachedObject::Exception(exception) => {
                let Some(frame) = exception.deepest_frame() else {
                    // Nothing to browse, show the exception itself.
                    let dump = json!({
                        "for": format!("{}: {}", exception.type_name, exception.message),
                        "val": dump_exception(&exception),
                        "doc": null,
                        "source": null,
                    });
                    self.send(Outgoing::json(MessageType::Dump, &dump))?;
                    return Ok(Flow::Continue);
                };
                let event = PauseEvent::new(
                    frame,
                    format!("RECURSIVE {}", exception.type_name),
                    exception.message.clone(),
                )
                .with_traceback(exception.traceback.clone());
                let child = self
                    .debugger
                    .new_session(Some(self.session.id()), event)
                    .with_context(|| format!("cannot open the traceback of {}", exception.type_name))?;
                Ok(Flow::Nested(child))
            }
            CachedObject::Value(value) => {
                let dump = json!({
                    "for": value.repr(),
                    "val": dump_value(&value, &self.debugger.objects),
                    "doc": value.doc(),
                    "source": value.source(),
                });
                self.send(Outgoing::json(MessageType::Dump, &dump))?;
                Ok(Flow::Continue)
            }
        }
    }

    fn do_dump(&mut self, payload: &str) -> anyhow::Result<Flow> {
        let scope = self.scope();
        let value = match self.debugger.runtime.evaluate(payload, &scope) {
            Ok(value) => value,
            Err(exception) => {
                self.fail_with_exception("Dump", &exception)?;
                return Ok(Flow::Continue);
            }
        };
        let dump = json!({
            "for": format!("{payload} \u{27f6} {} ", value.repr()),
            "val": dump_value(&value, &self.debugger.objects),
            "doc": value.doc(),
            "source": value.source(),
        });
        self.send(Outgoing::json(MessageType::Dump, &dump))?;
        Ok(Flow::Continue)
    }

    fn do_trace(&mut self) -> anyhow::Result<Flow> {
        self.send_trace()?;
        Ok(Flow::Continue)
    }

    fn do_eval(&mut self, payload: &str) -> anyhow::Result<Flow> {
        let prepared = match prepare_source(payload) {
            Ok(prepared) => prepared,
            Err(err) => {
                let EvalInputError::Unreadable { reason, .. } = &err;
                self.fail_io(&err.to_string(), reason)?;
                return Ok(Flow::Continue);
            }
        };
        let shown = display_input(&prepared.code);
        let redirect = prepared.redirect;

        let mut scope = self.scope();
        let mut output = OutputCapture::default();
        let mut hooked = String::new();
        let mut suggest = None;
        let mut duration = None;

        let start = Instant::now();
        let executed = self
            .debugger
            .runtime
            .execute(&prepared.code, &mut scope, &mut output);
        match executed {
            Ok(displayed) => {
                duration = Some(u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX));
                match displayed {
                    Some(value) if !value.is_none() => {
                        if redirect.is_some() {
                            output.write_stdout(&format!("{}\n", value.repr()));
                        } else {
                            hooked = safe_repr(&value, &self.debugger.objects);
                            self.debugger.last_value = Some(value);
                        }
                    }
                    _ => {}
                }
            }
            Err(exception) => {
                if let Some(name) = exception.undefined_name() {
                    if self.debugger.runtime.is_importable(name) {
                        suggest = Some(format!("import {name}"));
                    }
                }
                hooked = exception_link(&exception, &self.debugger.objects);
            }
        }
        self.session.set_current_locals(scope.locals);

        let out = output.stdout_lines();
        let err = output.stderr_lines();
        if let Some(redirect) = redirect.filter(|_| hooked.is_empty()) {
            if let Err(io_err) = write_redirect(&redirect, &out, &err) {
                let title = format!("Unable to write to file {}", redirect.target);
                self.fail_io(&title, &io_err.to_string())?;
                return Ok(Flow::Continue);
            }
            let verb = if redirect.append { "Appended" } else { "Written" };
            let print = json!({
                "for": shown,
                "result": escape(&format!("{verb} to file {}", redirect.target)),
            });
            self.send(Outgoing::json(MessageType::Print, &print))?;
            return Ok(Flow::Continue);
        }

        let rv = escape(&format!("{}{}", out.join("\n"), err.join("\n")));
        let result = compose_result(&rv, &hooked, self.debugger.last_value.is_some());
        let print = json!({
            "for": shown,
            "result": result,
            "suggest": suggest,
            "duration": duration,
        });
        self.send(Outgoing::json(MessageType::Print, &print))?;
        Ok(Flow::Continue)
    }

    fn do_ping(&mut self) -> anyhow::Result<Flow> {
        self.send(Outgoing::bare(MessageType::Pong))?;
        Ok(Flow::Continue)
    }

    fn resume(&mut self, mode: StepMode) -> anyhow::Result<Flow> {
        if self.session.parent().is_some() {
            // Traceback frames of a nested session are not live.
            tracing::debug!(target: "wdb.ui", ?mode, "leaving nested session");
        } else {
            let frame = self.session.current_frame().id;
            self.debugger
                .runtime
                .resume(frame, mode)
                .with_context(|| format!("failed to resume frame {frame}"))?;
            self.debugger.stepping = mode != StepMode::Continue;
        }
        Ok(Flow::Stop(Exit::Resumed(mode)))
    }

    fn do_break(&mut self, payload: &str) -> anyhow::Result<Flow> {
        let request = match BreakRequest::parse(payload) {
            Ok(request) => request,
            Err(err) => {
                self.fail("Break", None, &err.to_string())?;
                return Ok(Flow::Continue);
            }
        };
        let line = match request.validate(self.debugger.services.sources.as_ref()) {
            Ok(line) => line,
            Err(err) => {
                self.fail("Break", Some(&request.failure_title()), &err.to_string())?;
                return Ok(Flow::Continue);
            }
        };

        let breakpoint = self.debugger.services.breakpoints.set_break(
            &request.file,
            line,
            request.temporary,
            request.cond.as_deref(),
            request.fun.as_deref(),
        )?;
        let mut break_set = serde_json::to_value(&breakpoint)?;
        if let Some(fields) = break_set.as_object_mut() {
            fields.insert("temporary".to_string(), json!(request.temporary));
        }
        self.send(Outgoing::json(MessageType::BreakSet, &break_set))?;
        Ok(Flow::Continue)
    }

    fn do_unbreak(&mut self, payload: &str) -> anyhow::Result<Flow> {
        let request = BreakRequest::parse(payload).context("malformed unbreak request")?;
        let line = match request.line() {
            Ok(line) => line,
            Err(err) => {
                self.fail("Unbreak", None, &err.to_string())?;
                return Ok(Flow::Continue);
            }
        };
        self.debugger.services.breakpoints.clear_break(
            &request.file,
            line,
            request.temporary,
            request.cond.as_deref(),
            request.fun.as_deref(),
        )?;
        self.send(Outgoing::raw(MessageType::BreakUnset, payload))?;
        Ok(Flow::Continue)
    }

    fn do_breakpoints(&mut self) -> anyhow::Result<Flow> {
        let print = json!({
            "for": "Breakpoints",
            "result": self.debugger.services.breakpoints.breakpoints(),
        });
        self.send(Outgoing::json(MessageType::Print, &print))?;
        Ok(Flow::Continue)
    }

    fn do_watch(&mut self, payload: &str) -> anyhow::Result<Flow> {
        let file = self.session.current_file().to_string();
        if !self.debugger.watchers.watch(&file, payload) {
            tracing::debug!(target: "wdb.ui", file = %file, expression = payload, "already watched");
        }
        self.send(Outgoing::bare(MessageType::Ack))?;
        Ok(Flow::Continue)
    }

    fn do_unwatch(&mut self, payload: &str) -> anyhow::Result<Flow> {
        let file = self.session.current_file().to_string();
        if !self.debugger.watchers.unwatch(&file, payload) {
            tracing::warn!(target: "wdb.ui", file = %file, expression = payload, "unwatch of an unknown expression");
        }
        Ok(Flow::Continue)
    }

    fn do_jump(&mut self, payload: &str) -> anyhow::Result<Flow> {
        let line = match payload.trim().parse::<u32>() {
            Ok(line) => line,
            Err(err) => {
                self.fail("Jump", None, &err.to_string())?;
                return Ok(Flow::Continue);
            }
        };
        if !self.session.is_innermost() {
            tracing::error!(target: "wdb.ui", index = self.session.index(), "Must be at bottom frame");
            return Ok(Flow::Continue);
        }

        let frame = self.session.current_frame().id;
        if let Err(err) = self.debugger.runtime.set_line(frame, line) {
            self.fail("Jump", None, &err.to_string())?;
            return Ok(Flow::Continue);
        }
        self.session.set_current_line(line);
        self.send_trace()?;
        self.send_select_check()?;
        Ok(Flow::Continue)
    }

    fn do_complete(&mut self, payload: &str) -> anyhow::Result<Flow> {
        let scope = self.scope();
        let completions = match self.debugger.services.completer.completions(payload, &scope) {
            Ok(completions) => completions,
            Err(err) => {
                self.send(Outgoing::bare(MessageType::Suggest))?;
                self.notify_exc(&format!("Completion failed for {payload}"), &err)?;
                return Ok(Flow::Continue);
            }
        };
        let signatures = match self.debugger.services.completer.call_signatures(payload, &scope) {
            Ok(signatures) => signatures,
            Err(err) => {
                self.send(Outgoing::bare(MessageType::Suggest))?;
                self.notify_exc(&format!("Completion of function failed for {payload}"), &err)?;
                return Ok(Flow::Continue);
            }
        };

        let params: Vec<serde_json::Value> = signatures
            .iter()
            .map(|signature| {
                json!({
                    "params": signature.params.iter().map(|p| p.replace('\n', "")).collect::<Vec<_>>(),
                    "index": signature.index,
                    "module": signature.module,
                    "call_name": signature.call_name,
                })
            })
            .collect();
        let completions: Vec<serde_json::Value> = completions
            .iter()
            .filter_map(|completion| {
                let base = completion.name.strip_suffix(completion.complete.as_str())?;
                Some(json!({
                    "base": base,
                    "complete": completion.complete,
                    "description": completion.description,
                }))
            })
            .collect();
        self.send(Outgoing::json(
            MessageType::Suggest,
            &json!({ "params": params, "completions": completions }),
        ))?;
        Ok(Flow::Continue)
    }

    fn do_save(&mut self, payload: &str) -> anyhow::Result<Flow> {
        let Some((file, source)) = payload.split_once('|') else {
            self.fail("Save", None, "Expected a file name and its source")?;
            return Ok(Flow::Continue);
        };
        match save_with_backup(Path::new(file), source) {
            Ok(()) => self.echo("Save successful", &format!("Wrote {file}"))?,
            Err(err) => {
                tracing::warn!(target: "wdb.ui", file, error = %err, "save failed");
                self.echo("Error during save", &err.to_string())?;
            }
        }
        Ok(Flow::Continue)
    }

    fn do_display(&mut self, payload: &str) -> anyhow::Result<Flow> {
        let (forced_mime, expression) = match payload.split_once(';') {
            Some((mime, expression)) => (Some(mime.to_string()), expression),
            None => (None, payload),
        };

        let scope = self.scope();
        let value = match self.debugger.runtime.evaluate(expression, &scope) {
            Ok(value) => value,
            Err(exception) => {
                self.fail_with_exception("Display", &exception)?;
                return Ok(Flow::Continue);
            }
        };
        let bytes = value.to_bytes();
        let mime = forced_mime.unwrap_or_else(|| {
            self.debugger
                .services
                .mime
                .as_ref()
                .and_then(|sniffer| sniffer.sniff(&bytes))
                .unwrap_or_else(|| "text/html".to_string())
        });
        let display = json!({
            "for": format!("{expression} ({mime})"),
            "val": base64::engine::general_purpose::STANDARD.encode(&bytes),
            "type": mime,
        });
        self.send(Outgoing::json(MessageType::Display, &display))?;
        Ok(Flow::Continue)
    }

    fn do_disable(&mut self) -> anyhow::Result<Flow> {
        self.debugger.enabled = false;
        self.debugger.stepping = false;
        self.debugger.runtime.stop_trace();
        self.debugger.runtime.disable();
        Ok(Flow::Stop(Exit::Disabled))
    }

    fn do_quit(&mut self) -> anyhow::Result<Flow> {
        self.debugger.stepping = false;
        self.debugger.runtime.stop_trace();
        Ok(Flow::Stop(Exit::Quit))
    }

    /// Evaluates both sides of `left!right` (or `left<>right`).
    ///
    /// `Ok(None)` means a failure was already reported.
    fn evaluate_pair(&mut self, command: &str, payload: &str) -> io::Result<Option<(Value, Value)>> {
        let Some((left, right)) = split_pair(payload) else {
            self.fail(command, None, "Two expressions separated by ! or <> are expected")?;
            return Ok(None);
        };
        let scope = self.scope();
        let mut values = Vec::with_capacity(2);
        for expression in [left, right] {
            match self.debugger.runtime.evaluate(expression, &scope) {
                Ok(value) => values.push(value),
                Err(exception) => {
                    self.fail_with_exception(command, &exception)?;
                    return Ok(None);
                }
            }
        }
        let right = values.pop();
        let left = values.pop();
        Ok(left.zip(right))
    }

    fn do_diff(&mut self, payload: &str) -> anyhow::Result<Flow> {
        let Some((left, right)) = self.evaluate_pair("Diff", payload)? else {
            return Ok(Flow::Continue);
        };
        let table = self
            .debugger
            .services
            .differ
            .html_diff(&left.text(), &right.text());
        let raw = json!({
            "for": format!("Difference between {payload}"),
            "val": table,
        });
        self.send(Outgoing::json(MessageType::RawHtml, &raw))?;
        Ok(Flow::Continue)
    }

    fn do_structureddiff(&mut self, payload: &str) -> anyhow::Result<Flow> {
        let Some((left, right)) = self.evaluate_pair("StructuredDiff", payload)? else {
            return Ok(Flow::Continue);
        };
        match self.debugger.services.differ.structured_diff(&left, &right) {
            Ok(diff) => {
                let echo = json!({
                    "for": format!("Difference of structures {payload}"),
                    "val": diff.replace('\n', "<br />"),
                    "mode": "diff",
                });
                self.send(Outgoing::json(MessageType::Echo, &echo))?;
            }
            Err(DiffError::NotDiffable { left, right }) => {
                tracing::debug!(target: "wdb.ui", %left, %right, "not diffable");
                self.fail("StructuredDiff", Some("TypeError"), "A structure was expected")?;
            }
        }
        Ok(Flow::Continue)
    }
}

fn cwd() -> String {
    std::env::current_dir()
        .map(|dir| dir.display().to_string())
        .unwrap_or_default()
}

/// `left!right` when a `!` is present, `left<>right` otherwise.
fn split_pair(payload: &str) -> Option<(&str, &str)> {
    let separator = if payload.contains('!') { "!" } else { "<>" };
    let mut parts = payload.split(separator);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(left), Some(right), None) => Some((left, right)),
        _ => None,
    }
}

/// Temp-dir name for the backup of `file` taken at `secs`.
fn backup_path(file: &Path, secs: u64) -> std::path::PathBuf {
    let dir = file
        .parent()
        .map(|dir| dir.display().to_string())
        .unwrap_or_default()
        .replace(MAIN_SEPARATOR, "!");
    let base = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    std::env::temp_dir().join(format!("{dir}{base}-wdb-back-{secs}"))
}

/// Moves the existing `file` into the temp dir, then writes `source` in its
/// place.
fn save_with_backup(file: &Path, source: &str) -> io::Result<()> {
    if !file.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("No such file: {}", file.display()),
        ));
    }
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    let backup = backup_path(file, secs);
    if std::fs::rename(file, &backup).is_err() {
        // Temp dir on another filesystem.
        std::fs::copy(file, &backup)?;
        std::fs::remove_file(file)?;
    }
    std::fs::write(file, source)
}
