use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use wdb_config::{LogBuffer, ReportConfig, WdbConfig};
use wdb_runtime::{
    Bindings, BreakpointStore, Completer, Differ, ExecutionRuntime, MimeSniffer, StepMode, Value,
};

use crate::codec::{parse_incoming, Outgoing};
use crate::dispatch::{Command, HookEvent};
use crate::error::{Result, UiError};
use crate::hardening::Fault;
use crate::interaction::Interaction;
use crate::object_cache::ObjectCache;
use crate::session::{PauseEvent, Session, SessionId};
use crate::source::SourceResolver;
use crate::transport::Transport;
use crate::watch::WatchRegistry;

/// Helper services the handlers call into besides the runtime.
pub struct Collaborators {
    pub breakpoints: Box<dyn BreakpointStore>,
    pub completer: Box<dyn Completer>,
    pub differ: Box<dyn Differ>,
    /// `None` means `display` always falls back to `text/html`.
    pub mime: Option<Box<dyn MimeSniffer>>,
    pub sources: Box<dyn SourceResolver>,
}

impl Collaborators {
    pub fn new(
        breakpoints: Box<dyn BreakpointStore>,
        completer: Box<dyn Completer>,
        differ: Box<dyn Differ>,
        sources: Box<dyn SourceResolver>,
    ) -> Self {
        Self {
            breakpoints,
            completer,
            differ,
            mime: None,
            sources,
        }
    }

    pub fn with_mime_sniffer(mut self, mime: Box<dyn MimeSniffer>) -> Self {
        self.mime = Some(mime);
        self
    }
}

/// How an interaction ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exit {
    /// The program runs again under this stepping mode.
    Resumed(StepMode),
    Disabled,
    Quit,
}

/// What the session loop does after a command.
#[derive(Debug)]
pub(crate) enum Flow {
    Continue,
    /// Drill down into a child session.
    Nested(Session),
    Stop(Exit),
}

/// Process-level debugger: owns the collaborators and the state that
/// outlives a single pause (object cache, watches, last value).
pub struct Debugger<R, T> {
    pub(crate) runtime: R,
    pub(crate) transport: T,
    pub(crate) services: Collaborators,
    pub(crate) objects: ObjectCache,
    pub(crate) watchers: WatchRegistry,
    pub(crate) last_value: Option<Value>,
    pub(crate) extra_vars: Bindings,
    pub(crate) stepping: bool,
    pub(crate) enabled: bool,
    pub(crate) report: ReportConfig,
    pub(crate) log_buffer: Option<Arc<LogBuffer>>,
    next_session: u64,
}

impl<R: ExecutionRuntime, T: Transport> Debugger<R, T> {
    pub fn new(runtime: R, transport: T, services: Collaborators, config: &WdbConfig) -> Self {
        Self {
            runtime,
            transport,
            services,
            objects: ObjectCache::new(),
            watchers: WatchRegistry::new(),
            last_value: None,
            extra_vars: Bindings::new(),
            stepping: false,
            enabled: true,
            report: config.report.clone(),
            log_buffer: None,
            next_session: 0,
        }
    }

    /// Shares an existing cache, e.g. between engines multiplexed on one
    /// front-end.
    pub fn with_object_cache(mut self, objects: ObjectCache) -> Self {
        self.objects = objects;
        self
    }

    /// Recent log lines from this buffer are attached to fault reports.
    pub fn with_log_buffer(mut self, log_buffer: Arc<LogBuffer>) -> Self {
        self.log_buffer = Some(log_buffer);
        self
    }

    /// Binds `name` for the next evaluation only.
    pub fn inject(&mut self, name: impl Into<String>, value: Value) {
        self.extra_vars.insert(name.into(), value);
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn objects(&self) -> &ObjectCache {
        &self.objects
    }

    pub fn watchers(&self) -> &WatchRegistry {
        &self.watchers
    }

    pub fn last_value(&self) -> Option<&Value> {
        self.last_value.as_ref()
    }

    pub fn is_stepping(&self) -> bool {
        self.stepping
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn send(&mut self, frame: &Outgoing) -> io::Result<()> {
        self.transport.send(&frame.encode())
    }

    pub(crate) fn new_session(
        &mut self,
        parent: Option<SessionId>,
        event: PauseEvent,
    ) -> Result<Session> {
        let stack = self
            .runtime
            .stack(event.frame, event.traceback.as_deref())?;
        self.next_session += 1;
        Ok(Session::new(
            SessionId::new(self.next_session),
            parent,
            stack,
            event,
        )?)
    }

    /// Runs the command loop for one pause until a terminal command.
    ///
    /// Sessions opened by `inspect` on a captured exception are pushed on top
    /// of the paused one; when a child ends its parent re-sends the open
    /// sequence and resumes. `quit` unwinds every session at once.
    pub fn interaction(&mut self, event: PauseEvent) -> Result<Exit> {
        let root = self.new_session(None, event)?;
        tracing::debug!(target: "wdb.ui", session = root.id().as_u64(), title = root.title(), "interaction started");
        let mut sessions = vec![root];
        let mut reopen = true;
        let mut root_opened = false;

        loop {
            let Some(session) = sessions.last_mut() else {
                return Ok(Exit::Quit);
            };
            if reopen {
                session.activate()?;
                if root_opened {
                    // Once the front-end has a session it can still report a
                    // failed reopen.
                    if let Err(fault) = self.open_isolated(session) {
                        self.report_fault(&fault);
                    }
                } else {
                    Interaction::new(self, session)
                        .open()
                        .map_err(UiError::Transport)?;
                    root_opened = true;
                }
                reopen = false;
            }

            match self.interact(session)? {
                Flow::Continue => {}
                Flow::Nested(child) => {
                    session.suspend()?;
                    tracing::debug!(
                        target: "wdb.ui",
                        parent = session.id().as_u64(),
                        session = child.id().as_u64(),
                        "nested session opened"
                    );
                    sessions.push(child);
                    reopen = true;
                }
                Flow::Stop(Exit::Quit) => {
                    for session in &mut sessions {
                        session.terminate();
                    }
                    return Ok(Exit::Quit);
                }
                Flow::Stop(exit) => {
                    if let Some(mut done) = sessions.pop() {
                        done.terminate();
                        tracing::debug!(target: "wdb.ui", session = done.id().as_u64(), ?exit, "session ended");
                    }
                    if sessions.is_empty() {
                        return Ok(exit);
                    }
                    reopen = true;
                }
            }
        }
    }

    /// Re-sends the open sequence of a session the front-end already knows,
    /// turning failures into a [`Fault`] against `inspect`.
    fn open_isolated(&mut self, session: &mut Session) -> std::result::Result<(), Fault> {
        let command = Command::Inspect.name();
        let outcome =
            std::panic::catch_unwind(AssertUnwindSafe(|| Interaction::new(self, session).open()));
        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(Fault::from_error(
                command,
                &anyhow::Error::new(err).context("failed to send the open sequence"),
            )),
            Err(panic) => Err(Fault::from_panic(command, panic.as_ref())),
        }
    }

    /// Receives and handles one command.
    fn interact(&mut self, session: &mut Session) -> Result<Flow> {
        let message = match self.transport.receive() {
            Ok(message) => message,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => "Quit".to_string(),
            Err(err) => return Err(UiError::Transport(err)),
        };

        let incoming = parse_incoming(&message);
        tracing::debug!(
            target: "wdb.ui",
            command = %incoming.command,
            payload_len = incoming.payload.len(),
            "received command"
        );
        let Some(command) = Command::from_name(&incoming.command) else {
            tracing::warn!(target: "wdb.ui", command = %incoming.command, "unknown command");
            return Ok(Flow::Continue);
        };

        let payload = incoming.payload;
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| -> anyhow::Result<Flow> {
            let mut interaction = Interaction::new(self, session);
            let flow = interaction.dispatch(command, payload)?;
            interaction.run_hooks(HookEvent::Command(command))?;
            Ok(flow)
        }));

        let fault = match outcome {
            Ok(Ok(flow)) => return Ok(flow),
            Ok(Err(err)) => Fault::from_error(command.name(), &err),
            Err(panic) => Fault::from_panic(command.name(), panic.as_ref()),
        };
        self.report_fault(&fault);
        Ok(Flow::Continue)
    }
}
