//! Failure isolation for command handlers.
//!
//! Every dispatched command runs under `catch_unwind`; an `Err` or a panic is
//! turned into one diagnostic `Echo` carrying an inspectable error and a
//! prefilled issue link, and the session loop keeps going.

use std::any::Any;
use std::io;
use std::sync::{Arc, Once};

use serde_json::json;
use url::Url;
use wdb_config::{LogBuffer, WdbConfig};
use wdb_runtime::{CapturedException, ExecutionRuntime};

use crate::codec::{MessageType, Outgoing};
use crate::debugger::Debugger;
use crate::format::exception_link;
use crate::transport::Transport;

/// Lines of recent log attached to issue links.
const REPORT_LOG_LINES: usize = 20;

static PANIC_HOOK: Once = Once::new();

/// Initializes structured logging and installs a process-wide panic hook
/// that records panics through `tracing`.
///
/// Handlers are still isolated locally; the hook only makes sure panic
/// messages land in the log buffer instead of raw stderr.
pub fn init(config: &WdbConfig) -> Arc<LogBuffer> {
    let buffer = wdb_config::init_tracing(&config.logging);
    PANIC_HOOK.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let location = info
                .location()
                .map(|location| format!("{}:{}", location.file(), location.line()))
                .unwrap_or_default();
            tracing::error!(
                target: "wdb.ui",
                location = %location,
                message = %panic_message(info.payload()),
                "panic"
            );
        }));
    });
    buffer
}

/// A handler failure, ready to be reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub command: String,
    /// Error kind shown before the message (`Error`, `Panic`).
    pub kind: String,
    pub message: String,
    /// Full error chain / panic text.
    pub details: String,
}

impl Fault {
    pub fn from_error(command: &str, err: &anyhow::Error) -> Self {
        Self {
            command: command.to_string(),
            kind: "Error".to_string(),
            message: format!("{err:#}"),
            details: format!("{err:?}"),
        }
    }

    pub fn from_panic(command: &str, payload: &(dyn Any + Send)) -> Self {
        let message = panic_message(payload);
        Self {
            command: command.to_string(),
            kind: "Panic".to_string(),
            details: format!("panic while handling `{command}`: {message}"),
            message,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

/// `<a>` element pointing at a prefilled new-issue page.
pub fn report_link(
    issues_url: &Url,
    fault: &Fault,
    log: Option<&LogBuffer>,
) -> Result<String, url::ParseError> {
    let mut body = format!("```\n{}\n```\n", fault.details);
    if let Some(log) = log {
        let lines = log.last_lines(REPORT_LOG_LINES);
        if !lines.is_empty() {
            body.push_str(&format!("\nRecent log:\n```\n{}\n```\n", lines.join("\n")));
        }
    }

    let mut url = Url::parse(issues_url.as_str())?;
    url.query_pairs_mut()
        .append_pair("title", &format!("{}: {}", fault.kind, fault.message))
        .append_pair("body", &body)
        .append_pair("labels", "defect");
    Ok(format!(
        "<a href=\"{url}\" class=\"nogood\">Please click here to report it on Github</a>"
    ))
}

impl<R: ExecutionRuntime, T: Transport> Debugger<R, T> {
    /// Sends the diagnostic for a failed handler. Never fails: when the
    /// diagnostic cannot be sent a terse fallback is attempted, then the
    /// failure is only logged.
    pub(crate) fn report_fault(&mut self, fault: &Fault) {
        tracing::error!(
            target: "wdb.ui",
            command = %fault.command,
            kind = %fault.kind,
            error = %fault.message,
            "command handler failed"
        );

        let sent = self.send_fault_diagnostic(fault);
        let Err(err) = sent else {
            return;
        };
        tracing::error!(target: "wdb.ui", error = %err, "failed to report handler failure");
        let fallback = Outgoing::json(
            MessageType::Echo,
            &json!({
                "for": "Too many errors",
                "val": "Don't really know what to say. Maybe it will work tomorrow.",
            }),
        );
        if let Err(err) = self.send(&fallback) {
            tracing::error!(target: "wdb.ui", error = %err, "failed to send fallback diagnostic");
        }
    }

    fn send_fault_diagnostic(&mut self, fault: &Fault) -> io::Result<()> {
        let mut captured = CapturedException::new(fault.kind.clone(), fault.message.clone());
        captured.formatted = fault.details.clone();
        let link = exception_link(&captured, &self.objects);
        let report = report_link(&self.report.issues_url, fault, self.log_buffer.as_deref())
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
        self.send(&Outgoing::json(
            MessageType::Echo,
            &json!({
                "for": "Error in Wdb, this is bad",
                "val": format!("{link}<br>{report}"),
            }),
        ))
    }
}
