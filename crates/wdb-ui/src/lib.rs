//! Debug session protocol engine for wdb.
//!
//! A [`Debugger`] drives a paused program on behalf of a remote front-end:
//! it reads `command|payload` frames from a [`Transport`], runs the matching
//! handler against the current [`Session`], and answers with `Type|json`
//! frames. Handler failures (errors and panics) are reported to the
//! front-end and never end the session.
//!
//! ```no_run
//! use wdb_config::WdbConfig;
//! use wdb_runtime::{MockBreakpointStore, MockCompleter, MockDiffer, MockRuntime};
//! use wdb_ui::{Collaborators, Debugger, FsSourceResolver, MockTransport, PauseEvent};
//!
//! let config = WdbConfig::default();
//! let services = Collaborators::new(
//!     Box::new(MockBreakpointStore::new()),
//!     Box::new(MockCompleter::new()),
//!     Box::new(MockDiffer),
//!     Box::new(FsSourceResolver::from_config(&config.source)),
//! );
//! let mut debugger = Debugger::new(MockRuntime::new(), MockTransport::new(), services, &config);
//! let exit = debugger.interaction(PauseEvent::new(1, "ValueError", "bad value"));
//! # let _ = exit;
//! ```

pub mod breakpoints;
pub mod codec;
mod debugger;
pub mod dispatch;
mod error;
pub mod eval;
pub mod format;
pub mod hardening;
mod interaction;
pub mod object_cache;
pub mod session;
pub mod source;
pub mod transport;
pub mod watch;

pub use crate::codec::{MessageType, Outgoing};
pub use crate::debugger::{Collaborators, Debugger, Exit};
pub use crate::error::{Result, UiError};
pub use crate::object_cache::{CachedObject, ObjectCache, ObjectHandle};
pub use crate::session::{PauseEvent, Session, SessionId, SessionState};
pub use crate::source::{FsSourceResolver, InMemorySources, SourceResolver};
pub use crate::transport::{FramedTransport, MockTransport, Transport};
pub use crate::watch::WatchRegistry;
