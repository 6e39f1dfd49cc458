use std::io;

use thiserror::Error;
use wdb_runtime::RuntimeError;

use crate::session::SessionError;

/// Failures that end an interaction. Handler failures never surface here;
/// they are reported to the front-end and the loop goes on.
#[derive(Debug, Error)]
pub enum UiError {
    #[error("transport failure: {0}")]
    Transport(#[source] io::Error),
    #[error("failed to collect the paused stack: {0}")]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

pub type Result<T, E = UiError> = std::result::Result<T, E>;
