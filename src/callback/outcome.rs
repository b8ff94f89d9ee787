use crate::dispatch::ResponseFields;
use crate::status::{LegacyStatus, StatusCode};
use crate::transport::TransportFailure;
use std::fmt;

/// A response status other than success, with the device's debug text if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFailure {
    pub status: StatusCode,
    pub debug_text: Option<String>,
}

impl StatusFailure {
    pub fn new(status: StatusCode, debug_text: Option<String>) -> Self {
        Self { status, debug_text }
    }

    /// Synthetic failure for a response that could not be decoded locally.
    pub fn internal(reason: impl fmt::Display) -> Self {
        Self {
            status: LegacyStatus::Failure.into(),
            debug_text: Some(reason.to_string()),
        }
    }
}

impl fmt::Display for StatusFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.debug_text {
            Some(text) => write!(f, "status {}: {}", self.status, text),
            None => write!(f, "status {}", self.status),
        }
    }
}

/// Terminal outcome of one request.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome<T = ResponseFields> {
    Success(T),
    Status(StatusFailure),
    Transport(TransportFailure),
}

/// The failure half of [`CommandOutcome`], passed to split failure callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandFailure {
    Status(StatusFailure),
    Transport(TransportFailure),
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandFailure::Status(s) => fmt::Display::fmt(s, f),
            CommandFailure::Transport(t) => fmt::Display::fmt(t, f),
        }
    }
}

impl<T> CommandOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success(_))
    }

    pub fn into_result(self) -> Result<T, CommandFailure> {
        match self {
            CommandOutcome::Success(value) => Ok(value),
            CommandOutcome::Status(s) => Err(CommandFailure::Status(s)),
            CommandOutcome::Transport(t) => Err(CommandFailure::Transport(t)),
        }
    }

    /// Convert the success value. A conversion error becomes an internal status failure.
    pub fn and_then_convert<U, E: fmt::Display>(
        self,
        convert: impl FnOnce(T) -> Result<U, E>,
    ) -> CommandOutcome<U> {
        match self {
            CommandOutcome::Success(value) => match convert(value) {
                Ok(converted) => CommandOutcome::Success(converted),
                Err(e) => CommandOutcome::Status(StatusFailure::internal(e)),
            },
            CommandOutcome::Status(s) => CommandOutcome::Status(s),
            CommandOutcome::Transport(t) => CommandOutcome::Transport(t),
        }
    }
}
