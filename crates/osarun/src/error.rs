//! # Runtime Errors
//!
//! Every failure a proxy operation can surface to its caller. Nothing here is
//! retried; remote-originating failures propagate unchanged.

use crate::transport;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The channel could not deliver the call.
    Transport(transport::Error),
    /// The remote script ran the command and reported a failure.
    Remote {
        command: String,
        message: String,
        number: Option<i64>,
    },
    /// A local value has no wire representation. Never reaches the wire.
    UnsupportedType(String),
    /// The remote side replied with data that is not valid wire format.
    Protocol(osapack::Error),
    /// A decoded value does not have the shape the caller asked for.
    UnexpectedValue { expected: &'static str, found: String },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "Transport error: {}", e),
            Self::Remote { command, message, number: Some(n) } => {
                write!(f, "Remote call '{}' failed: {} ({})", command, message, n)
            }
            Self::Remote { command, message, number: None } => {
                write!(f, "Remote call '{}' failed: {}", command, message)
            }
            Self::UnsupportedType(what) => write!(f, "Unsupported type: {}", what),
            Self::Protocol(e) => write!(f, "Protocol error: {}", e),
            Self::UnexpectedValue { expected, found } => {
                write!(f, "Expected {}, found {}", expected, found)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Protocol(e) => Some(e),
            _ => None,
        }
    }
}

impl From<transport::Error> for Error {
    fn from(e: transport::Error) -> Self {
        Self::Transport(e)
    }
}

impl From<osapack::Error> for Error {
    fn from(e: osapack::Error) -> Self {
        Self::Protocol(e)
    }
}

impl Error {
    pub(crate) fn remote(command: osapack::Command, fault: osapack::Fault) -> Self {
        Self::Remote {
            command: command.name().to_string(),
            message: fault.message,
            number: fault.number,
        }
    }

    /// True when the remote script rejected the call, as opposed to the call
    /// never reaching it.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
