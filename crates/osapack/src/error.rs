//! # Error Definitions
//!
//! Failures while building or parsing wire payloads.
//!
//! These are distinct from `Fault`; a `Fault` is the *remote* side reporting
//! that a command failed, whereas `Error` means the bytes themselves were wrong.

use serde::Deserialize;
use serde::Serialize;

/// Malformed or mistyped wire data.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The payload is not valid JSON, or not a valid Wire Value.
    Json(String),
    /// The command name is not part of the command set.
    UnknownCommand(String),
    /// A request is missing a required parameter.
    MissingParam(&'static str),
    /// A request parameter has the wrong wire shape.
    TypeMismatch { param: String, expected: &'static str },
    /// An object id too large to travel as a signed 64-bit integer.
    IdOutOfRange(u64),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(msg) => write!(f, "malformed wire payload: {}", msg),
            Self::UnknownCommand(name) => write!(f, "unknown command: {}", name),
            Self::MissingParam(param) => write!(f, "missing parameter: {}", param),
            Self::TypeMismatch { param, expected } => {
                write!(f, "parameter '{}' is not a {}", param, expected)
            }
            Self::IdOutOfRange(id) => write!(f, "object id {} does not fit a signed 64-bit integer", id),
        }
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}

/// A specialized Result type for wire operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The remote side's report that a command failed (the "Err" side of a reply).
///
/// The message is carried verbatim. `number` is the native error number the
/// scripting host attached, when it attached one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<i64>,
}

impl Fault {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), number: None }
    }

    pub fn with_number(mut self, number: i64) -> Self {
        self.number = Some(number);
        self
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.number {
            Some(n) => write!(f, "{} ({})", self.message, n),
            None => write!(f, "{}", self.message),
        }
    }
}
