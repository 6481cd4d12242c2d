//! # Transport Abstraction
//!
//! A minimal, blocking interface for moving one command into the remote
//! script and one result back out.
//!
//! ## Philosophy
//!
//! - **String-Oriented**: The channel knows nothing about Wire Values, proxies or
//!   reference counts. It moves a command name and an opaque argument string.
//! - **Request-Response**: The only interaction is "send a command, block for the
//!   result". There is exactly one call in flight per channel.
//! - **No Recovery**: A failed call is reported, never retried here.

use std::fmt;

/// Errors raised by the channel itself, before the remote script ran.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The target process is not running or could not be reached.
    Unavailable(String),
    /// The host denied automation of the target process.
    PermissionDenied(String),
    /// The channel was open but the connection dropped mid-call.
    ConnectionLost(String),
    /// The event or reply could not be framed.
    Malformed(String),
    /// Generic I/O error or internal transport failure.
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "Target unavailable: {}", msg),
            Self::PermissionDenied(msg) => write!(f, "Automation permission denied: {}", msg),
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            Self::Malformed(msg) => write!(f, "Malformed event: {}", msg),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Self::Unavailable(e.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(e.to_string()),
            std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::UnexpectedEof => {
                Self::ConnectionLost(e.to_string())
            }
            _ => Self::Io(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A compiled automation script bound to one target application.
///
/// This trait is designed to be object-safe (`Arc<dyn ScriptChannel>`), and
/// implementations must be `Send + Sync` because proxies may be dropped, and
/// so release their remote objects, from any thread.
pub trait ScriptChannel: Send + Sync + 'static {
    /// Sends one command with its serialized argument and blocks for the
    /// serialized result.
    ///
    /// # invariants
    /// - Must return `Ok(string)` with the raw result on success, including
    ///   results that encode a remote fault.
    /// - Must return `Err` only when the call could not be delivered.
    /// - Should not interpret the argument or result (e.g. no JSON parsing).
    fn call(&self, command: &str, argument: &str) -> Result<String>;
}

/// A channel backed by a closure, for embedding hosts that already own a
/// way to reach the remote script.
pub struct FnChannel<F>
where
    F: Fn(&str, &str) -> Result<String> + Send + Sync + 'static,
{
    handler: F,
}

impl<F> FnChannel<F>
where
    F: Fn(&str, &str) -> Result<String> + Send + Sync + 'static,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> ScriptChannel for FnChannel<F>
where
    F: Fn(&str, &str) -> Result<String> + Send + Sync + 'static,
{
    fn call(&self, command: &str, argument: &str) -> Result<String> {
        (self.handler)(command, argument)
    }
}
