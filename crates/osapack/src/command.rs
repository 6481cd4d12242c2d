//! # Command Set
//!
//! The closed set of commands the remote script answers, with their exact
//! names on the wire.

use crate::error::Error;

/// One remote command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// `{name}` -> reference to the named application.
    GetApplication,
    /// `{obj, name}` -> one property.
    GetProperty,
    /// `{obj, properties}` -> dict of the requested properties.
    GetProperties,
    /// `{obj, keyValues}` -> ack.
    SetProperties,
    /// `{obj, name, args, kwargs}` -> method result.
    CallMethod,
    /// `{obj, args, kwargs}` -> result of invoking the object itself.
    CallSelf,
    /// `{id}` -> ack. Drops the remote side's retained reference.
    ReleaseObjectWithId,
    /// `{source, locals}` -> result of evaluating JavaScript for Automation.
    EvalJxaSnippet,
    /// `{source}` -> result of evaluating AppleScript.
    EvalAppleScriptSnippet,
    /// `{obj, className}` -> parent class name or null.
    ParentOfClass,
}

impl Command {
    pub const ALL: [Command; 10] = [
        Command::GetApplication,
        Command::GetProperty,
        Command::GetProperties,
        Command::SetProperties,
        Command::CallMethod,
        Command::CallSelf,
        Command::ReleaseObjectWithId,
        Command::EvalJxaSnippet,
        Command::EvalAppleScriptSnippet,
        Command::ParentOfClass,
    ];

    /// The command name as sent over the transport.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetApplication => "getApplication",
            Self::GetProperty => "getProperty",
            Self::GetProperties => "getProperties",
            Self::SetProperties => "setProperties",
            Self::CallMethod => "callMethod",
            Self::CallSelf => "callSelf",
            Self::ReleaseObjectWithId => "releaseObjectWithId",
            Self::EvalJxaSnippet => "evalJXACodeSnippet",
            Self::EvalAppleScriptSnippet => "evalAppleScriptCodeSnippet",
            Self::ParentOfClass => "parentOfClass",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| Error::UnknownCommand(s.to_string()))
    }
}
