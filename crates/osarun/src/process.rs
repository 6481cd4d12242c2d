//! # Process Channel
//!
//! A `ScriptChannel` over a long-lived helper process that hosts the remote
//! script. The helper reads one JSON request per line on stdin and writes one
//! JSON reply per line on stdout:
//!
//! ```text
//! -> {"command":"getProperty","argument":"{...}"}
//! <- {"result":"{...}"}
//! <- {"error":"osascript: application isn't running"}
//! <- {"error":{"message":"Not authorized to send Apple events","kind":"permissionDenied"}}
//! ```
//!
//! `result` carries the raw reply string, remote faults included. `error` is
//! reserved for failures of the helper itself and maps to a transport error.
//! Its optional `kind` is one of `unavailable`, `permissionDenied`,
//! `connectionLost` or `malformed`; without one, the automation
//! authorization error number `-1743` in the message still reads as
//! `PermissionDenied`, and anything else as `Unavailable`.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::path::PathBuf;
use std::process::Child;
use std::process::ChildStdin;
use std::process::ChildStdout;
use std::process::Command;
use std::process::Stdio;
use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;

use crate::transport;
use crate::transport::ScriptChannel;

/// How to launch the helper process.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub current_dir: Option<PathBuf>,
}

impl ProcessConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

#[derive(Serialize)]
struct RequestLine<'a> {
    command: &'a str,
    argument: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum ReplyLine {
    Result(String),
    Error(HelperFailure),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HelperFailure {
    Message(String),
    Detailed {
        message: String,
        #[serde(default)]
        kind: Option<String>,
    },
}

/// Native error number for denied automation.
const NOT_AUTHORIZED: &str = "-1743";

impl From<HelperFailure> for transport::Error {
    fn from(failure: HelperFailure) -> Self {
        let (message, kind) = match failure {
            HelperFailure::Message(message) => (message, None),
            HelperFailure::Detailed { message, kind } => (message, kind),
        };
        match kind.as_deref() {
            Some("permissionDenied") => Self::PermissionDenied(message),
            Some("connectionLost") => Self::ConnectionLost(message),
            Some("malformed") => Self::Malformed(message),
            Some("unavailable") => Self::Unavailable(message),
            Some(other) => {
                tracing::debug!(kind = other, "unknown helper error kind");
                Self::Unavailable(message)
            }
            None if message.contains(NOT_AUTHORIZED) => Self::PermissionDenied(message),
            None => Self::Unavailable(message),
        }
    }
}

struct Pipes {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Channel to a helper process; one call in flight at a time.
pub struct ProcessChannel {
    child: Mutex<Child>,
    pipes: Mutex<Pipes>,
}

impl ProcessChannel {
    /// Starts the helper process.
    pub fn spawn(config: &ProcessConfig) -> transport::Result<Self> {
        let mut command = Command::new(&config.program);
        command
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(dir) = &config.current_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| transport::Error::Io("helper stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| transport::Error::Io("helper stdout not captured".into()))?;
        tracing::debug!(program = %config.program.display(), pid = child.id(), "helper process started");

        Ok(Self {
            child: Mutex::new(child),
            pipes: Mutex::new(Pipes { stdin, stdout: BufReader::new(stdout) }),
        })
    }
}

impl ScriptChannel for ProcessChannel {
    fn call(&self, command: &str, argument: &str) -> transport::Result<String> {
        let mut line = serde_json::to_string(&RequestLine { command, argument })
            .map_err(|e| transport::Error::Malformed(e.to_string()))?;
        line.push('\n');

        let mut pipes = self
            .pipes
            .lock()
            .map_err(|_| transport::Error::Io("channel lock poisoned".into()))?;
        pipes.stdin.write_all(line.as_bytes())?;
        pipes.stdin.flush()?;

        let mut reply = String::new();
        if pipes.stdout.read_line(&mut reply)? == 0 {
            return Err(transport::Error::ConnectionLost("helper process closed stdout".into()));
        }

        match serde_json::from_str::<ReplyLine>(&reply)
            .map_err(|e| transport::Error::Malformed(e.to_string()))?
        {
            ReplyLine::Result(result) => Ok(result),
            ReplyLine::Error(failure) => Err(failure.into()),
        }
    }
}

impl Drop for ProcessChannel {
    fn drop(&mut self) {
        if let Ok(child) = self.child.get_mut() {
            if let Err(e) = child.kill() {
                tracing::debug!(error = %e, "helper process already gone");
            }
            let _ = child.wait();
        }
    }
}
