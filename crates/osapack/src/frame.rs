//! # Protocol Frames
//!
//! Defines the envelope of one round trip: a `Request` (command name plus one
//! serialized argument string) and a `Reply` (one serialized result string).
//!
//! ## Invariants
//! - **Panic Safety**: All decoding paths return `Result`, never panicking on unknown data.
//! - **Symmetry**: `Request::decode(req.command().name(), &req.encode()?)` yields `req`.
//! - An empty reply is an acknowledgement and reads as null.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::command::Command;
use crate::error::Error;
use crate::error::Fault;
use crate::error::Result;
use crate::value::ObjectId;
use crate::value::Reference;
use crate::value::WireValue;

/// An outbound command and its parameters.
///
/// Parameters travel as a `dict` Wire Value, so object parameters are
/// `reference` values the remote side resolves against its own pool.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    command: Command,
    params: BTreeMap<String, WireValue>,
}

impl Request {
    pub fn new(command: Command) -> Self {
        Self { command, params: BTreeMap::new() }
    }

    /// Adds one parameter.
    pub fn param(mut self, key: &str, value: WireValue) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }

    pub fn get_application(name: &str) -> Self {
        Self::new(Command::GetApplication).param("name", WireValue::string(name))
    }

    pub fn get_property(obj: ObjectId, name: &str) -> Self {
        Self::new(Command::GetProperty)
            .param("obj", object(obj))
            .param("name", WireValue::string(name))
    }

    pub fn get_properties(obj: ObjectId, names: &[&str]) -> Self {
        let names = names.iter().map(|n| WireValue::string(*n)).collect();
        Self::new(Command::GetProperties)
            .param("obj", object(obj))
            .param("properties", WireValue::array(names))
    }

    pub fn set_properties(obj: ObjectId, key_values: BTreeMap<String, WireValue>) -> Self {
        Self::new(Command::SetProperties)
            .param("obj", object(obj))
            .param("keyValues", WireValue::dict(key_values))
    }

    pub fn call_method(
        obj: ObjectId,
        name: &str,
        args: Vec<WireValue>,
        kwargs: BTreeMap<String, WireValue>,
    ) -> Self {
        Self::new(Command::CallMethod)
            .param("obj", object(obj))
            .param("name", WireValue::string(name))
            .param("args", WireValue::array(args))
            .param("kwargs", WireValue::dict(kwargs))
    }

    pub fn call_self(
        obj: ObjectId,
        args: Vec<WireValue>,
        kwargs: BTreeMap<String, WireValue>,
    ) -> Self {
        Self::new(Command::CallSelf)
            .param("obj", object(obj))
            .param("args", WireValue::array(args))
            .param("kwargs", WireValue::dict(kwargs))
    }

    /// The id travels as a plain integer so the remote side does not resolve it.
    /// Fails for ids a JSON integer cannot carry.
    pub fn release_object(id: ObjectId) -> Result<Self> {
        let id = i64::try_from(id).map_err(|_| Error::IdOutOfRange(id))?;
        Ok(Self::new(Command::ReleaseObjectWithId).param("id", WireValue::int(id)))
    }

    pub fn eval_jxa(source: &str, locals: BTreeMap<String, WireValue>) -> Self {
        Self::new(Command::EvalJxaSnippet)
            .param("source", WireValue::string(source))
            .param("locals", WireValue::dict(locals))
    }

    pub fn eval_applescript(source: &str) -> Self {
        Self::new(Command::EvalAppleScriptSnippet)
            .param("source", WireValue::string(source))
            .param("locals", WireValue::dict(BTreeMap::new()))
    }

    /// Asks the application `app` for the parent class of `class_name`.
    pub fn parent_of_class(app: ObjectId, class_name: &str) -> Self {
        Self::new(Command::ParentOfClass)
            .param("obj", object(app))
            .param("className", WireValue::string(class_name))
    }

    pub fn command(&self) -> Command {
        self.command
    }

    /// Serializes the parameters into the argument string.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(&DictRef { data: &self.params })?)
    }

    /// Parses a command name and argument string, as the remote side sees them.
    pub fn decode(command: &str, argument: &str) -> Result<Self> {
        let command = command.parse::<Command>()?;
        let params = match WireValue::from_json(argument)? {
            WireValue::Dict { data } => data,
            other => {
                return Err(Error::Json(format!(
                    "request arguments must be a dict, found {}",
                    other.tag()
                )))
            }
        };
        Ok(Self { command, params })
    }

    pub fn get(&self, key: &str) -> Option<&WireValue> {
        self.params.get(key)
    }

    /// Reads a parameter that must be present.
    pub fn require(&self, key: &'static str) -> Result<&WireValue> {
        self.params.get(key).ok_or(Error::MissingParam(key))
    }

    /// Reads an object parameter as its identifier.
    pub fn object(&self, key: &'static str) -> Result<ObjectId> {
        self.require(key)?
            .as_reference()
            .map(|r| r.obj_id)
            .ok_or_else(|| mismatch(key, "reference"))
    }

    pub fn str(&self, key: &'static str) -> Result<&str> {
        self.require(key)?.as_str().ok_or_else(|| mismatch(key, "string"))
    }

    pub fn int(&self, key: &'static str) -> Result<i64> {
        self.require(key)?.as_i64().ok_or_else(|| mismatch(key, "integer"))
    }

    /// Reads an array parameter; a missing one reads as empty.
    pub fn array(&self, key: &'static str) -> Result<&[WireValue]> {
        match self.params.get(key) {
            None => Ok(&[]),
            Some(v) => v.as_array().ok_or_else(|| mismatch(key, "array")),
        }
    }

    /// Reads a dict parameter; a missing one reads as empty.
    pub fn dict(&self, key: &'static str) -> Result<BTreeMap<String, WireValue>> {
        match self.params.get(key) {
            None => Ok(BTreeMap::new()),
            Some(v) => v.as_dict().cloned().ok_or_else(|| mismatch(key, "dict")),
        }
    }
}

/// The inbound result of one command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Value(WireValue),
    Fault(Fault),
}

impl Reply {
    pub fn ack() -> Self {
        Self::Value(WireValue::null())
    }

    /// Serializes the reply into the result string.
    pub fn encode(&self) -> Result<String> {
        match self {
            Self::Value(v) => v.to_json(),
            Self::Fault(fault) => Ok(serde_json::to_string(&FaultEnvelope { error: fault.clone() })?),
        }
    }

    /// Parses a result string.
    pub fn decode(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Self::ack());
        }

        let json: serde_json::Value = serde_json::from_str(text)?;
        if json.get("error").is_some() {
            let envelope: FaultEnvelope = serde_json::from_value(json)?;
            return Ok(Self::Fault(envelope.error));
        }
        Ok(Self::Value(serde_json::from_value(json)?))
    }

    pub fn into_result(self) -> std::result::Result<WireValue, Fault> {
        match self {
            Self::Value(v) => Ok(v),
            Self::Fault(f) => Err(f),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct FaultEnvelope {
    error: Fault,
}

/// Borrowing twin of `WireValue::Dict` so encoding does not clone parameters.
#[derive(Serialize)]
#[serde(tag = "type", rename = "dict")]
struct DictRef<'a> {
    data: &'a BTreeMap<String, WireValue>,
}

fn object(obj: ObjectId) -> WireValue {
    WireValue::reference(Reference::outbound(obj))
}

fn mismatch(param: &str, expected: &'static str) -> Error {
    Error::TypeMismatch { param: param.to_string(), expected }
}
