//! # OSAPack
//!
//! The wire format of the object bridge: a tagged JSON value union, the
//! command set the remote script answers, and the request/reply envelopes.
//!
//! ## Architecture
//!
//! This crate knows nothing about sessions, proxies or reference counts. It
//! only moves between typed envelopes and the strings a transport carries,
//! so both the local runtime and a remote-side implementation (or a fake)
//! can share it.

pub mod command;
pub mod error;
pub mod frame;
pub mod value;

pub use command::Command;
pub use error::Error;
pub use error::Fault;
pub use error::Result;
pub use frame::Reply;
pub use frame::Request;
pub use value::ObjectId;
pub use value::Reference;
pub use value::Scalar;
pub use value::WireValue;
pub use value::ARRAY_CLASS_PREFIX;
