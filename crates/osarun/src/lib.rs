//! # osarun
//!
//! Dynamic proxies for objects living inside a scriptable application.
//!
//! A `Session` owns one channel to the remote script. Every value that comes
//! back is decoded into a local `Value`; remote objects become `ObjectProxy`
//! handles whose lifetime is tracked by the session's reference table, and
//! whose local type is chosen by the session's class resolver.
//!
//! ```ignore
//! let session = Session::new(channel);
//! let app = session.get_application("TargetApp")?;
//! let name: String = app.get("name")?;
//! ```

pub mod apps;
pub mod array;
pub mod class_map;
pub mod codec;
pub mod error;
pub mod facade;
#[doc(hidden)]
pub mod mock_transport;
pub mod process;
pub mod proxy;
pub mod refs;
pub mod resolver;
pub mod session;
pub mod transport;
pub mod value;

pub use array::ArrayProxy;
pub use array::Elements;
pub use class_map::ClassRegistry;
pub use class_map::ClassRegistryBuilder;
pub use class_map::ProxyClass;
pub use error::Error;
pub use error::Result;
pub use facade::Application;
pub use facade::Facade;
pub use process::ProcessChannel;
pub use process::ProcessConfig;
pub use proxy::ObjectProxy;
pub use session::Session;
pub use session::SessionBuilder;
pub use session::SessionId;
pub use transport::FnChannel;
pub use transport::ScriptChannel;
pub use value::FromValue;
pub use value::Kwargs;
pub use value::Value;
pub use value::kwargs;

#[cfg(test)]
mod tests;
