//! # Typed Facades
//!
//! Named wrappers over an `ObjectProxy`. A facade adds no state; its methods
//! are thin calls onto the two dynamic primitives, property access and
//! method calls.
//!
//! Scriptable properties of the remote objects are callable specifiers, so
//! facades read scalar properties with `invoke(name)` rather than
//! `get_property(name)`.

use crate::class_map::ProxyClass;
use crate::error::Result;
use crate::proxy::ObjectProxy;
use crate::session::Session;
use crate::value::Kwargs;
use crate::value::Value;
use crate::value::unexpected;

/// A typed view of a remote object.
pub trait Facade: Sized {
    /// The proxy type the registry maps remote classes to.
    const CLASS: ProxyClass;

    /// Wraps a proxy without checking its class.
    fn from_proxy(proxy: ObjectProxy) -> Self;

    fn proxy(&self) -> &ObjectProxy;

    fn into_proxy(self) -> ObjectProxy;
}

/// Declares a facade struct wrapping an `ObjectProxy`, together with its
/// `Facade`, `FromValue` and `Into<Value>` impls.
///
/// ```ignore
/// define_facade! {
///     /// A note.
///     pub struct Note = "notes.note";
/// }
/// ```
#[macro_export]
macro_rules! define_facade {
    ($(#[$meta:meta])* $vis:vis struct $name:ident = $class:literal;) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        $vis struct $name {
            proxy: $crate::ObjectProxy,
        }

        impl $crate::Facade for $name {
            const CLASS: $crate::ProxyClass = $crate::ProxyClass::new($class);

            fn from_proxy(proxy: $crate::ObjectProxy) -> Self {
                Self { proxy }
            }

            fn proxy(&self) -> &$crate::ObjectProxy {
                &self.proxy
            }

            fn into_proxy(self) -> $crate::ObjectProxy {
                self.proxy
            }
        }

        impl $crate::FromValue for $name {
            fn from_value(value: $crate::Value) -> $crate::Result<Self> {
                $crate::facade::facade_from_value(value)
            }
        }

        impl From<$name> for $crate::Value {
            fn from(facade: $name) -> Self {
                $crate::Value::Object(facade.proxy)
            }
        }

        impl From<&$name> for $crate::Value {
            fn from(facade: &$name) -> Self {
                $crate::Value::Object(facade.proxy.clone())
            }
        }
    };
}

/// Converts a decoded value into a facade.
///
/// Any non-sequence object is accepted. A class mismatch is logged, not
/// rejected, since remote class names are finer grained than facades.
#[doc(hidden)]
pub fn facade_from_value<F: Facade>(value: Value) -> Result<F> {
    match value {
        Value::Object(proxy) if proxy.proxy_class() == ProxyClass::ARRAY => {
            Err(crate::error::Error::UnexpectedValue {
                expected: F::CLASS.name(),
                found: "array object".to_string(),
            })
        }
        Value::Object(proxy) => {
            if proxy.proxy_class() != F::CLASS {
                tracing::debug!(
                    obj = proxy.id(),
                    resolved = %proxy.proxy_class(),
                    facade = %F::CLASS,
                    "viewing proxy through a different facade"
                );
            }
            Ok(F::from_proxy(proxy))
        }
        other => Err(unexpected(F::CLASS.name(), &other)),
    }
}

define_facade! {
    /// Any scriptable application.
    pub struct Application = "application";
}

impl Application {
    /// Obtains the application named `name` over `session`.
    pub fn open(session: &Session, name: &str) -> Result<Self> {
        session.get_application(name).map(Self::from_proxy)
    }

    pub fn name(&self) -> Result<String> {
        self.proxy.invoke("name", Vec::new(), Kwargs::new())
    }

    /// The bundle identifier.
    pub fn id(&self) -> Result<String> {
        self.proxy.invoke("id", Vec::new(), Kwargs::new())
    }

    pub fn version(&self) -> Result<String> {
        self.proxy.invoke("version", Vec::new(), Kwargs::new())
    }

    pub fn frontmost(&self) -> Result<bool> {
        self.proxy.invoke("frontmost", Vec::new(), Kwargs::new())
    }

    /// Brings the application to the front.
    pub fn activate(&self) -> Result<()> {
        self.proxy.invoke("activate", Vec::new(), Kwargs::new())
    }

    pub fn include_standard_additions(&self) -> Result<bool> {
        self.proxy.get("includeStandardAdditions")
    }

    pub fn set_include_standard_additions(&self, enabled: bool) -> Result<()> {
        self.proxy.set_property("includeStandardAdditions", enabled)
    }

    /// Asks the application for the parent of a class in its dictionary.
    pub fn parent_of_class(&self, class_name: &str) -> Result<Option<String>> {
        self.proxy.session().parent_of_class(&self.proxy, class_name)
    }
}
