//! # Object Proxy
//!
//! A local handle standing in for one object that lives in the target
//! application's process. Every operation is one blocking round trip on the
//! session that minted the proxy.
//!
//! ## Lifetime
//!
//! Decoding a `reference` creates one shared `Handle` and acquires one count
//! in the session's table. Cloning an `ObjectProxy` shares the handle; when
//! the last clone goes away the handle releases its count, and the remote
//! object is released once the count reaches zero. A released proxy cannot be
//! reached again, so use-after-release does not type-check.
//!
//! ## Application Scope
//!
//! Each proxy remembers the application it was reached through, as a name
//! plus a non-owning `Weak` handle. An application proxy links to itself.
//! The resolver asks that application for parent classes; once it has been
//! dropped, the session obtains it again by name, so a class resolves the
//! same way whether or not the application proxy is still held.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Weak;

use osapack::ObjectId;
use osapack::Reference;
use osapack::Request;

use crate::array::ArrayProxy;
use crate::class_map::ProxyClass;
use crate::codec;
use crate::error::Result;
use crate::facade::Facade;
use crate::resolver::ParentLookup;
use crate::session::Session;
use crate::session::SessionId;
use crate::value::FromValue;
use crate::value::Kwargs;
use crate::value::Value;

/// Remote class name of application objects.
pub const APPLICATION_CLASS: &str = "application";

/// The counted state behind every clone of one proxy.
pub(crate) struct Handle {
    session: Session,
    id: ObjectId,
    class_name: Option<String>,
    class: ProxyClass,
    app: AppLink,
    plain_repr: Option<serde_json::Value>,
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.session.release_reference(self.id);
    }
}

/// Non-owning link to the application a proxy was reached through.
#[derive(Clone, Debug, Default)]
pub(crate) struct AppLink {
    name: Option<String>,
    handle: Weak<Handle>,
}

impl AppLink {
    /// A link that knows the application's name but cannot reach it.
    pub(crate) fn named(name: Option<String>) -> Self {
        Self { name, handle: Weak::new() }
    }

    pub(crate) fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn upgrade(&self) -> Option<ObjectProxy> {
        self.handle.upgrade().map(|handle| ObjectProxy { handle })
    }

    fn is_live(&self) -> bool {
        self.handle.strong_count() > 0
    }
}

/// Answers parent-class queries for one decode, in the scope of `link`.
///
/// A dead link is revived by name, at most once per walk.
struct AppScope<'a> {
    session: &'a Session,
    link: &'a AppLink,
    revived: RefCell<Option<ObjectProxy>>,
}

impl<'a> AppScope<'a> {
    fn new(session: &'a Session, link: &'a AppLink) -> Self {
        Self { session, link, revived: RefCell::new(None) }
    }

    fn can_answer(&self) -> bool {
        self.link.is_live() || self.link.name().is_some()
    }

    fn application(&self) -> Result<Option<ObjectProxy>> {
        if let Some(app) = self.link.upgrade() {
            return Ok(Some(app));
        }
        if let Some(app) = self.revived.borrow().as_ref() {
            return Ok(Some(app.clone()));
        }
        let Some(name) = self.link.name() else {
            return Ok(None);
        };
        tracing::debug!(app = name, "application proxy gone, obtaining it again");
        let app = self.session.revive_application(name)?;
        *self.revived.borrow_mut() = app.clone();
        Ok(app)
    }
}

impl ParentLookup for AppScope<'_> {
    fn parent_of_class(&self, class_name: &str) -> Result<Option<String>> {
        match self.application()? {
            Some(app) => self.session.query_parent(&app, class_name),
            None => Ok(None),
        }
    }
}

/// Generic dynamic proxy: any property, any method, by name.
#[derive(Clone)]
pub struct ObjectProxy {
    handle: Arc<Handle>,
}

impl ObjectProxy {
    /// Builds the proxy for an inbound reference and acquires its count.
    pub(crate) fn from_reference(session: &Session, reference: Reference, scope: Option<&AppLink>) -> Self {
        let Reference { obj_id, class_name, app_name, plain_repr } = reference;

        let link = match (app_name, scope) {
            (Some(name), Some(scope)) if scope.name() == Some(name.as_str()) => scope.clone(),
            (Some(name), _) => AppLink::named(Some(name)),
            (None, Some(scope)) => scope.clone(),
            (None, None) => AppLink::default(),
        };

        let is_application = class_name.as_deref() == Some(APPLICATION_CLASS);
        let class = {
            let scope = AppScope::new(session, &link);
            let parents: Option<&dyn ParentLookup> = if !is_application && scope.can_answer() {
                Some(&scope)
            } else {
                None
            };
            session.resolver().resolve(link.name(), class_name.as_deref(), parents)
        };

        let count = session.refs().acquire(obj_id);
        tracing::debug!(
            session = %session.id(),
            obj = obj_id,
            class = %class,
            remote_class = class_name.as_deref().unwrap_or("-"),
            count,
            "proxy acquired"
        );

        let handle = if is_application {
            let name = link.name;
            Arc::new_cyclic(|this| Handle {
                session: session.clone(),
                id: obj_id,
                class_name,
                class,
                app: AppLink { name, handle: this.clone() },
                plain_repr,
            })
        } else {
            Arc::new(Handle {
                session: session.clone(),
                id: obj_id,
                class_name,
                class,
                app: link,
                plain_repr,
            })
        };
        Self { handle }
    }

    /// The remote object identifier.
    pub fn id(&self) -> ObjectId {
        self.handle.id
    }

    /// The class name the remote side reported, if any.
    pub fn class_name(&self) -> Option<&str> {
        self.handle.class_name.as_deref()
    }

    /// The local proxy type the resolver chose.
    pub fn proxy_class(&self) -> ProxyClass {
        self.handle.class
    }

    pub fn session(&self) -> &Session {
        &self.handle.session
    }

    pub fn application_name(&self) -> Option<&str> {
        self.handle.app.name()
    }

    /// The application this proxy was reached through, while it is alive.
    pub fn application(&self) -> Option<ObjectProxy> {
        self.handle.app.upgrade()
    }

    /// The plain snapshot the remote side attached, if it sent one.
    pub fn plain_repr(&self) -> Option<&serde_json::Value> {
        self.handle.plain_repr.as_ref()
    }

    /// True when both proxies stand for the same remote object.
    pub fn same_object(&self, other: &ObjectProxy) -> bool {
        self.session().id() == other.session().id() && self.id() == other.id()
    }

    fn owner(&self) -> SessionId {
        self.session().id()
    }

    fn request(&self, request: &Request) -> Result<Value> {
        self.session().request(request, Some(&self.handle.app))
    }

    // ========================================================================
    //  PROPERTIES
    // ========================================================================

    pub fn get_property(&self, name: &str) -> Result<Value> {
        self.request(&Request::get_property(self.id(), name))
    }

    /// Reads one property as `T`.
    pub fn get<T: FromValue>(&self, name: &str) -> Result<T> {
        T::from_value(self.get_property(name)?)
    }

    /// Reads several properties in one round trip.
    pub fn get_properties(&self, names: &[&str]) -> Result<BTreeMap<String, Value>> {
        self.request(&Request::get_properties(self.id(), names))?.extract()
    }

    /// Writes one property. Fails with `Error::Remote` when the remote side
    /// rejects the mutation.
    pub fn set_property(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let mut values = Kwargs::new();
        values.insert(name.to_string(), value.into());
        self.set_properties(values)
    }

    /// Writes several properties in one round trip.
    pub fn set_properties(&self, values: Kwargs) -> Result<()> {
        let key_values = codec::encode_map(self.owner(), &values)?;
        self.request(&Request::set_properties(self.id(), key_values))?;
        Ok(())
    }

    // ========================================================================
    //  CALLS
    // ========================================================================

    pub fn call_method(&self, name: &str, args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
        let args = codec::encode_args(self.owner(), &args)?;
        let kwargs = codec::encode_map(self.owner(), &kwargs)?;
        self.request(&Request::call_method(self.id(), name, args, kwargs))
    }

    /// Calls a method and converts the result to `T`.
    pub fn invoke<T: FromValue>(&self, name: &str, args: Vec<Value>, kwargs: Kwargs) -> Result<T> {
        T::from_value(self.call_method(name, args, kwargs)?)
    }

    /// Invokes the object itself as a function.
    pub fn call_self(&self, args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
        let args = codec::encode_args(self.owner(), &args)?;
        let kwargs = codec::encode_map(self.owner(), &kwargs)?;
        self.request(&Request::call_self(self.id(), args, kwargs))
    }

    /// Calls the method `name`, or the object itself when `name` is `None`.
    pub fn call(&self, name: Option<&str>, args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
        match name {
            Some(name) => self.call_method(name, args, kwargs),
            None => self.call_self(args, kwargs),
        }
    }

    // ========================================================================
    //  RE-TYPING
    // ========================================================================

    /// Views this proxy as the facade `F`, whatever class it resolved to.
    pub fn cast<F: Facade>(&self) -> F {
        F::from_proxy(self.clone())
    }

    /// Views this proxy as `F` only when it resolved to `F::CLASS`.
    pub fn downcast<F: Facade>(self) -> std::result::Result<F, ObjectProxy> {
        if self.proxy_class() == F::CLASS {
            Ok(F::from_proxy(self))
        } else {
            Err(self)
        }
    }

    /// Views this proxy as a sequence, when it resolved to one.
    pub fn into_array(self) -> std::result::Result<ArrayProxy, ObjectProxy> {
        ArrayProxy::try_from_proxy(self)
    }
}

impl PartialEq for ObjectProxy {
    fn eq(&self, other: &Self) -> bool {
        self.same_object(other)
    }
}

impl std::fmt::Debug for ObjectProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectProxy")
            .field("session", &self.session().id())
            .field("id", &self.id())
            .field("class_name", &self.class_name())
            .field("class", &self.proxy_class())
            .field("app", &self.application_name())
            .finish()
    }
}
