//! # Session
//!
//! One open channel to a running target application, plus everything scoped
//! to it: the reference count table and the class resolver.
//!
//! ## Philosophy
//!
//! - **Per-Channel Arena**: Counts and memoized class resolutions belong to the
//!   session, never to the process. Two sessions never share state.
//! - **Sequential**: One round trip at a time per session. Threads sharing a
//!   session queue on its call lock; their relative order is unspecified.
//! - **Finalizers Never Fail**: Releasing a remote object on drop swallows and
//!   logs transport errors.
//!
//! ## Invariants
//!
//! - A round trip, the decoding of its reply and every count it acquires
//!   happen under the session's call lock.
//! - A dropped handle only queues its id. Counts are decremented, and remote
//!   releases sent, by whoever holds the call lock: the dropping thread when
//!   the lock is free, otherwise the current holder before it lets go. A
//!   release therefore never overtakes a reply that hands the same object
//!   out again.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::TryLockError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use osapack::ObjectId;
use osapack::Reply;
use osapack::Request;
use osapack::WireValue;

use crate::class_map::ClassRegistry;
use crate::codec;
use crate::error::Error;
use crate::error::Result;
use crate::proxy::AppLink;
use crate::proxy::ObjectProxy;
use crate::refs::RefTable;
use crate::refs::Release;
use crate::resolver::ClassResolver;
use crate::transport::ScriptChannel;
use crate::value::FromValue;
use crate::value::Kwargs;
use crate::value::Value;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Process-unique session identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        Self(NEXT_SESSION.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

struct SessionInner {
    id: SessionId,
    name: String,
    channel: Arc<dyn ScriptChannel>,
    refs: RefTable,
    resolver: ClassResolver,
    release_on_drop: bool,
    calls: Mutex<()>,
    pending: Mutex<Vec<ObjectId>>,
    reviving: AtomicBool,
}

/// A cheap, cloneable handle to one channel.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// A session with the default registry and release-on-drop enabled.
    pub fn new(channel: Arc<dyn ScriptChannel>) -> Self {
        Self::builder(channel).build()
    }

    pub fn builder(channel: Arc<dyn ScriptChannel>) -> SessionBuilder {
        SessionBuilder {
            channel,
            name: None,
            registry: None,
            release_on_drop: true,
        }
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn refs(&self) -> &RefTable {
        &self.inner.refs
    }

    pub fn resolver(&self) -> &ClassResolver {
        &self.inner.resolver
    }

    /// Number of remote objects this session currently holds.
    pub fn live_objects(&self) -> usize {
        self.inner.refs.len()
    }

    // ========================================================================
    //  ENTRY POINTS
    // ========================================================================

    /// Obtains the root proxy of a named scriptable application.
    pub fn get_application(&self, name: &str) -> Result<ObjectProxy> {
        self.exclusive(|| self.fetch_application(name))
    }

    /// Evaluates a script snippet in the remote script's own language, with
    /// `locals` bound as variables.
    pub fn eval_jxa(&self, source: &str, locals: Kwargs) -> Result<Value> {
        let locals = codec::encode_map(self.id(), &locals)?;
        self.request(&Request::eval_jxa(source, locals), None)
    }

    /// Evaluates an AppleScript snippet.
    pub fn eval_applescript(&self, source: &str) -> Result<Value> {
        self.request(&Request::eval_applescript(source), None)
    }

    /// Asks `app` for the parent class of `class_name`. `None` at the root.
    pub fn parent_of_class(&self, app: &ObjectProxy, class_name: &str) -> Result<Option<String>> {
        self.exclusive(|| self.query_parent(app, class_name))
    }

    // ========================================================================
    //  DISPATCH
    // ========================================================================

    /// Sends one request and decodes the reply in `scope`.
    pub(crate) fn request(&self, request: &Request, scope: Option<&AppLink>) -> Result<Value> {
        self.exclusive(|| self.dispatch(request, scope))
    }

    /// Runs `f` under the call lock, then settles the releases queued
    /// meanwhile.
    fn exclusive<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let guard = self.inner.calls.lock().unwrap_or_else(PoisonError::into_inner);
        let result = f();
        self.flush_releases();
        drop(guard);
        self.drain_releases();
        result
    }

    // The methods below expect the call lock to be held.

    fn dispatch(&self, request: &Request, scope: Option<&AppLink>) -> Result<Value> {
        let wire = self.round_trip(request)?;
        codec::decode(self, wire, scope)
    }

    /// Obtains an application proxy by name.
    fn fetch_application(&self, name: &str) -> Result<ObjectProxy> {
        let scope = AppLink::named(Some(name.to_string()));
        ObjectProxy::from_value(self.dispatch(&Request::get_application(name), Some(&scope))?)
    }

    /// Obtains an application again for a parent query. Returns `None` when
    /// called while already doing so, which happens only when the remote side
    /// answers `getApplication` with an object of another class.
    pub(crate) fn revive_application(&self, name: &str) -> Result<Option<ObjectProxy>> {
        if self.inner.reviving.swap(true, Ordering::Relaxed) {
            return Ok(None);
        }
        let app = self.fetch_application(name);
        self.inner.reviving.store(false, Ordering::Relaxed);
        app.map(Some)
    }

    pub(crate) fn query_parent(&self, app: &ObjectProxy, class_name: &str) -> Result<Option<String>> {
        if app.session().id() != self.id() {
            return Err(Error::UnexpectedValue {
                expected: "application of this session",
                found: format!("object {} of {}", app.id(), app.session().id()),
            });
        }

        let wire = self.round_trip(&Request::parent_of_class(app.id(), class_name))?;
        if wire.is_null() {
            return Ok(None);
        }
        match wire.as_str() {
            Some(parent) => Ok(Some(parent.to_string())),
            None => Err(Error::UnexpectedValue {
                expected: "class name",
                found: wire.tag().to_string(),
            }),
        }
    }

    fn round_trip(&self, request: &Request) -> Result<WireValue> {
        let command = request.command();
        let argument = request.encode()?;
        tracing::trace!(session = %self.id(), %command, bytes = argument.len(), "sending command");

        let raw = self.inner.channel.call(command.name(), &argument)?;
        tracing::trace!(session = %self.id(), %command, bytes = raw.len(), "reply received");

        Reply::decode(&raw)?
            .into_result()
            .map_err(|fault| Error::remote(command, fault))
    }

    // ========================================================================
    //  RELEASE
    // ========================================================================

    /// Queues one dropped handle of `id` and settles it as soon as the call
    /// lock is free.
    pub(crate) fn release_reference(&self, id: ObjectId) {
        self.pending().push(id);
        self.drain_releases();
    }

    fn pending(&self) -> MutexGuard<'_, Vec<ObjectId>> {
        self.inner.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Settles queued releases unless another holder of the call lock will.
    fn drain_releases(&self) {
        loop {
            let guard = match self.inner.calls.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };
            self.flush_releases();
            drop(guard);
            if self.pending().is_empty() {
                return;
            }
        }
    }

    fn flush_releases(&self) {
        let ids = std::mem::take(&mut *self.pending());
        for id in ids {
            self.settle_release(id);
        }
    }

    /// Drops one local count for `id`, releasing the remote object when it
    /// was the last.
    fn settle_release(&self, id: ObjectId) {
        match self.inner.refs.release(id) {
            Release::Retained(remaining) => {
                tracing::debug!(session = %self.id(), obj = id, remaining, "proxy released");
            }
            Release::Untracked => {
                tracing::debug!(session = %self.id(), obj = id, "release of untracked object ignored");
            }
            Release::Freed => {
                tracing::debug!(session = %self.id(), obj = id, "last proxy released");
                if !self.inner.release_on_drop {
                    return;
                }
                let sent = Request::release_object(id)
                    .map_err(Error::from)
                    .and_then(|request| self.round_trip(&request));
                if let Err(e) = sent {
                    tracing::warn!(session = %self.id(), obj = id, error = %e, "remote release failed");
                }
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("live_objects", &self.inner.refs.len())
            .finish()
    }
}

/// Configures a `Session` before it is opened.
pub struct SessionBuilder {
    channel: Arc<dyn ScriptChannel>,
    name: Option<String>,
    registry: Option<Arc<ClassRegistry>>,
    release_on_drop: bool,
}

impl SessionBuilder {
    /// Display name used in logs. Defaults to the session id.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Registry to resolve remote classes against. Defaults to
    /// `ClassRegistry::with_defaults()`.
    pub fn registry(mut self, registry: impl Into<Arc<ClassRegistry>>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    /// Whether the last dropped proxy of an object sends
    /// `releaseObjectWithId`. Counts are kept either way.
    pub fn release_on_drop(mut self, enabled: bool) -> Self {
        self.release_on_drop = enabled;
        self
    }

    pub fn build(self) -> Session {
        let id = SessionId::next();
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(ClassRegistry::with_defaults()));
        let name = self.name.unwrap_or_else(|| id.to_string());
        tracing::debug!(session = %id, %name, registry = registry.version(), "session opened");

        Session {
            inner: Arc::new(SessionInner {
                id,
                name,
                channel: self.channel,
                refs: RefTable::new(),
                resolver: ClassResolver::new(registry),
                release_on_drop: self.release_on_drop,
                calls: Mutex::new(()),
                pending: Mutex::new(Vec::new()),
                reviving: AtomicBool::new(false),
            }),
        }
    }
}
