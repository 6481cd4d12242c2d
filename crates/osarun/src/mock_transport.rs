//! In-memory stand-in for the remote script, for tests.
//!
//! `FakeRemote` keeps an object pool, answers every command the proxy layer
//! issues and records each call it receives. It is used by the unit and
//! integration suites and is not part of the supported API.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use osapack::ARRAY_CLASS_PREFIX;
use osapack::Command;
use osapack::Fault;
use osapack::ObjectId;
use osapack::Reference;
use osapack::Reply;
use osapack::Request;
use osapack::WireValue;

use crate::transport;
use crate::transport::ScriptChannel;

/// A remote method or callable body.
pub type MethodFn =
    Arc<dyn Fn(&[WireValue], &BTreeMap<String, WireValue>) -> Result<WireValue, Fault> + Send + Sync>;

/// A snippet body, receiving the bound locals.
pub type SnippetFn = Arc<dyn Fn(&BTreeMap<String, WireValue>) -> Result<WireValue, Fault> + Send + Sync>;

/// Native error number for a missing object or property.
pub const NO_SUCH_OBJECT: i64 = -1728;
/// Native error number for a rejected property write.
pub const WRITE_DENIED: i64 = -10003;
/// Native error number for an index outside a collection.
pub const ILLEGAL_INDEX: i64 = -1719;

#[derive(Default)]
struct FakeObject {
    class_name: Option<String>,
    app_name: Option<String>,
    plain_repr: Option<serde_json::Value>,
    properties: BTreeMap<String, WireValue>,
    read_only: HashSet<String>,
    elements: Option<Vec<WireValue>>,
    methods: HashMap<String, MethodFn>,
    callable: Option<MethodFn>,
}

impl FakeObject {
    fn read(&self, name: &str) -> Result<WireValue, Fault> {
        if let (Some(elements), "length") = (&self.elements, name) {
            return Ok(WireValue::int(elements.len() as i64));
        }
        self.properties
            .get(name)
            .cloned()
            .ok_or_else(|| Fault::new(format!("Can't get property {}", name)).with_number(NO_SUCH_OBJECT))
    }
}

#[derive(Default)]
struct FakeState {
    objects: HashMap<ObjectId, FakeObject>,
    next_id: ObjectId,
    apps: HashMap<String, ObjectId>,
    parents: HashMap<String, String>,
    snippets: HashMap<String, SnippetFn>,
    calls: Vec<(String, String)>,
    released: Vec<ObjectId>,
    offline: bool,
}

impl FakeState {
    fn insert(&mut self, object: FakeObject) -> ObjectId {
        self.next_id += 1;
        let id = self.next_id;
        self.objects.insert(id, object);
        id
    }

    fn object(&self, id: ObjectId) -> Result<&FakeObject, Fault> {
        self.objects
            .get(&id)
            .ok_or_else(|| Fault::new(format!("Invalid object id {}", id)).with_number(NO_SUCH_OBJECT))
    }

    fn object_mut(&mut self, id: ObjectId) -> Result<&mut FakeObject, Fault> {
        self.objects
            .get_mut(&id)
            .ok_or_else(|| Fault::new(format!("Invalid object id {}", id)).with_number(NO_SUCH_OBJECT))
    }

    fn reference(&self, id: ObjectId) -> Reference {
        match self.objects.get(&id) {
            Some(object) => Reference {
                obj_id: id,
                class_name: object.class_name.clone(),
                app_name: object.app_name.clone(),
                plain_repr: object.plain_repr.clone(),
            },
            None => Reference::outbound(id),
        }
    }

    /// Fills in class and application names of every reference in `value`.
    fn hydrate(&self, value: WireValue) -> WireValue {
        match value {
            WireValue::Reference(r) => WireValue::reference(self.reference(r.obj_id)),
            WireValue::Array { data } => {
                WireValue::array(data.into_iter().map(|v| self.hydrate(v)).collect())
            }
            WireValue::Dict { data } => {
                WireValue::dict(data.into_iter().map(|(k, v)| (k, self.hydrate(v))).collect())
            }
            other => other,
        }
    }

    fn element_at(&self, id: ObjectId, args: &[WireValue]) -> Result<WireValue, Fault> {
        let elements = self.object(id)?.elements.as_deref().unwrap_or_default();
        let index = args
            .first()
            .and_then(WireValue::as_i64)
            .ok_or_else(|| Fault::new("at() expects an integer index"))?;
        usize::try_from(index)
            .ok()
            .and_then(|i| elements.get(i))
            .cloned()
            .ok_or_else(|| Fault::new(format!("Invalid index {}", index)).with_number(ILLEGAL_INDEX))
    }

    /// Keeps the reference elements whose properties equal every entry of
    /// the filter dict.
    fn whose(&mut self, id: ObjectId, args: &[WireValue]) -> Result<WireValue, Fault> {
        let filter = args
            .first()
            .and_then(WireValue::as_dict)
            .cloned()
            .ok_or_else(|| Fault::new("whose() expects a filter dict"))?;
        let source = self.object(id)?;
        let class_name = source.class_name.clone();
        let kept: Vec<WireValue> = source
            .elements
            .iter()
            .flatten()
            .filter(|element| {
                let Some(r) = element.as_reference() else {
                    return false;
                };
                self.objects.get(&r.obj_id).is_some_and(|target| {
                    filter
                        .iter()
                        .all(|(k, v)| target.properties.get(k) == Some(v))
                })
            })
            .cloned()
            .collect();

        let filtered = self.insert(FakeObject {
            class_name,
            elements: Some(kept),
            ..FakeObject::default()
        });
        Ok(WireValue::reference(Reference::outbound(filtered)))
    }
}

/// Scriptable in-memory remote implementing the full command set.
#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<FakeState>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ========================================================================
    //  POOL SETUP
    // ========================================================================

    /// Adds an application whose `name` property is `name`.
    pub fn add_application(&self, name: &str) -> ObjectId {
        let mut state = self.lock();
        let mut object = FakeObject {
            class_name: Some("application".to_string()),
            app_name: Some(name.to_string()),
            ..FakeObject::default()
        };
        object.properties.insert("name".to_string(), WireValue::string(name));
        let id = state.insert(object);
        state.apps.insert(name.to_string(), id);
        id
    }

    /// Adds an object of remote class `class_name`.
    pub fn add_object(&self, class_name: &str) -> ObjectId {
        self.lock().insert(FakeObject {
            class_name: Some(class_name.to_string()),
            ..FakeObject::default()
        })
    }

    /// Adds an object that reports no class at all.
    pub fn add_anonymous_object(&self) -> ObjectId {
        self.lock().insert(FakeObject::default())
    }

    /// Adds a collection of `element_class` elements.
    pub fn add_array(&self, element_class: &str, elements: Vec<WireValue>) -> ObjectId {
        self.lock().insert(FakeObject {
            class_name: Some(format!("{}{}", ARRAY_CLASS_PREFIX, element_class)),
            elements: Some(elements),
            ..FakeObject::default()
        })
    }

    /// Adds a collection whose elements are the objects `ids`.
    pub fn add_object_array(&self, element_class: &str, ids: &[ObjectId]) -> ObjectId {
        let elements = ids
            .iter()
            .map(|id| WireValue::reference(Reference::outbound(*id)))
            .collect();
        self.add_array(element_class, elements)
    }

    pub fn set_property(&self, id: ObjectId, name: &str, value: WireValue) {
        if let Some(object) = self.lock().objects.get_mut(&id) {
            object.properties.insert(name.to_string(), value);
        }
    }

    /// Makes property `name` of `id` point at the object `target`.
    pub fn set_reference(&self, id: ObjectId, name: &str, target: ObjectId) {
        self.set_property(id, name, WireValue::reference(Reference::outbound(target)));
    }

    pub fn mark_read_only(&self, id: ObjectId, name: &str) {
        if let Some(object) = self.lock().objects.get_mut(&id) {
            object.read_only.insert(name.to_string());
        }
    }

    pub fn set_plain_repr(&self, id: ObjectId, repr: serde_json::Value) {
        if let Some(object) = self.lock().objects.get_mut(&id) {
            object.plain_repr = Some(repr);
        }
    }

    pub fn add_method<F>(&self, id: ObjectId, name: &str, body: F)
    where
        F: Fn(&[WireValue], &BTreeMap<String, WireValue>) -> Result<WireValue, Fault> + Send + Sync + 'static,
    {
        if let Some(object) = self.lock().objects.get_mut(&id) {
            object.methods.insert(name.to_string(), Arc::new(body));
        }
    }

    /// Makes `id` callable through `callSelf`.
    pub fn set_callable<F>(&self, id: ObjectId, body: F)
    where
        F: Fn(&[WireValue], &BTreeMap<String, WireValue>) -> Result<WireValue, Fault> + Send + Sync + 'static,
    {
        if let Some(object) = self.lock().objects.get_mut(&id) {
            object.callable = Some(Arc::new(body));
        }
    }

    /// Declares `parent` as the superclass of `class_name`.
    pub fn set_parent_class(&self, class_name: &str, parent: &str) {
        self.lock().parents.insert(class_name.to_string(), parent.to_string());
    }

    /// Registers the result of evaluating `source`, in either script language.
    pub fn add_snippet<F>(&self, source: &str, body: F)
    where
        F: Fn(&BTreeMap<String, WireValue>) -> Result<WireValue, Fault> + Send + Sync + 'static,
    {
        self.lock().snippets.insert(source.to_string(), Arc::new(body));
    }

    /// The full inbound reference for `id`, as the remote would send it.
    pub fn reference(&self, id: ObjectId) -> WireValue {
        WireValue::reference(self.lock().reference(id))
    }

    /// While offline every call fails at the transport level.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    // ========================================================================
    //  INSPECTION
    // ========================================================================

    /// Every `(command, argument)` pair received so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, command: Command) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|(name, _)| name == command.name())
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.len()
    }

    /// Identifiers received through `releaseObjectWithId`, in order.
    pub fn released(&self) -> Vec<ObjectId> {
        self.lock().released.clone()
    }

    pub fn property(&self, id: ObjectId, name: &str) -> Option<WireValue> {
        self.lock().objects.get(&id).and_then(|o| o.properties.get(name).cloned())
    }

    // ========================================================================
    //  DISPATCH
    // ========================================================================

    fn dispatch(&self, request: &Request) -> Result<Option<WireValue>, Fault> {
        match request.command() {
            Command::GetApplication => {
                let name = request.str("name").map_err(bad_request)?;
                let state = self.lock();
                state
                    .apps
                    .get(name)
                    .map(|id| Some(WireValue::reference(Reference::outbound(*id))))
                    .ok_or_else(|| Fault::new(format!("Application can't be found: {}", name)).with_number(-2700))
            }
            Command::GetProperty => {
                let id = request.object("obj").map_err(bad_request)?;
                let name = request.str("name").map_err(bad_request)?;
                self.lock().object(id)?.read(name).map(Some)
            }
            Command::GetProperties => {
                let id = request.object("obj").map_err(bad_request)?;
                let names = request.array("properties").map_err(bad_request)?;
                let state = self.lock();
                let object = state.object(id)?;
                let values = names
                    .iter()
                    .filter_map(WireValue::as_str)
                    .map(|name| (name.to_string(), object.read(name).unwrap_or_else(|_| WireValue::null())))
                    .collect();
                Ok(Some(WireValue::dict(values)))
            }
            Command::SetProperties => {
                let id = request.object("obj").map_err(bad_request)?;
                let key_values = request.dict("keyValues").map_err(bad_request)?;
                let mut state = self.lock();
                let object = state.object_mut(id)?;
                if let Some(locked) = key_values.keys().find(|k| object.read_only.contains(*k)) {
                    return Err(Fault::new(format!("Can't set {}: property is read-only", locked))
                        .with_number(WRITE_DENIED));
                }
                object.properties.extend(key_values);
                Ok(None)
            }
            Command::CallMethod => {
                let id = request.object("obj").map_err(bad_request)?;
                let name = request.str("name").map_err(bad_request)?;
                let args = request.array("args").map_err(bad_request)?;
                let kwargs = request.dict("kwargs").map_err(bad_request)?;

                let mut state = self.lock();
                let object = state.object(id)?;
                if let Some(method) = object.methods.get(name).cloned() {
                    drop(state);
                    return method(args, &kwargs).map(Some);
                }
                if object.elements.is_some() {
                    return match name {
                        "at" => state.element_at(id, args).map(Some),
                        "whose" => state.whose(id, args).map(Some),
                        _ => Err(method_not_found(name)),
                    };
                }
                // Properties are callable specifiers.
                object
                    .properties
                    .get(name)
                    .cloned()
                    .map(Some)
                    .ok_or_else(|| method_not_found(name))
            }
            Command::CallSelf => {
                let id = request.object("obj").map_err(bad_request)?;
                let args = request.array("args").map_err(bad_request)?;
                let kwargs = request.dict("kwargs").map_err(bad_request)?;

                let state = self.lock();
                let object = state.object(id)?;
                if let Some(body) = object.callable.clone() {
                    drop(state);
                    return body(args, &kwargs).map(Some);
                }
                match &object.elements {
                    Some(elements) => Ok(Some(WireValue::array(elements.clone()))),
                    None => Err(Fault::new("Object is not a function")),
                }
            }
            Command::ReleaseObjectWithId => {
                let id = request.int("id").map_err(bad_request)?;
                self.lock().released.push(id as ObjectId);
                Ok(None)
            }
            Command::EvalJxaSnippet | Command::EvalAppleScriptSnippet => {
                let source = request.str("source").map_err(bad_request)?;
                let locals = request.dict("locals").map_err(bad_request)?;
                let body = self.lock().snippets.get(source).cloned();
                match body {
                    Some(body) => body(&locals).map(Some),
                    None => Err(Fault::new(format!("SyntaxError: cannot evaluate {:?}", source)).with_number(-2700)),
                }
            }
            Command::ParentOfClass => {
                request.object("obj").map_err(bad_request)?;
                let class_name = request.str("className").map_err(bad_request)?;
                let state = self.lock();
                Ok(Some(match state.parents.get(class_name) {
                    Some(parent) => WireValue::string(parent.as_str()),
                    None => WireValue::null(),
                }))
            }
        }
    }
}

impl ScriptChannel for FakeRemote {
    fn call(&self, command: &str, argument: &str) -> transport::Result<String> {
        {
            let mut state = self.lock();
            state.calls.push((command.to_string(), argument.to_string()));
            if state.offline {
                return Err(transport::Error::Unavailable("remote script is not running".into()));
            }
        }

        let reply = match Request::decode(command, argument) {
            Ok(request) => match self.dispatch(&request) {
                Ok(Some(value)) => Reply::Value(self.lock().hydrate(value)),
                // Commands without a result acknowledge with an empty string.
                Ok(None) => return Ok(String::new()),
                Err(fault) => Reply::Fault(fault),
            },
            Err(e) => Reply::Fault(bad_request(e)),
        };
        reply.encode().map_err(|e| transport::Error::Malformed(e.to_string()))
    }
}

fn bad_request(e: osapack::Error) -> Fault {
    Fault::new(format!("Bad request: {}", e))
}

fn method_not_found(name: &str) -> Fault {
    Fault::new(format!("Method not found: {}", name))
}
