//! Tests for sessions and proxies over mock channels.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use chrono::TimeZone;
use chrono::Utc;
use osapack::Command;
use osapack::Fault;
use osapack::WireValue;

use crate::ArrayProxy;
use crate::ClassRegistry;
use crate::Error;
use crate::Facade;
use crate::Kwargs;
use crate::ObjectProxy;
use crate::ProxyClass;
use crate::Session;
use crate::Value;
use crate::apps::devonthink;
use crate::apps::devonthink::DevonThink;
use crate::facade::Application;
use crate::mock_transport::FakeRemote;
use crate::transport;
use crate::transport::FnChannel;
use crate::transport::ScriptChannel;

/// Channel whose target never answers.
struct UnavailableChannel;

impl ScriptChannel for UnavailableChannel {
    fn call(&self, _command: &str, _argument: &str) -> transport::Result<String> {
        Err(transport::Error::Unavailable("application is not running".into()))
    }
}

/// Channel that replies with text that is not wire format.
struct MalformedChannel;

impl ScriptChannel for MalformedChannel {
    fn call(&self, _command: &str, _argument: &str) -> transport::Result<String> {
        Ok("<<not json>>".into())
    }
}

/// Channel that answers every command with one fixed reply, recording calls.
struct FixedChannel {
    reply: String,
    calls: Mutex<Vec<(String, String)>>,
}

impl FixedChannel {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self { reply: reply.into(), calls: Mutex::new(Vec::new()) })
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ScriptChannel for FixedChannel {
    fn call(&self, command: &str, argument: &str) -> transport::Result<String> {
        self.calls.lock().unwrap().push((command.into(), argument.into()));
        Ok(self.reply.clone())
    }
}

fn fake_with_app(name: &str) -> (Arc<FakeRemote>, Session) {
    let remote = Arc::new(FakeRemote::new());
    remote.add_application(name);
    let session = Session::new(remote.clone());
    (remote, session)
}

#[test]
fn test_transport_failure_surfaces_unchanged() {
    let session = Session::new(Arc::new(UnavailableChannel));
    let err = session.get_application("Finder").unwrap_err();
    assert_eq!(
        err,
        Error::Transport(transport::Error::Unavailable("application is not running".into()))
    );
    assert!(!err.is_remote());
}

#[test]
fn test_malformed_reply_is_protocol_error() {
    let session = Session::new(Arc::new(MalformedChannel));
    let err = session.eval_jxa("1 + 1", Kwargs::new()).unwrap_err();
    assert!(matches!(err, Error::Protocol(_)), "got {:?}", err);
}

#[test]
fn test_fault_reply_carries_message_verbatim() {
    let channel = FixedChannel::new(r#"{"error":{"message":"Can't get object.","number":-1728}}"#);
    let session = Session::new(channel.clone());

    let err = session.eval_applescript("get foo").unwrap_err();
    assert_eq!(
        err,
        Error::Remote {
            command: "evalAppleScriptCodeSnippet".into(),
            message: "Can't get object.".into(),
            number: Some(-1728),
        }
    );
    assert_eq!(channel.calls().len(), 1);
}

#[test]
fn test_empty_reply_reads_as_null() {
    let channel = FixedChannel::new("");
    let session = Session::new(channel);
    assert_eq!(session.eval_jxa("undefined", Kwargs::new()).unwrap(), Value::Null);
}

#[test]
fn test_closure_channel_sees_command_and_argument() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let channel = FnChannel::new(move |command: &str, argument: &str| {
        log.lock().unwrap().push((command.to_string(), argument.to_string()));
        Ok(r#"{"type":"plain","data":"ok"}"#.to_string())
    });
    let session = Session::new(Arc::new(channel));

    let value = session.eval_applescript("return \"ok\"").unwrap();
    assert_eq!(value, Value::from("ok"));

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].0, "evalAppleScriptCodeSnippet");
    let argument: serde_json::Value = serde_json::from_str(&seen[0].1).unwrap();
    assert_eq!(argument["type"], "dict");
    assert_eq!(argument["data"]["source"]["data"], "return \"ok\"");
}

#[test]
fn test_application_name_property() {
    let (_remote, session) = fake_with_app("TargetApp");
    let app = session.get_application("TargetApp").unwrap();

    assert_eq!(app.get_property("name").unwrap(), Value::from("TargetApp"));
    assert_eq!(app.proxy_class(), Application::CLASS);
    assert_eq!(app.application_name(), Some("TargetApp"));
    assert!(app.application().unwrap().same_object(&app));
}

#[test]
fn test_unknown_application_is_remote_error() {
    let (_remote, session) = fake_with_app("TargetApp");
    let err = session.get_application("Missing").unwrap_err();
    assert!(err.is_remote());
}

#[test]
fn test_non_finite_float_never_reaches_the_wire() {
    let (remote, session) = fake_with_app("TargetApp");
    let app = session.get_application("TargetApp").unwrap();
    let before = remote.total_calls();

    let err = app
        .call_method("doSomething", vec![Value::Float(f64::NAN)], Kwargs::new())
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedType(_)));
    assert_eq!(remote.total_calls(), before);
}

#[test]
fn test_foreign_proxy_never_reaches_the_wire() {
    let (remote_a, session_a) = fake_with_app("A");
    let (remote_b, session_b) = fake_with_app("B");
    let a = session_a.get_application("A").unwrap();
    let b = session_b.get_application("B").unwrap();
    let calls_b = remote_b.total_calls();

    let err = b.set_property("peer", &a).unwrap_err();
    assert!(matches!(err, Error::UnsupportedType(_)));
    assert_eq!(remote_b.total_calls(), calls_b);
    drop(remote_a);
}

#[test]
fn test_parent_query_through_foreign_application() {
    let (_remote_a, session_a) = fake_with_app("A");
    let (remote_b, session_b) = fake_with_app("B");
    let a = session_a.get_application("A").unwrap();
    let calls_b = remote_b.total_calls();

    let err = session_b.parent_of_class(&a, "document").unwrap_err();
    assert!(matches!(err, Error::UnexpectedValue { .. }));
    assert!(!err.is_remote());
    assert_eq!(remote_b.total_calls(), calls_b);
}

#[test]
fn test_release_on_last_drop_only() {
    let (remote, session) = fake_with_app("TargetApp");
    let app = session.get_application("TargetApp").unwrap();
    let doc = remote.add_object("document");
    let app_id = app.id();
    remote.set_reference(app_id, "frontDocument", doc);

    let first: ObjectProxy = app.get("frontDocument").unwrap();
    let second: ObjectProxy = app.get("frontDocument").unwrap();
    assert_eq!(session.refs().count(doc), 2);

    let clone = first.clone();
    drop(first);
    drop(second);
    assert!(remote.released().is_empty());
    assert_eq!(session.refs().count(doc), 1);

    drop(clone);
    assert_eq!(remote.released(), vec![doc]);
    assert_eq!(session.refs().count(doc), 0);
}

#[test]
fn test_release_failure_is_swallowed() {
    let (remote, session) = fake_with_app("TargetApp");
    let app = session.get_application("TargetApp").unwrap();
    let id = app.id();

    remote.set_offline(true);
    drop(app);

    assert_eq!(session.live_objects(), 0);
    assert!(remote.released().is_empty());
    assert_eq!(remote.calls().last().map(|(c, _)| c.clone()), Some("releaseObjectWithId".into()));
    assert_eq!(session.refs().count(id), 0);
}

#[test]
fn test_release_on_drop_can_be_disabled() {
    let remote = Arc::new(FakeRemote::new());
    remote.add_application("TargetApp");
    let session = Session::builder(remote.clone())
        .name("quiet")
        .release_on_drop(false)
        .build();
    assert_eq!(session.name(), "quiet");

    drop(session.get_application("TargetApp").unwrap());
    assert_eq!(session.live_objects(), 0);
    assert_eq!(remote.call_count(Command::ReleaseObjectWithId), 0);
}

#[test]
fn test_read_only_property_is_remote_error() {
    let (remote, session) = fake_with_app("TargetApp");
    let app = session.get_application("TargetApp").unwrap();
    remote.mark_read_only(app.id(), "name");

    let err = app.set_property("name", "Other").unwrap_err();
    match err {
        Error::Remote { command, message, number } => {
            assert_eq!(command, "setProperties");
            assert!(message.contains("read-only"));
            assert_eq!(number, Some(crate::mock_transport::WRITE_DENIED));
        }
        other => panic!("expected remote error, got {:?}", other),
    }
    assert_eq!(app.get_property("name").unwrap(), Value::from("TargetApp"));
}

#[test]
fn test_bulk_properties() {
    let (remote, session) = fake_with_app("TargetApp");
    let app = session.get_application("TargetApp").unwrap();

    let mut values = Kwargs::new();
    values.insert("version".into(), "1.2".into());
    values.insert("frontmost".into(), true.into());
    app.set_properties(values).unwrap();
    assert_eq!(remote.property(app.id(), "frontmost"), Some(WireValue::bool(true)));

    let read = app.get_properties(&["name", "version", "missing"]).unwrap();
    assert_eq!(read["name"], Value::from("TargetApp"));
    assert_eq!(read["version"], Value::from("1.2"));
    assert_eq!(read["missing"], Value::Null);
}

#[test]
fn test_call_method_passes_objects_by_id() {
    let (remote, session) = fake_with_app("TargetApp");
    let app = session.get_application("TargetApp").unwrap();
    let app_id = app.id();
    remote.add_method(app_id, "describe", move |args, kwargs| {
        let target = args
            .first()
            .and_then(WireValue::as_reference)
            .ok_or_else(|| Fault::new("expected an object"))?;
        let verbose = kwargs.get("verbose").and_then(|v| v.as_str()).unwrap_or("no");
        Ok(WireValue::string(format!("{}:{}", target.obj_id, verbose)))
    });

    let out: String = app
        .invoke("describe", vec![app.clone().into()], crate::kwargs([("verbose", Some("yes".into()))]))
        .unwrap();
    assert_eq!(out, format!("{}:yes", app_id));
}

#[test]
fn test_missing_method_is_remote_error() {
    let (_remote, session) = fake_with_app("TargetApp");
    let app = session.get_application("TargetApp").unwrap();
    let err = app.call_method("explode", Vec::new(), Kwargs::new()).unwrap_err();
    assert_eq!(
        err,
        Error::Remote {
            command: "callMethod".into(),
            message: "Method not found: explode".into(),
            number: None,
        }
    );
}

#[test]
fn test_call_without_name_invokes_self() {
    let (remote, session) = fake_with_app("TargetApp");
    let app = session.get_application("TargetApp").unwrap();
    let text = remote.add_object("text");
    remote.set_callable(text, |_, _| Ok(WireValue::string("hello world")));
    remote.set_reference(app.id(), "body", text);

    let body: ObjectProxy = app.get("body").unwrap();
    assert_eq!(body.call(None, Vec::new(), Kwargs::new()).unwrap(), Value::from("hello world"));
    assert_eq!(remote.call_count(Command::CallSelf), 1);
}

#[test]
fn test_dates_cross_the_wire() {
    let (remote, session) = fake_with_app("TargetApp");
    let app = session.get_application("TargetApp").unwrap();
    let when = Utc.with_ymd_and_hms(2024, 2, 29, 12, 30, 15).unwrap()
        + chrono::Duration::milliseconds(250);

    app.set_property("modificationDate", when).unwrap();
    assert_eq!(
        remote.property(app.id(), "modificationDate"),
        Some(WireValue::date(when.timestamp_millis() as f64 / 1000.0))
    );
    assert_eq!(app.get_property("modificationDate").unwrap(), Value::Date(when));
}

#[test]
fn test_eval_snippet_with_locals() {
    let (remote, session) = fake_with_app("TargetApp");
    remote.add_snippet("a + b", |locals| {
        let a = locals.get("a").and_then(WireValue::as_i64).unwrap_or(0);
        let b = locals.get("b").and_then(WireValue::as_i64).unwrap_or(0);
        Ok(WireValue::int(a + b))
    });

    let mut locals = BTreeMap::new();
    locals.insert("a".to_string(), Value::Int(2));
    locals.insert("b".to_string(), Value::Int(40));
    assert_eq!(session.eval_jxa("a + b", locals).unwrap(), Value::Int(42));
    assert!(session.eval_jxa("nope(", Kwargs::new()).unwrap_err().is_remote());
}

#[test]
fn test_plain_repr_is_exposed() {
    let (remote, session) = fake_with_app("TargetApp");
    let app = session.get_application("TargetApp").unwrap();
    let color = remote.add_object("color");
    remote.set_plain_repr(color, serde_json::json!([65535, 0, 0]));
    remote.set_reference(app.id(), "highlight", color);

    let proxy: ObjectProxy = app.get("highlight").unwrap();
    assert_eq!(proxy.plain_repr(), Some(&serde_json::json!([65535, 0, 0])));
    assert_eq!(app.plain_repr(), None);
}

#[test]
fn test_anonymous_object_is_dynamic() {
    let (remote, session) = fake_with_app("TargetApp");
    let app = session.get_application("TargetApp").unwrap();
    let thing = remote.add_anonymous_object();
    remote.set_reference(app.id(), "thing", thing);

    let proxy: ObjectProxy = app.get("thing").unwrap();
    assert_eq!(proxy.class_name(), None);
    assert_eq!(proxy.proxy_class(), ProxyClass::DYNAMIC);
    assert_eq!(remote.call_count(Command::ParentOfClass), 0);
}

#[test]
fn test_cast_and_downcast() {
    let remote = Arc::new(FakeRemote::new());
    remote.add_application(devonthink::APP_NAME);
    let registry = devonthink::register(ClassRegistry::builder()).build();
    let session = Session::builder(remote.clone()).registry(registry).build();

    let app = session.get_application(devonthink::APP_NAME).unwrap();
    assert_eq!(app.proxy_class(), DevonThink::CLASS);

    let generic: Application = app.cast();
    assert_eq!(generic.proxy().id(), app.id());
    assert!(app.clone().downcast::<Application>().is_err());
    let typed = app.downcast::<DevonThink>().unwrap();
    assert_eq!(typed.application().name().unwrap(), devonthink::APP_NAME);
}

#[test]
fn test_sequence_proxy_from_value() {
    let (remote, session) = fake_with_app("TargetApp");
    let app = session.get_application("TargetApp").unwrap();
    let list = remote.add_array("item", vec![WireValue::int(1)]);
    remote.set_reference(app.id(), "items", list);

    let items: ArrayProxy = app.get("items").unwrap();
    assert_eq!(items.element_class(), Some("item"));
    assert!(app.get::<ArrayProxy>("name").is_err());
    assert!(app.clone().into_array().is_err());
}
