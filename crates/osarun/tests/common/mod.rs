//! Shared helpers for the integration suites.

#![allow(dead_code)]

use std::sync::Arc;

use osapack::ObjectId;

use osarun::ClassRegistry;
use osarun::Session;
use osarun::apps::devonthink;
use osarun::mock_transport::FakeRemote;

/// Installs a `RUST_LOG`-driven subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A fake remote hosting one application, and a default session over it.
pub fn session_with_app(name: &str) -> (Arc<FakeRemote>, Session) {
    init_tracing();
    let remote = Arc::new(FakeRemote::new());
    remote.add_application(name);
    let session = Session::builder(remote.clone()).name(name).build();
    (remote, session)
}

/// A fake DEVONthink, a session resolving its classes, and the application's
/// object id.
pub fn devonthink_session() -> (Arc<FakeRemote>, Session, ObjectId) {
    init_tracing();
    let remote = Arc::new(FakeRemote::new());
    let app_id = remote.add_application(devonthink::APP_NAME);
    let builder = ClassRegistry::builder().register_default_facade::<osarun::Application>("application");
    let registry = devonthink::register(builder).build();
    let session = Session::builder(remote.clone())
        .name("devonthink")
        .registry(registry)
        .build();
    (remote, session, app_id)
}
