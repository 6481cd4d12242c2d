//! Remote objects are released exactly once, whatever order proxies die in.

mod common;

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use osapack::Command;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use osarun::FnChannel;
use osarun::ObjectProxy;
use osarun::ScriptChannel;
use osarun::Session;
use osarun::mock_transport::FakeRemote;

use common::session_with_app;

/// Reads the same remote object through `reads` independent property reads.
/// The application proxy is returned too, so it stays alive for the test.
fn many_handles(remote: &FakeRemote, session: &Session, reads: usize) -> (ObjectProxy, u64, Vec<ObjectProxy>) {
    let app = session.get_application("TargetApp").unwrap();
    let target = remote.add_object("document");
    remote.set_reference(app.id(), "frontDocument", target);

    let proxies = (0..reads)
        .map(|_| app.get::<ObjectProxy>("frontDocument").unwrap())
        .collect();
    (app, target, proxies)
}

#[test]
fn test_shuffled_drop_order_releases_once() {
    for seed in 0..16u64 {
        let (remote, session) = session_with_app("TargetApp");
        let (_app, target, mut proxies) = many_handles(&remote, &session, 8);

        // Clones share a handle and must not add counts.
        proxies.extend(proxies.clone());
        assert_eq!(session.refs().count(target), 8);

        proxies.shuffle(&mut StdRng::seed_from_u64(seed));
        while let Some(proxy) = proxies.pop() {
            drop(proxy);
            let expected = if proxies.is_empty() { vec![target] } else { Vec::new() };
            assert_eq!(remote.released(), expected, "seed {}", seed);
        }
        assert_eq!(session.refs().count(target), 0);
    }
}

#[test]
fn test_drops_across_threads_release_once() {
    let (remote, session) = session_with_app("TargetApp");
    let (_app, target, proxies) = many_handles(&remote, &session, 32);

    let handles: Vec<_> = proxies
        .into_iter()
        .map(|proxy| thread::spawn(move || drop(proxy)))
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(remote.released(), vec![target]);
    assert_eq!(remote.call_count(Command::ReleaseObjectWithId), 1);
    assert_eq!(session.refs().count(target), 0);
}

#[test]
fn test_reacquire_after_release() {
    let (remote, session) = session_with_app("TargetApp");
    let (app, target, proxies) = many_handles(&remote, &session, 1);
    drop(proxies);
    assert_eq!(remote.released(), vec![target]);

    let again: ObjectProxy = app.get("frontDocument").unwrap();
    assert_eq!(session.refs().count(target), 1);
    drop(again);
    assert_eq!(remote.released(), vec![target, target]);
}

#[test]
fn test_sessions_count_independently() {
    let remote = Arc::new(FakeRemote::new());
    let app_id = remote.add_application("TargetApp");
    let one = Session::new(remote.clone());
    let two = Session::new(remote.clone());

    let a = one.get_application("TargetApp").unwrap();
    let b = two.get_application("TargetApp").unwrap();
    assert_eq!(one.refs().count(app_id), 1);
    assert_eq!(two.refs().count(app_id), 1);
    assert_ne!(a, b);

    drop(a);
    assert_eq!(remote.released(), vec![app_id]);
    drop(b);
    assert_eq!(remote.released(), vec![app_id, app_id]);
}

#[test]
fn test_sequence_elements_are_counted() {
    let (remote, session) = session_with_app("TargetApp");
    let app = session.get_application("TargetApp").unwrap();
    let doc = remote.add_object("document");
    let list = remote.add_object_array("document", &[doc, doc, doc]);
    remote.set_reference(app.id(), "documents", list);

    let documents: osarun::ArrayProxy = app.get("documents").unwrap();
    let all: Vec<ObjectProxy> = documents.collect().unwrap();
    assert_eq!(session.refs().count(doc), 3);

    drop(documents);
    assert_eq!(remote.released(), vec![list]);
    drop(all);
    assert_eq!(remote.released(), vec![list, doc]);
}

#[test]
fn test_release_in_flight_is_not_overtaken_by_a_new_reply() {
    common::init_tracing();
    let remote = Arc::new(FakeRemote::new());
    remote.add_application("TargetApp");

    // Releases stall in the channel, announcing themselves first.
    let (started_tx, started_rx) = mpsc::channel();
    let started_tx = Mutex::new(started_tx);
    let inner = remote.clone();
    let channel = FnChannel::new(move |command, argument| {
        if command == Command::ReleaseObjectWithId.name() {
            let _ = started_tx.lock().unwrap().send(());
            thread::sleep(Duration::from_millis(200));
        }
        inner.call(command, argument)
    });
    let session = Session::new(Arc::new(channel));

    let app = session.get_application("TargetApp").unwrap();
    let doc = remote.add_object("document");
    remote.set_reference(app.id(), "frontDocument", doc);

    let first: ObjectProxy = app.get("frontDocument").unwrap();
    let finalizer = thread::spawn(move || drop(first));
    started_rx.recv().unwrap();

    let second: ObjectProxy = app.get("frontDocument").unwrap();
    finalizer.join().unwrap();

    let commands: Vec<String> = remote.calls().into_iter().map(|(command, _)| command).collect();
    let release = commands.iter().position(|c| c == "releaseObjectWithId").unwrap();
    let reread = commands.iter().rposition(|c| c == "getProperty").unwrap();
    assert!(release < reread, "{:?}", commands);
    assert_eq!(remote.released(), vec![doc]);
    assert_eq!(session.refs().count(doc), 1);

    drop(second);
    assert_eq!(remote.released(), vec![doc, doc]);
    assert_eq!(session.refs().count(doc), 0);
}
