//! Tests for the async build service feeding an interactive session.

mod common;

use std::time::Duration;

use common::project;
use depviz::cache::{CacheStore, GraphSource};
use depviz::config::Config;
use depviz::layout::Vec2;
use depviz::service::{BuildEvent, BuildService};
use depviz::session::Session;
use depviz::Error;
use tempfile::TempDir;

fn sample() -> common::Project {
    project(&[
        ("first.py", "import shared\n"),
        ("second.py", "import shared\nimport extra\n"),
        ("shared.py", ""),
        ("extra.py", ""),
    ])
}

async fn no_more_events(events: &mut tokio::sync::mpsc::UnboundedReceiver<BuildEvent>) -> bool {
    tokio::time::timeout(Duration::from_millis(200), events.recv())
        .await
        .is_err()
}

#[tokio::test]
async fn superseded_request_produces_no_event() {
    let project = sample();
    let (service, mut events) = BuildService::new();

    let first = service.request(&project.file("first.py"), &project.root);
    let second = service.request(&project.file("second.py"), &project.root);

    let event = events.recv().await.expect("event for the latest request");
    assert_eq!(event.generation(), second);
    assert!(first < second);
    match event {
        BuildEvent::Ready(ready) => {
            assert_eq!(ready.tree.root().path(), project.file("second.py"));
            assert_eq!(ready.graph.node_count(), 3);
        }
        BuildEvent::Failed { error, .. } => panic!("build failed: {error}"),
    }
    assert!(no_more_events(&mut events).await);
    assert_eq!(service.latest_generation(), second);
}

#[tokio::test]
async fn cancelled_request_reports_cancellation() {
    let project = sample();
    let (service, mut events) = BuildService::new();

    let generation = service.request(&project.file("first.py"), &project.root);
    service.cancel();

    match events.recv().await.expect("event") {
        BuildEvent::Failed { generation: failed, error } => {
            assert_eq!(failed, generation);
            assert!(matches!(error, Error::Cancelled));
        }
        BuildEvent::Ready(_) => panic!("cancelled build should not succeed"),
    }
}

#[tokio::test]
async fn cached_service_serves_second_request_from_cache() {
    let project = sample();
    let cache = TempDir::new().expect("cache dir");
    let (service, mut events) = BuildService::new();
    let service = service.with_cache(CacheStore::new(cache.path()));
    let entry = project.file("second.py");

    let mut sources = Vec::new();
    for _ in 0..2 {
        service.request(&entry, &project.root);
        match events.recv().await.expect("event") {
            BuildEvent::Ready(ready) => sources.push(ready.source),
            BuildEvent::Failed { error, .. } => panic!("build failed: {error}"),
        }
    }

    assert_eq!(sources, vec![GraphSource::Fresh, GraphSource::Cache]);
}

#[tokio::test]
async fn session_installs_builds_and_streams_frames() {
    let project = sample();
    let (service, mut events) = BuildService::new();
    let session = Session::new(Config::default());
    let mut frames = session.subscribe();

    service.request(&project.file("second.py"), &project.root);
    let BuildEvent::Ready(ready) = events.recv().await.expect("event") else {
        panic!("build failed");
    };
    assert!(session.install(&ready).await);

    let tick = session.tick().await.expect("frame");
    let received = frames.recv().await.expect("broadcast frame");
    assert_eq!(received.tick, tick.tick);
    assert_eq!(received.positions.len(), 3);

    // Drag the root, then reset back onto the shell layout
    assert_eq!(session.press(Vec2::ZERO).await, Some(project.file("second.py")));
    assert!(session.drag_to(Vec2::new(90.0, 90.0)).await);
    session.tick().await;
    let reset = session.reset().await.expect("reset acknowledgment");
    assert_eq!(reset.get(&project.file("second.py")), Some(Vec2::ZERO));

    // An older generation never replaces the installed graph
    let mut stale = ready.clone();
    stale.generation = 0;
    assert!(!session.install(&stale).await);
}

#[tokio::test]
async fn paused_session_does_not_tick() {
    let project = sample();
    let (service, mut events) = BuildService::new();
    let session = Session::new(Config::default());

    service.request(&project.file("first.py"), &project.root);
    let BuildEvent::Ready(ready) = events.recv().await.expect("event") else {
        panic!("build failed");
    };
    session.install(&ready).await;

    session.set_paused(true).await;
    assert!(session.tick().await.is_none());
    session.set_paused(false).await;
    assert!(session.tick().await.is_some());
}
