//! Supervisor Integration Tests
//!
//! Tests that relay runs are isolated from each other, from panics, and
//! from the liveness endpoint.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Semaphore;

use common::{DownloadMode, RecordingPlatform};
use filerelay::core::health;
use filerelay::core::orchestrator::{MSG_GENERIC_ERROR, MSG_PROCESSING};
use filerelay::{EventSource, InboundEvent, Origin, RelayError, RelayOutcome, Supervisor};
use tempfile::TempDir;

/// Hands out one batch of events, then waits forever
struct ScriptedSource {
    batch: std::sync::Mutex<Option<Vec<InboundEvent>>>,
}

impl ScriptedSource {
    fn new(events: Vec<InboundEvent>) -> Self {
        Self {
            batch: std::sync::Mutex::new(Some(events)),
        }
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn poll(&self) -> Result<Vec<InboundEvent>> {
        let batch = self.batch.lock().unwrap().take();
        match batch {
            Some(events) => Ok(events),
            None => std::future::pending().await,
        }
    }
}

/// Fails every poll
struct BrokenSource {
    polled: AtomicBool,
}

#[async_trait]
impl EventSource for BrokenSource {
    fn name(&self) -> &str {
        "broken"
    }

    async fn poll(&self) -> Result<Vec<InboundEvent>> {
        self.polled.store(true, Ordering::SeqCst);
        anyhow::bail!("network unreachable")
    }
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

#[tokio::test]
async fn test_panicking_run_replies_and_cleans_up() {
    let temp = TempDir::new().unwrap();
    let platform = Arc::new(
        RecordingPlatform::new()
            .with_file("doc1", b"contents")
            .with_download_mode(DownloadMode::Panic),
    );
    let relay = Arc::new(common::relay(platform.clone(), "http://127.0.0.1:9", temp.path()));
    let supervisor = Supervisor::new(Arc::new(ScriptedSource::new(vec![])), relay);

    let handle = supervisor
        .dispatch(InboundEvent::document(Origin::new(1, 1), "doc1", Some("boom.txt")))
        .await;
    let outcome = handle.await.unwrap();

    assert!(matches!(
        outcome,
        RelayOutcome::Failed(RelayError::Unexpected(_))
    ));
    assert_eq!(
        platform.replies(),
        vec![MSG_PROCESSING.to_string(), MSG_GENERIC_ERROR.to_string()]
    );
    assert!(!temp.path().join("boom.txt").exists());
}

#[tokio::test]
async fn test_liveness_answers_while_relay_is_stuck() {
    let temp = TempDir::new().unwrap();
    let gate = Arc::new(Semaphore::new(0));
    let platform = Arc::new(
        RecordingPlatform::new()
            .with_file("doc1", b"contents")
            .gated(gate.clone()),
    );
    let relay = Arc::new(common::relay(platform.clone(), "http://127.0.0.1:9", temp.path()));
    let source = Arc::new(ScriptedSource::new(vec![InboundEvent::document(
        Origin::new(1, 1),
        "doc1",
        Some("stuck.txt"),
    )]));

    let listener = health::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(Supervisor::new(source, relay).run(listener));

    // The relay run is parked inside retrieval
    wait_for(|| platform.replies().contains(&MSG_PROCESSING.to_string())).await;

    let response = reqwest::get(format!("http://{}/", addr)).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");

    assert_eq!(platform.replies(), vec![MSG_PROCESSING.to_string()]);
}

#[tokio::test]
async fn test_concurrency_limit_holds_back_runs() {
    let temp = TempDir::new().unwrap();
    let gate = Arc::new(Semaphore::new(0));
    let platform = Arc::new(
        RecordingPlatform::new()
            .with_file("doc1", b"one")
            .with_file("doc2", b"two")
            .gated(gate.clone()),
    );
    let relay = Arc::new(common::relay(
        platform.clone(),
        &common::closed_port_url().await,
        temp.path(),
    ));
    let supervisor = Supervisor::new(Arc::new(ScriptedSource::new(vec![])), relay)
        .with_max_concurrent_runs(Some(1));

    let first = supervisor
        .dispatch(InboundEvent::document(Origin::new(1, 1), "doc1", Some("one.txt")))
        .await;

    // The only slot is taken
    let second = tokio::time::timeout(
        Duration::from_millis(200),
        supervisor.dispatch(InboundEvent::document(Origin::new(1, 2), "doc2", Some("two.txt"))),
    )
    .await;
    assert!(second.is_err());

    gate.add_permits(2);
    first.await.unwrap();

    let second = supervisor
        .dispatch(InboundEvent::document(Origin::new(1, 2), "doc2", Some("two.txt")))
        .await;
    second.await.unwrap();

    let acks = platform
        .replies()
        .into_iter()
        .filter(|r| r == MSG_PROCESSING)
        .count();
    assert_eq!(acks, 2);
}

#[tokio::test]
async fn test_poll_errors_do_not_stop_the_loop() {
    let source = Arc::new(BrokenSource {
        polled: AtomicBool::new(false),
    });
    let temp = TempDir::new().unwrap();
    let relay = Arc::new(common::relay(
        Arc::new(RecordingPlatform::new()),
        "http://127.0.0.1:9",
        temp.path(),
    ));
    let supervisor = Supervisor::new(source.clone(), relay)
        .with_poll_retry_delay(Duration::from_millis(10));

    // listen() never returns; it must still be running after repeated failures
    let result = tokio::time::timeout(Duration::from_millis(200), supervisor.listen()).await;
    assert!(result.is_err());
    assert!(source.polled.load(Ordering::SeqCst));
}

#[test]
fn test_shutdown_removes_in_flight_staged_file() {
    let temp = TempDir::new().unwrap();
    let staged = temp.path().join("partial.bin");
    let platform = Arc::new(
        RecordingPlatform::new()
            .with_file("doc1", b"0123456789")
            .with_download_mode(DownloadMode::Stall),
    );
    let runtime = tokio::runtime::Runtime::new().unwrap();

    runtime.block_on(async {
        let relay = Arc::new(common::relay(platform.clone(), "http://127.0.0.1:9", temp.path()));
        let source = Arc::new(ScriptedSource::new(vec![InboundEvent::document(
            Origin::new(1, 1),
            "doc1",
            Some("partial.bin"),
        )]));
        let listener = health::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();

        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let run = tokio::spawn(Supervisor::new(source, relay).run_until(listener, async move {
            let _ = stopped.await;
        }));

        wait_for(|| staged.exists()).await;
        stop.send(()).unwrap();
        run.await.unwrap().unwrap();

        // The stalled run outlives the supervisor until the runtime goes away
        assert!(staged.exists());
    });

    drop(runtime);
    assert!(!staged.exists());
}
