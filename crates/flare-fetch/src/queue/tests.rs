use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flare_core::cache::AssetCache;
use flare_core::notify::{AssetChange, ChangeNotifier};
use futures::StreamExt;
use futures::future::join_all;
use tempfile::TempDir;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::AdmissionOrder;

const KEY: &str = "ab/cd/abcd1234-5678-4abc-9def-0123456789ab.png";

struct Fixture {
    server: MockServer,
    dir: TempDir,
    notifier: ChangeNotifier,
}

impl Fixture {
    async fn new() -> Self {
        Self {
            server: MockServer::start().await,
            dir: tempfile::tempdir().unwrap(),
            notifier: ChangeNotifier::default(),
        }
    }

    fn queue(&self, max_concurrent: usize, admission: AdmissionOrder) -> FetchQueue {
        let config = FetchConfig::builder()
            .with_base_url(format!("{}/images", self.server.uri()))
            .with_max_concurrent(max_concurrent)
            .with_admission(admission)
            .with_timeout_secs(10u64)
            .build()
            .unwrap();

        FetchQueue::spawn(config, AssetCache::new(self.dir.path()), self.notifier.clone()).unwrap()
    }

    fn cached(&self, key: &str) -> std::path::PathBuf {
        self.dir.path().join(key)
    }
}

/// Records the targets of error events emitted by this crate.
#[derive(Clone, Default)]
struct ErrorEvents(Arc<Mutex<Vec<String>>>);

impl ErrorEvents {
    fn targets(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl<S: Subscriber> Layer<S> for ErrorEvents {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() == Level::ERROR && metadata.target().starts_with("flare_fetch") {
            self.0.lock().unwrap().push(metadata.target().to_owned());
        }
    }
}

async fn collect(outcome: FetchOutcome) -> Vec<u8> {
    let mut stream = match outcome {
        FetchOutcome::Streaming(stream) => stream,
        other => panic!("expected a streaming outcome, got {other:?}"),
    };

    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk.unwrap());
    }
    body
}

async fn wait_for_file(path: &Path) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !path.exists() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("file was never written");
}

#[tokio::test]
async fn streams_body_and_caches_it() {
    let fixture = Fixture::new().await;
    Mock::given(method("GET"))
        .and(path(format!("/images/{KEY}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"image bytes".to_vec()))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let mut events = fixture.notifier.subscribe();
    let queue = fixture.queue(6, AdmissionOrder::Lifo);

    let body = collect(queue.enqueue(KEY).resolve().await).await;
    assert_eq!(body, b"image bytes");

    // The stream ends only after the cache file is committed.
    assert_eq!(std::fs::read(fixture.cached(KEY)).unwrap(), b"image bytes");

    let event = events.recv().await.unwrap();
    assert_eq!(event.key, KEY);
    assert_eq!(event.change, AssetChange::Updated);

    // Second request is answered from disk without another upstream call.
    match queue.enqueue(KEY).resolve().await {
        FetchOutcome::Cached(path) => assert_eq!(path, fixture.cached(KEY)),
        other => panic!("expected a cached outcome, got {other:?}"),
    }
    fixture.server.verify().await;
}

#[tokio::test]
async fn upstream_miss_writes_nothing() {
    let fixture = Fixture::new().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&fixture.server)
        .await;

    let queue = fixture.queue(6, AdmissionOrder::Lifo);

    match queue.enqueue(KEY).resolve().await {
        FetchOutcome::NotFound(NotFoundReason::UpstreamMiss(404)) => {}
        other => panic!("expected an upstream miss, got {other:?}"),
    }
    assert!(!fixture.cached(KEY).exists());
    assert!(!fixture.dir.path().join("ab/cd").exists());
}

#[tokio::test]
async fn upstream_miss_logs_no_error() {
    let errors = ErrorEvents::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(errors.clone()));

    let fixture = Fixture::new().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&fixture.server)
        .await;

    let queue = fixture.queue(6, AdmissionOrder::Lifo);
    assert!(matches!(
        queue.enqueue(KEY).resolve().await,
        FetchOutcome::NotFound(NotFoundReason::UpstreamMiss(404))
    ));

    assert_eq!(errors.targets(), Vec::<String>::new());
}

#[tokio::test]
async fn unknown_host_logs_no_error() {
    let errors = ErrorEvents::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(errors.clone()));

    let dir = tempfile::tempdir().unwrap();
    let config = FetchConfig::builder()
        .with_base_url("http://flare-upstream.invalid/images")
        .build()
        .unwrap();
    let queue = FetchQueue::spawn(config, AssetCache::new(dir.path()), ChangeNotifier::default())
        .unwrap();

    assert!(matches!(
        queue.enqueue(KEY).resolve().await,
        FetchOutcome::NotFound(NotFoundReason::Failed)
    ));

    assert_eq!(errors.targets(), Vec::<String>::new());
    assert!(!dir.path().join(KEY).exists());
}

#[tokio::test]
async fn transport_failure_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    // Nothing listens on port 9 of the loopback interface.
    let config = FetchConfig::builder()
        .with_base_url("http://127.0.0.1:9/images")
        .build()
        .unwrap();
    let queue = FetchQueue::spawn(config, AssetCache::new(dir.path()), ChangeNotifier::default())
        .unwrap();

    match queue.enqueue(KEY).resolve().await {
        FetchOutcome::NotFound(NotFoundReason::Failed) => {}
        other => panic!("expected a failure, got {other:?}"),
    }
    assert!(!dir.path().join(KEY).exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn never_exceeds_max_concurrent() {
    let fixture = Fixture::new().await;
    Mock::given(method("GET"))
        .and(path_regex("^/images/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"x".to_vec())
                .set_delay(Duration::from_millis(100)),
        )
        .expect(12)
        .mount(&fixture.server)
        .await;

    let queue = fixture.queue(3, AdmissionOrder::Fifo);
    let tickets: Vec<_> = (0..12)
        .map(|index| queue.enqueue(format!("ab/cd/file-{index}.png")))
        .collect();

    let bodies = join_all(tickets.into_iter().map(|ticket| async move {
        collect(ticket.resolve().await).await
    }))
    .await;

    assert!(bodies.iter().all(|body| body == b"x"));
    let stats = queue.stats();
    assert_eq!(stats.peak_in_flight, 3);
    fixture.server.verify().await;
}

#[tokio::test]
async fn newer_request_supersedes_queued_one() {
    let fixture = Fixture::new().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"x".to_vec())
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&fixture.server)
        .await;

    let queue = fixture.queue(1, AdmissionOrder::Lifo);
    let blocker = queue.enqueue("ab/cd/blocker.png");
    let older = queue.enqueue(KEY);
    let newer = queue.enqueue(KEY);

    match older.resolve().await {
        FetchOutcome::NotFound(NotFoundReason::Superseded) => {}
        other => panic!("expected supersession, got {other:?}"),
    }

    assert_eq!(collect(newer.resolve().await).await, b"x");
    assert_eq!(collect(blocker.resolve().await).await, b"x");
}

#[tokio::test]
async fn cancelled_while_queued_makes_no_request() {
    let fixture = Fixture::new().await;
    Mock::given(method("GET"))
        .and(path("/images/ab/cd/blocker.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"x".to_vec())
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&fixture.server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/images/{KEY}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"never".to_vec()))
        .expect(0)
        .mount(&fixture.server)
        .await;

    let queue = fixture.queue(1, AdmissionOrder::Lifo);
    let blocker = queue.enqueue("ab/cd/blocker.png");
    drop(queue.enqueue(KEY));

    assert_eq!(collect(blocker.resolve().await).await, b"x");
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(queue.stats().queued, 0);
    assert!(!fixture.cached(KEY).exists());
    fixture.server.verify().await;
}

#[tokio::test]
async fn cancelled_in_flight_still_caches() {
    let fixture = Fixture::new().await;
    Mock::given(method("GET"))
        .and(path(format!("/images/{KEY}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"late bytes".to_vec())
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&fixture.server)
        .await;

    let queue = fixture.queue(6, AdmissionOrder::Lifo);
    let ticket = queue.enqueue(KEY);

    // Wait for admission, then disconnect.
    tokio::time::timeout(Duration::from_secs(5), async {
        while queue.stats().in_flight == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    drop(ticket);

    wait_for_file(&fixture.cached(KEY)).await;
    assert_eq!(std::fs::read(fixture.cached(KEY)).unwrap(), b"late bytes");
    fixture.server.verify().await;
}

#[tokio::test]
async fn in_flight_key_is_not_fetched_twice() {
    let fixture = Fixture::new().await;
    Mock::given(method("GET"))
        .and(path(format!("/images/{KEY}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"once".to_vec())
                .set_delay(Duration::from_millis(150)),
        )
        .expect(1)
        .mount(&fixture.server)
        .await;

    let queue = fixture.queue(6, AdmissionOrder::Lifo);
    let first = queue.enqueue(KEY);
    tokio::time::timeout(Duration::from_secs(5), async {
        while queue.stats().in_flight == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    let second = queue.enqueue(KEY);

    assert_eq!(collect(first.resolve().await).await, b"once");
    match second.resolve().await {
        FetchOutcome::Cached(path) => assert_eq!(path, fixture.cached(KEY)),
        other => panic!("expected a cached outcome, got {other:?}"),
    }
    fixture.server.verify().await;
}

#[tokio::test]
async fn traversal_key_is_rejected_without_request() {
    let fixture = Fixture::new().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&fixture.server)
        .await;

    let queue = fixture.queue(6, AdmissionOrder::Lifo);
    match queue.enqueue("../escape.png").resolve().await {
        FetchOutcome::NotFound(NotFoundReason::Failed) => {}
        other => panic!("expected a failure, got {other:?}"),
    }
    fixture.server.verify().await;
}

#[tokio::test]
async fn unread_stream_does_not_hold_back_cache_write() {
    const SIZE: usize = 4 * 1024 * 1024;

    let fixture = Fixture::new().await;
    Mock::given(method("GET"))
        .and(path(format!("/images/{KEY}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; SIZE]))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let config = FetchConfig::builder()
        .with_base_url(format!("{}/images", fixture.server.uri()))
        .with_timeout_secs(2u64)
        .with_chunk_buffer(1usize)
        .build()
        .unwrap();
    let queue =
        FetchQueue::spawn(config, AssetCache::new(fixture.dir.path()), fixture.notifier.clone())
            .unwrap();

    // The stream is held but not read until the file is on disk.
    let outcome = queue.enqueue(KEY).resolve().await;
    wait_for_file(&fixture.cached(KEY)).await;
    assert_eq!(std::fs::metadata(fixture.cached(KEY)).unwrap().len(), SIZE as u64);

    assert_eq!(collect(outcome).await.len(), SIZE);
    fixture.server.verify().await;
}

#[tokio::test]
async fn cancelled_requests_are_not_counted_as_queued() {
    let fixture = Fixture::new().await;
    Mock::given(method("GET"))
        .and(path("/images/ab/cd/blocker.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"x".to_vec())
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&fixture.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/images/ab/cd/newest.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"y".to_vec())
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&fixture.server)
        .await;

    let queue = fixture.queue(1, AdmissionOrder::Lifo);
    let blocker = queue.enqueue("ab/cd/blocker.png");
    let abandoned = queue.enqueue(KEY);
    let newest = queue.enqueue("ab/cd/newest.png");
    // Let the driver queue both before the older one is abandoned.
    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(abandoned);

    assert_eq!(collect(blocker.resolve().await).await, b"x");
    // The newest request is admitted ahead of the abandoned one.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let stats = queue.stats();
    assert_eq!(stats.queued, 0);
    assert_eq!(stats.in_flight, 1);
    assert_eq!(collect(newest.resolve().await).await, b"y");
}
