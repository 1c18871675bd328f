use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use narr_archive::{ArchiveError, Catalog, FetchConfig, HttpSource, RemoteSource, RetryPolicy};
use test_utils::{listing_html, TestArchive, SAMPLE_REMOTE_MTIME, SAMPLE_REMOTE_NAME};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BACKOFF: Duration = Duration::from_millis(50);

fn source_for(server: &MockServer, max_attempts: u32) -> HttpSource {
    let config = FetchConfig {
        retry: RetryPolicy {
            max_attempts,
            backoff_base: BACKOFF,
        },
        ..FetchConfig::default()
    };
    HttpSource::new(config, &format!("{}/narr/{{name}}", server.uri())).unwrap()
}

fn file_path() -> String {
    format!("/narr/{}", SAMPLE_REMOTE_NAME)
}

#[tokio::test]
async fn retries_server_errors_with_increasing_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(file_path()))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(file_path()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
        .with_priority(2)
        .mount(&server)
        .await;

    let archive = TestArchive::new().unwrap();
    let destination = archive.work().join(SAMPLE_REMOTE_NAME);
    let source = source_for(&server, 5);

    let started = Instant::now();
    let bytes = source.fetch(SAMPLE_REMOTE_NAME, &destination).await.unwrap();

    assert_eq!(bytes, 4096);
    assert_eq!(std::fs::read(&destination).unwrap().len(), 4096);
    // Waited 1x then 2x the base between the three attempts.
    assert!(started.elapsed() >= BACKOFF * 3);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    assert!(!archive.work().join(format!("{}.partial", SAMPLE_REMOTE_NAME)).exists());
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(file_path()))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let archive = TestArchive::new().unwrap();
    let err = source_for(&server, 5)
        .fetch(SAMPLE_REMOTE_NAME, &archive.work().join(SAMPLE_REMOTE_NAME))
        .await
        .unwrap_err();

    assert!(matches!(err, ArchiveError::NotFound(_)));
    assert!(err.is_unavailable());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn forbidden_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(file_path()))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let archive = TestArchive::new().unwrap();
    let err = source_for(&server, 5)
        .fetch(SAMPLE_REMOTE_NAME, &archive.work().join(SAMPLE_REMOTE_NAME))
        .await
        .unwrap_err();

    assert!(matches!(err, ArchiveError::Forbidden(_)));
}

#[tokio::test]
async fn exhausted_retries_surface_transfer_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(file_path()))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let archive = TestArchive::new().unwrap();
    let destination = archive.work().join(SAMPLE_REMOTE_NAME);
    let err = source_for(&server, 3)
        .fetch(SAMPLE_REMOTE_NAME, &destination)
        .await
        .unwrap_err();

    match err {
        ArchiveError::TransferFailed {
            url,
            attempts,
            reason,
        } => {
            assert!(url.ends_with(&file_path()));
            assert_eq!(attempts, 3);
            assert!(reason.contains("500"));
        }
        other => panic!("expected TransferFailed, got {}", other),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    assert!(!destination.exists());
}

/// Serves every connection a 200 declaring `declared` bytes but sending
/// only `sent`, then hangs up. Returns the base URL and a connection count.
async fn short_body_server(declared: usize, sent: usize) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));

    let counter = connections.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    declared
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&vec![7u8; sent]).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{}", addr), connections)
}

#[tokio::test]
async fn truncated_body_is_retried_then_fails() {
    let (base, connections) = short_body_server(1024, 100).await;
    let config = FetchConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            backoff_base: Duration::from_millis(10),
        },
        ..FetchConfig::default()
    };
    let source = HttpSource::new(config, &format!("{}/narr/{{name}}", base)).unwrap();

    let archive = TestArchive::new().unwrap();
    let destination = archive.work().join(SAMPLE_REMOTE_NAME);
    let err = source
        .fetch(SAMPLE_REMOTE_NAME, &destination)
        .await
        .unwrap_err();

    assert!(matches!(err, ArchiveError::TransferFailed { attempts: 3, .. }));
    assert!(!err.is_unavailable());
    assert_eq!(connections.load(Ordering::SeqCst), 3);
    assert!(!destination.exists());
    assert!(!archive.work().join(format!("{}.partial", SAMPLE_REMOTE_NAME)).exists());
}

#[tokio::test]
async fn listing_is_read_through_catalog() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/narr/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(&[(
            SAMPLE_REMOTE_NAME,
            SAMPLE_REMOTE_MTIME,
            "54M",
        )])))
        .expect(1)
        .mount(&server)
        .await;

    let catalog = Catalog::new(Arc::new(source_for(&server, 1)));
    let modified = catalog.last_modified(SAMPLE_REMOTE_NAME).await.unwrap();
    assert_eq!(
        modified.map(|t| t.format("%Y-%m-%d %H:%M").to_string()),
        Some("2015-01-10 08:00".to_string())
    );
    assert!(catalog.last_modified("rcdas.2015011503.awip32.merged").await.unwrap().is_none());
}

#[tokio::test]
async fn unreachable_listing_is_remote_list_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/narr/"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let catalog = Catalog::new(Arc::new(source_for(&server, 1)));
    assert!(matches!(
        catalog.entries().await,
        Err(ArchiveError::RemoteList(_))
    ));
}
