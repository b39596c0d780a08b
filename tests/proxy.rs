//! End-to-end tests through the HTTP ingress.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rotary_proxy::Shutdown;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

mod common;

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_round_robin_through_proxy() {
    let b1 = common::start_mock_backend("b1").await;
    let b2 = common::start_mock_backend("b2").await;
    let b3 = common::start_mock_backend("b3").await;

    let shutdown = Shutdown::new();
    let proxy = common::start_proxy(common::test_config(&[b1, b2, b3]), &shutdown).await;
    let client = client();

    let mut bodies = Vec::new();
    for _ in 0..6 {
        let res = client.get(format!("http://{}/", proxy)).send().await.unwrap();
        assert_eq!(res.status(), 200);
        bodies.push(res.text().await.unwrap());
    }
    assert_eq!(bodies, vec!["b1", "b2", "b3", "b1", "b2", "b3"]);

    shutdown.trigger();
}

#[tokio::test]
async fn test_upstream_error_status_becomes_200() {
    let backend = common::start_programmable_backend(|_| async { (503, "down".into()) }).await;

    let shutdown = Shutdown::new();
    let proxy = common::start_proxy(common::test_config(&[backend]), &shutdown).await;

    let res = client().get(format!("http://{}/anything", proxy)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "down");

    shutdown.trigger();
}

#[tokio::test]
async fn test_forwards_method_path_query_and_body() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let backend = common::start_programmable_backend(move |req| {
        let s = s.clone();
        async move {
            s.lock().await.push(req);
            (200, "stored".into())
        }
    })
    .await;

    let shutdown = Shutdown::new();
    let proxy = common::start_proxy(common::test_config(&[backend]), &shutdown).await;

    let res = client()
        .post(format!("http://{}/v1/items?id=42&tag=a", proxy))
        .header("x-request-id", "req-123")
        .body("hello upstream")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(
        res.headers().get("x-request-id").unwrap().to_str().unwrap(),
        "req-123"
    );
    assert_eq!(res.text().await.unwrap(), "stored");

    let seen = seen.lock().await;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].target, "/v1/items?id=42&tag=a");
    assert_eq!(seen[0].body, b"hello upstream");
    assert_eq!(seen[0].header("x-request-id"), Some("req-123"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_generates_request_id() {
    let backend = common::start_mock_backend("ok").await;

    let shutdown = Shutdown::new();
    let proxy = common::start_proxy(common::test_config(&[backend]), &shutdown).await;

    let res = client().get(format!("http://{}/", proxy)).send().await.unwrap();
    let id = res.headers().get("x-request-id").unwrap().to_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok(), "not a uuid: {}", id);

    shutdown.trigger();
}

#[tokio::test]
async fn test_all_unhealthy_returns_503() {
    let dead = common::closed_port().await;

    let shutdown = Shutdown::new();
    let proxy = common::start_proxy(common::test_config(&[dead]), &shutdown).await;
    let client = client();

    // First request hits the dead backend and marks it unhealthy.
    let res = client.get(format!("http://{}/", proxy)).send().await.unwrap();
    assert_eq!(res.status(), 502);

    let res = client.get(format!("http://{}/", proxy)).send().await.unwrap();
    assert_eq!(res.status(), 503);
    assert_eq!(res.text().await.unwrap(), "all backends unhealthy");

    shutdown.trigger();
}

#[tokio::test]
async fn test_failed_backend_is_skipped_afterwards() {
    let dead = common::closed_port().await;
    let alive = common::start_mock_backend("alive").await;

    let shutdown = Shutdown::new();
    let proxy = common::start_proxy(common::test_config(&[dead, alive]), &shutdown).await;
    let client = client();

    let res = client.get(format!("http://{}/", proxy)).send().await.unwrap();
    assert_eq!(res.status(), 502);

    for _ in 0..4 {
        let res = client.get(format!("http://{}/", proxy)).send().await.unwrap();
        assert_eq!(res.status(), 200);
        assert_eq!(res.text().await.unwrap(), "alive");
    }

    shutdown.trigger();
}

#[tokio::test]
async fn test_retry_once_on_next_backend() {
    let dead = common::closed_port().await;
    let alive = common::start_mock_backend("alive").await;

    let mut config = common::test_config(&[dead, alive]);
    config.retry.enabled = true;

    let shutdown = Shutdown::new();
    let proxy = common::start_proxy(config, &shutdown).await;

    let res = client().get(format!("http://{}/", proxy)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "alive");

    shutdown.trigger();
}

#[tokio::test]
async fn test_hung_backend_returns_504() {
    let hung = common::start_hung_backend().await;

    let shutdown = Shutdown::new();
    let proxy = common::start_proxy(common::test_config(&[hung]), &shutdown).await;

    let res = client().get(format!("http://{}/", proxy)).send().await.unwrap();
    assert_eq!(res.status(), 504);

    shutdown.trigger();
}

#[tokio::test]
async fn test_health_check_eviction_and_recovery() {
    let b1 = common::start_mock_backend("b1").await;

    let b2_up = Arc::new(std::sync::atomic::AtomicBool::new(true));
    let b2_calls = Arc::new(AtomicU32::new(0));
    let (up, calls) = (b2_up.clone(), b2_calls.clone());
    let b2 = common::start_programmable_backend(move |req| {
        let up = up.clone();
        let calls = calls.clone();
        async move {
            if req.target != "/health" {
                calls.fetch_add(1, Ordering::SeqCst);
            }
            if up.load(Ordering::SeqCst) {
                (200, "b2".into())
            } else {
                (500, "dead".into())
            }
        }
    })
    .await;

    let mut config = common::test_config(&[b1, b2]);
    config.health_check.interval_secs = 1;

    let shutdown = Shutdown::new();
    let proxy = common::start_proxy(config, &shutdown).await;
    let client = client();

    b2_up.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let before = b2_calls.load(Ordering::SeqCst);
    for _ in 0..6 {
        let res = client.get(format!("http://{}/", proxy)).send().await.unwrap();
        assert_eq!(res.text().await.unwrap(), "b1");
    }
    assert_eq!(b2_calls.load(Ordering::SeqCst), before, "b2 should be evicted");

    b2_up.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(1200)).await;

    let mut b2_hits = 0;
    for _ in 0..6 {
        let res = client.get(format!("http://{}/", proxy)).send().await.unwrap();
        if res.text().await.unwrap() == "b2" {
            b2_hits += 1;
        }
    }
    assert_eq!(b2_hits, 3, "b2 should be back in rotation");

    shutdown.trigger();
}

#[tokio::test]
async fn test_client_disconnect_cancels_upstream_call() {
    let (backend, mut closed) = common::start_silent_backend().await;

    let mut config = common::test_config(&[backend]);
    config.timeouts.proxy_secs = 30;
    config.timeouts.request_secs = 60;
    let shutdown = Shutdown::new();
    let proxy = common::start_proxy(config, &shutdown).await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream
        .write_all(b"GET /slow HTTP/1.1\r\nHost: proxy\r\n\r\n")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    drop(stream);

    let eof = tokio::time::timeout(Duration::from_secs(2), closed.recv()).await;
    assert!(
        matches!(eof, Ok(Some(()))),
        "upstream connection outlived the client"
    );

    shutdown.trigger();
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let hits = Arc::new(AtomicU32::new(0));
    let h = hits.clone();
    let backend = common::start_programmable_backend(move |_| {
        h.fetch_add(1, Ordering::SeqCst);
        async { (200, "ok".into()) }
    })
    .await;

    let mut config = common::test_config(&[backend]);
    config.listener.max_body_bytes = 16;
    let shutdown = Shutdown::new();
    let proxy = common::start_proxy(config, &shutdown).await;
    let client = client();

    let res = client
        .post(format!("http://{}/upload", proxy))
        .body(vec![b'x'; 1024])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 413);
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    let res = client
        .post(format!("http://{}/upload", proxy))
        .body("small")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "ok");

    shutdown.trigger();
}
