//! Delivery chain against a live HTTP collector

use std::sync::Arc;
use std::time::Duration;

use rumkit::transport::{FlushOutcome, MemoryStore, SharedStore, StrategyKind, Transport, TransportConfig};
use rumkit::Event;
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn config(server: &MockServer, strategies: Vec<StrategyKind>) -> TransportConfig {
    let mut config = TransportConfig::with_endpoint(format!("{}/rum", server.uri()));
    config.strategies = strategies;
    config.request_timeout = Duration::from_secs(2);
    config.pixel_wait = Duration::from_secs(2);
    config
}

fn transport(config: TransportConfig, store: &SharedStore) -> Arc<Transport> {
    Transport::builder("shop-web", "2.4.1", config)
        .store(Arc::clone(store))
        .build()
        .expect("transport builds")
}

fn memory_store() -> SharedStore {
    Arc::new(MemoryStore::new())
}

async fn requests(server: &MockServer) -> Vec<Request> {
    server.received_requests().await.unwrap_or_default()
}

fn envelope(body: &[u8]) -> Value {
    serde_json::from_slice(body).expect("envelope is JSON")
}

#[tokio::test]
async fn test_falls_through_to_pixel_when_beacon_and_post_fail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rum"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rum"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut config = config(&server, StrategyKind::default_chain());
    config.beacon_max_bytes = 16;
    let store = memory_store();
    let transport = transport(config, &store);
    transport.track(Event::new("click").with("target", "#buy"));

    let outcome = transport.flush(false).await;

    assert_eq!(
        outcome,
        FlushOutcome::Delivered {
            events: 1,
            strategy: Some("pixel")
        }
    );
    let received = requests(&server).await;
    let methods: Vec<String> = received.iter().map(|r| r.method.to_string()).collect();
    assert_eq!(methods, vec!["POST", "GET"]);

    let (key, payload) = received[1].url.query_pairs().next().expect("pixel carries payload");
    assert_eq!(key, "d");
    let payload: Value = serde_json::from_str(&payload).unwrap();
    assert_eq!(payload["appId"], "shop-web");
    assert_eq!(payload["events"][0]["type"], "click");

    assert!(transport.backlog().peek().unwrap().is_empty());
    assert_eq!(transport.stats().last_strategy, Some("pixel"));
}

#[tokio::test]
async fn test_post_success_short_circuits() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rum"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let store = memory_store();
    let transport = transport(config(&server, vec![StrategyKind::Post, StrategyKind::Pixel]), &store);
    transport.track(Event::new("a"));
    transport.track(Event::new("b"));

    let outcome = transport.flush(true).await;

    assert_eq!(outcome, FlushOutcome::Delivered { events: 2, strategy: Some("post") });
    let received = requests(&server).await;
    assert_eq!(received.len(), 1);

    let body = envelope(&received[0].body);
    assert_eq!(body["appId"], "shop-web");
    assert_eq!(body["release"], "2.4.1");
    assert!(body["sentAt"].as_i64().unwrap() > 0);
    let types: Vec<&str> = body["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["type"].as_str().unwrap())
        .collect();
    assert_eq!(types, vec!["a", "b"]);
    assert_eq!(received[0].headers.get("content-type").unwrap(), "application/json");
}

#[tokio::test]
async fn test_beacon_is_queued_and_delivered_in_background() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rum"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let store = memory_store();
    let transport = transport(config(&server, StrategyKind::default_chain()), &store);
    transport.track(Event::new("pv").with("url", "https://shop.example.com/"));

    let outcome = transport.flush(true).await;
    assert_eq!(outcome, FlushOutcome::Delivered { events: 1, strategy: Some("beacon") });

    assert!(transport.settle(Duration::from_secs(5)).await);
    let received = requests(&server).await;
    assert_eq!(received.len(), 1);
    assert_eq!(envelope(&received[0].body)["events"][0]["type"], "pv");
}

#[tokio::test]
async fn test_rejected_batch_persists_and_replays() {
    let server = MockServer::start().await;
    let store = memory_store();

    {
        let _rejecting = Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount_as_scoped(&server)
            .await;

        let transport = transport(config(&server, vec![StrategyKind::Post]), &store);
        transport.track(Event::new("first"));
        transport.track(Event::new("second"));

        let outcome = transport.flush(false).await;

        assert_eq!(outcome, FlushOutcome::Persisted { events: 2 });
        assert_eq!(transport.backlog().peek().unwrap().len(), 2);
    }

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let revived = transport(config(&server, vec![StrategyKind::Post]), &store);
    assert_eq!(revived.queue_len(), 2);
    assert!(revived.backlog().peek().unwrap().is_empty());
    revived.track(Event::new("third"));

    let outcome = revived.flush(false).await;

    assert_eq!(outcome, FlushOutcome::Delivered { events: 3, strategy: Some("post") });
    let received = requests(&server).await;
    let last = envelope(&received.last().unwrap().body);
    let types: Vec<&str> = last["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["type"].as_str().unwrap())
        .collect();
    assert_eq!(types, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_unreachable_collector_persists() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = format!("http://{}/rum", listener.local_addr().unwrap());
    drop(listener);

    let mut config = TransportConfig::with_endpoint(endpoint);
    config.strategies = vec![StrategyKind::Post];
    config.request_timeout = Duration::from_millis(500);
    let store = memory_store();
    let transport = transport(config, &store);
    transport.track(Event::new("offline"));

    let outcome = transport.flush(false).await;

    assert_eq!(outcome, FlushOutcome::Persisted { events: 1 });
    assert_eq!(transport.stats().batches_persisted, 1);
}
