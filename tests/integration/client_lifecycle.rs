//! Client facade end to end: producers, lifecycle, flush and teardown

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use rumkit::lifecycle::{LifecycleEvent, LifecycleHub, Visibility};
use rumkit::plugin::builtin::{Navigator, SourceLocation};
use rumkit::plugin::{Plugin, PluginResult, SharedTransport};
use rumkit::runtime::SharedContext;
use rumkit::transport::{
    DeliveryRequest, DeliveryResult, DeliveryStrategy, FlushOutcome, MemoryStore, SharedStrategy,
};
use rumkit::{Client, ClientOptions, Event, Features, RumError};

/// Strategy that accepts every batch and keeps the decoded envelopes
#[derive(Default)]
struct Collector {
    envelopes: Mutex<Vec<Value>>,
}

impl Collector {
    fn event_types(&self) -> Vec<String> {
        self.envelopes
            .lock()
            .iter()
            .flat_map(|envelope| envelope["events"].as_array().cloned().unwrap_or_default())
            .map(|event| event["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    fn batches(&self) -> usize {
        self.envelopes.lock().len()
    }
}

#[async_trait]
impl DeliveryStrategy for Collector {
    fn name(&self) -> &'static str {
        "collector"
    }

    async fn deliver(&self, request: &DeliveryRequest<'_>) -> DeliveryResult<()> {
        let envelope: Value = serde_json::from_str(request.body).expect("envelope is JSON");
        self.envelopes.lock().push(envelope);
        Ok(())
    }
}

struct Harness {
    client: Client,
    collector: Arc<Collector>,
    lifecycle: Arc<LifecycleHub>,
}

fn harness(features: Features, extra: Vec<Box<dyn Plugin>>) -> Harness {
    let collector = Arc::new(Collector::default());
    let lifecycle = LifecycleHub::shared();
    let mut options = ClientOptions::new("shop-web", "2.4.1")
        .endpoint("https://collect.example.com/rum")
        .features(features);
    options.context.allow_params = vec!["tab".to_string()];

    let mut builder = Client::builder(options)
        .strategies(vec![collector.clone() as SharedStrategy])
        .store(Arc::new(MemoryStore::new()))
        .lifecycle(Arc::clone(&lifecycle))
        .navigator(Navigator::new("https://shop.example.com/cart?tab=2&token=secret"))
        .settle_timeout(Duration::from_secs(1));
    for plugin in extra {
        builder = builder.plugin(plugin);
    }

    Harness {
        client: builder.build().expect("client builds"),
        collector,
        lifecycle,
    }
}

struct Ordered {
    name: &'static str,
    journal: Arc<Mutex<Vec<String>>>,
}

impl Plugin for Ordered {
    fn name(&self) -> &str {
        self.name
    }

    fn setup(&mut self, _context: &SharedContext, _transport: &SharedTransport) -> PluginResult<()> {
        self.journal.lock().push(format!("setup:{}", self.name));
        Ok(())
    }

    fn teardown(&mut self) -> PluginResult<()> {
        self.journal.lock().push(format!("teardown:{}", self.name));
        Ok(())
    }
}

#[tokio::test]
async fn test_missing_identity_fails() {
    let err = Client::init(ClientOptions::new("", "1.0.0")).unwrap_err();
    assert!(matches!(err, RumError::Config { .. }));
    assert!(err.is_configuration_error());
}

#[tokio::test]
async fn test_default_producers_report_page_view() {
    let h = harness(Features::default(), Vec::new());
    assert_eq!(h.client.plugins(), vec!["error", "route"]);
    assert!(h.client.setup_report().all_ready());

    let outcome = h.client.flush(false).await;

    assert_eq!(
        outcome,
        FlushOutcome::Delivered {
            events: 3,
            strategy: Some("collector")
        }
    );
    assert_eq!(h.collector.event_types(), vec!["__plugin_loaded", "__plugin_loaded", "pv"]);
    let envelope = h.collector.envelopes.lock()[0].clone();
    assert_eq!(envelope["appId"], "shop-web");
    assert_eq!(envelope["events"][2]["url"], "https://shop.example.com/cart?tab=2");
}

#[tokio::test]
async fn test_navigation_produces_leave_and_view() {
    let h = harness(Features::default(), Vec::new());
    let first_page = h.client.context().page_id();

    h.client.navigator().push("/checkout");
    h.client.flush(false).await;

    let types = h.collector.event_types();
    assert_eq!(&types[types.len() - 2..], ["route-leave", "pv"]);
    assert_ne!(h.client.context().page_id(), first_page);

    let envelope = h.collector.envelopes.lock()[0].clone();
    let events = envelope["events"].as_array().unwrap();
    let view = events.last().unwrap();
    assert_eq!(view["url"], "https://shop.example.com/checkout");
    assert_eq!(view["referrer"], "https://shop.example.com/cart?tab=2");
}

#[tokio::test]
async fn test_error_reporter_deduplicates() {
    let h = harness(Features::default(), Vec::new());
    let reporter = h.client.errors().expect("error producer enabled").clone();

    let location = || Some(SourceLocation::new("src/cart.rs", 10, 4));
    assert!(reporter.capture_message("cart total is NaN", location(), ""));
    assert!(!reporter.capture_message("cart total is NaN", location(), ""));
    h.client.flush(false).await;

    let errors = h
        .collector
        .event_types()
        .into_iter()
        .filter(|kind| kind == "error")
        .count();
    assert_eq!(errors, 1);
}

#[tokio::test]
async fn test_hidden_visibility_flushes_queue() {
    let h = harness(Features::default(), Vec::new());
    h.client.track(Event::new("click"));
    assert!(h.client.transport().queue_len() > 0);

    h.lifecycle.emit(LifecycleEvent::VisibilityChange(Visibility::Hidden));

    assert_eq!(h.client.transport().queue_len(), 0);
    assert!(h.client.transport().settle(Duration::from_secs(1)).await);
    let types = h.collector.event_types();
    assert!(types.contains(&"click".to_string()));
    assert!(types.contains(&"route-leave".to_string()));
}

#[tokio::test]
async fn test_destroy_tears_down_in_reverse_and_flushes() {
    let journal = Arc::new(Mutex::new(Vec::new()));
    let extra: Vec<Box<dyn Plugin>> = ["a", "b", "c"]
        .into_iter()
        .map(|name| -> Box<dyn Plugin> {
            Box::new(Ordered {
                name,
                journal: Arc::clone(&journal),
            })
        })
        .collect();
    let features = Features {
        error: false,
        route: false,
        ..Features::default()
    };
    let h = harness(features, extra);
    h.client.track(Event::new("tail"));

    let outcome = h.client.destroy().await;

    assert_eq!(outcome.events(), 1);
    assert_eq!(
        *journal.lock(),
        vec!["setup:a", "setup:b", "setup:c", "teardown:c", "teardown:b", "teardown:a"]
    );
    assert!(h.client.is_destroyed());
    assert!(h.client.plugins().is_empty());
    assert_eq!(h.lifecycle.listener_count(), 0);

    assert_eq!(h.client.destroy().await, FlushOutcome::Empty);
    assert_eq!(h.collector.batches(), 1);
}

#[tokio::test]
async fn test_context_identity_and_subscribers() {
    let h = harness(Features::default(), Vec::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = h.client.on_event(move |event| {
        sink.lock().push(event.event_type().unwrap_or_default().to_string());
    });

    h.client.set_user_id(Some("u-42"));
    h.client.set_tags([("plan", "pro")]);
    h.client.set_tags([("region", "eu")]);
    h.client.track(Event::new("custom"));
    assert!(subscription.unsubscribe());
    h.client.track(Event::new("ignored"));

    assert_eq!(*seen.lock(), vec!["custom"]);
    assert_eq!(h.client.context().user_id().as_deref(), Some("u-42"));
    let tags = h.client.context().tags();
    assert_eq!(tags.get("plan").map(String::as_str), Some("pro"));
    assert_eq!(tags.get("region").map(String::as_str), Some("eu"));
}
