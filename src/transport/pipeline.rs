//! Event Pipeline
//!
//! `Transport` is the single path from producers to the collector. `track`
//! stamps, enqueues and fans out synchronously; batches leave the queue
//! atomically and are offered to the delivery chain, and a batch no strategy
//! accepts goes to the offline backlog whole.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use super::backlog::{FileStore, MemoryStore, OfflineBacklog, SharedStore};
use super::config::TransportConfig;
use super::error::{DeliveryError, DeliveryResult};
use super::strategy::{build_chain, DeliveryRequest, SharedStrategy};
use super::subscribers::{EventCallback, SubscriberSet, Subscription};
use crate::clock::{system_clock, SharedClock};
use crate::error::{RumError, RumResult};
use crate::event::{Envelope, Event};

/// Result of one flush
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was queued
    Empty,
    /// A strategy accepted the batch; `strategy` is `None` without an endpoint
    Delivered { events: usize, strategy: Option<&'static str> },
    /// Every strategy failed and the batch went to the backlog
    Persisted { events: usize },
}

impl FlushOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, FlushOutcome::Delivered { .. })
    }

    /// Events in the flushed batch
    pub fn events(&self) -> usize {
        match self {
            FlushOutcome::Empty => 0,
            FlushOutcome::Delivered { events, .. } | FlushOutcome::Persisted { events } => *events,
        }
    }
}

/// Pipeline counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub events_tracked: u64,
    pub events_replayed: u64,
    pub timers_scheduled: u64,
    pub batches_delivered: u64,
    pub batches_persisted: u64,
    pub events_persisted: u64,
    pub last_strategy: Option<&'static str>,
}

struct PendingFlush {
    seq: u64,
    handle: JoinHandle<()>,
}

/// Buffered, batched event delivery
pub struct Transport {
    app_id: String,
    release: String,
    config: TransportConfig,
    clock: SharedClock,
    queue: Mutex<Vec<Event>>,
    timer: Mutex<Option<PendingFlush>>,
    timer_seq: AtomicU64,
    subscribers: SubscriberSet,
    strategies: Vec<SharedStrategy>,
    backlog: OfflineBacklog,
    stats: Mutex<TransportStats>,
    runtime: Handle,
    tasks: TaskTracker,
    weak_self: Weak<Transport>,
}

/// Builder for `Transport`
pub struct TransportBuilder {
    app_id: String,
    release: String,
    config: TransportConfig,
    strategies: Option<Vec<SharedStrategy>>,
    store: Option<SharedStore>,
    clock: Option<SharedClock>,
}

impl TransportBuilder {
    /// Replace the built-in delivery chain
    pub fn strategies(mut self, strategies: Vec<SharedStrategy>) -> Self {
        self.strategies = Some(strategies);
        self
    }

    /// Backlog storage; defaults to a per-app file store
    pub fn store(mut self, store: SharedStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the transport and replay any stored backlog into its queue.
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> RumResult<Arc<Transport>> {
        self.config.validate().map_err(RumError::config)?;
        let runtime = Handle::try_current()
            .map_err(|e| RumError::runtime(format!("transport requires a Tokio runtime: {}", e)))?;

        let tasks = TaskTracker::new();
        let strategies = match self.strategies {
            Some(strategies) => strategies,
            None => build_chain(&self.config.strategies, &self.config.strategy_settings(), &tasks)?,
        };
        let store = self.store.unwrap_or_else(|| default_store(&self.app_id));
        let backlog = OfflineBacklog::new(store, self.config.backlog_capacity);

        let replayed = backlog.take();
        let stats = TransportStats {
            events_replayed: replayed.len() as u64,
            ..TransportStats::default()
        };

        Ok(Arc::new_cyclic(|weak_self| Transport {
            app_id: self.app_id,
            release: self.release,
            config: self.config,
            clock: self.clock.unwrap_or_else(system_clock),
            queue: Mutex::new(replayed),
            timer: Mutex::new(None),
            timer_seq: AtomicU64::new(0),
            subscribers: SubscriberSet::new(),
            strategies,
            backlog,
            stats: Mutex::new(stats),
            runtime,
            tasks,
            weak_self: weak_self.clone(),
        }))
    }
}

fn default_store(app_id: &str) -> SharedStore {
    match FileStore::for_app(app_id) {
        Some(store) => {
            debug!("Offline backlog stored in {}", store.dir().display());
            Arc::new(store)
        }
        None => {
            warn!("No data directory available; offline backlog will not survive restarts");
            Arc::new(MemoryStore::new())
        }
    }
}

impl Transport {
    pub fn builder<A: Into<String>, R: Into<String>>(
        app_id: A,
        release: R,
        config: TransportConfig,
    ) -> TransportBuilder {
        TransportBuilder {
            app_id: app_id.into(),
            release: release.into(),
            config,
            strategies: None,
            store: None,
            clock: None,
        }
    }

    /// Ingest one event. Never blocks on I/O.
    pub fn track(&self, event: Event) {
        let (event, queued) = self.enqueue(event);
        self.subscribers.emit(&event);
        self.after_enqueue(queued);
    }

    /// Ingest one event but notify subscribers from a background task instead
    /// of inline. For callers that must not run observer code, such as a
    /// panic hook.
    pub fn track_deferred(&self, event: Event) {
        let (event, queued) = self.enqueue(event);
        if let Some(transport) = self.weak_self.upgrade() {
            self.tasks.spawn_on(
                async move {
                    transport.subscribers.emit_deferred(&event);
                },
                &self.runtime,
            );
        }
        self.after_enqueue(queued);
    }

    fn enqueue(&self, event: Event) -> (Event, usize) {
        let event = event.stamped(self.clock.now_ms());
        let queued = {
            let mut queue = self.queue.lock();
            queue.push(event.clone());
            queue.len()
        };
        self.stats.lock().events_tracked += 1;
        trace!("Tracked {:?} event ({} queued)", event.event_type(), queued);
        (event, queued)
    }

    fn after_enqueue(&self, queued: usize) {
        if queued >= self.config.batch_size {
            self.flush_now(true);
        } else {
            self.schedule_flush();
        }
    }

    /// Drain the queue and deliver it, waiting for the outcome
    pub async fn flush(&self, urgent: bool) -> FlushOutcome {
        match self.take_batch() {
            Some(batch) => self.deliver(batch, urgent).await,
            None => FlushOutcome::Empty,
        }
    }

    /// Drain the queue now and deliver it in the background.
    /// Returns the number of events handed off.
    pub fn flush_now(&self, urgent: bool) -> usize {
        let Some(batch) = self.take_batch() else {
            return 0;
        };
        let count = batch.len();
        match self.weak_self.upgrade() {
            Some(transport) => {
                self.tasks.spawn_on(
                    async move {
                        transport.deliver(batch, urgent).await;
                    },
                    &self.runtime,
                );
            }
            None => {
                // Transport is being dropped; keep the events for next session
                self.persist(batch);
            }
        }
        count
    }

    /// Register an observer of every tracked event
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe_shared(Arc::new(callback))
    }

    pub fn subscribe_shared(&self, callback: EventCallback) -> Subscription {
        self.subscribers.subscribe(callback)
    }

    /// Wait up to `limit` for background deliveries and beacons to finish
    pub async fn settle(&self, limit: Duration) -> bool {
        self.tasks.close();
        let finished = tokio::time::timeout(limit, self.tasks.wait()).await.is_ok();
        self.tasks.reopen();
        if !finished {
            warn!("Background deliveries still running after {:?}", limit);
        }
        finished
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether a debounced flush is waiting to fire
    pub fn has_pending_flush(&self) -> bool {
        self.timer.lock().is_some()
    }

    pub fn stats(&self) -> TransportStats {
        self.stats.lock().clone()
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn backlog(&self) -> &OfflineBacklog {
        &self.backlog
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Remove the whole queue as one batch and cancel the pending timer.
    /// Lock order is queue, then timer.
    fn take_batch(&self) -> Option<Vec<Event>> {
        let mut queue = self.queue.lock();
        self.cancel_timer();
        if queue.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut *queue))
        }
    }

    fn schedule_flush(&self) {
        let mut slot = self.timer.lock();
        if slot.is_some() {
            return;
        }

        let seq = self.timer_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let delay = self.config.flush_delay;
        let weak = self.weak_self.clone();
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(transport) = weak.upgrade() {
                if transport.release_timer(seq) {
                    transport.flush_now(false);
                }
            }
        });
        *slot = Some(PendingFlush { seq, handle });
        self.stats.lock().timers_scheduled += 1;
        trace!("Debounced flush #{} scheduled in {:?}", seq, delay);
    }

    /// Clear the slot from inside the firing timer without aborting it
    fn release_timer(&self, seq: u64) -> bool {
        let mut slot = self.timer.lock();
        match slot.as_ref() {
            Some(pending) if pending.seq == seq => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    fn cancel_timer(&self) {
        if let Some(pending) = self.timer.lock().take() {
            pending.handle.abort();
            trace!("Debounced flush #{} cancelled", pending.seq);
        }
    }

    async fn deliver(&self, batch: Vec<Event>, urgent: bool) -> FlushOutcome {
        let events = batch.len();
        match self.ship_batch(&batch, urgent).await {
            Ok(strategy) => {
                let mut stats = self.stats.lock();
                stats.batches_delivered += 1;
                stats.last_strategy = strategy;
                debug!(
                    "Delivered batch of {} events via {}",
                    events,
                    strategy.unwrap_or("no-op (no endpoint)")
                );
                FlushOutcome::Delivered { events, strategy }
            }
            Err(e) => {
                warn!("All delivery strategies failed for {} events: {}", events, e);
                self.persist(batch);
                FlushOutcome::Persisted { events }
            }
        }
    }

    /// Offer the batch to each strategy in order; first success wins
    async fn ship_batch(&self, batch: &[Event], urgent: bool) -> DeliveryResult<Option<&'static str>> {
        let Some(endpoint) = self.config.endpoint.as_deref() else {
            return Ok(None);
        };

        let envelope = Envelope::new(&self.app_id, &self.release, self.clock.now_ms(), batch.to_vec());
        let body = serde_json::to_string(&envelope)?;
        let request = DeliveryRequest {
            endpoint,
            body: &body,
            urgent,
        };

        let mut last_error = DeliveryError::NoStrategies;
        for strategy in &self.strategies {
            match strategy.deliver(&request).await {
                Ok(()) => return Ok(Some(strategy.name())),
                Err(e) => {
                    debug!("Delivery strategy '{}' failed: {}", strategy.name(), e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    fn persist(&self, batch: Vec<Event>) {
        let events = batch.len();
        match self.backlog.persist(&batch) {
            Ok(stored) => {
                let mut stats = self.stats.lock();
                stats.batches_persisted += 1;
                stats.events_persisted += events as u64;
                info!("Persisted {} events to offline backlog ({} stored)", events, stored);
            }
            Err(e) => warn!("Offline backlog write failed, {} events lost: {}", events, e),
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Some(pending) = self.timer.get_mut().take() {
            pending.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::backlog::KeyValueStore;
    use crate::transport::backlog::OFFLINE_KEY;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    /// Strategy that records batches and answers with a fixed result
    struct RecordingStrategy {
        name: &'static str,
        accept: bool,
        batches: Mutex<Vec<Envelope>>,
        urgent_flags: Mutex<Vec<bool>>,
    }

    impl RecordingStrategy {
        fn new(name: &'static str, accept: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                accept,
                batches: Mutex::new(Vec::new()),
                urgent_flags: Mutex::new(Vec::new()),
            })
        }

        fn batch_sizes(&self) -> Vec<usize> {
            self.batches.lock().iter().map(|b| b.events.len()).collect()
        }

        fn attempts(&self) -> usize {
            self.batches.lock().len()
        }
    }

    #[async_trait]
    impl crate::transport::strategy::DeliveryStrategy for RecordingStrategy {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn deliver(&self, request: &DeliveryRequest<'_>) -> DeliveryResult<()> {
            let envelope: Envelope = serde_json::from_str(request.body).unwrap();
            self.batches.lock().push(envelope);
            self.urgent_flags.lock().push(request.urgent);
            if self.accept {
                Ok(())
            } else {
                Err(DeliveryError::Rejected { status: 503 })
            }
        }
    }

    /// Strategy that takes a while to accept each batch
    #[derive(Default)]
    struct SlowStrategy {
        delivered: AtomicUsize,
    }

    #[async_trait]
    impl crate::transport::strategy::DeliveryStrategy for SlowStrategy {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn deliver(&self, _request: &DeliveryRequest<'_>) -> DeliveryResult<()> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn transport_with(
        endpoint: Option<&str>,
        strategies: Vec<SharedStrategy>,
        store: Arc<MemoryStore>,
    ) -> Arc<Transport> {
        let config = TransportConfig {
            endpoint: endpoint.map(str::to_string),
            ..TransportConfig::default()
        };
        Transport::builder("app", "1.0.0", config)
            .strategies(strategies)
            .store(store)
            .build()
            .unwrap()
    }

    async fn drain_background() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_threshold_forces_urgent_flush() {
        let recorder = RecordingStrategy::new("rec", true);
        let transport = transport_with(Some("http://collector/rum"), vec![recorder.clone()], Arc::new(MemoryStore::new()));

        for i in 0..20 {
            transport.track(Event::new("click").with("i", i));
        }

        assert_eq!(transport.queue_len(), 0);
        assert!(!transport.has_pending_flush());
        drain_background().await;

        assert_eq!(recorder.batch_sizes(), vec![20]);
        assert_eq!(*recorder.urgent_flags.lock(), vec![true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_schedules_single_timer() {
        let recorder = RecordingStrategy::new("rec", true);
        let transport = transport_with(Some("http://collector/rum"), vec![recorder.clone()], Arc::new(MemoryStore::new()));

        for i in 0..5 {
            transport.track(Event::new("click").with("i", i));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(transport.has_pending_flush());
        assert_eq!(transport.stats().timers_scheduled, 1);
        assert_eq!(recorder.attempts(), 0);

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        drain_background().await;

        assert_eq!(recorder.batch_sizes(), vec![5]);
        assert_eq!(*recorder.urgent_flags.lock(), vec![false]);
        assert!(!transport.has_pending_flush());
        assert_eq!(transport.queue_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_flush_cancels_timer() {
        let recorder = RecordingStrategy::new("rec", true);
        let transport = transport_with(Some("http://collector/rum"), vec![recorder.clone()], Arc::new(MemoryStore::new()));

        transport.track(Event::new("click"));
        assert!(transport.has_pending_flush());

        let outcome = transport.flush(true).await;
        assert_eq!(outcome, FlushOutcome::Delivered { events: 1, strategy: Some("rec") });
        assert!(!transport.has_pending_flush());

        tokio::time::sleep(Duration::from_secs(5)).await;
        drain_background().await;
        assert_eq!(recorder.attempts(), 1);
    }

    #[tokio::test]
    async fn test_empty_flush_is_noop() {
        let recorder = RecordingStrategy::new("rec", true);
        let transport = transport_with(Some("http://collector/rum"), vec![recorder.clone()], Arc::new(MemoryStore::new()));

        assert_eq!(transport.flush(false).await, FlushOutcome::Empty);
        assert_eq!(transport.flush_now(true), 0);
        assert_eq!(recorder.attempts(), 0);
    }

    #[tokio::test]
    async fn test_fallback_chain_stops_at_first_success() {
        let beacon = RecordingStrategy::new("beacon", false);
        let post = RecordingStrategy::new("post", false);
        let pixel = RecordingStrategy::new("pixel", true);
        let store = Arc::new(MemoryStore::new());
        let transport = transport_with(
            Some("http://collector/rum"),
            vec![beacon.clone(), post.clone(), pixel.clone()],
            store.clone(),
        );

        transport.track(Event::new("api"));
        let outcome = transport.flush(false).await;

        assert_eq!(outcome, FlushOutcome::Delivered { events: 1, strategy: Some("pixel") });
        assert_eq!((beacon.attempts(), post.attempts(), pixel.attempts()), (1, 1, 1));
        assert!(store.get(OFFLINE_KEY).unwrap().is_none());
        assert_eq!(transport.stats().last_strategy, Some("pixel"));
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let beacon = RecordingStrategy::new("beacon", true);
        let post = RecordingStrategy::new("post", true);
        let transport = transport_with(Some("http://collector/rum"), vec![beacon.clone(), post.clone()], Arc::new(MemoryStore::new()));

        transport.track(Event::new("api"));
        transport.flush(false).await;

        assert_eq!(beacon.attempts(), 1);
        assert_eq!(post.attempts(), 0);
    }

    #[tokio::test]
    async fn test_total_failure_persists_batch() {
        let failing = RecordingStrategy::new("post", false);
        let store = Arc::new(MemoryStore::new());
        let transport = transport_with(Some("http://collector/rum"), vec![failing], store.clone());

        transport.track(Event::new("a"));
        transport.track(Event::new("b"));
        let outcome = transport.flush(false).await;

        assert_eq!(outcome, FlushOutcome::Persisted { events: 2 });
        let stored = transport.backlog().peek().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].event_type(), Some("a"));
        assert_eq!(transport.stats().events_persisted, 2);
    }

    #[tokio::test]
    async fn test_backlog_replayed_once_and_prepended() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(OFFLINE_KEY, &json!([{"type": "old-1", "t": 1}, {"type": "old-2", "t": 2}]).to_string())
            .unwrap();
        let recorder = RecordingStrategy::new("rec", true);
        let transport = transport_with(Some("http://collector/rum"), vec![recorder.clone()], store.clone());

        assert_eq!(transport.queue_len(), 2);
        assert!(store.get(OFFLINE_KEY).unwrap().is_none());
        assert_eq!(transport.stats().events_replayed, 2);

        transport.track(Event::new("new"));
        transport.flush(false).await;

        let batches = recorder.batches.lock();
        let types: Vec<_> = batches[0].events.iter().map(|e| e.event_type().unwrap().to_string()).collect();
        assert_eq!(types, vec!["old-1", "old-2", "new"]);
    }

    #[tokio::test]
    async fn test_missing_endpoint_still_fans_out() {
        let recorder = RecordingStrategy::new("rec", true);
        let transport = transport_with(None, vec![recorder.clone()], Arc::new(MemoryStore::new()));
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        transport.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..3 {
            transport.track(Event::new("pv"));
        }
        let outcome = transport.flush(false).await;

        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert_eq!(outcome, FlushOutcome::Delivered { events: 3, strategy: None });
        assert_eq!(recorder.attempts(), 0);
    }

    #[tokio::test]
    async fn test_track_stamps_events_seen_by_subscribers() {
        let clock = Arc::new(crate::clock::ManualClock::new(1_234));
        let transport = Transport::builder("app", "1.0.0", TransportConfig::default())
            .strategies(Vec::new())
            .store(Arc::new(MemoryStore::new()))
            .clock(clock)
            .build()
            .unwrap();
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let sink = stamps.clone();
        transport.subscribe(move |event| sink.lock().push(event.timestamp()));

        transport.track(Event::new("pv"));

        assert_eq!(*stamps.lock(), vec![Some(1_234)]);
    }

    #[tokio::test]
    async fn test_events_tracked_during_delivery_start_new_batch() {
        let recorder = RecordingStrategy::new("rec", true);
        let transport = transport_with(Some("http://collector/rum"), vec![recorder.clone()], Arc::new(MemoryStore::new()));

        transport.track(Event::new("first"));
        assert_eq!(transport.flush_now(false), 1);
        transport.track(Event::new("second"));
        drain_background().await;

        assert_eq!(recorder.batch_sizes(), vec![1]);
        assert_eq!(transport.queue_len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_track_after_take_schedules_fresh_timer() {
        let recorder = RecordingStrategy::new("rec", true);
        let transport = transport_with(Some("http://collector/rum"), vec![recorder.clone()], Arc::new(MemoryStore::new()));

        transport.track(Event::new("first"));
        assert_eq!(transport.flush_now(false), 1);
        assert!(!transport.has_pending_flush());
        transport.track(Event::new("second"));
        assert!(transport.has_pending_flush());

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        drain_background().await;

        assert_eq!(recorder.batch_sizes(), vec![1, 1]);
        assert_eq!(transport.queue_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_waits_for_timer_driven_delivery() {
        let slow = Arc::new(SlowStrategy::default());
        let transport = transport_with(
            Some("http://collector/rum"),
            vec![slow.clone() as SharedStrategy],
            Arc::new(MemoryStore::new()),
        );

        transport.track(Event::new("click"));
        tokio::time::sleep(Duration::from_millis(2_100)).await;
        drain_background().await;
        assert!(!transport.has_pending_flush());
        assert_eq!(transport.queue_len(), 0);
        assert_eq!(slow.delivered.load(Ordering::SeqCst), 0);

        assert!(transport.settle(Duration::from_secs(5)).await);
        assert_eq!(slow.delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deferred_track_queues_now_and_notifies_later() {
        let transport = transport_with(None, Vec::new(), Arc::new(MemoryStore::new()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        transport.subscribe(move |event| {
            let deferred = crate::transport::in_deferred_notification();
            sink.lock().push((event.event_type().unwrap_or_default().to_string(), deferred));
        });

        transport.track_deferred(Event::new("panic"));
        assert_eq!(transport.queue_len(), 1);
        assert!(seen.lock().is_empty());

        assert!(transport.settle(Duration::from_secs(1)).await);
        assert_eq!(*seen.lock(), vec![("panic".to_string(), true)]);
    }

    #[test]
    fn test_build_outside_runtime_fails() {
        let result = Transport::builder("app", "1.0.0", TransportConfig::default())
            .strategies(Vec::new())
            .store(Arc::new(MemoryStore::new()))
            .build();
        assert!(matches!(result, Err(RumError::Runtime { .. })));
    }
}
