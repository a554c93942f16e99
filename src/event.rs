//! Event Records and Wire Envelope
//!
//! An `Event` is an open-ended JSON object with a `type` discriminator.
//! Producers fill in their own fields; the pipeline injects the ingestion
//! timestamp `t`. A delivered batch travels inside an `Envelope`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding the event discriminator
pub const TYPE_FIELD: &str = "type";

/// Field holding the ingestion timestamp
pub const TIMESTAMP_FIELD: &str = "t";

/// Field correlating an event with the page it was observed on
pub const PAGE_ID_FIELD: &str = "pageId";

/// A single telemetry event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event(Map<String, Value>);

impl Event {
    /// Create an event with the given type discriminator
    pub fn new<S: Into<String>>(event_type: S) -> Self {
        let mut fields = Map::new();
        fields.insert(TYPE_FIELD.to_string(), Value::String(event_type.into()));
        Self(fields)
    }

    /// Wrap an arbitrary JSON object; non-objects are rejected
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    /// Builder-style field setter
    pub fn with<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Set a field in place
    pub fn set<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) {
        self.0.insert(key.into(), value.into());
    }

    /// The `type` discriminator, if present and a string
    pub fn event_type(&self) -> Option<&str> {
        self.0.get(TYPE_FIELD).and_then(Value::as_str)
    }

    /// The ingestion timestamp, if stamped
    pub fn timestamp(&self) -> Option<i64> {
        self.0.get(TIMESTAMP_FIELD).and_then(Value::as_i64)
    }

    /// The page correlation id, if present
    pub fn page_id(&self) -> Option<&str> {
        self.0.get(PAGE_ID_FIELD).and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Stamp the ingestion time unless the producer already supplied one
    pub(crate) fn stamped(mut self, now_ms: i64) -> Self {
        self.0
            .entry(TIMESTAMP_FIELD.to_string())
            .or_insert_with(|| Value::from(now_ms));
        self
    }
}

impl From<Event> for Value {
    fn from(event: Event) -> Self {
        Value::Object(event.0)
    }
}

/// JSON document POSTed to the collector for one batch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub app_id: String,
    pub release: String,
    pub sent_at: i64,
    pub events: Vec<Event>,
}

impl Envelope {
    pub fn new(app_id: &str, release: &str, sent_at: i64, events: Vec<Event>) -> Self {
        Self {
            app_id: app_id.to_string(),
            release: release.to_string(),
            sent_at,
            events,
        }
    }
}
