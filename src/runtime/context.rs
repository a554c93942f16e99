//! Session/page context shared with producers

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::id::gen_id;
use crate::error::{RumError, RumResult};

/// Shared context handle
pub type SharedContext = Arc<RuntimeContext>;

/// Default deployment environment
pub const DEFAULT_ENV: &str = "prod";

/// Inputs for building a `RuntimeContext`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextOptions {
    pub app_id: String,
    pub release: String,
    pub env: Option<String>,
    pub sample_rate: Option<f64>,
    #[serde(default)]
    pub allow_domains: Vec<String>,
    #[serde(default)]
    pub allow_params: Vec<String>,
}

impl ContextOptions {
    pub fn new<A: Into<String>, R: Into<String>>(app_id: A, release: R) -> Self {
        Self {
            app_id: app_id.into(),
            release: release.into(),
            ..Self::default()
        }
    }

    /// Identity must be present and the sample rate must be a probability
    pub fn validate(&self) -> RumResult<()> {
        if self.app_id.trim().is_empty() || self.release.trim().is_empty() {
            return Err(RumError::config("appId & release required"));
        }
        if let Some(rate) = self.sample_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(RumError::config(format!(
                    "sample rate must be between 0 and 1, got {}",
                    rate
                )));
            }
        }
        Ok(())
    }
}

/// Mutable portion of the context
#[derive(Debug, Default)]
struct MutableState {
    page_id: String,
    tags: BTreeMap<String, String>,
    user_id: Option<String>,
}

/// One monitored session/page pairing
#[derive(Debug)]
pub struct RuntimeContext {
    app_id: String,
    release: String,
    env: String,
    session_id: String,
    sample_rate: f64,
    allow_domains: HashSet<String>,
    allow_params: HashSet<String>,
    state: RwLock<MutableState>,
}

impl RuntimeContext {
    /// Build a context, filling defaults and generating session and page ids
    pub fn create(options: &ContextOptions) -> Self {
        let context = Self {
            app_id: options.app_id.clone(),
            release: options.release.clone(),
            env: options.env.clone().unwrap_or_else(|| DEFAULT_ENV.to_string()),
            session_id: gen_id(),
            sample_rate: options.sample_rate.unwrap_or(1.0),
            allow_domains: options.allow_domains.iter().cloned().collect(),
            allow_params: options.allow_params.iter().cloned().collect(),
            state: RwLock::new(MutableState {
                page_id: gen_id(),
                ..MutableState::default()
            }),
        };
        debug!(
            "Created runtime context for {}@{} (session {})",
            context.app_id, context.release, context.session_id
        );
        context
    }

    /// Build a shared context
    pub fn shared(options: &ContextOptions) -> SharedContext {
        Arc::new(Self::create(options))
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn release(&self) -> &str {
        &self.release
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Hosts whose traffic producers may report; empty means all
    pub fn allow_domains(&self) -> &HashSet<String> {
        &self.allow_domains
    }

    /// Query keys that survive URL sanitization; empty strips the whole query
    pub fn allow_params(&self) -> &HashSet<String> {
        &self.allow_params
    }

    /// Current page id
    pub fn page_id(&self) -> String {
        self.state.read().page_id.clone()
    }

    /// Replace the page id after a navigation and return the new one
    pub fn reset_page(&self) -> String {
        let next = gen_id();
        let mut state = self.state.write();
        debug!("Page id reset: {} -> {}", state.page_id, next);
        state.page_id = next.clone();
        next
    }

    /// Merge tags into the existing set
    pub fn set_tags<I, K, V>(&self, tags: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut state = self.state.write();
        for (key, value) in tags {
            state.tags.insert(key.into(), value.into());
        }
    }

    pub fn tags(&self) -> BTreeMap<String, String> {
        self.state.read().tags.clone()
    }

    pub fn set_user_id(&self, user_id: Option<String>) {
        self.state.write().user_id = user_id;
    }

    pub fn user_id(&self) -> Option<String> {
        self.state.read().user_id.clone()
    }
}
