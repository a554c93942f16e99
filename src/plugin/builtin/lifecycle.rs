//! Visibility Producer
//!
//! Reports `visibility` transitions and `bfcache-restore` when the host is
//! shown again from a suspended snapshot.

use std::sync::Arc;

use log::debug;

use crate::event::Event;
use crate::lifecycle::{LifecycleEvent, ListenerId, SharedLifecycle};
use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::traits::{Plugin, SharedTransport};
use crate::runtime::SharedContext;

pub const LIFECYCLE_PLUGIN_NAME: &str = "lifecycle";

pub struct LifecyclePlugin {
    lifecycle: SharedLifecycle,
    listener: Option<ListenerId>,
}

impl LifecyclePlugin {
    pub fn new(lifecycle: SharedLifecycle) -> Self {
        Self {
            lifecycle,
            listener: None,
        }
    }
}

impl Plugin for LifecyclePlugin {
    fn name(&self) -> &str {
        LIFECYCLE_PLUGIN_NAME
    }

    fn setup(&mut self, context: &SharedContext, transport: &SharedTransport) -> PluginResult<()> {
        if self.listener.is_some() {
            return Err(PluginError::invalid_state("lifecycle plugin is already set up"));
        }

        let context = Arc::clone(context);
        let transport = Arc::clone(transport);
        let id = self.lifecycle.add_listener(move |event| {
            let reported = match event {
                LifecycleEvent::VisibilityChange(state) => Some(Event::new("visibility").with("state", state.as_str())),
                LifecycleEvent::PageShow { persisted: true } => Some(Event::new("bfcache-restore")),
                _ => None,
            };
            if let Some(reported) = reported {
                transport.track(reported.with("pageId", context.page_id()));
            }
        });
        self.listener = Some(id);
        debug!("Visibility tracking attached");
        Ok(())
    }

    fn teardown(&mut self) -> PluginResult<()> {
        if let Some(id) = self.listener.take() {
            self.lifecycle.remove_listener(id);
        }
        Ok(())
    }
}
