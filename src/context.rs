//! Solicited context: capability metadata attached to outbound events.
//!
//! Providers are polled when an event is about to leave; nothing is pushed.

use crate::lock::lock_or_recover;
use serde_json::Value;
use std::sync::{Arc, Mutex, Weak};

/// One capability's contribution to the outgoing context blob.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextInfo {
    pub name: String,
    pub payload: Value,
}

/// Answers a context request with this component's capability description.
/// Must return quickly; called synchronously while assembling an event.
pub trait ContextProvider: Send + Sync {
    fn context_info(&self) -> ContextInfo;
}

/// Collects context from every registered provider. Providers are held
/// weakly; dropped ones disappear from the next collection.
#[derive(Default)]
pub struct ContextAggregator {
    providers: Mutex<Vec<Weak<dyn ContextProvider>>>,
}

impl ContextAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, provider: &Arc<dyn ContextProvider>) {
        let mut providers = lock_or_recover(&self.providers, "context_aggregator");
        providers.push(Arc::downgrade(provider));
    }

    pub fn collect(&self) -> Vec<ContextInfo> {
        let live: Vec<Arc<dyn ContextProvider>> = {
            let mut providers = lock_or_recover(&self.providers, "context_aggregator");
            providers.retain(|candidate| candidate.strong_count() > 0);
            providers
                .iter()
                .filter_map(|candidate| candidate.upgrade())
                .collect()
        };
        live.iter().map(|provider| provider.context_info()).collect()
    }
}
