//! One in-flight order per (asset, side)
//!
//! A slot is claimed before authorization and released when the returned
//! guard drops, whichever way the placement ended.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use crate::domain::MarketKey;
use crate::error::{GuardError, Result};

#[derive(Debug, Default, Clone)]
pub struct InFlightRegistry {
    slots: Arc<DashMap<MarketKey, String>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key` for `order_id`. A second claim while the first guard is
    /// alive fails with `DuplicateInFlight`; nothing is queued.
    pub fn try_acquire(&self, key: MarketKey, order_id: &str) -> Result<InFlightGuard> {
        match self.slots.entry(key.clone()) {
            Entry::Occupied(existing) => {
                debug!(key = %key, holder = %existing.get(), "in-flight slot busy");
                Err(GuardError::DuplicateInFlight {
                    key: key.to_string(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(order_id.to_string());
                Ok(InFlightGuard {
                    slots: Arc::clone(&self.slots),
                    key,
                })
            }
        }
    }

    pub fn holder(&self, key: &MarketKey) -> Option<String> {
        self.slots.get(key).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[derive(Debug)]
pub struct InFlightGuard {
    slots: Arc<DashMap<MarketKey, String>>,
    key: MarketKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.slots.remove(&self.key);
    }
}
