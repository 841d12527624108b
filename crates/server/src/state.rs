//! Shared handler state.

use std::sync::Arc;

use lendboard_client::CacheSynchronizer;
use lendboard_core::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    /// `None` when API credentials are not configured.
    pub sync: Option<Arc<CacheSynchronizer>>,
}

impl AppState {
    pub fn new(store: Store, sync: Option<Arc<CacheSynchronizer>>) -> Self {
        Self { store, sync }
    }
}
