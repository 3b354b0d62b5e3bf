//! Application state.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use blockflow_client::{BlockflowClient, DashboardClient};
use blockflow_core::ResourceApi;
use blockflow_state::{CollectionStore, FlowPoller};

use crate::config::ConsoleConfig;

/// Handles shared by the command loop.
pub struct AppState<A: ResourceApi + ?Sized + 'static> {
    /// Cached blocks and flows.
    pub store: CollectionStore<A>,

    /// Selected flow and its poll task.
    pub poller: FlowPoller<A>,

    /// Dashboard feeds.
    pub dashboard: DashboardClient,
}

impl<A: ResourceApi + ?Sized + 'static> AppState<A> {
    pub fn new(api: Arc<A>, poll_interval: Duration, dashboard: DashboardClient) -> Self {
        let store = CollectionStore::new(api);
        Self {
            poller: FlowPoller::with_interval(store.clone(), poll_interval),
            store,
            dashboard,
        }
    }
}

impl AppState<BlockflowClient> {
    /// Wire the HTTP clients described by `config`.
    pub fn from_config(config: &ConsoleConfig) -> Result<Self> {
        let timeout = config.request_timeout();
        let api = BlockflowClient::with_timeout(&config.api_url, timeout)?;
        let dashboard = DashboardClient::new(
            &config.hn_url,
            config.quote_url.as_deref(),
            config.quote_symbol.clone(),
            timeout,
        )?;
        Ok(Self::new(Arc::new(api), config.poll_interval(), dashboard))
    }
}
