//! # Blockflow Client
//!
//! HTTP client for block/flow automation backends, plus the dashboard feeds.

pub mod client;
pub mod dashboard;
mod http;

pub use client::{BlockflowClient, DEFAULT_API_URL};
pub use dashboard::{Dashboard, DashboardClient, StockQuote, Story};

/// Prelude module for common imports.
pub mod prelude {
    pub use crate::client::BlockflowClient;
    pub use crate::dashboard::DashboardClient;
    pub use blockflow_core::prelude::*;
}
