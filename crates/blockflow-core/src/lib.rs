//! # Blockflow Core
//!
//! Core data model and error types shared by the Blockflow client crates.
//!
//! This crate provides:
//! - [`Block`] and [`Flow`] - the two backend resources
//! - [`MessageThread`] - append-only view of a flow's conversation
//! - [`ResourceApi`] - the transport seam the cache layer is written against
//! - [`BlockflowError`] / [`ApiError`] - the uniform failure shape

pub mod api;
pub mod block;
pub mod error;
pub mod flow;
pub mod payload;
pub mod types;

// Re-exports for convenience
pub use api::{Resource, ResourceApi};
pub use block::Block;
pub use error::{ApiError, BlockflowError, Result};
pub use flow::{Flow, Message, MessageThread};
pub use payload::{ExecuteFlow, FlowPrompt, Inputs, NewBlock, NewFlow, PendingFlow};
pub use types::*;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::api::{Resource, ResourceApi};
    pub use crate::block::Block;
    pub use crate::error::{ApiError, BlockflowError, Result};
    pub use crate::flow::{Flow, Message, MessageThread};
    pub use crate::payload::{FlowPrompt, Inputs, NewBlock, NewFlow, PendingFlow};
    pub use crate::types::{FlowStatus, ResourceKind, Role};
}
