//! # Blockflow State
//!
//! Client-side cache of the block and flow collections, and the controller
//! that keeps a selected pending flow fresh.

pub mod poller;
pub mod store;
pub mod subscription;

#[cfg(test)]
pub(crate) mod testing;

pub use poller::{FlowPoller, PollState, Selection, DEFAULT_POLL_INTERVAL};
pub use store::{Cached, Collection, CollectionStore, ListView};
pub use subscription::{Change, EventBus, StoreEvent};
