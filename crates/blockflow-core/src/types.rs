//! Common types shared across Blockflow crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status value the backend uses while a flow waits for client input.
pub const PENDING_INPUT: &str = "pending_input";

/// Status of a flow.
///
/// The backend's vocabulary is open, so anything other than `pending_input`
/// is carried through as [`FlowStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum FlowStatus {
    /// No status reported.
    #[default]
    Unset,
    /// The backend waits for additional client-supplied data.
    PendingInput,
    /// Any other backend-defined state.
    Other(String),
}

impl FlowStatus {
    /// Returns true while the flow awaits input.
    pub fn is_pending(&self) -> bool {
        matches!(self, FlowStatus::PendingInput)
    }

    /// Wire representation, `None` when unset.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FlowStatus::Unset => None,
            FlowStatus::PendingInput => Some(PENDING_INPUT),
            FlowStatus::Other(s) => Some(s),
        }
    }
}

impl From<Option<String>> for FlowStatus {
    fn from(value: Option<String>) -> Self {
        match value.as_deref() {
            None | Some("") => FlowStatus::Unset,
            Some(PENDING_INPUT) => FlowStatus::PendingInput,
            Some(_) => FlowStatus::Other(value.unwrap_or_default()),
        }
    }
}

impl From<FlowStatus> for Option<String> {
    fn from(value: FlowStatus) -> Self {
        value.as_str().map(str::to_string)
    }
}

impl From<&str> for FlowStatus {
    fn from(value: &str) -> Self {
        FlowStatus::from(Some(value.to_string()))
    }
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or("unset"))
    }
}

/// The two cached resource collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Blocks,
    Flows,
}

impl ResourceKind {
    /// Collection path segment on the backend.
    pub fn path(&self) -> &'static str {
        match self {
            ResourceKind::Blocks => "blocks",
            ResourceKind::Flows => "flows",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Author of a message in a flow's thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used when rendering a thread.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "Assistant",
        }
    }
}
