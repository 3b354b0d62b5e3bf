//! Flows and their message threads.

use std::ops::Deref;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{FlowStatus, Role};

/// A single entry in a flow's conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Append-only view of a flow's messages.
///
/// Once a message has been observed it keeps its position; later fetches can
/// only extend the thread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageThread {
    messages: Vec<Message>,
}

impl MessageThread {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Absorb a freshly fetched sequence.
    ///
    /// Only messages beyond the already observed length are appended. A
    /// shorter fetch leaves the thread as is. Returns the number of messages
    /// appended.
    pub fn merge(&mut self, fetched: Vec<Message>) -> usize {
        let known = self.messages.len();

        let diverged = self
            .messages
            .iter()
            .zip(fetched.iter())
            .position(|(a, b)| a != b);
        if let Some(index) = diverged {
            warn!(index, "Fetched thread diverges from observed history; keeping observed prefix");
        }

        if fetched.len() <= known {
            return 0;
        }

        let appended = fetched.len() - known;
        self.messages.extend(fetched.into_iter().skip(known));
        appended
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn into_vec(self) -> Vec<Message> {
        self.messages
    }
}

impl Deref for MessageThread {
    type Target = [Message];

    fn deref(&self) -> &Self::Target {
        &self.messages
    }
}

impl From<Vec<Message>> for MessageThread {
    fn from(messages: Vec<Message>) -> Self {
        Self::new(messages)
    }
}

/// A server-tracked task with a status and a message thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFlow")]
pub struct Flow {
    /// Server-assigned identifier.
    pub id: String,

    pub name: String,

    pub description: String,

    /// Current status; only `pending_input` has meaning to the client.
    pub status: FlowStatus,

    /// Action configuration as the backend reports it (string or list).
    pub actions: serde_json::Value,

    pub messages: MessageThread,
}

impl Flow {
    /// Returns true while the flow waits for client input.
    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    /// Replace this flow's fields with a newer fetch of the same flow.
    ///
    /// Scalar fields take the fetched value; the thread is merged so that
    /// observed messages are never reordered or dropped.
    pub fn absorb(&mut self, fetched: Flow) {
        debug_assert_eq!(self.id, fetched.id);
        self.name = fetched.name;
        self.description = fetched.description;
        self.status = fetched.status;
        self.actions = fetched.actions;
        self.messages.merge(fetched.messages.into_vec());
    }
}

#[derive(Deserialize)]
struct RawFlow {
    id: Option<String>,
    #[serde(rename = "_id")]
    doc_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: FlowStatus,
    #[serde(default)]
    actions: serde_json::Value,
    #[serde(default)]
    messages: Option<Vec<Message>>,
}

impl TryFrom<RawFlow> for Flow {
    type Error = String;

    fn try_from(raw: RawFlow) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .or(raw.doc_id)
            .ok_or_else(|| "flow is missing `id`".to_string())?;

        Ok(Flow {
            id,
            name: raw.name.unwrap_or_default(),
            description: raw.description.unwrap_or_default(),
            status: raw.status,
            actions: raw.actions,
            messages: raw.messages.unwrap_or_default().into(),
        })
    }
}
