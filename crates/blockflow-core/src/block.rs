//! Blocks: named, reusable automation units bound to a target URL.

use serde::{Deserialize, Serialize};

/// A block as returned by the backend. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBlock")]
pub struct Block {
    /// Server-assigned identifier.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Target URL the block automates.
    pub url: String,

    /// Comma-separated action names.
    pub actions: String,

    /// Creation timestamp as reported by the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    /// Last update timestamp as reported by the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Block {
    /// Individual action names, trimmed, without empties.
    pub fn action_names(&self) -> Vec<&str> {
        split_actions(&self.actions)
    }
}

pub(crate) fn split_actions(actions: &str) -> Vec<&str> {
    actions
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .collect()
}

/// Wire shape. Search-index documents carry `_id` instead of `id`.
#[derive(Deserialize)]
struct RawBlock {
    id: Option<String>,
    #[serde(rename = "_id")]
    doc_id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    actions: Option<String>,
    #[serde(alias = "createdAt")]
    created_at: Option<String>,
    #[serde(alias = "updatedAt")]
    updated_at: Option<String>,
}

impl TryFrom<RawBlock> for Block {
    type Error = String;

    fn try_from(raw: RawBlock) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .or(raw.doc_id)
            .ok_or_else(|| "block is missing `id`".to_string())?;

        Ok(Block {
            id,
            name: raw.name,
            url: raw.url,
            actions: raw.actions.unwrap_or_default(),
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        })
    }
}
