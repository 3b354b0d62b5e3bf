//! Request payloads and the pending-flow listing.

use serde::{Deserialize, Serialize};

use crate::block::split_actions;
use crate::error::{ApiError, BlockflowError, Result, TRANSPORT_ERROR_STATUS};

/// Free-form inputs handed to a flow run.
pub type Inputs = serde_json::Map<String, serde_json::Value>;

/// Body of `POST /blocks/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBlock {
    pub name: String,
    pub url: String,
    /// Comma-separated action names.
    pub actions: String,
}

impl NewBlock {
    pub fn new(name: impl Into<String>, url: impl Into<String>, actions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            actions: actions.into(),
        }
    }

    /// Required-field check mirroring the create form.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("name", &self.name), ("url", &self.url), ("actions", &self.actions)] {
            if value.trim().is_empty() {
                return Err(BlockflowError::Validation(format!("{field} is required")));
            }
        }
        if split_actions(&self.actions).is_empty() {
            return Err(BlockflowError::Validation(
                "actions must name at least one action".to_string(),
            ));
        }
        Ok(())
    }
}

/// Body of `POST /flows/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFlow {
    pub name: String,
    pub description: String,
    /// Opaque action configuration list.
    pub action_configs: serde_json::Value,
}

/// Body of `POST /flows/new/from-prompt/execute`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowPrompt {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_inputs: Option<Inputs>,
}

impl FlowPrompt {
    /// Build a prompt, rejecting empty or whitespace-only text.
    pub fn new(prompt: impl Into<String>) -> Result<Self> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(BlockflowError::Validation("prompt is required".to_string()));
        }
        Ok(Self {
            prompt,
            initial_inputs: None,
        })
    }

    pub fn with_inputs(mut self, inputs: Inputs) -> Self {
        self.initial_inputs = Some(inputs);
        self
    }
}

/// Body of `POST /flows/{id}/execute`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteFlow {
    pub initial_inputs: Inputs,
}

/// A flow awaiting input, as listed by `GET /flows/pending`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingFlow {
    pub flow_id: String,
    /// What the backend still needs; null when it does not say.
    #[serde(default)]
    pub missing_inputs: serde_json::Value,
}

impl PendingFlow {
    /// Normalize the endpoint's response.
    ///
    /// Accepts a list of flows, a single `{flowId, missingInputs}` record, or
    /// an empty object.
    pub fn from_listing(body: serde_json::Value) -> Result<Vec<PendingFlow>> {
        use serde_json::Value;

        let invalid = |what: &str| {
            BlockflowError::Api(ApiError::new(
                format!("Unexpected pending listing: {what}"),
                TRANSPORT_ERROR_STATUS,
            ))
        };

        match body {
            Value::Array(items) => items
                .into_iter()
                .map(|item| {
                    let id = item
                        .get("id")
                        .or_else(|| item.get("_id"))
                        .or_else(|| item.get("flowId"))
                        .and_then(Value::as_str)
                        .ok_or_else(|| invalid("entry without id"))?
                        .to_string();
                    let missing = item.get("missingInputs").cloned().unwrap_or(Value::Null);
                    Ok(PendingFlow {
                        flow_id: id,
                        missing_inputs: missing,
                    })
                })
                .collect(),
            Value::Object(map) if map.is_empty() => Ok(Vec::new()),
            Value::Object(map) => {
                let id = map
                    .get("flowId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid("record without flowId"))?
                    .to_string();
                let missing = map.get("missingInputs").cloned().unwrap_or(Value::Null);
                Ok(vec![PendingFlow {
                    flow_id: id,
                    missing_inputs: missing,
                }])
            }
            Value::Null => Ok(Vec::new()),
            _ => Err(invalid("not a list or object")),
        }
    }
}
