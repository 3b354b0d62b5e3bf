//! Blockflow backend client implementation.

use std::time::Duration;

use async_trait::async_trait;
use blockflow_core::{
    Block, BlockflowError, ExecuteFlow, Flow, FlowPrompt, Inputs, NewBlock, NewFlow, PendingFlow,
    ResourceApi, Result,
};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::http::{join, parse_base, send_json};

/// Default backend address.
pub const DEFAULT_API_URL: &str = "http://localhost:8001";

/// Client for a block/flow automation backend.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone, Debug)]
pub struct BlockflowClient {
    /// Base URL of the backend.
    base_url: Url,

    /// HTTP client.
    http_client: reqwest::Client,
}

impl BlockflowClient {
    /// Create a client for the backend at `url`, relying on transport timeouts.
    pub fn new(url: &str) -> Result<Self> {
        Self::with_timeout(url, None)
    }

    /// Create a client with an optional per-request timeout.
    pub fn with_timeout(url: &str, timeout: Option<Duration>) -> Result<Self> {
        let base_url = parse_base(url)?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| BlockflowError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            http_client,
        })
    }

    /// Base URL requests are issued against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let url = join(&self.base_url, segments)?;
        let request = self.http_client.get(url.clone());
        send_json(request, &Method::GET, &url).await
    }

    async fn post<B, T>(&self, segments: &[&str], body: &B) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = join(&self.base_url, segments)?;
        let request = self.http_client.post(url.clone()).json(body);
        send_json(request, &Method::POST, &url).await
    }
}

#[async_trait]
impl ResourceApi for BlockflowClient {
    async fn list_blocks(&self) -> Result<Vec<Block>> {
        self.get(&["blocks", ""]).await
    }

    async fn get_block(&self, id: &str) -> Result<Block> {
        self.get(&["blocks", id]).await
    }

    async fn create_block(&self, block: &NewBlock) -> Result<Block> {
        self.post(&["blocks", ""], block).await
    }

    async fn list_flows(&self) -> Result<Vec<Flow>> {
        self.get(&["flows", ""]).await
    }

    async fn get_flow(&self, id: &str) -> Result<Flow> {
        self.get(&["flows", id]).await
    }

    async fn create_flow(&self, flow: &NewFlow) -> Result<Flow> {
        self.post(&["flows", ""], flow).await
    }

    async fn create_flow_from_prompt(&self, prompt: &FlowPrompt) -> Result<Flow> {
        self.post(&["flows", "new", "from-prompt", "execute"], prompt)
            .await
    }

    async fn execute_flow(&self, id: &str, initial_inputs: &Inputs) -> Result<Flow> {
        let body = ExecuteFlow {
            initial_inputs: initial_inputs.clone(),
        };
        self.post(&["flows", id, "execute"], &body).await
    }

    async fn continue_flow(&self, id: &str, inputs: &Inputs) -> Result<Flow> {
        // The inputs object is the whole body, not wrapped.
        self.post(&["flows", id, "continue"], inputs).await
    }

    async fn list_pending(&self) -> Result<Vec<PendingFlow>> {
        let body: serde_json::Value = self.get(&["flows", "pending"]).await?;
        PendingFlow::from_listing(body)
    }
}
