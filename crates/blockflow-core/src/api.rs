//! The seam between the cache layer and the transport.

use async_trait::async_trait;

use crate::block::Block;
use crate::error::Result;
use crate::flow::Flow;
use crate::payload::{FlowPrompt, Inputs, NewBlock, NewFlow, PendingFlow};
use crate::types::ResourceKind;

/// Typed access to the block/flow backend.
///
/// Every call is independent: implementations must allow concurrent calls and
/// must not retry. Failures come back as [`crate::BlockflowError::Api`].
#[async_trait]
pub trait ResourceApi: Send + Sync {
    async fn list_blocks(&self) -> Result<Vec<Block>>;

    async fn get_block(&self, id: &str) -> Result<Block>;

    async fn create_block(&self, block: &NewBlock) -> Result<Block>;

    async fn list_flows(&self) -> Result<Vec<Flow>>;

    async fn get_flow(&self, id: &str) -> Result<Flow>;

    async fn create_flow(&self, flow: &NewFlow) -> Result<Flow>;

    /// Synthesize a flow from natural language and start it.
    async fn create_flow_from_prompt(&self, prompt: &FlowPrompt) -> Result<Flow>;

    async fn execute_flow(&self, id: &str, initial_inputs: &Inputs) -> Result<Flow>;

    /// Resume a flow that is waiting for input.
    async fn continue_flow(&self, id: &str, inputs: &Inputs) -> Result<Flow>;

    async fn list_pending(&self) -> Result<Vec<PendingFlow>>;
}

/// A resource that lives in one of the cached collections.
#[async_trait]
pub trait Resource: Clone + Send + Sync + 'static {
    /// Collection this resource belongs to.
    const KIND: ResourceKind;

    /// Server-assigned identity.
    fn id(&self) -> &str;

    async fn fetch_all<A: ResourceApi + ?Sized>(api: &A) -> Result<Vec<Self>>;

    async fn fetch_one<A: ResourceApi + ?Sized>(api: &A, id: &str) -> Result<Self>;
}

#[async_trait]
impl Resource for Block {
    const KIND: ResourceKind = ResourceKind::Blocks;

    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch_all<A: ResourceApi + ?Sized>(api: &A) -> Result<Vec<Self>> {
        api.list_blocks().await
    }

    async fn fetch_one<A: ResourceApi + ?Sized>(api: &A, id: &str) -> Result<Self> {
        api.get_block(id).await
    }
}

#[async_trait]
impl Resource for Flow {
    const KIND: ResourceKind = ResourceKind::Flows;

    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch_all<A: ResourceApi + ?Sized>(api: &A) -> Result<Vec<Self>> {
        api.list_flows().await
    }

    async fn fetch_one<A: ResourceApi + ?Sized>(api: &A, id: &str) -> Result<Self> {
        api.get_flow(id).await
    }
}
