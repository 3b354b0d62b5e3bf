//! In-memory `ResourceApi` used by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use blockflow_core::{
    ApiError, Block, Flow, FlowPrompt, FlowStatus, Inputs, Message, NewBlock, NewFlow,
    PendingFlow, ResourceApi, Result,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Calls {
    pub list_blocks: usize,
    pub list_flows: usize,
    pub get_block: usize,
    pub get_flow: usize,
    pub creates: usize,
    pub continues: usize,
    pub in_flight_gets: usize,
    pub max_in_flight_gets: usize,
}

#[derive(Default)]
struct State {
    blocks: Vec<Block>,
    flows: Vec<Flow>,
    /// Scripted `get_flow` answers per id; the last one repeats.
    scripts: HashMap<String, VecDeque<Flow>>,
    fail_create: Option<ApiError>,
    fail_lists: bool,
    get_delay: Option<Duration>,
    calls: Calls,
}

pub(crate) struct FakeApi {
    state: Mutex<State>,
    next_id: AtomicU64,
}

pub(crate) fn flow(id: &str, status: &str, messages: Vec<Message>) -> Flow {
    Flow {
        id: id.to_string(),
        name: format!("flow {id}"),
        description: String::new(),
        status: FlowStatus::from(status),
        actions: serde_json::Value::Null,
        messages: messages.into(),
    }
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn calls(&self) -> Calls {
        self.with(|s| s.calls)
    }

    pub fn seed_block(&self, name: &str, url: &str, actions: &str) -> String {
        let id = self.next_id("block");
        let block = Block {
            id: id.clone(),
            name: name.into(),
            url: url.into(),
            actions: actions.into(),
            created_at: None,
            updated_at: None,
        };
        self.with(|s| s.blocks.push(block));
        id
    }

    pub fn seed_flow(&self, flow: Flow) {
        self.with(|s| s.flows.push(flow));
    }

    /// Queue answers for `get_flow(id)`.
    pub fn script(&self, id: &str, answers: Vec<Flow>) {
        self.with(|s| s.scripts.insert(id.to_string(), answers.into()));
    }

    pub fn fail_next_create(&self, error: ApiError) {
        self.with(|s| s.fail_create = Some(error));
    }

    pub fn fail_lists(&self, fail: bool) {
        self.with(|s| s.fail_lists = fail);
    }

    pub fn delay_gets(&self, delay: Duration) {
        self.with(|s| s.get_delay = Some(delay));
    }

    fn take_create_failure(&self) -> Result<()> {
        self.with(|s| {
            s.calls.creates += 1;
            match s.fail_create.take() {
                Some(e) => Err(e.into()),
                None => Ok(()),
            }
        })
    }
}

#[async_trait]
impl ResourceApi for FakeApi {
    async fn list_blocks(&self) -> Result<Vec<Block>> {
        self.with(|s| {
            s.calls.list_blocks += 1;
            if s.fail_lists {
                return Err(ApiError::transport().into());
            }
            Ok(s.blocks.clone())
        })
    }

    async fn get_block(&self, id: &str) -> Result<Block> {
        self.with(|s| {
            s.calls.get_block += 1;
            s.blocks
                .iter()
                .find(|b| b.id == id)
                .cloned()
                .ok_or_else(|| ApiError::new("Block not found", 404).into())
        })
    }

    async fn create_block(&self, block: &NewBlock) -> Result<Block> {
        self.take_create_failure()?;
        let id = self.seed_block(&block.name, &block.url, &block.actions);
        self.get_block(&id).await
    }

    async fn list_flows(&self) -> Result<Vec<Flow>> {
        self.with(|s| {
            s.calls.list_flows += 1;
            if s.fail_lists {
                return Err(ApiError::transport().into());
            }
            Ok(s.flows.clone())
        })
    }

    async fn get_flow(&self, id: &str) -> Result<Flow> {
        let delay = self.with(|s| {
            s.calls.get_flow += 1;
            s.calls.in_flight_gets += 1;
            s.calls.max_in_flight_gets = s.calls.max_in_flight_gets.max(s.calls.in_flight_gets);
            s.get_delay
        });

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.with(|s| {
            s.calls.in_flight_gets -= 1;

            if let Some(queue) = s.scripts.get_mut(id) {
                let answer = if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                };
                if let Some(flow) = answer {
                    return Ok(flow);
                }
            }

            s.flows
                .iter()
                .find(|f| f.id == id)
                .cloned()
                .ok_or_else(|| ApiError::new("Flow not found", 404).into())
        })
    }

    async fn create_flow(&self, flow: &NewFlow) -> Result<Flow> {
        self.take_create_failure()?;
        let mut created = self::flow(&self.next_id("flow"), "created", Vec::new());
        created.name = flow.name.clone();
        created.description = flow.description.clone();
        created.actions = flow.action_configs.clone();
        self.seed_flow(created.clone());
        Ok(created)
    }

    async fn create_flow_from_prompt(&self, prompt: &FlowPrompt) -> Result<Flow> {
        self.take_create_failure()?;
        let created = self::flow(
            &self.next_id("flow"),
            "pending_input",
            vec![Message::user(prompt.prompt.clone())],
        );
        self.seed_flow(created.clone());
        Ok(created)
    }

    async fn execute_flow(&self, id: &str, _initial_inputs: &Inputs) -> Result<Flow> {
        self.get_flow(id).await
    }

    async fn continue_flow(&self, id: &str, inputs: &Inputs) -> Result<Flow> {
        self.with(|s| s.calls.continues += 1);
        let mut flow = self.get_flow(id).await?;
        flow.messages
            .push(Message::user(serde_json::Value::Object(inputs.clone()).to_string()));
        Ok(flow)
    }

    async fn list_pending(&self) -> Result<Vec<PendingFlow>> {
        self.with(|s| {
            Ok(s.flows
                .iter()
                .filter(|f| f.is_pending())
                .map(|f| PendingFlow {
                    flow_id: f.id.clone(),
                    missing_inputs: serde_json::Value::Null,
                })
                .collect())
        })
    }
}
