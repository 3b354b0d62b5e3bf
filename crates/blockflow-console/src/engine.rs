//! Command execution and change rendering.

use std::collections::HashSet;

use blockflow_core::{Block, Flow, ResourceApi, ResourceKind, Result};
use blockflow_state::{Change, Selection, StoreEvent};
use futures::future::join;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::commands::{Command, HELP};
use crate::render;
use crate::state::AppState;

/// What the loop should do after a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Print(String),
    Quit,
}

/// How much of the selected flow is already on screen.
#[derive(Debug, Default)]
struct Shown {
    flow_id: Option<String>,
    messages: usize,
    pending: bool,
}

impl Shown {
    fn of(flow: &Flow) -> Self {
        Self {
            flow_id: Some(flow.id.clone()),
            messages: flow.messages.len(),
            pending: flow.is_pending(),
        }
    }
}

/// Runs commands against the store and poller and renders their results.
pub struct Engine<A: ResourceApi + ?Sized + 'static> {
    state: AppState<A>,
    shown: Mutex<Shown>,
    /// Lists requested while unloaded or refreshing; printed on the next load.
    awaiting: Mutex<HashSet<ResourceKind>>,
}

impl<A: ResourceApi + ?Sized + 'static> Engine<A> {
    pub fn new(state: AppState<A>) -> Self {
        Self {
            state,
            shown: Mutex::new(Shown::default()),
            awaiting: Mutex::new(HashSet::new()),
        }
    }

    pub fn state(&self) -> &AppState<A> {
        &self.state
    }

    /// Execute one command. Failures are rendered, never returned.
    pub async fn handle(&self, command: Command) -> Step {
        debug!(?command, "Handling command");
        match self.dispatch(command).await {
            Ok(step) => step,
            Err(e) => {
                warn!(error = %e, "Command failed");
                Step::Print(render::error(&e))
            }
        }
    }

    async fn dispatch(&self, command: Command) -> Result<Step> {
        let output = match command {
            Command::Blocks => self.show_list(ResourceKind::Blocks).await,
            Command::Flows => self.show_list(ResourceKind::Flows).await,
            Command::Refresh => self.refresh().await,
            Command::Select(id) => {
                self.state.poller.select_id(Some(&id)).await?;
                match self.state.poller.selected() {
                    Some(flow) => self.show_thread(&flow).await,
                    None => render::NO_SELECTION.to_string(),
                }
            }
            Command::Deselect => {
                self.state.poller.select(None).await;
                *self.shown.lock().await = Shown::default();
                render::NO_SELECTION.to_string()
            }
            Command::Prompt(text) => {
                let flow = self.state.poller.submit_prompt(&text).await?;
                info!(flow = %flow.id, "Flow created from prompt");
                self.show_thread(&flow).await
            }
            Command::NewBlock(block) => {
                block.validate()?;
                let created = self.state.store.create_block(&block).await?;
                format!("Created block {} ({})", created.name, created.id)
            }
            Command::Pending => render::pending(&self.state.store.pending().await?),
            Command::Continue(inputs) => {
                let flow = self.state.poller.continue_selected(&inputs).await?;
                format!("Inputs sent to {}", flow.id)
            }
            Command::Execute { id, inputs } => {
                let flow = self.state.store.execute_flow(&id, &inputs).await?;
                format!("Executed {}: {}", flow.id, flow.status)
            }
            Command::Dashboard => match self.state.dashboard.load().await {
                Ok(dashboard) => render::dashboard(&dashboard),
                Err(e) => {
                    warn!(error = %e, "Dashboard load failed");
                    render::DASHBOARD_FAILED.to_string()
                }
            },
            Command::Help => HELP.to_string(),
            Command::Quit => return Ok(Step::Quit),
        };
        Ok(Step::Print(output))
    }

    async fn render_list(&self, kind: ResourceKind) -> (String, bool) {
        match kind {
            ResourceKind::Blocks => {
                let view = self.state.store.list::<Block>().await;
                (render::blocks(&view), view.is_loading)
            }
            ResourceKind::Flows => {
                let view = self.state.store.list::<Flow>().await;
                (render::flows(&view), view.is_loading)
            }
        }
    }

    /// Current value now; a fresh copy follows when a running fetch lands.
    async fn show_list(&self, kind: ResourceKind) -> String {
        let (output, loading) = self.render_list(kind).await;
        if loading {
            self.awaiting.lock().await.insert(kind);
        }
        output
    }

    async fn refresh(&self) -> String {
        let (blocks, flows) = join(
            self.state.store.fetch_list::<Block>(),
            self.state.store.fetch_list::<Flow>(),
        )
        .await;

        let mut lines = Vec::with_capacity(2);
        for (kind, result) in [
            (ResourceKind::Blocks, blocks.map(|_| ())),
            (ResourceKind::Flows, flows.map(|_| ())),
        ] {
            lines.push(match result {
                Ok(()) => self.render_list(kind).await.0,
                Err(e) => render::error(&e),
            });
        }
        lines.join("\n")
    }

    async fn show_thread(&self, flow: &Flow) -> String {
        *self.shown.lock().await = Shown::of(flow);
        render::thread(flow)
    }

    /// Render what changed in the selection since it was last shown.
    pub async fn on_selection(&self, selection: &Selection) -> Option<String> {
        let mut shown = self.shown.lock().await;

        let Some(flow) = &selection.flow else {
            if shown.flow_id.take().is_some() {
                *shown = Shown::default();
                return Some(render::NO_SELECTION.to_string());
            }
            return None;
        };

        if shown.flow_id.as_deref() != Some(flow.id.as_str()) {
            *shown = Shown::of(flow);
            return Some(render::thread(flow));
        }

        let mut lines: Vec<String> = flow
            .messages
            .iter()
            .skip(shown.messages)
            .map(render::message)
            .collect();
        if flow.is_pending() != shown.pending {
            lines.push(render::status_change(flow));
        }
        *shown = Shown::of(flow);

        (!lines.is_empty()).then(|| lines.join("\n"))
    }

    /// Render a store event if a list was waiting on it.
    pub async fn on_event(&self, event: StoreEvent) -> Option<String> {
        match event.change {
            Change::Loaded { .. } => {
                if !self.awaiting.lock().await.remove(&event.kind) {
                    return None;
                }
                Some(self.render_list(event.kind).await.0)
            }
            Change::LoadFailed { message, .. } => {
                if !self.awaiting.lock().await.remove(&event.kind) {
                    return None;
                }
                Some(render::error_message(&message))
            }
            Change::Invalidated | Change::Created { .. } | Change::Refreshed { .. } => None,
        }
    }
}
