//! Flow polling controller.
//!
//! Holds the currently selected flow and, while that flow is waiting for
//! input, re-fetches it on a fixed interval. Selection changes, [`FlowPoller::stop`]
//! and dropping the poller all cancel the running poll task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use blockflow_core::{BlockflowError, Flow, FlowPrompt, Inputs, ResourceApi, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::store::CollectionStore;

/// Interval between refreshes of a pending flow.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Polling state of the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    /// No flow selected.
    None,
    /// Selected flow is not waiting for input; no polling.
    Active,
    /// Selected flow is `pending_input`; polling.
    Waiting,
}

/// The selected-flow slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// The locally held copy of the selected flow.
    pub flow: Option<Flow>,

    /// Bumped on every selection change; stale poll results are dropped.
    pub generation: u64,
}

impl Selection {
    pub fn state(&self) -> PollState {
        match &self.flow {
            None => PollState::None,
            Some(flow) if flow.is_pending() => PollState::Waiting,
            Some(_) => PollState::Active,
        }
    }
}

/// Keeps the selected flow fresh while it awaits input.
pub struct FlowPoller<A: ResourceApi + ?Sized + 'static> {
    store: CollectionStore<A>,
    period: Duration,
    selection: Arc<watch::Sender<Selection>>,
    task: Mutex<Option<JoinHandle<()>>>,
    polls: Arc<AtomicU64>,
}

impl<A: ResourceApi + ?Sized + 'static> FlowPoller<A> {
    /// Create a poller with the default 2 second interval.
    pub fn new(store: CollectionStore<A>) -> Self {
        Self::with_interval(store, DEFAULT_POLL_INTERVAL)
    }

    /// Create a poller with a custom interval.
    pub fn with_interval(store: CollectionStore<A>, period: Duration) -> Self {
        let (sender, _) = watch::channel(Selection::default());
        Self {
            store,
            period,
            selection: Arc::new(sender),
            task: Mutex::new(None),
            polls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Watch the selection slot.
    pub fn subscribe(&self) -> watch::Receiver<Selection> {
        self.selection.subscribe()
    }

    /// Current selection.
    pub fn selected(&self) -> Option<Flow> {
        self.selection.borrow().flow.clone()
    }

    /// Current polling state.
    pub fn state(&self) -> PollState {
        self.selection.borrow().state()
    }

    /// Number of poll requests issued so far.
    pub fn poll_count(&self) -> u64 {
        self.polls.load(Ordering::SeqCst)
    }

    /// Replace the selection and start or stop polling accordingly.
    pub async fn select(&self, flow: Option<Flow>) -> PollState {
        let mut task = self.task.lock().await;
        if let Some(handle) = task.take() {
            handle.abort();
        }

        let pending_id = flow.as_ref().filter(|f| f.is_pending()).map(|f| f.id.clone());
        let selected_id = flow.as_ref().map(|f| f.id.clone());

        let mut generation = 0;
        self.selection.send_modify(|sel| {
            sel.generation += 1;
            sel.flow = flow;
            generation = sel.generation;
        });

        let state = match (&selected_id, &pending_id) {
            (None, _) => PollState::None,
            (Some(_), None) => PollState::Active,
            (Some(_), Some(_)) => PollState::Waiting,
        };
        info!(flow = selected_id.as_deref().unwrap_or("-"), ?state, "Flow selected");

        if let Some(id) = pending_id {
            *task = Some(tokio::spawn(poll_loop(
                self.store.clone(),
                self.selection.clone(),
                self.polls.clone(),
                id,
                generation,
                self.period,
            )));
        }

        state
    }

    /// Select a flow by id, using the cached copy when there is one.
    pub async fn select_id(&self, id: Option<&str>) -> Result<PollState> {
        let flow = match id {
            Some(id) => Some(self.store.get::<Flow>(id).await?),
            None => None,
        };
        Ok(self.select(flow).await)
    }

    /// Create a flow from a prompt and make it the selection.
    pub async fn submit_prompt(&self, prompt: &str) -> Result<Flow> {
        let prompt = FlowPrompt::new(prompt)?;
        let flow = self.store.create_flow_from_prompt(&prompt).await?;
        self.select(Some(flow.clone())).await;
        Ok(flow)
    }

    /// Send inputs to the selected flow and fold the answer into the selection.
    pub async fn continue_selected(&self, inputs: &Inputs) -> Result<Flow> {
        let (current, generation) = {
            let sel = self.selection.borrow();
            let flow = sel.flow.clone().ok_or(BlockflowError::NotSelected)?;
            (flow, sel.generation)
        };

        let answer = self.store.continue_flow(&current.id, inputs).await?;
        if answer.id != current.id {
            // Backend answered with an execution record; keep the flow selected.
            return Ok(answer);
        }

        let mut merged = current;
        merged.absorb(answer);

        if self.selection.borrow().generation == generation {
            self.select(Some(merged.clone())).await;
        }
        Ok(merged)
    }

    /// Cancel polling without touching the selection.
    pub async fn stop(&self) {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
            debug!("Polling stopped");
        }
    }
}

impl<A: ResourceApi + ?Sized + 'static> Drop for FlowPoller<A> {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

/// Refresh `id` once per tick until it leaves `pending_input` or is deselected.
///
/// Each request is awaited before the next tick is taken, so at most one poll
/// is in flight; ticks missed during a slow request are skipped.
async fn poll_loop<A: ResourceApi + ?Sized + 'static>(
    store: CollectionStore<A>,
    selection: Arc<watch::Sender<Selection>>,
    polls: Arc<AtomicU64>,
    id: String,
    generation: u64,
    period: Duration,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        polls.fetch_add(1, Ordering::SeqCst);

        let fetched = match store.refresh::<Flow>(&id).await {
            Ok(flow) => flow,
            Err(e) => {
                warn!(flow = %id, error = %e, "Poll failed; retrying on next tick");
                continue;
            }
        };

        let mut still_pending = false;
        let applied = selection.send_if_modified(|sel| {
            if sel.generation != generation {
                return false;
            }
            match sel.flow.as_mut() {
                Some(current) if current.id == fetched.id => {
                    current.absorb(fetched);
                    still_pending = current.is_pending();
                    true
                }
                _ => false,
            }
        });

        if !applied {
            debug!(flow = %id, "Selection changed; dropping poll result");
            break;
        }
        if !still_pending {
            info!(flow = %id, "Flow no longer pending; polling stopped");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{flow, FakeApi};
    use blockflow_core::Message;

    fn poller() -> (Arc<FakeApi>, FlowPoller<FakeApi>) {
        let api = Arc::new(FakeApi::new());
        let store = CollectionStore::new(api.clone());
        (api, FlowPoller::new(store))
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_flow_polls_once_per_tick() {
        let (api, poller) = poller();
        let f = flow("f1", "pending_input", vec![]);
        api.seed_flow(f.clone());

        assert_eq!(poller.select(Some(f)).await, PollState::Waiting);

        tokio::time::sleep(ms(100)).await;
        assert_eq!(api.calls().get_flow, 0);

        tokio::time::sleep(ms(6000)).await;
        assert_eq!(api.calls().get_flow, 3);
        assert_eq!(api.calls().max_in_flight_gets, 1);
        assert_eq!(poller.state(), PollState::Waiting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deselect_stops_polling() {
        let (api, poller) = poller();
        let f = flow("f1", "pending_input", vec![]);
        api.seed_flow(f.clone());

        poller.select(Some(f)).await;
        tokio::time::sleep(ms(2100)).await;
        assert_eq!(api.calls().get_flow, 1);

        assert_eq!(poller.select(None).await, PollState::None);
        tokio::time::sleep(ms(10_000)).await;
        assert_eq!(api.calls().get_flow, 1);
        assert!(poller.selected().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_selecting_another_flow_moves_polling() {
        let (api, poller) = poller();
        let a = flow("a", "pending_input", vec![]);
        let b = flow("b", "completed", vec![]);
        api.seed_flow(a.clone());
        api.seed_flow(b.clone());

        poller.select(Some(a)).await;
        tokio::time::sleep(ms(2100)).await;
        assert_eq!(poller.select(Some(b)).await, PollState::Active);

        tokio::time::sleep(ms(10_000)).await;
        assert_eq!(api.calls().get_flow, 1);
        assert_eq!(poller.selected().unwrap().id, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_leaving_pending_stops_polling() {
        let (api, poller) = poller();
        let f = flow("f1", "pending_input", vec![]);
        api.seed_flow(f.clone());
        api.script(
            "f1",
            vec![
                flow("f1", "pending_input", vec![]),
                flow("f1", "completed", vec![]),
            ],
        );

        poller.select(Some(f)).await;
        tokio::time::sleep(ms(20_000)).await;

        assert_eq!(api.calls().get_flow, 2);
        assert_eq!(poller.state(), PollState::Active);
        assert_eq!(poller.poll_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_messages_extend_in_order() {
        let (api, poller) = poller();
        let m = |i: usize| Message::assistant(format!("m{i}"));
        let f = flow("f1", "pending_input", vec![m(0), m(1)]);
        api.seed_flow(f.clone());
        api.script(
            "f1",
            vec![
                flow("f1", "pending_input", vec![m(0), m(1), m(2)]),
                // A truncated answer must not shrink the thread.
                flow("f1", "pending_input", vec![m(0)]),
                flow("f1", "completed", vec![m(0), m(1), m(2), m(3)]),
            ],
        );
        let mut rx = poller.subscribe();

        poller.select(Some(f)).await;

        tokio::time::sleep(ms(2100)).await;
        let after_first: Vec<_> = rx.borrow_and_update().flow.clone().unwrap().messages.to_vec();
        assert_eq!(after_first, vec![m(0), m(1), m(2)]);

        tokio::time::sleep(ms(2000)).await;
        assert_eq!(poller.selected().unwrap().messages.len(), 3);

        tokio::time::sleep(ms(2000)).await;
        let done = poller.selected().unwrap();
        assert_eq!(done.messages.to_vec(), vec![m(0), m(1), m(2), m(3)]);
        assert!(!done.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reselect_keeps_observed_messages() {
        let (api, poller) = poller();
        let m = |i: usize| Message::assistant(format!("m{i}"));
        api.seed_flow(flow("f1", "pending_input", vec![m(0), m(1)]));
        poller.store.fetch_list::<Flow>().await.unwrap();

        poller.select_id(Some("f1")).await.unwrap();
        assert_eq!(poller.selected().unwrap().messages.len(), 2);

        api.script("f1", vec![flow("f1", "pending_input", vec![m(0)])]);
        tokio::time::sleep(ms(2100)).await;
        assert_eq!(api.calls().get_flow, 1);
        assert_eq!(poller.selected().unwrap().messages.len(), 2);

        poller.select(None).await;
        poller.select_id(Some("f1")).await.unwrap();
        assert_eq!(poller.selected().unwrap().messages.to_vec(), vec![m(0), m(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_responses_never_overlap() {
        let (api, poller) = poller();
        let f = flow("f1", "pending_input", vec![]);
        api.seed_flow(f.clone());
        api.delay_gets(ms(5000));

        poller.select(Some(f)).await;
        tokio::time::sleep(ms(30_000)).await;

        let calls = api.calls();
        assert!(calls.get_flow >= 2);
        assert_eq!(calls.max_in_flight_gets, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_errors_do_not_stop_polling() {
        let (api, poller) = poller();
        // Not seeded: every get is a 404.
        let f = flow("ghost", "pending_input", vec![]);

        poller.select(Some(f)).await;
        tokio::time::sleep(ms(4100)).await;

        assert_eq!(api.calls().get_flow, 2);
        assert_eq!(poller.state(), PollState::Waiting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_prompt_selects_and_polls() {
        let (api, poller) = poller();

        let created = poller.submit_prompt("summarize top HN stories").await.unwrap();
        assert_eq!(poller.selected().unwrap().id, created.id);
        assert_eq!(poller.state(), PollState::Waiting);

        tokio::time::sleep(ms(2100)).await;
        assert_eq!(api.calls().get_flow, 1);
    }

    #[tokio::test]
    async fn test_blank_prompt_makes_no_call() {
        let (api, poller) = poller();

        let err = poller.submit_prompt("   ").await.unwrap_err();
        assert!(matches!(err, BlockflowError::Validation(_)));
        assert_eq!(api.calls().creates, 0);
        assert_eq!(poller.state(), PollState::None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_and_drop_cancel_polling() {
        let (api, poller) = poller();
        let f = flow("f1", "pending_input", vec![]);
        api.seed_flow(f.clone());

        poller.select(Some(f.clone())).await;
        poller.stop().await;
        tokio::time::sleep(ms(5000)).await;
        assert_eq!(api.calls().get_flow, 0);
        assert_eq!(poller.state(), PollState::Waiting);

        poller.select(Some(f)).await;
        drop(poller);
        tokio::time::sleep(ms(5000)).await;
        assert_eq!(api.calls().get_flow, 0);
    }

    #[tokio::test]
    async fn test_continue_without_selection() {
        let (_api, poller) = poller();
        let err = poller.continue_selected(&Inputs::new()).await.unwrap_err();
        assert_eq!(err, BlockflowError::NotSelected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_continue_selected_appends_and_keeps_polling() {
        let (api, poller) = poller();
        let f = flow("f1", "pending_input", vec![Message::assistant("need email")]);
        api.seed_flow(f.clone());
        poller.select(Some(f)).await;

        let mut inputs = Inputs::new();
        inputs.insert("email".into(), serde_json::json!("a@b.test"));
        let merged = poller.continue_selected(&inputs).await.unwrap();

        assert_eq!(merged.messages.len(), 2);
        assert_eq!(api.calls().continues, 1);
        assert_eq!(poller.state(), PollState::Waiting);
        assert_eq!(poller.selected().unwrap().messages.len(), 2);
    }
}
