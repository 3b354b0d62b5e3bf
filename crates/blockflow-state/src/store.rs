//! Client-side cache of the block and flow collections.

use std::collections::HashMap;
use std::sync::Arc;

use blockflow_core::{
    Block, BlockflowError, Flow, FlowPrompt, Inputs, NewBlock, NewFlow, PendingFlow, Resource,
    ResourceApi, ResourceKind, Result,
};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::subscription::{Change, EventBus, StoreEvent};

/// Cached state of one collection's list.
#[derive(Debug)]
struct ListEntry<T> {
    /// Last successfully fetched value; `None` until the first load.
    value: Option<Vec<T>>,

    /// Set by invalidation, cleared by a fetch that started after it.
    stale: bool,

    /// Bumped on every invalidation.
    generation: u64,

    /// Number of list fetches currently running.
    in_flight: usize,

    /// Error from the most recent fetch, cleared by the next success.
    last_error: Option<BlockflowError>,
}

impl<T> Default for ListEntry<T> {
    fn default() -> Self {
        Self {
            value: None,
            stale: true,
            generation: 0,
            in_flight: 0,
            last_error: None,
        }
    }
}

/// Snapshot returned by [`CollectionStore::list`].
#[derive(Debug, Clone, PartialEq)]
pub struct ListView<T> {
    /// Last known items, empty before the first successful load.
    pub items: Vec<T>,

    /// True once any fetch has succeeded.
    pub loaded: bool,

    /// True while a fetch is running.
    pub is_loading: bool,

    /// True if the value predates the latest invalidation.
    pub is_stale: bool,

    /// Error from the most recent fetch.
    pub error: Option<BlockflowError>,

    /// Number of invalidations so far.
    pub generation: u64,
}

impl<T: Clone> ListView<T> {
    fn of(entry: &ListEntry<T>) -> Self {
        Self {
            items: entry.value.clone().unwrap_or_default(),
            loaded: entry.value.is_some(),
            is_loading: entry.in_flight > 0,
            is_stale: entry.stale,
            error: entry.last_error.clone(),
            generation: entry.generation,
        }
    }
}

/// One cached collection: the list plus point reads keyed by id.
#[derive(Debug)]
pub struct Collection<T> {
    list: RwLock<ListEntry<T>>,
    items: RwLock<HashMap<String, T>>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            list: RwLock::new(ListEntry::default()),
            items: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Cached> Collection<T> {
    /// Mark the list stale, keeping its value. Returns the new generation.
    async fn invalidate(&self) -> u64 {
        let mut entry = self.list.write().await;
        entry.stale = true;
        entry.generation += 1;
        entry.generation
    }

    /// Record the start of a fetch; returns the generation it belongs to.
    async fn begin_fetch(&self) -> u64 {
        let mut entry = self.list.write().await;
        entry.in_flight += 1;
        entry.generation
    }

    async fn finish_fetch(&self, generation: u64, result: &Result<Vec<T>>) {
        let mut entry = self.list.write().await;
        entry.in_flight = entry.in_flight.saturating_sub(1);

        // A fetch that began before an invalidation cannot clear it.
        if entry.generation == generation {
            entry.stale = false;
        }

        match result {
            Ok(items) => {
                // Lock order: list, then items.
                let mut by_id = self.items.write().await;
                let merged = items
                    .iter()
                    .map(|item| merge_into(&mut by_id, item.clone()))
                    .collect();
                entry.value = Some(merged);
                entry.last_error = None;
            }
            Err(e) => entry.last_error = Some(e.clone()),
        }
    }

    /// Fold a fetched item into every cached copy; returns the merged value.
    async fn put(&self, item: T) -> T {
        let mut list = self.list.write().await;
        let merged = merge_into(&mut *self.items.write().await, item);
        if let Some(slot) = list
            .value
            .as_mut()
            .and_then(|items| items.iter_mut().find(|i| i.id() == merged.id()))
        {
            *slot = merged.clone();
        }
        merged
    }
}

fn merge_into<T: Cached>(by_id: &mut HashMap<String, T>, fetched: T) -> T {
    match by_id.get_mut(fetched.id()) {
        Some(cached) => {
            T::merge(cached, fetched);
            cached.clone()
        }
        None => {
            by_id.insert(fetched.id().to_string(), fetched.clone());
            fetched
        }
    }
}

/// The two collections, shared with background fetch tasks.
#[derive(Debug, Default)]
pub struct Collections {
    blocks: Arc<Collection<Block>>,
    flows: Arc<Collection<Flow>>,
}

/// Resources the store knows how to cache.
pub trait Cached: Resource {
    fn collection(collections: &Collections) -> &Arc<Collection<Self>>;

    /// Fold a newer fetch into the cached copy. Replaces it by default.
    fn merge(cached: &mut Self, fetched: Self) {
        *cached = fetched;
    }
}

impl Cached for Block {
    fn collection(collections: &Collections) -> &Arc<Collection<Self>> {
        &collections.blocks
    }
}

impl Cached for Flow {
    fn collection(collections: &Collections) -> &Arc<Collection<Self>> {
        &collections.flows
    }

    /// Observed messages are never dropped by a shorter fetch.
    fn merge(cached: &mut Self, fetched: Self) {
        cached.absorb(fetched);
    }
}

/// Cache of the block and flow collections over a [`ResourceApi`].
///
/// Lists are stale-while-revalidate: [`list`](Self::list) never waits on the
/// network. Creates invalidate their collection's list on success and leave
/// the cache untouched on failure. Nothing is retried.
pub struct CollectionStore<A: ?Sized> {
    api: Arc<A>,
    collections: Arc<Collections>,
    events: EventBus,
}

impl<A: ?Sized> Clone for CollectionStore<A> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            collections: self.collections.clone(),
            events: self.events.clone(),
        }
    }
}

impl<A> CollectionStore<A>
where
    A: ResourceApi + ?Sized + 'static,
{
    /// Create an empty store over `api`.
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            collections: Arc::new(Collections::default()),
            events: EventBus::new(),
        }
    }

    /// The underlying resource API.
    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    /// Subscribe to change events.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Current list value, starting a background fetch if it is missing or stale.
    pub async fn list<T: Cached>(&self) -> ListView<T> {
        let collection = T::collection(&self.collections).clone();

        let (view, generation) = {
            let mut entry = collection.list.write().await;
            // Nothing cached yet: keep trying, even after a failed load.
            let start = (entry.stale || entry.value.is_none()) && entry.in_flight == 0;
            if start {
                entry.in_flight += 1;
            }
            let view = ListView::of(&entry);
            (view, start.then_some(entry.generation))
        };

        if let Some(generation) = generation {
            debug!(kind = %T::KIND, generation, "Revalidating list in background");
            let api = self.api.clone();
            let events = self.events.clone();
            tokio::spawn(async move {
                let result = T::fetch_all(&*api).await;
                collection.finish_fetch(generation, &result).await;
                publish_load(&events, T::KIND, &result);
            });
        }

        view
    }

    /// Fetch the list now and wait for the result.
    pub async fn fetch_list<T: Cached>(&self) -> Result<Vec<T>> {
        let collection = T::collection(&self.collections);
        let generation = collection.begin_fetch().await;

        let result = T::fetch_all(&*self.api).await;
        collection.finish_fetch(generation, &result).await;
        publish_load(&self.events, T::KIND, &result);

        result
    }

    /// Point read: the cached item if known, otherwise fetched and cached.
    pub async fn get<T: Cached>(&self, id: &str) -> Result<T> {
        let collection = T::collection(&self.collections);

        if let Some(item) = collection.items.read().await.get(id) {
            return Ok(item.clone());
        }

        self.refresh::<T>(id).await
    }

    /// Re-fetch one item and fold it into every cached copy of it.
    pub async fn refresh<T: Cached>(&self, id: &str) -> Result<T> {
        let fetched = T::fetch_one(&*self.api, id).await?;
        let item = T::collection(&self.collections).put(fetched).await;
        self.events.publish(
            T::KIND,
            Change::Refreshed {
                id: item.id().to_string(),
            },
        );
        Ok(item)
    }

    /// Mark a collection's list stale so the next read re-fetches it.
    pub async fn invalidate(&self, kind: ResourceKind) {
        let generation = match kind {
            ResourceKind::Blocks => self.collections.blocks.invalidate().await,
            ResourceKind::Flows => self.collections.flows.invalidate().await,
        };
        debug!(%kind, generation, "List invalidated");
        self.events.publish(kind, Change::Invalidated);
    }

    async fn created<T: Cached>(&self, item: T) -> T {
        info!(kind = %T::KIND, id = item.id(), "Resource created");
        T::collection(&self.collections)
            .items
            .write()
            .await
            .insert(item.id().to_string(), item.clone());
        self.events.publish(
            T::KIND,
            Change::Created {
                id: item.id().to_string(),
            },
        );
        self.invalidate(T::KIND).await;
        item
    }

    /// Create a block. The blocks list is invalidated only on success.
    pub async fn create_block(&self, block: &NewBlock) -> Result<Block> {
        let created = self.api.create_block(block).await?;
        Ok(self.created(created).await)
    }

    /// Create a flow from an explicit definition.
    pub async fn create_flow(&self, flow: &NewFlow) -> Result<Flow> {
        let created = self.api.create_flow(flow).await?;
        Ok(self.created(created).await)
    }

    /// Synthesize and start a flow from a prompt.
    pub async fn create_flow_from_prompt(&self, prompt: &FlowPrompt) -> Result<Flow> {
        let created = self.api.create_flow_from_prompt(prompt).await?;
        Ok(self.created(created).await)
    }

    /// Run an existing flow. Its status changes, so the flows list goes stale.
    pub async fn execute_flow(&self, id: &str, initial_inputs: &Inputs) -> Result<Flow> {
        let flow = self.api.execute_flow(id, initial_inputs).await?;
        self.invalidate(ResourceKind::Flows).await;
        Ok(flow)
    }

    /// Resume a waiting flow with additional inputs.
    pub async fn continue_flow(&self, id: &str, inputs: &Inputs) -> Result<Flow> {
        let flow = self.api.continue_flow(id, inputs).await?;
        if flow.id == id {
            self.collections.flows.put(flow.clone()).await;
        }
        self.invalidate(ResourceKind::Flows).await;
        Ok(flow)
    }

    /// Flows currently awaiting input. Not cached.
    pub async fn pending(&self) -> Result<Vec<PendingFlow>> {
        self.api.list_pending().await
    }
}

fn publish_load<T>(events: &EventBus, kind: ResourceKind, result: &Result<Vec<T>>) {
    match result {
        Ok(items) => events.publish(kind, Change::Loaded { count: items.len() }),
        Err(e) => {
            warn!(%kind, error = %e, "List fetch failed");
            events.publish(
                kind,
                Change::LoadFailed {
                    message: e.user_message(),
                    status: e.status(),
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{flow, FakeApi};
    use blockflow_core::{ApiError, Message};

    fn store() -> (Arc<FakeApi>, CollectionStore<FakeApi>) {
        let api = Arc::new(FakeApi::new());
        (api.clone(), CollectionStore::new(api))
    }

    #[tokio::test]
    async fn test_list_returns_immediately_then_revalidates() {
        let (api, store) = store();
        api.seed_block("Existing", "https://e.test", "open");

        let first = store.list::<Block>().await;
        assert!(!first.loaded);
        assert!(first.is_loading);
        assert!(first.items.is_empty());

        let mut events = store.subscribe();
        // The background fetch may already have finished; wait for it if not.
        if store.list::<Block>().await.is_loading {
            let event = events.recv().await.unwrap();
            assert_eq!(event.change, Change::Loaded { count: 1 });
        }

        let second = store.list::<Block>().await;
        assert!(second.loaded);
        assert!(!second.is_stale);
        assert_eq!(second.items[0].name, "Existing");
        assert_eq!(api.calls().list_blocks, 1);
    }

    #[tokio::test]
    async fn test_fresh_list_is_not_refetched() {
        let (api, store) = store();
        store.fetch_list::<Block>().await.unwrap();

        for _ in 0..3 {
            let view = store.list::<Block>().await;
            assert!(!view.is_loading);
        }
        assert_eq!(api.calls().list_blocks, 1);
    }

    #[tokio::test]
    async fn test_create_invalidates_once_and_next_read_sees_item() {
        let (api, store) = store();
        store.fetch_list::<Block>().await.unwrap();
        let before = store.list::<Block>().await;

        let block = store
            .create_block(&NewBlock::new("Login", "https://x.test", "click,submit"))
            .await
            .unwrap();
        assert!(!block.id.is_empty());

        let after = store.list::<Block>().await;
        assert_eq!(after.generation, before.generation + 1);
        assert!(after.is_stale);

        let items = store.fetch_list::<Block>().await.unwrap();
        let found = items.iter().find(|b| b.id == block.id).unwrap();
        assert_eq!(found.name, "Login");
        assert_eq!(found.url, "https://x.test");
        assert_eq!(found.actions, "click,submit");
        assert_eq!(api.calls().list_blocks, 2);
    }

    #[tokio::test]
    async fn test_failed_create_leaves_list_untouched() {
        let (api, store) = store();
        api.seed_block("Existing", "https://e.test", "open");
        store.fetch_list::<Block>().await.unwrap();
        let before = store.list::<Block>().await;

        api.fail_next_create(ApiError::new("name required", 422));
        let err = store
            .create_block(&NewBlock::new("", "https://x.test", "click"))
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "name required");
        assert_eq!(err.status(), Some(422));
        assert_eq!(store.list::<Block>().await, before);
        assert_eq!(api.calls().list_blocks, 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_value() {
        let (api, store) = store();
        api.seed_block("Existing", "https://e.test", "open");
        store.fetch_list::<Block>().await.unwrap();

        api.fail_lists(true);
        store.invalidate(ResourceKind::Blocks).await;
        assert!(store.fetch_list::<Block>().await.is_err());

        let view = store.list::<Block>().await;
        assert_eq!(view.items.len(), 1);
        assert!(view.error.is_some());
    }

    #[tokio::test]
    async fn test_failed_first_load_is_retried_by_next_read() {
        let (api, store) = store();
        api.seed_block("Existing", "https://e.test", "open");

        api.fail_lists(true);
        assert!(store.fetch_list::<Block>().await.is_err());
        api.fail_lists(false);

        let mut events = store.subscribe();
        let view = store.list::<Block>().await;
        assert!(!view.loaded);
        assert!(view.is_loading);

        let event = events.recv().await.unwrap();
        assert_eq!(event.change, Change::Loaded { count: 1 });

        let view = store.list::<Block>().await;
        assert!(view.loaded);
        assert!(view.error.is_none());
        assert_eq!(view.items[0].name, "Existing");
        assert_eq!(api.calls().list_blocks, 2);
    }

    #[tokio::test]
    async fn test_shorter_fetch_never_truncates_cached_thread() {
        let (api, store) = store();
        let m = |i: usize| Message::assistant(format!("m{i}"));
        api.seed_flow(flow("f1", "pending_input", vec![m(0), m(1)]));
        store.fetch_list::<Flow>().await.unwrap();

        api.script("f1", vec![flow("f1", "pending_input", vec![m(0)])]);
        let refreshed: Flow = store.refresh("f1").await.unwrap();
        assert_eq!(refreshed.messages.to_vec(), vec![m(0), m(1)]);

        let cached: Flow = store.get("f1").await.unwrap();
        assert_eq!(cached.messages.len(), 2);
        assert_eq!(store.list::<Flow>().await.items[0].messages.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_started_before_invalidation_stays_stale() {
        let (_api, store) = store();
        let collection = Block::collection(&store.collections).clone();

        let generation = collection.begin_fetch().await;
        store.invalidate(ResourceKind::Blocks).await;
        collection.finish_fetch(generation, &Ok(Vec::new())).await;

        assert!(store.list::<Block>().await.is_stale);
    }

    #[tokio::test]
    async fn test_point_read_uses_cache() {
        let (api, store) = store();
        let id = api.seed_block("Cached", "https://c.test", "go");

        let first: Block = store.get(&id).await.unwrap();
        let second: Block = store.get(&id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(api.calls().get_block, 1);
    }

    #[tokio::test]
    async fn test_prompt_create_invalidates_flows_only() {
        let (_api, store) = store();
        store.fetch_list::<Block>().await.unwrap();
        store.fetch_list::<Flow>().await.unwrap();

        let flow = store
            .create_flow_from_prompt(&FlowPrompt::new("summarize top HN stories").unwrap())
            .await
            .unwrap();

        assert!(store.list::<Flow>().await.is_stale);
        assert!(!store.list::<Block>().await.is_stale);
        let flows = store.fetch_list::<Flow>().await.unwrap();
        assert!(flows.iter().any(|f| f.id == flow.id));
    }
}
