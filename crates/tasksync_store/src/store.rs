//! The optimistic task store.

use crate::collection::TaskList;
use crate::error::{StoreError, StoreResult};
use crate::pending::{MutationKind, PendingLedger, PendingMutation};
use crate::task::{is_placeholder, ListResponse, Task, TaskFilter, TaskId, TaskInput, TaskPatch};
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use tasksync_transport::{HttpClient, Transport, TransportError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Collection resource of the REST surface.
pub const TASKS_PATH: &str = "/api/tasks";

fn task_path(id: TaskId) -> String {
    format!("{}/{}", TASKS_PATH, id)
}

/// Observable state of the store at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    /// Tasks, newest creates first.
    pub entities: Vec<Task>,
    /// True while at least one fetch is outstanding.
    pub loading: bool,
    /// Message of the last failed fetch.
    pub last_error: Option<String>,
    /// Number of writes awaiting the server.
    pub pending_mutations: usize,
}

#[derive(Debug, Default)]
struct StoreState {
    tasks: TaskList,
    pending: PendingLedger,
    fetches_in_flight: usize,
    last_error: Option<String>,
    version: u64,
}

impl StoreState {
    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            entities: self.tasks.as_slice().to_vec(),
            loading: self.fetches_in_flight > 0,
            last_error: self.last_error.clone(),
            pending_mutations: self.pending.len(),
        }
    }
}

/// Local view of the task collection, kept in step with the server.
///
/// Creates and updates show up locally before the server answers and are
/// reconciled with the server's copy or rolled back once it does. Deletes
/// wait for the server. The store never retries on its own; the transport
/// already has.
///
/// All state sits behind one lock that is never held across an `.await`, so
/// any number of operations may be in flight at once. Operations racing on
/// the same id are not ordered: whichever response lands last wins.
pub struct TaskStore<C: HttpClient> {
    transport: Transport<C>,
    state: RwLock<StoreState>,
    next_placeholder: AtomicI64,
    changes: watch::Sender<StoreSnapshot>,
    published: AtomicU64,
}

impl<C: HttpClient> TaskStore<C> {
    /// Creates an empty store over the given transport.
    pub fn new(transport: Transport<C>) -> Self {
        let (changes, _) = watch::channel(StoreSnapshot::default());
        Self {
            transport,
            state: RwLock::new(StoreState::default()),
            next_placeholder: AtomicI64::new(-1),
            changes,
            published: AtomicU64::new(0),
        }
    }

    /// Returns the transport.
    pub fn transport(&self) -> &Transport<C> {
        &self.transport
    }

    /// Returns the tasks in order.
    pub fn entities(&self) -> Vec<Task> {
        self.state.read().tasks.as_slice().to_vec()
    }

    /// Returns the task with `id`.
    pub fn get(&self, id: TaskId) -> Option<Task> {
        self.state.read().tasks.get(id).cloned()
    }

    /// Number of tasks held.
    pub fn count(&self) -> usize {
        self.state.read().tasks.len()
    }

    /// True while a fetch is outstanding.
    pub fn loading(&self) -> bool {
        self.state.read().fetches_in_flight > 0
    }

    /// Message of the last failed fetch, cleared when a new fetch starts.
    pub fn last_error(&self) -> Option<String> {
        self.state.read().last_error.clone()
    }

    /// Number of writes awaiting the server.
    pub fn pending_mutations(&self) -> usize {
        self.state.read().pending.len()
    }

    /// Number of writes of one kind awaiting the server.
    pub fn pending_of(&self, kind: MutationKind) -> usize {
        self.state.read().pending.count(kind)
    }

    /// Returns the current observable state.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.state.read().snapshot()
    }

    /// Subscribes to state changes. The receiver always holds the latest
    /// snapshot.
    ///
    /// Snapshots are published after the store's lock is released, so a
    /// subscriber may read the store while holding one. Holding a borrowed
    /// snapshot across a call that changes the store still blocks that call.
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.changes.subscribe()
    }

    /// Replaces the collection with the server's list.
    ///
    /// On failure the current collection is left alone and the message is
    /// recorded in [`last_error`](Self::last_error); the error is returned as
    /// well. Returns the number of tasks loaded.
    pub async fn fetch_all(&self, filter: &TaskFilter) -> StoreResult<usize> {
        let _loading = FetchGuard::start(self);

        let result = self
            .transport
            .get_json::<ListResponse>(TASKS_PATH, filter.to_options())
            .await
            .and_then(|list| {
                match list.data.iter().find(|task| task.id <= 0) {
                    Some(task) => Err(TransportError::Malformed(format!(
                        "server returned non-positive task id {}",
                        task.id
                    ))),
                    None => Ok(list.data),
                }
            });

        match result {
            Ok(tasks) => {
                let count = self.mutate(|state| {
                    state.tasks = TaskList::from_server(tasks);
                    state.tasks.len()
                });
                info!(count, "tasks loaded");
                Ok(count)
            }
            Err(err) => {
                let message = err.to_string();
                warn!(error = %message, "failed to load tasks");
                self.mutate(|state| state.last_error = Some(message));
                Err(err.into())
            }
        }
    }

    /// Creates a task.
    ///
    /// A provisional task with a negative placeholder id is put at the front
    /// right away. On success it is swapped in place for the server's task;
    /// on failure it is removed again.
    pub async fn create(&self, input: TaskInput) -> StoreResult<Task> {
        let placeholder = self.next_placeholder();
        let provisional = Task::provisional(placeholder, &input, Utc::now());
        self.mutate(|state| {
            state.tasks.prepend(provisional);
            state.pending.insert(placeholder, PendingMutation::Create);
        });
        let pending = PendingGuard::new(self, placeholder);
        debug!(placeholder, title = %input.title, "create issued");

        match self
            .transport
            .post_json::<_, Task>(TASKS_PATH, &input)
            .await
            .and_then(confirmed)
        {
            Ok(task) => {
                pending.confirm(Some(task.clone()));
                Ok(task)
            }
            Err(err) => {
                pending.rollback();
                Err(err.into())
            }
        }
    }

    /// Updates a task.
    ///
    /// The patch is applied locally first. On success the local task becomes
    /// exactly the server's copy; on failure the previous value is restored.
    pub async fn update(&self, id: TaskId, patch: TaskPatch) -> StoreResult<Task> {
        let placeholder = self.next_placeholder();
        self.try_mutate(|state| {
            let prior = state.tasks.get(id).cloned().ok_or(StoreError::NotFound(id))?;
            if is_placeholder(id) {
                return Err(StoreError::Unconfirmed(id));
            }
            state.tasks.replace(id, prior.patched(&patch, Utc::now()));
            state
                .pending
                .insert(placeholder, PendingMutation::Update { id, prior });
            Ok(())
        })?;
        let pending = PendingGuard::new(self, placeholder);
        debug!(id, placeholder, "update issued");

        match self
            .transport
            .patch_json::<_, Task>(&task_path(id), &patch)
            .await
            .and_then(confirmed)
            .and_then(|task| same_task(id, task))
        {
            Ok(task) => {
                pending.confirm(Some(task.clone()));
                Ok(task)
            }
            Err(err) => {
                pending.rollback();
                Err(err.into())
            }
        }
    }

    /// Deletes a task.
    ///
    /// The task stays visible until the server confirms the delete.
    pub async fn remove(&self, id: TaskId) -> StoreResult<()> {
        let placeholder = self.next_placeholder();
        self.try_mutate(|state| {
            if !state.tasks.contains(id) {
                return Err(StoreError::NotFound(id));
            }
            if is_placeholder(id) {
                return Err(StoreError::Unconfirmed(id));
            }
            state
                .pending
                .insert(placeholder, PendingMutation::Delete { id });
            Ok(())
        })?;
        let pending = PendingGuard::new(self, placeholder);
        debug!(id, placeholder, "delete issued");

        match self.transport.delete(&task_path(id)).await {
            Ok(()) => {
                pending.confirm(None);
                Ok(())
            }
            Err(err) => {
                pending.rollback();
                Err(err.into())
            }
        }
    }

    fn next_placeholder(&self) -> TaskId {
        self.next_placeholder.fetch_sub(1, Ordering::SeqCst)
    }

    /// Applies `f` to the state and publishes the result.
    fn mutate<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let (result, version, snapshot) = {
            let mut state = self.state.write();
            let result = f(&mut state);
            state.version += 1;
            (result, state.version, state.snapshot())
        };
        self.publish(version, snapshot);
        result
    }

    /// Like [`mutate`](Self::mutate), publishing only on success.
    fn try_mutate<R>(&self, f: impl FnOnce(&mut StoreState) -> StoreResult<R>) -> StoreResult<R> {
        let (result, version, snapshot) = {
            let mut state = self.state.write();
            let result = f(&mut state)?;
            state.version += 1;
            (result, state.version, state.snapshot())
        };
        self.publish(version, snapshot);
        Ok(result)
    }

    /// Sends `snapshot` unless a later one has already gone out.
    ///
    /// Called without the state lock held; the version keeps racing
    /// publishers from replacing a newer snapshot with an older one.
    fn publish(&self, version: u64, snapshot: StoreSnapshot) {
        self.changes.send_if_modified(|current| {
            if version <= self.published.load(Ordering::Acquire) {
                return false;
            }
            self.published.store(version, Ordering::Release);
            *current = snapshot;
            true
        });
    }
}

/// Rejects server tasks whose id could be mistaken for a placeholder.
fn confirmed(task: Task) -> Result<Task, TransportError> {
    if task.id > 0 {
        Ok(task)
    } else {
        Err(TransportError::Malformed(format!(
            "server returned non-positive task id {}",
            task.id
        )))
    }
}

/// Rejects a server task that is not the one that was patched.
fn same_task(id: TaskId, task: Task) -> Result<Task, TransportError> {
    if task.id == id {
        Ok(task)
    } else {
        Err(TransportError::Malformed(format!(
            "server answered update of task {} with task {}",
            id, task.id
        )))
    }
}

/// Marks a fetch as outstanding for its whole lifetime.
struct FetchGuard<'a, C: HttpClient> {
    store: &'a TaskStore<C>,
}

impl<'a, C: HttpClient> FetchGuard<'a, C> {
    fn start(store: &'a TaskStore<C>) -> Self {
        store.mutate(|state| {
            state.fetches_in_flight += 1;
            state.last_error = None;
        });
        Self { store }
    }
}

impl<C: HttpClient> Drop for FetchGuard<'_, C> {
    fn drop(&mut self) {
        self.store.mutate(|state| {
            state.fetches_in_flight = state.fetches_in_flight.saturating_sub(1);
        });
    }
}

/// Settles a ledger entry exactly once. Dropping it unsettled rolls back.
struct PendingGuard<'a, C: HttpClient> {
    store: &'a TaskStore<C>,
    placeholder: TaskId,
    settled: bool,
}

impl<'a, C: HttpClient> PendingGuard<'a, C> {
    fn new(store: &'a TaskStore<C>, placeholder: TaskId) -> Self {
        Self {
            store,
            placeholder,
            settled: false,
        }
    }

    fn confirm(mut self, task: Option<Task>) {
        self.settle(Some(task));
    }

    fn rollback(mut self) {
        self.settle(None);
    }

    fn settle(&mut self, outcome: Option<Option<Task>>) {
        if self.settled {
            return;
        }
        self.settled = true;
        let placeholder = self.placeholder;
        self.store.mutate(|state| {
            let Some(mutation) = state.pending.take(placeholder) else {
                return;
            };
            match outcome {
                Some(task) => mutation.resolve(placeholder, task, &mut state.tasks),
                None => mutation.rollback(placeholder, &mut state.tasks),
            }
        });
    }
}

impl<C: HttpClient> Drop for PendingGuard<'_, C> {
    fn drop(&mut self) {
        self.settle(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskPriority, TaskStatus};
    use std::sync::Arc;
    use std::time::Duration;
    use tasksync_mock::{MockConfig, MockTaskServer};
    use serde_json::json;
    use std::sync::atomic::AtomicBool;
    use tasksync_transport::{
        HttpRequest, HttpResponse, LoopbackClient, LoopbackServer, Method, TransportConfig,
    };

    type MockStore = TaskStore<LoopbackClient<MockTaskServer>>;

    fn store_for(server: &Arc<MockTaskServer>) -> MockStore {
        let transport = Transport::new(
            TransportConfig::new("http://localhost"),
            LoopbackClient::new(Arc::clone(server)),
        );
        TaskStore::new(transport)
    }

    fn seeded(count: usize) -> (Arc<MockTaskServer>, MockStore) {
        let server = Arc::new(MockTaskServer::seeded(count, MockConfig::instant()));
        let store = store_for(&server);
        (server, store)
    }

    #[tokio::test(start_paused = true)]
    async fn initial_state() {
        let (_, store) = seeded(3);
        assert!(store.entities().is_empty());
        assert!(!store.loading());
        assert_eq!(store.last_error(), None);
        assert_eq!(store.pending_mutations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_replaces_collection() {
        let (_, store) = seeded(3);
        assert_eq!(store.fetch_all(&TaskFilter::new()).await.unwrap(), 3);

        let ids: Vec<_> = store.entities().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(!store.loading());
        assert_eq!(store.count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_passes_filters() {
        let (server, store) = seeded(8);
        store
            .fetch_all(&TaskFilter::new().status(TaskStatus::Completed))
            .await
            .unwrap();

        assert!(store
            .entities()
            .iter()
            .all(|t| t.status == TaskStatus::Completed));
        let request = server.requests().pop().unwrap();
        assert_eq!(request.query, vec![("status".to_string(), "completed".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn loading_is_visible_while_fetching() {
        let server = Arc::new(MockTaskServer::seeded(
            2,
            MockConfig::instant().with_latency(Duration::from_millis(300), Duration::from_millis(300)),
        ));
        let store = store_for(&server);

        let filter = TaskFilter::new();
        let (result, during) = tokio::join!(store.fetch_all(&filter), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            store.loading()
        });

        result.unwrap();
        assert!(during);
        assert!(!store.loading());
    }

    #[tokio::test(start_paused = true)]
    async fn create_confirms_placeholder_in_place() {
        let (_, store) = seeded(2);
        store.fetch_all(&TaskFilter::new()).await.unwrap();

        let task = store
            .create(TaskInput::new("x").with_priority(TaskPriority::High))
            .await
            .unwrap();

        assert_eq!(task.id, 3);
        assert_eq!(task.priority, TaskPriority::High);
        let ids: Vec<_> = store.entities().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(store.pending_mutations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn update_of_missing_task_skips_server() {
        let (server, store) = seeded(2);
        store.fetch_all(&TaskFilter::new()).await.unwrap();
        let before = server.request_count();

        let err = store
            .update(42, TaskPatch::new().title("nope"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::NotFound(42)));
        assert_eq!(server.request_count(), before);
        assert_eq!(store.pending_mutations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn placeholder_cannot_be_updated_or_removed() {
        let server = Arc::new(MockTaskServer::seeded(
            1,
            MockConfig::instant().with_latency(Duration::from_millis(200), Duration::from_millis(200)),
        ));
        let store = store_for(&server);

        let (created, (update_err, remove_err)) = tokio::join!(
            store.create(TaskInput::new("slow")),
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let placeholder = store.entities()[0].id;
                assert!(is_placeholder(placeholder));
                (
                    store.update(placeholder, TaskPatch::new().title("y")).await,
                    store.remove(placeholder).await,
                )
            }
        );

        created.unwrap();
        assert!(matches!(update_err, Err(StoreError::Unconfirmed(_))));
        assert!(matches!(remove_err, Err(StoreError::Unconfirmed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_create_rolls_back() {
        let server = Arc::new(MockTaskServer::seeded(
            1,
            MockConfig::instant().with_latency(Duration::from_secs(5), Duration::from_secs(5)),
        ));
        let store = store_for(&server);
        store.fetch_all(&TaskFilter::new()).await.unwrap();
        let before = store.entities();

        let outcome = tokio::time::timeout(
            Duration::from_millis(100),
            store.create(TaskInput::new("abandoned")),
        )
        .await;

        assert!(outcome.is_err());
        assert_eq!(store.entities(), before);
        assert_eq!(store.pending_mutations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_fetch_releases_loading() {
        let server = Arc::new(MockTaskServer::seeded(
            2,
            MockConfig::instant().with_latency(Duration::from_secs(5), Duration::from_secs(5)),
        ));
        let store = store_for(&server);

        let outcome =
            tokio::time::timeout(Duration::from_millis(10), store.fetch_all(&TaskFilter::new()))
                .await;

        assert!(outcome.is_err());
        assert!(!store.loading());
        assert!(!store.snapshot().loading);
        assert!(store.entities().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_update_restores_prior_value() {
        let server = Arc::new(MockTaskServer::seeded(
            2,
            MockConfig::instant().with_latency(Duration::from_secs(5), Duration::from_secs(5)),
        ));
        let store = store_for(&server);
        store.fetch_all(&TaskFilter::new()).await.unwrap();
        let before = store.entities();

        let outcome = tokio::time::timeout(
            Duration::from_millis(100),
            store.update(1, TaskPatch::new().title("abandoned")),
        )
        .await;

        assert!(outcome.is_err());
        assert_eq!(store.entities(), before);
        assert_eq!(store.get(1).unwrap().title, "Seed 1");
        assert_eq!(store.pending_mutations(), 0);
    }

    /// Lists tasks 5 and 9, then answers every PATCH with task 9.
    struct WrongIdServer;

    fn wire_task(id: i64, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": format!("Task {id}"),
            "description": "",
            "status": status,
            "priority": "medium",
            "created_at": "2024-01-01T00:00:00.000Z",
            "updated_at": "2024-01-01T00:00:00.000Z",
        })
    }

    impl LoopbackServer for WrongIdServer {
        async fn handle(&self, request: HttpRequest) -> HttpResponse {
            let body = match request.method {
                Method::Get => json!({ "data": [wire_task(5, "pending"), wire_task(9, "pending")] }),
                _ => wire_task(9, "completed"),
            };
            HttpResponse::new(200, body.to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn update_answered_with_other_task_rolls_back() {
        let transport = Transport::new(
            TransportConfig::new("http://localhost"),
            LoopbackClient::new(Arc::new(WrongIdServer)),
        );
        let store = TaskStore::new(transport);
        store.fetch_all(&TaskFilter::new()).await.unwrap();
        let before = store.entities();

        let err = store
            .update(5, TaskPatch::new().status(TaskStatus::Completed))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::Transport(TransportError::Malformed(_))
        ));
        assert_eq!(store.entities(), before);
        let ids: Vec<_> = store.entities().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![5, 9]);
        assert_eq!(store.pending_mutations(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn subscriber_may_read_store_while_holding_snapshot() {
        let (_, store) = seeded(3);
        let store = Arc::new(store);
        let stop = Arc::new(AtomicBool::new(false));

        let reader = {
            let store = Arc::clone(&store);
            let stop = Arc::clone(&stop);
            let changes = store.subscribe();
            std::thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    let snapshot = changes.borrow();
                    let _ = (snapshot.entities.len(), store.count());
                }
            })
        };

        let writes = async {
            store.fetch_all(&TaskFilter::new()).await.unwrap();
            for i in 0..200 {
                store.create(TaskInput::new(format!("task {i}"))).await.unwrap();
            }
        };
        let finished = tokio::time::timeout(Duration::from_secs(30), writes).await;
        stop.store(true, Ordering::Relaxed);
        reader.join().unwrap();

        assert!(finished.is_ok());
        assert_eq!(*store.subscribe().borrow(), store.snapshot());
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_changes() {
        let (_, store) = seeded(2);
        let mut changes = store.subscribe();
        assert!(changes.borrow_and_update().entities.is_empty());

        store.fetch_all(&TaskFilter::new()).await.unwrap();
        assert!(changes.has_changed().unwrap());
        let snapshot = changes.borrow_and_update().clone();
        assert_eq!(snapshot.entities.len(), 2);
        assert!(!snapshot.loading);
        assert_eq!(snapshot, store.snapshot());
    }
}
