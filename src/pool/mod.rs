//! # Pool module
//!
//! Module dedicated to the folder pool, the client-side folder
//! metadata cache and synchronization engine.
//!
//! The main structure is [`Pool`], built once by the application's
//! composition root via [`PoolBuilder`] and passed by handle to
//! every component. It owns the [`entity`] and [`listing`] stores,
//! the [`count`] aggregator, the [`vfolder`] registry, the [`fetch`]
//! orchestrator and the [`mutate`] coordinator.

pub mod count;
pub mod entity;
mod error;
pub mod fetch;
pub mod flat;
pub mod listing;
pub mod mutate;
pub mod vfolder;

use std::{
    collections::{HashMap, HashSet},
    future::Future,
    sync::Arc,
};

use futures::future::join_all;
use tokio::{
    sync::{Mutex, MutexGuard},
    task::yield_now,
};
use tracing::{debug, trace, warn};

#[doc(inline)]
pub use self::error::{Error, Result};
use self::{
    entity::{EntityStore, FolderChange},
    listing::{ListingKey, ListingStore},
    vfolder::VirtualGetter,
};
use crate::{
    debounce::Debouncer,
    event::{HandlerResult, PoolEvent, PoolEventHandler},
    folder::{config::PoolConfig, FolderId, FolderModule},
    job::JobRunner,
    snapshot::PoolSnapshot,
    transport::{FolderTransport, MutationOutcome, RemoteFolder, TransportError},
};

/// The mutable shared state of the pool.
///
/// The two stores are the only mutable shared state; every mutation
/// handler leaves both in a consistent state before yielding. Events
/// are collected inside the critical section and emitted after the
/// lock is released.
pub(crate) struct PoolState {
    pub(crate) entities: EntityStore,
    pub(crate) listings: ListingStore,

    /// Ids currently being deleted remotely; membership suppresses
    /// not-found handling for that id until removal completes.
    pub(crate) pending_deletions: HashSet<FolderId>,

    /// One-shot pre-warmed listings, consumed exactly once then
    /// discarded.
    pub(crate) prewarmed: HashMap<ListingKey, Vec<FolderId>>,
}

impl PoolState {
    fn new() -> Self {
        Self {
            entities: EntityStore::default(),
            listings: ListingStore::default(),
            pending_deletions: HashSet::default(),
            prewarmed: HashMap::default(),
        }
    }

    /// Merge a wire record into the entity store and translate the
    /// reported field changes into events and aggregation triggers.
    pub(crate) fn apply_remote(
        &mut self,
        config: &PoolConfig,
        remote: &RemoteFolder,
        events: &mut Vec<PoolEvent>,
    ) {
        let changes = self.entities.upsert(remote);
        if changes.is_empty() {
            return;
        }

        let id = &remote.id;
        let module = self
            .entities
            .get(id)
            .map(|folder| folder.module())
            .unwrap_or(FolderModule::Unknown);

        let added = changes.contains(&FolderChange::Added);
        let mut updated = false;

        for change in changes {
            match change {
                FolderChange::Added => events.push(PoolEvent::Added(id.clone())),
                FolderChange::Unread { prev, next } => {
                    events.push(PoolEvent::UnreadChanged {
                        id: id.clone(),
                        unread: next,
                    });
                    count::on_count_changed(
                        &mut self.entities,
                        &self.listings,
                        &config.exclusion,
                        id,
                        next,
                        prev,
                        events,
                    );
                    updated = true;
                }
                FolderChange::Total { next, .. } => {
                    events.push(PoolEvent::TotalChanged {
                        id: id.clone(),
                        total: next,
                    });
                    updated = true;
                }
                FolderChange::Subscribed => {
                    events.push(PoolEvent::SubscriptionChanged(id.clone()));
                    updated = true;
                }
                FolderChange::Permissions => {
                    events.push(PoolEvent::PermissionsChanged(id.clone()));
                    updated = true;
                }
                _ => updated = true,
            }
        }

        if updated && !added {
            events.push(PoolEvent::Updated {
                id: id.clone(),
                module,
            });
        }
    }
}

struct PoolInner {
    config: PoolConfig,
    transport: Arc<dyn FolderTransport>,
    jobs: Option<Arc<dyn JobRunner>>,
    handlers: Vec<Arc<PoolEventHandler>>,
    state: Mutex<PoolState>,
    virtuals: Mutex<HashMap<FolderId, Arc<VirtualGetter>>>,
    reload: Debouncer<FolderId>,
}

/// The pool builder.
///
/// Wires the transport and job collaborators, the configuration and
/// any number of event handlers, then builds the [`Pool`].
pub struct PoolBuilder {
    config: PoolConfig,
    transport: Arc<dyn FolderTransport>,
    jobs: Option<Arc<dyn JobRunner>>,
    handlers: Vec<Arc<PoolEventHandler>>,
}

impl PoolBuilder {
    /// Create a new pool builder using the given transport.
    pub fn new(transport: impl FolderTransport + 'static) -> Self {
        Self {
            config: PoolConfig::default(),
            transport: Arc::new(transport),
            jobs: None,
            handlers: Vec::default(),
        }
    }

    pub fn set_config(&mut self, config: PoolConfig) {
        self.config = config;
    }

    pub fn with_config(mut self, config: PoolConfig) -> Self {
        self.set_config(config);
        self
    }

    pub fn set_some_job_runner(&mut self, jobs: Option<impl JobRunner + 'static>) {
        self.jobs = jobs.map(|jobs| Arc::new(jobs) as Arc<dyn JobRunner>);
    }

    pub fn set_job_runner(&mut self, jobs: impl JobRunner + 'static) {
        self.set_some_job_runner(Some(jobs));
    }

    pub fn with_some_job_runner(mut self, jobs: Option<impl JobRunner + 'static>) -> Self {
        self.set_some_job_runner(jobs);
        self
    }

    pub fn with_job_runner(mut self, jobs: impl JobRunner + 'static) -> Self {
        self.set_job_runner(jobs);
        self
    }

    /// Register one more event handler. Handlers are called in
    /// registration order; each one filters by id itself.
    pub fn add_handler<F: Future<Output = HandlerResult> + Send + 'static>(
        &mut self,
        handler: impl Fn(PoolEvent) -> F + Send + Sync + 'static,
    ) {
        self.handlers
            .push(Arc::new(move |event| Box::pin(handler(event))));
    }

    pub fn with_handler<F: Future<Output = HandlerResult> + Send + 'static>(
        mut self,
        handler: impl Fn(PoolEvent) -> F + Send + Sync + 'static,
    ) -> Self {
        self.add_handler(handler);
        self
    }

    /// Build the pool.
    pub fn build(self) -> Pool {
        let reload = Debouncer::new(self.config.reload_window);

        Pool {
            inner: Arc::new(PoolInner {
                config: self.config,
                transport: self.transport,
                jobs: self.jobs,
                handlers: self.handlers,
                state: Mutex::new(PoolState::new()),
                virtuals: Mutex::new(HashMap::default()),
                reload,
            }),
        }
    }
}

/// The folder pool.
///
/// Cheap to clone; every clone shares the same stores and
/// collaborators.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    pub(crate) async fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.inner.state.lock().await
    }

    pub(crate) fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub(crate) fn transport(&self) -> &Arc<dyn FolderTransport> {
        &self.inner.transport
    }

    pub(crate) fn virtuals(&self) -> &Mutex<HashMap<FolderId, Arc<VirtualGetter>>> {
        &self.inner.virtuals
    }

    pub(crate) fn push_token(&self) -> Option<&str> {
        self.inner.config.push_token.as_deref()
    }

    pub(crate) async fn emit_all(&self, events: Vec<PoolEvent>) {
        for event in events {
            event.emit(&self.inner.handlers).await;
        }
    }

    pub(crate) async fn emit(&self, event: PoolEvent) {
        event.emit(&self.inner.handlers).await;
    }

    /// Return `true` if the deletion of the given folder is
    /// currently in flight.
    pub async fn is_being_deleted(&self, id: &str) -> bool {
        self.lock_state().await.pending_deletions.contains(id)
    }

    /// Handle a remote error concerning one folder: errors meaning
    /// "gone or inaccessible" for an id whose deletion is already in
    /// flight are suppressed entirely. Returns `false` when the
    /// error was suppressed, `true` when it was broadcast.
    pub async fn report_remote_error(&self, id: &str, err: &TransportError) -> bool {
        if err.code.is_access_error() && self.is_being_deleted(id).await {
            trace!("suppressing {} for folder {id}: deletion in flight", err.code);
            return false;
        }

        self.emit(PoolEvent::Error {
            code: err.code.clone(),
            message: err.message.clone(),
        })
        .await;
        true
    }

    /// Broadcast a remote failure not tied to a pending deletion.
    pub(crate) async fn broadcast_failure(&self, err: &TransportError) {
        self.emit(PoolEvent::Error {
            code: err.code.clone(),
            message: err.message.clone(),
        })
        .await;
    }

    /// Consume a pre-warmed startup snapshot. Entities are merged
    /// immediately; listings are kept aside and consumed exactly
    /// once by the next matching [`list`](Self::list) call.
    pub async fn prime(&self, snapshot: PoolSnapshot) {
        let mut events = Vec::default();
        {
            let mut state = self.lock_state().await;
            for remote in &snapshot.folders {
                state.apply_remote(&self.inner.config, remote, &mut events);
            }
            for listing in snapshot.listings {
                let key = ListingKey::children(&listing.parent, listing.all);
                state.prewarmed.insert(key, listing.ids);
            }
        }
        self.emit_all(events).await;
    }

    /// Resolve a mutation outcome, deferring to the job runner when
    /// the remote call turned into a long-running job.
    pub(crate) async fn resolve_outcome(&self, outcome: MutationOutcome) -> Result<FolderId> {
        match outcome {
            MutationOutcome::Done(id) => Ok(id),
            MutationOutcome::Job(token) => match &self.inner.jobs {
                Some(jobs) => {
                    debug!("waiting for job {token} to finish");
                    jobs.wait(&token)
                        .await
                        .map_err(|err| Error::WaitJobError(err, token.0))
                }
                None => Err(Error::WaitJobMissingRunnerError(token.0)),
            },
        }
    }

    /// The named recovery path of every failed optimistic mutation:
    /// discard local state by re-fetching ground truth from the
    /// remote service. Never rolls back by replaying an inverse
    /// operation.
    pub(crate) async fn refetch_ground_truth(&self, id: &str) {
        debug!("re-fetching ground truth for folder {id}");

        match self.inner.transport.get_folder(id).await {
            Ok(remote) => {
                let mut events = Vec::default();
                {
                    let mut state = self.lock_state().await;
                    state.apply_remote(&self.inner.config, &remote, &mut events);
                }
                self.emit_all(events).await;
            }
            Err(err) => {
                debug!("cannot re-fetch ground truth for folder {id}: {err}");
                trace!("{err:?}");
            }
        }
    }

    /// Re-validate the whole cache: mark every listing expired, then
    /// re-list all known children listings and flat modules under
    /// transport batching, best effort (partial failures are logged,
    /// the sweep continues), and finally refresh the virtual
    /// folders.
    pub async fn refresh(&self) {
        debug!("refreshing folder pool");

        let keys = {
            let mut state = self.lock_state().await;
            state.listings.mark_all_expired();
            state.listings.children_keys()
        };
        let flat_modules: HashSet<FolderModule> =
            self.inner.config.flat_roots.values().copied().collect();

        self.inner.transport.pause();

        let mut handles = Vec::default();

        for key in keys {
            if let ListingKey::Children { parent, all } = key {
                let pool = self.clone();
                handles.push(tokio::spawn(async move {
                    pool.list(
                        &parent,
                        fetch::ListOptions {
                            all,
                            ..Default::default()
                        },
                    )
                    .await
                    .map(|_| ())
                }));
            }
        }

        for module in flat_modules {
            let pool = self.clone();
            handles.push(tokio::spawn(async move {
                pool.flat(
                    module,
                    flat::FlatOptions {
                        all: true,
                        cache: true,
                    },
                )
                .await
                .map(|_| ())
            }));
        }

        // a queuing transport holds paused calls until resume, so the
        // batch must be flushed before the results are awaited
        yield_now().await;
        self.inner.transport.resume();

        for result in join_all(handles).await {
            match result {
                Ok(Err(err)) => {
                    warn!("cannot refresh listing: {err}");
                    trace!("{err:?}");
                }
                Err(err) => warn!("refresh task aborted: {err}"),
                Ok(Ok(())) => (),
            }
        }

        self.refresh_virtual().await;
    }

    /// Debounced folder reload: N rapid triggers for the same id
    /// produce one invalidate plus re-list after the quiet period.
    pub async fn reload(&self, id: impl ToString) {
        let id = id.to_string();
        let pool = self.clone();
        let task_id = id.clone();

        self.inner
            .reload
            .trigger(id, async move {
                {
                    let mut state = pool.lock_state().await;
                    state.listings.invalidate(&ListingKey::children(&task_id, true));
                    state.listings.invalidate(&ListingKey::children(&task_id, false));
                }

                if let Err(err) = pool
                    .list(
                        &task_id,
                        fetch::ListOptions {
                            all: true,
                            cache: false,
                            force: true,
                        },
                    )
                    .await
                {
                    debug!("cannot reload folder {task_id}: {err}");
                    trace!("{err:?}");
                }
            })
            .await;
    }
}
