//! Sync orchestration between the local cache and the remote list API.
//!
//! # Design
//! `SyncService` owns the cache and is the single writer of its revision.
//! UI-facing mutations update the cache optimistically, mirror to the
//! optional persistence store, and wake a background worker. The worker
//! coalesces triggers: however many arrive while a cycle is in flight, at
//! most one follow-up cycle runs, over the latest cache snapshot.
//!
//! At most one sync cycle runs at a time. Direct [`SyncService::sync`] and
//! [`SyncService::refresh`] calls serialize against the worker through the
//! same in-flight lock, so two pushes can never race on one revision.
//!
//! A cycle records the service epoch when it starts and re-checks it after
//! every suspension point; if the epoch moved (shutdown), the cycle aborts
//! with `Cancelled` and its responses never reach the cache.
//!
//! Transient transport failures (`Timeout`, `ConnectionLost`) retry
//! indefinitely with exponential backoff inside the cycle. Everything else
//! fails the cycle once; the next trigger starts fresh with a new backoff.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::backoff::Backoff;
use crate::cache::ItemCache;
use crate::client::ApiClient;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::http::HttpExecutor;
use crate::query::{self, Section, SortOption};
use crate::store::ItemStore;
use crate::types::{Category, Item, ItemDto};
use crate::validation;

/// What the UI is allowed to observe about sync: a busy flag and the most
/// recent surfaced error. Raw transport errors stay inside the service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncStatus {
    pub is_syncing: bool,
    pub last_error: Option<String>,
}

struct Inner {
    config: SyncConfig,
    client: ApiClient,
    cache: Mutex<ItemCache>,
    categories: Mutex<Vec<Category>>,
    store: Option<Arc<dyn ItemStore>>,
    /// Held for the duration of a sync cycle; serializes the worker and
    /// direct `sync`/`refresh` calls.
    sync_lock: tokio::sync::Mutex<()>,
    /// Set by triggers, consumed when a cycle snapshots the cache.
    dirty: AtomicBool,
    /// Bumped on shutdown; cycles abort when it moves under them.
    epoch: AtomicU64,
    stopped: AtomicBool,
    notify: Notify,
    status_tx: watch::Sender<SyncStatus>,
    changes_tx: watch::Sender<u64>,
}

/// Orchestrates the local item collection against the remote list.
///
/// Construct with [`SyncService::new`] (or [`SyncService::with_store`] to
/// seed from and mirror to durable storage), mutate through the item
/// methods, and observe via [`SyncService::subscribe_status`] and
/// [`SyncService::subscribe_changes`].
pub struct SyncService {
    inner: Arc<Inner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SyncService {
    /// Creates the service and spawns its background sync worker. Must be
    /// called from within a Tokio runtime.
    pub fn new(config: SyncConfig, executor: Arc<dyn HttpExecutor>) -> Self {
        Self::build(config, executor, None, Vec::new())
    }

    /// Like [`SyncService::new`], but seeds the cache from the store and
    /// mirrors every subsequent change back into it.
    pub fn with_store(
        config: SyncConfig,
        executor: Arc<dyn HttpExecutor>,
        store: Arc<dyn ItemStore>,
    ) -> Result<Self, SyncError> {
        let seeded = store.fetch_all()?;
        Ok(Self::build(config, executor, Some(store), seeded))
    }

    fn build(
        config: SyncConfig,
        executor: Arc<dyn HttpExecutor>,
        store: Option<Arc<dyn ItemStore>>,
        seeded: Vec<Item>,
    ) -> Self {
        let client = ApiClient::new(&config.base_url, &config.token, executor);
        let mut cache = ItemCache::new();
        for item in seeded {
            cache.insert(item);
        }
        let (status_tx, _) = watch::channel(SyncStatus::default());
        let (changes_tx, _) = watch::channel(0u64);
        let inner = Arc::new(Inner {
            config,
            client,
            cache: Mutex::new(cache),
            categories: Mutex::new(Category::defaults()),
            store,
            sync_lock: tokio::sync::Mutex::new(()),
            dirty: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
            notify: Notify::new(),
            status_tx,
            changes_tx,
        });
        let worker = tokio::spawn(worker_loop(Arc::clone(&inner)));
        Self {
            inner,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Inserts or replaces an item, then requests a sync.
    pub fn add_item(&self, item: Item) {
        self.inner.cache_guard().insert(item.clone());
        self.inner.mirror_insert(&item);
        self.inner.bump_changes();
        self.request_sync();
    }

    /// Replaces an item wholesale, then requests a sync.
    pub fn update_item(&self, item: Item) {
        self.inner.cache_guard().insert(item.clone());
        self.inner.mirror_update(&item);
        self.inner.bump_changes();
        self.request_sync();
    }

    /// Removes an item by id, returning it. Absent ids are a no-op.
    pub fn remove_item(&self, id: &str) -> Option<Item> {
        let removed = self.inner.cache_guard().remove(id);
        if let Some(item) = &removed {
            self.inner.mirror_delete(&item.id);
            self.inner.bump_changes();
            self.request_sync();
        }
        removed
    }

    /// Flips an item's done flag. Absent ids are a no-op; returns whether
    /// the item existed.
    pub fn toggle_item(&self, id: &str) -> bool {
        self.set_done(id, None)
    }

    pub fn complete_item(&self, id: &str) -> bool {
        self.set_done(id, Some(true))
    }

    pub fn activate_item(&self, id: &str) -> bool {
        self.set_done(id, Some(false))
    }

    fn set_done(&self, id: &str, done: Option<bool>) -> bool {
        let updated = {
            let mut cache = self.inner.cache_guard();
            let next = cache.get(id).map(|item| {
                let target = done.unwrap_or(!item.is_done);
                item.copy_with(Some(target))
            });
            if let Some(item) = &next {
                cache.insert(item.clone());
            }
            next
        };
        match updated {
            Some(item) => {
                self.inner.mirror_update(&item);
                self.inner.bump_changes();
                self.request_sync();
                true
            }
            None => false,
        }
    }

    /// Unordered snapshot of every cached item.
    pub fn items(&self) -> Vec<Item> {
        self.inner.cache_guard().items()
    }

    pub fn item(&self, id: &str) -> Option<Item> {
        self.inner.cache_guard().get(id).cloned()
    }

    /// Last revision acknowledged by the server.
    pub fn revision(&self) -> i64 {
        self.inner.cache_guard().revision()
    }

    pub fn visible_items(&self, hide_completed: bool, sort: SortOption) -> Vec<Item> {
        query::visible_items(&self.items(), hide_completed, sort)
    }

    pub fn completed_count(&self) -> usize {
        query::completed_count(&self.items())
    }

    /// Visible items grouped by deadline date, undated items last.
    pub fn sections(&self, hide_completed: bool, sort: SortOption) -> Vec<Section> {
        query::sections(&self.visible_items(hide_completed, sort))
    }

    pub fn categories(&self) -> Vec<Category> {
        self.inner.categories_guard().clone()
    }

    /// Registers a new category. Names must be non-empty and unique among
    /// the registered categories. Categories are local-only metadata;
    /// they never sync.
    pub fn add_category(
        &self,
        name: &str,
        color: Option<String>,
    ) -> Result<Category, SyncError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SyncError::validation("category name must not be empty"));
        }
        let category = {
            let mut categories = self.inner.categories_guard();
            if categories.iter().any(|c| c.name == name) {
                return Err(SyncError::validation(format!(
                    "category {name:?} already exists"
                )));
            }
            let category = Category::new(name, color);
            categories.push(category.clone());
            category
        };
        self.inner.bump_changes();
        Ok(category)
    }

    /// Replaces a category by id; returns whether it existed.
    pub fn update_category(&self, category: Category) -> bool {
        let updated = {
            let mut categories = self.inner.categories_guard();
            match categories.iter_mut().find(|c| c.id == category.id) {
                Some(slot) => {
                    *slot = category;
                    true
                }
                None => false,
            }
        };
        if updated {
            self.inner.bump_changes();
        }
        updated
    }

    pub fn remove_category(&self, id: &str) -> bool {
        let removed = {
            let mut categories = self.inner.categories_guard();
            let before = categories.len();
            categories.retain(|c| c.id != id);
            categories.len() != before
        };
        if removed {
            self.inner.bump_changes();
        }
        removed
    }

    /// Marks local state dirty and wakes the background worker. Triggers
    /// arriving while a cycle is in flight coalesce into a single
    /// follow-up cycle over the then-current snapshot.
    pub fn request_sync(&self) {
        self.inner.dirty.store(true, Ordering::SeqCst);
        self.inner.notify.notify_one();
    }

    /// Pushes the current snapshot now and waits for the outcome.
    ///
    /// Serialized with the background worker; the pending trigger flag is
    /// consumed here, so a mutation followed by a direct `sync` produces
    /// one push, not two.
    pub async fn sync(&self) -> Result<(), SyncError> {
        let inner = &self.inner;
        let _flight = inner.sync_lock.lock().await;
        inner.dirty.store(false, Ordering::SeqCst);
        let epoch = inner.epoch.load(Ordering::SeqCst);
        inner.cycle_started();
        let result = push_cycle(inner, epoch).await;
        inner.cycle_finished(&result);
        result
    }

    /// Pulls the authoritative list and revision from the server and
    /// merges it into the cache.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        let inner = &self.inner;
        let _flight = inner.sync_lock.lock().await;
        let epoch = inner.epoch.load(Ordering::SeqCst);
        inner.cycle_started();
        let result = pull_cycle(inner, epoch).await;
        inner.cycle_finished(&result);
        result
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.status_tx.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Watch a counter that increments whenever the visible data set
    /// changes (mutations, merges, category edits).
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.inner.changes_tx.subscribe()
    }

    /// Stops the background worker. Any in-flight cycle is cancelled at
    /// its next suspension point and its response never reaches the cache.
    pub async fn shutdown(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.notify.notify_one();
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            worker.abort();
            let _ = worker.await;
        }
        self.inner.status_tx.send_modify(|s| s.is_syncing = false);
    }
}

impl Drop for SyncService {
    fn drop(&mut self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            worker.abort();
        }
    }
}

impl Inner {
    fn cache_guard(&self) -> MutexGuard<'_, ItemCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn categories_guard(&self) -> MutexGuard<'_, Vec<Category>> {
        self.categories.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn check_epoch(&self, cycle_epoch: u64) -> Result<(), SyncError> {
        if self.epoch.load(Ordering::SeqCst) == cycle_epoch {
            Ok(())
        } else {
            Err(SyncError::Cancelled)
        }
    }

    fn bump_changes(&self) {
        self.changes_tx.send_modify(|n| *n += 1);
    }

    fn cycle_started(&self) {
        self.status_tx.send_modify(|s| s.is_syncing = true);
    }

    fn cycle_finished(&self, result: &Result<(), SyncError>) {
        self.status_tx.send_modify(|status| {
            status.is_syncing = false;
            match result {
                Ok(()) => status.last_error = None,
                Err(SyncError::Cancelled) => {}
                Err(err) => status.last_error = Some(err.to_string()),
            }
        });
        match result {
            Ok(()) => debug!("sync cycle completed"),
            Err(SyncError::Cancelled) => debug!("sync cycle cancelled"),
            Err(err) => warn!(error = %err, "sync cycle failed"),
        }
    }

    /// Upserts server-returned records and adopts the revision that came
    /// with them. Whole records win; there is no field-level merging.
    /// Records the server did not return stay local until the next push.
    fn adopt_list(&self, dtos: &[ItemDto], revision: i64) {
        let merged: Vec<Item> = dtos.iter().map(Item::from_dto).collect();
        {
            let mut cache = self.cache_guard();
            for item in &merged {
                cache.insert(item.clone());
            }
            cache.set_revision(revision);
        }
        for item in &merged {
            self.mirror_update(item);
        }
        self.bump_changes();
    }

    fn adopt_revision(&self, revision: i64) {
        self.cache_guard().set_revision(revision);
    }

    fn mirror_insert(&self, item: &Item) {
        if let Some(store) = &self.store {
            if let Err(err) = store.insert(item) {
                warn!(error = %err, id = %item.id, "store insert failed");
            }
        }
    }

    fn mirror_update(&self, item: &Item) {
        if let Some(store) = &self.store {
            if let Err(err) = store.update(item) {
                warn!(error = %err, id = %item.id, "store update failed");
            }
        }
    }

    fn mirror_delete(&self, id: &str) {
        if let Some(store) = &self.store {
            if let Err(err) = store.delete(id) {
                warn!(error = %err, id = %id, "store delete failed");
            }
        }
    }
}

async fn worker_loop(inner: Arc<Inner>) {
    loop {
        inner.notify.notified().await;
        if inner.is_stopped() {
            break;
        }
        // Drain coalesced triggers; every pass pushes a fresh snapshot.
        loop {
            if inner.is_stopped() {
                return;
            }
            let _flight = inner.sync_lock.lock().await;
            if !inner.dirty.swap(false, Ordering::SeqCst) {
                break;
            }
            let epoch = inner.epoch.load(Ordering::SeqCst);
            inner.cycle_started();
            let result = push_cycle(&inner, epoch).await;
            inner.cycle_finished(&result);
        }
    }
    debug!("sync worker stopped");
}

/// One push cycle: snapshot, validate, bulk-update with the known revision
/// as precondition, merge the authoritative response, then confirm the
/// revision with a trailing fetch.
async fn push_cycle(inner: &Inner, cycle_epoch: u64) -> Result<(), SyncError> {
    let (batch, known_revision) = {
        let cache = inner.cache_guard();
        let dtos: Vec<ItemDto> = cache
            .items()
            .iter()
            .map(|item| item.to_dto(&inner.config.device_id))
            .collect();
        (dtos, cache.revision())
    };
    let batch = validation::filter_valid(batch);
    if batch.is_empty() {
        return Err(SyncError::NothingToPush);
    }

    let mut backoff = Backoff::new(inner.config.retry.clone());

    let (list, revision) = retry_transient(inner, &mut backoff, cycle_epoch, || {
        let client = inner.client.clone();
        let batch = batch.clone();
        async move { client.update_list(&batch, known_revision).await }
    })
    .await?;
    inner.check_epoch(cycle_epoch)?;
    // Adopt the patch revision immediately so a failure in the trailing
    // fetch cannot leave a stale precondition for the next cycle.
    inner.adopt_list(&list, revision);

    let revision = retry_transient(inner, &mut backoff, cycle_epoch, || {
        let client = inner.client.clone();
        async move { client.fetch_revision().await }
    })
    .await?;
    inner.check_epoch(cycle_epoch)?;
    inner.adopt_revision(revision);
    Ok(())
}

/// One pull cycle: fetch the authoritative list, merge it, then confirm
/// the revision.
async fn pull_cycle(inner: &Inner, cycle_epoch: u64) -> Result<(), SyncError> {
    let mut backoff = Backoff::new(inner.config.retry.clone());

    let (list, revision) = retry_transient(inner, &mut backoff, cycle_epoch, || {
        let client = inner.client.clone();
        async move { client.fetch_list().await }
    })
    .await?;
    inner.check_epoch(cycle_epoch)?;
    inner.adopt_list(&list, revision);

    let revision = retry_transient(inner, &mut backoff, cycle_epoch, || {
        let client = inner.client.clone();
        async move { client.fetch_revision().await }
    })
    .await?;
    inner.check_epoch(cycle_epoch)?;
    inner.adopt_revision(revision);
    Ok(())
}

/// Repeats one logical transport call until it succeeds or fails with a
/// non-transient error. The backoff is shared across the calls of a cycle
/// and resets after every success.
async fn retry_transient<T, F, Fut>(
    inner: &Inner,
    backoff: &mut Backoff,
    cycle_epoch: u64,
    mut call: F,
) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, SyncError>>,
{
    loop {
        inner.check_epoch(cycle_epoch)?;
        match call().await {
            Ok(value) => {
                backoff.reset();
                return Ok(value);
            }
            Err(err) if err.is_transient() => {
                let delay = backoff.next_delay();
                warn!(
                    error = %err,
                    attempt = backoff.attempt(),
                    delay_ms = delay.as_millis() as u64,
                    "transient sync failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
