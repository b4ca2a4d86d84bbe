use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::notification::model::{NotificationError, NotificationRecord, NotificationSnapshot};
use crate::notification::source::NotificationSource;
use crate::notification::store::NotificationStore;

/// What happened to a `load` call
#[derive(Debug)]
pub enum LoadOutcome {
    /// The fetch result replaced the list
    Applied(NotificationSnapshot),
    /// The fetch failed; the list is now empty and the snapshot carries a notice
    Failed(NotificationSnapshot, NotificationError),
    /// The screen was torn down, or a newer load was requested, before the
    /// fetch resolved
    Discarded,
}

/// State behind one notification screen, from activation to teardown
pub struct NotificationScreen {
    id: Uuid,
    store: Mutex<NotificationStore>,
    snapshots: watch::Sender<NotificationSnapshot>,
    source: Arc<dyn NotificationSource>,
    torn_down: watch::Sender<bool>,
    load_generation: AtomicU64,
    last_touched: Mutex<Instant>,
}

impl NotificationScreen {
    pub fn new(source: Arc<dyn NotificationSource>) -> Self {
        let store = NotificationStore::new();
        let (snapshots, _) = watch::channel(store.snapshot());
        let (torn_down, _) = watch::channel(false);

        Self {
            id: Uuid::new_v4(),
            store: Mutex::new(store),
            snapshots,
            source,
            torn_down,
            load_generation: AtomicU64::new(0),
            last_touched: Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn snapshot(&self) -> NotificationSnapshot {
        self.lock_store().snapshot()
    }

    /// Receiver that observes every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<NotificationSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn is_torn_down(&self) -> bool {
        *self.torn_down.borrow()
    }

    /// Resolves once the screen is torn down
    pub async fn torn_down(&self) {
        let mut rx = self.torn_down.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Record client activity on this screen
    pub fn touch(&self) {
        *self
            .last_touched
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Idle screens have no snapshot subscribers and no activity within `ttl`
    pub fn is_idle(&self, ttl: Duration) -> bool {
        let last_touched = *self
            .last_touched
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.snapshots.receiver_count() == 0 && last_touched.elapsed() >= ttl
    }

    /// Fetch the list and replace the store contents with it.
    ///
    /// The fetch runs without holding the store lock. Once it resolves, the
    /// result is only applied if the screen is still alive and no later load
    /// was started in the meantime.
    pub async fn load(&self) -> LoadOutcome {
        let generation = self.load_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.touch();
        info!("Loading notifications for screen {}", self.id);

        let fetched = self
            .source
            .fetch_notifications()
            .await
            .and_then(ensure_unique_ids);

        let mut store = self.lock_store();

        if self.is_torn_down() {
            info!("Discarding load for torn down screen {}", self.id);
            return LoadOutcome::Discarded;
        }
        if self.load_generation.load(Ordering::SeqCst) != generation {
            info!("Discarding superseded load for screen {}", self.id);
            return LoadOutcome::Discarded;
        }

        match fetched {
            Ok(records) => {
                store.replace(records);
                info!(
                    "Loaded {} notifications ({} unread) for screen {}",
                    store.records().len(),
                    store.unread_count(),
                    self.id
                );
                let snapshot = self.publish(&store);
                LoadOutcome::Applied(snapshot)
            }
            Err(e) => {
                warn!("Notification fetch failed for screen {}: {}", self.id, e);
                store.fail_load(format!("Could not load notifications: {}", e));
                let snapshot = self.publish(&store);
                LoadOutcome::Failed(snapshot, e)
            }
        }
    }

    pub fn mark_as_read(&self, notification_id: i64) -> NotificationSnapshot {
        let mut store = self.lock_store();
        if self.is_torn_down() {
            warn!("Ignoring mark-as-read on torn down screen {}", self.id);
            return store.snapshot();
        }
        self.touch();

        if store.mark_as_read(notification_id) {
            info!(
                "Marked notification {} as read on screen {} (revision {})",
                notification_id,
                self.id,
                store.revision()
            );
            self.publish(&store)
        } else {
            store.snapshot()
        }
    }

    pub fn clear_all(&self) -> NotificationSnapshot {
        let mut store = self.lock_store();
        if self.is_torn_down() {
            warn!("Ignoring clear on torn down screen {}", self.id);
            return store.snapshot();
        }
        self.touch();

        if store.clear_all() {
            info!("Cleared notifications on screen {}", self.id);
            self.publish(&store)
        } else {
            store.snapshot()
        }
    }

    /// Mark the screen as gone and wake everything waiting on `torn_down`.
    /// Loads still in flight will be dropped when they resolve.
    pub fn teardown(&self) {
        let _store = self.lock_store();
        if !self.torn_down.send_replace(true) {
            info!("Screen {} torn down", self.id);
        }
    }

    // Called with the store lock held so subscribers see snapshots in
    // mutation order
    fn publish(&self, store: &NotificationStore) -> NotificationSnapshot {
        let snapshot = store.snapshot();
        self.snapshots.send_replace(snapshot.clone());
        snapshot
    }

    fn lock_store(&self) -> MutexGuard<'_, NotificationStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn ensure_unique_ids(
    records: Vec<NotificationRecord>,
) -> Result<Vec<NotificationRecord>, NotificationError> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in &records {
        if !seen.insert(record.id()) {
            return Err(NotificationError::DuplicateId(record.id()));
        }
    }
    Ok(records)
}

/// A screen owned by a single connection rather than the registry.
///
/// It cannot be looked up by id, and it is torn down when dropped.
pub struct OwnedScreen {
    screen: Arc<NotificationScreen>,
    live: Arc<AtomicUsize>,
}

impl OwnedScreen {
    pub fn screen(&self) -> &Arc<NotificationScreen> {
        &self.screen
    }
}

impl Drop for OwnedScreen {
    fn drop(&mut self) {
        self.screen.teardown();
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Owns the live screens, one per client activation
pub struct ScreenRegistry {
    screens: Mutex<HashMap<Uuid, Arc<NotificationScreen>>>,
    source: Arc<dyn NotificationSource>,
    owned: Arc<AtomicUsize>,
}

impl ScreenRegistry {
    pub fn new(source: Arc<dyn NotificationSource>) -> Self {
        Self {
            screens: Mutex::new(HashMap::new()),
            source,
            owned: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create an empty screen. The caller decides when to load it.
    pub fn activate(&self) -> Arc<NotificationScreen> {
        let screen = Arc::new(NotificationScreen::new(self.source.clone()));
        self.lock_screens().insert(screen.id(), screen.clone());
        info!("Activated notification screen {}", screen.id());
        screen
    }

    /// Create a screen that lives outside the id lookup, for one connection
    pub fn open_owned(&self) -> OwnedScreen {
        let screen = Arc::new(NotificationScreen::new(self.source.clone()));
        self.owned.fetch_add(1, Ordering::SeqCst);
        info!("Opened connection-owned screen {}", screen.id());
        OwnedScreen {
            screen,
            live: self.owned.clone(),
        }
    }

    /// Look up a screen and count the lookup as activity on it
    pub fn get(&self, id: &Uuid) -> Result<Arc<NotificationScreen>, NotificationError> {
        let screen = self
            .lock_screens()
            .get(id)
            .cloned()
            .ok_or(NotificationError::ScreenNotFound)?;
        screen.touch();
        Ok(screen)
    }

    pub fn teardown(&self, id: &Uuid) -> Result<(), NotificationError> {
        let screen = self
            .lock_screens()
            .remove(id)
            .ok_or(NotificationError::ScreenNotFound)?;
        screen.teardown();
        Ok(())
    }

    /// Tear down every registered screen idle for at least `ttl`
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let evicted: Vec<Arc<NotificationScreen>> = {
            let mut screens = self.lock_screens();
            let idle: Vec<Uuid> = screens
                .iter()
                .filter(|(_, screen)| screen.is_idle(ttl))
                .map(|(id, _)| *id)
                .collect();
            idle.iter().filter_map(|id| screens.remove(id)).collect()
        };

        for screen in &evicted {
            info!("Evicting idle screen {}", screen.id());
            screen.teardown();
        }
        evicted.len()
    }

    /// Periodically evict idle screens until the registry is dropped
    pub fn spawn_idle_sweep(registry: &Arc<Self>, ttl: Duration, every: Duration) -> JoinHandle<()> {
        let registry = Arc::downgrade(registry);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // The first tick fires immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let evicted = registry.evict_idle(ttl);
                if evicted > 0 {
                    info!("Idle sweep evicted {} screens", evicted);
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.lock_screens().len()
    }

    /// Screens currently owned by open connections
    pub fn owned_len(&self) -> usize {
        self.owned.load(Ordering::SeqCst)
    }

    fn lock_screens(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<NotificationScreen>>> {
        self.screens.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
