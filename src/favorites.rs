use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::models::{ContentItem, FavoriteRecord};
use crate::session::{SessionContext, UserSession};

/// Storage key enforcing at most one record per (user, content) pair.
pub fn composed_key(user_id: &str, content_id: i32) -> String {
    format!("{user_id}_{content_id}")
}

/// Document-store boundary for favorites. The hosted backend owns the data;
/// this trait is what the store talks to, and what tests fake.
#[async_trait]
pub trait FavoritesBackend: Send + Sync {
    async fn put(&self, key: &str, record: FavoriteRecord) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    /// Live feed scoped to one user. The backend pushes the user's full
    /// favorite set on every change, including changes from other devices.
    async fn subscribe(&self, user_id: &str)
        -> Result<mpsc::UnboundedReceiver<Vec<FavoriteRecord>>>;
}

type Snapshot = Arc<RwLock<HashMap<i32, FavoriteRecord>>>;

/// The authenticated user's favorite set, kept live against the backend
/// subscription. Reads are synchronous against the in-memory snapshot;
/// mutations apply optimistically and write through. Last server write wins,
/// there is no merge logic.
pub struct FavoritesStore {
    backend: Arc<dyn FavoritesBackend>,
    session: SessionContext,
    snapshot: Snapshot,
    task: JoinHandle<()>,
}

impl FavoritesStore {
    pub fn new(backend: Arc<dyn FavoritesBackend>, session: SessionContext) -> Self {
        let snapshot: Snapshot = Arc::default();
        let task = tokio::spawn(sync_loop(
            backend.clone(),
            session.subscribe(),
            snapshot.clone(),
        ));
        Self {
            backend,
            session,
            snapshot,
            task,
        }
    }

    /// Membership test against the current snapshot.
    pub fn is_favorite(&self, content_id: i32) -> bool {
        self.snapshot.read().contains_key(&content_id)
    }

    pub fn favorites(&self) -> Vec<FavoriteRecord> {
        self.snapshot.read().values().cloned().collect()
    }

    /// Saves a favorite for the signed-in user. Without a session this is a
    /// silent no-op; callers redirect to authentication instead. Re-adding an
    /// existing favorite overwrites the same key.
    pub async fn add(&self, item: &ContentItem) -> Result<()> {
        let Some(user) = self.session.current() else {
            debug!("add favorite ignored: no session");
            return Ok(());
        };
        let record = FavoriteRecord::new(&user.user_id, item);
        let key = record.key();
        self.snapshot.write().insert(record.content_id, record.clone());
        self.backend.put(&key, record).await
    }

    /// Deletes the favorite at the composed key. Removing an absent favorite
    /// is a no-op, not an error.
    pub async fn remove(&self, content_id: i32) -> Result<()> {
        let Some(user) = self.session.current() else {
            debug!("remove favorite ignored: no session");
            return Ok(());
        };
        self.snapshot.write().remove(&content_id);
        self.backend
            .delete(&composed_key(&user.user_id, content_id))
            .await
    }
}

impl Drop for FavoritesStore {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Follows the session: every sign-in opens a fresh subscription, every
/// sign-out clears the snapshot immediately so nothing leaks into an
/// anonymous state.
async fn sync_loop(
    backend: Arc<dyn FavoritesBackend>,
    mut session_rx: watch::Receiver<Option<UserSession>>,
    snapshot: Snapshot,
) {
    'session: loop {
        let user = session_rx.borrow_and_update().clone();
        snapshot.write().clear();
        let mut feed = match &user {
            Some(user) => match backend.subscribe(&user.user_id).await {
                Ok(rx) => Some(rx),
                Err(err) => {
                    error!("favorites subscription failed: {err:#}");
                    None
                }
            },
            None => None,
        };
        loop {
            tokio::select! {
                changed = session_rx.changed() => {
                    if changed.is_err() {
                        break 'session;
                    }
                    continue 'session;
                }
                update = feed_recv(&mut feed) => match update {
                    Some(records) => {
                        let mut guard = snapshot.write();
                        guard.clear();
                        for record in records {
                            guard.insert(record.content_id, record);
                        }
                    }
                    // Feed closed server-side; keep the last snapshot until
                    // the session changes.
                    None => feed = None,
                },
            }
        }
    }
}

async fn feed_recv(
    feed: &mut Option<mpsc::UnboundedReceiver<Vec<FavoriteRecord>>>,
) -> Option<Vec<FavoriteRecord>> {
    match feed {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
