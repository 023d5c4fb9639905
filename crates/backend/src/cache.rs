//! In-memory user cache in front of the durable store.
//!
//! [`UserCache`] indexes user snapshots both by id and by email. Both
//! indices point at the same shared [`CacheEntry`] while a user is present,
//! and every operation that touches one side touches the other under the
//! same write lock, so a reader never sees half of a pair.
//!
//! # Expiry
//!
//! Entries carry an absolute expiry instant (`inserted + ttl`). Reads treat
//! an expired entry as absent immediately (lazy expiry); the background
//! sweeper started by [`UserCache::spawn_sweeper`] only reclaims memory for
//! entries nobody reads again.
//!
//! # Locking
//!
//! Reads take a shared lock and run in parallel; `put`, `invalidate` and
//! `sweep_expired` take the exclusive lock. No I/O and no `.await` happen
//! while a lock is held.
//!
//! A miss means "ask the durable store", never "the user does not exist".

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::models::User;

/// Default time-to-live for cached users (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default interval between background sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Immutable snapshot of a user plus its expiry. Replaced, never mutated.
#[derive(Debug)]
struct CacheEntry {
    user: User,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Default)]
struct Indexes {
    by_id: HashMap<i64, Arc<CacheEntry>>,
    by_email: HashMap<String, Arc<CacheEntry>>,
}

impl Indexes {
    /// Drop the id entry and its email counterpart.
    fn remove_id(&mut self, id: i64) -> Option<Arc<CacheEntry>> {
        let entry = self.by_id.remove(&id)?;
        if self
            .by_email
            .get(&entry.user.email)
            .is_some_and(|e| Arc::ptr_eq(e, &entry))
        {
            self.by_email.remove(&entry.user.email);
        }
        Some(entry)
    }

    /// Drop the email entry and its id counterpart.
    fn remove_email(&mut self, email: &str) {
        if let Some(entry) = self.by_email.remove(email) {
            if self
                .by_id
                .get(&entry.user.id)
                .is_some_and(|e| Arc::ptr_eq(e, &entry))
            {
                self.by_id.remove(&entry.user.id);
            }
        }
    }
}

/// Dual-indexed, TTL-expiring cache of user records.
pub struct UserCache {
    indexes: RwLock<Indexes>,
    ttl: Duration,
}

impl Default for UserCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl UserCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            indexes: RwLock::new(Indexes::default()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get_by_id(&self, id: i64) -> Option<User> {
        let now = Instant::now();
        let indexes = self.indexes.read();
        indexes
            .by_id
            .get(&id)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.user.clone())
    }

    pub fn get_by_email(&self, email: &str) -> Option<User> {
        let now = Instant::now();
        let indexes = self.indexes.read();
        indexes
            .by_email
            .get(email)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.user.clone())
    }

    /// Insert or replace the snapshot for `user` with a fresh expiry.
    ///
    /// Any previous entry for the same id is removed first, including its
    /// old email key when the email changed. If the email key currently
    /// belongs to another id, that id's entry goes too.
    pub fn put(&self, user: User) {
        let entry = Arc::new(CacheEntry {
            expires_at: Instant::now() + self.ttl,
            user,
        });
        let id = entry.user.id;
        let email = entry.user.email.clone();

        let mut indexes = self.indexes.write();
        indexes.remove_id(id);
        indexes.remove_email(&email);
        indexes.by_id.insert(id, Arc::clone(&entry));
        indexes.by_email.insert(email, entry);
    }

    /// Remove both index entries for `id`. No-op when absent.
    pub fn invalidate(&self, id: i64) {
        if self.indexes.write().remove_id(id).is_some() {
            tracing::trace!(user_id = id, "Invalidated cached user");
        }
    }

    /// Purge expired entries from both indices, returning how many users
    /// were dropped.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut indexes = self.indexes.write();
        let before = indexes.by_id.len();
        indexes.by_id.retain(|_, entry| entry.is_live(now));
        indexes.by_email.retain(|_, entry| entry.is_live(now));
        before - indexes.by_id.len()
    }

    /// Number of users currently indexed, expired or not.
    pub fn len(&self) -> usize {
        self.indexes.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start the periodic sweep. The task runs until the returned handle is
    /// shut down.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> CacheSweeper {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let cache = Arc::clone(self);

        let handle = tokio::spawn(async move {
            tracing::info!(
                interval_secs = every.as_secs(),
                ttl_secs = cache.ttl().as_secs(),
                "User cache sweeper started"
            );

            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let purged = cache.sweep_expired();
                        if purged > 0 {
                            tracing::debug!(purged, remaining = cache.len(), "Swept expired users from cache");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            tracing::info!("User cache sweeper shutting down");
                            break;
                        }
                    }
                }
            }
        });

        CacheSweeper {
            shutdown: shutdown_tx,
            handle,
        }
    }

    #[cfg(test)]
    fn assert_paired(&self) {
        let indexes = self.indexes.read();
        assert_eq!(indexes.by_id.len(), indexes.by_email.len());
        for (id, entry) in &indexes.by_id {
            assert_eq!(entry.user.id, *id);
            let twin = indexes
                .by_email
                .get(&entry.user.email)
                .expect("id entry without email counterpart");
            assert!(Arc::ptr_eq(entry, twin));
        }
    }
}

/// Handle to the background sweep task.
pub struct CacheSweeper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl CacheSweeper {
    /// Signal the task to stop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            tracing::warn!("User cache sweeper ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(id: i64, email: &str) -> User {
        let now = Utc::now();
        User {
            id,
            name: format!("user-{}", id),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            is_active: true,
            is_admin: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn put_indexes_both_keys_with_identical_snapshots() {
        let cache = UserCache::default();
        cache.put(user(1, "a@x.com"));

        let by_id = cache.get_by_id(1).expect("id hit");
        let by_email = cache.get_by_email("a@x.com").expect("email hit");
        assert_eq!(by_id, by_email);
        cache.assert_paired();
    }

    #[test]
    fn email_change_drops_old_email_key() {
        let cache = UserCache::default();
        cache.put(user(1, "old@x.com"));
        cache.put(user(1, "new@x.com"));

        assert!(cache.get_by_email("old@x.com").is_none());
        assert_eq!(cache.get_by_email("new@x.com").unwrap().id, 1);
        assert_eq!(cache.len(), 1);
        cache.assert_paired();
    }

    #[test]
    fn email_taken_over_by_other_id_evicts_stale_owner() {
        let cache = UserCache::default();
        cache.put(user(1, "shared@x.com"));
        // User 1 renamed in storage, user 2 now owns the address
        cache.put(user(2, "shared@x.com"));

        assert!(cache.get_by_id(1).is_none());
        assert_eq!(cache.get_by_email("shared@x.com").unwrap().id, 2);
        cache.assert_paired();
    }

    #[test]
    fn invalidate_removes_both_keys_and_tolerates_absent_ids() {
        let cache = UserCache::default();
        cache.put(user(1, "a@x.com"));
        cache.put(user(2, "b@x.com"));

        cache.invalidate(1);
        cache.invalidate(42);

        assert!(cache.get_by_id(1).is_none());
        assert!(cache.get_by_email("a@x.com").is_none());
        assert!(cache.get_by_id(2).is_some());
        cache.assert_paired();
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_exactly_at_ttl_without_sweeping() {
        let ttl = Duration::from_secs(300);
        let cache = UserCache::new(ttl);
        assert_eq!(cache.ttl(), ttl);
        cache.put(user(1, "a@x.com"));

        tokio::time::advance(ttl - Duration::from_millis(1)).await;
        assert!(cache.get_by_id(1).is_some());
        assert!(cache.get_by_email("a@x.com").is_some());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(cache.get_by_id(1).is_none());
        assert!(cache.get_by_email("a@x.com").is_none());
        // Still physically present until a sweep runs
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn put_refreshes_expiry() {
        let ttl = Duration::from_secs(60);
        let cache = UserCache::new(ttl);
        cache.put(user(1, "a@x.com"));

        tokio::time::advance(Duration::from_secs(45)).await;
        cache.put(user(1, "a@x.com"));
        tokio::time::advance(Duration::from_secs(45)).await;

        assert!(cache.get_by_id(1).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_purges_only_expired_pairs() {
        let cache = UserCache::new(Duration::from_secs(60));
        cache.put(user(1, "a@x.com"));
        tokio::time::advance(Duration::from_secs(30)).await;
        cache.put(user(2, "b@x.com"));
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get_by_email("b@x.com").is_some());
        cache.assert_paired();
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_reclaims_unread_entries_and_stops_on_shutdown() {
        let cache = Arc::new(UserCache::new(Duration::from_secs(300)));
        let sweeper = cache.spawn_sweeper(Duration::from_secs(60));
        cache.put(user(1, "a@x.com"));

        tokio::time::sleep(Duration::from_secs(400)).await;
        assert!(cache.is_empty());

        sweeper.shutdown().await;
        assert_eq!(Arc::strong_count(&cache), 1);
    }

    #[test]
    fn concurrent_writers_keep_indices_paired() {
        let cache = Arc::new(UserCache::default());

        std::thread::scope(|scope| {
            for worker in 0..4i64 {
                let cache = Arc::clone(&cache);
                scope.spawn(move || {
                    for round in 0..500i64 {
                        let id = round % 16;
                        // Emails collide across workers and ids on purpose
                        let email = format!("u{}@x.com", (round + worker) % 8);
                        match (round + worker) % 3 {
                            0 => cache.put(user(id, &email)),
                            1 => cache.invalidate(id),
                            _ => {
                                if let Some(found) = cache.get_by_id(id) {
                                    assert_eq!(found.id, id);
                                }
                            }
                        }
                    }
                });
            }
        });

        cache.assert_paired();
        for id in 0..16 {
            if let Some(found) = cache.get_by_id(id) {
                assert_eq!(cache.get_by_email(&found.email), Some(found));
            }
        }
    }
}
