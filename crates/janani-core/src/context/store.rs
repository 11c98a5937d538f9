//! Keyed storage for [`ConversationContext`]s.
//!
//! Each caller key owns one slot guarded by its own async mutex. A turn
//! holds the slot through a [`ContextLease`] from the moment it reads the
//! context until it has written its reply back, so two deliveries of the
//! same webhook are applied one after the other instead of interleaving.
//!
//! Slots idle for longer than the configured TTL are treated as absent and
//! are dropped by [`ContextStore::evict_expired`].

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

use super::ConversationContext;
use crate::config::StoreConfig;

/// A stored context plus the bookkeeping needed for expiry.
#[derive(Debug)]
pub struct StoredContext {
    pub context: ConversationContext,
    pub last_seen: Instant,
}

impl StoredContext {
    pub fn new() -> Self {
        Self {
            context: ConversationContext::default(),
            last_seen: Instant::now(),
        }
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.last_seen.elapsed() > ttl
    }
}

impl Default for StoredContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive access to one caller's context for the duration of a turn.
///
/// Dereferences to [`ConversationContext`]. Dropping the lease releases the
/// caller's lock and marks the context as recently used.
#[derive(Debug)]
pub struct ContextLease {
    key: String,
    created: bool,
    guard: OwnedMutexGuard<StoredContext>,
}

impl ContextLease {
    pub fn new(key: impl Into<String>, created: bool, guard: OwnedMutexGuard<StoredContext>) -> Self {
        Self {
            key: key.into(),
            created,
            guard,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// `true` when this lease started a fresh context (first contact, or the
    /// previous one had expired).
    pub fn created(&self) -> bool {
        self.created
    }

    /// Copy of the context as it stands now.
    pub fn snapshot(&self) -> ConversationContext {
        self.guard.context.clone()
    }
}

impl Deref for ContextLease {
    type Target = ConversationContext;

    fn deref(&self) -> &Self::Target {
        &self.guard.context
    }
}

impl DerefMut for ContextLease {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard.context
    }
}

impl Drop for ContextLease {
    fn drop(&mut self) {
        self.guard.last_seen = Instant::now();
    }
}

/// Storage interface for per-caller contexts.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Lock the context for `key`, creating a fresh one if none exists or
    /// the existing one has expired. Waits while another turn holds it.
    async fn lease(&self, key: &str) -> ContextLease;

    /// Snapshot of the context for `key`, if a live one exists.
    async fn get(&self, key: &str) -> Option<ConversationContext>;

    /// Delete the context for `key`. Returns `true` if one existed.
    async fn remove(&self, key: &str) -> bool;

    /// Drop every expired context that no turn is currently holding.
    /// Returns how many were dropped.
    async fn evict_expired(&self) -> usize;

    /// Number of stored contexts, expired or not.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Process-local [`ContextStore`].
#[derive(Debug)]
pub struct InMemoryContextStore {
    slots: Mutex<HashMap<String, Arc<Mutex<StoredContext>>>>,
    ttl: Duration,
}

impl InMemoryContextStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            ttl: config.ttl,
        }
    }
}

impl Default for InMemoryContextStore {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn lease(&self, key: &str) -> ContextLease {
        loop {
            let (slot, mut created) = {
                let mut slots = self.slots.lock().await;
                match slots.get(key) {
                    Some(slot) => (Arc::clone(slot), false),
                    None => {
                        let slot = Arc::new(Mutex::new(StoredContext::new()));
                        slots.insert(key.to_string(), Arc::clone(&slot));
                        (slot, true)
                    }
                }
            };

            let mut guard = Arc::clone(&slot).lock_owned().await;

            // The slot may have been removed or evicted while we waited.
            let still_current = self
                .slots
                .lock()
                .await
                .get(key)
                .is_some_and(|current| Arc::ptr_eq(current, &slot));
            if !still_current {
                continue;
            }

            if !created && guard.is_expired(self.ttl) {
                tracing::debug!(key, "context expired, starting a fresh one");
                guard.context = ConversationContext::default();
                created = true;
            }
            guard.last_seen = Instant::now();
            return ContextLease::new(key, created, guard);
        }
    }

    async fn get(&self, key: &str) -> Option<ConversationContext> {
        let slot = self.slots.lock().await.get(key).cloned()?;
        let guard = slot.lock().await;
        if guard.is_expired(self.ttl) {
            return None;
        }
        Some(guard.context.clone())
    }

    async fn remove(&self, key: &str) -> bool {
        let removed = self.slots.lock().await.remove(key).is_some();
        if removed {
            tracing::debug!(key, "context removed");
        }
        removed
    }

    async fn evict_expired(&self) -> usize {
        let mut slots = self.slots.lock().await;
        let before = slots.len();
        // A slot whose lock is held belongs to an in-flight turn; leave it.
        slots.retain(|_, slot| match slot.try_lock() {
            Ok(stored) => !stored.is_expired(self.ttl),
            Err(_) => true,
        });
        let evicted = before - slots.len();
        if evicted > 0 {
            tracing::info!(evicted, remaining = slots.len(), "evicted idle contexts");
        }
        evicted
    }

    async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MessageRole;
    use crate::language::Language;

    fn store_with_ttl(secs: u64) -> InMemoryContextStore {
        InMemoryContextStore::new(&StoreConfig {
            ttl: Duration::from_secs(secs),
            ..StoreConfig::default()
        })
    }

    #[tokio::test]
    async fn lease_creates_then_reuses() {
        let store = store_with_ttl(60);
        {
            let mut lease = store.lease("caller-1").await;
            assert!(lease.created());
            lease.set_week(20);
        }
        let lease = store.lease("caller-1").await;
        assert!(!lease.created());
        assert_eq!(lease.pregnancy_week, Some(20));
        assert_eq!(lease.key(), "caller-1");
    }

    #[tokio::test]
    async fn get_unknown_is_none() {
        let store = store_with_ttl(60);
        assert!(store.get("nobody").await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn remove_existing_then_get_is_none() {
        let store = store_with_ttl(60);
        store.lease("user123").await.language = Language::Hindi;
        assert_eq!(store.get("user123").await.unwrap().language, Language::Hindi);

        assert!(store.remove("user123").await);
        assert!(store.get("user123").await.is_none());
        assert!(!store.remove("user123").await);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_contexts_expire() {
        let store = store_with_ttl(30);
        store.lease("old").await.set_week(10);
        tokio::time::advance(Duration::from_secs(20)).await;
        store.lease("fresh").await.set_week(30);
        tokio::time::advance(Duration::from_secs(15)).await;

        assert!(store.get("old").await.is_none(), "old should read as expired");
        assert!(store.get("fresh").await.is_some());

        assert_eq!(store.evict_expired().await, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_lease_starts_fresh() {
        let store = store_with_ttl(30);
        store.lease("caller").await.set_week(10);
        tokio::time::advance(Duration::from_secs(31)).await;

        let lease = store.lease("caller").await;
        assert!(lease.created());
        assert_eq!(lease.pregnancy_week, None);
    }

    #[tokio::test(start_paused = true)]
    async fn held_lease_is_not_evicted() {
        let store = store_with_ttl(30);
        let lease = store.lease("busy").await;
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(store.evict_expired().await, 0);
        drop(lease);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn leases_for_one_key_are_serialized() {
        let store = Arc::new(store_with_ttl(60));

        let mut first = store.lease("call").await;
        let store2 = Arc::clone(&store);
        let waiter = tokio::spawn(async move {
            let mut lease = store2.lease("call").await;
            lease.push_message(MessageRole::User, "second");
        });

        // The second turn cannot proceed while the first holds the lease.
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        first.push_message(MessageRole::User, "first");
        drop(first);

        waiter.await.unwrap();
        let ctx = store.get("call").await.unwrap();
        let texts: Vec<&str> = ctx.history.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let store = store_with_ttl(60);
        let _a = store.lease("a").await;
        let b = tokio::time::timeout(Duration::from_secs(1), store.lease("b")).await;
        assert!(b.is_ok());
    }
}
