//! Regeneration lock tokens and the RAII release guard.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::domain::WidgetId;

use super::store::CacheStore;

/// Ephemeral token proving ownership of a regeneration lock for one
/// (widget id, cache key) pair. Tokens exist only inside the store's bound
/// hold time; an unreleased token expires on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    pub widget_id: WidgetId,
    pub key: String,
    pub id: u64,
}

/// Holds an acquired lock and releases it on drop, so release runs on every
/// exit path of the render pipeline, including error propagation.
pub struct LockGuard {
    store: Arc<dyn CacheStore>,
    token: Option<LockToken>,
}

impl LockGuard {
    /// Try to acquire the lock; `None` means another worker holds it. The
    /// acquired lock expires `hold` after acquisition if release is missed.
    pub fn acquire(
        store: &Arc<dyn CacheStore>,
        widget_id: WidgetId,
        key: &str,
        hold: Duration,
    ) -> Option<Self> {
        let token = store.acquire_lock(widget_id, key, hold)?;
        Some(Self {
            store: Arc::clone(store),
            token: Some(token),
        })
    }

    pub fn token(&self) -> Option<&LockToken> {
        self.token.as_ref()
    }

    /// Release explicitly. Equivalent to dropping the guard.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(token) = self.token.take() {
            self.store.release_lock(&token);
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard").field("token", &self.token).finish()
    }
}

/// Log helper for a write that was refused because the held token was no
/// longer current (expired or superseded).
pub(crate) fn warn_stale_token(token: &LockToken) {
    warn!(
        widget_id = token.widget_id,
        cache_key = %token.key,
        lock_id = token.id,
        "cache write skipped, regeneration lock no longer current"
    );
}
