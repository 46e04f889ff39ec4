use super::models::ApiKey;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Every active key as read by one store query, stamped with the time of that
/// read.
#[derive(Debug)]
pub struct CredentialSnapshot {
    keys: HashMap<String, ApiKey>,
    loaded_at: Instant,
}

impl CredentialSnapshot {
    pub fn get(&self, domain: &str) -> Option<&ApiKey> {
        self.keys.get(domain)
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.keys.contains_key(domain)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.loaded_at.elapsed() < ttl
    }
}

#[derive(Debug, Default)]
struct CacheState {
    generation: u64,
    current: Option<Arc<CredentialSnapshot>>,
}

/// Process wide domain -> key mapping. The mapping is only ever swapped as a
/// whole or cleared; entries are never edited in place.
///
/// Every invalidation bumps a generation counter. A load started under an
/// older generation is never installed.
#[derive(Debug)]
pub struct CredentialCache {
    ttl: Duration,
    state: RwLock<CacheState>,
}

impl CredentialCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(CacheState::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The current mapping, stale or not.
    pub fn snapshot(&self) -> Option<Arc<CredentialSnapshot>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    /// Taken before reading the store, and handed back to `replace`.
    pub fn generation(&self) -> u64 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    pub fn fresh_snapshot(&self) -> Option<Arc<CredentialSnapshot>> {
        self.snapshot().filter(|s| s.is_fresh(self.ttl))
    }

    /// Installs `keys` unless the cache was invalidated since `generation`
    /// was taken. The snapshot is returned either way so the caller can still
    /// answer from what it read.
    pub fn replace(
        &self,
        generation: u64,
        keys: HashMap<String, ApiKey>,
    ) -> Arc<CredentialSnapshot> {
        let snapshot = Arc::new(CredentialSnapshot {
            keys,
            loaded_at: Instant::now(),
        });
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.generation == generation {
            state.current = Some(Arc::clone(&snapshot));
        } else {
            tracing::debug!("Discarding API keys loaded before the last invalidation");
        }
        snapshot
    }

    pub fn invalidate(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.generation = state.generation.wrapping_add(1);
        state.current = None;
    }
}

impl Default for CredentialCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}
