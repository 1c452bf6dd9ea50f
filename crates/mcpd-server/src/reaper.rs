//! Generator registry and expiry reaper (C11, §4.11).
//!
//! Grounded on `PluginManager`'s `mutex<map<void*, Plugin*>>`
//! (`src/business/plugin_manager.h`/`.cpp`), which the specification's §9
//! Design Notes calls out for replacement: here the registry is keyed by
//! session id (`String`) rather than by generator pointer, and entries are
//! owned `Box<dyn Generator>` values rather than raw pointers paired with a
//! separately-tracked free-function pointer. `free` is a consuming method on
//! the trait object itself (see `mcpd_plugin::Generator`), so "free exactly
//! once" is a type-level guarantee: the moment a generator is taken out of
//! this registry, nothing else holds a reference to call `next` on it again.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mcpd_core::SessionCache;
use mcpd_plugin::Generator;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// How long a session may sit idle before the reaper reclaims its generator
/// (§4.11 "now − state.last_update > 5 minutes").
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// How often the reaper sweeps (§4.11 "Every 5 minutes").
pub const REAP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// `session_id -> generator` (§3 "Generator registry"). One lock, held only
/// for lookup/insert/remove — never across a `next()` call or I/O (§5
/// "Shared state and locking").
#[derive(Clone, Default)]
pub struct GeneratorRegistry {
    inner: Arc<Mutex<HashMap<String, Box<dyn Generator>>>>,
}

impl GeneratorRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly started generator for `session_id`. Reconnection
    /// must never call this for a session that already has one — see
    /// [`Self::get_or_take`] / [`Self::contains`].
    pub fn insert(&self, session_id: String, generator: Box<dyn Generator>) {
        self.inner.lock().insert(session_id, generator);
    }

    /// Whether a generator is currently registered for `session_id`.
    #[must_use]
    pub fn contains(&self, session_id: &str) -> bool {
        self.inner.lock().contains_key(session_id)
    }

    /// Take exclusive, owned access to the generator for `session_id` for
    /// the duration of one streaming task's life, removing it from the
    /// registry. The caller must put it back with [`Self::insert`] if the
    /// stream is merely paused (it is not — the coordinator either finishes
    /// and leaves cleanup to the reaper, or never removes it at all; see
    /// `coordinator::run`).
    pub fn remove(&self, session_id: &str) -> Option<Box<dyn Generator>> {
        self.inner.lock().remove(session_id)
    }

    /// Snapshot of every registered session id, for the reaper sweep.
    #[must_use]
    pub fn session_ids(&self) -> Vec<String> {
        self.inner.lock().keys().cloned().collect()
    }
}

/// Sweep `registry` once: free and remove every generator whose session has
/// gone idle (§4.11). Exposed separately from [`spawn`] so tests can drive a
/// single sweep deterministically.
pub async fn reap_once(registry: &GeneratorRegistry, sessions: &SessionCache) {
    let candidates = registry.session_ids();
    for session_id in candidates {
        let expired = match sessions.get_session_state(&session_id) {
            None => true,
            Some(state) => {
                let idle = chrono::Utc::now().signed_duration_since(state.last_update);
                idle.to_std().unwrap_or(Duration::ZERO) > IDLE_TIMEOUT
            }
        };
        if !expired {
            continue;
        }
        // Lock is released (via `remove`'s internal lock-and-return) before
        // `free` runs, matching "the reaper takes the generator registry
        // lock only long enough to snapshot candidates; `free` is called
        // outside the lock."
        if let Some(generator) = registry.remove(&session_id) {
            generator.free().await;
            tracing::info!(session_id = %session_id, "reaped idle stream generator");
        }
        sessions.cleanup_session(&session_id);
    }
}

/// A handle to the background reaper task; dropping it does not stop the
/// task — call [`Self::stop`].
pub struct ReaperHandle {
    token: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl ReaperHandle {
    /// Signal the reaper to stop and wait for it to exit.
    pub async fn stop(self) {
        self.token.cancel();
        let _ = self.task.await;
    }
}

/// Spawn the periodic reaper task (§4.11, redesigned per §9 as its own
/// independent `tokio::task` rather than piggy-backed on request handling).
pub fn spawn(registry: GeneratorRegistry, sessions: SessionCache, interval: Duration) -> ReaperHandle {
    let token = CancellationToken::new();
    let child = token.clone();
    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                () = child.cancelled() => break,
                () = tokio::time::sleep(interval) => reap_once(&registry, &sessions).await,
            }
        }
    });
    ReaperHandle { token, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mcpd_core::SessionState;
    use mcpd_plugin::GeneratorStep;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Dummy {
        freed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Generator for Dummy {
        async fn next(&mut self) -> GeneratorStep {
            GeneratorStep::End
        }
        async fn free(self: Box<Self>) {
            self.freed.store(true, Ordering::SeqCst);
        }
    }

    fn sessions() -> SessionCache {
        SessionCache::new(10, 10, Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn reaps_session_with_no_state() {
        let registry = GeneratorRegistry::new();
        let freed = Arc::new(AtomicBool::new(false));
        registry.insert("s1".into(), Box::new(Dummy { freed: Arc::clone(&freed) }));

        reap_once(&registry, &sessions()).await;

        assert!(freed.load(Ordering::SeqCst));
        assert!(!registry.contains("s1"));
    }

    #[tokio::test]
    async fn leaves_active_session_generator_alone() {
        let registry = GeneratorRegistry::new();
        let freed = Arc::new(AtomicBool::new(false));
        registry.insert("s1".into(), Box::new(Dummy { freed: Arc::clone(&freed) }));
        let sessions = sessions();
        sessions.save_session_state(&SessionState::new("s1", "example_stream"));

        reap_once(&registry, &sessions).await;

        assert!(!freed.load(Ordering::SeqCst));
        assert!(registry.contains("s1"));
    }

    #[tokio::test]
    async fn reaps_idle_session_past_timeout() {
        let registry = GeneratorRegistry::new();
        let freed = Arc::new(AtomicBool::new(false));
        registry.insert("s1".into(), Box::new(Dummy { freed: Arc::clone(&freed) }));
        let sessions = sessions();
        let mut state = SessionState::new("s1", "example_stream");
        state.last_update = chrono::Utc::now() - chrono::Duration::seconds(600);
        sessions.save_session_state(&state);

        reap_once(&registry, &sessions).await;

        assert!(freed.load(Ordering::SeqCst));
        assert!(sessions.get_session_state("s1").is_none());
    }
}
