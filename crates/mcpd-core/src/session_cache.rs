//! Typed façade over three [`LruTtlCache`] instances providing the session
//! resumption guarantee (§4.2).
//!
//! Grounded on `mcp::cache::McpCache` (`SaveSessionState`/`GetSessionState`/
//! `UpdateSessionState`/`CacheStreamData`/`GetReconnectData`/`CleanupSession`),
//! but constructed as an ordinary owned value instead of a `GetInstance()`
//! singleton — see §9 Design Notes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::LruTtlCache;

/// Durable per-session bookkeeping (§3 "Session state").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    /// Session identifier (32 hex chars).
    pub session_id: String,
    /// Name of the tool this session is streaming.
    pub tool_name: String,
    /// Highest event id written to the socket and cached so far.
    pub last_event_id: u64,
    /// Whether the session is still considered live.
    pub is_active: bool,
    /// Last time this state was touched.
    pub last_update: chrono::DateTime<chrono::Utc>,
}

impl SessionState {
    /// A fresh session state for a newly started stream.
    #[must_use]
    pub fn new(session_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            tool_name: tool_name.into(),
            last_event_id: 0,
            is_active: true,
            last_update: chrono::Utc::now(),
        }
    }
}

/// Typed façade over C1 caches for session state, per-event payloads, and
/// per-session event-id lists (§4.2).
#[derive(Clone)]
pub struct SessionCache {
    session_cache: LruTtlCache<String, String>,
    data_cache: LruTtlCache<String, String>,
    event_list_cache: LruTtlCache<String, String>,
    max_events_per_session: usize,
}

fn session_key(id: &str) -> String {
    format!("session:{id}")
}

fn data_key(id: &str, event_id: u64) -> String {
    format!("data:{id}:{event_id}")
}

fn event_list_key(id: &str) -> String {
    format!("event_list:{id}")
}

impl SessionCache {
    /// Construct the three underlying caches per §4.2's capacity rules.
    #[must_use]
    pub fn new(max_sessions: usize, max_events_per_session: usize, ttl: Duration) -> Self {
        const HOT_THRESHOLD: u64 = 10;
        Self {
            session_cache: LruTtlCache::new(max_sessions, HOT_THRESHOLD, Some(ttl)),
            data_cache: LruTtlCache::new(max_sessions * max_events_per_session * 2, HOT_THRESHOLD, Some(ttl)),
            event_list_cache: LruTtlCache::new(max_sessions, HOT_THRESHOLD, Some(ttl)),
            max_events_per_session,
        }
    }

    /// Start background reapers for all three underlying caches.
    pub fn start_reapers(&self, interval: Duration) -> Vec<crate::cache::ReaperHandle> {
        vec![
            self.session_cache.start_reaper(interval),
            self.data_cache.start_reaper(interval),
            self.event_list_cache.start_reaper(interval),
        ]
    }

    /// Persist `state`. Idempotent on the terminal state.
    pub fn save_session_state(&self, state: &SessionState) -> bool {
        match serde_json::to_string(state) {
            Ok(json) => {
                self.session_cache.put(session_key(&state.session_id), json, None);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, session_id = %state.session_id, "failed to serialize session state");
                false
            }
        }
    }

    /// Look up session state by id.
    pub fn get_session_state(&self, id: &str) -> Option<SessionState> {
        let raw = self.session_cache.get(&session_key(id))?;
        match serde_json::from_str(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!(error = %e, session_id = %id, "corrupt session state in cache");
                None
            }
        }
    }

    /// Read, bump `last_event_id`/`last_update`, and write back. Returns
    /// `false` (and warns) if the session is absent.
    pub fn update_session_state(&self, id: &str, event_id: u64) -> bool {
        let Some(mut state) = self.get_session_state(id) else {
            tracing::warn!(session_id = %id, "update_session_state on unknown session");
            return false;
        };
        state.last_event_id = event_id;
        state.last_update = chrono::Utc::now();
        self.save_session_state(&state)
    }

    /// Cache `payload` under `(id, event_id)` and append `event_id` to the
    /// session's event list (deduplicated, trimmed from the front to
    /// `max_events_per_session`).
    pub fn cache_stream_data(&self, id: &str, event_id: u64, payload: &serde_json::Value) -> bool {
        let Ok(payload_json) = serde_json::to_string(payload) else {
            return false;
        };
        self.data_cache.put(data_key(id, event_id), payload_json, None);

        let mut list = self.read_event_list(id);
        if !list.contains(&event_id) {
            list.push(event_id);
            if list.len() > self.max_events_per_session {
                let overflow = list.len() - self.max_events_per_session;
                list.drain(0..overflow);
            }
            self.write_event_list(id, &list);
        }
        true
    }

    /// Payloads with `event_id > last_received_event_id`, ascending, skipping
    /// any evicted entries silently.
    pub fn get_reconnect_data(&self, id: &str, last_received_event_id: u64) -> Vec<serde_json::Value> {
        self.get_reconnect_entries(id, last_received_event_id)
            .into_iter()
            .map(|(_, payload)| payload)
            .collect()
    }

    /// Same as [`Self::get_reconnect_data`] but keeps each payload paired
    /// with its original event id, since the stream coordinator re-emits
    /// replayed frames under their original `id:` rather than renumbering
    /// them (§4.10 step 5, S5: eviction leaves gaps, it never shifts ids).
    pub fn get_reconnect_entries(&self, id: &str, last_received_event_id: u64) -> Vec<(u64, serde_json::Value)> {
        let mut list: Vec<u64> = self
            .read_event_list(id)
            .into_iter()
            .filter(|&e| e > last_received_event_id)
            .collect();
        list.sort_unstable();

        list.into_iter()
            .filter_map(|event_id| self.data_cache.get(&data_key(id, event_id)).map(|raw| (event_id, raw)))
            .filter_map(|(event_id, raw)| serde_json::from_str(&raw).ok().map(|payload| (event_id, payload)))
            .collect()
    }

    /// Delete session state, event list, and every payload it references.
    pub fn cleanup_session(&self, id: &str) {
        let list = self.read_event_list(id);
        for event_id in list {
            self.data_cache.remove(&data_key(id, event_id));
        }
        self.event_list_cache.remove(&event_list_key(id));
        self.session_cache.remove(&session_key(id));
    }

    fn read_event_list(&self, id: &str) -> Vec<u64> {
        self.event_list_cache
            .get(&event_list_key(id))
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    fn write_event_list(&self, id: &str, list: &[u64]) {
        if let Ok(json) = serde_json::to_string(list) {
            self.event_list_cache.put(event_list_key(id), json, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> SessionCache {
        SessionCache::new(10, 5, Duration::from_secs(3600))
    }

    #[test]
    fn save_and_get_round_trip() {
        let cache = cache();
        let state = SessionState::new("abc", "echo");
        assert!(cache.save_session_state(&state));
        let fetched = cache.get_session_state("abc").unwrap();
        assert_eq!(fetched.session_id, "abc");
        assert_eq!(fetched.last_event_id, 0);
    }

    #[test]
    fn update_on_unknown_session_fails() {
        let cache = cache();
        assert!(!cache.update_session_state("missing", 3));
    }

    #[test]
    fn update_bumps_last_event_id() {
        let cache = cache();
        cache.save_session_state(&SessionState::new("s1", "echo"));
        assert!(cache.update_session_state("s1", 5));
        assert_eq!(cache.get_session_state("s1").unwrap().last_event_id, 5);
    }

    #[test]
    fn reconnect_data_is_ascending_and_skips_gaps() {
        let cache = cache();
        for id in [1u64, 2, 3, 5] {
            cache.cache_stream_data("s1", id, &serde_json::json!({"n": id}));
        }
        let data = cache.get_reconnect_data("s1", 2);
        let ns: Vec<u64> = data.iter().map(|v| v["n"].as_u64().unwrap()).collect();
        assert_eq!(ns, vec![3, 5]);
    }

    #[test]
    fn reconnect_beyond_any_cached_id_replays_nothing() {
        let cache = cache();
        cache.cache_stream_data("s1", 1, &serde_json::json!({"n": 1}));
        assert!(cache.get_reconnect_data("s1", 100).is_empty());
    }

    #[test]
    fn event_list_trims_from_front() {
        let cache = SessionCache::new(10, 3, Duration::from_secs(3600));
        for id in 1u64..=5 {
            cache.cache_stream_data("s1", id, &serde_json::json!({"n": id}));
        }
        let list = cache.read_event_list("s1");
        assert_eq!(list, vec![3, 4, 5]);
    }

    #[test]
    fn cleanup_removes_state_list_and_payloads() {
        let cache = cache();
        cache.save_session_state(&SessionState::new("s1", "echo"));
        cache.cache_stream_data("s1", 1, &serde_json::json!({"n": 1}));
        cache.cleanup_session("s1");
        assert!(cache.get_session_state("s1").is_none());
        assert!(cache.get_reconnect_data("s1", 0).is_empty());
    }

    #[test]
    fn cleanup_is_idempotent() {
        let cache = cache();
        cache.save_session_state(&SessionState::new("s1", "echo"));
        cache.cleanup_session("s1");
        cache.cleanup_session("s1");
        assert!(cache.get_session_state("s1").is_none());
    }
}
