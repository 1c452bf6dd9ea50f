//! Stream coordinator (C10, §4.10) — the subtlest part of the server.
//!
//! Grounded on the commented-out `SSETransport::HandleStreamRequest` control
//! flow (`src/transport/sse_transport.cpp`: prelude, replay-then-live loop,
//! `next`/`free` on the plugin's generator) combined with §9 Design Notes'
//! redesign of that control flow into "a single stream-coordinator task per
//! streaming call, owning the generator and driving both the replay phase
//! and the live phase sequentially."
//!
//! Runs as its own `tokio::task`, spawned by the dispatch glue once it marks
//! the connection session upgraded; from that point this function owns every
//! write to the session until it returns.

use std::sync::Arc;

use mcpd_core::SessionState;
use mcpd_plugin::GeneratorStep;
use serde_json::Value;

use mcpd_transport::ConnectionSession;

use crate::sse;
use crate::state::AppState;

/// Fixed code for the "generator could not be respawned after expiry"
/// terminal error (§8 S6); not a [`mcpd_plugin::PluginError`] since no
/// plugin call produced it.
const SESSION_EXPIRED_CODE: i64 = -32000;

/// Drive one streaming `tools/call` end to end: reconnection detection,
/// prelude, generator acquisition, replay, live streaming, cleanup.
///
/// `tool_name`/`arguments` are the values to start a *new* generator with —
/// either parsed straight from the triggering `tools/call` request, or (for a
/// bare reconnect with no fresh arguments, e.g. a listening `GET`) the
/// `tool_name` recorded in the existing session state paired with an empty
/// arguments object. See `DESIGN.md` for why a respawned generator always
/// restarts with empty arguments: the original arguments are never persisted
/// past the call that started the stream.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    state: Arc<AppState>,
    session: Arc<ConnectionSession>,
    session_id: String,
    request_id: Value,
    tool_name: String,
    arguments: Value,
    last_event_id_header: Option<u64>,
) {
    let existing_state = state.sessions.get_session_state(&session_id);
    let is_reconnect = last_event_id_header.is_some() && existing_state.is_some();

    session
        .write(sse::prelude(&session_id).as_bytes())
        .await;
    session.write(sse::session_init(&request_id, &session_id).as_bytes()).await;

    let mut generator = if is_reconnect {
        match acquire_for_reconnect(&state, &session, &session_id, &tool_name, arguments).await {
            Some(g) => g,
            None => return,
        }
    } else {
        match acquire_new(&state, &session, &session_id, &tool_name, arguments).await {
            Some(g) => g,
            None => return,
        }
    };

    let mut next_id = if is_reconnect {
        replay(&state, &session, &session_id, last_event_id_header.unwrap_or(0)).await
    } else {
        1
    };

    loop {
        if session.is_closed() {
            break;
        }
        match generator.next().await {
            GeneratorStep::End => {
                session.write(sse::complete(next_id).as_bytes()).await;
                break;
            }
            GeneratorStep::Error(e) => {
                session.write(sse::error(e.code, &e.message).as_bytes()).await;
                break;
            }
            GeneratorStep::More(payload) => {
                let event_id = next_id;
                next_id += 1;
                if !session.is_closed() {
                    session.write(sse::message(event_id, &payload).as_bytes()).await;
                }
                // Cache and bump state regardless of write outcome above —
                // this is what makes replay after a mid-write drop work
                // (§4.10 step 6, §5 "write-then-cache ordering").
                state.sessions.cache_stream_data(&session_id, event_id, &payload);
                state.sessions.update_session_state(&session_id, event_id);
            }
        }
    }

    // §4.10 step 7: never free here. Leave the generator registered so the
    // reaper (C11) reclaims it after the idle timeout, whether this loop
    // ended normally, on error, or because the client vanished mid-stream.
    state.generators.insert(session_id.clone(), generator);
    session.close().await;
}

async fn acquire_new(
    state: &AppState,
    session: &ConnectionSession,
    session_id: &str,
    tool_name: &str,
    arguments: Value,
) -> Option<Box<dyn mcpd_plugin::Generator>> {
    match state.registry.start_stream(tool_name, arguments).await {
        Some(Ok(generator)) => {
            state.sessions.save_session_state(&SessionState::new(session_id, tool_name));
            Some(generator)
        }
        Some(Err(e)) => {
            state.sessions.save_session_state(&SessionState::new(session_id, tool_name));
            session.write(sse::error(e.code, &e.message).as_bytes()).await;
            session.close().await;
            None
        }
        None => {
            state.sessions.save_session_state(&SessionState::new(session_id, tool_name));
            session
                .write(sse::error(mcpd_core::jsonrpc::error_code::METHOD_NOT_FOUND, "Tool not found").as_bytes())
                .await;
            session.close().await;
            None
        }
    }
}

async fn acquire_for_reconnect(
    state: &AppState,
    session: &ConnectionSession,
    session_id: &str,
    tool_name: &str,
    arguments: Value,
) -> Option<Box<dyn mcpd_plugin::Generator>> {
    if let Some(generator) = state.generators.remove(session_id) {
        return Some(generator);
    }

    // Expired / reaped: try to respawn (§4.10 step 4, §8 S6).
    match state.registry.start_stream(tool_name, arguments).await {
        Some(Ok(generator)) => Some(generator),
        _ => {
            session
                .write(sse::error(SESSION_EXPIRED_CODE, "session expired, please restart request").as_bytes())
                .await;
            session.close().await;
            None
        }
    }
}

/// Replay cached frames at their original event ids, then return the
/// authoritative next event id for the live phase: `max(last_event_id,
/// highest id replayed) + 1`, computed once here (§4.10 step 5-6, §9 Open
/// Question 1).
async fn replay(state: &AppState, session: &ConnectionSession, session_id: &str, last_event_id: u64) -> u64 {
    let mut highest = last_event_id;
    for (event_id, payload) in state.sessions.get_reconnect_entries(session_id, last_event_id) {
        if session.is_closed() {
            break;
        }
        session.write(sse::message(event_id, &payload).as_bytes()).await;
        state.sessions.update_session_state(session_id, event_id);
        highest = highest.max(event_id);
    }
    highest + 1
}
