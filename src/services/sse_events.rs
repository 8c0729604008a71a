use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    dto::{
        snapshot::{DisplaySnapshot, HostSnapshot},
        sse::{LifelineResolvedEvent, ServerEvent, SystemStatus, TransitionEvent},
    },
    state::{
        SharedState,
        lifeline_timer::{Resolution, TimerView},
        sync::SyncedSnapshot,
        transitions::TransitionOutcome,
    },
};

pub const EVENT_SNAPSHOT: &str = "snapshot";
const EVENT_TRANSITION: &str = "game.transition";
const EVENT_LIFELINE_TICK: &str = "lifeline.tick";
const EVENT_LIFELINE_RESOLVED: &str = "lifeline.resolved";
const EVENT_SYSTEM_STATUS: &str = "system_status";

/// Announce an applied host action on both streams.
pub fn broadcast_transition(state: &SharedState, outcome: &TransitionOutcome) {
    let payload = TransitionEvent::from(outcome);
    send_display_event(state, EVENT_TRANSITION, &payload);
    send_host_event(state, EVENT_TRANSITION, &payload);
}

/// Push the current countdown reading to both streams.
pub fn broadcast_lifeline_tick(state: &SharedState, view: &TimerView) {
    send_display_event(state, EVENT_LIFELINE_TICK, view);
    send_host_event(state, EVENT_LIFELINE_TICK, view);
}

pub fn broadcast_lifeline_resolved(state: &SharedState, resolution: Resolution) {
    let payload = LifelineResolvedEvent { resolution };
    send_display_event(state, EVENT_LIFELINE_RESOLVED, &payload);
    send_host_event(state, EVENT_LIFELINE_RESOLVED, &payload);
}

/// Broadcast degraded mode changes to both streams.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    let payload = SystemStatus { degraded };
    send_display_event(state, EVENT_SYSTEM_STATUS, &payload);
    send_host_event(state, EVENT_SYSTEM_STATUS, &payload);
}

/// Project `snapshot` for each audience and broadcast it.
pub fn broadcast_snapshot(state: &SharedState, snapshot: &SyncedSnapshot) {
    let display = DisplaySnapshot::build(snapshot, state.config());
    send_display_event(state, EVENT_SNAPSHOT, &display);
    let host = HostSnapshot::build(snapshot, state.config(), state.is_degraded());
    send_host_event(state, EVENT_SNAPSHOT, &host);
}

/// Forward every snapshot publication and degraded flip to the SSE hubs.
pub fn spawn_publishers(state: SharedState) -> JoinHandle<()> {
    let mut snapshots = state.sync().subscribe();
    let mut degraded = state.degraded_watcher();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = snapshots.borrow_and_update().clone();
                    debug!(generation = snapshot.generation, "publishing snapshot");
                    broadcast_snapshot(&state, &snapshot);
                }
                changed = degraded.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let value = *degraded.borrow_and_update();
                    broadcast_system_status(&state, value);
                }
            }
        }
    })
}

fn send_display_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.display_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize display SSE payload"),
    }
}

fn send_host_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.host_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize host SSE payload"),
    }
}
