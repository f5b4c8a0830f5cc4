use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use scrim_core::net::messages::{ServerEvent, TickMsg};

use crate::recorder::{MatchOptions, MatchRecorder};
use crate::state::SharedRegistry;

/// Owns one tick task per room. A room's task runs while the room has
/// players and is aborted (or breaks on its own) once the room is gone.
pub struct TickScheduler {
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TickScheduler {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Ensure a tick task is running for the room. Idempotent: a live
    /// task for the code is left alone, a finished one is replaced.
    pub async fn start(
        &self,
        code: &str,
        registry: &SharedRegistry,
        recorder: &Arc<dyn MatchRecorder>,
        period: Duration,
    ) {
        let mut tasks = self.tasks.lock().await;
        if let Some(handle) = tasks.get(code)
            && !handle.is_finished()
        {
            return;
        }
        let handle = tokio::spawn(run_room_ticks(
            code.to_string(),
            Arc::clone(registry),
            Arc::clone(recorder),
            period,
        ));
        tasks.insert(code.to_string(), handle);
        tracing::debug!(room = code, "Started tick loop");
    }

    /// Stop the room's tick task unless the room still has players.
    /// Safe to call for codes that were never scheduled.
    pub async fn stop_if_empty(&self, code: &str, registry: &SharedRegistry) {
        let occupied = {
            let reg = registry.read().await;
            reg.room(code).is_some_and(|room| !room.is_empty())
        };
        if occupied {
            return;
        }
        let handle = self.tasks.lock().await.remove(code);
        if let Some(handle) = handle {
            handle.abort();
            tracing::debug!(room = code, "Stopped tick loop");
        }
    }

    pub async fn is_active(&self, code: &str) -> bool {
        self.tasks
            .lock()
            .await
            .get(code)
            .is_some_and(|handle| !handle.is_finished())
    }
}

/// Per-room tick loop. Each pass advances the room clock under the
/// registry write lock and broadcasts the tick and state snapshot
/// before releasing it, so clients never observe a half-applied tick.
async fn run_room_ticks(
    code: String,
    registry: SharedRegistry,
    recorder: Arc<dyn MatchRecorder>,
    period: Duration,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let started = {
            let mut reg = registry.write().await;
            let Some(room) = reg.room_mut(&code) else {
                break;
            };
            let started = room.advance_tick();
            let tick = room.state.tick;
            reg.broadcast(&code, &ServerEvent::Tick(TickMsg { tick }));
            reg.broadcast_state(&code);
            started
        };
        if started {
            tracing::info!(room = %code, "Countdown complete, match started");
            spawn_match_persist(code.clone(), Arc::clone(&registry), Arc::clone(&recorder));
        }
    }
    tracing::debug!(room = %code, "Tick loop ended, room gone");
}

/// Record the match start without blocking the tick loop. When the
/// recorder answers, the id is stored on the room and the refreshed
/// state is broadcast; a recorder failure leaves the match running
/// with no id.
fn spawn_match_persist(code: String, registry: SharedRegistry, recorder: Arc<dyn MatchRecorder>) {
    tokio::spawn(async move {
        match recorder.record_match_start(&code, &MatchOptions::default()).await {
            Ok(match_id) => {
                let mut reg = registry.write().await;
                let stored = reg
                    .room_mut(&code)
                    .map(|room| room.state.match_id = Some(match_id))
                    .is_some();
                if stored {
                    reg.broadcast_state(&code);
                    tracing::info!(room = %code, match_id, "Recorded match start");
                }
            },
            Err(e) => {
                tracing::error!(room = %code, error = %e, "Failed to record match start");
            },
        }
    });
}
