use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::RwLock;

use scrim_core::player::PlayerId;

use crate::config::ServerConfig;
use crate::recorder::MatchRecorder;
use crate::registry::RoomRegistry;
use crate::ticker::TickScheduler;

pub type SharedRegistry = Arc<RwLock<RoomRegistry>>;

#[derive(Clone)]
pub struct AppState {
    pub registry: SharedRegistry,
    pub ticker: Arc<TickScheduler>,
    pub recorder: Arc<dyn MatchRecorder>,
    pub config: Arc<ServerConfig>,
    pub ws_connection_count: Arc<AtomicUsize>,
    next_conn_id: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(config: ServerConfig, recorder: Arc<dyn MatchRecorder>) -> Self {
        Self {
            registry: Arc::new(RwLock::new(RoomRegistry::new())),
            ticker: Arc::new(TickScheduler::new()),
            recorder,
            config: Arc::new(config),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
            next_conn_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Allocate the next connection id. Connection identity doubles as
    /// player identity for the lifetime of the socket.
    pub fn alloc_conn_id(&self) -> PlayerId {
        self.next_conn_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// RAII guard for the WebSocket connection counter.
pub struct ConnectionGuard {
    count: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self { count }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}
