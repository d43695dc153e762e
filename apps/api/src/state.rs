use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::driver::SessionHandle;
use crate::measure::MeasurementProvider;
use crate::pagination::PaginationConfig;

/// Upper bound on how often idle sessions are looked for.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// An open session and the last time a request reached it.
pub struct SessionEntry {
    pub handle: SessionHandle,
    pub last_access: Instant,
}

/// Open editing sessions keyed by session id.
pub type SessionStore = Arc<RwLock<HashMap<Uuid, SessionEntry>>>;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: SessionStore,
    /// Measures section content for server-side sessions.
    pub measurer: Arc<dyn MeasurementProvider>,
    /// Page geometry used when a request does not bring its own.
    pub page_config: PaginationConfig,
}

impl AppState {
    pub fn new(config: Config, measurer: Arc<dyn MeasurementProvider>) -> Self {
        Self {
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            measurer,
            page_config: PaginationConfig::default(),
        }
    }

    pub async fn insert_session(&self, id: Uuid, handle: SessionHandle) {
        self.sessions.write().await.insert(
            id,
            SessionEntry {
                handle,
                last_access: Instant::now(),
            },
        );
    }

    /// Looks a session up and marks it as recently used.
    pub async fn session(&self, id: Uuid) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&id)?;
        entry.last_access = Instant::now();
        Some(entry.handle.clone())
    }

    /// Closes sessions not accessed within `ttl` and returns how many were dropped.
    ///
    /// Removing the entry drops the store's handle; the actor stops once any
    /// request still holding a clone finishes.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let keep = now.saturating_duration_since(entry.last_access) < ttl;
            if !keep {
                debug!(session_id = %id, "Closing idle pagination session");
            }
            keep
        });
        before - sessions.len()
    }
}

/// Periodically evicts sessions idle for longer than `ttl`.
pub fn spawn_session_sweeper(state: AppState, ttl: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(SWEEP_INTERVAL.min(ttl));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = state.evict_idle(ttl).await;
            if evicted > 0 {
                info!(evicted, "Idle pagination sessions closed");
            }
        }
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::make_document;
    use crate::driver::spawn_session;
    use crate::measure::EstimatingMeasurer;

    fn make_state() -> AppState {
        AppState::new(Config::default(), Arc::new(EstimatingMeasurer::default()))
    }

    async fn open_session(state: &AppState) -> Uuid {
        let handle = spawn_session(
            make_document(),
            PaginationConfig::default(),
            Arc::clone(&state.measurer),
            Duration::from_millis(300),
        )
        .unwrap();
        let id = Uuid::new_v4();
        state.insert_session(id, handle).await;
        id
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_session_evicted_after_ttl() {
        let state = make_state();
        let id = open_session(&state).await;

        time::advance(Duration::from_secs(59)).await;
        assert_eq!(state.evict_idle(Duration::from_secs(60)).await, 0);
        assert!(state.session(id).await.is_some());

        time::advance(Duration::from_secs(61)).await;
        assert_eq!(state.evict_idle(Duration::from_secs(60)).await, 1);
        assert!(state.session(id).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_access_keeps_session_alive() {
        let state = make_state();
        let busy = open_session(&state).await;
        let idle = open_session(&state).await;

        for _ in 0..3 {
            time::advance(Duration::from_secs(40)).await;
            assert!(state.session(busy).await.is_some());
        }
        assert_eq!(state.evict_idle(Duration::from_secs(60)).await, 1);
        assert!(state.session(busy).await.is_some());
        assert!(state.session(idle).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_closes_idle_sessions() {
        let state = make_state();
        let id = open_session(&state).await;
        let sweeper = spawn_session_sweeper(state.clone(), Duration::from_secs(30));

        time::sleep(Duration::from_secs(65)).await;
        assert!(state.session(id).await.is_none());
        assert!(state.sessions.read().await.is_empty());
        sweeper.abort();
    }
}
