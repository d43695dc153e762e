//! Session actor: runs a `PaginationSession` and its `RecalcScheduler` on a
//! tokio task.
//!
//! Edits arrive as commands over an mpsc channel; every published snapshot is
//! broadcast on a watch channel, so readers never wait on a calculation and
//! never see a half-applied one. Measurement runs on a spawned task while the
//! actor keeps accepting commands, and at most one such task exists at a time.

use std::future::pending;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::document::CvDocument;
use crate::driver::scheduler::{RecalcScheduler, ScheduleAction};
use crate::driver::session::{
    CalculationResult, MoveDirection, NavigateAction, PaginationSession, PaginationSnapshot,
};
use crate::driver::DriverError;
use crate::measure::MeasurementProvider;
use crate::pagination::PaginationConfig;

const COMMAND_BUFFER: usize = 64;

enum DriverCommand {
    UpdateDocument(CvDocument),
    UpdateConfig {
        config: PaginationConfig,
        reply: oneshot::Sender<Result<(), DriverError>>,
    },
    Reorder {
        from: usize,
        to: usize,
        reply: oneshot::Sender<bool>,
    },
    Move {
        section_id: String,
        direction: MoveDirection,
        reply: oneshot::Sender<Result<bool, DriverError>>,
    },
    Navigate {
        action: NavigateAction,
        reply: oneshot::Sender<bool>,
    },
    JumpToSection {
        section_id: String,
        reply: oneshot::Sender<Result<u32, DriverError>>,
    },
    /// Replies with the snapshot once no calculation is pending or running.
    Flush {
        reply: oneshot::Sender<Arc<PaginationSnapshot>>,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// Handle
// ────────────────────────────────────────────────────────────────────────────

/// Cloneable handle to a running session. The actor stops when the last handle is dropped.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<DriverCommand>,
    snapshots: watch::Receiver<Arc<PaginationSnapshot>>,
}

impl SessionHandle {
    /// Latest published snapshot. Never blocks.
    pub fn snapshot(&self) -> Arc<PaginationSnapshot> {
        Arc::clone(&self.snapshots.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<PaginationSnapshot>> {
        self.snapshots.clone()
    }

    /// Replaces the document; the recalculation is debounced.
    ///
    /// The document is validated here so the caller learns about a bad one
    /// without waiting for the actor.
    pub async fn update_document(&self, document: CvDocument) -> Result<(), DriverError> {
        document.validate()?;
        self.commands
            .send(DriverCommand::UpdateDocument(document))
            .await
            .map_err(|_| DriverError::Closed)
    }

    pub async fn update_config(&self, config: PaginationConfig) -> Result<(), DriverError> {
        self.request(|reply| DriverCommand::UpdateConfig { config, reply })
            .await?
    }

    pub async fn reorder(&self, from: usize, to: usize) -> Result<bool, DriverError> {
        self.request(|reply| DriverCommand::Reorder { from, to, reply })
            .await
    }

    pub async fn move_section(
        &self,
        section_id: impl Into<String>,
        direction: MoveDirection,
    ) -> Result<bool, DriverError> {
        let section_id = section_id.into();
        self.request(|reply| DriverCommand::Move {
            section_id,
            direction,
            reply,
        })
        .await?
    }

    pub async fn navigate(&self, action: NavigateAction) -> Result<bool, DriverError> {
        self.request(|reply| DriverCommand::Navigate { action, reply })
            .await
    }

    pub async fn jump_to_section(&self, section_id: impl Into<String>) -> Result<u32, DriverError> {
        let section_id = section_id.into();
        self.request(|reply| DriverCommand::JumpToSection { section_id, reply })
            .await?
    }

    /// Runs any pending calculation immediately and waits for the session to go idle.
    pub async fn flush(&self) -> Result<Arc<PaginationSnapshot>, DriverError> {
        self.request(|reply| DriverCommand::Flush { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> DriverCommand,
    ) -> Result<T, DriverError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| DriverError::Closed)?;
        rx.await.map_err(|_| DriverError::Closed)
    }
}

/// Starts a session actor on the current runtime and schedules the first calculation.
pub fn spawn_session(
    document: CvDocument,
    config: PaginationConfig,
    provider: Arc<dyn MeasurementProvider>,
    debounce: Duration,
) -> Result<SessionHandle, DriverError> {
    let session = PaginationSession::new(document, config)?;
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());

    let mut scheduler = RecalcScheduler::new(debounce);
    scheduler.request_now_at(now());

    let actor = SessionActor {
        session,
        scheduler,
        provider,
        commands: command_rx,
        snapshots: snapshot_tx,
        inflight: None,
        flush_waiters: Vec::new(),
    };
    tokio::spawn(actor.run());

    Ok(SessionHandle {
        commands: command_tx,
        snapshots: snapshot_rx,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Actor
// ────────────────────────────────────────────────────────────────────────────

struct SessionActor {
    session: PaginationSession,
    scheduler: RecalcScheduler,
    provider: Arc<dyn MeasurementProvider>,
    commands: mpsc::Receiver<DriverCommand>,
    snapshots: watch::Sender<Arc<PaginationSnapshot>>,
    inflight: Option<JoinHandle<CalculationResult>>,
    flush_waiters: Vec<oneshot::Sender<Arc<PaginationSnapshot>>>,
}

impl SessionActor {
    async fn run(mut self) {
        info!(
            debounce_ms = self.scheduler.debounce().as_millis() as u64,
            "Pagination session started"
        );
        loop {
            let deadline = self.scheduler.deadline();
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                joined = join_inflight(&mut self.inflight) => {
                    self.inflight = None;
                    self.finish_calculation(joined);
                }
                _ = wait_for(deadline) => {
                    if self.scheduler.tick_at(now()) == ScheduleAction::StartCalculation {
                        self.start_calculation();
                    }
                }
            }
            self.sync_calculating();
        }

        if let Some(handle) = self.inflight.take() {
            handle.abort();
        }
        info!(
            coalesced_edits = self.scheduler.coalesced_edits(),
            "Pagination session stopped"
        );
    }

    fn handle(&mut self, command: DriverCommand) {
        match command {
            DriverCommand::UpdateDocument(document) => match self.session.update_document(document) {
                Ok(()) => {
                    self.scheduler.edit_at(now());
                }
                Err(e) => warn!(error = %e, "Document update rejected"),
            },
            DriverCommand::UpdateConfig { config, reply } => {
                let result = self.session.update_config(config);
                if result.is_ok() {
                    self.scheduler.request_now_at(now());
                }
                let _ = reply.send(result);
            }
            DriverCommand::Reorder { from, to, reply } => {
                let moved = self.session.reorder_section(from, to);
                if moved {
                    self.scheduler.request_now_at(now());
                }
                let _ = reply.send(moved);
            }
            DriverCommand::Move {
                section_id,
                direction,
                reply,
            } => {
                let result = self.session.move_section(&section_id, direction);
                if result == Ok(true) {
                    self.scheduler.request_now_at(now());
                }
                let _ = reply.send(result);
            }
            DriverCommand::Navigate { action, reply } => {
                let moved = self.session.navigate(action);
                self.publish();
                let _ = reply.send(moved);
            }
            DriverCommand::JumpToSection { section_id, reply } => {
                let result = self.session.jump_to_section(&section_id);
                if result.is_ok() {
                    self.publish();
                }
                let _ = reply.send(result);
            }
            DriverCommand::Flush { reply } => {
                if !self.scheduler.is_busy() {
                    let _ = reply.send(self.session.snapshot());
                    return;
                }
                if self.scheduler.deadline().is_some() {
                    self.scheduler.request_now_at(now());
                }
                self.flush_waiters.push(reply);
            }
        }
    }

    fn start_calculation(&mut self) {
        let job = self.session.prepare_calculation();
        let provider = Arc::clone(&self.provider);
        debug!(stale = job.stale.len(), "Starting pagination calculation");
        self.inflight = Some(tokio::spawn(async move { job.run(provider.as_ref()).await }));
    }

    fn finish_calculation(&mut self, joined: Result<CalculationResult, JoinError>) {
        match joined {
            Ok(result) => {
                self.session.apply_calculation(result);
            }
            // The previous snapshot stays published; the next edit retries.
            Err(e) => error!(error = %e, "Pagination calculation task failed"),
        }
        self.scheduler.complete_at(now());
        self.publish();

        if !self.scheduler.is_busy() {
            let snapshot = self.session.snapshot();
            for waiter in self.flush_waiters.drain(..) {
                let _ = waiter.send(Arc::clone(&snapshot));
            }
        }
    }

    /// Mirrors the scheduler's busy state into the published snapshot.
    fn sync_calculating(&mut self) {
        if self.session.set_calculating(self.scheduler.is_busy()) {
            self.publish();
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.session.snapshot());
    }
}

fn now() -> Instant {
    time::Instant::now().into_std()
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(time::Instant::from_std(deadline)).await,
        None => pending().await,
    }
}

async fn join_inflight(
    inflight: &mut Option<JoinHandle<CalculationResult>>,
) -> Result<CalculationResult, JoinError> {
    match inflight {
        Some(handle) => handle.await,
        None => pending().await,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::document::tests::make_document;
    use crate::document::SectionContent;
    use crate::measure::{EstimatingMeasurer, MeasureError};
    use crate::pagination::SectionDimensions;

    /// Takes `delay` per section and counts measurements.
    struct SlowMeasurer {
        delay: Duration,
        calls: AtomicUsize,
    }

    impl SlowMeasurer {
        fn new(delay_ms: u64) -> Arc<Self> {
            Arc::new(Self {
                delay: Duration::from_millis(delay_ms),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MeasurementProvider for SlowMeasurer {
        async fn measure(&self, _content: &SectionContent) -> Result<SectionDimensions, MeasureError> {
            time::sleep(self.delay).await;
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SectionDimensions::with_height(200.0))
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn spawn_default() -> SessionHandle {
        spawn_session(
            make_document(),
            PaginationConfig::default(),
            Arc::new(EstimatingMeasurer::default()),
            ms(300),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_calculation_runs_immediately() {
        let handle = spawn_default();
        let snapshot = handle.flush().await.unwrap();
        assert_eq!(snapshot.revision, 1);
        assert_eq!(snapshot.state.total_pages, 1);
        assert!(!snapshot.state.is_calculating);
        assert_eq!(handle.snapshot().revision, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_coalesce_into_one_calculation() {
        let handle = spawn_default();
        handle.flush().await.unwrap();

        let mut doc = make_document();
        for i in 0..3 {
            doc.summary = format!("Summary draft {i}");
            handle.update_document(doc.clone()).await.unwrap();
            time::sleep(ms(50)).await;
        }
        // Last edit at +100ms, window closes at +400ms.
        time::sleep(ms(200)).await;
        let pending = handle.snapshot();
        assert_eq!(pending.revision, 1);
        assert!(pending.state.is_calculating);

        time::sleep(ms(150)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.revision, 2);
        assert!(!snapshot.state.is_calculating);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_during_calculation_trigger_one_follow_up() {
        let provider = SlowMeasurer::new(100);
        let handle = spawn_session(
            make_document(),
            PaginationConfig::default(),
            provider.clone(),
            ms(300),
        )
        .unwrap();
        let initial = handle.flush().await.unwrap();
        assert_eq!(initial.revision, 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 4);

        let mut doc = make_document();
        doc.summary = "First rewrite".to_string();
        handle.update_document(doc.clone()).await.unwrap();
        // Calculation starts at +300ms and measures one section for 100ms.
        time::sleep(ms(350)).await;
        assert!(handle.snapshot().state.is_calculating);

        doc.summary = "Second rewrite".to_string();
        handle.update_document(doc.clone()).await.unwrap();
        doc.summary = "Third rewrite".to_string();
        handle.update_document(doc).await.unwrap();

        let done = handle.flush().await.unwrap();
        assert_eq!(done.revision, 3, "one calculation plus exactly one follow-up");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 6);
        assert!(!done.state.is_calculating);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_skips_debounce_window() {
        let handle = spawn_default();
        handle.flush().await.unwrap();
        let mut doc = make_document();
        doc.hobbies = vec!["Chess".to_string()];
        handle.update_document(doc).await.unwrap();

        let snapshot = handle.flush().await.unwrap();
        assert_eq!(snapshot.revision, 2);
        assert!(snapshot.state.section_layout.contains_key("hobbies"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reorder_recalculates_without_debounce() {
        let handle = spawn_default();
        handle.flush().await.unwrap();
        assert!(handle.reorder(1, 0).await.unwrap());
        time::sleep(ms(1)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.revision, 2);
        assert_eq!(snapshot.state.pages[0].sections[0].id, "summary");

        assert!(!handle.reorder(2, 2).await.unwrap());
        assert!(matches!(
            handle.move_section("education", MoveDirection::Up).await,
            Err(DriverError::SectionNotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_config_rejected() {
        let handle = spawn_default();
        let config = PaginationConfig {
            page_height: -1.0,
            ..PaginationConfig::default()
        };
        assert!(matches!(
            handle.update_config(config).await,
            Err(DriverError::InvalidConfig(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_document_with_clashing_break_id_rejected() {
        let handle = spawn_default();
        handle.flush().await.unwrap();
        let mut doc = make_document();
        doc.page_breaks.push(crate::document::PageBreakMarker {
            id: "skills".to_string(),
            after: crate::pagination::SectionKind::Summary,
        });
        assert!(matches!(
            handle.update_document(doc).await,
            Err(DriverError::InvalidDocument(_))
        ));

        let snapshot = handle.flush().await.unwrap();
        assert_eq!(snapshot.revision, 1, "rejected edit must not schedule a calculation");
        assert_eq!(snapshot.state.total_pages, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_through_handle() {
        let handle = spawn_default();
        handle.flush().await.unwrap();
        assert!(!handle.navigate(NavigateAction::Page { page: 2 }).await.unwrap());
        assert_eq!(handle.jump_to_section("skills").await, Ok(1));
        assert_eq!(
            handle.jump_to_section("projects").await,
            Err(DriverError::SectionNotFound("projects".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_new_snapshots() {
        let handle = spawn_default();
        let mut rx = handle.subscribe();
        handle.flush().await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().revision >= 1);
    }

    #[test]
    fn test_spawn_rejects_invalid_config() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let _guard = runtime.enter();
        let config = PaginationConfig {
            margin_top: 700.0,
            margin_bottom: 700.0,
            ..PaginationConfig::default()
        };
        let result = spawn_session(
            make_document(),
            config,
            Arc::new(EstimatingMeasurer::default()),
            ms(300),
        );
        assert!(matches!(result, Err(DriverError::InvalidConfig(_))));
    }
}
