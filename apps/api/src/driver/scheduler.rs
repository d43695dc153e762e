//! Re-pagination scheduler: debounce plus single-flight coalescing.
//!
//! Explicit state machine, free of any runtime so it can be driven with
//! synthetic timestamps:
//!
//! ```text
//! Idle ──edit──▶ Pending(now+window) ──edit──▶ Pending(now+window)
//! Pending ──tick ≥ deadline──▶ Calculating
//! Calculating ──edit──▶ CalculatingWithFollowUp ──edit──▶ (unchanged)
//! Calculating ──complete──▶ Idle
//! CalculatingWithFollowUp ──complete──▶ Pending(now)
//! ```
//!
//! # Invariants
//! - At most one calculation in flight.
//! - Edits during a calculation collapse into exactly one follow-up (latest wins, nothing lost).
//! - A pending deadline only ever exists while nothing is in flight.

use std::time::{Duration, Instant};

use tracing::debug;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Pending { deadline: Instant },
    Calculating,
    CalculatingWithFollowUp,
}

/// What the caller should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleAction {
    /// Nothing to do.
    None,
    /// Call `tick_at` again at this instant.
    WaitUntil(Instant),
    /// Start a calculation now and report back with `complete_at`.
    StartCalculation,
}

#[derive(Debug, Clone)]
pub struct RecalcScheduler {
    state: SchedulerState,
    debounce: Duration,
    /// Edits absorbed into an already pending or in-flight request.
    coalesced: u64,
}

impl RecalcScheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            state: SchedulerState::Idle,
            debounce,
            coalesced: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn coalesced_edits(&self) -> u64 {
        self.coalesced
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            SchedulerState::Pending { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// True while a calculation is pending or running.
    pub fn is_busy(&self) -> bool {
        self.state != SchedulerState::Idle
    }

    /// A content edit: (re)starts the debounce window.
    pub fn edit_at(&mut self, now: Instant) -> ScheduleAction {
        self.request_at(now, self.debounce)
    }

    /// A structural change (reorder, config) that should not wait for the window.
    pub fn request_now_at(&mut self, now: Instant) -> ScheduleAction {
        self.request_at(now, Duration::ZERO)
    }

    fn request_at(&mut self, now: Instant, delay: Duration) -> ScheduleAction {
        match self.state {
            SchedulerState::Idle => {
                let deadline = now + delay;
                self.state = SchedulerState::Pending { deadline };
                ScheduleAction::WaitUntil(deadline)
            }
            SchedulerState::Pending { deadline: previous } => {
                self.coalesced += 1;
                // An immediate request never waits on an earlier debounce deadline.
                let deadline = if delay.is_zero() {
                    previous.min(now)
                } else {
                    now + delay
                };
                self.state = SchedulerState::Pending { deadline };
                ScheduleAction::WaitUntil(deadline)
            }
            SchedulerState::Calculating => {
                self.coalesced += 1;
                self.state = SchedulerState::CalculatingWithFollowUp;
                ScheduleAction::None
            }
            SchedulerState::CalculatingWithFollowUp => {
                self.coalesced += 1;
                ScheduleAction::None
            }
        }
    }

    /// Timer check: starts the calculation once the deadline has passed.
    pub fn tick_at(&mut self, now: Instant) -> ScheduleAction {
        match self.state {
            SchedulerState::Pending { deadline } if now >= deadline => {
                self.state = SchedulerState::Calculating;
                ScheduleAction::StartCalculation
            }
            SchedulerState::Pending { deadline } => ScheduleAction::WaitUntil(deadline),
            _ => ScheduleAction::None,
        }
    }

    /// The in-flight calculation finished.
    pub fn complete_at(&mut self, now: Instant) -> ScheduleAction {
        match self.state {
            SchedulerState::Calculating => {
                self.state = SchedulerState::Idle;
                ScheduleAction::None
            }
            SchedulerState::CalculatingWithFollowUp => {
                self.state = SchedulerState::Pending { deadline: now };
                ScheduleAction::WaitUntil(now)
            }
            other => {
                debug!(state = ?other, "Completion reported with no calculation in flight");
                ScheduleAction::None
            }
        }
    }
}

impl Default for RecalcScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_edit_from_idle_starts_window() {
        let t0 = Instant::now();
        let mut s = RecalcScheduler::default();
        assert_eq!(s.edit_at(t0), ScheduleAction::WaitUntil(t0 + ms(300)));
        assert_eq!(s.deadline(), Some(t0 + ms(300)));
        assert!(s.is_busy());
    }

    #[test]
    fn test_edits_within_window_extend_deadline() {
        let t0 = Instant::now();
        let mut s = RecalcScheduler::default();
        s.edit_at(t0);
        s.edit_at(t0 + ms(100));
        assert_eq!(s.edit_at(t0 + ms(250)), ScheduleAction::WaitUntil(t0 + ms(550)));
        assert_eq!(s.tick_at(t0 + ms(400)), ScheduleAction::WaitUntil(t0 + ms(550)));
        assert_eq!(s.tick_at(t0 + ms(550)), ScheduleAction::StartCalculation);
        assert_eq!(s.coalesced_edits(), 2);
    }

    #[test]
    fn test_tick_before_deadline_waits() {
        let t0 = Instant::now();
        let mut s = RecalcScheduler::default();
        s.edit_at(t0);
        assert_eq!(s.tick_at(t0 + ms(299)), ScheduleAction::WaitUntil(t0 + ms(300)));
        assert!(matches!(s.state(), SchedulerState::Pending { .. }));
    }

    #[test]
    fn test_tick_when_idle_does_nothing() {
        let mut s = RecalcScheduler::default();
        assert_eq!(s.tick_at(Instant::now()), ScheduleAction::None);
        assert_eq!(s.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_completion_without_edits_returns_to_idle() {
        let t0 = Instant::now();
        let mut s = RecalcScheduler::default();
        s.edit_at(t0);
        s.tick_at(t0 + ms(300));
        assert_eq!(s.state(), SchedulerState::Calculating);
        assert_eq!(s.complete_at(t0 + ms(320)), ScheduleAction::None);
        assert_eq!(s.state(), SchedulerState::Idle);
        assert!(!s.is_busy());
    }

    #[test]
    fn test_edits_during_calculation_coalesce_to_one_follow_up() {
        let t0 = Instant::now();
        let mut s = RecalcScheduler::default();
        s.edit_at(t0);
        s.tick_at(t0 + ms(300));
        assert_eq!(s.edit_at(t0 + ms(310)), ScheduleAction::None);
        assert_eq!(s.edit_at(t0 + ms(315)), ScheduleAction::None);
        assert_eq!(s.state(), SchedulerState::CalculatingWithFollowUp);
        assert_eq!(s.deadline(), None, "no timer while a calculation is in flight");

        let done = t0 + ms(330);
        assert_eq!(s.complete_at(done), ScheduleAction::WaitUntil(done));
        assert_eq!(s.tick_at(done), ScheduleAction::StartCalculation);
        assert_eq!(s.complete_at(done + ms(5)), ScheduleAction::None);
        assert_eq!(s.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_immediate_request_skips_window() {
        let t0 = Instant::now();
        let mut s = RecalcScheduler::default();
        assert_eq!(s.request_now_at(t0), ScheduleAction::WaitUntil(t0));
        assert_eq!(s.tick_at(t0), ScheduleAction::StartCalculation);
    }

    #[test]
    fn test_immediate_request_pulls_pending_deadline_in() {
        let t0 = Instant::now();
        let mut s = RecalcScheduler::default();
        s.edit_at(t0);
        assert_eq!(
            s.request_now_at(t0 + ms(50)),
            ScheduleAction::WaitUntil(t0 + ms(50))
        );
    }

    #[test]
    fn test_spurious_completion_ignored() {
        let t0 = Instant::now();
        let mut s = RecalcScheduler::default();
        s.edit_at(t0);
        assert_eq!(s.complete_at(t0), ScheduleAction::None);
        assert_eq!(s.deadline(), Some(t0 + ms(300)));
    }
}
