// Re-pagination driver: keeps one document's pagination current while it is
// being edited. `scheduler` decides when to recalculate, `session` holds the
// editing state, `actor` runs both on the tokio runtime behind a handle.

pub mod actor;
pub mod scheduler;
pub mod session;

use thiserror::Error;

use crate::document::DocumentError;
use crate::pagination::PaginationError;

pub use actor::{spawn_session, SessionHandle};
pub use scheduler::{RecalcScheduler, ScheduleAction, SchedulerState, DEFAULT_DEBOUNCE};
pub use session::{MoveDirection, NavigateAction, PaginationSession, PaginationSnapshot};

#[derive(Debug, Error, PartialEq)]
pub enum DriverError {
    #[error("Section not found: {0}")]
    SectionNotFound(String),

    #[error("Invalid pagination config: {0}")]
    InvalidConfig(#[from] PaginationError),

    #[error("Invalid document: {0}")]
    InvalidDocument(#[from] DocumentError),

    #[error("Pagination session is closed")]
    Closed,
}
