//! Errors raised while syncing a record.

use calsync_calendar::CalendarError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Record type is not observed: {0}")]
    NotObserved(&'static str),

    #[error("Record type tag '{0}' is already bound to a different Rust type")]
    DuplicateRecordType(&'static str),

    #[error("Calendar error: {0}")]
    Calendar(#[from] CalendarError),

    #[error("Mapping store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl SyncError {
    /// Whether the failure came from the remote calendar rather than local state.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Calendar(_))
    }
}
