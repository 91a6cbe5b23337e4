//! Seams between the observer and a remote calendar.

use std::sync::Arc;

use crate::error::CalendarError;
use crate::types::CalendarEvent;

/// An authenticated session against a calendar service.
///
/// Calls block the current thread for the duration of the round trip.
pub trait CalendarService: Send + Sync {
    /// Fetch an event by its remote id. A missing event is
    /// `CalendarError::EventNotFound`.
    fn fetch_event(&self, event_id: &str) -> Result<CalendarEvent, CalendarError>;

    /// Insert a new event into `feed`, returning it with its assigned id.
    fn insert_event(&self, event: &CalendarEvent, feed: &str)
        -> Result<CalendarEvent, CalendarError>;

    /// Write an event back through its edit reference.
    fn update_event(&self, event: &CalendarEvent) -> Result<CalendarEvent, CalendarError>;

    /// Delete an event through its edit reference.
    fn delete_event(&self, event: &CalendarEvent) -> Result<(), CalendarError>;
}

/// Produces authenticated sessions.
pub trait Connector: Send + Sync {
    fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Arc<dyn CalendarService>, CalendarError>;
}
