//! Remote calendar client for calsync.
//!
//! Provides the event wire types, the `CalendarService` / `Connector` seams
//! the observer depends on, and a blocking HTTP implementation of both.

pub mod client;
pub mod error;
pub mod service;
pub mod types;

pub use client::{ClientLoginConnector, HttpCalendarService};
pub use error::CalendarError;
pub use service::{CalendarService, Connector};
pub use types::{format_datetime, format_datetime_in, CalendarEvent, When, Where, Who, DATE_FORMAT};
