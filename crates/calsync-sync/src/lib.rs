//! Record-driven calendar synchronization.
//!
//! A `CalendarObserver` listens on a `SignalBus` for saved and deleted
//! records, turns them into calendar events through per-type
//! `CalendarAdapter`s, and remembers which remote event belongs to which
//! record in an `EventMappingStore`.

pub mod adapter;
pub mod error;
pub mod observer;
pub mod record;
pub mod signals;
pub mod store;

pub use adapter::{CalendarAdapter, EventData, EventPayload, PopulateEvent, RawEventData};
pub use error::SyncError;
pub use observer::{CalendarObserver, SyncOutcome};
pub use record::{Record, RecordRef};
pub use signals::{Signal, SignalBus};
pub use store::{EventMapping, EventMappingStore};
