//! Calendar event wire types and date formatting.

use chrono::{Duration, Local, LocalResult, NaiveDateTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CalendarError;

/// UTC timestamp format the calendar feed expects.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.000Z";

/// Format a timezone-naive local timestamp for the wire, interpreting it in
/// the system timezone.
pub fn format_datetime(naive: &NaiveDateTime) -> String {
    format_datetime_in(naive, &Local)
}

/// Format a timezone-naive timestamp for the wire, interpreting it in `tz`.
///
/// A wall time that occurs twice (DST fold) resolves to the earlier instant.
/// A wall time that never occurs (DST gap) is read with the offset in force
/// before the transition, which moves it forward by the gap length.
pub fn format_datetime_in<Tz: TimeZone>(naive: &NaiveDateTime, tz: &Tz) -> String {
    let utc = match tz.from_local_datetime(naive) {
        LocalResult::Single(dt) => dt.naive_utc(),
        LocalResult::Ambiguous(earliest, _) => earliest.naive_utc(),
        LocalResult::None => {
            let before = tz
                .offset_from_utc_datetime(&(*naive - Duration::days(1)))
                .fix()
                .local_minus_utc();
            *naive - Duration::seconds(i64::from(before))
        }
    };
    Utc.from_utc_datetime(&utc).format(DATE_FORMAT).to_string()
}

/// Calendar event as exchanged with the feed.
///
/// Fields the client does not model are kept in `extra`, so an event fetched
/// and updated again loses nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    /// Remote event id, assigned by the service on insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Edit reference; present only once the event exists remotely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,

    #[serde(default)]
    pub when: Vec<When>,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub locations: Vec<Where>,

    #[serde(default)]
    pub attendees: Vec<Who>,

    #[serde(default)]
    pub details: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub send_event_notifications: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl CalendarEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn edit_link(&self) -> Option<&str> {
        self.self_link.as_deref()
    }

    /// Assign a field by its wire name.
    ///
    /// Modelled fields (`title`, `when`, ...) are replaced and must have the
    /// right shape; any other name lands in `extra`.
    pub fn set_field(&mut self, name: &str, value: Value) -> Result<(), CalendarError> {
        let Value::Object(mut fields) = serde_json::to_value(&*self)? else {
            return Err(CalendarError::InvalidEventData(
                "event did not serialize to an object".to_string(),
            ));
        };
        fields.insert(name.to_string(), value);
        *self = serde_json::from_value(Value::Object(fields))
            .map_err(|e| CalendarError::InvalidEventData(format!("field '{}': {}", name, e)))?;
        Ok(())
    }
}

/// Time window of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct When {
    pub start: String,
    pub end: String,
}

impl When {
    /// Window from local-time timestamps.
    pub fn new(start: &NaiveDateTime, end: &NaiveDateTime) -> Self {
        Self {
            start: format_datetime(start),
            end: format_datetime(end),
        }
    }

    pub fn in_timezone<Tz: TimeZone>(start: &NaiveDateTime, end: &NaiveDateTime, tz: &Tz) -> Self {
        Self {
            start: format_datetime_in(start, tz),
            end: format_datetime_in(end, tz),
        }
    }
}

/// Event location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Where {
    pub value_string: String,
}

impl Where {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value_string: value.into(),
        }
    }
}

/// Event attendee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Who {
    pub email: String,
}

impl Who {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }
}

/// JSON-C envelope used by every request and response body.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: T,
}
