//! Turning host records into calendar event content.

use calsync_calendar::{CalendarError, CalendarEvent, When, Where, Who};
use chrono::NaiveDateTime;
use serde_json::{Map, Value};

use crate::record::Record;

/// Something that can write its content onto a calendar event.
pub trait PopulateEvent {
    fn populate_event(&self, event: &mut CalendarEvent) -> Result<(), CalendarError>;
}

/// Structured event content. `start` and `end` are local wall-clock times.
#[derive(Debug, Clone, PartialEq)]
pub struct EventData {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub title: String,
    pub locations: Vec<String>,
    pub attendees: Vec<String>,
    pub content: String,
}

impl EventData {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start,
            end,
            title: String::new(),
            locations: Vec::new(),
            attendees: Vec::new(),
            content: String::new(),
        }
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.locations.push(location.into());
        self
    }

    #[must_use]
    pub fn attendee(mut self, email: impl Into<String>) -> Self {
        self.attendees.push(email.into());
        self
    }

    #[must_use]
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }
}

impl PopulateEvent for EventData {
    fn populate_event(&self, event: &mut CalendarEvent) -> Result<(), CalendarError> {
        event.when = vec![When::new(&self.start, &self.end)];
        event.title = self.title.clone();
        event.locations = self.locations.iter().map(Where::new).collect();
        event.attendees = self.attendees.iter().map(Who::new).collect();
        event.details = self.content.clone();
        Ok(())
    }
}

/// Pre-built wire values for fields `EventData` does not model.
///
/// Fields are assigned by wire name after the time windows, so a raw
/// `"title"` replaces the title and `"transparency"` is sent as-is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEventData {
    pub when: Vec<When>,
    pub fields: Map<String, Value>,
}

impl RawEventData {
    pub fn new(when: Vec<When>) -> Self {
        Self {
            when,
            fields: Map::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

impl PopulateEvent for RawEventData {
    fn populate_event(&self, event: &mut CalendarEvent) -> Result<(), CalendarError> {
        event.when = self.when.clone();
        for (name, value) in &self.fields {
            event.set_field(name, value.clone())?;
        }
        Ok(())
    }
}

/// What an adapter produces for one record.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Structured(EventData),
    Raw(RawEventData),
}

impl From<EventData> for EventPayload {
    fn from(data: EventData) -> Self {
        Self::Structured(data)
    }
}

impl From<RawEventData> for EventPayload {
    fn from(data: RawEventData) -> Self {
        Self::Raw(data)
    }
}

impl PopulateEvent for EventPayload {
    fn populate_event(&self, event: &mut CalendarEvent) -> Result<(), CalendarError> {
        match self {
            Self::Structured(data) => data.populate_event(event),
            Self::Raw(data) => data.populate_event(event),
        }
    }
}

/// Per-record-type strategy: event content plus the policies deciding
/// whether a record is synced at all.
pub trait CalendarAdapter<M: Record>: Send + Sync + 'static {
    /// Whether saving `instance` should create or update its event.
    fn can_save(&self, _instance: &M) -> bool {
        true
    }

    /// Whether deleting `instance` should delete its remote event. The local
    /// mapping is dropped either way.
    fn can_delete(&self, _instance: &M) -> bool {
        true
    }

    /// Whether the calendar should email attendees about the change.
    fn can_notify(&self, _instance: &M) -> bool {
        false
    }

    /// Feed for this record; `None` uses the observer's default feed.
    fn feed_url(&self, _instance: &M) -> Option<String> {
        None
    }

    fn get_event_data(&self, instance: &M) -> EventPayload;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    struct Talk {
        id: u64,
        public: bool,
    }

    impl Record for Talk {
        const RECORD_TYPE: &'static str = "conf.talk";

        fn record_id(&self) -> u64 {
            self.id
        }
    }

    struct TalkAdapter;

    impl CalendarAdapter<Talk> for TalkAdapter {
        fn can_save(&self, instance: &Talk) -> bool {
            instance.public
        }

        fn get_event_data(&self, instance: &Talk) -> EventPayload {
            EventData::new(at(9, 0), at(10, 0))
                .title(format!("Talk {}", instance.id))
                .into()
        }
    }

    #[test]
    fn test_structured_populate() {
        let data = EventData::new(at(9, 30), at(11, 0))
            .title("Keynote")
            .location("Hall A")
            .location("Stream")
            .attendee("speaker@example.com")
            .content("Opening remarks");

        let mut event = CalendarEvent::new();
        event.extra.insert("transparency".into(), Value::from("opaque"));
        data.populate_event(&mut event).unwrap();

        assert_eq!(event.when, vec![When::new(&at(9, 30), &at(11, 0))]);
        assert_eq!(event.title, "Keynote");
        assert_eq!(event.locations, vec![Where::new("Hall A"), Where::new("Stream")]);
        assert_eq!(event.attendees, vec![Who::new("speaker@example.com")]);
        assert_eq!(event.details, "Opening remarks");
        // fields the adapter does not model survive
        assert!(event.extra.contains_key("transparency"));
    }

    #[test]
    fn test_structured_defaults_are_empty() {
        let mut event = CalendarEvent::new();
        event.title = "stale".to_string();
        event.locations = vec![Where::new("old room")];

        EventData::new(at(9, 0), at(10, 0))
            .populate_event(&mut event)
            .unwrap();

        assert_eq!(event.title, "");
        assert!(event.locations.is_empty());
        assert!(event.attendees.is_empty());
        assert_eq!(event.details, "");
    }

    #[test]
    fn test_raw_populate() {
        let when = vec![When {
            start: "2024-06-15T07:30:00.000Z".to_string(),
            end: "2024-06-15T08:30:00.000Z".to_string(),
        }];
        let raw = RawEventData::new(when.clone())
            .field("title", "Raw title")
            .field("transparency", "transparent");

        let mut event = CalendarEvent::new();
        EventPayload::from(raw).populate_event(&mut event).unwrap();

        assert_eq!(event.when, when);
        assert_eq!(event.title, "Raw title");
        assert_eq!(event.extra.get("transparency"), Some(&Value::from("transparent")));
    }

    #[test]
    fn test_raw_rejects_malformed_known_field() {
        let raw = RawEventData::new(Vec::new()).field("attendees", "not-a-list");
        let mut event = CalendarEvent::new();
        assert!(raw.populate_event(&mut event).is_err());
    }

    #[test]
    fn test_adapter_defaults() {
        let adapter = TalkAdapter;
        let talk = Talk { id: 3, public: false };

        assert!(!adapter.can_save(&talk));
        assert!(adapter.can_delete(&talk));
        assert!(!adapter.can_notify(&talk));
        assert_eq!(adapter.feed_url(&talk), None);

        match adapter.get_event_data(&talk) {
            EventPayload::Structured(data) => assert_eq!(data.title, "Talk 3"),
            EventPayload::Raw(_) => panic!("expected structured data"),
        }
    }
}
