//! Host records and the type-tagged key that identifies them.

use std::fmt;

/// A host application record that can own calendar events.
pub trait Record: Send + Sync + 'static {
    /// Stable discriminator stored in the mapping table. Must be unique per
    /// record type and must not change once mappings exist.
    const RECORD_TYPE: &'static str;

    /// Primary key within `RECORD_TYPE`.
    fn record_id(&self) -> u64;

    fn record_ref(&self) -> RecordRef {
        RecordRef::new(Self::RECORD_TYPE, self.record_id())
    }
}

/// (type tag, id) composite key; schema-stable across record types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordRef {
    pub owner_type: String,
    pub owner_id: u64,
}

impl RecordRef {
    pub fn new(owner_type: impl Into<String>, owner_id: u64) -> Self {
        Self {
            owner_type: owner_type.into(),
            owner_id,
        }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.owner_type, self.owner_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Booking {
        id: u64,
    }

    impl Record for Booking {
        const RECORD_TYPE: &'static str = "bookings.booking";

        fn record_id(&self) -> u64 {
            self.id
        }
    }

    #[test]
    fn test_record_ref() {
        let booking = Booking { id: 42 };
        let owner = booking.record_ref();
        assert_eq!(owner, RecordRef::new("bookings.booking", 42));
        assert_eq!(owner.to_string(), "bookings.booking#42");
    }
}
