//! Calendar-specific error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Authentication required")]
    AuthRequired,

    #[error("Login rejected: {0}")]
    InvalidCredentials(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Invalid event data: {0}")]
    InvalidEventData(String),

    #[error("Conflict: event was modified")]
    Conflict,

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

impl CalendarError {
    /// Whether the remote event is gone (never existed or deleted out-of-band).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EventNotFound(_))
    }

    /// Whether the session was rejected and a fresh login is needed.
    pub fn should_refresh_token(&self) -> bool {
        matches!(self, Self::TokenExpired | Self::AuthRequired)
    }
}

impl From<serde_json::Error> for CalendarError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidEventData(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_not_found() {
        assert!(CalendarError::EventNotFound("abc".into()).is_not_found());
        assert!(!CalendarError::ApiError("500".into()).is_not_found());
        assert!(!CalendarError::TokenExpired.is_not_found());
    }

    #[test]
    fn test_should_refresh_token() {
        assert!(CalendarError::TokenExpired.should_refresh_token());
        assert!(CalendarError::AuthRequired.should_refresh_token());
        assert!(!CalendarError::EventNotFound("x".into()).should_refresh_token());
    }
}
