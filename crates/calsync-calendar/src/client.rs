//! Blocking HTTP client for a GData-style calendar feed.

use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use tracing::instrument;
use url::Url;

use crate::error::CalendarError;
use crate::service::{CalendarService, Connector};
use crate::types::{CalendarEvent, Envelope};

const LOGIN_SOURCE: &str = "calsync";
const GDATA_VERSION: &str = "2";

fn build_http(timeout: Duration) -> Result<Client, CalendarError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

fn parse_base(base_url: &str) -> Result<Url, CalendarError> {
    Url::parse(base_url)
        .map_err(|e| CalendarError::ApiError(format!("invalid base URL '{}': {}", base_url, e)))
}

/// Pull `key=value` out of a ClientLogin response body.
fn login_field<'a>(body: &'a str, key: &str) -> Option<&'a str> {
    body.lines()
        .filter_map(|line| line.split_once('='))
        .find(|(k, _)| k.trim() == key)
        .map(|(_, v)| v.trim())
}

/// Authenticates with ClientLogin and hands out `HttpCalendarService` sessions.
pub struct ClientLoginConnector {
    http: Client,
    login_url: String,
    api_base: Url,
}

impl ClientLoginConnector {
    pub fn new(login_url: &str, api_base_url: &str, timeout: Duration) -> Result<Self, CalendarError> {
        Ok(Self {
            http: build_http(timeout)?,
            login_url: login_url.to_string(),
            api_base: parse_base(api_base_url)?,
        })
    }
}

impl Connector for ClientLoginConnector {
    #[instrument(skip(self, password), level = "info")]
    fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Arc<dyn CalendarService>, CalendarError> {
        let response = self
            .http
            .post(&self.login_url)
            .form(&[
                ("accountType", "HOSTED_OR_GOOGLE"),
                ("Email", email),
                ("Passwd", password),
                ("service", "cl"),
                ("source", LOGIN_SOURCE),
            ])
            .send()?;

        let status = response.status();
        let body = response.text()?;

        if status.is_success() {
            let token = login_field(&body, "Auth").ok_or_else(|| {
                CalendarError::ApiError("login response carried no Auth token".to_string())
            })?;
            tracing::info!("Authenticated calendar session");
            Ok(Arc::new(HttpCalendarService {
                client: self.http.clone(),
                base_url: self.api_base.clone(),
                auth_token: token.to_string(),
            }))
        } else if status == StatusCode::FORBIDDEN {
            let code = login_field(&body, "Error").unwrap_or("BadAuthentication");
            Err(CalendarError::InvalidCredentials(code.to_string()))
        } else {
            Err(CalendarError::ApiError(format!("{}: {}", status, body)))
        }
    }
}

/// An authenticated session against the calendar feed.
pub struct HttpCalendarService {
    client: Client,
    base_url: Url,
    auth_token: String,
}

impl HttpCalendarService {
    /// Session from an already-issued auth token.
    pub fn new(base_url: &str, auth_token: &str, timeout: Duration) -> Result<Self, CalendarError> {
        Ok(Self {
            client: build_http(timeout)?,
            base_url: parse_base(base_url)?,
            auth_token: auth_token.to_string(),
        })
    }

    /// Event ids and edit links are absolute URLs or paths on the base URL.
    fn resolve(&self, href: &str) -> Result<Url, CalendarError> {
        self.base_url
            .join(href)
            .map_err(|e| CalendarError::ApiError(format!("invalid URL '{}': {}", href, e)))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", format!("GoogleLogin auth={}", self.auth_token))
            .header("GData-Version", GDATA_VERSION)
            .query(&[("alt", "jsonc")])
    }

    fn edit_url(&self, event: &CalendarEvent) -> Result<Url, CalendarError> {
        let link = event.edit_link().ok_or_else(|| {
            CalendarError::InvalidEventData("event has no edit link".to_string())
        })?;
        self.resolve(link)
    }

    /// Helper to handle API responses and errors.
    fn handle_response(&self, response: Response, target: &str) -> Result<CalendarEvent, CalendarError> {
        if response.status().is_success() {
            let envelope: Envelope<CalendarEvent> = response
                .json()
                .map_err(|e| CalendarError::ApiError(format!("JSON parse error: {}", e)))?;
            Ok(envelope.data)
        } else {
            Err(error_from(response, target))
        }
    }
}

fn error_from(response: Response, target: &str) -> CalendarError {
    match response.status().as_u16() {
        401 => CalendarError::TokenExpired,
        403 => CalendarError::AuthRequired,
        404 | 410 => CalendarError::EventNotFound(target.to_string()),
        409 | 412 => CalendarError::Conflict,
        429 => {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            CalendarError::RateLimited(retry_after)
        }
        _ => {
            let status = response.status();
            let text = response.text().unwrap_or_default();
            CalendarError::ApiError(format!("{}: {}", status, text))
        }
    }
}

impl CalendarService for HttpCalendarService {
    #[instrument(skip(self), level = "info")]
    fn fetch_event(&self, event_id: &str) -> Result<CalendarEvent, CalendarError> {
        let url = self.resolve(event_id)?;
        let response = self.authorized(self.client.get(url)).send()?;
        self.handle_response(response, event_id)
    }

    #[instrument(skip(self, event), level = "info")]
    fn insert_event(
        &self,
        event: &CalendarEvent,
        feed: &str,
    ) -> Result<CalendarEvent, CalendarError> {
        let url = self.resolve(feed)?;
        let response = self
            .authorized(self.client.post(url))
            .json(&Envelope { data: event })
            .send()?;
        self.handle_response(response, feed)
    }

    #[instrument(skip(self, event), fields(edit_link = ?event.edit_link()), level = "info")]
    fn update_event(&self, event: &CalendarEvent) -> Result<CalendarEvent, CalendarError> {
        let url = self.edit_url(event)?;
        let target = url.to_string();
        let response = self
            .authorized(self.client.put(url))
            .header("If-Match", "*")
            .json(&Envelope { data: event })
            .send()?;
        self.handle_response(response, &target)
    }

    #[instrument(skip(self, event), fields(edit_link = ?event.edit_link()), level = "info")]
    fn delete_event(&self, event: &CalendarEvent) -> Result<(), CalendarError> {
        let url = self.edit_url(event)?;
        let target = url.to_string();
        let mut request = self
            .authorized(self.client.delete(url))
            .header("If-Match", "*");
        if event.send_event_notifications {
            request = request.query(&[("sendEventNotifications", "true")]);
        }

        let response = request.send()?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from(response, &target))
        }
    }
}
