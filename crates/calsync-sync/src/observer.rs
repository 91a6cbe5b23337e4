//! Keeps calendar events in step with host records.

use calsync_calendar::{
    CalendarError, CalendarEvent, CalendarService, ClientLoginConnector, Connector,
};
use calsync_core::{SyncConfig, DEFAULT_FEED};
use parking_lot::{Mutex, RwLock};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::adapter::{CalendarAdapter, PopulateEvent};
use crate::error::SyncError;
use crate::record::{Record, RecordRef};
use crate::signals::{Signal, SignalBus};
use crate::store::EventMappingStore;

/// What a sync call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The adapter declined the record; nothing was touched.
    Skipped,
    /// A new remote event was created.
    Inserted { event_id: String },
    /// An existing remote event was updated in place.
    Updated { event_id: String },
    /// The remote event was deleted and the mapping removed.
    Deleted,
    /// Only the local mapping was removed.
    Unmapped,
}

static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

struct AdapterEntry {
    record_type: &'static str,
    /// Holds an `Arc<dyn CalendarAdapter<M>>` for the keyed `M`.
    adapter: Box<dyn Any + Send + Sync>,
}

/// Syncs observed record types to a calendar account.
///
/// Authentication is deferred until the first remote call and the session is
/// reused afterwards. The observer is shared as `Arc<CalendarObserver>`;
/// signal handlers only keep a weak reference.
pub struct CalendarObserver {
    /// Scopes this observer's receivers on a shared bus.
    id: u64,
    email: String,
    password: String,
    feed: String,
    connector: Arc<dyn Connector>,
    service: Mutex<Option<Arc<dyn CalendarService>>>,
    adapters: RwLock<HashMap<TypeId, AdapterEntry>>,
    store: Arc<Mutex<EventMappingStore>>,
}

impl CalendarObserver {
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        connector: Arc<dyn Connector>,
        store: Arc<Mutex<EventMappingStore>>,
    ) -> Self {
        Self {
            id: NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed),
            email: email.into(),
            password: password.into(),
            feed: DEFAULT_FEED.to_string(),
            connector,
            service: Mutex::new(None),
            adapters: RwLock::new(HashMap::new()),
            store,
        }
    }

    /// Build an observer for the configured account using ClientLogin.
    pub fn from_config(
        config: &SyncConfig,
        store: Arc<Mutex<EventMappingStore>>,
    ) -> Result<Self, SyncError> {
        let connector = ClientLoginConnector::new(
            &config.calendar.login_url,
            &config.calendar.api_base_url,
            Duration::from_secs(config.calendar.request_timeout_secs),
        )?;

        Ok(Self::new(
            config.account.email.clone(),
            config.account.password.clone().unwrap_or_default(),
            Arc::new(connector),
            store,
        )
        .with_feed(config.calendar.default_feed.clone()))
    }

    /// Default feed for records whose adapter names none.
    #[must_use]
    pub fn with_feed(mut self, feed: impl Into<String>) -> Self {
        self.feed = feed.into();
        self
    }

    /// Use an already authenticated session instead of logging in.
    #[must_use]
    pub fn with_service(self, service: Arc<dyn CalendarService>) -> Self {
        *self.service.lock() = Some(service);
        self
    }

    pub fn feed(&self) -> &str {
        &self.feed
    }

    pub fn store(&self) -> &Arc<Mutex<EventMappingStore>> {
        &self.store
    }

    pub fn is_observed<M: Record>(&self) -> bool {
        self.adapters.read().contains_key(&TypeId::of::<M>())
    }

    /// Sync `M` records through `adapter` whenever `bus` reports a save or
    /// delete.
    ///
    /// Observing the same type again replaces its adapter without adding a
    /// second pair of receivers. Other observers on the same bus keep their
    /// own receivers.
    pub fn observe<M, A>(self: &Arc<Self>, bus: &SignalBus, adapter: A) -> Result<(), SyncError>
    where
        M: Record,
        A: CalendarAdapter<M>,
    {
        let adapter: Arc<dyn CalendarAdapter<M>> = Arc::new(adapter);
        self.register_adapter::<M>(adapter)?;

        let tag = M::RECORD_TYPE;
        let observer = Arc::downgrade(self);
        let uid = format!("calsync:{}:update:{}", self.id, tag);
        bus.connect::<M, _>(Signal::PostSave, uid, move |instance: &M| {
            match observer.upgrade() {
                Some(observer) => observer.update(instance).map(|_| ()),
                None => Ok(()),
            }
        });

        let observer = Arc::downgrade(self);
        let uid = format!("calsync:{}:delete:{}", self.id, tag);
        bus.connect::<M, _>(Signal::PostDelete, uid, move |instance: &M| {
            match observer.upgrade() {
                Some(observer) => observer.delete(instance).map(|_| ()),
                None => Ok(()),
            }
        });

        tracing::info!(record_type = tag, "Observing record type");
        Ok(())
    }

    /// Re-sync the `M` record chosen by `selector` whenever an `R` record is
    /// saved or deleted. A selector returning `None` means there is nothing to
    /// update.
    pub fn observe_related<M, R, F>(self: &Arc<Self>, bus: &SignalBus, selector: F)
    where
        M: Record,
        R: Record,
        F: Fn(&R) -> Option<M> + Send + Sync + 'static,
    {
        let selector = Arc::new(selector);

        for (signal, action) in [(Signal::PostSave, "save"), (Signal::PostDelete, "delete")] {
            let observer = Arc::downgrade(self);
            let selector = Arc::clone(&selector);
            let uid = format!(
                "calsync:{}:related:{}:{}:{}",
                self.id,
                R::RECORD_TYPE,
                M::RECORD_TYPE,
                action
            );

            bus.connect::<R, _>(signal, uid, move |related: &R| {
                let Some(observer) = observer.upgrade() else {
                    return Ok(());
                };
                match selector(related) {
                    Some(primary) => observer.update(&primary).map(|_| ()),
                    None => Ok(()),
                }
            });
        }

        tracing::info!(
            record_type = M::RECORD_TYPE,
            related_type = R::RECORD_TYPE,
            "Observing related record type"
        );
    }

    fn register_adapter<M: Record>(
        &self,
        adapter: Arc<dyn CalendarAdapter<M>>,
    ) -> Result<(), SyncError> {
        let type_id = TypeId::of::<M>();
        let mut adapters = self.adapters.write();

        let clash = adapters
            .iter()
            .any(|(id, entry)| *id != type_id && entry.record_type == M::RECORD_TYPE);
        if clash {
            return Err(SyncError::DuplicateRecordType(M::RECORD_TYPE));
        }

        adapters.insert(
            type_id,
            AdapterEntry {
                record_type: M::RECORD_TYPE,
                adapter: Box::new(adapter),
            },
        );
        Ok(())
    }

    fn adapter_for<M: Record>(&self) -> Result<Arc<dyn CalendarAdapter<M>>, SyncError> {
        self.adapters
            .read()
            .get(&TypeId::of::<M>())
            .and_then(|entry| entry.adapter.downcast_ref::<Arc<dyn CalendarAdapter<M>>>())
            .map(Arc::clone)
            .ok_or(SyncError::NotObserved(M::RECORD_TYPE))
    }

    /// The cached session, logging in on first use. The lock is not held
    /// while authenticating.
    fn service(&self) -> Result<Arc<dyn CalendarService>, SyncError> {
        let cached = self.service.lock().clone();
        if let Some(service) = cached {
            return Ok(service);
        }

        let service = self.connector.authenticate(&self.email, &self.password)?;
        *self.service.lock() = Some(Arc::clone(&service));
        Ok(service)
    }

    /// Drop the cached session when the service rejects it, so the next call
    /// logs in again.
    fn check_session<T>(&self, result: Result<T, CalendarError>) -> Result<T, CalendarError> {
        if let Err(e) = &result {
            if e.should_refresh_token() {
                tracing::warn!(error = %e, "Calendar session rejected, logging in again on next use");
                *self.service.lock() = None;
            }
        }
        result
    }

    /// Fetch the event mapped to `owner` in `feed`. A mapped event that no
    /// longer exists remotely counts as unmapped.
    fn existing_event(
        &self,
        service: &dyn CalendarService,
        owner: &RecordRef,
        feed: &str,
    ) -> Result<Option<CalendarEvent>, SyncError> {
        let Some(event_id) = self.store.lock().get_event_id(owner, feed)? else {
            return Ok(None);
        };

        match self.check_session(service.fetch_event(&event_id)) {
            Ok(event) => Ok(Some(event)),
            Err(e) if e.is_not_found() => {
                tracing::warn!(%event_id, "Mapped event no longer exists remotely");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create or update the event for `instance`.
    #[instrument(
        skip_all,
        level = "info",
        fields(record_type = M::RECORD_TYPE, record_id = instance.record_id(), feed = tracing::field::Empty)
    )]
    pub fn update<M: Record>(&self, instance: &M) -> Result<SyncOutcome, SyncError> {
        let adapter = self.adapter_for::<M>()?;
        let owner = instance.record_ref();
        let feed = adapter
            .feed_url(instance)
            .unwrap_or_else(|| self.feed.clone());
        tracing::Span::current().record("feed", feed.as_str());

        if !adapter.can_save(instance) {
            tracing::debug!("Adapter declined save");
            return Ok(SyncOutcome::Skipped);
        }

        let service = self.service()?;
        let mut event = self
            .existing_event(service.as_ref(), &owner, &feed)?
            .unwrap_or_default();

        adapter.get_event_data(instance).populate_event(&mut event)?;
        if adapter.can_notify(instance) {
            event.send_event_notifications = true;
        }

        let updating = event.edit_link().is_some();
        let saved = self.check_session(if updating {
            service.update_event(&event)
        } else {
            service.insert_event(&event, &feed)
        })?;

        let event_id = saved.id.ok_or_else(|| {
            CalendarError::ApiError("calendar returned an event without an id".to_string())
        })?;
        let stored = self.store.lock().set_event_id(&owner, &feed, &event_id);
        if let Err(e) = stored {
            tracing::warn!(%event_id, error = %e, "Remote event saved but its mapping was not stored");
            return Err(e.into());
        }

        if updating {
            tracing::info!(%event_id, "Updated calendar event");
            Ok(SyncOutcome::Updated { event_id })
        } else {
            tracing::info!(%event_id, "Inserted calendar event");
            Ok(SyncOutcome::Inserted { event_id })
        }
    }

    /// Delete the event for `instance` and forget its mapping.
    ///
    /// The mapping is removed even when the remote delete fails; the remote
    /// error is returned afterwards.
    #[instrument(
        skip_all,
        level = "info",
        fields(record_type = M::RECORD_TYPE, record_id = instance.record_id(), feed = tracing::field::Empty)
    )]
    pub fn delete<M: Record>(&self, instance: &M) -> Result<SyncOutcome, SyncError> {
        let adapter = self.adapter_for::<M>()?;
        let owner = instance.record_ref();
        let feed = adapter
            .feed_url(instance)
            .unwrap_or_else(|| self.feed.clone());
        tracing::Span::current().record("feed", feed.as_str());

        let remote = if adapter.can_delete(instance) {
            self.delete_remote(adapter.as_ref(), instance, &owner, &feed)
        } else {
            tracing::debug!("Adapter declined remote delete");
            Ok(false)
        };

        self.store.lock().delete_event_id(&owner, &feed)?;

        if remote? {
            Ok(SyncOutcome::Deleted)
        } else {
            Ok(SyncOutcome::Unmapped)
        }
    }

    /// Returns whether a remote event was actually removed.
    fn delete_remote<M: Record>(
        &self,
        adapter: &dyn CalendarAdapter<M>,
        instance: &M,
        owner: &RecordRef,
        feed: &str,
    ) -> Result<bool, SyncError> {
        let service = self.service()?;
        let Some(mut event) = self.existing_event(service.as_ref(), owner, feed)? else {
            return Ok(false);
        };

        if adapter.can_notify(instance) {
            event.send_event_notifications = true;
        }

        match self.check_session(service.delete_event(&event)) {
            Ok(()) => {
                tracing::info!(event_id = ?event.id, "Deleted calendar event");
                Ok(true)
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(event_id = ?event.id, "Event was already deleted remotely");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}
