//! In-process change notifications.
//!
//! The host application calls `send` after it saves or deletes a record;
//! receivers run synchronously on the calling thread.

use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SyncError;
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// A record was created or updated.
    PostSave,
    /// A record was deleted.
    PostDelete,
}

type Handler = Arc<dyn Fn(&dyn Any) -> Result<(), SyncError> + Send + Sync>;

struct Receiver {
    dispatch_uid: String,
    handler: Handler,
}

/// Registry of receivers keyed by (signal, record type).
#[derive(Default)]
pub struct SignalBus {
    receivers: RwLock<HashMap<(Signal, TypeId), Vec<Receiver>>>,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to `signal` for records of type `M`.
    ///
    /// `dispatch_uid` identifies the registration: connecting the same uid
    /// again for the same signal and type is ignored and returns `false`.
    pub fn connect<M, F>(&self, signal: Signal, dispatch_uid: impl Into<String>, handler: F) -> bool
    where
        M: Record,
        F: Fn(&M) -> Result<(), SyncError> + Send + Sync + 'static,
    {
        let dispatch_uid = dispatch_uid.into();
        let mut receivers = self.receivers.write();
        let slot = receivers.entry((signal, TypeId::of::<M>())).or_default();

        if slot.iter().any(|r| r.dispatch_uid == dispatch_uid) {
            tracing::debug!(%dispatch_uid, record_type = M::RECORD_TYPE, "Receiver already connected");
            return false;
        }

        let handler: Handler = Arc::new(move |instance: &dyn Any| {
            match instance.downcast_ref::<M>() {
                Some(instance) => handler(instance),
                None => Ok(()),
            }
        });
        slot.push(Receiver {
            dispatch_uid,
            handler,
        });
        true
    }

    /// Remove a registration. Returns whether one was found.
    pub fn disconnect<M: Record>(&self, signal: Signal, dispatch_uid: &str) -> bool {
        let mut receivers = self.receivers.write();
        let Some(slot) = receivers.get_mut(&(signal, TypeId::of::<M>())) else {
            return false;
        };
        let before = slot.len();
        slot.retain(|r| r.dispatch_uid != dispatch_uid);
        slot.len() != before
    }

    /// Deliver `signal` for `instance` to every receiver in registration order.
    ///
    /// The first failing receiver stops dispatch and its error is returned.
    /// Returns the number of receivers invoked.
    pub fn send<M: Record>(&self, signal: Signal, instance: &M) -> Result<usize, SyncError> {
        // Snapshot so receivers can connect or disconnect while running.
        let handlers: Vec<Handler> = self
            .receivers
            .read()
            .get(&(signal, TypeId::of::<M>()))
            .map(|slot| slot.iter().map(|r| Arc::clone(&r.handler)).collect())
            .unwrap_or_default();

        let instance: &dyn Any = instance;
        for handler in &handlers {
            handler(instance)?;
        }
        Ok(handlers.len())
    }

    pub fn receiver_count<M: Record>(&self, signal: Signal) -> usize {
        self.receivers
            .read()
            .get(&(signal, TypeId::of::<M>()))
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use parking_lot::Mutex;

    struct Invoice {
        id: u64,
    }

    impl Record for Invoice {
        const RECORD_TYPE: &'static str = "billing.invoice";

        fn record_id(&self) -> u64 {
            self.id
        }
    }

    struct Customer;

    impl Record for Customer {
        const RECORD_TYPE: &'static str = "billing.customer";

        fn record_id(&self) -> u64 {
            1
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<u64>>>, impl Fn(&Invoice) -> Result<(), SyncError>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |invoice: &Invoice| {
            sink.lock().push(invoice.id);
            Ok(())
        })
    }

    #[test]
    fn test_send_reaches_matching_type_only() {
        let bus = SignalBus::new();
        let (seen, handler) = recorder();
        bus.connect::<Invoice, _>(Signal::PostSave, "invoices", handler);

        assert_eq!(bus.send(Signal::PostSave, &Invoice { id: 5 }).unwrap(), 1);
        assert_eq!(bus.send(Signal::PostDelete, &Invoice { id: 6 }).unwrap(), 0);
        assert_eq!(bus.send(Signal::PostSave, &Customer).unwrap(), 0);
        assert_eq!(*seen.lock(), vec![5]);
    }

    #[test]
    fn test_duplicate_uid_is_ignored() {
        let bus = SignalBus::new();
        let (seen, handler) = recorder();
        let (_, second) = recorder();

        assert!(bus.connect::<Invoice, _>(Signal::PostSave, "invoices", handler));
        assert!(!bus.connect::<Invoice, _>(Signal::PostSave, "invoices", second));
        assert_eq!(bus.receiver_count::<Invoice>(Signal::PostSave), 1);

        bus.send(Signal::PostSave, &Invoice { id: 1 }).unwrap();
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_disconnect() {
        let bus = SignalBus::new();
        let (seen, handler) = recorder();
        bus.connect::<Invoice, _>(Signal::PostSave, "invoices", handler);

        assert!(bus.disconnect::<Invoice>(Signal::PostSave, "invoices"));
        assert!(!bus.disconnect::<Invoice>(Signal::PostSave, "invoices"));
        bus.send(Signal::PostSave, &Invoice { id: 1 }).unwrap();
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_error_stops_dispatch() {
        let bus = SignalBus::new();
        let (seen, handler) = recorder();
        bus.connect::<Invoice, _>(Signal::PostSave, "failing", |_: &Invoice| {
            Err(SyncError::NotObserved("billing.invoice"))
        });
        bus.connect::<Invoice, _>(Signal::PostSave, "after", handler);

        let result = bus.send(Signal::PostSave, &Invoice { id: 1 });
        assert!(matches!(result, Err(SyncError::NotObserved(_))));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_receiver_may_connect_while_dispatching() {
        let bus = Arc::new(SignalBus::new());
        let inner = Arc::clone(&bus);
        bus.connect::<Invoice, _>(Signal::PostSave, "registrar", move |_: &Invoice| {
            inner.connect::<Invoice, _>(Signal::PostDelete, "late", |_: &Invoice| Ok(()));
            Ok(())
        });

        bus.send(Signal::PostSave, &Invoice { id: 1 }).unwrap();
        assert_eq!(bus.receiver_count::<Invoice>(Signal::PostDelete), 1);
    }
}
