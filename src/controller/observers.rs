//! Observer registry and subscription handles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::model::{DocumentPhase, Figure};

/// Notification pushed to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// A document's lifecycle phase changed.
    PhaseChanged {
        /// Affected document.
        doc_id: String,
        /// New phase.
        phase: DocumentPhase,
    },
    /// A document's figure list was recomputed.
    FiguresUpdated {
        /// Affected document.
        doc_id: String,
        /// The fresh canonical figure list.
        figures: Vec<Figure>,
    },
}

type Callback = Arc<dyn Fn(&ControllerEvent) + Send + Sync>;
type CallbackMap = Mutex<HashMap<u64, Callback>>;

/// Holds subscriber callbacks; notification never runs under the lock.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    callbacks: Arc<CallbackMap>,
    next_id: AtomicU64,
}

impl ObserverRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn subscribe(
        &self,
        callback: impl Fn(&ControllerEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks
            .lock()
            .unwrap()
            .insert(id, Arc::new(callback));
        Subscription {
            id,
            callbacks: Arc::downgrade(&self.callbacks),
        }
    }

    pub(crate) fn notify(&self, event: &ControllerEvent) {
        let callbacks: Vec<Callback> =
            self.callbacks.lock().unwrap().values().cloned().collect();
        for callback in callbacks {
            callback(event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.callbacks.lock().unwrap().len()
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("subscribers", &self.len())
            .finish()
    }
}

/// Handle to an active subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    callbacks: Weak<CallbackMap>,
}

impl Subscription {
    /// Explicitly remove this subscription.
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(callbacks) = self.callbacks.upgrade() {
            callbacks.lock().unwrap().remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counted(counter: Arc<AtomicUsize>) -> impl Fn(&ControllerEvent) + Send + Sync {
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_notify_reaches_subscribers() {
        let registry = ObserverRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let _sub = registry.subscribe(counted(counter.clone()));

        registry.notify(&ControllerEvent::PhaseChanged {
            doc_id: "d".to_string(),
            phase: DocumentPhase::Ready,
        });
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let registry = ObserverRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let _sub = registry.subscribe(counted(counter.clone()));
            assert_eq!(registry.len(), 1);
        }
        assert_eq!(registry.len(), 0);

        registry.notify(&ControllerEvent::FiguresUpdated {
            doc_id: "d".to_string(),
            figures: Vec::new(),
        });
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_explicit_unsubscribe() {
        let registry = ObserverRegistry::new();
        let sub = registry.subscribe(|_| {});
        sub.unsubscribe();
        assert_eq!(registry.len(), 0);
    }
}
