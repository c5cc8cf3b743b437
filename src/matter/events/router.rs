use super::{CommissioningState, LifecycleEvent, LifecycleEventCallback};
use crate::commissioning::CommissioningStore;
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Posts events to the router task.
#[derive(Debug, Clone)]
pub struct EventSender(UnboundedSender<LifecycleEvent>);

impl EventSender {
    pub fn channel() -> (Self, UnboundedReceiver<LifecycleEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }

    /// Queue an event. Returns false once the router has stopped.
    pub fn post(&self, event: LifecycleEvent) -> bool {
        if self.0.send(event).is_err() {
            warn!("[Matter] Event router stopped, dropping {:?}", event);
            return false;
        }
        true
    }
}

/// Delivers each event once to the application callback and tracks the
/// commissioning state.
#[derive(Clone)]
pub struct LifecycleEventRouter {
    callback: Arc<dyn LifecycleEventCallback>,
    state: Arc<RwLock<CommissioningState>>,
    store: Option<Arc<CommissioningStore>>,
}

impl LifecycleEventRouter {
    pub fn new(
        callback: Arc<dyn LifecycleEventCallback>,
        store: Option<Arc<CommissioningStore>>,
    ) -> Self {
        let initial = match &store {
            Some(store) if store.is_commissioned() => CommissioningState::Commissioned,
            _ => CommissioningState::Uncommissioned,
        };
        Self {
            callback,
            state: Arc::new(RwLock::new(initial)),
            store,
        }
    }

    pub fn state(&self) -> CommissioningState {
        *self.state.read()
    }

    /// Handle one event.
    pub fn route(&self, event: LifecycleEvent) {
        if let Some(next) = self.transition(event) {
            self.persist(next);
        }
    }

    /// Deliver `event` and advance the state. Returns the new state when it
    /// changed. The state lock is released before returning.
    fn transition(&self, event: LifecycleEvent) -> Option<CommissioningState> {
        if let LifecycleEvent::Other(code) = event {
            debug!("[Matter] Ignoring unhandled event kind {}", code);
            return None;
        }

        self.callback.on_event(event);

        let mut state = self.state.write();
        let next = state.on_event(event);
        if next == *state {
            return None;
        }
        info!("[Matter] Commissioning state: {} -> {}", *state, next);
        *state = next;
        Some(next)
    }

    fn persist(&self, state: CommissioningState) {
        if state == CommissioningState::Commissioned
            && let Some(store) = &self.store
        {
            store.mark_commissioned();
        }
    }

    /// Consume `rx` on the current tokio runtime until every sender is gone.
    ///
    /// Writing the commissioning record runs on the blocking pool.
    pub fn spawn(self, mut rx: UnboundedReceiver<LifecycleEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(next) = self.transition(event) else {
                    continue;
                };
                let router = self.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || router.persist(next)).await {
                    warn!("[Matter] Failed to persist commissioning state: {}", e);
                }
            }
            debug!("[Matter] Event router stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<LifecycleEvent>>);

    impl LifecycleEventCallback for Collect {
        fn on_event(&self, event: LifecycleEvent) {
            self.0.lock().push(event);
        }
    }

    #[test]
    fn test_each_event_delivered_once() {
        let collect = Arc::new(Collect::default());
        let router = LifecycleEventRouter::new(collect.clone(), None);

        router.route(LifecycleEvent::CommissioningSessionStarted);
        router.route(LifecycleEvent::Other(77));
        router.route(LifecycleEvent::InterfaceIpAddressChanged);

        assert_eq!(
            *collect.0.lock(),
            vec![
                LifecycleEvent::CommissioningSessionStarted,
                LifecycleEvent::InterfaceIpAddressChanged
            ]
        );
        assert_eq!(router.state(), CommissioningState::SessionActive);
    }

    #[tokio::test]
    async fn test_router_task_persists_commissioning() {
        let dir = persist::temp_dir();
        let store = Arc::new(CommissioningStore::open(&dir));
        let router = LifecycleEventRouter::new(Arc::new(Collect::default()), Some(store.clone()));
        let observer = router.clone();

        let (tx, rx) = EventSender::channel();
        let handle = router.spawn(rx);
        for event in [
            LifecycleEvent::CommissioningWindowOpened,
            LifecycleEvent::CommissioningSessionStarted,
            LifecycleEvent::CommissioningComplete,
            LifecycleEvent::CommissioningWindowClosed,
        ] {
            assert!(tx.post(event));
        }
        drop(tx);
        tokio_test::assert_ok!(handle.await);

        assert_eq!(observer.state(), CommissioningState::Commissioned);
        assert!(store.is_commissioned());
        assert!(CommissioningStore::open(&dir).is_commissioned());
    }

    #[test]
    fn test_state_settles_before_record_is_written() {
        let dir = persist::temp_dir();
        let store = Arc::new(CommissioningStore::open(&dir));
        let router = LifecycleEventRouter::new(Arc::new(Collect::default()), Some(store.clone()));

        let next = router.transition(LifecycleEvent::CommissioningComplete);
        assert_eq!(next, Some(CommissioningState::Commissioned));
        assert!(router.state.try_write().is_some());
        assert!(!store.is_commissioned());

        router.persist(CommissioningState::Commissioned);
        assert!(store.is_commissioned());
        assert_eq!(router.transition(LifecycleEvent::CommissioningComplete), None);

        router.route(LifecycleEvent::CommissioningWindowClosed);
        assert!(CommissioningStore::open(&dir).is_commissioned());
    }

    #[tokio::test]
    async fn test_post_after_stop() {
        let router = LifecycleEventRouter::new(Arc::new(Collect::default()), None);
        let (tx, rx) = EventSender::channel();
        let handle = router.spawn(rx);
        handle.abort();
        let _ = handle.await;
        assert!(!tx.post(LifecycleEvent::CommissioningComplete));
    }
}
