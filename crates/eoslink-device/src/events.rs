//! Lifecycle event delivery.
//!
//! The driver publishes lifecycle signals as boolean flags in a
//! [`StateStore`]. [`EventHub`] watches those flags, turns transitions into
//! [`Event`]s, and runs the single registered handler on a caller-provided
//! [`WorkQueue`].
//!
//! At most one handler is active per hub. A second registration fails with
//! `BadArgument` until the first [`Subscription`] is dropped or the hub is
//! unregistered. Registration, unregistration, and delivery are mutually
//! exclusive: once `unregister` returns, the old handler is not running and
//! will not run again.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam::channel::{self, Sender};
use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, warn};

use crate::error::{EosError, Result};
use crate::state::{labels, StateStore, WatchFn, WatchToken};

/// Coprocessor lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Attached,
    Detached,
    Panicked,
    RestartedByHost,
    WatchdogReset,
}

impl Event {
    pub fn name(self) -> &'static str {
        match self {
            Event::Attached => "attached",
            Event::Detached => "detached",
            Event::Panicked => "panicked",
            Event::RestartedByHost => "restarted-by-host",
            Event::WatchdogReset => "watchdog-reset",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy)]
struct FlagRule {
    label: &'static str,
    rising: Event,
    falling: Option<Event>,
}

impl FlagRule {
    fn event(self, value: bool) -> Option<Event> {
        if value {
            Some(self.rising)
        } else {
            self.falling
        }
    }
}

const FLAG_RULES: [FlagRule; 4] = [
    FlagRule {
        label: labels::DEVICE_CONNECTED,
        rising: Event::Attached,
        falling: Some(Event::Detached),
    },
    FlagRule {
        label: labels::DEVICE_TRIGGERED_PANIC,
        rising: Event::Panicked,
        falling: None,
    },
    FlagRule {
        label: labels::DEVICE_RESTARTED_BY_HOST,
        rising: Event::RestartedByHost,
        falling: None,
    },
    FlagRule {
        label: labels::DEVICE_TRIGGERED_HARDWARE_RESET,
        rising: Event::WatchdogReset,
        falling: None,
    },
];

/// Event produced when flag `label` changes to `value`, if any.
pub fn event_for(label: &str, value: bool) -> Option<Event> {
    FLAG_RULES
        .iter()
        .find(|rule| rule.label == label)
        .and_then(|rule| rule.event(value))
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A named serial worker thread.
///
/// Jobs run one at a time in submission order. Clones share the same thread,
/// which exits once the last clone is dropped and queued jobs have drained.
#[derive(Clone)]
pub struct WorkQueue {
    shared: Arc<QueueShared>,
}

struct QueueShared {
    name: String,
    tx: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    worker_id: ThreadId,
}

impl WorkQueue {
    /// Spawn the worker thread.
    pub fn new(name: impl Into<String>) -> std::io::Result<Self> {
        let name = name.into();
        let (tx, rx) = channel::unbounded::<Job>();
        let worker_name = name.clone();

        let worker = thread::Builder::new().name(name.clone()).spawn(move || {
            for job in rx.iter() {
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    warn!(queue = %worker_name, "work item panicked");
                }
            }
        })?;
        let worker_id = worker.thread().id();

        Ok(Self {
            shared: Arc::new(QueueShared {
                name,
                tx: Some(tx),
                worker: Some(worker),
                worker_id,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Queue a job. Returns false if the worker is gone.
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.shared.tx {
            Some(tx) => tx.send(Box::new(job)).is_ok(),
            None => false,
        }
    }

    /// Whether the caller is running on this queue's worker thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.shared.worker_id
    }

    /// Block until every job submitted before this call has run.
    ///
    /// Returns immediately when called from the worker itself.
    pub fn flush(&self) {
        if self.is_current() {
            return;
        }
        let (done_tx, done_rx) = channel::bounded::<()>(1);
        if self.submit(move || {
            let _ = done_tx.send(());
        }) {
            let _ = done_rx.recv();
        }
    }
}

impl Drop for QueueShared {
    fn drop(&mut self) {
        drop(self.tx.take());
        if let Some(worker) = self.worker.take() {
            if thread::current().id() == self.worker_id {
                return;
            }
            if worker.join().is_err() {
                warn!(queue = %self.name, "work queue thread panicked");
            }
        }
    }
}

impl fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkQueue")
            .field("name", &self.shared.name)
            .finish_non_exhaustive()
    }
}

/// Handler invoked once per delivered event.
pub type EventHandler = Arc<dyn Fn(Event) + Send + Sync>;

struct Active {
    id: u64,
    handler: EventHandler,
    tokens: Vec<WatchToken>,
    // Released only after the gate, so a final drop never joins a worker
    // that is waiting on the gate.
    queue: WorkQueue,
}

struct HubShared {
    store: Arc<dyn StateStore>,
    gate: ReentrantMutex<()>,
    slot: Mutex<Option<Active>>,
    next_id: AtomicU64,
}

impl HubShared {
    /// Remove the active handler, or only handler `id` when given.
    fn unregister(&self, only: Option<u64>) -> bool {
        let gate = self.gate.lock();
        let active = {
            let mut slot = self.slot.lock();
            let matches = slot
                .as_ref()
                .is_some_and(|active| only.is_none_or(|id| active.id == id));
            if matches {
                slot.take()
            } else {
                None
            }
        };

        let Some(active) = active else {
            return false;
        };
        for token in &active.tokens {
            self.store.unwatch(*token);
        }
        drop(gate);
        debug!(id = active.id, queue = active.queue.name(), "event handler unregistered");
        true
    }
}

/// Single-handler event dispatcher over a [`StateStore`].
pub struct EventHub {
    shared: Arc<HubShared>,
}

impl EventHub {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            shared: Arc::new(HubShared {
                store,
                gate: ReentrantMutex::new(()),
                slot: Mutex::new(None),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Register `handler` to run on `queue` for every lifecycle event.
    ///
    /// Fails with [`EosError::BadArgument`] if a handler is already active.
    /// The registration lasts until the returned [`Subscription`] is dropped
    /// or [`EventHub::unregister`] is called.
    pub fn register<F>(&self, queue: &WorkQueue, handler: F) -> Result<Subscription>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let shared = &self.shared;
        let _gate = shared.gate.lock();
        if shared.slot.lock().is_some() {
            return Err(EosError::BadArgument(
                "an event handler is already registered".to_string(),
            ));
        }

        let id = shared.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut tokens = Vec::with_capacity(FLAG_RULES.len());
        for rule in FLAG_RULES {
            let callback = edge_callback(Arc::downgrade(shared), queue.clone(), id, rule);
            match shared.store.watch(rule.label, callback) {
                Ok(token) => tokens.push(token),
                Err(err) => {
                    for token in tokens {
                        shared.store.unwatch(token);
                    }
                    return Err(err.into());
                }
            }
        }

        *shared.slot.lock() = Some(Active {
            id,
            handler: Arc::new(handler),
            tokens,
            queue: queue.clone(),
        });
        debug!(id, queue = queue.name(), "event handler registered");

        Ok(Subscription {
            hub: Arc::downgrade(shared),
            id,
        })
    }

    /// Remove the active handler. Does nothing if none is registered.
    pub fn unregister(&self) {
        self.shared.unregister(None);
    }

    pub fn is_registered(&self) -> bool {
        self.shared.slot.lock().is_some()
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("registered", &self.is_registered())
            .finish_non_exhaustive()
    }
}

fn edge_callback(hub: Weak<HubShared>, queue: WorkQueue, id: u64, rule: FlagRule) -> WatchFn {
    // The store only reports changes, so every callback is an edge.
    Arc::new(move |value| {
        let Some(event) = rule.event(value) else {
            return;
        };
        let hub = hub.clone();
        if !queue.submit(move || deliver(&hub, id, event)) {
            warn!(%event, queue = queue.name(), "work queue closed, event dropped");
        }
    })
}

fn deliver(hub: &Weak<HubShared>, id: u64, event: Event) {
    let Some(shared) = hub.upgrade() else {
        return;
    };
    let _gate = shared.gate.lock();
    let handler = match shared.slot.lock().as_ref() {
        Some(active) if active.id == id => Arc::clone(&active.handler),
        _ => return,
    };
    debug!(%event, "delivering event");
    handler(event);
}

/// Active event handler registration.
///
/// Dropping it unregisters the handler, unless that registration was
/// already replaced after an explicit [`EventHub::unregister`].
#[must_use = "dropping a Subscription unregisters its handler"]
pub struct Subscription {
    hub: Weak<HubShared>,
    id: u64,
}

impl Subscription {
    /// Whether this registration is still the active one.
    pub fn is_active(&self) -> bool {
        self.hub.upgrade().is_some_and(|shared| {
            shared
                .slot
                .lock()
                .as_ref()
                .is_some_and(|active| active.id == self.id)
        })
    }

    /// Unregister now.
    pub fn unregister(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.hub.upgrade() {
            shared.unregister(Some(self.id));
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    use super::*;
    use crate::state::{MemoryStateStore, StateError};

    struct Fixture {
        store: Arc<MemoryStateStore>,
        hub: EventHub,
        queue: WorkQueue,
        seen: Arc<Mutex<Vec<Event>>>,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(MemoryStateStore::new());
            let hub = EventHub::new(Arc::clone(&store) as Arc<dyn StateStore>);
            let queue = WorkQueue::new("eoslink-events-test").expect("queue should spawn");
            Self {
                store,
                hub,
                queue,
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn register(&self) -> Result<Subscription> {
            let sink = Arc::clone(&self.seen);
            self.hub
                .register(&self.queue, move |event| sink.lock().push(event))
        }

        fn set(&self, label: &str, value: bool) {
            self.store.set(label, value).expect("set should succeed");
        }

        fn events(&self) -> Vec<Event> {
            self.queue.flush();
            self.seen.lock().clone()
        }
    }

    #[test]
    fn connected_flag_maps_both_edges() {
        let fx = Fixture::new();
        let _sub = fx.register().unwrap();

        fx.set(labels::DEVICE_CONNECTED, true);
        fx.set(labels::DEVICE_CONNECTED, false);

        assert_eq!(fx.events(), vec![Event::Attached, Event::Detached]);
    }

    #[test]
    fn pulse_flags_fire_on_rising_edge_only() {
        let fx = Fixture::new();
        let _sub = fx.register().unwrap();

        for label in [
            labels::DEVICE_TRIGGERED_PANIC,
            labels::DEVICE_RESTARTED_BY_HOST,
            labels::DEVICE_TRIGGERED_HARDWARE_RESET,
        ] {
            fx.set(label, true);
            fx.set(label, false);
        }
        fx.set(labels::DEVICE_UNRESPONSIVE, true);

        assert_eq!(
            fx.events(),
            vec![Event::Panicked, Event::RestartedByHost, Event::WatchdogReset]
        );
    }

    #[test]
    fn same_flag_transitions_arrive_in_order() {
        let fx = Fixture::new();
        let _sub = fx.register().unwrap();

        for i in 0..100 {
            fx.set(labels::DEVICE_CONNECTED, i % 2 == 0);
        }

        let events = fx.events();
        assert_eq!(events.len(), 100);
        for (i, event) in events.iter().enumerate() {
            let expected = if i % 2 == 0 {
                Event::Attached
            } else {
                Event::Detached
            };
            assert_eq!(*event, expected);
        }
    }

    #[test]
    fn initial_state_is_not_an_event() {
        let fx = Fixture::new();
        fx.set(labels::DEVICE_CONNECTED, true);
        let _sub = fx.register().unwrap();

        fx.set(labels::DEVICE_CONNECTED, true);
        assert!(fx.events().is_empty());

        fx.set(labels::DEVICE_CONNECTED, false);
        assert_eq!(fx.events(), vec![Event::Detached]);
    }

    /// Publishes `DeviceConnected` while a watch is being installed.
    struct AttachOnWatch {
        inner: MemoryStateStore,
    }

    impl StateStore for AttachOnWatch {
        fn get(&self, label: &str) -> std::result::Result<bool, StateError> {
            self.inner.get(label)
        }

        fn set(&self, label: &str, value: bool) -> std::result::Result<(), StateError> {
            self.inner.set(label, value)
        }

        fn watch(
            &self,
            label: &str,
            callback: WatchFn,
        ) -> std::result::Result<WatchToken, StateError> {
            if label == labels::DEVICE_CONNECTED {
                self.inner.set(label, true)?;
            }
            self.inner.watch(label, callback)
        }

        fn unwatch(&self, token: WatchToken) {
            self.inner.unwatch(token)
        }
    }

    #[test]
    fn change_during_registration_is_not_lost() {
        let store = Arc::new(AttachOnWatch {
            inner: MemoryStateStore::new(),
        });
        let hub = EventHub::new(Arc::clone(&store) as Arc<dyn StateStore>);
        let queue = WorkQueue::new("eoslink-events-attach").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = hub.register(&queue, move |event| sink.lock().push(event)).unwrap();

        store.set(labels::DEVICE_CONNECTED, false).unwrap();
        queue.flush();

        assert_eq!(*seen.lock(), vec![Event::Detached]);
    }

    #[test]
    fn second_registration_rejected_until_unregistered() {
        let fx = Fixture::new();
        let first = fx.register().unwrap();

        let other_hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&other_hits);
        let err = fx
            .hub
            .register(&fx.queue, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap_err();
        assert!(matches!(err, EosError::BadArgument(_)));
        assert!(first.is_active());

        fx.set(labels::DEVICE_CONNECTED, true);
        assert_eq!(fx.events(), vec![Event::Attached]);
        assert_eq!(other_hits.load(Ordering::SeqCst), 0);

        fx.hub.unregister();
        assert!(!first.is_active());
        let _second = fx.register().unwrap();
        assert!(fx.hub.is_registered());
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let fx = Fixture::new();
        let sub = fx.register().unwrap();
        assert_eq!(fx.store.watcher_count(), FLAG_RULES.len());

        drop(sub);
        assert!(!fx.hub.is_registered());
        assert_eq!(fx.store.watcher_count(), 0);

        fx.set(labels::DEVICE_CONNECTED, true);
        assert!(fx.events().is_empty());
    }

    #[test]
    fn unregister_is_idempotent() {
        let fx = Fixture::new();
        fx.hub.unregister();

        let sub = fx.register().unwrap();
        fx.hub.unregister();
        fx.hub.unregister();
        sub.unregister();

        assert!(!fx.hub.is_registered());
        assert_eq!(fx.store.watcher_count(), 0);
    }

    #[test]
    fn stale_subscription_does_not_remove_newer_handler() {
        let fx = Fixture::new();
        let stale = fx.register().unwrap();
        fx.hub.unregister();

        let current = fx.register().unwrap();
        drop(stale);

        assert!(current.is_active());
        fx.set(labels::DEVICE_TRIGGERED_PANIC, true);
        assert_eq!(fx.events(), vec![Event::Panicked]);
    }

    #[test]
    fn events_queued_before_unregister_are_dropped() {
        let fx = Fixture::new();
        let gate = Arc::new(Mutex::new(()));
        let held = gate.lock();
        let blocker = Arc::clone(&gate);
        fx.queue.submit(move || {
            let _wait = blocker.lock();
        });

        let sub = fx.register().unwrap();
        fx.set(labels::DEVICE_CONNECTED, true);
        drop(sub);
        drop(held);

        assert!(fx.events().is_empty());
    }

    #[test]
    fn handler_may_unregister_itself() {
        let store = Arc::new(MemoryStateStore::new());
        let hub = Arc::new(EventHub::new(Arc::clone(&store) as Arc<dyn StateStore>));
        let queue = WorkQueue::new("eoslink-events-self").unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let hub_in_handler = Arc::downgrade(&hub);
        let counter = Arc::clone(&hits);
        let sub = hub
            .register(&queue, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                if let Some(hub) = hub_in_handler.upgrade() {
                    hub.unregister();
                }
            })
            .unwrap();

        store.set(labels::DEVICE_CONNECTED, true).unwrap();
        queue.flush();
        store.set(labels::DEVICE_CONNECTED, false).unwrap();
        queue.flush();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!sub.is_active());
    }

    #[test]
    fn panicking_handler_keeps_queue_alive() {
        let fx = Fixture::new();
        let _sub = fx
            .hub
            .register(&fx.queue, |_| panic!("handler failure"))
            .unwrap();
        fx.set(labels::DEVICE_CONNECTED, true);
        fx.queue.flush();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        assert!(fx.queue.submit(move || flag.store(true, Ordering::SeqCst)));
        fx.queue.flush();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn registration_outlives_callers_queue_handle() {
        let store = Arc::new(MemoryStateStore::new());
        let hub = EventHub::new(Arc::clone(&store) as Arc<dyn StateStore>);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        let sub = {
            let queue = WorkQueue::new("eoslink-events-owned").unwrap();
            hub.register(&queue, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
        };
        store.set(labels::DEVICE_TRIGGERED_PANIC, true).unwrap();

        // Joins the last worker handle after the gate is released.
        drop(sub);
        assert!(!hub.is_registered());
        assert!(hits.load(Ordering::SeqCst) <= 1);
        assert_eq!(store.watcher_count(), 0);
    }

    #[test]
    fn event_table() {
        assert_eq!(event_for(labels::DEVICE_CONNECTED, true), Some(Event::Attached));
        assert_eq!(event_for(labels::DEVICE_CONNECTED, false), Some(Event::Detached));
        assert_eq!(event_for(labels::DEVICE_TRIGGERED_PANIC, false), None);
        assert_eq!(event_for(labels::DEVICE_UNRESPONSIVE, true), None);
        assert_eq!(Event::WatchdogReset.to_string(), "watchdog-reset");
    }

    #[test]
    fn work_queue_runs_jobs_in_order() {
        let queue = WorkQueue::new("eoslink-order").unwrap();
        assert_eq!(queue.name(), "eoslink-order");
        assert!(!queue.is_current());

        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..50 {
            let sink = Arc::clone(&seen);
            queue.submit(move || sink.lock().push(i));
        }
        queue.flush();
        assert_eq!(*seen.lock(), (0..50).collect::<Vec<_>>());
    }
}
