//! Named boolean flags published by the coprocessor driver.
//!
//! The driver publishes connectivity and lifecycle signals as system-wide
//! boolean flags, independent of the message protocol. [`StateStore`] is the
//! boundary to that store; [`MemoryStateStore`] is an in-process
//! implementation for embedders that publish flags themselves.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use tracing::trace;

/// Flag labels published by the driver.
pub mod labels {
    pub const DEVICE_CONNECTED: &str = "DeviceConnected";
    pub const DEVICE_UNRESPONSIVE: &str = "DeviceUnresponsive";
    pub const DEVICE_TRIGGERED_PANIC: &str = "DeviceTriggeredPanic";
    pub const DEVICE_RESTARTED_BY_HOST: &str = "DeviceRestartedByHost";
    pub const DEVICE_TRIGGERED_HARDWARE_RESET: &str = "DeviceTriggeredHardwareReset";
}

/// Errors from the state store.
#[derive(Debug, thiserror::Error)]
#[error("state store error on '{label}': {reason}")]
pub struct StateError {
    pub label: String,
    pub reason: String,
}

/// Callback invoked with the new value each time a watched flag changes.
pub type WatchFn = Arc<dyn Fn(bool) + Send + Sync>;

/// Handle identifying one watch registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchToken(u64);

/// Shared store of named boolean flags.
///
/// Implementations must deliver changes of one flag to its watchers in the
/// order the changes happened. A flag that was never published reads as
/// `false`.
pub trait StateStore: Send + Sync {
    fn get(&self, label: &str) -> Result<bool, StateError>;

    fn set(&self, label: &str, value: bool) -> Result<(), StateError>;

    /// Call `callback` with the new value on every change of `label`.
    ///
    /// Writes that leave the value as it was must not reach the callback.
    fn watch(&self, label: &str, callback: WatchFn) -> Result<WatchToken, StateError>;

    /// Remove a watch. Unknown tokens are ignored.
    fn unwatch(&self, token: WatchToken);
}

#[derive(Default)]
struct MemoryInner {
    values: HashMap<String, bool>,
    watchers: HashMap<u64, (String, WatchFn)>,
    next_token: u64,
}

/// In-process [`StateStore`].
///
/// Watch callbacks run on the thread that calls [`set`](StateStore::set),
/// after the value is stored. Concurrent setters are serialized so callbacks
/// observe changes in order; a callback may itself call `set`.
#[derive(Default)]
pub struct MemoryStateStore {
    inner: Mutex<MemoryInner>,
    notify: ReentrantMutex<()>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active watches.
    pub fn watcher_count(&self) -> usize {
        self.inner.lock().watchers.len()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, label: &str) -> Result<bool, StateError> {
        Ok(self.inner.lock().values.get(label).copied().unwrap_or(false))
    }

    fn set(&self, label: &str, value: bool) -> Result<(), StateError> {
        let serial = self.notify.lock();
        let callbacks: Vec<WatchFn> = {
            let mut inner = self.inner.lock();
            let previous = inner.values.insert(label.to_string(), value);
            if previous.unwrap_or(false) == value {
                return Ok(());
            }
            inner
                .watchers
                .values()
                .filter(|(watched, _)| watched == label)
                .map(|(_, callback)| Arc::clone(callback))
                .collect()
        };

        trace!(label, value, watchers = callbacks.len(), "state flag changed");
        for callback in &callbacks {
            callback(value);
        }
        // Unwatched callbacks may be released here; do it outside the lock.
        drop(serial);
        drop(callbacks);
        Ok(())
    }

    fn watch(&self, label: &str, callback: WatchFn) -> Result<WatchToken, StateError> {
        let mut inner = self.inner.lock();
        inner.next_token += 1;
        let token = inner.next_token;
        inner.watchers.insert(token, (label.to_string(), callback));
        Ok(WatchToken(token))
    }

    fn unwatch(&self, token: WatchToken) {
        self.inner.lock().watchers.remove(&token.0);
    }
}

impl std::fmt::Debug for MemoryStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("MemoryStateStore")
            .field("values", &inner.values)
            .field("watchers", &inner.watchers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    fn recorder() -> (WatchFn, Arc<Mutex<Vec<bool>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: WatchFn = Arc::new(move |value| sink.lock().push(value));
        (callback, seen)
    }

    #[test]
    fn unpublished_flag_reads_false() {
        let store = MemoryStateStore::new();
        assert!(!store.get(labels::DEVICE_CONNECTED).unwrap());
        store.set(labels::DEVICE_CONNECTED, true).unwrap();
        assert!(store.get(labels::DEVICE_CONNECTED).unwrap());
    }

    #[test]
    fn watchers_see_changes_only() {
        let store = MemoryStateStore::new();
        let (callback, seen) = recorder();
        store.watch(labels::DEVICE_CONNECTED, callback).unwrap();

        store.set(labels::DEVICE_CONNECTED, false).unwrap();
        store.set(labels::DEVICE_CONNECTED, true).unwrap();
        store.set(labels::DEVICE_CONNECTED, true).unwrap();
        store.set(labels::DEVICE_CONNECTED, false).unwrap();
        store.set(labels::DEVICE_UNRESPONSIVE, true).unwrap();

        assert_eq!(*seen.lock(), vec![true, false]);
    }

    #[test]
    fn unwatch_stops_delivery() {
        let store = MemoryStateStore::new();
        let (callback, seen) = recorder();
        let token = store.watch(labels::DEVICE_TRIGGERED_PANIC, callback).unwrap();
        assert_eq!(store.watcher_count(), 1);

        store.unwatch(token);
        store.unwatch(token);
        store.set(labels::DEVICE_TRIGGERED_PANIC, true).unwrap();

        assert!(seen.lock().is_empty());
        assert_eq!(store.watcher_count(), 0);
    }

    #[test]
    fn callback_may_set_another_flag() {
        let store = Arc::new(MemoryStateStore::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let inner_store = Arc::clone(&store);
        store
            .watch(
                labels::DEVICE_TRIGGERED_HARDWARE_RESET,
                Arc::new(move |value| {
                    if value {
                        inner_store
                            .set(labels::DEVICE_CONNECTED, false)
                            .expect("nested set should succeed");
                    }
                }),
            )
            .unwrap();
        let counter = Arc::clone(&hits);
        store
            .watch(
                labels::DEVICE_CONNECTED,
                Arc::new(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        store.set(labels::DEVICE_CONNECTED, true).unwrap();
        store
            .set(labels::DEVICE_TRIGGERED_HARDWARE_RESET, true)
            .unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(!store.get(labels::DEVICE_CONNECTED).unwrap());
    }

    /// Sets a flag from a fresh thread when dropped.
    struct SetOnDrop {
        store: Arc<MemoryStateStore>,
    }

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            let store = Arc::clone(&self.store);
            thread::spawn(move || store.set(labels::DEVICE_UNRESPONSIVE, true))
                .join()
                .expect("setter thread should not panic")
                .expect("set should succeed");
        }
    }

    #[test]
    fn released_callback_may_block_on_another_setter() {
        let store = Arc::new(MemoryStateStore::new());
        let token = Arc::new(Mutex::new(None::<WatchToken>));

        let guard = SetOnDrop {
            store: Arc::clone(&store),
        };
        let owner = Arc::clone(&store);
        let own_token = Arc::clone(&token);
        let callback: WatchFn = Arc::new(move |_| {
            let _held = &guard;
            if let Some(token) = own_token.lock().take() {
                owner.unwatch(token);
            }
        });
        *token.lock() = Some(store.watch(labels::DEVICE_CONNECTED, callback).unwrap());

        // The set holds the last reference to the callback and its guard.
        store.set(labels::DEVICE_CONNECTED, true).unwrap();

        assert_eq!(store.watcher_count(), 0);
        assert!(store.get(labels::DEVICE_UNRESPONSIVE).unwrap());
    }
}
