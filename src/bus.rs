// A small named-signal broadcaster.
// Stores share one bus so every surface hears about every change.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;

type Listener = Arc<dyn Fn() + Send + Sync>;

struct Registration {
    id: u64,
    signal: String,
    active: Arc<AtomicBool>,
    listener: Listener,
}

struct Registry {
    // Emit walks a snapshot, so listeners may (un)subscribe re-entrantly
    listeners: ArcSwap<Vec<Arc<Registration>>>,
    next_id: AtomicU64,
}

impl Registry {
    fn detach(&self, id: u64) {
        self.listeners.rcu(|current| {
            current
                .iter()
                .filter(|r| r.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
    }
}

/// Broadcasts payload-free signals to listeners in registration order.
pub struct ChangeBus {
    registry: Arc<Registry>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                listeners: ArcSwap::from_pointee(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Registers `listener` for `signal`. The registration lives until
    /// [`Subscription::unsubscribe`] is called or the bus is dropped.
    pub fn listen<F>(&self, signal: &str, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        let registration = Arc::new(Registration {
            id,
            signal: signal.to_string(),
            active: active.clone(),
            listener: Arc::new(listener),
        });

        self.registry.listeners.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(registration.clone());
            next
        });

        log::debug!("[ChangeBus] Listener {} registered for '{}'", id, signal);

        Subscription {
            id,
            active,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Calls every active listener of `signal` synchronously.
    /// Returns how many listeners ran to completion.
    ///
    /// Listeners registered during the emit are not called by it; listeners
    /// cancelled during the emit are skipped if not yet reached. A panicking
    /// listener is logged and does not stop delivery to the rest.
    pub fn emit(&self, signal: &str) -> usize {
        let snapshot = self.registry.listeners.load_full();
        let mut delivered = 0;

        for registration in snapshot.iter().filter(|r| r.signal == signal) {
            if !registration.active.load(Ordering::Acquire) {
                continue;
            }
            let listener = &registration.listener;
            match panic::catch_unwind(AssertUnwindSafe(|| listener())) {
                Ok(()) => delivered += 1,
                Err(_) => log::error!(
                    "[ChangeBus] Listener {} for '{}' panicked",
                    registration.id,
                    signal
                ),
            }
        }

        delivered
    }

    pub fn listener_count(&self, signal: &str) -> usize {
        self.registry
            .listeners
            .load()
            .iter()
            .filter(|r| r.signal == signal && r.active.load(Ordering::Acquire))
            .count()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeBus")
            .field("listeners", &self.registry.listeners.load().len())
            .finish()
    }
}

/// Handle to a registered listener.
///
/// Dropping the handle leaves the listener registered.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Deregisters the listener. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.detach(self.id);
            log::debug!("[ChangeBus] Listener {} removed", self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Box<dyn Fn() + Send + Sync>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handle = log.clone();
        let make = move |name: &'static str| -> Box<dyn Fn() + Send + Sync> {
            let log = handle.clone();
            Box::new(move || log.lock().unwrap().push(name))
        };
        (log, make)
    }

    #[test]
    fn test_emit_in_registration_order() {
        let bus = ChangeBus::new();
        let (log, make) = recorder();
        let _a = bus.listen("changed", make("a"));
        let _b = bus.listen("changed", make("b"));
        let _c = bus.listen("changed", make("c"));

        assert_eq!(bus.emit("changed"), 3);
        assert_eq!(*log.lock().unwrap(), ["a", "b", "c"]);
    }

    #[test]
    fn test_signals_are_independent() {
        let bus = ChangeBus::new();
        let (log, make) = recorder();
        let _a = bus.listen("one", make("a"));
        let _b = bus.listen("two", make("b"));

        assert_eq!(bus.emit("two"), 1);
        assert_eq!(bus.emit("nobody"), 0);
        assert_eq!(*log.lock().unwrap(), ["b"]);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let bus = ChangeBus::new();
        let (log, make) = recorder();
        let a = bus.listen("changed", make("a"));
        let _b = bus.listen("changed", make("b"));

        a.unsubscribe();
        a.unsubscribe();

        assert!(!a.is_active());
        assert_eq!(bus.listener_count("changed"), 1);
        bus.emit("changed");
        assert_eq!(*log.lock().unwrap(), ["b"]);
    }

    #[test]
    fn test_dropping_handle_keeps_listener() {
        let bus = ChangeBus::new();
        let (log, make) = recorder();
        drop(bus.listen("changed", make("a")));

        bus.emit("changed");
        assert_eq!(*log.lock().unwrap(), ["a"]);
    }

    #[test]
    fn test_unsubscribe_after_bus_dropped() {
        let bus = ChangeBus::new();
        let sub = bus.listen("changed", || {});
        drop(bus);
        sub.unsubscribe();
        assert!(!sub.is_active());
    }

    #[test]
    fn test_listener_can_unsubscribe_itself_during_emit() {
        let bus = Arc::new(ChangeBus::new());
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicU64::new(0));

        let sub = {
            let slot = slot.clone();
            let calls = calls.clone();
            bus.listen("changed", move || {
                calls.fetch_add(1, Ordering::SeqCst);
                if let Some(sub) = slot.lock().unwrap().as_ref() {
                    sub.unsubscribe();
                }
            })
        };
        *slot.lock().unwrap() = Some(sub);

        bus.emit("changed");
        bus.emit("changed");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count("changed"), 0);
    }

    #[test]
    fn test_listener_added_during_emit_waits_for_next_emit() {
        let bus = Arc::new(ChangeBus::new());
        let (log, make) = recorder();
        let make = Arc::new(make);

        let _outer = {
            let bus_inner = Arc::downgrade(&bus);
            let make = make.clone();
            let added = AtomicBool::new(false);
            bus.listen("changed", move || {
                if !added.swap(true, Ordering::SeqCst) {
                    if let Some(bus) = bus_inner.upgrade() {
                        let _ = bus.listen("changed", make("late"));
                    }
                }
            })
        };

        assert_eq!(bus.emit("changed"), 1);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(bus.emit("changed"), 2);
        assert_eq!(*log.lock().unwrap(), ["late"]);
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let bus = ChangeBus::new();
        let (log, make) = recorder();
        let _bad = bus.listen("changed", || panic!("listener failure"));
        let _good = bus.listen("changed", make("good"));

        assert_eq!(bus.emit("changed"), 1);
        assert_eq!(*log.lock().unwrap(), ["good"]);
    }
}
