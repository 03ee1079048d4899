//! Ordered, single-threaded event listeners.
//!
//! Listeners are notified in registration order. Removing a listener (including the
//! one currently running) while a notification is in flight is allowed: the removed
//! listener is not called again, and the remaining listeners still run.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Identifies one listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<E> = Rc<dyn Fn(&E)>;

struct Registry<E> {
    next_id: u64,
    entries: Vec<(ListenerId, Callback<E>)>,
}

impl<E> Registry<E> {
    fn contains(&self, id: ListenerId) -> bool {
        self.entries.iter().any(|(entry, _)| *entry == id)
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }
}

/// A list of listeners for events of type `E`.
pub struct Dispatcher<E> {
    registry: Rc<RefCell<Registry<E>>>,
}

impl<E> Dispatcher<E> {
    /// Creates a dispatcher with no listeners.
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Registers a listener and returns its id.
    pub fn add(&self, listener: impl Fn(&E) + 'static) -> ListenerId {
        let mut registry = self.registry.borrow_mut();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry.entries.push((id, Rc::new(listener)));
        id
    }

    /// Unregisters a listener. Returns `false` if it was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        self.registry.borrow_mut().remove(id)
    }

    /// Returns a handle that can unregister listeners from inside a callback.
    pub fn handle(&self) -> DispatcherHandle<E> {
        DispatcherHandle {
            registry: Rc::downgrade(&self.registry),
        }
    }

    /// Calls every registered listener with `event`.
    ///
    /// Listeners added during the notification are first called on the next one.
    pub fn notify(&self, event: &E) {
        let snapshot: Vec<(ListenerId, Callback<E>)> = self
            .registry
            .borrow()
            .entries
            .iter()
            .map(|(id, callback)| (*id, Rc::clone(callback)))
            .collect();

        for (id, callback) in snapshot {
            if self.registry.borrow().contains(id) {
                callback(event);
            }
        }
    }

    /// Returns the number of registered listeners.
    pub fn len(&self) -> usize {
        self.registry.borrow().entries.len()
    }

    /// Returns whether no listeners are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> Default for Dispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Dispatcher<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("listeners", &self.len())
            .finish()
    }
}

/// A weak reference to a [`Dispatcher`] for unregistering listeners.
pub struct DispatcherHandle<E> {
    registry: Weak<RefCell<Registry<E>>>,
}

impl<E> DispatcherHandle<E> {
    /// Unregisters a listener. Returns `false` if the listener or the dispatcher is gone.
    pub fn remove(&self, id: ListenerId) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.borrow_mut().remove(id))
    }
}

impl<E> Clone for DispatcherHandle<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Weak::clone(&self.registry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[test]
    fn test_notifies_in_registration_order() {
        let dispatcher = Dispatcher::<u32>::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for tag in 0..3 {
            let log = Rc::clone(&log);
            dispatcher.add(move |value: &u32| log.borrow_mut().push((tag, *value)));
        }

        dispatcher.notify(&7);
        assert_eq!(*log.borrow(), vec![(0, 7), (1, 7), (2, 7)]);
    }

    #[test]
    fn test_remove() {
        let dispatcher = Dispatcher::<()>::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let id = dispatcher.add(move |()| c.set(c.get() + 1));

        dispatcher.notify(&());
        assert!(dispatcher.remove(id));
        assert!(!dispatcher.remove(id));
        dispatcher.notify(&());
        assert_eq!(count.get(), 1);
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn test_self_removal_during_notify() {
        let dispatcher = Dispatcher::<()>::new();
        let handle = dispatcher.handle();
        let own_id = Rc::new(Cell::new(None));
        let later_calls = Rc::new(Cell::new(0));

        let slot = Rc::clone(&own_id);
        let id = dispatcher.add(move |()| {
            if let Some(id) = slot.get() {
                handle.remove(id);
            }
        });
        own_id.set(Some(id));

        let calls = Rc::clone(&later_calls);
        dispatcher.add(move |()| calls.set(calls.get() + 1));

        dispatcher.notify(&());
        assert_eq!(later_calls.get(), 1);
        assert_eq!(dispatcher.len(), 1);
    }

    #[test]
    fn test_removing_a_later_listener_skips_only_it() {
        let dispatcher = Dispatcher::<()>::new();
        let handle = dispatcher.handle();
        let victim = Rc::new(Cell::new(None));
        let calls = Rc::new(RefCell::new(Vec::new()));

        let v = Rc::clone(&victim);
        let log = Rc::clone(&calls);
        dispatcher.add(move |()| {
            log.borrow_mut().push("first");
            if let Some(id) = v.get() {
                handle.remove(id);
            }
        });
        let log = Rc::clone(&calls);
        victim.set(Some(dispatcher.add(move |()| log.borrow_mut().push("victim"))));
        let log = Rc::clone(&calls);
        dispatcher.add(move |()| log.borrow_mut().push("last"));

        dispatcher.notify(&());
        assert_eq!(*calls.borrow(), vec!["first", "last"]);
    }

    #[test]
    fn test_handle_outlives_dispatcher() {
        let dispatcher = Dispatcher::<()>::new();
        let id = dispatcher.add(|()| {});
        let handle = dispatcher.handle();
        drop(dispatcher);
        assert!(!handle.remove(id));
    }
}
