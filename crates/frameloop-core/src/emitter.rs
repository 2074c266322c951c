//! Notification emitter shared by [`Entry`](crate::Entry) and
//! [`Loop`](crate::Loop).
//!
//! Each component owns its emitters by composition; subscribers are
//! identified by monotonically increasing ids and may unsubscribe at any
//! time, including from inside a handler running during `emit`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::trace;

/// Identifier returned by [`Emitter::subscribe`], used to unsubscribe.
pub type SubscriberId = u64;

struct Subscriber<E> {
    id: SubscriberId,
    handler: Rc<RefCell<dyn FnMut(&E)>>,
}

/// Ordered list of handlers for one named signal.
pub struct Emitter<E> {
    subscribers: RefCell<Vec<Subscriber<E>>>,
    next_id: Cell<SubscriberId>,
}

impl<E> Emitter<E> {
    pub fn new() -> Self {
        Self {
            subscribers: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    /// Registers a handler, invoked on every subsequent [`emit`](Self::emit)
    /// in subscription order.
    pub fn subscribe(&self, handler: impl FnMut(&E) + 'static) -> SubscriberId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.subscribers.borrow_mut().push(Subscriber {
            id,
            handler: Rc::new(RefCell::new(handler)),
        });
        id
    }

    /// Removes a handler. Returns `false` when the id is unknown, which is
    /// tolerated rather than treated as an error.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        if let Some(index) = subscribers.iter().position(|s| s.id == id) {
            subscribers.remove(index);
            true
        } else {
            false
        }
    }

    /// Invokes every handler subscribed at the time of the call.
    ///
    /// Dispatch runs over a snapshot so handlers may freely subscribe or
    /// unsubscribe: a handler removed mid-emit is skipped if it has not run
    /// yet, and a handler added mid-emit first runs on the next emit.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<(SubscriberId, Rc<RefCell<dyn FnMut(&E)>>)> = self
            .subscribers
            .borrow()
            .iter()
            .map(|s| (s.id, Rc::clone(&s.handler)))
            .collect();
        for (id, handler) in snapshot {
            let still_subscribed = self.subscribers.borrow().iter().any(|s| s.id == id);
            if !still_subscribed {
                continue;
            }
            // A handler re-entering its own emit is skipped, not deadlocked.
            match handler.try_borrow_mut() {
                Ok(mut handler) => (*handler)(event),
                Err(_) => trace!("subscriber {id} re-entered its own emit, skipped"),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.borrow().is_empty()
    }
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::Emitter;

    #[test]
    fn emits_in_subscription_order() {
        let emitter = Emitter::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for label in ["a", "b", "c"] {
            let seen = seen.clone();
            emitter.subscribe(move |_: &u32| seen.borrow_mut().push(label));
        }
        emitter.emit(&0);
        assert_eq!(*seen.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn unsubscribe_removes_handler() {
        let emitter = Emitter::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_a = seen.clone();
        let a = emitter.subscribe(move |value: &u32| seen_a.borrow_mut().push(*value));
        assert!(emitter.unsubscribe(a));
        assert!(!emitter.unsubscribe(a), "second unsubscribe is tolerated");
        emitter.emit(&7);
        assert!(seen.borrow().is_empty());
        assert!(emitter.is_empty());
    }

    #[test]
    fn unsubscribe_during_emit_skips_pending_handler() {
        let emitter = Rc::new(Emitter::new());
        let second_ran = Rc::new(RefCell::new(false));

        let second_id = Rc::new(RefCell::new(0));
        {
            let inner = emitter.clone();
            let second_id = second_id.clone();
            emitter.subscribe(move |_: &u32| {
                inner.unsubscribe(*second_id.borrow());
            });
        }
        {
            let second_ran = second_ran.clone();
            let id = emitter.subscribe(move |_: &u32| *second_ran.borrow_mut() = true);
            *second_id.borrow_mut() = id;
        }

        emitter.emit(&0);
        assert!(!*second_ran.borrow());
        assert_eq!(emitter.len(), 1);
    }

    #[test]
    fn subscribe_during_emit_defers_to_next_emit() {
        let emitter = Rc::new(Emitter::new());
        let late_runs = Rc::new(RefCell::new(0u32));
        {
            let inner = emitter.clone();
            let late_runs = late_runs.clone();
            emitter.subscribe(move |_: &u32| {
                let late_runs = late_runs.clone();
                inner.subscribe(move |_: &u32| *late_runs.borrow_mut() += 1);
            });
        }
        emitter.emit(&0);
        assert_eq!(*late_runs.borrow(), 0);
        // The first emit subscribed one extra handler; stop growth here.
        emitter.emit(&0);
        assert_eq!(*late_runs.borrow(), 1);
    }
}
