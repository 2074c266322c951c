//! A single scheduled callback registration, owned by [`Loop`](crate::Loop).

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::emitter::Emitter;

/// Callback invoked on every fire. Returning `true` finishes the entry.
pub type EntryCallback = Box<dyn FnMut(f64, &Entry) -> bool>;

/// Payload of the `each_fire` signal, emitted on every actual fire.
pub struct FireEvent {
    pub elapsed_ms: f64,
    pub entry: Rc<Entry>,
}

/// Payload of the `completed` signal, emitted exactly once per entry.
pub struct CompletedEvent {
    pub entry: Rc<Entry>,
}

/// One registered callback with its own timing and repeat state.
///
/// Entries are created through [`Loop::add`](crate::Loop::add),
/// [`Loop::timeout`](crate::Loop::timeout) or [`Loop::ping`](crate::Loop::ping)
/// and live in the loop's registry until they complete or are removed. The
/// interval accumulator keeps the overflow remainder after each fire, so
/// repeated firing does not drift against the target interval.
pub struct Entry {
    callback: RefCell<Option<EntryCallback>>,
    interval_ms: Cell<f64>,
    accumulated_ms: Cell<f64>,
    remaining: Cell<Option<u32>>,
    paused: Cell<bool>,
    each_fire: Emitter<FireEvent>,
    completed: Emitter<CompletedEvent>,
}

impl Entry {
    pub(crate) fn new(
        callback: Option<EntryCallback>,
        interval_ms: f64,
        count: Option<u32>,
    ) -> Rc<Self> {
        Rc::new(Self {
            callback: RefCell::new(callback),
            interval_ms: Cell::new(interval_ms),
            accumulated_ms: Cell::new(0.0),
            // A count of zero means unlimited, same as no count at all.
            remaining: Cell::new(count.filter(|&n| n > 0)),
            paused: Cell::new(false),
            each_fire: Emitter::new(),
            completed: Emitter::new(),
        })
    }

    /// Advances the entry by `elapsed_ms` and fires it when due.
    ///
    /// Returns `true` when the entry completed and may be dropped from the
    /// registry. A paused entry does nothing and never completes; its
    /// accumulator does not advance, so no catch-up burst happens on resume.
    pub(crate) fn update(self: &Rc<Self>, elapsed_ms: f64) -> bool {
        if self.paused.get() {
            return false;
        }
        let interval = self.interval_ms.get();
        if interval > 0.0 {
            let accumulated = self.accumulated_ms.get() + elapsed_ms;
            if accumulated < interval {
                self.accumulated_ms.set(accumulated);
                return false;
            }
            // Keep the overflow remainder for drift-free timing.
            self.accumulated_ms.set(accumulated - interval);
        }
        self.fire(elapsed_ms)
    }

    fn fire(self: &Rc<Self>, elapsed_ms: f64) -> bool {
        let mut finished = false;
        // Take the callback out of its slot for the duration of the call so
        // it can freely reach back into the entry or the loop. The take ends
        // the slot borrow before the call and the restore re-borrows after.
        let taken = self.callback.borrow_mut().take();
        if let Some(mut callback) = taken {
            finished = callback(elapsed_ms, self);
            *self.callback.borrow_mut() = Some(callback);
        }
        self.each_fire.emit(&FireEvent {
            elapsed_ms,
            entry: Rc::clone(self),
        });
        if !finished {
            if let Some(remaining) = self.remaining.get() {
                let remaining = remaining - 1;
                self.remaining.set(Some(remaining));
                finished = remaining == 0;
            }
        }
        if finished {
            self.completed.emit(&CompletedEvent {
                entry: Rc::clone(self),
            });
        }
        finished
    }

    /// Whether [`update`](Self::update) currently ignores this entry.
    pub fn paused(&self) -> bool {
        self.paused.get()
    }

    /// Pauses or resumes the entry. A pure state flag with no other side
    /// effects; the entry stays registered either way.
    pub fn set_paused(&self, paused: bool) {
        self.paused.set(paused);
    }

    /// Target delay between fires in milliseconds; `0.0` fires every frame.
    pub fn interval_ms(&self) -> f64 {
        self.interval_ms.get()
    }

    /// Elapsed time accumulated toward the next fire.
    pub fn accumulated_ms(&self) -> f64 {
        self.accumulated_ms.get()
    }

    /// Fires left before completion, `None` for unlimited.
    pub fn remaining(&self) -> Option<u32> {
        self.remaining.get()
    }

    /// Signal emitted on every fire, even for entries without a callback.
    pub fn each_fire(&self) -> &Emitter<FireEvent> {
        &self.each_fire
    }

    /// Signal emitted exactly once, when the entry finishes.
    pub fn completed(&self) -> &Emitter<CompletedEvent> {
        &self.completed
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("interval_ms", &self.interval_ms.get())
            .field("accumulated_ms", &self.accumulated_ms.get())
            .field("remaining", &self.remaining.get())
            .field("paused", &self.paused.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::Entry;

    #[test]
    fn zero_interval_fires_every_update() {
        let fires = Rc::new(Cell::new(0u32));
        let entry = {
            let fires = fires.clone();
            Entry::new(
                Some(Box::new(move |_, _| {
                    fires.set(fires.get() + 1);
                    false
                })),
                0.0,
                None,
            )
        };
        for _ in 0..3 {
            assert!(!entry.update(16.0));
        }
        assert_eq!(fires.get(), 3);
    }

    #[test]
    fn interval_accumulates_with_remainder() {
        let fires = Rc::new(Cell::new(0u32));
        let entry = {
            let fires = fires.clone();
            Entry::new(
                Some(Box::new(move |_, _| {
                    fires.set(fires.get() + 1);
                    false
                })),
                50.0,
                None,
            )
        };
        // 5 x 30ms = 150ms = 3 intervals exactly.
        for _ in 0..5 {
            entry.update(30.0);
        }
        assert_eq!(fires.get(), 3);
        assert_eq!(entry.accumulated_ms(), 0.0);
    }

    #[test]
    fn residual_matches_one_big_increment() {
        let small = Entry::new(Some(Box::new(|_, _| false)), 100.0, None);
        for _ in 0..4 {
            small.update(30.0);
        }
        let big = Entry::new(Some(Box::new(|_, _| false)), 100.0, None);
        big.update(120.0);
        assert_eq!(small.accumulated_ms(), big.accumulated_ms());
    }

    #[test]
    fn countdown_completes_on_final_fire() {
        let entry = Entry::new(Some(Box::new(|_, _| false)), 0.0, Some(2));
        let completions = Rc::new(Cell::new(0u32));
        {
            let completions = completions.clone();
            entry
                .completed()
                .subscribe(move |_| completions.set(completions.get() + 1));
        }
        assert!(!entry.update(16.0));
        assert_eq!(entry.remaining(), Some(1));
        assert!(entry.update(16.0));
        assert_eq!(entry.remaining(), Some(0));
        assert_eq!(completions.get(), 1);
    }

    #[test]
    fn zero_count_means_unlimited() {
        let entry = Entry::new(Some(Box::new(|_, _| false)), 0.0, Some(0));
        assert_eq!(entry.remaining(), None);
        for _ in 0..10 {
            assert!(!entry.update(16.0));
        }
    }

    #[test]
    fn truthy_callback_return_finishes_now() {
        let entry = Entry::new(Some(Box::new(|_, _| true)), 0.0, Some(5));
        assert!(entry.update(16.0));
        // Early finish short-circuits the countdown decrement.
        assert_eq!(entry.remaining(), Some(5));
    }

    #[test]
    fn paused_entry_does_not_accumulate() {
        let fires = Rc::new(Cell::new(0u32));
        let entry = {
            let fires = fires.clone();
            Entry::new(
                Some(Box::new(move |_, _| {
                    fires.set(fires.get() + 1);
                    false
                })),
                40.0,
                None,
            )
        };
        entry.set_paused(true);
        for _ in 0..10 {
            assert!(!entry.update(100.0));
        }
        assert_eq!(fires.get(), 0);
        assert_eq!(entry.accumulated_ms(), 0.0);

        entry.set_paused(false);
        entry.update(30.0);
        assert_eq!(fires.get(), 0, "no catch-up burst after resume");
        entry.update(30.0);
        assert_eq!(fires.get(), 1);
    }

    #[test]
    fn entry_without_callback_still_signals_each_fire() {
        let entry = Entry::new(None, 0.0, None);
        let fires = Rc::new(Cell::new(0u32));
        {
            let fires = fires.clone();
            entry
                .each_fire()
                .subscribe(move |event| {
                    assert_eq!(event.elapsed_ms, 16.0);
                    fires.set(fires.get() + 1);
                });
        }
        assert!(!entry.update(16.0));
        assert_eq!(fires.get(), 1);
    }

    #[test]
    fn callback_is_restored_to_its_slot_after_each_fire() {
        // The callback is taken out of its RefCell slot for the call and put
        // back afterwards; closure-local state must survive across fires.
        let mut calls = 0u32;
        let seen = Rc::new(Cell::new(0u32));
        let entry = {
            let seen = seen.clone();
            Entry::new(
                Some(Box::new(move |_, _: &Entry| {
                    calls += 1;
                    seen.set(calls);
                    false
                })),
                0.0,
                None,
            )
        };
        assert!(!entry.update(16.0));
        assert_eq!(seen.get(), 1);
        assert!(!entry.update(16.0));
        assert_eq!(seen.get(), 2, "same closure instance fires again");
    }

    #[test]
    fn callback_can_pause_its_own_entry() {
        let entry = Entry::new(
            Some(Box::new(|_, entry: &Entry| {
                entry.set_paused(true);
                false
            })),
            0.0,
            None,
        );
        assert!(!entry.update(16.0));
        assert!(entry.paused());
        assert!(!entry.update(16.0), "paused entry no longer fires");
    }
}
