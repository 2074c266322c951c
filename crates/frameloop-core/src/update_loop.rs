//! The frame-driven scheduler.
//!
//! A [`Loop`] owns an ordered registry of [`Entry`] values and drives them
//! from the host's frame pacing primitive: every frame the host calls
//! [`Loop::tick`], which computes the clamped elapsed time, updates every
//! entry with the same value, removes completed entries synchronously, and
//! requests the next frame while still running.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use log::{debug, trace};

use crate::emitter::Emitter;
use crate::entry::{Entry, EntryCallback};
use crate::platform::{Clock, FramePacer};

/// Default ceiling for a single frame's elapsed time: one 60 Hz frame.
pub const DEFAULT_MAX_FRAME_TIME_MS: f64 = 1000.0 / 60.0;

/// Construction options for [`Loop`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopOptions {
    /// Clamp ceiling for any single elapsed-time delta. Large gaps (a
    /// backgrounded window, a debugger pause) are reported to entries as at
    /// most this value.
    pub max_frame_time_ms: f64,
    /// When set, [`Loop::on_focus_lost`] stops the loop and
    /// [`Loop::on_focus_gained`] restarts it.
    pub pause_on_focus_loss: bool,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            max_frame_time_ms: DEFAULT_MAX_FRAME_TIME_MS,
            pause_on_focus_loss: false,
        }
    }
}

/// Payload of the `each_tick` signal, emitted after all entry updates.
pub struct TickEvent {
    pub elapsed_ms: f64,
    pub handle: LoopHandle,
}

/// Payload of the `started` signal.
pub struct StartedEvent {
    pub handle: LoopHandle,
}

/// Payload of the `stopped` signal.
pub struct StoppedEvent {
    pub handle: LoopHandle,
}

struct LoopInner {
    weak_self: Weak<LoopInner>,
    pacer: Arc<dyn FramePacer>,
    clock: Arc<dyn Clock>,
    options: LoopOptions,
    entries: RefCell<Vec<Rc<Entry>>>,
    running: Cell<bool>,
    blurred: Cell<bool>,
    last_tick_ms: Cell<f64>,
    started: Emitter<StartedEvent>,
    stopped: Emitter<StoppedEvent>,
    each_tick: Emitter<TickEvent>,
}

impl LoopInner {
    fn handle(&self) -> LoopHandle {
        LoopHandle(self.weak_self.clone())
    }

    fn add(
        &self,
        callback: Option<EntryCallback>,
        interval_ms: f64,
        count: Option<u32>,
    ) -> Rc<Entry> {
        let entry = Entry::new(callback, interval_ms, count);
        self.entries.borrow_mut().push(Rc::clone(&entry));
        entry
    }

    fn remove(&self, entry: &Rc<Entry>) {
        let mut entries = self.entries.borrow_mut();
        if let Some(index) = entries.iter().position(|e| Rc::ptr_eq(e, entry)) {
            entries.remove(index);
        }
    }

    fn remove_all(&self) {
        self.entries.borrow_mut().clear();
    }

    fn start(&self) {
        if self.running.get() {
            return;
        }
        self.running.set(true);
        self.last_tick_ms.set(self.clock.now_ms());
        debug!("loop started");
        self.started.emit(&StartedEvent {
            handle: self.handle(),
        });
        // A started-handler may have stopped the loop again.
        if self.running.get() {
            self.pacer.request_frame();
        }
    }

    fn stop(&self) {
        self.blurred.set(false);
        if !self.running.get() {
            return;
        }
        self.running.set(false);
        self.pacer.cancel_frame();
        debug!("loop stopped");
        self.stopped.emit(&StoppedEvent {
            handle: self.handle(),
        });
    }

    fn tick(&self) {
        // Canonical guard against a frame request already in flight when
        // stop() was called: that frame arrives here and does nothing.
        if !self.running.get() {
            return;
        }
        let now = self.clock.now_ms();
        let raw = now - self.last_tick_ms.get();
        self.last_tick_ms.set(now);
        let elapsed_ms = raw.clamp(0.0, self.options.max_frame_time_ms);
        if raw > self.options.max_frame_time_ms {
            trace!("frame delta {raw:.2}ms clamped to {elapsed_ms:.2}ms");
        }

        // Iterate a snapshot so entry callbacks may add or remove entries.
        // Added entries first run next tick; an entry removed before its
        // turn is re-checked against the registry and skipped.
        let snapshot: Vec<Rc<Entry>> = self.entries.borrow().clone();
        for entry in &snapshot {
            let registered = self
                .entries
                .borrow()
                .iter()
                .any(|e| Rc::ptr_eq(e, entry));
            if !registered {
                continue;
            }
            if entry.update(elapsed_ms) {
                self.remove(entry);
            }
        }

        self.each_tick.emit(&TickEvent {
            elapsed_ms,
            handle: self.handle(),
        });
        if self.running.get() {
            self.pacer.request_frame();
        }
    }

    fn on_focus_lost(&self) {
        if !self.options.pause_on_focus_loss {
            return;
        }
        if self.running.get() {
            self.stop();
            self.blurred.set(true);
        }
    }

    fn on_focus_gained(&self) {
        if !self.options.pause_on_focus_loss {
            return;
        }
        if self.blurred.get() {
            self.blurred.set(false);
            self.start();
        }
    }

    fn count(&self) -> usize {
        self.entries.borrow().len()
    }

    fn count_running(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|entry| !entry.paused())
            .count()
    }
}

/// The scheduler root. See the module docs for the tick cycle.
pub struct Loop {
    inner: Rc<LoopInner>,
}

impl Loop {
    pub fn new(pacer: Arc<dyn FramePacer>, clock: Arc<dyn Clock>, options: LoopOptions) -> Self {
        let inner = Rc::new_cyclic(|weak| LoopInner {
            weak_self: weak.clone(),
            pacer,
            clock,
            options,
            entries: RefCell::new(Vec::new()),
            running: Cell::new(false),
            blurred: Cell::new(false),
            last_tick_ms: Cell::new(0.0),
            started: Emitter::new(),
            stopped: Emitter::new(),
            each_tick: Emitter::new(),
        });
        Self { inner }
    }

    /// Registers a callback. `interval_ms` of `0.0` fires every frame;
    /// `count` of `None` (or `0`) repeats without limit. Always succeeds.
    pub fn add(
        &self,
        callback: impl FnMut(f64, &Entry) -> bool + 'static,
        interval_ms: f64,
        count: Option<u32>,
    ) -> Rc<Entry> {
        self.inner.add(Some(Box::new(callback)), interval_ms, count)
    }

    /// Registers an entry with no callback: a pure periodic ping observed
    /// through its `each_fire` signal.
    pub fn ping(&self, interval_ms: f64, count: Option<u32>) -> Rc<Entry> {
        self.inner.add(None, interval_ms, count)
    }

    /// Registers a one-shot callback: `add(callback, delay_ms, 1)`.
    pub fn timeout(
        &self,
        callback: impl FnMut(f64, &Entry) -> bool + 'static,
        delay_ms: f64,
    ) -> Rc<Entry> {
        self.add(callback, delay_ms, Some(1))
    }

    /// Removes an entry from the registry; silent no-op when absent.
    pub fn remove(&self, entry: &Rc<Entry>) {
        self.inner.remove(entry);
    }

    /// Clears the registry without changing the run state.
    pub fn remove_all(&self) {
        self.inner.remove_all();
    }

    /// Starts the frame cycle. No-op when already running; `started` is
    /// emitted once per transition.
    pub fn start(&self) {
        self.inner.start();
    }

    /// Stops the frame cycle and clears any blurred mark. Emits `stopped`
    /// only when the loop was actually running.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Host-driven frame callback. No-op while stopped.
    pub fn tick(&self) {
        self.inner.tick();
    }

    /// Host focus-loss event. Active only with
    /// [`LoopOptions::pause_on_focus_loss`].
    pub fn on_focus_lost(&self) {
        self.inner.on_focus_lost();
    }

    /// Host focus-gain event, resuming a loop stopped by focus loss.
    pub fn on_focus_gained(&self) {
        self.inner.on_focus_gained();
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }

    /// Whether the loop was stopped by focus loss and will auto-resume.
    pub fn is_blurred(&self) -> bool {
        self.inner.blurred.get()
    }

    pub fn options(&self) -> LoopOptions {
        self.inner.options
    }

    /// Number of registered entries.
    pub fn count(&self) -> usize {
        self.inner.count()
    }

    /// Number of registered entries that are not paused.
    pub fn count_running(&self) -> usize {
        self.inner.count_running()
    }

    /// Signal emitted when the loop transitions to running.
    pub fn started(&self) -> &Emitter<StartedEvent> {
        &self.inner.started
    }

    /// Signal emitted when the loop transitions to stopped.
    pub fn stopped(&self) -> &Emitter<StoppedEvent> {
        &self.inner.stopped
    }

    /// Signal emitted after every tick's entry updates.
    pub fn each_tick(&self) -> &Emitter<TickEvent> {
        &self.inner.each_tick
    }

    /// Weak handle for callbacks and host adapters. All operations degrade
    /// to no-ops once the loop is dropped.
    pub fn handle(&self) -> LoopHandle {
        self.inner.handle()
    }
}

impl fmt::Debug for Loop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loop")
            .field("running", &self.inner.running.get())
            .field("blurred", &self.inner.blurred.get())
            .field("entries", &self.inner.count())
            .finish()
    }
}

/// Weak reference to a [`Loop`], safe to hold inside entry callbacks.
#[derive(Clone)]
pub struct LoopHandle(Weak<LoopInner>);

impl LoopHandle {
    pub fn add(
        &self,
        callback: impl FnMut(f64, &Entry) -> bool + 'static,
        interval_ms: f64,
        count: Option<u32>,
    ) -> Option<Rc<Entry>> {
        self.0
            .upgrade()
            .map(|inner| inner.add(Some(Box::new(callback)), interval_ms, count))
    }

    pub fn ping(&self, interval_ms: f64, count: Option<u32>) -> Option<Rc<Entry>> {
        self.0.upgrade().map(|inner| inner.add(None, interval_ms, count))
    }

    pub fn timeout(
        &self,
        callback: impl FnMut(f64, &Entry) -> bool + 'static,
        delay_ms: f64,
    ) -> Option<Rc<Entry>> {
        self.add(callback, delay_ms, Some(1))
    }

    pub fn remove(&self, entry: &Rc<Entry>) {
        if let Some(inner) = self.0.upgrade() {
            inner.remove(entry);
        }
    }

    pub fn remove_all(&self) {
        if let Some(inner) = self.0.upgrade() {
            inner.remove_all();
        }
    }

    pub fn start(&self) {
        if let Some(inner) = self.0.upgrade() {
            inner.start();
        }
    }

    pub fn stop(&self) {
        if let Some(inner) = self.0.upgrade() {
            inner.stop();
        }
    }

    pub fn tick(&self) {
        if let Some(inner) = self.0.upgrade() {
            inner.tick();
        }
    }

    pub fn is_running(&self) -> bool {
        self.0
            .upgrade()
            .map(|inner| inner.running.get())
            .unwrap_or(false)
    }

    pub fn count(&self) -> usize {
        self.0.upgrade().map(|inner| inner.count()).unwrap_or(0)
    }

    pub fn count_running(&self) -> usize {
        self.0
            .upgrade()
            .map(|inner| inner.count_running())
            .unwrap_or(0)
    }
}

impl fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopHandle")
            .field("alive", &(self.0.strong_count() > 0))
            .finish()
    }
}
