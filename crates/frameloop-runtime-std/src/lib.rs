//! Standard host services backed by Rust's `std` library.
//!
//! This crate provides concrete implementations of the platform traits
//! defined in `frameloop-core`. Applications can construct a [`StdHost`] and
//! build a [`frameloop_core::Loop`] from it, then drive frames from their own
//! event loop by polling [`StdHost::take_frame_request`] or by registering a
//! waker.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use frameloop_core::{Clock, FramePacer, Loop, LoopOptions};

/// Clock anchored to [`Instant`], reporting fractional milliseconds since
/// construction.
#[derive(Debug, Clone)]
pub struct StdClock {
    epoch: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now_ms(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }
}

/// Frame pacer that records requests in a flag and optionally wakes a host
/// event loop.
pub struct StdPacer {
    frame_requested: AtomicBool,
    frame_waker: RwLock<Option<Arc<dyn Fn() + Send + Sync + 'static>>>,
}

impl StdPacer {
    pub fn new() -> Self {
        Self {
            frame_requested: AtomicBool::new(false),
            frame_waker: RwLock::new(None),
        }
    }

    /// Returns whether a frame has been requested since the last call.
    pub fn take_frame_request(&self) -> bool {
        self.frame_requested.swap(false, Ordering::SeqCst)
    }

    /// Registers a waker invoked whenever a new frame is requested.
    pub fn set_frame_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self.frame_waker.write().unwrap() = Some(Arc::new(waker));
    }

    /// Clears any registered frame waker.
    pub fn clear_frame_waker(&self) {
        *self.frame_waker.write().unwrap() = None;
    }

    fn wake(&self) {
        let waker = self.frame_waker.read().unwrap().clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdPacer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdPacer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdPacer")
            .field(
                "frame_requested",
                &self.frame_requested.load(Ordering::SeqCst),
            )
            .finish()
    }
}

impl FramePacer for StdPacer {
    fn request_frame(&self) {
        self.frame_requested.store(true, Ordering::SeqCst);
        self.wake();
    }

    fn cancel_frame(&self) {
        self.frame_requested.store(false, Ordering::SeqCst);
    }
}

/// Convenience container bundling the standard pacer and clock.
#[derive(Clone)]
pub struct StdHost {
    pacer: Arc<StdPacer>,
    clock: Arc<StdClock>,
}

impl StdHost {
    pub fn new() -> Self {
        Self {
            pacer: Arc::new(StdPacer::default()),
            clock: Arc::new(StdClock::default()),
        }
    }

    /// Builds a [`Loop`] wired to this host's pacer and clock.
    pub fn build_loop(&self, options: LoopOptions) -> Loop {
        Loop::new(self.pacer.clone(), self.clock.clone(), options)
    }

    /// Returns the pacer implementation.
    pub fn pacer(&self) -> Arc<StdPacer> {
        Arc::clone(&self.pacer)
    }

    /// Returns the clock implementation.
    pub fn clock(&self) -> Arc<StdClock> {
        Arc::clone(&self.clock)
    }

    /// Returns whether a frame was requested since the last poll.
    pub fn take_frame_request(&self) -> bool {
        self.pacer.take_frame_request()
    }

    /// Registers a waker to be called when the loop requests a new frame.
    pub fn set_frame_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.pacer.set_frame_waker(waker);
    }

    /// Clears any previously registered frame waker.
    pub fn clear_frame_waker(&self) {
        self.pacer.clear_frame_waker();
    }
}

impl Default for StdHost {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdHost")
            .field("pacer", &self.pacer)
            .field("clock", &self.clock)
            .finish()
    }
}
