//! Platform abstraction traits for the scheduler's host services.
//!
//! These traits allow the loop to delegate frame pacing and clock
//! responsibilities to the host environment, enabling integration with
//! different event loops and making the scheduler testable with manual
//! time sources.

/// Requests frame callbacks from the host.
///
/// Implementations are responsible for arranging one invocation of
/// [`Loop::tick`](crate::Loop::tick) approximately at the next display
/// refresh. The loop calls [`request_frame`](FramePacer::request_frame)
/// once per tick to keep the cycle going. They must be safe to use from
/// multiple threads.
pub trait FramePacer: Send + Sync {
    /// Request that the host deliver one frame callback.
    fn request_frame(&self);

    /// Cancel a pending frame request, when the host supports it.
    ///
    /// The default is a no-op: the loop's running guard already turns a
    /// frame that could not be cancelled into a no-op tick.
    fn cancel_frame(&self) {}
}

/// Provides monotonic timing information for the loop.
pub trait Clock: Send + Sync {
    /// Returns a monotonically non-decreasing timestamp in milliseconds.
    ///
    /// Fractional milliseconds are meaningful; the default frame clamp is
    /// 1000/60 ms.
    fn now_ms(&self) -> f64;
}
