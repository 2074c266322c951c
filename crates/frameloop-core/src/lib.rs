//! Frame-driven callback scheduler.
//!
//! One shared ticking mechanism for animation, polling and simulation
//! stepping: a [`Loop`] driven by the host's frame pacing primitive
//! dispatches per-frame and per-interval callbacks with clamped elapsed-time
//! information, and supports pausing, one-shot timers and bounded-repeat
//! timers.
//!
//! The host supplies its services through the [`platform`] traits: a
//! [`FramePacer`] that arranges the next call to [`Loop::tick`] and a
//! monotonic [`Clock`]. `frameloop-runtime-std` provides `std`-backed
//! implementations.

pub mod emitter;
pub mod entry;
pub mod platform;
pub mod update_loop;

pub use emitter::{Emitter, SubscriberId};
pub use entry::{CompletedEvent, Entry, EntryCallback, FireEvent};
pub use platform::{Clock, FramePacer};
pub use update_loop::{
    Loop, LoopHandle, LoopOptions, StartedEvent, StoppedEvent, TickEvent,
    DEFAULT_MAX_FRAME_TIME_MS,
};
