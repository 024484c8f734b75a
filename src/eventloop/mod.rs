//! Minimal event-loop implementation handed to the hypervisor client.
//!
//! One handle slot, one timer slot, one `poll(2)` per iteration.

pub mod event_loop;
pub mod poller;
pub mod registry;
pub mod signals;
pub mod translate;

use std::os::unix::io::RawFd;

pub use event_loop::{EventLoop, LoopExit, Step};
pub use poller::{PollSet, Poller, Ready};
pub use registry::Registry;
pub use signals::Interrupt;
pub use translate::{HandleEvents, PollEvents};

/// Invoked with `(watch, fd, events)` when a watched descriptor is ready.
pub type HandleCallback = Box<dyn FnMut(i32, RawFd, HandleEvents)>;

/// Invoked with the timer id when the timer is dispatched.
pub type TimerCallback = Box<dyn FnMut(i32)>;

/// Registration contract the client library uses to drive its I/O.
///
/// Failures are never reported back beyond a negative id from the `add_*`
/// calls; the implementation logs them instead.
pub trait EventImpl {
    /// Watch `fd` for `events`. Returns the watch id, or -1 on failure.
    fn add_handle(&mut self, fd: RawFd, events: HandleEvents, cb: HandleCallback) -> i32;
    fn update_handle(&mut self, watch: i32, events: HandleEvents);
    fn remove_handle(&mut self, watch: i32);
    /// Arm a timer with `timeout` milliseconds (-1 disables). Returns the timer id.
    fn add_timeout(&mut self, timeout: i32, cb: TimerCallback) -> i32;
    fn update_timeout(&mut self, timer: i32, timeout: i32);
    fn remove_timeout(&mut self, timer: i32);
}
