use log::{debug, info, warn};
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

use super::poller::{PollSet, Poller, Ready};
use super::registry::{HandleWatch, Registry, TIMER_ID};
use super::signals::Interrupt;
use super::translate::{from_poll_events, to_poll_events, HandleEvents, PollEvents};
use super::{EventImpl, HandleCallback, TimerCallback};
use crate::error::{Error, Result};

/// Default upper bound for one wait.
pub const POLL_TIMEOUT_MS: i32 = 1000;

/// Why the loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopExit {
    /// A keyboard interrupt was pending.
    Interrupted,
    /// The ready descriptor reported hangup.
    PeerReset,
}

/// Outcome of a single wait-and-dispatch cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// The wait timed out with nothing ready.
    Idle,
    Dispatched,
    Exit(LoopExit),
}

/// Owns the registry and the poller; the client library reaches it through
/// [`EventImpl`].
///
/// The timer is dispatched only when a wait returns at least one ready
/// descriptor, before the handle, whatever its timeout says.
pub struct EventLoop<P: Poller = PollSet> {
    poller: P,
    registry: Registry,
    timeout_ms: i32,
    interrupt: Interrupt,
}

impl EventLoop<PollSet> {
    pub fn new() -> Self { Self::with_poller(PollSet::new()) }
}

impl Default for EventLoop<PollSet> {
    fn default() -> Self { Self::new() }
}

impl<P: Poller> EventLoop<P> {
    pub fn with_poller(poller: P) -> Self {
        Self { poller, registry: Registry::new(), timeout_ms: POLL_TIMEOUT_MS, interrupt: Interrupt::keyboard() }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        self
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn registry(&self) -> &Registry { &self.registry }

    pub fn poller(&self) -> &P { &self.poller }

    /// Wait once and dispatch the first ready descriptor.
    pub fn run_once(&mut self) -> Result<Step> {
        let ready = loop {
            if self.interrupt.take() {
                info!("keyboard interrupt, leaving the poll loop");
                return Ok(Step::Exit(LoopExit::Interrupted));
            }
            match self.poller.wait(self.timeout_ms) {
                Ok(ready) => break ready,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                    debug!("poll interrupted by a signal");
                    continue;
                }
                Err(err) => return Err(Error::Poll(err)),
            }
        };
        match ready.first() {
            Some(first) => Ok(self.dispatch(*first)),
            None => Ok(Step::Idle),
        }
    }

    pub fn run_until_exit(&mut self) -> Result<LoopExit> {
        loop {
            if let Step::Exit(exit) = self.run_once()? {
                return Ok(exit);
            }
        }
    }

    fn dispatch(&mut self, ready: Ready) -> Step {
        if self.registry.fire_timer() {
            debug!("timer {} dispatched", TIMER_ID);
        }
        if ready.revents.contains(PollEvents::HUP) {
            warn!("fd {} hung up", ready.fd);
            return Step::Exit(LoopExit::PeerReset);
        }
        if ready.revents.contains(PollEvents::NVAL) {
            warn!("fd {} is not open, dropping it", ready.fd);
            self.registry.clear_watch(ready.fd);
            if let Err(err) = self.poller.unregister(ready.fd) {
                debug!("unregister fd {}: {}", ready.fd, err);
            }
            return Step::Dispatched;
        }
        let events = from_poll_events(ready.revents);
        if !self.registry.fire_handle(ready.fd, events) {
            debug!("fd {} ready with {:?}, no matching watch", ready.fd, events);
        }
        Step::Dispatched
    }
}

impl<P: Poller> EventImpl for EventLoop<P> {
    fn add_handle(&mut self, fd: RawFd, events: HandleEvents, cb: HandleCallback) -> i32 {
        debug!("add handle fd={} events={:?}", fd, events);
        if let Some(previous) = self.registry.set_watch(HandleWatch::new(fd, events, cb)) {
            warn!("replacing handle watch on fd {} with fd {}", previous.fd, fd);
            if let Err(err) = self.poller.unregister(previous.fd) {
                debug!("unregister fd {}: {}", previous.fd, err);
            }
        }
        match self.poller.register(fd, to_poll_events(events)) {
            Ok(()) => fd,
            Err(err) => {
                warn!("cannot watch fd {}: {}", fd, err);
                self.registry.clear_watch(fd);
                -1
            }
        }
    }

    fn update_handle(&mut self, watch: i32, events: HandleEvents) {
        debug!("update handle fd={} events={:?}", watch, events);
        if !self.registry.set_interest(watch, events) {
            warn!("update for unknown handle {}", watch);
            return;
        }
        if let Err(err) = self.poller.unregister(watch) {
            debug!("unregister fd {}: {}", watch, err);
        }
        if let Err(err) = self.poller.register(watch, to_poll_events(events)) {
            warn!("cannot re-register fd {}: {}", watch, err);
        }
    }

    fn remove_handle(&mut self, watch: i32) {
        debug!("remove handle fd={}", watch);
        if self.registry.clear_watch(watch).is_none() {
            warn!("remove for unknown handle {}", watch);
        }
        if let Err(err) = self.poller.unregister(watch) {
            warn!("unregister fd {}: {}", watch, err);
        }
    }

    fn add_timeout(&mut self, timeout: i32, cb: TimerCallback) -> i32 {
        debug!("add timeout {}ms", timeout);
        self.registry.arm_timer(timeout, cb);
        TIMER_ID
    }

    fn update_timeout(&mut self, timer: i32, timeout: i32) {
        debug!("update timeout {} to {}ms", timer, timeout);
        self.registry.set_timeout(timeout);
    }

    fn remove_timeout(&mut self, timer: i32) {
        debug!("remove timeout {}", timer);
        self.registry.disarm_timer();
    }
}
