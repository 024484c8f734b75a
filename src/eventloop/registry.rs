use std::fmt;
use std::os::unix::io::RawFd;

use super::translate::HandleEvents;
use super::{HandleCallback, TimerCallback};

/// Id handed out for the one timer slot.
pub const TIMER_ID: i32 = 1;

pub struct HandleWatch {
    pub fd: RawFd,
    pub interest: HandleEvents,
    callback: HandleCallback,
}

impl HandleWatch {
    pub fn new(fd: RawFd, interest: HandleEvents, callback: HandleCallback) -> Self {
        Self { fd, interest, callback }
    }
}

impl fmt::Debug for HandleWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleWatch")
            .field("fd", &self.fd)
            .field("interest", &self.interest)
            .finish_non_exhaustive()
    }
}

/// The timer slot. Removal only clears `active`.
pub struct Timer {
    active: bool,
    timeout: i32,
    callback: Option<TimerCallback>,
}

impl Default for Timer {
    fn default() -> Self { Self { active: false, timeout: -1, callback: None } }
}

/// Single handle slot plus single timer slot.
#[derive(Default)]
pub struct Registry {
    watch: Option<HandleWatch>,
    timer: Timer,
}

impl Registry {
    pub fn new() -> Self { Self::default() }

    pub fn handle_fd(&self) -> Option<RawFd> { self.watch.as_ref().map(|w| w.fd) }

    pub fn handle_interest(&self) -> Option<HandleEvents> {
        self.watch.as_ref().map(|w| w.interest)
    }

    pub fn timer_active(&self) -> bool { self.timer.active }

    pub fn timer_timeout(&self) -> i32 { self.timer.timeout }

    pub fn has_timer_callback(&self) -> bool { self.timer.callback.is_some() }

    /// Store `watch`, returning whatever occupied the slot before.
    pub fn set_watch(&mut self, watch: HandleWatch) -> Option<HandleWatch> {
        self.watch.replace(watch)
    }

    /// Change the interest of the watch on `fd`. False if `fd` is not watched.
    pub fn set_interest(&mut self, fd: RawFd, interest: HandleEvents) -> bool {
        match self.watch.as_mut() {
            Some(w) if w.fd == fd => {
                w.interest = interest;
                true
            }
            _ => false,
        }
    }

    pub fn clear_watch(&mut self, fd: RawFd) -> Option<HandleWatch> {
        if self.handle_fd() == Some(fd) {
            self.watch.take()
        } else {
            None
        }
    }

    pub fn arm_timer(&mut self, timeout: i32, callback: TimerCallback) {
        self.timer = Timer { active: true, timeout, callback: Some(callback) };
    }

    pub fn set_timeout(&mut self, timeout: i32) { self.timer.timeout = timeout; }

    pub fn disarm_timer(&mut self) { self.timer.active = false; }

    /// Run the timer callback if the timer is active.
    pub fn fire_timer(&mut self) -> bool {
        if !self.timer.active {
            return false;
        }
        match self.timer.callback.as_mut() {
            Some(cb) => {
                cb(TIMER_ID);
                true
            }
            None => false,
        }
    }

    /// Run the handle callback with `events & interest` if `fd` is watched
    /// and the intersection is non-empty.
    pub fn fire_handle(&mut self, fd: RawFd, events: HandleEvents) -> bool {
        let Some(watch) = self.watch.as_mut() else { return false };
        if watch.fd != fd {
            return false;
        }
        let delivered = events & watch.interest;
        if delivered.is_empty() {
            return false;
        }
        // the watch id is the descriptor itself
        (watch.callback)(fd, fd, delivered);
        true
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("watch", &self.watch)
            .field("timer_active", &self.timer.active)
            .field("timer_timeout", &self.timer.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder() -> (Rc<RefCell<Vec<HandleEvents>>>, HandleCallback) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let cb: HandleCallback = Box::new(move |_, _, events| sink.borrow_mut().push(events));
        (seen, cb)
    }

    #[test]
    fn update_timeout_touches_only_the_timeout() {
        let mut registry = Registry::new();
        registry.arm_timer(5000, Box::new(|_| {}));
        registry.set_timeout(250);
        assert_eq!(registry.timer_timeout(), 250);
        assert!(registry.timer_active());
        assert!(registry.has_timer_callback());
    }

    #[test]
    fn disarmed_timer_keeps_callback_but_never_fires() {
        let fired = Rc::new(RefCell::new(0));
        let count = Rc::clone(&fired);
        let mut registry = Registry::new();
        registry.arm_timer(10, Box::new(move |_| *count.borrow_mut() += 1));
        assert!(registry.fire_timer());
        registry.disarm_timer();
        assert!(!registry.fire_timer());
        assert!(registry.has_timer_callback());
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn handle_receives_only_the_intersection() {
        let (seen, cb) = recorder();
        let mut registry = Registry::new();
        registry.set_watch(HandleWatch::new(7, HandleEvents::READABLE, cb));

        assert!(registry.fire_handle(7, HandleEvents::READABLE | HandleEvents::WRITABLE));
        assert!(!registry.fire_handle(7, HandleEvents::WRITABLE));
        assert!(!registry.fire_handle(8, HandleEvents::READABLE));
        assert_eq!(*seen.borrow(), vec![HandleEvents::READABLE]);
    }

    #[test]
    fn clearing_another_fd_leaves_the_watch() {
        let (_, cb) = recorder();
        let mut registry = Registry::new();
        registry.set_watch(HandleWatch::new(7, HandleEvents::READABLE, cb));
        assert!(registry.clear_watch(9).is_none());
        assert_eq!(registry.handle_fd(), Some(7));
        assert!(registry.clear_watch(7).is_some());
        assert_eq!(registry.handle_fd(), None);
    }
}
