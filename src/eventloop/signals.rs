//! Keyboard interrupt plumbing for the poll loop.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use libc::{c_int, c_void, siginfo_t};
use vmm_sys_util::signal::register_signal_handler;

use crate::error::Result;

static KEYBOARD_INTERRUPT: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_num: c_int, _info: *mut siginfo_t, _unused: *mut c_void) {
    KEYBOARD_INTERRUPT.store(true, Ordering::SeqCst);
}

/// Route SIGINT to the keyboard interrupt flag. The handler is installed
/// without `SA_RESTART`, so a blocked poll(2) returns `EINTR`.
pub fn install_keyboard_handler() -> Result<()> {
    register_signal_handler(libc::SIGINT, on_sigint)?;
    Ok(())
}

/// A pending-interrupt flag the loop consumes before and after each wait.
#[derive(Clone, Debug)]
pub struct Interrupt {
    local: Option<Arc<AtomicBool>>,
}

impl Interrupt {
    /// The process-wide flag set by SIGINT.
    pub fn keyboard() -> Self { Self { local: None } }

    /// A private flag, raised only through [`Interrupt::raise`].
    pub fn manual() -> Self { Self { local: Some(Arc::new(AtomicBool::new(false))) } }

    fn flag(&self) -> &AtomicBool {
        match &self.local {
            Some(flag) => flag,
            None => &KEYBOARD_INTERRUPT,
        }
    }

    pub fn raise(&self) { self.flag().store(true, Ordering::SeqCst); }

    /// Consume a pending interrupt.
    pub fn take(&self) -> bool { self.flag().swap(false, Ordering::SeqCst) }
}

impl Default for Interrupt {
    fn default() -> Self { Self::keyboard() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_flags_are_independent_and_consumed_once() {
        let a = Interrupt::manual();
        let b = Interrupt::manual();
        a.raise();
        assert!(!b.take());
        assert!(a.clone().take());
        assert!(!a.take());
    }
}
