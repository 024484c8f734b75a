use std::io;
use std::os::unix::io::RawFd;

use super::translate::PollEvents;

/// A descriptor reported ready by a wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ready {
    pub fd: RawFd,
    pub revents: PollEvents,
}

/// Host readiness multiplexer.
pub trait Poller {
    /// Register `fd`, replacing the interest set if it is already present.
    fn register(&mut self, fd: RawFd, events: PollEvents) -> io::Result<()>;
    fn unregister(&mut self, fd: RawFd) -> io::Result<()>;
    /// Block up to `timeout_ms` (-1 blocks forever). Empty on timeout.
    fn wait(&mut self, timeout_ms: i32) -> io::Result<Vec<Ready>>;
}

/// `poll(2)` over a flat descriptor list.
#[derive(Debug, Default)]
pub struct PollSet {
    fds: Vec<libc::pollfd>,
}

impl PollSet {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.fds.len() }

    pub fn is_empty(&self) -> bool { self.fds.is_empty() }

    pub fn interest(&self, fd: RawFd) -> Option<PollEvents> {
        self.fds
            .iter()
            .find(|p| p.fd == fd)
            .map(|p| PollEvents::from_bits_retain(p.events))
    }
}

impl Poller for PollSet {
    fn register(&mut self, fd: RawFd, events: PollEvents) -> io::Result<()> {
        if fd < 0 {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        }
        match self.fds.iter_mut().find(|p| p.fd == fd) {
            Some(entry) => entry.events = events.bits(),
            None => self.fds.push(libc::pollfd { fd, events: events.bits(), revents: 0 }),
        }
        Ok(())
    }

    fn unregister(&mut self, fd: RawFd) -> io::Result<()> {
        let before = self.fds.len();
        self.fds.retain(|p| p.fd != fd);
        if self.fds.len() == before {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("fd {} is not registered", fd),
            ));
        }
        Ok(())
    }

    fn wait(&mut self, timeout_ms: i32) -> io::Result<Vec<Ready>> {
        for entry in self.fds.iter_mut() {
            entry.revents = 0;
        }
        // SAFETY: the pointer and length describe our own initialised pollfd buffer.
        let n = unsafe {
            libc::poll(self.fds.as_mut_ptr(), self.fds.len() as libc::nfds_t, timeout_ms)
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(self
            .fds
            .iter()
            .filter(|p| p.revents != 0)
            .map(|p| Ready { fd: p.fd, revents: PollEvents::from_bits_retain(p.revents) })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::io::AsRawFd;
    use std::os::unix::net::UnixStream;

    #[test]
    fn register_twice_replaces_interest() {
        let (a, _b) = UnixStream::pair().unwrap();
        let mut set = PollSet::new();
        set.register(a.as_raw_fd(), PollEvents::IN).unwrap();
        set.register(a.as_raw_fd(), PollEvents::OUT).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.interest(a.as_raw_fd()), Some(PollEvents::OUT));
    }

    #[test]
    fn unregister_unknown_fd_fails() {
        let mut set = PollSet::new();
        let err = set.unregister(42).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn wait_times_out_empty_and_reports_readable() {
        let (a, mut b) = UnixStream::pair().unwrap();
        let mut set = PollSet::new();
        set.register(a.as_raw_fd(), PollEvents::IN).unwrap();
        assert!(set.wait(10).unwrap().is_empty());

        b.write_all(b"x").unwrap();
        let ready = set.wait(1000).unwrap();
        assert_eq!(ready, vec![Ready { fd: a.as_raw_fd(), revents: PollEvents::IN }]);
    }
}
