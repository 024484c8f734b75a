use log::{debug, info, warn};
use std::cell::RefCell;
use std::io::{self, Read};
use std::net::Shutdown;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::rc::Rc;
use std::time::{Duration, Instant};

use super::stream::LineDecoder;
use super::test_driver::TestDriver;
use super::uri::{ConnectUri, Endpoint};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::eventloop::{EventImpl, HandleEvents};
use crate::types::{Domain, DomainEvent, DomainEventKind};

/// Identity of the connection, handed to every domain event callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub uri: String,
    pub driver: String,
}

pub type DomainEventCallback = Box<dyn FnMut(&ConnectionInfo, &Domain, DomainEventKind, i32)>;

struct Shared {
    info: ConnectionInfo,
    stream: UnixStream,
    decoder: LineDecoder,
    callbacks: Vec<(i32, DomainEventCallback)>,
    next_callback_id: i32,
    last_data: Instant,
    stall_after: Duration,
    stalls: u32,
    eof: bool,
}

impl Shared {
    /// Read whatever is available; true once the peer closed its end.
    fn fill(&mut self) -> io::Result<bool> {
        let mut chunk = [0u8; 4096];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return Ok(true),
                Ok(n) => {
                    self.last_data = Instant::now();
                    self.decoder.push(&chunk[..n]);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    fn on_readable(&mut self) {
        match self.fill() {
            Ok(true) if !self.eof => {
                info!("{}: event stream closed by peer", self.info.uri);
                self.eof = true;
            }
            Ok(_) => {}
            Err(err) => warn!("{}: read failed: {}", self.info.uri, err),
        }
        for event in self.decoder.drain() {
            self.dispatch(&event);
        }
    }

    fn dispatch(&mut self, event: &DomainEvent) {
        debug!(
            "{}: {} {} detail={} -> {} callback(s)",
            self.info.uri,
            event.domain.name,
            event.kind,
            event.detail,
            self.callbacks.len()
        );
        for (_, cb) in self.callbacks.iter_mut() {
            cb(&self.info, &event.domain, event.kind, event.detail);
        }
    }

    /// Runs ahead of the read on the same wake, so `last_data` still holds
    /// the time of the previous chunk.
    fn on_keepalive(&mut self) {
        let silent = self.last_data.elapsed();
        if silent > self.stall_after {
            self.stalls = self.stalls.saturating_add(1);
            warn!("{}: peer was silent for {:?}", self.info.uri, silent);
        }
    }
}

/// An open event stream whose descriptor and keepalive timer are driven by
/// the [`EventImpl`] it was opened with.
///
/// Domain event callbacks run inside the loop's dispatch and must not call
/// back into the connection.
pub struct Connection {
    shared: Rc<RefCell<Shared>>,
    fd: RawFd,
    watch: i32,
    timer: i32,
    driver: Option<TestDriver>,
}

impl Connection {
    pub fn open(uri: &str, config: &ClientConfig, events: &mut dyn EventImpl) -> Result<Self> {
        let parsed = ConnectUri::parse(uri)?;
        let (stream, driver) = match parsed.endpoint(&config.socket_dir)? {
            Endpoint::TestDriver => {
                let (stream, driver) = TestDriver::spawn(config.test_event_interval)?;
                (stream, Some(driver))
            }
            Endpoint::Socket(path) => {
                debug!("connecting to {}", path.display());
                let stream = UnixStream::connect(&path).map_err(|source| Error::Connect { path, source })?;
                (stream, None)
            }
        };
        stream.set_nonblocking(true)?;
        Self::attach(parsed, stream, driver, config, events)
    }

    fn attach(
        uri: ConnectUri,
        stream: UnixStream,
        driver: Option<TestDriver>,
        config: &ClientConfig,
        events: &mut dyn EventImpl,
    ) -> Result<Self> {
        let fd = stream.as_raw_fd();
        let shared = Rc::new(RefCell::new(Shared {
            info: ConnectionInfo { uri: uri.as_str().to_string(), driver: uri.driver.clone() },
            stream,
            decoder: LineDecoder::new(),
            callbacks: Vec::new(),
            next_callback_id: 0,
            last_data: Instant::now(),
            stall_after: config.keepalive_interval.saturating_mul(config.keepalive_count),
            stalls: 0,
            eof: false,
        }));

        let reader = Rc::clone(&shared);
        let watch = events.add_handle(
            fd,
            HandleEvents::READABLE,
            Box::new(move |_watch, _fd, ready| {
                if ready.intersects(HandleEvents::READABLE | HandleEvents::HANGUP) {
                    reader.borrow_mut().on_readable();
                }
                if ready.contains(HandleEvents::ERROR) {
                    warn!("{}: error condition on event stream", reader.borrow().info.uri);
                }
            }),
        );
        if watch < 0 {
            return Err(Error::Registration("handle"));
        }

        let keepalive = Rc::clone(&shared);
        let interval_ms = i32::try_from(config.keepalive_interval.as_millis()).unwrap_or(i32::MAX);
        let timer = events.add_timeout(interval_ms, Box::new(move |_timer| keepalive.borrow_mut().on_keepalive()));
        if timer < 0 {
            events.remove_handle(watch);
            return Err(Error::Registration("timeout"));
        }

        info!("connected to {}", uri);
        Ok(Self { shared, fd, watch, timer, driver })
    }

    pub fn info(&self) -> ConnectionInfo { self.shared.borrow().info.clone() }

    pub fn fd(&self) -> RawFd { self.fd }

    /// Wakes on which the peer had been silent longer than
    /// `keepalive_interval * keepalive_count`.
    pub fn stalls(&self) -> u32 { self.shared.borrow().stalls }

    /// Add a subscriber; every subscriber sees every event, in registration order.
    pub fn domain_event_register(&self, cb: DomainEventCallback) -> i32 {
        let mut shared = self.shared.borrow_mut();
        let id = shared.next_callback_id;
        shared.next_callback_id += 1;
        shared.callbacks.push((id, cb));
        id
    }

    pub fn domain_event_deregister(&self, id: i32) -> bool {
        let mut shared = self.shared.borrow_mut();
        let before = shared.callbacks.len();
        shared.callbacks.retain(|(cb_id, _)| *cb_id != id);
        shared.callbacks.len() != before
    }

    /// Drop the handle and timer registrations and release the stream.
    pub fn close(mut self, events: &mut dyn EventImpl) {
        events.remove_handle(self.watch);
        events.remove_timeout(self.timer);
        // the disarmed timer callback still holds the stream, so shut it down explicitly
        if let Err(err) = self.shared.borrow().stream.shutdown(Shutdown::Both) {
            debug!("{}: shutdown: {}", self.shared.borrow().info.uri, err);
        }
        if let Some(driver) = self.driver.take() {
            driver.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventloop::{EventLoop, Interrupt, LoopExit, Step};
    use std::io::Write;
    use std::os::unix::net::UnixListener;
    use std::thread;

    type Seen = Rc<RefCell<Vec<String>>>;

    fn printer(tag: &'static str, seen: &Seen) -> DomainEventCallback {
        let seen = Rc::clone(seen);
        Box::new(move |conn, dom, kind, detail| {
            seen.borrow_mut().push(format!("{} {} {}({}) {} {}", tag, conn.driver, dom.name, dom.id, kind, detail))
        })
    }

    fn config_in(dir: &std::path::Path) -> ClientConfig {
        ClientConfig { socket_dir: dir.to_path_buf(), ..ClientConfig::default() }
    }

    #[test]
    fn fans_out_socket_events_to_every_callback() {
        let dir = tempfile::tempdir().unwrap();
        let listener = UnixListener::bind(dir.path().join("qemu-system.sock")).unwrap();
        let config = config_in(dir.path());
        let mut el = EventLoop::new().with_interrupt(Interrupt::manual());

        let conn = Connection::open("qemu:///system", &config, &mut el).unwrap();
        assert_eq!(el.registry().handle_fd(), Some(conn.fd()));
        assert!(el.registry().timer_active());

        let seen: Seen = Rc::default();
        conn.domain_event_register(printer("one", &seen));
        conn.domain_event_register(printer("two", &seen));

        let (mut daemon, _) = listener.accept().unwrap();
        daemon
            .write_all(b"{\"domain\":{\"name\":\"web\",\"id\":4},\"event\":\"started\",\"detail\":1}\n")
            .unwrap();
        assert_eq!(el.run_once().unwrap(), Step::Dispatched);
        assert_eq!(*seen.borrow(), vec!["one qemu web(4) Started 1", "two qemu web(4) Started 1"]);

        drop(daemon);
        assert_eq!(el.run_until_exit().unwrap(), LoopExit::PeerReset);

        conn.close(&mut el);
        assert_eq!(el.registry().handle_fd(), None);
        assert!(!el.registry().timer_active());
    }

    #[test]
    fn deregistered_callbacks_stop_receiving() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let uri = format!("ch:///session?socket={}", path.display());
        let mut el = EventLoop::new().with_interrupt(Interrupt::manual());
        let conn = Connection::open(&uri, &config_in(dir.path()), &mut el).unwrap();

        let seen: Seen = Rc::default();
        let first = conn.domain_event_register(printer("one", &seen));
        conn.domain_event_register(printer("two", &seen));
        assert!(conn.domain_event_deregister(first));
        assert!(!conn.domain_event_deregister(first));

        let (mut daemon, _) = listener.accept().unwrap();
        daemon.write_all(b"{\"domain\":{\"name\":\"db\"},\"event\":5}\n").unwrap();
        el.run_once().unwrap();
        assert_eq!(*seen.borrow(), vec!["two ch db(-1) Stopped 0"]);
        conn.close(&mut el);
    }

    #[test]
    fn long_silence_is_counted_as_a_stall() {
        let dir = tempfile::tempdir().unwrap();
        let listener = UnixListener::bind(dir.path().join("qemu-system.sock")).unwrap();
        let config = ClientConfig {
            keepalive_interval: Duration::from_millis(5),
            keepalive_count: 2,
            ..config_in(dir.path())
        };
        let mut el = EventLoop::new().with_interrupt(Interrupt::manual());
        let conn = Connection::open("qemu:///system", &config, &mut el).unwrap();
        let (mut daemon, _) = listener.accept().unwrap();
        let line = b"{\"domain\":{\"name\":\"web\"},\"event\":\"started\"}\n";

        daemon.write_all(line).unwrap();
        el.run_once().unwrap();
        let before = conn.stalls();

        thread::sleep(Duration::from_millis(50));
        daemon.write_all(line).unwrap();
        assert_eq!(el.run_once().unwrap(), Step::Dispatched);
        assert_eq!(conn.stalls(), before + 1);
        conn.close(&mut el);
    }

    #[test]
    fn missing_socket_is_a_connect_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut el = EventLoop::new().with_interrupt(Interrupt::manual());
        match Connection::open("qemu:///system", &config_in(dir.path()), &mut el) {
            Err(Error::Connect { path, .. }) => assert!(path.ends_with("qemu-system.sock")),
            other => panic!("expected connect error, got {:?}", other.map(|c| c.info())),
        }
        assert_eq!(el.registry().handle_fd(), None);
    }

    #[test]
    fn test_driver_runs_the_whole_lifecycle() {
        let config = ClientConfig { test_event_interval: Duration::from_millis(20), ..ClientConfig::default() };
        let mut el = EventLoop::new().with_interrupt(Interrupt::manual());
        let conn = Connection::open("test:///default", &config, &mut el).unwrap();
        let seen: Seen = Rc::default();
        conn.domain_event_register(printer("cb", &seen));

        assert_eq!(el.run_until_exit().unwrap(), LoopExit::PeerReset);
        conn.close(&mut el);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 8);
        assert_eq!(seen[0], "cb test test(-1) Added 0");
        assert_eq!(seen[1], "cb test test(1) Started 0");
        assert_eq!(seen[7], "cb test test(-1) Removed 0");
    }
}
