use log::{debug, info, warn};
use std::io::{self, Write};
use std::os::unix::net::UnixStream;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::stream::encode_line;
use crate::types::{Domain, DomainEvent, DomainEventKind};

/// The lifecycle the scripted driver walks its domain through.
pub fn script() -> Vec<DomainEvent> {
    use DomainEventKind::*;
    [
        (Added, -1),
        (Started, 1),
        (Suspended, 1),
        (Resumed, 1),
        (Saved, -1),
        (Restored, 2),
        (Stopped, -1),
        (Removed, -1),
    ]
    .into_iter()
    .map(|(kind, id)| DomainEvent { domain: Domain::new("test", id), kind, detail: 0 })
    .collect()
}

/// Emits [`script`] over a socket pair from a background thread, one event
/// per `interval`, then lingers briefly and hangs up.
pub struct TestDriver {
    worker: Option<JoinHandle<()>>,
}

impl TestDriver {
    /// Returns the client end of the stream together with the driver.
    pub fn spawn(interval: Duration) -> io::Result<(UnixStream, TestDriver)> {
        let (client, mut server) = UnixStream::pair()?;
        let worker = thread::Builder::new().name("test-driver".into()).spawn(move || {
            for event in script() {
                thread::sleep(interval);
                let line = match encode_line(&event) {
                    Ok(line) => line,
                    Err(err) => {
                        debug!("test driver: {}", err);
                        return;
                    }
                };
                if let Err(err) = server.write_all(line.as_bytes()) {
                    debug!("test driver: client went away: {}", err);
                    return;
                }
            }
            thread::sleep(interval.max(Duration::from_millis(50)) * 2);
            info!("test driver: script finished, closing stream");
        })?;
        Ok((client, TestDriver { worker: Some(worker) }))
    }

    /// Wait for the script thread to finish; false if it panicked.
    pub fn join(mut self) -> bool {
        match self.worker.take().map(JoinHandle::join) {
            Some(Err(_)) => {
                warn!("test driver thread panicked");
                false
            }
            _ => true,
        }
    }
}
