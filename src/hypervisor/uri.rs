use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::debug;

use crate::error::{Error, Result};

/// Driver name served by the in-process scripted driver.
pub const TEST_DRIVER: &str = "test";

/// A parsed `driver[+transport]://[host]/path[?socket=...]` URI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectUri {
    raw: String,
    pub driver: String,
    pub transport: Option<String>,
    pub host: Option<String>,
    pub path: String,
    pub socket: Option<PathBuf>,
}

/// Where the event stream for a URI comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    TestDriver,
    Socket(PathBuf),
}

impl ConnectUri {
    pub fn parse(uri: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidUri { uri: uri.to_string(), reason: reason.to_string() };

        let (scheme, rest) = uri.split_once("://").ok_or_else(|| invalid("missing '://'"))?;
        let (driver, transport) = match scheme.split_once('+') {
            Some((driver, transport)) => (driver, Some(transport)),
            None => (scheme, None),
        };
        if driver.is_empty() || !driver.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(invalid("bad driver name"));
        }
        if transport.is_some_and(str::is_empty) {
            return Err(invalid("empty transport"));
        }

        let (location, query) = match rest.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (rest, None),
        };
        let (host, path) = match location.split_once('/') {
            Some((host, path)) => (host, path),
            None => (location, ""),
        };
        let path = path.trim_end_matches('/');
        if path.is_empty() {
            return Err(invalid("missing path"));
        }

        let mut socket = None;
        for pair in query.into_iter().flat_map(|q| q.split('&')).filter(|p| !p.is_empty()) {
            match pair.split_once('=') {
                Some(("socket", value)) if !value.is_empty() => socket = Some(PathBuf::from(value)),
                Some(("socket", _)) => return Err(invalid("empty socket parameter")),
                _ => debug!("ignoring URI parameter '{}'", pair),
            }
        }

        Ok(Self {
            raw: uri.to_string(),
            driver: driver.to_string(),
            transport: transport.map(str::to_string),
            host: (!host.is_empty()).then(|| host.to_string()),
            path: path.to_string(),
            socket,
        })
    }

    pub fn as_str(&self) -> &str { &self.raw }

    /// Resolve the event source, rejecting anything but local unix access.
    pub fn endpoint(&self, socket_dir: &Path) -> Result<Endpoint> {
        let local = matches!(self.host.as_deref(), None | Some("localhost"));
        let unix = matches!(self.transport.as_deref(), None | Some("unix"));
        if !local || !unix {
            return Err(Error::UnsupportedUri(self.raw.clone()));
        }
        if self.driver == TEST_DRIVER {
            return Ok(Endpoint::TestDriver);
        }
        let socket = match &self.socket {
            Some(path) => path.clone(),
            None => socket_dir.join(format!("{}-{}.sock", self.driver, self.path.replace('/', "-"))),
        };
        Ok(Endpoint::Socket(socket))
    }
}

impl FromStr for ConnectUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

impl fmt::Display for ConnectUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.raw) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_default_system_uri() {
        let uri: ConnectUri = "qemu:///system".parse().unwrap();
        assert_eq!(uri.driver, "qemu");
        assert_eq!(uri.transport, None);
        assert_eq!(uri.host, None);
        assert_eq!(uri.path, "system");
        assert_eq!(
            uri.endpoint(Path::new("/run/domain-events")).unwrap(),
            Endpoint::Socket(PathBuf::from("/run/domain-events/qemu-system.sock"))
        );
    }

    #[test]
    fn socket_parameter_overrides_the_directory() {
        let uri = ConnectUri::parse("ch+unix:///session?foo=1&socket=/tmp/ev.sock").unwrap();
        assert_eq!(uri.transport.as_deref(), Some("unix"));
        assert_eq!(uri.endpoint(Path::new("/x")).unwrap(), Endpoint::Socket(PathBuf::from("/tmp/ev.sock")));
    }

    #[test]
    fn test_driver_needs_no_socket() {
        let uri = ConnectUri::parse("test:///default").unwrap();
        assert_eq!(uri.endpoint(Path::new("/x")).unwrap(), Endpoint::TestDriver);
    }

    #[test]
    fn remote_and_foreign_transports_are_unsupported() {
        for raw in ["qemu+ssh://host/system", "qemu://remote.example/system", "qemu+tcp:///system"] {
            let uri = ConnectUri::parse(raw).unwrap();
            assert!(matches!(uri.endpoint(Path::new("/x")), Err(Error::UnsupportedUri(_))), "{}", raw);
        }
    }

    #[test]
    fn malformed_uris_are_rejected() {
        for raw in ["qemu", "://system", "qemu:///", "qemu+:///system", "q emu:///system", "qemu:///system?socket="] {
            assert!(matches!(ConnectUri::parse(raw), Err(Error::InvalidUri { .. })), "{}", raw);
        }
    }
}
