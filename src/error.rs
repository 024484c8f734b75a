use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid connection URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },
    #[error("unsupported connection URI '{0}': only local unix transports are available")]
    UnsupportedUri(String),
    #[error("failed to connect to {}: {source}", path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("event loop rejected the {0} registration")]
    Registration(&'static str),
    #[error("poll failed: {0}")]
    Poll(#[source] io::Error),
    #[error("malformed event: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<vmm_sys_util::errno::Error> for Error {
    fn from(err: vmm_sys_util::errno::Error) -> Self {
        Error::Io(io::Error::from_raw_os_error(err.errno()))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
