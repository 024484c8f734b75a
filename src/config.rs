use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// URI used when none is given on the command line.
pub const DEFAULT_URI: &str = "qemu:///system";

/// Client-side settings for the watcher and its connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Connection URI (driver[+transport]://[host]/path[?socket=...])
    pub uri: String,
    /// Upper bound for a single poll(2) wait
    pub poll_timeout: Duration,
    /// Interval handed to the event loop for the keepalive timer
    pub keepalive_interval: Duration,
    /// Keepalive ticks without inbound data before the peer is reported idle
    pub keepalive_count: u32,
    /// Directory holding per-driver event sockets
    pub socket_dir: PathBuf,
    /// Delay between scripted events of the built-in test driver
    pub test_event_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            poll_timeout: Duration::from_millis(1000),
            keepalive_interval: Duration::from_millis(5000),
            keepalive_count: 5,
            socket_dir: default_socket_dir(),
            test_event_interval: Duration::from_millis(200),
        }
    }
}

impl ClientConfig {
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }
}

fn default_socket_dir() -> PathBuf {
    match std::env::var_os("XDG_RUNTIME_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir).join("domain-events"),
        _ => PathBuf::from("/run/domain-events"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_demo_loop() {
        let config = ClientConfig::default();
        assert_eq!(config.uri, "qemu:///system");
        assert_eq!(config.poll_timeout, Duration::from_millis(1000));
        assert!(config.socket_dir.ends_with("domain-events"));
    }

    #[test]
    fn serializes_to_json() {
        let config = ClientConfig::default().with_uri("test:///default");
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["uri"], "test:///default");
        assert_eq!(json["keepalive_count"], 5);
    }
}
