//! Newline-delimited JSON lifecycle events.
//!
//! ```text
//! {"domain":{"name":"demo","id":1},"event":"started","detail":0}
//! ```
//!
//! `event` is either a name or its numeric code.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Domain, DomainEvent, DomainEventKind};

/// Lines longer than this without a newline are discarded.
pub const MAX_LINE: usize = 64 * 1024;

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
enum WireKind {
    Code(i32),
    Name(String),
}

#[derive(Debug, Deserialize, Serialize)]
struct WireEvent {
    domain: Domain,
    event: WireKind,
    #[serde(default)]
    detail: i32,
}

pub fn decode_line(line: &str) -> Result<DomainEvent> {
    let wire: WireEvent = serde_json::from_str(line)?;
    let kind = match wire.event {
        WireKind::Code(code) => DomainEventKind::from_code(code)
            .ok_or_else(|| unknown_kind(format!("unknown event code {}", code)))?,
        WireKind::Name(name) => name.parse().map_err(unknown_kind)?,
    };
    Ok(DomainEvent { domain: wire.domain, kind, detail: wire.detail })
}

fn unknown_kind(msg: String) -> Error {
    Error::Decode(serde::de::Error::custom(msg))
}

pub fn encode_line(event: &DomainEvent) -> Result<String> {
    let wire = WireEvent {
        domain: event.domain.clone(),
        event: WireKind::Name(event.kind.as_str().to_ascii_lowercase()),
        detail: event.detail,
    };
    let mut line = serde_json::to_string(&wire)?;
    line.push('\n');
    Ok(line)
}

/// Reassembles lines from arbitrary read chunks.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self { Self::default() }

    pub fn pending(&self) -> usize { self.buf.len() }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
        if self.buf.len() > MAX_LINE && !self.buf.contains(&b'\n') {
            warn!("dropping {} bytes without a line break", self.buf.len());
            self.buf.clear();
        }
    }

    /// Decode every complete line, skipping blank and malformed ones.
    pub fn drain(&mut self) -> Vec<DomainEvent> {
        let mut events = Vec::new();
        while let Some(end) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=end).collect();
            let text = String::from_utf8_lossy(&line);
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            match decode_line(text) {
                Ok(event) => events.push(event),
                Err(err) => warn!("skipping event line: {}", err),
            }
        }
        events
    }
}
