use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;


/// A domain as reported alongside a lifecycle event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    /// Hypervisor id; -1 while the domain is not running.
    #[serde(default = "inactive_id")]
    pub id: i32,
}

fn inactive_id() -> i32 { -1 }

impl Domain {
    pub fn new(name: impl Into<String>, id: i32) -> Self {
        Self { name: name.into(), id }
    }
}


/// Lifecycle transitions, numbered as on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainEventKind {
    Added,
    Removed,
    Started,
    Suspended,
    Resumed,
    Stopped,
    Saved,
    Restored,
}

impl DomainEventKind {
    pub const ALL: [DomainEventKind; 8] = [
        DomainEventKind::Added,
        DomainEventKind::Removed,
        DomainEventKind::Started,
        DomainEventKind::Suspended,
        DomainEventKind::Resumed,
        DomainEventKind::Stopped,
        DomainEventKind::Saved,
        DomainEventKind::Restored,
    ];

    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn code(self) -> i32 { self as i32 }

    pub fn as_str(self) -> &'static str {
        match self {
            DomainEventKind::Added => "Added",
            DomainEventKind::Removed => "Removed",
            DomainEventKind::Started => "Started",
            DomainEventKind::Suspended => "Suspended",
            DomainEventKind::Resumed => "Resumed",
            DomainEventKind::Stopped => "Stopped",
            DomainEventKind::Saved => "Saved",
            DomainEventKind::Restored => "Restored",
        }
    }
}

impl fmt::Display for DomainEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for DomainEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "defined"/"undefined" are the names newer daemons use for added/removed
        match s.to_ascii_lowercase().as_str() {
            "added" | "defined" => Ok(DomainEventKind::Added),
            "removed" | "undefined" => Ok(DomainEventKind::Removed),
            "started" => Ok(DomainEventKind::Started),
            "suspended" => Ok(DomainEventKind::Suspended),
            "resumed" => Ok(DomainEventKind::Resumed),
            "stopped" => Ok(DomainEventKind::Stopped),
            "saved" => Ok(DomainEventKind::Saved),
            "restored" => Ok(DomainEventKind::Restored),
            other => Err(format!("unknown domain event '{}'", other)),
        }
    }
}


/// One decoded lifecycle notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainEvent {
    pub domain: Domain,
    pub kind: DomainEventKind,
    pub detail: i32,
}
