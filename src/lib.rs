pub mod config;
pub mod error;
pub mod eventloop;
pub mod hypervisor;
pub mod types;


pub use config::ClientConfig;
pub use error::{Error, Result};
pub use eventloop::{EventImpl, EventLoop, LoopExit};
pub use hypervisor::{Connection, ConnectionInfo};
pub use types::{Domain, DomainEvent, DomainEventKind};
