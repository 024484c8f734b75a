//! Client side of the hypervisor event stream.
//!
//! The client never polls on its own: it hands its descriptor and keepalive
//! timer to whatever [`EventImpl`](crate::eventloop::EventImpl) it is opened
//! with and decodes events when that loop reports the descriptor readable.

pub mod connection;
pub mod stream;
pub mod test_driver;
pub mod uri;

pub use connection::{Connection, ConnectionInfo, DomainEventCallback};
pub use uri::{ConnectUri, Endpoint};
