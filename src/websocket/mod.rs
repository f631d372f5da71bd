//! Websocket relay core
//!
//! Per-connection sessions, the relay loops that move messages between a
//! peer and the in-process channels, the supervisor that tears a session
//! down as soon as any loop stops, and the listener tying them together.

mod connection;
mod registry;
mod relay;
mod server;
mod session;
mod supervisor;
#[cfg(test)]
mod testing;

pub use connection::{Connection, WsConnection};
pub use registry::SessionRegistry;
pub use relay::{Endpoint, Relay};
pub use server::RelayServer;
pub use session::Session;
pub use supervisor::{RelayEnd, SessionOutcome, Supervisor};
