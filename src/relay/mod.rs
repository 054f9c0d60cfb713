//! Inbound accept loop, per-client sessions and the downstream relay link.

pub mod connection;
pub mod server;
pub mod session;

pub use connection::{
    MemoryConnector, MemoryRelay, RelayConnection, RelayConnector, RelayLog, RelaySink,
    TcpRelayConnector,
};
pub use server::{ClientOutcome, RelayServer};
pub use session::{Session, SessionEnd, SessionPhase, SessionReport};
