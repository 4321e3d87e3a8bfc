//! Server side of the relay: wire protocol, membership, per-connection
//! sessions and the accept loop.

pub mod fanout;
pub mod protocol;
pub mod registry;
pub mod relay_server;
pub mod run;
pub mod session;
pub mod shutdown;
pub mod transport;
pub mod types;

pub use fanout::{FanoutReport, broadcast, broadcast_to_members};
pub use registry::{Participant, Registry};
pub use relay_server::RelayServer;
pub use session::{Session, SessionState};
pub use shutdown::ShutdownSignal;
pub use types::{ConnHandle, ConnId, Outbound, SendError};
