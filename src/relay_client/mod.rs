pub mod client_command;
pub mod notice;
pub mod relay_client;
pub mod relay_client_error;

pub use client_command::ClientCommand;
pub use notice::render_notice;
pub use relay_client::{ClientEvent, RelayClient};
pub use relay_client_error::RelayClientError;
