pub mod client;
pub mod commands;
pub mod protocol;
pub mod session;
pub mod state;

pub use client::ViceClient;
pub use commands::is_vice_command;
pub use protocol::{LineAssembler, LineEvent, MonitorLine, ViceRegister};
pub use session::Session;
pub use state::{ConnectionState, ViceEvent, ViceShared};
