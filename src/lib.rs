pub mod cli;
pub mod commands;
pub mod errors;
pub mod resp;
pub mod server;
pub mod store;

pub use commands::{Command, Dispatcher};
pub use errors::{CommandError, ProtocolError};
pub use resp::{RespHandler, RespValue};
pub use store::Store;
