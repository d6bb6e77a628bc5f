pub mod command;
pub mod types;

pub use command::{CommandEnvelope, CommandKind, UnknownCommandKind};
pub use types::*;
