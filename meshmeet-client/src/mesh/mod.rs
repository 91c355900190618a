mod command;
mod coordinator;
mod event;
mod state;

pub use command::*;
pub use coordinator::*;
pub use event::*;
pub use state::*;
