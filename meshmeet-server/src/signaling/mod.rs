mod local_session;
mod signaling_service;
mod ws_handler;

pub use local_session::*;
pub use signaling_service::*;
pub use ws_handler::*;
