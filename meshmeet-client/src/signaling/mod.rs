mod client;
mod connection;
mod handlers;

pub use client::*;
pub use connection::*;
pub use handlers::*;
