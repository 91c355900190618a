pub use meshmeet_core::{Identity, NegotiationMessage, SessionId};

pub mod model {
    pub use meshmeet_core::model::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use meshmeet_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use meshmeet_client::*;
}
