mod link;
mod loopback;
mod peer_link;
mod relay;
mod state;
mod webrtc_link;

pub use link::*;
pub use loopback::*;
pub use peer_link::*;
pub use relay::*;
pub use state::*;
pub use webrtc_link::*;
