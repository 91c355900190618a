pub mod connection_tests;
pub mod relay_tests;
pub mod room_tests;

use meshmeet_core::{CreateRoomRequest, JoinRoomRequest, SignalRequest};
use meshmeet_server::{ServerConfig, SignalingService};
use tracing::Level;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn create_test_service() -> SignalingService {
    SignalingService::new(&ServerConfig::default())
}

pub fn create_room(name: &str, capacity: usize, password: Option<&str>) -> SignalRequest {
    SignalRequest::CreateRoom(CreateRoomRequest {
        room_name: name.to_string(),
        capacity: Some(capacity),
        password: password.map(str::to_owned),
    })
}

pub fn begin_join(name: &str, password: &str) -> SignalRequest {
    SignalRequest::BeginJoinRoom(JoinRoomRequest {
        room_name: name.to_string(),
        password: password.to_string(),
    })
}
