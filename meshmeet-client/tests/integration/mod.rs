pub mod mesh_tests;
pub mod resilience_tests;

use tracing::Level;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn names(participants: &meshmeet_core::ParticipantList) -> Vec<&str> {
    participants.iter().map(|p| p.identity.as_str()).collect()
}
