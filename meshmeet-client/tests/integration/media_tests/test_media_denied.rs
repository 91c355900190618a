use meshmeet_client::media::{StreamSource, SyntheticDevices, TrackKind};
use meshmeet_client::{MediaError, MeshEvent};
use meshmeet_core::{Identity, RoomOptions};

use crate::integration::init_tracing;
use crate::utils::harness::TestMesh;

#[tokio::test]
async fn test_denied_camera_still_receives() {
    init_tracing();
    let mesh = TestMesh::new();
    let mut alice = mesh.participant("alice").await.unwrap();
    let denied = SyntheticDevices::new();
    denied.deny_user_permission(true);
    let mut bob = mesh.participant_with("bob", denied).await.unwrap();

    alice
        .handle
        .create_room_with("demo123", RoomOptions::with_capacity(2))
        .await
        .unwrap();
    bob.handle.join_room("demo123", "").await.unwrap();

    bob.wait_event("capture failure", |e| {
        *e == MeshEvent::MediaUnavailable(MediaError::PermissionDenied(StreamSource::User))
    })
    .await
    .unwrap();

    alice.wait_connected("bob").await.unwrap();
    let state = bob
        .wait_state("alice's video", |s| {
            s.remote_streams.contains_key(&Identity::from("alice"))
        })
        .await
        .unwrap();
    assert_eq!(state.active_source, None);

    assert!(alice.snapshot().remote_streams.is_empty());
    assert_eq!(bob.handle.toggle_track(TrackKind::Video).await.unwrap(), None);

    let report = bob.handle.send_text("I can see you").await.unwrap();
    assert!(report.is_complete());
}

#[tokio::test]
async fn test_toggle_flips_active_tracks() {
    init_tracing();
    let mesh = TestMesh::new();
    let (alice, _bob) = mesh.connected_pair("demo123", 2).await.unwrap();

    assert_eq!(alice.handle.toggle_track(TrackKind::Video).await.unwrap(), Some(false));
    assert_eq!(alice.handle.toggle_track(TrackKind::Video).await.unwrap(), Some(true));
    assert_eq!(alice.handle.toggle_track(TrackKind::Audio).await.unwrap(), Some(false));
    // Muting never stops capture.
    assert_eq!(alice.devices.live_tracks(), 2);
}
