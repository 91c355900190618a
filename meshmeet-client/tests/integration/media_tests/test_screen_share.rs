use meshmeet_client::media::StreamSource;
use meshmeet_client::{MediaError, MeshError};
use meshmeet_core::Identity;

use crate::integration::init_tracing;
use crate::utils::harness::TestMesh;

#[tokio::test]
async fn test_screen_share_replaces_published_video() {
    init_tracing();
    let mesh = TestMesh::new();
    let (alice, mut bob) = mesh.connected_pair("demo123", 2).await.unwrap();
    let from = Identity::from("alice");

    let camera = bob
        .wait_state("alice's camera", |s| s.remote_streams.contains_key(&from))
        .await
        .unwrap()
        .remote_streams[&from]
        .id
        .clone();

    alice.handle.share_screen().await.unwrap();
    assert_eq!(alice.snapshot().active_source, Some(StreamSource::Screen));
    assert_eq!(alice.devices.acquisitions(), 2);

    let screen = bob
        .wait_state("alice's screen", |s| {
            s.remote_streams.get(&from).is_some_and(|t| t.id != camera)
        })
        .await
        .unwrap()
        .remote_streams[&from]
        .id
        .clone();

    alice.handle.stop_screen_share().await.unwrap();
    assert_eq!(alice.snapshot().active_source, Some(StreamSource::User));
    // The camera stream was still live, so nothing is recaptured.
    assert_eq!(alice.devices.acquisitions(), 2);

    bob.wait_state("alice's camera again", |s| {
        s.remote_streams.get(&from).is_some_and(|t| t.id == camera)
    })
    .await
    .unwrap();
    assert_ne!(camera, screen);
    assert!(mesh.network.is_connected("alice", "bob"));
}

#[tokio::test]
async fn test_denied_screen_keeps_camera() {
    init_tracing();
    let mesh = TestMesh::new();
    let (alice, _bob) = mesh.connected_pair("demo123", 2).await.unwrap();
    alice.devices.deny_screen_permission(true);

    let err = alice.handle.share_screen().await.unwrap_err();
    assert!(matches!(
        err,
        MeshError::Media(MediaError::PermissionDenied(StreamSource::Screen))
    ));
    assert_eq!(alice.snapshot().active_source, Some(StreamSource::User));
}
