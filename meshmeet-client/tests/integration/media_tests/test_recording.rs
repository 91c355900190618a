use meshmeet_client::media::TrackKind;
use meshmeet_client::{MeshError, MeshEvent};
use meshmeet_core::Identity;

use crate::integration::init_tracing;
use crate::utils::harness::TestMesh;

#[tokio::test]
async fn test_record_remote_and_local_streams() {
    init_tracing();
    let mesh = TestMesh::new();
    let (mut alice, bob) = mesh.connected_pair("demo123", 2).await.unwrap();
    let (me, them) = (Identity::from("alice"), Identity::from("bob"));

    alice.handle.start_recording(&them).await.unwrap();
    alice.handle.start_recording(&me).await.unwrap();
    // A second start keeps the running recorder.
    alice.handle.start_recording(&them).await.unwrap();
    assert_eq!(alice.snapshot().recording.len(), 2);

    assert_eq!(bob.devices.capture_frame(TrackKind::Video, b"bob-v1"), 1);
    assert_eq!(bob.devices.capture_frame(TrackKind::Audio, b"bob-a1"), 1);
    assert_eq!(bob.devices.capture_frame(TrackKind::Video, b"bob-v2"), 1);
    assert_eq!(alice.devices.capture_frame(TrackKind::Video, b"alice-v1"), 1);

    let remote = alice.handle.stop_recording(&them).await.unwrap();
    assert_eq!(remote.identity, them);
    assert_eq!(remote.file_name(), "bob_record");
    assert_eq!(remote.options.mime_type, "video/webm;codecs=vp9");
    let video: Vec<&[u8]> = remote
        .chunks_of(TrackKind::Video)
        .map(|c| &c.data[..])
        .collect();
    assert_eq!(video, vec![&b"bob-v1"[..], &b"bob-v2"[..]]);
    assert_eq!(remote.chunks_of(TrackKind::Audio).count(), 1);

    let event = alice
        .wait_event("bob's recording", |e| matches!(e, MeshEvent::RecordingFinished(_)))
        .await
        .unwrap();
    assert_eq!(event, MeshEvent::RecordingFinished(remote));

    // Muted tracks leave a gap in the local recording.
    alice.handle.toggle_track(TrackKind::Video).await.unwrap();
    assert_eq!(alice.devices.capture_frame(TrackKind::Video, b"alice-v2"), 0);

    let local = alice.handle.stop_recording(&me).await.unwrap();
    assert_eq!(local.chunks.len(), 1);
    assert_eq!(&local.chunks[0].data[..], b"alice-v1");
    assert!(alice.snapshot().recording.is_empty());

    let err = alice.handle.stop_recording(&me).await.unwrap_err();
    assert!(matches!(err, MeshError::NotRecording(id) if id == me));
}

#[tokio::test]
async fn test_recording_requires_a_known_stream() {
    init_tracing();
    let mesh = TestMesh::new();
    let (alice, _bob) = mesh.connected_pair("demo123", 2).await.unwrap();

    let err = alice
        .handle
        .start_recording(&Identity::from("mallory"))
        .await
        .unwrap_err();
    assert!(matches!(err, MeshError::UnknownPeer(_)));

    let idle = mesh.participant("carol").await.unwrap();
    let err = idle
        .handle
        .start_recording(&Identity::from("alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, MeshError::NotInRoom));
}

#[tokio::test]
async fn test_departing_peer_finishes_its_recording() {
    init_tracing();
    let mesh = TestMesh::new();
    let (mut alice, bob) = mesh.connected_pair("demo123", 2).await.unwrap();
    let them = Identity::from("bob");

    alice.handle.start_recording(&them).await.unwrap();
    bob.devices.capture_frame(TrackKind::Video, b"last words");
    bob.handle.leave_room().await.unwrap();

    let event = alice
        .wait_event("bob's recording", |e| matches!(e, MeshEvent::RecordingFinished(_)))
        .await
        .unwrap();
    let MeshEvent::RecordingFinished(recording) = event else {
        unreachable!();
    };
    assert_eq!(recording.identity, them);
    assert_eq!(&recording.chunks[0].data[..], b"last words");
    alice
        .wait_state("recorder cleared", |s| s.recording.is_empty())
        .await
        .unwrap();
}
