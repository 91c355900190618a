use meshmeet_client::MeshEvent;
use meshmeet_core::Identity;

use crate::integration::init_tracing;
use crate::utils::harness::TestMesh;

#[tokio::test]
async fn test_file_arrives_whole() {
    init_tracing();
    let mesh = TestMesh::new();
    let (alice, mut bob) = mesh.connected_pair("demo123", 2).await.unwrap();

    // Several chunks at the default chunk size.
    let data: Vec<u8> = (0..40_000u32).map(|i| (i % 251) as u8).collect();
    let report = alice.handle.send_file("blob.bin", data.clone()).await.unwrap();
    assert_eq!(report.delivered, vec![Identity::from("bob")]);

    let MeshEvent::FileReceived(file) = bob
        .wait_event("file", |e| matches!(e, MeshEvent::FileReceived(_)))
        .await
        .unwrap()
    else {
        unreachable!()
    };
    assert_eq!(file.from, Identity::from("alice"));
    assert_eq!(file.name, "blob.bin");
    assert_eq!(file.data.as_ref(), data.as_slice());
}
