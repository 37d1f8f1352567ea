//! Integration tests against a live `gekko-daemon` RPC server, in the
//! teacher's `tokio::test` + `reqwest` style (`server/tests/endpoints.rs`).
//! Unlike the teacher's fixture (a single server expected already running
//! on a fixed port), each test here spins up its own daemon bound to an
//! ephemeral port over a fresh temp directory, so tests don't interfere.

use std::future::IntoFuture;
use std::sync::Arc;

use gekko_daemon::chunk_storage::ChunkStorage;
use gekko_daemon::data_ops::DataOps;
use gekko_daemon::metadata_ops::MetadataOps;
use gekko_daemon::metadata_store::MetadataStore;
use gekko_daemon::server::{router, AppState};
use gekko_common::metadata::Metadata;
use reqwest::StatusCode;

struct TestDaemon {
    base_url: String,
    _tmp: tempfile::TempDir,
}

async fn spawn_daemon() -> TestDaemon {
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(MetadataStore::open(tmp.path().join("metadata")).unwrap());
    let chunks = Arc::new(ChunkStorage::new(tmp.path().join("chunks"), 1024).unwrap());
    let mut root = Metadata::new_file(libc::S_IFDIR | 0o755);
    root.init_acm_time(0);
    store.create("/", root).unwrap();

    let state = Arc::new(AppState {
        metadata: MetadataOps::new(store, chunks.clone()),
        data: DataOps::new(chunks),
        host_id: 0,
        host_size: 1,
        mountdir: "/mnt/gkfs".to_string(),
        rootdir: tmp.path().to_string_lossy().to_string(),
        chunk_size: 1024,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(axum::serve(listener, router(state)).into_future());

    TestDaemon { base_url: format!("http://{addr}"), _tmp: tmp }
}

#[tokio::test]
async fn health_check() {
    let d = spawn_daemon().await;
    let resp = reqwest::get(format!("{}/health", d.base_url)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_stat_remove_roundtrip() {
    let d = spawn_daemon().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/metadata/create", d.base_url))
        .json(&serde_json::json!({ "path": "/a.txt", "mode": 0o100644 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = client
        .get(format!("{}/metadata/stat?path=/a.txt", d.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .post(format!("{}/metadata/remove", d.base_url))
        .json(&serde_json::json!({ "path": "/a.txt" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!("{}/metadata/stat?path=/a.txt", d.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn remove_nonempty_directory_fails() {
    let d = spawn_daemon().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/metadata/create", d.base_url))
        .json(&serde_json::json!({ "path": "/dir", "mode": 0o40755 }))
        .send()
        .await
        .unwrap();
    client
        .post(format!("{}/metadata/create", d.base_url))
        .json(&serde_json::json!({ "path": "/dir/child", "mode": 0o100644 }))
        .send()
        .await
        .unwrap();

    let resp = client
        .post(format!("{}/metadata/remove", d.base_url))
        .json(&serde_json::json!({ "path": "/dir" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn write_then_read_data() {
    let d = spawn_daemon().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/metadata/create", d.base_url))
        .json(&serde_json::json!({ "path": "/data.bin", "mode": 0o100644 }))
        .send()
        .await
        .unwrap();

    let payload = b"hello gekko".to_vec();
    let resp = client
        .post(format!(
            "{}/data/write?path=/data.bin&offset=0&append=false&host_id=0&host_size=1&updated_metadentry_size={}",
            d.base_url,
            payload.len()
        ))
        .body(payload.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!(
            "{}/data/read?path=/data.bin&offset=0&size={}&host_id=0&host_size=1",
            d.base_url,
            payload.len()
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.bytes().await.unwrap();
    assert_eq!(body.as_ref(), payload.as_slice());
}

#[tokio::test]
async fn get_dirents_lists_children() {
    let d = spawn_daemon().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/metadata/create", d.base_url))
        .json(&serde_json::json!({ "path": "/x", "mode": 0o100644 }))
        .send()
        .await
        .unwrap();
    client
        .post(format!("{}/metadata/create", d.base_url))
        .json(&serde_json::json!({ "path": "/y", "mode": 0o40755 }))
        .send()
        .await
        .unwrap();

    let resp = client.get(format!("{}/metadata/dirents?path=/", d.base_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: gekko_common::rpc::GetDirentsResponse = resp.json().await.unwrap();
    let names: Vec<&str> = body.entries.iter().map(|e| e.name.as_str()).collect();
    assert!(names.contains(&"x"));
    assert!(names.contains(&"y"));
}
