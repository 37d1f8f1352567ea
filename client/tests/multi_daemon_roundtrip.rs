//! End-to-end across multiple daemons, each bound to its own ephemeral port,
//! the way spec.md's scenarios S1/S2 describe ("4 daemons indexed 0..3").
//! A small chunk size against a write that spans many chunks all but
//! guarantees at least one host ends up owning a non-contiguous subset of
//! the range — the exact shape that broke the single-start-offset wire
//! format this module now avoids.

use std::future::IntoFuture;
use std::sync::Arc;

use gekko_client::context::{FsConfig, Host, MountContext};
use gekko_client::dispatch::Dispatcher;
use gekko_client::syscall::{HandledResult, Outcome, Syscall};
use gekko_daemon::chunk_storage::ChunkStorage;
use gekko_daemon::data_ops::DataOps;
use gekko_daemon::metadata_ops::MetadataOps;
use gekko_daemon::metadata_store::MetadataStore;
use gekko_daemon::server::{router, AppState};

const CHUNK_SIZE: u64 = 4;
const HOST_COUNT: u64 = 4;

async fn spawn_daemon(host_id: u64) -> (String, tempfile::TempDir) {
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(MetadataStore::open(tmp.path().join("metadata")).unwrap());
    let chunks = Arc::new(ChunkStorage::new(tmp.path().join("chunks"), CHUNK_SIZE).unwrap());
    let mut root = gekko_common::metadata::Metadata::new_file(libc::S_IFDIR | 0o755);
    root.init_acm_time(0);
    store.create("/", root).unwrap();

    let state = Arc::new(AppState {
        metadata: MetadataOps::new(store, chunks.clone()),
        data: DataOps::new(chunks),
        host_id,
        host_size: HOST_COUNT,
        mountdir: "/mnt/gkfs".to_string(),
        rootdir: tmp.path().to_string_lossy().to_string(),
        chunk_size: CHUNK_SIZE,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(axum::serve(listener, router(state)).into_future());
    (format!("http://{addr}"), tmp)
}

async fn spawn_cluster() -> (Vec<String>, Vec<tempfile::TempDir>) {
    let mut urls = Vec::new();
    let mut tmps = Vec::new();
    for id in 0..HOST_COUNT {
        let (url, tmp) = spawn_daemon(id).await;
        urls.push(url);
        tmps.push(tmp);
    }
    (urls, tmps)
}

fn dispatcher_for(urls: &[String]) -> Dispatcher {
    let ctx = Arc::new(MountContext::new("/mnt/gkfs".to_string()));
    let hosts = urls
        .iter()
        .enumerate()
        .map(|(id, url)| Host { id: id as u64, hostname: format!("host{id}"), endpoint: url.clone() })
        .collect();
    ctx.set_hosts(hosts, "host0", HOST_COUNT, None);
    ctx.set_fs_conf(FsConfig {
        atime_state: true,
        mtime_state: true,
        ctime_state: true,
        link_cnt_state: true,
        blocks_state: true,
        uid: 0,
        gid: 0,
        chunk_size: CHUNK_SIZE,
    });
    ctx.enable_interception();
    Dispatcher::new(ctx, reqwest::Client::new(), tokio::runtime::Handle::current())
}

#[tokio::test]
async fn write_spanning_many_chunks_reads_back_byte_for_byte_across_hosts() {
    let (urls, _tmps) = spawn_cluster().await;
    let dispatcher = dispatcher_for(&urls);

    let fd = match dispatcher.dispatch(Syscall::Open {
        dirfd: libc::AT_FDCWD,
        path: "/mnt/gkfs/spread.bin".to_string(),
        flags: libc::O_CREAT | libc::O_RDWR,
        mode: 0o644,
    }) {
        Outcome::Handled(HandledResult::Fd(fd)) => fd,
        other => panic!("unexpected open outcome: {other:?}"),
    };

    // 200 bytes over a 4-byte chunk size spans 50 chunks, scattered across
    // 4 hosts by hash — certain to land at least one host a non-contiguous
    // subset of chunks within the range.
    let payload: Vec<u8> = (0..200u32).map(|i| (i % 256) as u8).collect();
    match dispatcher.dispatch(Syscall::Write { fd, data: payload.clone() }) {
        Outcome::Handled(HandledResult::Count(n)) => assert_eq!(n as usize, payload.len()),
        other => panic!("unexpected write outcome: {other:?}"),
    }

    match dispatcher.dispatch(Syscall::Pread { fd, len: payload.len(), offset: 0 }) {
        Outcome::Handled(HandledResult::Bytes(data)) => assert_eq!(data, payload, "round-trip must preserve every byte regardless of chunk/host layout"),
        other => panic!("unexpected read outcome: {other:?}"),
    }

    match dispatcher.dispatch(Syscall::Fstat { fd }) {
        Outcome::Handled(HandledResult::Bytes(wire)) => {
            let md = gekko_common::metadata::Metadata::deserialize(&String::from_utf8(wire).unwrap()).unwrap();
            assert_eq!(md.size, payload.len() as u64);
        }
        other => panic!("unexpected fstat outcome: {other:?}"),
    }

    match dispatcher.dispatch(Syscall::Pread { fd, len: 40, offset: 123 }) {
        Outcome::Handled(HandledResult::Bytes(data)) => assert_eq!(data, &payload[123..163]),
        other => panic!("unexpected partial read outcome: {other:?}"),
    }

    match dispatcher.dispatch(Syscall::Close { fd }) {
        Outcome::Handled(HandledResult::Unit) => {}
        other => panic!("unexpected close outcome: {other:?}"),
    }
}

#[tokio::test]
async fn remove_clears_chunk_space_on_every_host() {
    let (urls, tmps) = spawn_cluster().await;
    let dispatcher = dispatcher_for(&urls);

    let fd = match dispatcher.dispatch(Syscall::Open {
        dirfd: libc::AT_FDCWD,
        path: "/mnt/gkfs/doomed.bin".to_string(),
        flags: libc::O_CREAT | libc::O_RDWR,
        mode: 0o644,
    }) {
        Outcome::Handled(HandledResult::Fd(fd)) => fd,
        other => panic!("unexpected open outcome: {other:?}"),
    };

    let payload = vec![9u8; 200];
    match dispatcher.dispatch(Syscall::Write { fd, data: payload }) {
        Outcome::Handled(HandledResult::Count(_)) => {}
        other => panic!("unexpected write outcome: {other:?}"),
    }
    match dispatcher.dispatch(Syscall::Close { fd }) {
        Outcome::Handled(HandledResult::Unit) => {}
        other => panic!("unexpected close outcome: {other:?}"),
    }

    match dispatcher.dispatch(Syscall::Unlink { dirfd: libc::AT_FDCWD, path: "/mnt/gkfs/doomed.bin".to_string() }) {
        Outcome::Handled(HandledResult::Unit) => {}
        other => panic!("unexpected unlink outcome: {other:?}"),
    }

    for tmp in &tmps {
        let chunks_root = tmp.path().join("chunks");
        let leftover = std::fs::read_dir(&chunks_root)
            .map(|entries| entries.flatten().count())
            .unwrap_or(0);
        assert_eq!(leftover, 0, "every host's chunk directory must be empty after remove, got leftovers under {chunks_root:?}");
    }
}
