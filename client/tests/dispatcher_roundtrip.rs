//! End-to-end: a real `gekko-daemon` axum server bound to an ephemeral port,
//! a `MountContext` pointed at it, and the `Dispatcher` driving `Open`/
//! `Write`/`Pread`/`Fstat`/`Close`/`Mkdir`/`Rmdir` through it. Mirrors the
//! daemon crate's own `tests/endpoints.rs` ephemeral-port pattern, one layer
//! up the stack.

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

async fn spawn_daemon() -> (String, tempfile::TempDir) {
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(MetadataStore::open(tmp.path().join("metadata")).unwrap());
    let chunks = Arc::new(ChunkStorage::new(tmp.path().join("chunks"), 1024).unwrap());
    let mut root = gekko_common::metadata::Metadata::new_file(libc::S_IFDIR | 0o755);
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
    (format!("http://{addr}"), tmp)
}

fn dispatcher_for(base_url: &str) -> Dispatcher {
    let ctx = Arc::new(MountContext::new("/mnt/gkfs".to_string()));
    ctx.set_hosts(
        vec![Host { id: 0, hostname: "localhost".into(), endpoint: base_url.to_string() }],
        "localhost",
        1,
        None,
    );
    ctx.set_fs_conf(FsConfig {
        atime_state: true,
        mtime_state: true,
        ctime_state: true,
        link_cnt_state: true,
        blocks_state: true,
        uid: 0,
        gid: 0,
        chunk_size: 1024,
    });
    ctx.enable_interception();
    Dispatcher::new(ctx, reqwest::Client::new(), tokio::runtime::Handle::current())
}

#[tokio::test]
async fn create_write_read_stat_close_roundtrip() {
    let (base_url, _tmp) = spawn_daemon().await;
    let dispatcher = dispatcher_for(&base_url);

    let fd = match dispatcher.dispatch(Syscall::Open {
        dirfd: libc::AT_FDCWD,
        path: "/mnt/gkfs/file.txt".to_string(),
        flags: libc::O_CREAT | libc::O_RDWR,
        mode: 0o644,
    }) {
        Outcome::Handled(HandledResult::Fd(fd)) => fd,
        other => panic!("unexpected open outcome: {other:?}"),
    };

    let payload = b"hello dispatcher".to_vec();
    match dispatcher.dispatch(Syscall::Write { fd, data: payload.clone() }) {
        Outcome::Handled(HandledResult::Count(n)) => assert_eq!(n as usize, payload.len()),
        other => panic!("unexpected write outcome: {other:?}"),
    }

    match dispatcher.dispatch(Syscall::Pread { fd, len: payload.len(), offset: 0 }) {
        Outcome::Handled(HandledResult::Bytes(data)) => assert_eq!(data, payload),
        other => panic!("unexpected read outcome: {other:?}"),
    }

    match dispatcher.dispatch(Syscall::Fstat { fd }) {
        Outcome::Handled(HandledResult::Bytes(wire)) => {
            let md = gekko_common::metadata::Metadata::deserialize(&String::from_utf8(wire).unwrap()).unwrap();
            assert_eq!(md.size, payload.len() as u64);
        }
        other => panic!("unexpected fstat outcome: {other:?}"),
    }

    match dispatcher.dispatch(Syscall::Close { fd }) {
        Outcome::Handled(HandledResult::Unit) => {}
        other => panic!("unexpected close outcome: {other:?}"),
    }
}

#[tokio::test]
async fn mkdir_then_rmdir_empty_succeeds() {
    let (base_url, _tmp) = spawn_daemon().await;
    let dispatcher = dispatcher_for(&base_url);

    match dispatcher.dispatch(Syscall::Mkdir { dirfd: libc::AT_FDCWD, path: "/mnt/gkfs/sub".to_string(), mode: 0o755 }) {
        Outcome::Handled(HandledResult::Unit) => {}
        other => panic!("unexpected mkdir outcome: {other:?}"),
    }

    match dispatcher.dispatch(Syscall::Rmdir { dirfd: libc::AT_FDCWD, path: "/mnt/gkfs/sub".to_string() }) {
        Outcome::Handled(HandledResult::Unit) => {}
        other => panic!("unexpected rmdir outcome: {other:?}"),
    }
}

#[tokio::test]
async fn path_outside_mount_forwards() {
    let (base_url, _tmp) = spawn_daemon().await;
    let dispatcher = dispatcher_for(&base_url);

    let outcome = dispatcher.dispatch(Syscall::Stat { dirfd: libc::AT_FDCWD, path: "/etc/hostname".to_string(), follow_symlink: true });
    assert!(matches!(outcome, Outcome::Forward));
}
