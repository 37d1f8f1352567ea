use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use gekko_daemon::chunk_storage::ChunkStorage;
use gekko_daemon::cli::Args;
use gekko_daemon::data_ops::DataOps;
use gekko_daemon::hosts_file::HostsFile;
use gekko_daemon::metadata_ops::MetadataOps;
use gekko_daemon::metadata_store::MetadataStore;
use gekko_daemon::server::{router, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "gekko_daemon=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if args.daemonize {
        daemonize::Daemonize::new().start().expect("failed to daemonize");
    }

    std::fs::create_dir_all(&args.rootdir)?;
    let metadata_path = args.rootdir.join("metadata");
    let chunks_path = args.rootdir.join("chunks");

    let store = Arc::new(MetadataStore::open(&metadata_path)?);
    let chunks = Arc::new(ChunkStorage::new(&chunks_path, args.chunk_size)?);

    // Root directory metadata entry always exists.
    if store.get("/").is_err() {
        let mut md = gekko_common::metadata::Metadata::new_file(libc::S_IFDIR | 0o755);
        md.init_acm_time(0);
        store.create("/", md)?;
    }

    let hostname = hostname::get()?.to_string_lossy().to_string();
    let hosts_file = HostsFile::new(&args.hosts_file, hostname);
    hosts_file.register(&args.listen)?;

    let state = Arc::new(AppState {
        metadata: MetadataOps::new(store.clone(), chunks.clone()),
        data: DataOps::new(chunks.clone()),
        host_id: args.host_id,
        host_size: args.host_size,
        mountdir: args.mountdir.to_string_lossy().to_string(),
        rootdir: args.rootdir.to_string_lossy().to_string(),
        chunk_size: args.chunk_size,
    });

    let addr: SocketAddr = args.listen.parse()?;
    tracing::info!(%addr, "gkfs_daemon listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown_hosts_file = hosts_file;
    let serve = axum::serve(listener, router(state));
    tokio::select! {
        res = serve => { res?; }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }
    shutdown_hosts_file.deregister().ok();
    Ok(())
}
