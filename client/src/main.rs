//! `gkfs_client_demo`: a small CLI that loads client configuration, builds a
//! `MountContext` against a running daemon cluster, and drives the
//! dispatcher through a handful of representative operations. Stands in for
//! the original's `LD_PRELOAD`-based interception entry point, which has no
//! CLI surface of its own — this binary exercises the same client-side
//! logic (`dispatch`/`hooks`/`rpc_facade`) without requiring the `preload`
//! cdylib to be injected into a real process.

use std::sync::Arc;

use clap::Parser;
use gekko_client::context::{FsConfig, Host, MountContext};
use gekko_client::dispatch::Dispatcher;
use gekko_client::syscall::{HandledResult, Outcome, Syscall};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "gkfs_client_demo", about = "Exercises the GekkoFS client dispatcher against a running daemon cluster")]
struct Args {
    /// GekkoFS mountpoint this client operates under.
    #[arg(long, default_value = "/tmp/gkfs_mnt")]
    mountdir: String,

    /// Hosts file populated by running daemons (`gkfs_daemon --hosts-file`).
    #[arg(long, default_value = "/tmp/gkfs_hosts.txt")]
    hosts_file: String,

    /// Path (relative to the mount) to create and write through during the
    /// demo run.
    #[arg(long, default_value = "/demo.txt")]
    path: String,
}

/// Reads the `<hostname> <addr>` lines a `gkfs_daemon` registers on
/// startup. Same format as `daemon::hosts_file::HostsFile`, duplicated here
/// in miniature rather than pulling the whole daemon crate (rocksdb and
/// all) into the client binary just for this.
fn read_hosts_file(path: &std::path::Path) -> anyhow::Result<Vec<(String, String)>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .filter_map(|line| {
            let mut it = line.split_whitespace();
            Some((it.next()?.to_string(), it.next()?.to_string()))
        })
        .collect())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let entries = read_hosts_file(std::path::Path::new(&args.hosts_file))?;
    if entries.is_empty() {
        anyhow::bail!("no hosts found in {}; is a gkfs_daemon running?", args.hosts_file);
    }

    let ctx = Arc::new(MountContext::new(args.mountdir));
    let hosts: Vec<Host> = entries
        .into_iter()
        .enumerate()
        .map(|(id, (hostname, endpoint))| Host { id: id as u64, hostname, endpoint: format!("http://{endpoint}") })
        .collect();
    let host_size = hosts.len() as u64;
    let local_hostname = hostname::get()?.to_string_lossy().to_string();
    ctx.set_hosts(hosts, &local_hostname, host_size, None);
    ctx.set_fs_conf(FsConfig {
        atime_state: true,
        mtime_state: true,
        ctime_state: true,
        link_cnt_state: true,
        blocks_state: true,
        uid: 0,
        gid: 0,
        chunk_size: 1 << 22,
    });
    ctx.enable_interception();

    let rt = tokio::runtime::Runtime::new()?;
    let client = reqwest::Client::new();
    let dispatcher = Dispatcher::new(ctx.clone(), client, rt.handle().clone());

    tracing::info!(path = %args.path, "creating file");
    match dispatcher.dispatch(Syscall::Open { dirfd: libc::AT_FDCWD, path: args.path.clone(), flags: libc::O_CREAT | libc::O_RDWR, mode: 0o644 }) {
        Outcome::Handled(HandledResult::Fd(fd)) => {
            tracing::info!(fd, "opened");

            let payload = b"hello from the gkfs client demo\n".to_vec();
            match dispatcher.dispatch(Syscall::Write { fd, data: payload.clone() }) {
                Outcome::Handled(HandledResult::Count(n)) => tracing::info!(n, "wrote bytes"),
                other => tracing::error!(?other, "write failed"),
            }

            match dispatcher.dispatch(Syscall::Pread { fd, len: payload.len(), offset: 0 }) {
                Outcome::Handled(HandledResult::Bytes(buf)) => {
                    tracing::info!(read = %String::from_utf8_lossy(&buf), "read back");
                }
                other => tracing::error!(?other, "read failed"),
            }

            match dispatcher.dispatch(Syscall::Fstat { fd }) {
                Outcome::Handled(HandledResult::Bytes(wire)) => {
                    let md = gekko_common::metadata::Metadata::deserialize(&String::from_utf8_lossy(&wire))?;
                    tracing::info!(size = md.size, mode = format!("{:o}", md.mode), "stat");
                }
                other => tracing::error!(?other, "fstat failed"),
            }

            dispatcher.dispatch(Syscall::Close { fd });
        }
        other => tracing::error!(?other, "open failed"),
    }

    Ok(())
}
