//! Daemon CLI surface, per spec.md §6's "daemon CLI" external interface.
//! Clap-derived the way the teacher's client already depends on `clap`
//! for its own argument parsing.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "gkfs_daemon", about = "GekkoFS storage daemon")]
pub struct Args {
    /// Where this daemon stores file chunks.
    #[arg(long)]
    pub rootdir: PathBuf,

    /// Mountpoint the client-side namespace is rooted at. Shared by every
    /// daemon + client in the deployment; used only for the `fs_config` RPC.
    #[arg(long)]
    pub mountdir: PathBuf,

    /// Shared hosts file used for host discovery.
    #[arg(long, default_value = "/tmp/gkfs_hosts.txt")]
    pub hosts_file: PathBuf,

    /// Address this daemon listens on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub listen: String,

    #[arg(long, default_value_t = 1 << 20)]
    pub chunk_size: u64,

    /// Total number of daemons in this deployment (for distributor sizing).
    #[arg(long, default_value_t = 1)]
    pub host_size: u64,

    /// This daemon's index into the host list (0-based).
    #[arg(long, default_value_t = 0)]
    pub host_id: u64,

    #[arg(long)]
    pub daemonize: bool,
}
