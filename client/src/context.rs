//! `MountContext`: the client's per-process singleton, grounded in
//! `include/client/preload_context.hpp`. Held behind an `Arc` and built
//! once at client startup rather than as a raw global — see DESIGN.md's
//! Open Questions for why (testability: constructing two independent
//! contexts in one process, e.g. in tests, would be impossible with a
//! true `static`).

use std::sync::{Arc, Mutex, RwLock};

use gekko_common::distributor::{Distributor, ForwardingDistributor, SimpleHashDistributor};

use crate::config::Config;
use crate::fd_table::FdTable;
use crate::internal_fd::InternalFdSet;

/// Mirrors `PreloadContext::FsConfig`: the handful of daemon-reported
/// settings the client needs cached locally instead of round-tripping an
/// RPC per operation.
#[derive(Debug, Clone)]
pub struct FsConfig {
    pub atime_state: bool,
    pub mtime_state: bool,
    pub ctime_state: bool,
    pub link_cnt_state: bool,
    pub blocks_state: bool,
    pub uid: u32,
    pub gid: u32,
    pub chunk_size: u64,
}

pub struct Host {
    pub id: u64,
    pub hostname: String,
    pub endpoint: String,
}

pub struct MountContext {
    mountdir: String,
    mountdir_components: Vec<String>,
    cwd: RwLock<String>,
    hosts: RwLock<Vec<Host>>,
    local_host_id: RwLock<Option<u64>>,
    fwd_host_id: Option<u64>,
    fs_conf: RwLock<Option<FsConfig>>,
    file_map: Arc<FdTable>,
    distributor: RwLock<Arc<dyn Distributor>>,
    interception_enabled: Mutex<bool>,
    internal_fds: InternalFdSet,
}

/// The path-classification result of `relativize_path`/`relativize_fd_path`,
/// mirroring `PreloadContext::RelativizeStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativizeStatus {
    Internal,
    External,
    FdUnknown,
    FdNotADir,
}

impl MountContext {
    pub fn new(mountdir: String) -> Self {
        let components = gekko_common::path::split_path(&mountdir);
        let placeholder: Arc<dyn Distributor> = Arc::new(SimpleHashDistributor::new(0, 1));
        Self {
            mountdir,
            mountdir_components: components,
            cwd: RwLock::new("/".to_string()),
            hosts: RwLock::new(Vec::new()),
            local_host_id: RwLock::new(None),
            fwd_host_id: None,
            fs_conf: RwLock::new(None),
            file_map: Arc::new(FdTable::new()),
            distributor: RwLock::new(placeholder),
            interception_enabled: Mutex::new(false),
            internal_fds: InternalFdSet::new(),
        }
    }

    pub fn mountdir(&self) -> &str {
        &self.mountdir
    }

    pub fn mountdir_components(&self) -> &[String] {
        &self.mountdir_components
    }

    pub fn cwd(&self) -> String {
        self.cwd.read().unwrap().clone()
    }

    pub fn set_cwd(&self, path: String) {
        *self.cwd.write().unwrap() = path;
    }

    pub fn set_hosts(&self, hosts: Vec<Host>, local_hostname: &str, host_size: u64, forwarding: Option<u64>) {
        let local_id = hosts.iter().find(|h| h.hostname == local_hostname).map(|h| h.id).unwrap_or(0);
        *self.local_host_id.write().unwrap() = Some(local_id);
        *self.hosts.write().unwrap() = hosts;

        let dist: Arc<dyn Distributor> = match forwarding {
            Some(fwd) => Arc::new(ForwardingDistributor::new(fwd, host_size)),
            None => Arc::new(SimpleHashDistributor::new(local_id, host_size)),
        };
        *self.distributor.write().unwrap() = dist;
    }

    pub fn clear_hosts(&self) {
        self.hosts.write().unwrap().clear();
        *self.local_host_id.write().unwrap() = None;
    }

    pub fn local_host_id(&self) -> Option<u64> {
        *self.local_host_id.read().unwrap()
    }

    pub fn fwd_host_id(&self) -> Option<u64> {
        self.fwd_host_id
    }

    pub fn hosts(&self) -> Vec<String> {
        self.hosts.read().unwrap().iter().map(|h| h.endpoint.clone()).collect()
    }

    pub fn distributor(&self) -> Arc<dyn Distributor> {
        self.distributor.read().unwrap().clone()
    }

    pub fn fs_conf(&self) -> Option<FsConfig> {
        self.fs_conf.read().unwrap().clone()
    }

    pub fn set_fs_conf(&self, conf: FsConfig) {
        *self.fs_conf.write().unwrap() = Some(conf);
    }

    pub fn file_map(&self) -> Arc<FdTable> {
        self.file_map.clone()
    }

    pub fn enable_interception(&self) {
        *self.interception_enabled.lock().unwrap() = true;
    }

    pub fn disable_interception(&self) {
        *self.interception_enabled.lock().unwrap() = false;
    }

    pub fn interception_enabled(&self) -> bool {
        *self.interception_enabled.lock().unwrap()
    }

    pub fn internal_fds(&self) -> &InternalFdSet {
        &self.internal_fds
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.mountdir.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_splits_mountdir_components() {
        let ctx = MountContext::new("/mnt/gkfs".to_string());
        assert_eq!(ctx.mountdir_components(), &["mnt", "gkfs"]);
    }

    #[test]
    fn set_hosts_picks_local_id_by_hostname() {
        let ctx = MountContext::new("/mnt/gkfs".to_string());
        let hosts = vec![
            Host { id: 0, hostname: "nodeA".into(), endpoint: "http://a".into() },
            Host { id: 1, hostname: "nodeB".into(), endpoint: "http://b".into() },
        ];
        ctx.set_hosts(hosts, "nodeB", 2, None);
        assert_eq!(ctx.local_host_id(), Some(1));
    }

    #[test]
    fn interception_toggle() {
        let ctx = MountContext::new("/mnt/gkfs".to_string());
        assert!(!ctx.interception_enabled());
        ctx.enable_interception();
        assert!(ctx.interception_enabled());
    }
}
