//! Chunk-to-host placement. Grounded in `SimpleHashDistributor` as used from
//! `daemon/handler/h_data.cpp` (constructed fresh per-request from
//! `(host_id, host_size)`) and `client/rpc/forward_data.cpp`'s use of
//! `distributor().locate_data(path, chunk_id)`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Maps a `(path, chunk_id)` pair to the host responsible for storing it.
pub trait Distributor: Send + Sync {
    /// The host that owns this chunk for reads/writes.
    fn locate_data(&self, path: &str, chunk_id: u64) -> u64;

    /// The host that owns the metadata entry for this path (directory
    /// listing fan-out, metadata RPCs).
    fn locate_metadata(&self, path: &str) -> u64;

    /// All hosts that could conceivably own a chunk of this file — used by
    /// operations that must visit every host regardless of placement
    /// (truncate, chunk_stat).
    fn all_hosts(&self) -> Vec<u64>;
}

/// Hashes `path` and `chunk_id` together, then reduces modulo the host
/// count. This is GekkoFS's default placement policy: every host can derive
/// the same answer independently, with no directory of chunk locations.
pub struct SimpleHashDistributor {
    local_host_id: u64,
    host_size: u64,
}

impl SimpleHashDistributor {
    pub fn new(local_host_id: u64, host_size: u64) -> Self {
        assert!(host_size > 0);
        Self { local_host_id, host_size }
    }

    pub fn local_host_id(&self) -> u64 {
        self.local_host_id
    }

    fn hash(path: &str, chunk_id: u64) -> u64 {
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        chunk_id.hash(&mut hasher);
        hasher.finish()
    }
}

impl Distributor for SimpleHashDistributor {
    fn locate_data(&self, path: &str, chunk_id: u64) -> u64 {
        Self::hash(path, chunk_id) % self.host_size
    }

    fn locate_metadata(&self, path: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        hasher.finish() % self.host_size
    }

    fn all_hosts(&self) -> Vec<u64> {
        (0..self.host_size).collect()
    }
}

/// Sends every chunk of every file to a single fixed host. Used for the
/// `forwarding` distribution mode, where one node acts as an I/O forwarder
/// for the rest (spec.md's glossary entry for "forwarding mode").
pub struct ForwardingDistributor {
    fwd_host_id: u64,
    host_size: u64,
}

impl ForwardingDistributor {
    pub fn new(fwd_host_id: u64, host_size: u64) -> Self {
        Self { fwd_host_id, host_size }
    }
}

impl Distributor for ForwardingDistributor {
    fn locate_data(&self, _path: &str, _chunk_id: u64) -> u64 {
        self.fwd_host_id
    }

    fn locate_metadata(&self, _path: &str) -> u64 {
        self.fwd_host_id
    }

    fn all_hosts(&self) -> Vec<u64> {
        (0..self.host_size).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_hash_is_deterministic() {
        let d = SimpleHashDistributor::new(0, 4);
        let a = d.locate_data("/foo/bar", 3);
        let b = d.locate_data("/foo/bar", 3);
        assert_eq!(a, b);
        assert!(a < 4);
    }

    #[test]
    fn simple_hash_spreads_chunks() {
        let d = SimpleHashDistributor::new(0, 4);
        let hosts: std::collections::HashSet<u64> =
            (0..64).map(|c| d.locate_data("/foo/bar", c)).collect();
        assert!(hosts.len() > 1, "expected chunks to spread across hosts");
    }

    #[test]
    fn forwarding_always_same_host() {
        let d = ForwardingDistributor::new(2, 4);
        assert_eq!(d.locate_data("/a", 0), 2);
        assert_eq!(d.locate_data("/b", 99), 2);
        assert_eq!(d.locate_metadata("/a"), 2);
    }
}
