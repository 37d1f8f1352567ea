//! Metadata-plane operations invoked by the RPC handlers: thin wrappers
//! around `MetadataStore` that add the bookkeeping spec.md §4.7 calls out
//! (timestamp stamping, directory-not-empty checks before remove, size
//! getters for the client's read/write size bookkeeping).

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use gekko_common::error::GkfsError;
use gekko_common::metadata::Metadata;

use crate::chunk_storage::ChunkStorage;
use crate::metadata_store::MetadataStore;

fn now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64
}

pub struct MetadataOps {
    store: Arc<MetadataStore>,
    chunks: Arc<ChunkStorage>,
}

impl MetadataOps {
    pub fn new(store: Arc<MetadataStore>, chunks: Arc<ChunkStorage>) -> Self {
        Self { store, chunks }
    }

    pub fn create(&self, path: &str, mode: u32) -> Result<(), GkfsError> {
        let mut md = Metadata::new_file(mode);
        md.init_acm_time(now());
        self.store.create(path, md)
    }

    #[cfg(feature = "symlinks")]
    pub fn mk_symlink(&self, path: &str, target_path: &str) -> Result<(), GkfsError> {
        let mut md = Metadata::new_symlink(libc::S_IFLNK | 0o777, target_path.to_string());
        md.init_acm_time(now());
        self.store.create(path, md)
    }

    pub fn stat(&self, path: &str) -> Result<Metadata, GkfsError> {
        self.store.get(path)
    }

    /// Removes a metadata entry and its chunk space. Directories must be
    /// empty (checked by the caller via `list_dir` before calling this —
    /// same division of labor as the teacher's `rmdir` delegating to
    /// `unlink` after an emptiness check).
    pub fn remove(&self, path: &str) -> Result<(), GkfsError> {
        let md = self.store.get(path)?;
        if !md.is_dir() {
            self.chunks.destroy_chunk_space(path)?;
        }
        self.store.remove(path)
    }

    pub fn is_empty_dir(&self, path: &str) -> Result<bool, GkfsError> {
        Ok(self.store.list_dir(path)?.is_empty())
    }

    pub fn get_dirents(&self, path: &str) -> Result<Vec<(String, bool)>, GkfsError> {
        self.store.list_dir(path)
    }

    pub fn update_metadentry(
        &self,
        path: &str,
        mode: Option<u32>,
        atime: Option<i64>,
        mtime: Option<i64>,
        ctime: Option<i64>,
        link_count_delta: Option<i32>,
    ) -> Result<Metadata, GkfsError> {
        self.store.update(path, |md| {
            if let Some(m) = mode {
                md.mode = m;
            }
            if let Some(a) = atime {
                md.atime = a;
            }
            if let Some(m) = mtime {
                md.mtime = m;
            }
            if let Some(c) = ctime {
                md.ctime = c;
            }
            if let Some(delta) = link_count_delta {
                md.link_count = (md.link_count as i64 + delta as i64).max(0) as u32;
            }
        })
    }

    pub fn get_size(&self, path: &str) -> Result<u64, GkfsError> {
        Ok(self.store.get(path)?.size)
    }

    /// Applies a write's effect on file size, returning the resulting size.
    /// `append` writes grow unconditionally; offset writes only grow the
    /// file if they extend past the current end, matching spec.md §4.7's
    /// `update_metadentry_size` contract (backed by the `increase_size`
    /// merge operand).
    pub fn update_size_for_write(&self, path: &str, offset: u64, write_size: u64, append: bool) -> Result<u64, GkfsError> {
        if append {
            self.store.increase_size(path, write_size, true)?;
        } else {
            self.store.increase_size(path, offset + write_size, false)?;
        }
        self.get_size(path)
    }

    pub fn update_size_for_truncate(&self, path: &str, new_size: u64) -> Result<(), GkfsError> {
        self.store.decrease_size(path, new_size)
    }
}
