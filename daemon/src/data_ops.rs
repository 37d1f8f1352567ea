//! The daemon-side data plane operation layer invoked by the RPC handlers.
//!
//! Grounded in `daemon/handler/h_data.cpp`'s `rpc_srv_write_data` /
//! `rpc_srv_read_data`: dispatch each chunk of the request onto a bounded
//! worker pool — the Rust analogue of the original's Argobots I/O pool
//! (`ABT_pool`). Here the pool is a fixed-size `tokio` semaphore since
//! `tokio::fs`/blocking tasks already provide the threadpool.
//!
//! Unlike the original (and an earlier revision of this module), ownership
//! filtering happens client-side, not here: the RPC handler hands us the
//! exact `ChunkSlice` list the client determined its target host owns, in
//! request order, and we trust it rather than re-deriving chunk boundaries
//! from a single start offset. That re-derivation broke whenever a host's
//! owned chunks within a range weren't contiguous.

use std::sync::Arc;

use gekko_common::chunk::{chunk_id, left_pad};
use gekko_common::distributor::Distributor;
use gekko_common::error::GkfsError;
use gekko_common::rpc::ChunkSlice;
use tokio::sync::Semaphore;
use tokio::task::spawn_blocking;

use crate::chunk_storage::ChunkStorage;

/// Caps concurrent blocking chunk I/O tasks, mirroring the original's
/// fixed-size ABT I/O pool sizing.
const IO_POOL_PERMITS: usize = 64;

pub struct DataOps {
    storage: Arc<ChunkStorage>,
    io_permits: Arc<Semaphore>,
}

impl DataOps {
    pub fn new(storage: Arc<ChunkStorage>) -> Self {
        Self { storage, io_permits: Arc::new(Semaphore::new(IO_POOL_PERMITS)) }
    }

    /// Writes `payload` into the chunks named by `chunks`, in order: the
    /// first `chunks[0].length` bytes of `payload` go to `chunks[0]`, the
    /// next `chunks[1].length` to `chunks[1]`, and so on. Returns total
    /// bytes written.
    pub async fn write_chunks(&self, path: &str, chunks: &[ChunkSlice], payload: &[u8]) -> Result<u64, GkfsError> {
        let mut tasks = Vec::new();
        let mut cursor = 0usize;
        for c in chunks {
            let end = cursor + c.length as usize;
            let slice = payload.get(cursor..end).ok_or(GkfsError::InvalidArgument)?.to_vec();
            cursor = end;

            let storage = self.storage.clone();
            let permit = self.io_permits.clone().acquire_owned().await.unwrap();
            let path = path.to_string();
            let (chunk_id, offset_in_chunk) = (c.chunk_id, c.offset_in_chunk);
            tasks.push(spawn_blocking(move || {
                let _permit = permit;
                storage.write_chunk(&path, chunk_id, offset_in_chunk, &slice)
            }));
        }

        let mut written = 0u64;
        for t in tasks {
            written += t.await.map_err(|e| GkfsError::Io(e.to_string()))?? as u64;
        }
        Ok(written)
    }

    /// Reads exactly the chunks named by `chunks`, in order, and
    /// concatenates them into one buffer — the inverse of `write_chunks`.
    pub async fn read_chunks(&self, path: &str, chunks: &[ChunkSlice]) -> Result<Vec<u8>, GkfsError> {
        let mut tasks = Vec::new();
        for c in chunks {
            let storage = self.storage.clone();
            let permit = self.io_permits.clone().acquire_owned().await.unwrap();
            let path = path.to_string();
            let (chunk_id, offset_in_chunk, length) = (c.chunk_id, c.offset_in_chunk, c.length as usize);
            tasks.push(spawn_blocking(move || {
                let _permit = permit;
                let mut buf = vec![0u8; length];
                let n = storage.read_chunk(&path, chunk_id, offset_in_chunk, &mut buf)?;
                buf.truncate(n);
                Ok::<_, GkfsError>(buf)
            }));
        }

        let mut out = Vec::new();
        for t in tasks {
            let bytes = t.await.map_err(|e| GkfsError::Io(e.to_string()))??;
            out.extend_from_slice(&bytes);
        }
        Ok(out)
    }

    /// Clears every chunk this host holds for `path`, regardless of which
    /// chunks those are — used by a remove's broadcast fan-out, where each
    /// host is told to drop whatever it has without re-deriving ownership.
    pub async fn destroy_chunk_space(&self, path: &str) -> Result<(), GkfsError> {
        let storage = self.storage.clone();
        let path = path.to_string();
        spawn_blocking(move || storage.destroy_chunk_space(&path).map_err(GkfsError::from))
            .await
            .map_err(|e| GkfsError::Io(e.to_string()))??;
        Ok(())
    }

    /// Shrinks a file to `new_size`: truncates the boundary chunk (if this
    /// host owns it) and removes every chunk entirely past the new end,
    /// mirroring `forward_truncate`'s per-host fan-out + `ChunkStorage`'s
    /// `trim_chunk_space`/`truncate_chunk_file`.
    pub async fn truncate(
        &self,
        distributor: &dyn Distributor,
        host_id: u64,
        path: &str,
        new_size: u64,
        chunk_size: u64,
    ) -> Result<(), GkfsError> {
        let storage = self.storage.clone();
        let path = path.to_string();
        let boundary_chunk = chunk_id(new_size.saturating_sub(1).max(0), chunk_size);
        let owns_boundary = new_size > 0 && distributor.locate_data(&path, boundary_chunk) == host_id;
        let boundary_len = left_pad(new_size.saturating_sub(1), chunk_size) + 1;

        spawn_blocking(move || {
            if owns_boundary {
                storage.truncate_chunk_file(&path, boundary_chunk, boundary_len)?;
            }
            storage.trim_chunk_space(&path, boundary_chunk + 1)?;
            Ok::<(), GkfsError>(())
        })
        .await
        .map_err(|e| GkfsError::Io(e.to_string()))??;
        Ok(())
    }

    pub fn chunk_stat(&self) -> std::io::Result<crate::chunk_storage::ChunkStat> {
        crate::chunk_storage::chunk_stat(self.storage.root_path(), self.storage.chunk_size())
    }
}
