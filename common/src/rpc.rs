//! Wire DTOs for every RPC named in spec.md §6. These travel as JSON bodies
//! over the client's `reqwest`/daemon's `axum` HTTP transport, which stands
//! in for the original's Mercury/Hermes RDMA RPC layer (see SPEC_FULL.md §0
//! and DESIGN.md for the rationale). Bulk payloads (`write`/`read`) are
//! carried as raw request/response bodies rather than as a field here, the
//! same way the original exposes a `bulk_handle` alongside scalar RPC
//! arguments instead of inlining the buffer into the RPC struct.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    pub path: String,
    pub mode: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatResponse {
    pub metadata_wire: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveRequest {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMetadentryRequest {
    pub path: String,
    pub mode: Option<u32>,
    pub atime: Option<i64>,
    pub mtime: Option<i64>,
    pub ctime: Option<i64>,
    pub link_count_delta: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMetadentrySizeRequest {
    pub path: String,
    pub size: u64,
    pub offset: u64,
    pub append: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMetadentrySizeResponse {
    pub new_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetMetadentrySizeResponse {
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetDirentsResponse {
    pub entries: Vec<DirEntry>,
}

#[cfg(feature = "symlinks")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MkSymlinkRequest {
    pub path: String,
    pub target_path: String,
}

/// One chunk-local slice of a write/read request's wire payload: which
/// chunk it belongs to, where within that chunk, and how many bytes of the
/// raw body/response it accounts for. Write and read requests carry a list
/// of these (see `CHUNKS_HEADER`) instead of a single start offset, so the
/// daemon never has to re-derive chunk boundaries by walking forward
/// through chunks it may not even own — it just slices the body/response in
/// list order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSlice {
    pub chunk_id: u64,
    pub offset_in_chunk: u64,
    pub length: u64,
}

/// Name of the header carrying a JSON-encoded `Vec<ChunkSlice>` alongside a
/// `/data/write` or `/data/read` request.
pub const CHUNKS_HEADER: &str = "x-gkfs-chunks";

/// Query-string companion to the raw write body; the chunk list travels in
/// the `CHUNKS_HEADER` header instead, since it's the caller's job to say
/// which chunks the raw body covers, not just where it starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteQuery {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResponse {
    pub written: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadQuery {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruncateRequest {
    pub path: String,
    pub current_size: u64,
    pub new_size: u64,
    pub host_id: u64,
    pub host_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkStatResponse {
    pub chunk_size: u64,
    pub chunk_total: u64,
    pub chunk_free: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsConfigResponse {
    pub mountdir: String,
    pub rootdir: String,
    pub chunk_size: u64,
    pub host_size: u64,
    pub atime_state: bool,
    pub mtime_state: bool,
    pub ctime_state: bool,
    pub link_cnt_state: bool,
    pub blocks_state: bool,
}

/// Uniform error envelope returned by the daemon for any failed RPC; the
/// client maps `errno` straight back into the syscall return value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub errno: i32,
    pub message: String,
}
