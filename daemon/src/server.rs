//! Axum RPC server exposing the surface named in spec.md §6.
//!
//! Grounded in the teacher's `server/src/main.rs`/`handlers.rs`: a flat
//! `Router` with one route per operation, a `TraceLayer` wrapping the whole
//! thing, `tracing_subscriber` set up the same way. Bulk payloads
//! (`write`/`read`) travel as raw bodies instead of inlined JSON fields,
//! the nearest HTTP-native analogue of the original's separate RDMA bulk
//! handle.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use gekko_common::distributor::{Distributor, SimpleHashDistributor};
use gekko_common::error::GkfsError;
use gekko_common::rpc::*;
use tower_http::trace::TraceLayer;

use crate::data_ops::DataOps;
use crate::metadata_ops::MetadataOps;

pub struct AppState {
    pub metadata: MetadataOps,
    pub data: DataOps,
    pub host_id: u64,
    pub host_size: u64,
    pub mountdir: String,
    pub rootdir: String,
    pub chunk_size: u64,
}

impl IntoResponse for GkfsError {
    fn into_response(self) -> Response {
        let errno = self.as_errno();
        let status = match errno {
            libc::ENOENT => StatusCode::NOT_FOUND,
            libc::EEXIST => StatusCode::CONFLICT,
            libc::ENOTEMPTY | libc::EINVAL | libc::ENOTDIR | libc::EISDIR => StatusCode::BAD_REQUEST,
            libc::ENOTSUP => StatusCode::NOT_IMPLEMENTED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(RpcError { errno, message: self.to_string() })).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/fs_config", get(fs_config))
        .route("/chunk_stat", get(chunk_stat))
        .route("/metadata/create", post(create))
        .route("/metadata/stat", get(stat))
        .route("/metadata/remove", post(remove))
        .route("/metadata/update", post(update_metadentry))
        .route("/metadata/update_size", post(update_metadentry_size))
        .route("/metadata/size", get(get_metadentry_size))
        .route("/metadata/dirents", get(get_dirents))
        .route("/metadata/symlink", post(mk_symlink))
        .route("/data/write", post(write_data))
        .route("/data/read", get(read_data))
        .route("/data/truncate", post(truncate))
        .route("/data/remove", post(destroy_chunk_space))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn distributor(state: &AppState) -> SimpleHashDistributor {
    SimpleHashDistributor::new(state.host_id, state.host_size)
}

async fn create(State(state): State<Arc<AppState>>, Json(req): Json<CreateRequest>) -> Result<StatusCode, GkfsError> {
    state.metadata.create(&req.path, req.mode)?;
    Ok(StatusCode::CREATED)
}

#[derive(serde::Deserialize)]
struct PathQuery {
    path: String,
}

async fn stat(State(state): State<Arc<AppState>>, Query(q): Query<PathQuery>) -> Result<Json<StatResponse>, GkfsError> {
    let md = state.metadata.stat(&q.path)?;
    Ok(Json(StatResponse { metadata_wire: md.serialize() }))
}

async fn remove(State(state): State<Arc<AppState>>, Json(req): Json<RemoveRequest>) -> Result<StatusCode, GkfsError> {
    if state.metadata.stat(&req.path)?.is_dir() && !state.metadata.is_empty_dir(&req.path)? {
        return Err(GkfsError::NotEmpty);
    }
    state.metadata.remove(&req.path)?;
    Ok(StatusCode::OK)
}

async fn update_metadentry(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateMetadentryRequest>,
) -> Result<StatusCode, GkfsError> {
    state
        .metadata
        .update_metadentry(&req.path, req.mode, req.atime, req.mtime, req.ctime, req.link_count_delta)?;
    Ok(StatusCode::OK)
}

async fn update_metadentry_size(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateMetadentrySizeRequest>,
) -> Result<Json<UpdateMetadentrySizeResponse>, GkfsError> {
    let new_size = state.metadata.update_size_for_write(&req.path, req.offset, req.size, req.append)?;
    Ok(Json(UpdateMetadentrySizeResponse { new_size }))
}

async fn get_metadentry_size(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PathQuery>,
) -> Result<Json<GetMetadentrySizeResponse>, GkfsError> {
    Ok(Json(GetMetadentrySizeResponse { size: state.metadata.get_size(&q.path)? }))
}

async fn get_dirents(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PathQuery>,
) -> Result<Json<GetDirentsResponse>, GkfsError> {
    let entries = state
        .metadata
        .get_dirents(&q.path)?
        .into_iter()
        .map(|(name, is_dir)| DirEntry { name, is_dir })
        .collect();
    Ok(Json(GetDirentsResponse { entries }))
}

#[cfg(feature = "symlinks")]
async fn mk_symlink(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MkSymlinkRequest>,
) -> Result<StatusCode, GkfsError> {
    state.metadata.mk_symlink(&req.path, &req.target_path)?;
    Ok(StatusCode::CREATED)
}

#[cfg(not(feature = "symlinks"))]
async fn mk_symlink(State(_state): State<Arc<AppState>>) -> Result<StatusCode, GkfsError> {
    Err(GkfsError::NotSupported)
}

fn parse_chunks_header(headers: &HeaderMap) -> Result<Vec<ChunkSlice>, GkfsError> {
    let value = headers.get(CHUNKS_HEADER).ok_or(GkfsError::InvalidArgument)?;
    let value = value.to_str().map_err(|_| GkfsError::InvalidArgument)?;
    serde_json::from_str(value).map_err(|_| GkfsError::InvalidArgument)
}

async fn write_data(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WriteQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WriteResponse>, GkfsError> {
    let chunks = parse_chunks_header(&headers)?;
    let written = state.data.write_chunks(&params.path, &chunks, &body).await?;
    Ok(Json(WriteResponse { written }))
}

async fn read_data(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReadQuery>,
    headers: HeaderMap,
) -> Result<Vec<u8>, GkfsError> {
    let chunks = parse_chunks_header(&headers)?;
    let bytes = state.data.read_chunks(&params.path, &chunks).await?;
    Ok(bytes)
}

async fn destroy_chunk_space(State(state): State<Arc<AppState>>, Json(req): Json<RemoveRequest>) -> Result<StatusCode, GkfsError> {
    state.data.destroy_chunk_space(&req.path).await?;
    Ok(StatusCode::OK)
}

async fn truncate(State(state): State<Arc<AppState>>, Json(req): Json<TruncateRequest>) -> Result<StatusCode, GkfsError> {
    let dist = SimpleHashDistributor::new(req.host_id, req.host_size);
    state.metadata.update_size_for_truncate(&req.path, req.new_size)?;
    state.data.truncate(&dist, req.host_id, &req.path, req.new_size, state.chunk_size).await?;
    Ok(StatusCode::OK)
}

async fn chunk_stat(State(state): State<Arc<AppState>>) -> Result<Json<ChunkStatResponse>, GkfsError> {
    let stat = state.data.chunk_stat().map_err(GkfsError::from)?;
    Ok(Json(ChunkStatResponse {
        chunk_size: stat.chunk_size,
        chunk_total: stat.chunk_total,
        chunk_free: stat.chunk_free,
    }))
}

async fn fs_config(State(state): State<Arc<AppState>>) -> Json<FsConfigResponse> {
    let _ = distributor(&state);
    Json(FsConfigResponse {
        mountdir: state.mountdir.clone(),
        rootdir: state.rootdir.clone(),
        chunk_size: state.chunk_size,
        host_size: state.host_size,
        atime_state: gekko_common::metadata::fields::USE_ATIME,
        mtime_state: gekko_common::metadata::fields::USE_MTIME,
        ctime_state: gekko_common::metadata::fields::USE_CTIME,
        link_cnt_state: gekko_common::metadata::fields::USE_LINK_CNT,
        blocks_state: gekko_common::metadata::fields::USE_BLOCKS,
    })
}
