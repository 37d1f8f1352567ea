//! Client-side RPC facade: turns a single logical write/read/truncate into
//! one HTTP request per daemon host that owns a piece of the range, and
//! reassembles the results.
//!
//! Grounded in `client/rpc/forward_data.cpp`'s `forward_write`/
//! `forward_read`/`forward_truncate`/`forward_get_chunk_stat`: chunks are
//! grouped by target host (preserving first-seen order, exactly like the
//! original's `target_chnks` map), each target gets exactly one RPC
//! carrying only the bytes it owns, and the facade awaits every target
//! before returning — any single failure fails the whole operation, same
//! as the original mapping transport errors to `EBUSY`/`EIO`.

use std::collections::BTreeMap;

use gekko_common::chunk::{chunk_id, chunk_plan, ChunkRun};
use gekko_common::distributor::Distributor;
use gekko_common::error::GkfsError;
use gekko_common::rpc::*;
use reqwest::Client;

use crate::context::MountContext;

fn host_url(ctx: &MountContext, host_id: u64) -> Result<String, GkfsError> {
    ctx.hosts()
        .get(host_id as usize)
        .cloned()
        .ok_or_else(|| GkfsError::Unreachable(format!("no endpoint for host {host_id}")))
}

/// Groups the chunk runs covering `[offset, offset + size)` by the host
/// that owns each one. Returns `(host_id, runs)` in first-seen host order,
/// mirroring `target_chnks`'s insertion-ordered map — `runs` keeps every
/// run this host owns in request order, even when they aren't contiguous,
/// so callers never have to collapse them back into a single start offset.
fn group_by_host(distributor: &dyn Distributor, path: &str, offset: u64, size: u64, chunk_size: u64) -> Vec<(u64, Vec<ChunkRun>)> {
    let mut order: Vec<u64> = Vec::new();
    let mut groups: BTreeMap<u64, Vec<ChunkRun>> = BTreeMap::new();

    for run in chunk_plan(offset, size, chunk_size) {
        let host = distributor.locate_data(path, run.chunk_id);
        let entry = groups.entry(host).or_default();
        if entry.is_empty() {
            order.push(host);
        }
        entry.push(run);
    }

    order.into_iter().map(|h| (h, groups.remove(&h).unwrap())).collect()
}

fn chunk_header_value(runs: &[ChunkRun]) -> String {
    let slices: Vec<ChunkSlice> = runs
        .iter()
        .map(|r| ChunkSlice { chunk_id: r.chunk_id, offset_in_chunk: r.offset_in_chunk, length: r.length })
        .collect();
    serde_json::to_string(&slices).expect("ChunkSlice list always serializes")
}

pub async fn forward_write(
    client: &Client,
    ctx: &MountContext,
    path: &str,
    buf: &[u8],
    append: bool,
    in_offset: u64,
    chunk_size: u64,
    updated_metadentry_size: u64,
) -> Result<u64, GkfsError> {
    let distributor = ctx.distributor();
    let offset = if append { updated_metadentry_size - buf.len() as u64 } else { in_offset };
    let groups = group_by_host(distributor.as_ref(), path, offset, buf.len() as u64, chunk_size);

    let mut futures = Vec::new();
    for (host, runs) in groups {
        let url = host_url(ctx, host)?;
        let mut payload = Vec::with_capacity(runs.iter().map(|r| r.length as usize).sum());
        for run in &runs {
            let start = (run.pos - offset) as usize;
            payload.extend_from_slice(&buf[start..start + run.length as usize]);
        }
        let chunks_header = chunk_header_value(&runs);
        let query = WriteQuery { path: path.to_string() };
        let client = client.clone();
        futures.push(async move {
            let resp = client
                .post(format!("{url}/data/write"))
                .query(&query)
                .header(CHUNKS_HEADER, chunks_header)
                .body(payload)
                .send()
                .await
                .map_err(|e| GkfsError::Unreachable(e.to_string()))?;
            if !resp.status().is_success() {
                return Err(GkfsError::Io(format!("daemon write failed: {}", resp.status())));
            }
            let body: WriteResponse = resp.json().await.map_err(|e| GkfsError::Io(e.to_string()))?;
            Ok::<u64, GkfsError>(body.written)
        });
    }

    let results = futures_util::future::join_all(futures).await;
    let mut total = 0u64;
    for r in results {
        total += r?;
    }
    Ok(total)
}

pub async fn forward_read(
    client: &Client,
    ctx: &MountContext,
    path: &str,
    offset: u64,
    size: u64,
    chunk_size: u64,
) -> Result<Vec<u8>, GkfsError> {
    let distributor = ctx.distributor();
    let mut out = vec![0u8; size as usize];
    let groups = group_by_host(distributor.as_ref(), path, offset, size, chunk_size);

    let mut futures = Vec::new();
    for (host, runs) in groups {
        let url = host_url(ctx, host)?;
        let chunks_header = chunk_header_value(&runs);
        let query = ReadQuery { path: path.to_string() };
        let client = client.clone();
        // Each run's own `pos` tells us exactly where its bytes land in the
        // caller's buffer, so the response never needs to be contiguous
        // with its neighbors to be placed correctly.
        let out_positions: Vec<(usize, usize)> = runs.iter().map(|r| ((r.pos - offset) as usize, r.length as usize)).collect();
        futures.push(async move {
            let resp = client
                .get(format!("{url}/data/read"))
                .query(&query)
                .header(CHUNKS_HEADER, chunks_header)
                .send()
                .await
                .map_err(|e| GkfsError::Unreachable(e.to_string()))?;
            if !resp.status().is_success() {
                return Err(GkfsError::Io(format!("daemon read failed: {}", resp.status())));
            }
            let bytes = resp.bytes().await.map_err(|e| GkfsError::Io(e.to_string()))?;
            Ok::<(Vec<(usize, usize)>, Vec<u8>), GkfsError>((out_positions, bytes.to_vec()))
        });
    }

    for r in futures_util::future::join_all(futures).await {
        let (positions, bytes) = r?;
        let mut cursor = 0usize;
        for (pos, len) in positions {
            out[pos..pos + len].copy_from_slice(&bytes[cursor..cursor + len]);
            cursor += len;
        }
    }
    Ok(out)
}

pub async fn forward_truncate(
    client: &Client,
    ctx: &MountContext,
    path: &str,
    current_size: u64,
    new_size: u64,
    chunk_size: u64,
) -> Result<(), GkfsError> {
    assert!(current_size >= new_size);
    let distributor = ctx.distributor();
    let host_size = ctx.hosts().len() as u64;

    let start_chunk = chunk_id(new_size, chunk_size);
    let end_chunk = if current_size == 0 { start_chunk } else { chunk_id(current_size - 1, chunk_size) };

    let mut hosts: Vec<u64> = (start_chunk..=end_chunk).map(|c| distributor.locate_data(path, c)).collect();
    hosts.sort_unstable();
    hosts.dedup();

    let mut futures = Vec::new();
    for host in hosts {
        let url = host_url(ctx, host)?;
        let req = TruncateRequest { path: path.to_string(), current_size, new_size, host_id: host, host_size };
        let client = client.clone();
        futures.push(async move {
            let resp = client
                .post(format!("{url}/data/truncate"))
                .json(&req)
                .send()
                .await
                .map_err(|_| GkfsError::Busy)?;
            if !resp.status().is_success() {
                return Err(GkfsError::Io(format!("daemon truncate failed: {}", resp.status())));
            }
            Ok::<(), GkfsError>(())
        });
    }
    for r in futures_util::future::join_all(futures).await {
        r?;
    }
    Ok(())
}

pub async fn forward_get_chunk_stat(client: &Client, ctx: &MountContext) -> Result<ChunkStatResponse, GkfsError> {
    let mut futures = Vec::new();
    for url in ctx.hosts() {
        let client = client.clone();
        futures.push(async move {
            let resp = client.get(format!("{url}/chunk_stat")).send().await.map_err(|_| GkfsError::Busy)?;
            resp.json::<ChunkStatResponse>().await.map_err(|e| GkfsError::Io(e.to_string()))
        });
    }

    let mut total_size = None;
    let mut chunk_total = 0u64;
    let mut chunk_free = 0u64;
    for r in futures_util::future::join_all(futures).await {
        let stat: ChunkStatResponse = r?;
        match total_size {
            None => total_size = Some(stat.chunk_size),
            Some(sz) => assert_eq!(sz, stat.chunk_size, "hosts disagree on chunk_size"),
        }
        chunk_total += stat.chunk_total;
        chunk_free += stat.chunk_free;
    }

    Ok(ChunkStatResponse { chunk_size: total_size.unwrap_or(0), chunk_total, chunk_free })
}

// --- Metadata-plane RPC client calls (spec.md §4.7's client-facing half) ---

pub async fn rpc_create(client: &Client, ctx: &MountContext, path: &str, mode: u32) -> Result<(), GkfsError> {
    let url = host_url(ctx, ctx.distributor().locate_metadata(path))?;
    let resp = client
        .post(format!("{url}/metadata/create"))
        .json(&CreateRequest { path: path.to_string(), mode })
        .send()
        .await
        .map_err(|e| GkfsError::Unreachable(e.to_string()))?;
    map_status(resp.status())
}

pub async fn rpc_stat(client: &Client, ctx: &MountContext, path: &str) -> Result<gekko_common::metadata::Metadata, GkfsError> {
    let url = host_url(ctx, ctx.distributor().locate_metadata(path))?;
    let resp = client
        .get(format!("{url}/metadata/stat"))
        .query(&[("path", path)])
        .send()
        .await
        .map_err(|e| GkfsError::Unreachable(e.to_string()))?;
    map_status::<()>(resp.status())?;
    let body: StatResponse = resp.json().await.map_err(|e| GkfsError::Io(e.to_string()))?;
    gekko_common::metadata::Metadata::deserialize(&body.metadata_wire)
}

pub async fn rpc_remove(client: &Client, ctx: &MountContext, path: &str) -> Result<(), GkfsError> {
    let url = host_url(ctx, ctx.distributor().locate_metadata(path))?;
    let resp = client
        .post(format!("{url}/metadata/remove"))
        .json(&RemoveRequest { path: path.to_string() })
        .send()
        .await
        .map_err(|e| GkfsError::Unreachable(e.to_string()))?;
    map_status(resp.status())
}

/// Clears chunk space for `path` on every host, not just the one that owns
/// its metadata: data chunks are spread by `locate_data` independent of
/// `locate_metadata`, so a non-empty regular file's data can live on hosts
/// that `rpc_remove` never talks to. Callers (`hooks::unlink`) are
/// responsible for only calling this when the file actually has data.
pub async fn broadcast_destroy_chunk_space(client: &Client, ctx: &MountContext, path: &str) -> Result<(), GkfsError> {
    let mut futures = Vec::new();
    for host in ctx.distributor().all_hosts() {
        let url = host_url(ctx, host)?;
        let req = RemoveRequest { path: path.to_string() };
        let client = client.clone();
        futures.push(async move {
            let resp = client
                .post(format!("{url}/data/remove"))
                .json(&req)
                .send()
                .await
                .map_err(|e| GkfsError::Unreachable(e.to_string()))?;
            if !resp.status().is_success() {
                return Err(GkfsError::Io(format!("daemon chunk remove failed: {}", resp.status())));
            }
            Ok::<(), GkfsError>(())
        });
    }
    for r in futures_util::future::join_all(futures).await {
        r?;
    }
    Ok(())
}

/// Persists the effect of a completed write on a file's metadata size.
/// Mirrors the original's `update_metadentry_size` RPC: sent once per
/// logical write, to the metadata-owning host, after the data-plane
/// transfer has already landed on whichever hosts owned the chunks.
pub async fn rpc_update_size(
    client: &Client,
    ctx: &MountContext,
    path: &str,
    offset: u64,
    size: u64,
    append: bool,
) -> Result<u64, GkfsError> {
    let url = host_url(ctx, ctx.distributor().locate_metadata(path))?;
    let resp = client
        .post(format!("{url}/metadata/update_size"))
        .json(&UpdateMetadentrySizeRequest { path: path.to_string(), size, offset, append })
        .send()
        .await
        .map_err(|e| GkfsError::Unreachable(e.to_string()))?;
    map_status::<()>(resp.status())?;
    let body: UpdateMetadentrySizeResponse = resp.json().await.map_err(|e| GkfsError::Io(e.to_string()))?;
    Ok(body.new_size)
}

pub async fn rpc_get_dirents(client: &Client, ctx: &MountContext, path: &str) -> Result<Vec<DirEntry>, GkfsError> {
    let url = host_url(ctx, ctx.distributor().locate_metadata(path))?;
    let resp = client
        .get(format!("{url}/metadata/dirents"))
        .query(&[("path", path)])
        .send()
        .await
        .map_err(|e| GkfsError::Unreachable(e.to_string()))?;
    map_status::<()>(resp.status())?;
    let body: GetDirentsResponse = resp.json().await.map_err(|e| GkfsError::Io(e.to_string()))?;
    Ok(body.entries)
}

fn map_status<T: Default>(status: reqwest::StatusCode) -> Result<T, GkfsError> {
    if status.is_success() {
        return Ok(T::default());
    }
    Err(match status.as_u16() {
        404 => GkfsError::NotFound,
        409 => GkfsError::AlreadyExists,
        400 => GkfsError::InvalidArgument,
        _ => GkfsError::Io(status.to_string()),
    })
}
