//! Per-syscall handlers. Each one takes the already-resolved mount-relative
//! path (or, for fd-only calls, consults the fd table directly) and drives
//! `rpc_facade` plus local bookkeeping (`FdTable`) to produce a
//! `HandledResult`. Grounded across spec.md §4.1-§4.10 and their matching
//! `*_hook`/`*_impl` functions under `src/client/` in the original sources.

use gekko_common::error::GkfsError;
#[cfg(feature = "symlinks")]
use gekko_common::metadata::Metadata;
use reqwest::Client;

use crate::context::MountContext;
use crate::fd_table::OpenFlags;
use crate::syscall::{HandledResult, Syscall};

fn chunk_size(ctx: &MountContext) -> u64 {
    ctx.fs_conf().map(|c| c.chunk_size).unwrap_or(1 << 22)
}

pub async fn run(ctx: &MountContext, client: &Client, path: &str, syscall: Syscall) -> Result<HandledResult, GkfsError> {
    use Syscall::*;
    match syscall {
        Open { flags, mode, .. } => open(ctx, client, path, flags, mode).await,
        Close { fd } => close(ctx, fd),
        Read { fd, len } => read(ctx, client, fd, len).await,
        Write { fd, data } => write(ctx, client, fd, &data).await,
        Pread { fd, len, offset } => pread(ctx, client, fd, len, offset).await,
        Pwrite { fd, data, offset } => pwrite(ctx, client, fd, &data, offset).await,
        Lseek { fd, offset, whence } => lseek(ctx, client, fd, offset, whence).await,
        Stat { follow_symlink, .. } => stat(ctx, client, path, follow_symlink).await,
        Fstat { fd } => fstat(ctx, client, fd).await,
        Unlink { .. } => unlink(ctx, client, path).await,
        Mkdir { mode, .. } => mkdir(ctx, client, path, mode).await,
        Rmdir { .. } => rmdir(ctx, client, path).await,
        Rename { .. } => Err(GkfsError::NotSupported),
        Truncate { length, .. } => truncate(ctx, client, path, length).await,
        Ftruncate { fd, length } => ftruncate(ctx, client, fd, length).await,
        Getdents { fd, max_entries } => getdents(ctx, client, fd, max_entries).await,
        Dup { fd } => dup(ctx, fd),
        Dup2 { oldfd, newfd } => dup2(ctx, oldfd, newfd),
        Chdir { .. } => chdir(ctx, path),
        Fchdir { fd } => fchdir(ctx, fd),
        Statfs { .. } => statfs(ctx, client).await,
        #[cfg(feature = "symlinks")]
        Symlink { target, .. } => symlink(ctx, client, path, target).await,
        #[cfg(feature = "symlinks")]
        Readlink { bufsize, .. } => readlink(ctx, client, path, bufsize).await,
    }
}

async fn open(ctx: &MountContext, client: &Client, path: &str, flags: i32, mode: u32) -> Result<HandledResult, GkfsError> {
    // O_PATH and O_APPEND are unambiguous refusals (Non-goals): the
    // original rejects both outright rather than approximating them.
    if flags & libc::O_PATH != 0 {
        return Err(GkfsError::NotSupported);
    }
    if flags & libc::O_APPEND != 0 {
        return Err(GkfsError::NotSupported);
    }

    let open_flags = OpenFlags::from_raw(flags);
    let stat_result = crate::rpc_facade::rpc_stat(client, ctx, path).await;

    match stat_result {
        Ok(md) => {
            if md.is_dir() {
                return Ok(HandledResult::Fd(ctx.file_map().add_dir(path.to_string())));
            }
            if open_flags.trunc && (open_flags.wronly || open_flags.rdwr) {
                crate::rpc_facade::forward_truncate(client, ctx, path, md.size, 0, chunk_size(ctx)).await?;
            }
            Ok(HandledResult::Fd(ctx.file_map().add_file(path.to_string(), open_flags)))
        }
        Err(GkfsError::NotFound) if open_flags.creat => {
            crate::rpc_facade::rpc_create(client, ctx, path, mode | libc::S_IFREG).await?;
            Ok(HandledResult::Fd(ctx.file_map().add_file(path.to_string(), open_flags)))
        }
        Err(e) => Err(e),
    }
}

fn close(ctx: &MountContext, fd: i32) -> Result<HandledResult, GkfsError> {
    if ctx.file_map().remove(fd) {
        Ok(HandledResult::Unit)
    } else {
        Err(GkfsError::NotFound)
    }
}

async fn read(ctx: &MountContext, client: &Client, fd: i32, len: usize) -> Result<HandledResult, GkfsError> {
    let file = ctx.file_map().get_file(fd)?;
    let offset = *file.pos.lock().unwrap();
    let buf = crate::rpc_facade::forward_read(client, ctx, &file.path, offset, len as u64, chunk_size(ctx)).await?;
    *file.pos.lock().unwrap() = offset + buf.len() as u64;
    Ok(HandledResult::Bytes(buf))
}

async fn pread(ctx: &MountContext, client: &Client, fd: i32, len: usize, offset: u64) -> Result<HandledResult, GkfsError> {
    let file = ctx.file_map().get_file(fd)?;
    let buf = crate::rpc_facade::forward_read(client, ctx, &file.path, offset, len as u64, chunk_size(ctx)).await?;
    Ok(HandledResult::Bytes(buf))
}

async fn write(ctx: &MountContext, client: &Client, fd: i32, data: &[u8]) -> Result<HandledResult, GkfsError> {
    let file = ctx.file_map().get_file(fd)?;
    let append = file.flags.append;
    let cur_size = crate::rpc_facade::rpc_stat(client, ctx, &file.path).await?.size;
    let offset = if append { cur_size } else { *file.pos.lock().unwrap() };
    let new_size = if append { cur_size + data.len() as u64 } else { (offset + data.len() as u64).max(cur_size) };

    let written = crate::rpc_facade::forward_write(client, ctx, &file.path, data, append, offset, chunk_size(ctx), new_size).await?;
    crate::rpc_facade::rpc_update_size(client, ctx, &file.path, offset, written, append).await?;
    *file.pos.lock().unwrap() = offset + written;
    Ok(HandledResult::Count(written as i64))
}

async fn pwrite(ctx: &MountContext, client: &Client, fd: i32, data: &[u8], offset: u64) -> Result<HandledResult, GkfsError> {
    let file = ctx.file_map().get_file(fd)?;
    let cur_size = crate::rpc_facade::rpc_stat(client, ctx, &file.path).await?.size;
    let new_size = (offset + data.len() as u64).max(cur_size);
    let written = crate::rpc_facade::forward_write(client, ctx, &file.path, data, false, offset, chunk_size(ctx), new_size).await?;
    crate::rpc_facade::rpc_update_size(client, ctx, &file.path, offset, written, false).await?;
    Ok(HandledResult::Count(written as i64))
}

async fn lseek(ctx: &MountContext, client: &Client, fd: i32, offset: i64, whence: i32) -> Result<HandledResult, GkfsError> {
    let file = ctx.file_map().get_file(fd)?;
    let base = match whence {
        libc::SEEK_SET => 0,
        libc::SEEK_CUR => *file.pos.lock().unwrap() as i64,
        libc::SEEK_END => crate::rpc_facade::rpc_stat(client, ctx, &file.path).await?.size as i64,
        _ => return Err(GkfsError::InvalidArgument),
    };
    let new_pos = base + offset;
    if new_pos < 0 {
        return Err(GkfsError::InvalidArgument);
    }
    *file.pos.lock().unwrap() = new_pos as u64;
    Ok(HandledResult::Count(new_pos))
}

async fn stat(ctx: &MountContext, client: &Client, path: &str, _follow_symlink: bool) -> Result<HandledResult, GkfsError> {
    let md = crate::rpc_facade::rpc_stat(client, ctx, path).await?;
    Ok(HandledResult::Bytes(md.serialize().into_bytes()))
}

async fn fstat(ctx: &MountContext, client: &Client, fd: i32) -> Result<HandledResult, GkfsError> {
    let file = ctx.file_map().get_file(fd)?;
    let md = crate::rpc_facade::rpc_stat(client, ctx, &file.path).await?;
    Ok(HandledResult::Bytes(md.serialize().into_bytes()))
}

async fn unlink(ctx: &MountContext, client: &Client, path: &str) -> Result<HandledResult, GkfsError> {
    let md = crate::rpc_facade::rpc_stat(client, ctx, path).await?;
    if md.is_regular() && md.size > 0 {
        crate::rpc_facade::broadcast_destroy_chunk_space(client, ctx, path).await?;
    }
    crate::rpc_facade::rpc_remove(client, ctx, path).await?;
    Ok(HandledResult::Unit)
}

async fn mkdir(ctx: &MountContext, client: &Client, path: &str, mode: u32) -> Result<HandledResult, GkfsError> {
    crate::rpc_facade::rpc_create(client, ctx, path, mode | libc::S_IFDIR).await?;
    Ok(HandledResult::Unit)
}

async fn rmdir(ctx: &MountContext, client: &Client, path: &str) -> Result<HandledResult, GkfsError> {
    let entries = crate::rpc_facade::rpc_get_dirents(client, ctx, path).await?;
    if !entries.is_empty() {
        return Err(GkfsError::NotEmpty);
    }
    crate::rpc_facade::rpc_remove(client, ctx, path).await?;
    Ok(HandledResult::Unit)
}

async fn truncate(ctx: &MountContext, client: &Client, path: &str, length: u64) -> Result<HandledResult, GkfsError> {
    let md = crate::rpc_facade::rpc_stat(client, ctx, path).await?;
    if length < md.size {
        crate::rpc_facade::forward_truncate(client, ctx, path, md.size, length, chunk_size(ctx)).await?;
    }
    Ok(HandledResult::Unit)
}

async fn ftruncate(ctx: &MountContext, client: &Client, fd: i32, length: u64) -> Result<HandledResult, GkfsError> {
    let file = ctx.file_map().get_file(fd)?;
    truncate(ctx, client, &file.path, length).await
}

async fn getdents(ctx: &MountContext, client: &Client, fd: i32, max_entries: usize) -> Result<HandledResult, GkfsError> {
    let dir = ctx.file_map().get_dir(fd)?;
    let entries = crate::rpc_facade::rpc_get_dirents(client, ctx, &dir.path).await?;
    let mut pos = dir.pos.lock().unwrap();
    let start = *pos;
    let take = max_entries.min(entries.len().saturating_sub(start));
    let slice = &entries[start..start + take];
    *pos += take;

    let mut out = Vec::new();
    for e in slice {
        out.extend_from_slice(e.name.as_bytes());
        out.push(0);
        out.push(if e.is_dir { 1 } else { 0 });
    }
    Ok(HandledResult::Bytes(out))
}

fn dup(ctx: &MountContext, fd: i32) -> Result<HandledResult, GkfsError> {
    Ok(HandledResult::Fd(ctx.file_map().dup(fd)?))
}

fn dup2(ctx: &MountContext, oldfd: i32, newfd: i32) -> Result<HandledResult, GkfsError> {
    ctx.file_map().dup2(oldfd, newfd)?;
    Ok(HandledResult::Fd(newfd))
}

fn chdir(ctx: &MountContext, path: &str) -> Result<HandledResult, GkfsError> {
    ctx.set_cwd(path.to_string());
    Ok(HandledResult::Unit)
}

fn fchdir(ctx: &MountContext, fd: i32) -> Result<HandledResult, GkfsError> {
    let dir = ctx.file_map().get_dir(fd)?;
    ctx.set_cwd(dir.path.clone());
    Ok(HandledResult::Unit)
}

async fn statfs(ctx: &MountContext, client: &Client) -> Result<HandledResult, GkfsError> {
    let stat = crate::rpc_facade::forward_get_chunk_stat(client, ctx).await?;
    let mut out = Vec::new();
    out.extend_from_slice(&stat.chunk_size.to_le_bytes());
    out.extend_from_slice(&stat.chunk_total.to_le_bytes());
    out.extend_from_slice(&stat.chunk_free.to_le_bytes());
    Ok(HandledResult::Bytes(out))
}

#[cfg(feature = "symlinks")]
async fn symlink(ctx: &MountContext, client: &Client, linkpath: &str, target: String) -> Result<HandledResult, GkfsError> {
    use gekko_common::rpc::MkSymlinkRequest;
    let url = {
        let host = ctx.distributor().locate_metadata(linkpath);
        ctx.hosts().get(host as usize).cloned().ok_or_else(|| GkfsError::Unreachable("no endpoint".to_string()))?
    };
    let resp = client
        .post(format!("{url}/metadata/symlink"))
        .json(&MkSymlinkRequest { path: linkpath.to_string(), target_path: target })
        .send()
        .await
        .map_err(|e| GkfsError::Unreachable(e.to_string()))?;
    if !resp.status().is_success() {
        return Err(GkfsError::Io(resp.status().to_string()));
    }
    Ok(HandledResult::Unit)
}

#[cfg(feature = "symlinks")]
async fn readlink(ctx: &MountContext, client: &Client, path: &str, bufsize: usize) -> Result<HandledResult, GkfsError> {
    let md: Metadata = crate::rpc_facade::rpc_stat(client, ctx, path).await?;
    if !md.is_link() {
        return Err(GkfsError::InvalidArgument);
    }
    let mut bytes = md.target_path.into_bytes();
    bytes.truncate(bufsize);
    Ok(HandledResult::Bytes(bytes))
}
