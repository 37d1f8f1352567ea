//! Entry point every intercepted libc call funnels through. Mirrors the
//! shape of `gkfs::preload`'s top-level hooks: check reentrance first, then
//! classify the path, then either hand the call to the real libc function
//! (`Outcome::Forward`) or run the GekkoFS-native implementation in
//! `hooks`.

use std::sync::Arc;

use gekko_common::error::GkfsError;
use reqwest::Client;

use crate::context::MountContext;
use crate::hooks;
use crate::reentrance::{self, ReentranceGuard};
use crate::resolve;
use crate::syscall::{HandledResult, Outcome, Syscall};

/// Whether a syscall's target lives under the mount, distinct from
/// `resolve::Resolved` (which still carries the external path along for
/// forwarding purposes we don't need once we already know we're forwarding).
enum Classified {
    Internal(String),
    External,
}

pub struct Dispatcher {
    ctx: Arc<MountContext>,
    client: Client,
    rt: tokio::runtime::Handle,
}

impl Dispatcher {
    pub fn new(ctx: Arc<MountContext>, client: Client, rt: tokio::runtime::Handle) -> Self {
        Self { ctx, client, rt }
    }

    pub fn ctx(&self) -> &Arc<MountContext> {
        &self.ctx
    }

    /// Runs `syscall` to completion, blocking the calling (real application)
    /// thread on the async RPC work. Preload hooks are not themselves async,
    /// so this is the one place the sync/async boundary is crossed.
    pub fn dispatch(&self, syscall: Syscall) -> Outcome {
        if reentrance::in_hook() || !self.ctx.interception_enabled() {
            return Outcome::Forward;
        }
        let _guard: ReentranceGuard = reentrance::guard();

        let resolved = match self.classify(&syscall) {
            Ok(r) => r,
            Err(e) => return Outcome::Handled(HandledResult::Errno(e.as_errno())),
        };

        let internal_path = match resolved {
            Classified::External => return Outcome::Forward,
            Classified::Internal(path) => path,
        };

        let result = self.rt.block_on(hooks::run(&self.ctx, &self.client, &internal_path, syscall));
        match result {
            Ok(handled) => Outcome::Handled(handled),
            Err(e) => Outcome::Handled(HandledResult::Errno(e.as_errno())),
        }
    }

    /// Pulls the path (or dirfd+path) out of `syscall` and resolves it.
    /// Syscalls that act purely on an already-open fd (`read`/`write`/
    /// `close`/`fstat`/`lseek`/`ftruncate`/`fchdir`) are internal exactly
    /// when the fd itself is one we issued, which `hooks::run` checks —
    /// here they're passed through as internal unconditionally, since an fd
    /// we didn't issue never reaches the dispatcher's fd-bearing hooks.
    fn classify(&self, syscall: &Syscall) -> Result<Classified, GkfsError> {
        use Syscall::*;
        match syscall {
            Open { dirfd, path, .. } | Unlink { dirfd, path } | Mkdir { dirfd, path, .. } | Rmdir { dirfd, path } => {
                let (status, rel) = resolve::relativize_fd_path(&self.ctx, *dirfd, path, true)?;
                Ok(to_resolved(status, rel))
            }
            Stat { dirfd, path, follow_symlink } => {
                let (status, rel) = resolve::relativize_fd_path(&self.ctx, *dirfd, path, *follow_symlink)?;
                Ok(to_resolved(status, rel))
            }
            Rename { olddirfd, oldpath, newdirfd, newpath } => {
                let (old_status, old_rel) = resolve::relativize_fd_path(&self.ctx, *olddirfd, oldpath, false)?;
                let (new_status, _) = resolve::relativize_fd_path(&self.ctx, *newdirfd, newpath, false)?;
                if old_status == crate::context::RelativizeStatus::Internal
                    && new_status == crate::context::RelativizeStatus::Internal
                {
                    Ok(Classified::Internal(old_rel))
                } else if old_status == crate::context::RelativizeStatus::Internal
                    || new_status == crate::context::RelativizeStatus::Internal
                {
                    // rename across the mount boundary isn't supported; the
                    // hook layer reports ENOTSUP rather than silently
                    // forwarding a half-internal path to the real kernel.
                    Err(GkfsError::NotSupported)
                } else {
                    Ok(Classified::External)
                }
            }
            Truncate { path, .. } | Chdir { path } | Statfs { path } => {
                match resolve::resolve_path(&self.ctx, path, true)? {
                    resolve::Resolved::Internal(p) => Ok(Classified::Internal(p)),
                    resolve::Resolved::External(_) => Ok(Classified::External),
                }
            }
            #[cfg(feature = "symlinks")]
            Symlink { dirfd, linkpath, .. } => {
                let (status, rel) = resolve::relativize_fd_path(&self.ctx, *dirfd, linkpath, false)?;
                Ok(to_resolved(status, rel))
            }
            #[cfg(feature = "symlinks")]
            Readlink { dirfd, path, .. } => {
                let (status, rel) = resolve::relativize_fd_path(&self.ctx, *dirfd, path, false)?;
                Ok(to_resolved(status, rel))
            }
            Close { fd }
            | Read { fd, .. }
            | Write { fd, .. }
            | Pread { fd, .. }
            | Pwrite { fd, .. }
            | Lseek { fd, .. }
            | Fstat { fd }
            | Ftruncate { fd, .. }
            | Getdents { fd, .. }
            | Dup { fd }
            | Fchdir { fd } => {
                if self.ctx.file_map().get_file(*fd).is_ok() || self.ctx.file_map().get_dir(*fd).is_ok() {
                    Ok(Classified::Internal(String::new()))
                } else {
                    Ok(Classified::External)
                }
            }
            Dup2 { oldfd, .. } => {
                if self.ctx.file_map().get_file(*oldfd).is_ok() || self.ctx.file_map().get_dir(*oldfd).is_ok() {
                    Ok(Classified::Internal(String::new()))
                } else {
                    Ok(Classified::External)
                }
            }
        }
    }
}

fn to_resolved(status: crate::context::RelativizeStatus, rel: String) -> Classified {
    use crate::context::RelativizeStatus::*;
    match status {
        Internal => Classified::Internal(rel),
        External => Classified::External,
        FdUnknown | FdNotADir => Classified::External,
    }
}
