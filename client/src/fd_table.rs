//! Open file/directory table, grounded in `client/open_file_map.cpp`.
//!
//! The original keeps a single `unordered_map<int, shared_ptr<OpenFile>>`
//! guarded by a `recursive_mutex`, plus a separate `fd_idx` generator
//! guarded by its own mutex, with a "validation needed" flag set whenever
//! `dup2` plants a handle at an fd number past the generator's current
//! position (so the generator must then probe for collisions instead of
//! handing out the next number blindly).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use gekko_common::error::GkfsError;

/// First fd number handed out to GekkoFS-managed files; fds below this are
/// left to the kernel/libc (stdin/stdout/stderr and anything opened before
/// interception is enabled).
const FD_IDX_START: i32 = 10_000;
/// Wrap-around ceiling, mirroring the original's reset to `100000` on
/// overflow rather than running fd numbers up to `INT_MAX`.
const FD_IDX_WRAP: i32 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags {
    pub creat: bool,
    pub append: bool,
    pub trunc: bool,
    pub rdonly: bool,
    pub wronly: bool,
    pub rdwr: bool,
}

impl OpenFlags {
    pub fn from_raw(flags: i32) -> Self {
        let acc_mode = flags & libc::O_ACCMODE;
        Self {
            creat: flags & libc::O_CREAT != 0,
            append: flags & libc::O_APPEND != 0,
            trunc: flags & libc::O_TRUNC != 0,
            rdonly: acc_mode == libc::O_RDONLY,
            wronly: acc_mode == libc::O_WRONLY,
            rdwr: acc_mode == libc::O_RDWR,
        }
    }
}

pub struct OpenFile {
    pub path: String,
    pub flags: OpenFlags,
    pub pos: Mutex<u64>,
}

impl OpenFile {
    pub fn new(path: String, flags: OpenFlags) -> Self {
        // position always starts at 0; O_APPEND is honored per-write by
        // reading the current file size at write time, not by seeking here.
        Self { path, flags, pos: Mutex::new(0) }
    }
}

pub struct OpenDir {
    pub path: String,
    pub pos: Mutex<usize>,
}

pub enum Handle {
    File(Arc<OpenFile>),
    Dir(Arc<OpenDir>),
}

#[derive(Default)]
pub struct FdTable {
    files: RwLock<HashMap<i32, Handle>>,
    fd_idx: Mutex<FdIdxGenerator>,
}

struct FdIdxGenerator {
    next: i32,
    validation_needed: bool,
}

impl Default for FdIdxGenerator {
    fn default() -> Self {
        Self { next: FD_IDX_START, validation_needed: false }
    }
}

impl FdTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn exists(&self, fd: i32) -> bool {
        self.files.read().unwrap().contains_key(&fd)
    }

    fn generate_fd_idx(&self) -> i32 {
        let mut gen = self.fd_idx.lock().unwrap();
        let fd = gen.next;
        gen.next += 1;
        if gen.next >= i32::MAX - 1 {
            gen.next = FD_IDX_WRAP;
            gen.validation_needed = true;
        }
        fd
    }

    /// Like `generate_fd_idx`, but if `dup2` previously planted a handle
    /// past our generator's position, probes for a free slot instead of
    /// blindly handing back a colliding number.
    fn safe_generate_fd_idx(&self) -> i32 {
        loop {
            let needs_check = self.fd_idx.lock().unwrap().validation_needed;
            let fd = self.generate_fd_idx();
            if !needs_check || !self.exists(fd) {
                return fd;
            }
        }
    }

    pub fn add_file(&self, path: String, flags: OpenFlags) -> i32 {
        let fd = self.safe_generate_fd_idx();
        self.files.write().unwrap().insert(fd, Handle::File(Arc::new(OpenFile::new(path, flags))));
        fd
    }

    pub fn add_dir(&self, path: String) -> i32 {
        let fd = self.safe_generate_fd_idx();
        self.files
            .write()
            .unwrap()
            .insert(fd, Handle::Dir(Arc::new(OpenDir { path, pos: Mutex::new(0) })));
        fd
    }

    pub fn get_file(&self, fd: i32) -> Result<Arc<OpenFile>, GkfsError> {
        match self.files.read().unwrap().get(&fd) {
            Some(Handle::File(f)) => Ok(f.clone()),
            Some(Handle::Dir(_)) => Err(GkfsError::IsADirectory),
            None => Err(GkfsError::NotFound),
        }
    }

    pub fn get_dir(&self, fd: i32) -> Result<Arc<OpenDir>, GkfsError> {
        match self.files.read().unwrap().get(&fd) {
            Some(Handle::Dir(d)) => Ok(d.clone()),
            Some(Handle::File(_)) => Err(GkfsError::NotADirectory),
            None => Err(GkfsError::NotFound),
        }
    }

    pub fn remove(&self, fd: i32) -> bool {
        let mut files = self.files.write().unwrap();
        let removed = files.remove(&fd).is_some();
        if files.is_empty() {
            drop(files);
            self.fd_idx.lock().unwrap().validation_needed = false;
        }
        removed
    }

    /// `dup(oldfd)`: the new fd shares the same `OpenFile` handle as
    /// `oldfd` — same `Arc`, same `pos` mutex — so a seek or write through
    /// either fd is visible through the other, matching POSIX (and
    /// spec.md §3's "position is therefore shared" invariant).
    pub fn dup(&self, oldfd: i32) -> Result<i32, GkfsError> {
        let handle = match self.files.read().unwrap().get(&oldfd) {
            Some(Handle::File(f)) => Handle::File(f.clone()),
            Some(Handle::Dir(_)) => return Err(GkfsError::InvalidArgument),
            None => return Err(GkfsError::NotFound),
        };
        let fd = self.safe_generate_fd_idx();
        self.files.write().unwrap().insert(fd, handle);
        Ok(fd)
    }

    /// `dup2(oldfd, newfd)`: no-op if they're equal; otherwise silently
    /// drops whatever was at `newfd` and re-targets it onto the *same*
    /// `Arc<OpenFile>`/`Arc<OpenDir>` as `oldfd` (see `dup`'s doc comment).
    /// If `newfd` lands past our generator's current position, flags
    /// future generation to re-validate for collisions (mirrors the
    /// original's handling of `dup2` planting handles arbitrarily far
    /// ahead of the counter).
    pub fn dup2(&self, oldfd: i32, newfd: i32) -> Result<(), GkfsError> {
        if oldfd == newfd {
            return Ok(());
        }
        let src = match self.files.read().unwrap().get(&oldfd) {
            Some(Handle::File(f)) => Handle::File(f.clone()),
            Some(Handle::Dir(d)) => Handle::Dir(d.clone()),
            None => return Err(GkfsError::NotFound),
        };
        self.files.write().unwrap().insert(newfd, src);
        let mut gen = self.fd_idx.lock().unwrap();
        if newfd >= gen.next && newfd > 2 {
            gen.validation_needed = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_starts_at_fd_idx_start() {
        let table = FdTable::new();
        let fd = table.add_file("/a".into(), OpenFlags::from_raw(libc::O_RDONLY));
        assert_eq!(fd, FD_IDX_START);
    }

    #[test]
    fn remove_resets_validation_when_empty() {
        let table = FdTable::new();
        let fd = table.add_file("/a".into(), OpenFlags::from_raw(libc::O_RDONLY));
        assert!(table.remove(fd));
        assert!(!table.remove(fd));
    }

    #[test]
    fn dup_shares_handle_and_position_with_original() {
        let table = FdTable::new();
        let fd = table.add_file("/a".into(), OpenFlags::from_raw(libc::O_RDWR));
        let dup_fd = table.dup(fd).unwrap();
        assert_ne!(fd, dup_fd);
        assert_eq!(table.get_file(dup_fd).unwrap().path, "/a");

        *table.get_file(fd).unwrap().pos.lock().unwrap() = 42;
        assert_eq!(*table.get_file(dup_fd).unwrap().pos.lock().unwrap(), 42, "dup'd fd must observe seeks on the original");
    }

    #[test]
    fn dup2_shares_handle_and_position_with_original() {
        let table = FdTable::new();
        let a = table.add_file("/a".into(), OpenFlags::from_raw(libc::O_RDWR));
        let b = table.add_file("/b".into(), OpenFlags::from_raw(libc::O_RDONLY));
        table.dup2(a, b).unwrap();

        *table.get_file(a).unwrap().pos.lock().unwrap() = 7;
        assert_eq!(*table.get_file(b).unwrap().pos.lock().unwrap(), 7);
    }

    #[test]
    fn dup2_same_fd_is_noop() {
        let table = FdTable::new();
        let fd = table.add_file("/a".into(), OpenFlags::from_raw(libc::O_RDONLY));
        table.dup2(fd, fd).unwrap();
        assert_eq!(table.get_file(fd).unwrap().path, "/a");
    }

    #[test]
    fn dup2_retargets_newfd() {
        let table = FdTable::new();
        let a = table.add_file("/a".into(), OpenFlags::from_raw(libc::O_RDONLY));
        let b = table.add_file("/b".into(), OpenFlags::from_raw(libc::O_RDONLY));
        table.dup2(a, b).unwrap();
        assert_eq!(table.get_file(b).unwrap().path, "/a");
    }

    #[test]
    fn directory_handle_rejected_as_file() {
        let table = FdTable::new();
        let fd = table.add_dir("/d".into());
        assert!(matches!(table.get_file(fd), Err(GkfsError::IsADirectory)));
    }
}
