//! Strongly-typed stand-ins for the libc calls GekkoFS intercepts. See
//! SPEC_FULL.md §1 for why this sits one layer above raw syscall numbers.

#[derive(Debug, Clone)]
pub enum Syscall {
    Open { dirfd: i32, path: String, flags: i32, mode: u32 },
    Close { fd: i32 },
    Read { fd: i32, len: usize },
    Write { fd: i32, data: Vec<u8> },
    Pread { fd: i32, len: usize, offset: u64 },
    Pwrite { fd: i32, data: Vec<u8>, offset: u64 },
    Lseek { fd: i32, offset: i64, whence: i32 },
    Stat { dirfd: i32, path: String, follow_symlink: bool },
    Fstat { fd: i32 },
    Unlink { dirfd: i32, path: String },
    Mkdir { dirfd: i32, path: String, mode: u32 },
    Rmdir { dirfd: i32, path: String },
    Rename { olddirfd: i32, oldpath: String, newdirfd: i32, newpath: String },
    Truncate { path: String, length: u64 },
    Ftruncate { fd: i32, length: u64 },
    Getdents { fd: i32, max_entries: usize },
    Dup { fd: i32 },
    Dup2 { oldfd: i32, newfd: i32 },
    Chdir { path: String },
    Fchdir { fd: i32 },
    Statfs { path: String },
    #[cfg(feature = "symlinks")]
    Symlink { target: String, dirfd: i32, linkpath: String },
    #[cfg(feature = "symlinks")]
    Readlink { dirfd: i32, path: String, bufsize: usize },
}

#[derive(Debug)]
pub enum Outcome {
    Handled(HandledResult),
    /// Not our path — forward to the real libc call with these
    /// (possibly-rewritten) arguments.
    Forward,
}

#[derive(Debug)]
pub enum HandledResult {
    Fd(i32),
    Count(i64),
    Bytes(Vec<u8>),
    Unit,
    Errno(i32),
}
