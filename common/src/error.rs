//! Crate-wide error type and its errno mapping, per spec.md §7's
//! propagation policy: every layer converts its own error into a concrete
//! errno value rather than leaking transport or storage error types up to
//! the syscall boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GkfsError {
    #[error("no such file or directory")]
    NotFound,
    #[error("file exists")]
    AlreadyExists,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("directory not empty")]
    NotEmpty,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("operation not supported")]
    NotSupported,
    #[error("resource busy")]
    Busy,
    #[error("i/o error: {0}")]
    Io(String),
    #[error("metadata corrupt: {0}")]
    CorruptMetadata(String),
    #[error("remote daemon unreachable: {0}")]
    Unreachable(String),
}

impl GkfsError {
    /// Maps this error onto the POSIX errno a syscall hook should return.
    pub fn as_errno(&self) -> i32 {
        match self {
            GkfsError::NotFound => libc::ENOENT,
            GkfsError::AlreadyExists => libc::EEXIST,
            GkfsError::NotADirectory => libc::ENOTDIR,
            GkfsError::IsADirectory => libc::EISDIR,
            GkfsError::NotEmpty => libc::ENOTEMPTY,
            GkfsError::InvalidArgument => libc::EINVAL,
            GkfsError::NotSupported => libc::ENOTSUP,
            GkfsError::Busy => libc::EBUSY,
            GkfsError::Io(_) => libc::EIO,
            GkfsError::CorruptMetadata(_) => libc::EIO,
            GkfsError::Unreachable(_) => libc::EIO,
        }
    }
}

impl From<std::io::Error> for GkfsError {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind::*;
        match e.kind() {
            NotFound => GkfsError::NotFound,
            AlreadyExists => GkfsError::AlreadyExists,
            InvalidInput => GkfsError::InvalidArgument,
            _ => GkfsError::Io(e.to_string()),
        }
    }
}
