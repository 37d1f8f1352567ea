//! File metadata record and its on-the-wire `|`-delimited serialization.
//!
//! Grounded in `global/metadata.cpp`: field order is load-bearing ("The
//! order is important. don't change.") — mode, size, then the optional
//! timestamp/link/block fields gated by the `use_*` flags below, then
//! (with the `symlinks` feature) the symlink target. The original gates
//! these fields with `#ifdef`/compile-time constants; Rust has no
//! compile-time-conditional struct layout outside of `cfg`, so the
//! `use_*` flags are runtime `Copy` constants instead — cheap to flip for
//! a deployment without recompiling every field width into the binary.

use crate::error::GkfsError;

pub const SEPARATOR: char = '|';

/// Mirrors `gkfs::config::metadata::use_*`. A fixed default here; spec.md's
/// daemon config (§6) exposes no knob to change it, so it is not wired
/// through `DaemonConfig` — but it is centralized here, matching the
/// original's intent of a single toggle point.
pub mod fields {
    pub const USE_ATIME: bool = true;
    pub const USE_MTIME: bool = true;
    pub const USE_CTIME: bool = true;
    pub const USE_LINK_CNT: bool = true;
    pub const USE_BLOCKS: bool = true;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileType {
    Regular,
    Directory,
    #[cfg(feature = "symlinks")]
    Symlink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub mode: u32,
    pub size: u64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub link_count: u32,
    pub blocks: u64,
    #[cfg(feature = "symlinks")]
    pub target_path: String,
}

impl Metadata {
    pub fn new_file(mode: u32) -> Self {
        Metadata {
            mode,
            size: 0,
            atime: 0,
            mtime: 0,
            ctime: 0,
            link_count: 1,
            blocks: 0,
            #[cfg(feature = "symlinks")]
            target_path: String::new(),
        }
    }

    #[cfg(feature = "symlinks")]
    pub fn new_symlink(mode: u32, target_path: String) -> Self {
        assert!(target_path.starts_with('/'));
        Metadata {
            mode,
            size: 0,
            atime: 0,
            mtime: 0,
            ctime: 0,
            link_count: 1,
            blocks: 0,
            target_path,
        }
    }

    pub fn is_dir(&self) -> bool {
        (self.mode & libc::S_IFMT) == libc::S_IFDIR
    }

    pub fn is_regular(&self) -> bool {
        (self.mode & libc::S_IFMT) == libc::S_IFREG
    }

    #[cfg(feature = "symlinks")]
    pub fn is_link(&self) -> bool {
        (self.mode & libc::S_IFMT) == libc::S_IFLNK
    }

    /// Stamps atime/mtime/ctime to `now` (seconds since epoch). Called on
    /// creation.
    pub fn init_acm_time(&mut self, now: i64) {
        self.atime = now;
        self.mtime = now;
        self.ctime = now;
    }

    pub fn update_acm_time(&mut self, now: i64, a: bool, c: bool, m: bool) {
        if a {
            self.atime = now;
        }
        if c {
            self.ctime = now;
        }
        if m {
            self.mtime = now;
        }
    }

    pub fn serialize(&self) -> String {
        let mut s = String::new();
        s.push_str(&self.mode.to_string());
        s.push(SEPARATOR);
        s.push_str(&self.size.to_string());
        if fields::USE_ATIME {
            s.push(SEPARATOR);
            s.push_str(&self.atime.to_string());
        }
        if fields::USE_MTIME {
            s.push(SEPARATOR);
            s.push_str(&self.mtime.to_string());
        }
        if fields::USE_CTIME {
            s.push(SEPARATOR);
            s.push_str(&self.ctime.to_string());
        }
        if fields::USE_LINK_CNT {
            s.push(SEPARATOR);
            s.push_str(&self.link_count.to_string());
        }
        if fields::USE_BLOCKS {
            s.push(SEPARATOR);
            s.push_str(&self.blocks.to_string());
        }
        #[cfg(feature = "symlinks")]
        {
            s.push(SEPARATOR);
            s.push_str(&self.target_path);
        }
        s
    }

    pub fn deserialize(binary_str: &str) -> Result<Self, GkfsError> {
        let mut parts = binary_str.split(SEPARATOR);
        let corrupt = || GkfsError::CorruptMetadata(binary_str.to_string());

        let mode: u32 = parts.next().ok_or_else(corrupt)?.parse().map_err(|_| corrupt())?;
        let size: u64 = parts.next().ok_or_else(corrupt)?.parse().map_err(|_| corrupt())?;

        let mut md = Metadata {
            mode,
            size,
            atime: 0,
            mtime: 0,
            ctime: 0,
            link_count: 0,
            blocks: 0,
            #[cfg(feature = "symlinks")]
            target_path: String::new(),
        };

        if fields::USE_ATIME {
            md.atime = parts.next().ok_or_else(corrupt)?.parse().map_err(|_| corrupt())?;
        }
        if fields::USE_MTIME {
            md.mtime = parts.next().ok_or_else(corrupt)?.parse().map_err(|_| corrupt())?;
        }
        if fields::USE_CTIME {
            md.ctime = parts.next().ok_or_else(corrupt)?.parse().map_err(|_| corrupt())?;
        }
        if fields::USE_LINK_CNT {
            md.link_count = parts.next().ok_or_else(corrupt)?.parse().map_err(|_| corrupt())?;
        }
        if fields::USE_BLOCKS {
            md.blocks = parts.next().ok_or_else(corrupt)?.parse().map_err(|_| corrupt())?;
        }
        #[cfg(feature = "symlinks")]
        {
            md.target_path = parts.next().unwrap_or_default().to_string();
        }

        Ok(md)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_regular_file() {
        let mut md = Metadata::new_file(libc::S_IFREG | 0o644);
        md.size = 4096;
        md.init_acm_time(1_700_000_000);
        md.link_count = 1;
        md.blocks = 8;
        let wire = md.serialize();
        let back = Metadata::deserialize(&wire).unwrap();
        assert_eq!(md, back);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Metadata::deserialize("not-a-metadata-record").is_err());
    }

    #[cfg(feature = "symlinks")]
    #[test]
    fn roundtrip_symlink() {
        let md = Metadata::new_symlink(libc::S_IFLNK | 0o777, "/target/path".to_string());
        let wire = md.serialize();
        let back = Metadata::deserialize(&wire).unwrap();
        assert_eq!(md, back);
        assert!(back.is_link());
    }
}
