//! On-disk chunk storage: each file becomes a directory of fixed-size
//! chunk files, one file per chunk id.
//!
//! Grounded in `daemon/backend/data/chunk_storage.cpp` — directory naming
//! (`get_chunks_dir`: strip the leading `/`, replace remaining `/` with
//! `:`), `O_WRONLY|O_CREAT` + retry-on-EINTR write loop, `pread`-style read
//! loop with EOF-by-short-read, `trim_chunk_space` deleting every chunk id
//! at or past a cutoff, and `chunk_stat` derived from `statvfs` on the
//! root path.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use gekko_common::error::GkfsError;

pub struct ChunkStorage {
    root_path: PathBuf,
    chunk_size: u64,
}

impl ChunkStorage {
    pub fn new(root_path: impl Into<PathBuf>, chunk_size: u64) -> io::Result<Self> {
        let root_path = root_path.into();
        fs::create_dir_all(&root_path)?;
        // Matches the original's access(root_path_, W_OK | R_OK) check.
        let meta = fs::metadata(&root_path)?;
        if !meta.is_dir() {
            return Err(io::Error::new(io::ErrorKind::Other, "chunk storage root is not a directory"));
        }
        Ok(Self { root_path, chunk_size })
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// `/a/b/c` -> `a:b:c`, the per-file chunk directory name.
    fn chunks_dir_name(file_path: &str) -> String {
        file_path.trim_start_matches('/').replace('/', ":")
    }

    fn chunks_dir(&self, file_path: &str) -> PathBuf {
        self.root_path.join(Self::chunks_dir_name(file_path))
    }

    fn chunk_path(&self, file_path: &str, chunk_id: u64) -> PathBuf {
        self.chunks_dir(file_path).join(chunk_id.to_string())
    }

    fn init_chunk_space(&self, file_path: &str) -> io::Result<()> {
        let dir = self.chunks_dir(file_path);
        match fs::create_dir(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Destroys all chunks for a file. Idempotent: missing directory is ok.
    pub fn destroy_chunk_space(&self, file_path: &str) -> io::Result<()> {
        match fs::remove_dir_all(self.chunks_dir(file_path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Writes `buf` into chunk `chunk_id` at `offset_in_chunk`, creating the
    /// file and its parent directory as needed.
    pub fn write_chunk(
        &self,
        file_path: &str,
        chunk_id: u64,
        offset_in_chunk: u64,
        buf: &[u8],
    ) -> Result<usize, GkfsError> {
        assert!(offset_in_chunk + buf.len() as u64 <= self.chunk_size);
        self.init_chunk_space(file_path)?;
        let path = self.chunk_path(file_path, chunk_id);
        let mut file = OpenOptions::new().write(true).create(true).open(&path)?;
        file.seek(SeekFrom::Start(offset_in_chunk))?;
        file.write_all(buf)?;
        Ok(buf.len())
    }

    /// Reads up to `buf.len()` bytes from chunk `chunk_id` starting at
    /// `offset_in_chunk`. Returns the number of bytes actually read — fewer
    /// than requested at EOF, same as the original's `pread64` loop that
    /// breaks on a zero-length read.
    pub fn read_chunk(
        &self,
        file_path: &str,
        chunk_id: u64,
        offset_in_chunk: u64,
        buf: &mut [u8],
    ) -> Result<usize, GkfsError> {
        let path = self.chunk_path(file_path, chunk_id);
        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        file.seek(SeekFrom::Start(offset_in_chunk))?;
        let mut total = 0;
        loop {
            match file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
            if total == buf.len() {
                break;
            }
        }
        Ok(total)
    }

    /// Removes every chunk whose id is `>= chunk_start`. Used to shrink a
    /// file on truncate. Tolerates already-missing chunks; collects and
    /// reports the first failure after attempting all removals.
    pub fn trim_chunk_space(&self, file_path: &str, chunk_start: u64) -> Result<(), GkfsError> {
        let dir = self.chunks_dir(file_path);
        let entries = match fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let mut first_err = None;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(id_str) = name.to_str() else { continue };
            let Ok(id) = id_str.parse::<u64>() else { continue };
            if id >= chunk_start {
                if let Err(e) = fs::remove_file(entry.path()) {
                    if e.kind() != io::ErrorKind::NotFound && first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Truncates a single chunk file to `length` bytes (`0 < length <= chunk_size`).
    pub fn truncate_chunk_file(&self, file_path: &str, chunk_id: u64, length: u64) -> Result<(), GkfsError> {
        assert!(length > 0 && length <= self.chunk_size);
        let path = self.chunk_path(file_path, chunk_id);
        let file = OpenOptions::new().write(true).create(true).open(&path)?;
        file.set_len(length)?;
        Ok(())
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkStat {
    pub chunk_size: u64,
    pub chunk_total: u64,
    pub chunk_free: u64,
}

/// Derives chunk-level capacity stats from the filesystem backing
/// `root_path`, the way the original does with `statvfs`.
#[cfg(unix)]
pub fn chunk_stat(root_path: &Path, chunk_size: u64) -> io::Result<ChunkStat> {
    use std::ffi::CString;
    use std::mem::MaybeUninit;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(root_path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path has interior NUL"))?;
    let mut stat: MaybeUninit<libc::statvfs> = MaybeUninit::uninit();
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    let stat = unsafe { stat.assume_init() };
    let total_bytes = stat.f_frsize as u64 * stat.f_blocks as u64;
    let free_bytes = stat.f_frsize as u64 * stat.f_bavail as u64;
    Ok(ChunkStat {
        chunk_size,
        chunk_total: total_bytes / chunk_size,
        chunk_free: free_bytes / chunk_size,
    })
}
