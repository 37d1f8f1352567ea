//! Hosts-file lifecycle: every daemon appends its own `<hostname> <addr>`
//! line on startup so the client (and peer daemons) can discover the full
//! host list, and removes that line again on clean shutdown.
//!
//! Not present in the distilled spec.md, but part of the original's
//! deployment story and named in SPEC_FULL.md §3 as a supplemented feature.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub struct HostsFile {
    path: PathBuf,
    hostname: String,
}

impl HostsFile {
    pub fn new(path: impl Into<PathBuf>, hostname: String) -> Self {
        Self { path: path.into(), hostname }
    }

    pub fn register(&self, addr: &str) -> io::Result<()> {
        let mut f = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(f, "{} {}", self.hostname, addr)
    }

    /// Removes this daemon's line, leaving every other host's entry intact.
    pub fn deregister(&self) -> io::Result<()> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        let prefix = format!("{} ", self.hostname);
        let filtered: String = contents
            .lines()
            .filter(|line| !line.starts_with(&prefix))
            .map(|l| format!("{l}\n"))
            .collect();
        std::fs::write(&self.path, filtered)
    }

    pub fn read_all(path: &Path) -> io::Result<Vec<(String, String)>> {
        let contents = std::fs::read_to_string(path)?;
        Ok(contents
            .lines()
            .filter_map(|line| {
                let mut it = line.split_whitespace();
                Some((it.next()?.to_string(), it.next()?.to_string()))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_deregister() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts.txt");
        let a = HostsFile::new(&path, "nodeA".into());
        let b = HostsFile::new(&path, "nodeB".into());
        a.register("127.0.0.1:8080").unwrap();
        b.register("127.0.0.1:8081").unwrap();

        let all = HostsFile::read_all(&path).unwrap();
        assert_eq!(all.len(), 2);

        a.deregister().unwrap();
        let remaining = HostsFile::read_all(&path).unwrap();
        assert_eq!(remaining, vec![("nodeB".to_string(), "127.0.0.1:8081".to_string())]);
    }
}
