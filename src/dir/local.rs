//! Volume backed by a local directory tree
//!
//! Listings are sorted by name so positions are stable between calls as
//! long as the directory is not modified.

use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::{DirectoryEntry, Stat, UserCredentials, Volume};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct LocalVolume {
    root: PathBuf,
}

impl LocalVolume {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a volume path (`/a/b`) below the root.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = path.trim_start_matches('/');
        if relative.split('/').any(|part| part == "..") {
            return Err(Error::posix(libc::EACCES, format!("{}: escapes the volume", path)));
        }
        Ok(self.root.join(relative))
    }
}

fn posix_from_io(path: &str, e: std::io::Error) -> Error {
    Error::posix(e.raw_os_error().unwrap_or(libc::EIO), format!("{}: {}", path, e))
}

fn nanos(time: std::io::Result<std::time::SystemTime>) -> u64 {
    time.ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(unix)]
fn stat_of(metadata: &std::fs::Metadata) -> Stat {
    use std::os::unix::fs::MetadataExt;
    Stat {
        ino: metadata.ino(),
        mode: metadata.mode(),
        nlink: metadata.nlink() as u32,
        uid: metadata.uid(),
        gid: metadata.gid(),
        size: metadata.size(),
        atime_ns: nanos(metadata.accessed()),
        mtime_ns: nanos(metadata.modified()),
        ctime_ns: (metadata.ctime() as u64) * 1_000_000_000 + metadata.ctime_nsec() as u64,
    }
}

#[cfg(not(unix))]
fn stat_of(metadata: &std::fs::Metadata) -> Stat {
    Stat {
        size: metadata.len(),
        atime_ns: nanos(metadata.accessed()),
        mtime_ns: nanos(metadata.modified()),
        ..Stat::default()
    }
}

#[async_trait]
impl Volume for LocalVolume {
    async fn read_dir(
        &self,
        _credentials: &UserCredentials,
        path: &str,
        offset: u64,
        count: usize,
        include_stat: bool,
    ) -> Result<Vec<DirectoryEntry>> {
        let dir = self.resolve(path)?;
        let mut reader = fs::read_dir(&dir).await.map_err(|e| posix_from_io(path, e))?;

        let mut listing = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(|e| posix_from_io(path, e))? {
            listing.push(entry);
        }
        listing.sort_by_key(|entry| entry.file_name());

        let mut entries = Vec::new();
        for entry in listing.into_iter().skip(offset as usize).take(count) {
            let name = entry.file_name().to_string_lossy().into_owned();
            let stat = if include_stat {
                let metadata = entry.metadata().await.map_err(|e| posix_from_io(path, e))?;
                Some(stat_of(&metadata))
            } else {
                None
            };
            entries.push(DirectoryEntry { name, stat });
        }

        debug!(dir = %dir.display(), offset, count = entries.len(), "Listed local directory");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_sorted_pages() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c", "a", "b"] {
            std::fs::write(dir.path().join(name), name).unwrap();
        }
        let volume = LocalVolume::new(dir.path());
        let creds = UserCredentials::default();

        let page = volume.read_dir(&creds, "/", 1, 10, true).await.unwrap();
        let names: Vec<_> = page.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert_eq!(page[0].stat.as_ref().unwrap().size, 1);
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let volume = LocalVolume::new(dir.path());
        let creds = UserCredentials::default();
        assert_matches!(
            volume.read_dir(&creds, "/nope", 0, 10, false).await,
            Err(Error::Posix { errno, .. }) if errno == libc::ENOENT
        );
        assert_matches!(
            volume.read_dir(&creds, "/../etc", 0, 10, false).await,
            Err(Error::Posix { errno, .. }) if errno == libc::EACCES
        );
    }
}
