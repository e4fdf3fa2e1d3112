//! In-memory volume

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use super::{DirectoryEntry, Stat, UserCredentials, Volume};
use crate::error::{Error, Result};

/// Directory listings held in memory, with an RPC log and failure injection.
///
/// Entries keep their creation order, which is the order ReadDir returns.
#[derive(Debug, Default)]
pub struct InMemoryVolume {
    directories: DashMap<String, Vec<DirectoryEntry>>,
    next_ino: AtomicU64,
    read_dir_calls: AtomicU64,
    offsets_requested: Mutex<Vec<u64>>,
    fail_next: Mutex<Option<i32>>,
}

impl InMemoryVolume {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty directory (no-op if it exists).
    pub fn create_directory(&self, path: &str) {
        self.directories.entry(path.to_string()).or_default();
    }

    /// Append a regular file entry.
    pub fn create_entry(&self, path: &str, name: &str) -> Result<()> {
        let mut listing = self
            .directories
            .get_mut(path)
            .ok_or_else(|| Error::posix(libc::ENOENT, format!("{}: no such directory", path)))?;
        if listing.iter().any(|e| e.name == name) {
            return Err(Error::posix(libc::EEXIST, format!("{}/{} exists", path, name)));
        }
        let ino = self.next_ino.fetch_add(1, Ordering::Relaxed) + 1;
        listing.push(DirectoryEntry::with_stat(
            name,
            Stat {
                ino,
                mode: libc::S_IFREG as u32 | 0o644,
                nlink: 1,
                ..Stat::default()
            },
        ));
        Ok(())
    }

    /// Remove an entry, shifting later entries down by one position.
    pub fn remove_entry(&self, path: &str, name: &str) -> bool {
        let Some(mut listing) = self.directories.get_mut(path) else {
            return false;
        };
        let before = listing.len();
        listing.retain(|e| e.name != name);
        listing.len() != before
    }

    /// Make the next ReadDir fail with `errno`.
    pub fn fail_next_read_dir(&self, errno: i32) {
        *self.fail_next.lock() = Some(errno);
    }

    /// Number of ReadDir RPCs served or failed.
    pub fn read_dir_calls(&self) -> u64 {
        self.read_dir_calls.load(Ordering::Relaxed)
    }

    /// Offsets of all ReadDir RPCs, in call order.
    pub fn offsets_requested(&self) -> Vec<u64> {
        self.offsets_requested.lock().clone()
    }
}

#[async_trait]
impl Volume for InMemoryVolume {
    async fn read_dir(
        &self,
        _credentials: &UserCredentials,
        path: &str,
        offset: u64,
        count: usize,
        include_stat: bool,
    ) -> Result<Vec<DirectoryEntry>> {
        self.read_dir_calls.fetch_add(1, Ordering::Relaxed);
        self.offsets_requested.lock().push(offset);

        if let Some(errno) = self.fail_next.lock().take() {
            return Err(Error::posix(errno, format!("injected ReadDir failure on {}", path)));
        }

        let listing = self
            .directories
            .get(path)
            .ok_or_else(|| Error::posix(libc::ENOENT, format!("{}: no such directory", path)))?;

        Ok(listing
            .iter()
            .skip(offset as usize)
            .take(count)
            .map(|entry| DirectoryEntry {
                name: entry.name.clone(),
                stat: if include_stat { entry.stat.clone() } else { None },
            })
            .collect())
    }
}
