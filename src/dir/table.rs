//! Open directory handles
//!
//! `opendir` hands out a numeric handle (the value an OS adapter stores in
//! its file-info slot); `readdir` and `releasedir` look it up again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, instrument};

use super::{CachedDirectoryEntries, DirectoryEntry, ReaddirOutcome, ReaddirRequest, UserCredentials, Volume};
use crate::config::ClientOptions;
use crate::error::{Error, Result};
use crate::metrics::ClientMetrics;

/// State of one open directory.
#[derive(Debug)]
pub struct OpenDirectory {
    pub path: String,
    pub cache: CachedDirectoryEntries,
}

#[derive(Debug)]
pub struct OpenDirectoryTable {
    next_handle: AtomicU64,
    open: DashMap<u64, Arc<OpenDirectory>>,
}

impl Default for OpenDirectoryTable {
    fn default() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            open: DashMap::new(),
        }
    }
}

impl OpenDirectoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a directory with an empty cache and return its handle.
    pub fn open(&self, path: &str) -> u64 {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.open.insert(
            handle,
            Arc::new(OpenDirectory {
                path: path.to_string(),
                cache: CachedDirectoryEntries::new(),
            }),
        );
        handle
    }

    pub fn get(&self, handle: u64) -> Result<Arc<OpenDirectory>> {
        self.open
            .get(&handle)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(Error::UnknownDirectoryHandle(handle))
    }

    /// Forget a handle; its cached batch goes with it.
    pub fn release(&self, handle: u64) -> Result<()> {
        self.open
            .remove(&handle)
            .map(|_| ())
            .ok_or(Error::UnknownDirectoryHandle(handle))
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

/// The readdir side of an OS adapter: a volume, its open handles and the
/// enumeration options.
pub struct DirectoryReader {
    volume: Arc<dyn Volume>,
    table: OpenDirectoryTable,
    options: ClientOptions,
    metrics: Option<ClientMetrics>,
}

impl std::fmt::Debug for DirectoryReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryReader")
            .field("open_handles", &self.table.len())
            .field("options", &self.options)
            .finish()
    }
}

impl DirectoryReader {
    pub fn new(volume: Arc<dyn Volume>, options: ClientOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            volume,
            table: OpenDirectoryTable::new(),
            options,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: ClientMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn table(&self) -> &OpenDirectoryTable {
        &self.table
    }

    pub fn opendir(&self, path: &str) -> u64 {
        let handle = self.table.open(path);
        debug!(path, handle, "Opened directory");
        handle
    }

    /// One kernel readdir call on an open handle.
    #[instrument(skip(self, credentials, filler))]
    pub async fn readdir<F>(
        &self,
        handle: u64,
        credentials: &UserCredentials,
        offset: u64,
        filler: F,
    ) -> Result<ReaddirOutcome>
    where
        F: FnMut(&DirectoryEntry, u64) -> bool,
    {
        let directory = self.table.get(handle)?;
        let request = ReaddirRequest {
            credentials,
            path: &directory.path,
            offset,
            chunk_size: self.options.readdir_chunk_size,
            include_stat: self.options.include_stat_in_readdir,
        };
        let outcome = directory
            .cache
            .readdir(self.volume.as_ref(), &request, filler)
            .await?;

        if let Some(metrics) = &self.metrics {
            if outcome.rpc_issued {
                metrics.readdir_rpcs.inc();
            } else {
                metrics.readdir_cache_hits.inc();
            }
        }
        Ok(outcome)
    }

    pub fn releasedir(&self, handle: u64) -> Result<()> {
        self.table.release(handle)?;
        debug!(handle, "Released directory");
        Ok(())
    }

    /// Enumerate a whole directory the way the kernel does: repeated
    /// readdir calls, each accepting at most `entries_per_call` entries,
    /// until a call emits nothing.
    pub async fn list(
        &self,
        credentials: &UserCredentials,
        path: &str,
        entries_per_call: usize,
    ) -> Result<Vec<DirectoryEntry>> {
        if entries_per_call == 0 {
            return Err(Error::InvalidArgument(
                "entries_per_call must be greater than 0".to_string(),
            ));
        }

        let handle = self.opendir(path);
        let mut entries = Vec::new();
        let mut offset = 0;
        let result = loop {
            let mut accepted = 0;
            let outcome = self
                .readdir(handle, credentials, offset, |entry, next| {
                    if accepted == entries_per_call {
                        return true;
                    }
                    accepted += 1;
                    offset = next;
                    entries.push(entry.clone());
                    false
                })
                .await;
            match outcome {
                Ok(outcome) if outcome.emitted == 0 => break Ok(()),
                Ok(_) => {}
                Err(e) => break Err(e),
            }
        };

        self.releasedir(handle)?;
        result.map(|_| entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dir::InMemoryVolume;
    use assert_matches::assert_matches;

    #[test]
    fn test_table_handles() {
        let table = OpenDirectoryTable::new();
        let a = table.open("/a");
        let b = table.open("/b");
        assert_ne!(a, b);
        assert_eq!(table.get(b).unwrap().path, "/b");

        table.release(a).unwrap();
        assert_matches!(table.get(a), Err(Error::UnknownDirectoryHandle(h)) if h == a);
        assert_matches!(table.release(a), Err(Error::UnknownDirectoryHandle(_)));
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_list_counts_rpcs_and_hits() {
        let volume = Arc::new(InMemoryVolume::new());
        volume.create_directory("/d");
        for i in 0..7 {
            volume.create_entry("/d", &format!("e{}", i)).unwrap();
        }
        let options = ClientOptions {
            readdir_chunk_size: 5,
            ..ClientOptions::default()
        };
        let metrics = ClientMetrics::new().unwrap();
        let reader = DirectoryReader::new(volume.clone(), options)
            .unwrap()
            .with_metrics(metrics.clone());

        let entries = reader
            .list(&UserCredentials::default(), "/d", 2)
            .await
            .unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["e0", "e1", "e2", "e3", "e4", "e5", "e6"]);
        assert!(entries[0].stat.is_some());

        // Calls at 0 (rpc), 2 (hit), 4 (hit), 5 (rpc, final chunk), 7 (hit, end).
        assert_eq!(volume.offsets_requested(), vec![0, 5]);
        assert_eq!(metrics.readdir_rpcs.get(), 2);
        assert_eq!(metrics.readdir_cache_hits.get(), 3);
        assert!(reader.table().is_empty());
    }

    #[tokio::test]
    async fn test_readdir_unknown_handle() {
        let reader =
            DirectoryReader::new(Arc::new(InMemoryVolume::new()), ClientOptions::default()).unwrap();
        let result = reader
            .readdir(42, &UserCredentials::default(), 0, |_, _| false)
            .await;
        assert_matches!(result, Err(Error::UnknownDirectoryHandle(42)));
        assert_eq!(result.unwrap_err().errno(), libc::EBADF);
    }
}
