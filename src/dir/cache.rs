//! Per-handle readdir cache
//!
//! Holds at most one batch of entries between readdir calls on the same
//! open directory. The kernel's filler buffer is usually far smaller than a
//! ReadDir chunk, so most calls are answered from the batch fetched by an
//! earlier call.

use tokio::sync::Mutex;
use tracing::{debug, instrument};

use super::{DirectoryEntry, UserCredentials, Volume};
use crate::error::{Error, Result};

/// Entries returned by one ReadDir RPC. Replaced wholesale, never edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryBatch {
    /// Position of `entries[0]` in the full listing
    pub offset: u64,
    pub entries: Vec<DirectoryEntry>,
    /// Fewer entries than requested came back, so nothing follows
    pub is_final: bool,
}

impl DirectoryBatch {
    pub fn new(offset: u64, entries: Vec<DirectoryEntry>, chunk_size: usize) -> Self {
        let is_final = entries.len() < chunk_size;
        Self {
            offset,
            entries,
            is_final,
        }
    }

    /// Position one past the last entry.
    pub fn end(&self) -> u64 {
        self.offset + self.entries.len() as u64
    }
}

/// Parameters of one readdir call.
#[derive(Debug, Clone, Copy)]
pub struct ReaddirRequest<'a> {
    pub credentials: &'a UserCredentials,
    pub path: &'a str,
    /// Position of the first entry the caller wants
    pub offset: u64,
    /// Entries per ReadDir RPC
    pub chunk_size: usize,
    pub include_stat: bool,
}

/// What a readdir call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaddirOutcome {
    /// Entries the filler accepted
    pub emitted: usize,
    /// A ReadDir RPC was issued
    pub rpc_issued: bool,
    /// A batch is cached for the next call
    pub cached: bool,
}

/// Cached batch of one open directory, serialized by an async mutex.
#[derive(Debug, Default)]
pub struct CachedDirectoryEntries {
    batch: Mutex<Option<DirectoryBatch>>,
}

impl CachedDirectoryEntries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the cached batch, if any.
    pub async fn snapshot(&self) -> Option<DirectoryBatch> {
        self.batch.lock().await.clone()
    }

    /// Feed entries from `request.offset` on to `filler` until it reports
    /// a full buffer (returns `true`) or the batch runs out.
    ///
    /// `filler` receives each entry and the offset the kernel should pass to
    /// resume after it. The lock is held across the RPC, so concurrent calls
    /// on one handle run one after another. On RPC failure nothing stays
    /// cached.
    ///
    /// A drained final chunk stays cached: the kernel's next call lands at
    /// or past its end and is answered without an RPC.
    #[instrument(skip_all, fields(path = request.path, offset = request.offset))]
    pub async fn readdir<F>(
        &self,
        volume: &dyn Volume,
        request: &ReaddirRequest<'_>,
        mut filler: F,
    ) -> Result<ReaddirOutcome>
    where
        F: FnMut(&DirectoryEntry, u64) -> bool,
    {
        if request.chunk_size == 0 {
            return Err(Error::InvalidArgument(
                "readdir chunk size must be greater than 0".to_string(),
            ));
        }

        let offset = request.offset;
        let mut cached = self.batch.lock().await;

        let reusable = match cached.take() {
            Some(batch) if batch.offset <= offset && offset < batch.end() => Some(batch),
            Some(batch) if batch.offset <= offset && batch.is_final => {
                // Past the end of the final chunk: the enumeration is over.
                debug!(end = batch.end(), "Offset past final chunk");
                return Ok(ReaddirOutcome::default());
            }
            _ => None,
        };

        let rpc_issued = reusable.is_none();
        let batch = match reusable {
            Some(batch) => batch,
            None => {
                let entries = volume
                    .read_dir(
                        request.credentials,
                        request.path,
                        offset,
                        request.chunk_size,
                        request.include_stat,
                    )
                    .await?;
                debug!(count = entries.len(), "Fetched directory chunk");
                DirectoryBatch::new(offset, entries, request.chunk_size)
            }
        };

        let start = (offset - batch.offset) as usize;
        let mut filler_called = false;
        let mut emitted = 0;
        for (index, entry) in batch.entries.iter().enumerate().skip(start) {
            filler_called = true;
            if filler(entry, batch.offset + index as u64 + 1) {
                break;
            }
            emitted += 1;
        }

        // Fully read intermediate chunks are never revisited.
        let completely_read = start + emitted == batch.entries.len();
        let keep = filler_called && (batch.is_final || !completely_read);
        debug!(emitted, rpc_issued, keep, "Served readdir");
        if keep {
            *cached = Some(batch);
        }

        Ok(ReaddirOutcome {
            emitted,
            rpc_issued,
            cached: keep,
        })
    }
}
