//! In-memory object store

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tracing::debug;

use super::{ObjectStore, ObjectStoreStats, OfflineOsds};
use crate::error::Result;

/// Objects kept in a sharded map keyed by `(osd, object_number)`.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: DashMap<(usize, u64), Vec<u8>>,
    offline: OfflineOsds,
    bytes_written: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    failed_requests: AtomicU64,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Failure injection: requests against `osd` fail until it is brought back.
    pub fn fail_osd(&self, osd: usize) {
        self.offline.mark_offline(osd);
    }

    pub fn recover_osd(&self, osd: usize) {
        self.offline.mark_online(osd);
    }

    /// Stored contents of one object.
    pub fn object(&self, osd: usize, object_number: u64) -> Option<Vec<u8>> {
        self.objects.get(&(osd, object_number)).map(|o| o.value().clone())
    }

    fn check_online(&self, osd: usize, object_number: u64) -> Result<()> {
        self.offline.check(osd, object_number).inspect_err(|_| {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        })
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn write_object(&self, osd: usize, object_number: u64, offset: usize, data: Bytes) -> Result<()> {
        self.check_online(osd, object_number)?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written
            .fetch_add(data.len() as u64, Ordering::Relaxed);

        let mut object = self.objects.entry((osd, object_number)).or_default();
        let end = offset + data.len();
        if object.len() < end {
            object.resize(end, 0);
        }
        object[offset..end].copy_from_slice(&data);
        debug!(osd, object_number, offset, len = data.len(), "Stored object");
        Ok(())
    }

    async fn read_object(&self, osd: usize, object_number: u64, offset: usize, length: usize) -> Result<Bytes> {
        self.check_online(osd, object_number)?;
        self.reads.fetch_add(1, Ordering::Relaxed);

        let Some(object) = self.objects.get(&(osd, object_number)) else {
            return Ok(Bytes::new());
        };
        if offset >= object.len() {
            return Ok(Bytes::new());
        }
        let end = (offset + length).min(object.len());
        Ok(Bytes::copy_from_slice(&object[offset..end]))
    }

    fn stats(&self) -> ObjectStoreStats {
        ObjectStoreStats {
            object_count: self.objects.len() as u64,
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
        }
    }
}
