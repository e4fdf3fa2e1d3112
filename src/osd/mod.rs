//! Object Storage Devices
//!
//! The port through which per-object operations reach storage. An OSD is
//! addressed by its slot within a line (`0..width`), an object by its
//! number within the file.
//!
//! Adapters:
//! - [`InMemoryObjectStore`]: process-local, for tests and simulations
//! - [`LocalObjectStore`]: one directory per OSD on a local filesystem

mod local;
mod memory;

use std::collections::HashSet;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::{Error, Result};

pub use local::LocalObjectStore;
pub use memory::InMemoryObjectStore;

/// Object store counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectStoreStats {
    /// Objects currently stored
    pub object_count: u64,
    /// Bytes accepted by writes
    pub bytes_written: u64,
    /// Read requests served
    pub reads: u64,
    /// Write requests served
    pub writes: u64,
    /// Requests rejected because the OSD was offline
    pub failed_requests: u64,
}

/// Per-object storage, one namespace per OSD slot.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `data` at byte `offset` of an object, extending it with zeros
    /// if the offset lies past its end.
    async fn write_object(&self, osd: usize, object_number: u64, offset: usize, data: Bytes) -> Result<()>;

    /// Read up to `length` bytes from byte `offset` of an object.
    ///
    /// Returns fewer bytes when the object is shorter, and nothing for an
    /// object that was never written. Callers treat the missing tail as
    /// zeros.
    async fn read_object(&self, osd: usize, object_number: u64, offset: usize, length: usize) -> Result<Bytes>;

    /// Get store statistics
    fn stats(&self) -> ObjectStoreStats;
}

/// Set of OSD slots that reject every request.
#[derive(Debug, Default)]
pub struct OfflineOsds {
    slots: RwLock<HashSet<usize>>,
}

impl OfflineOsds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_offline(&self, osd: usize) {
        self.slots.write().insert(osd);
    }

    pub fn mark_online(&self, osd: usize) {
        self.slots.write().remove(&osd);
    }

    pub fn is_offline(&self, osd: usize) -> bool {
        self.slots.read().contains(&osd)
    }

    /// Error for a request against an offline OSD, `Ok` otherwise.
    pub fn check(&self, osd: usize, object_number: u64) -> Result<()> {
        if self.is_offline(osd) {
            return Err(Error::ObjectUnavailable {
                object_number,
                osd_offset: osd,
            });
        }
        Ok(())
    }
}
