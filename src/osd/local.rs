//! Local-directory object store
//!
//! Layout: `<root>/osd-<slot>/<object_number as 16 hex digits>`.

use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

use super::{ObjectStore, ObjectStoreStats, OfflineOsds};
use crate::error::Result;

#[derive(Debug)]
pub struct LocalObjectStore {
    root: PathBuf,
    offline: OfflineOsds,
    objects_created: AtomicU64,
    bytes_written: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    failed_requests: AtomicU64,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            offline: OfflineOsds::new(),
            objects_created: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
        }
    }

    /// Remove every OSD directory under the root, so a new file can be
    /// striped without leftovers of an earlier one.
    pub async fn clear(&self) -> Result<()> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let is_osd = entry.file_name().to_string_lossy().starts_with("osd-");
            if is_osd && entry.file_type().await?.is_dir() {
                fs::remove_dir_all(entry.path()).await?;
                debug!(path = %entry.path().display(), "Removed OSD directory");
            }
        }
        Ok(())
    }

    /// Treat an OSD directory as unreachable.
    pub fn mark_offline(&self, osd: usize) {
        self.offline.mark_offline(osd);
    }

    fn osd_dir(&self, osd: usize) -> PathBuf {
        self.root.join(format!("osd-{}", osd))
    }

    fn object_path(&self, osd: usize, object_number: u64) -> PathBuf {
        self.osd_dir(osd).join(format!("{:016x}", object_number))
    }

    fn check_online(&self, osd: usize, object_number: u64) -> Result<()> {
        self.offline.check(osd, object_number).inspect_err(|_| {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        })
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn write_object(&self, osd: usize, object_number: u64, offset: usize, data: Bytes) -> Result<()> {
        self.check_online(osd, object_number)?;

        fs::create_dir_all(self.osd_dir(osd)).await?;
        let path = self.object_path(osd, object_number);
        let existed = fs::try_exists(&path).await?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await?;
        file.seek(SeekFrom::Start(offset as u64)).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        if !existed {
            self.objects_created.fetch_add(1, Ordering::Relaxed);
        }
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written
            .fetch_add(data.len() as u64, Ordering::Relaxed);
        debug!(path = %path.display(), offset, len = data.len(), "Wrote object");
        Ok(())
    }

    async fn read_object(&self, osd: usize, object_number: u64, offset: usize, length: usize) -> Result<Bytes> {
        self.check_online(osd, object_number)?;
        self.reads.fetch_add(1, Ordering::Relaxed);

        let path = self.object_path(osd, object_number);
        let mut file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Bytes::new()),
            Err(e) => return Err(e.into()),
        };

        file.seek(SeekFrom::Start(offset as u64)).await?;
        let mut buf = Vec::with_capacity(length);
        file.take(length as u64).read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    fn stats(&self) -> ObjectStoreStats {
        ObjectStoreStats {
            object_count: self.objects_created.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
        }
    }
}
