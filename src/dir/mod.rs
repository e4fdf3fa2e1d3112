//! Directory Enumeration
//!
//! Turns paginated `ReadDir(offset, count)` RPCs against a [`Volume`] into
//! the kernel's readdir convention: the kernel calls `readdir(offset)`
//! repeatedly, each call hands entries to a filler until its buffer is
//! full, and a call that emits nothing ends the enumeration.
//!
//! ```text
//!  kernel readdir(off) ──▶ DirectoryReader ──▶ OpenDirectoryTable[handle]
//!                                                   │
//!                                    CachedDirectoryEntries (per handle)
//!                                       │ hit            │ miss
//!                                  cached batch     Volume::read_dir
//! ```
//!
//! Resuming at `offset > 0` after the directory changed may skip or repeat
//! entries. That relaxation is accepted; it is not reported as an error.

mod cache;
mod local;
mod memory;
mod table;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use cache::{CachedDirectoryEntries, DirectoryBatch, ReaddirOutcome, ReaddirRequest};
pub use local::LocalVolume;
pub use memory::InMemoryVolume;
pub use table::{DirectoryReader, OpenDirectory, OpenDirectoryTable};

/// File attributes as returned by the metadata server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    pub ino: u64,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub atime_ns: u64,
    pub mtime_ns: u64,
    pub ctime_ns: u64,
}

/// One directory entry: a name and, if requested, its attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stat: Option<Stat>,
}

impl DirectoryEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stat: None,
        }
    }

    pub fn with_stat(name: impl Into<String>, stat: Stat) -> Self {
        Self {
            name: name.into(),
            stat: Some(stat),
        }
    }
}

/// Identity a request is made on behalf of.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredentials {
    pub username: String,
    pub groups: Vec<String>,
}

impl UserCredentials {
    pub fn new(username: impl Into<String>, groups: Vec<String>) -> Self {
        Self {
            username: username.into(),
            groups,
        }
    }
}

/// Metadata-server view of a volume, as far as enumeration needs it.
#[async_trait]
pub trait Volume: Send + Sync {
    /// Up to `count` entries of `path` starting at position `offset`.
    ///
    /// Fewer than `count` entries means the listing ends inside this chunk.
    /// Failures carry a POSIX errno (`Error::Posix`).
    async fn read_dir(
        &self,
        credentials: &UserCredentials,
        path: &str,
        offset: u64,
        count: usize,
        include_stat: bool,
    ) -> Result<Vec<DirectoryEntry>>;
}
