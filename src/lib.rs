//! XtreemFS Client Core
//!
//! The parts of the XtreemFS client that sit between an OS adapter (FUSE,
//! Dokan) and the servers: striped and erasure-coded object I/O, and the
//! chunked readdir protocol with its per-handle cache.
//!
//! # Architecture
//!
//! ```text
//!             ┌─────────────────── OS adapter ───────────────────┐
//!             │  read / write                      readdir        │
//!             └──────┬───────────────────────────────────┬───────┘
//!                    ▼                                   ▼
//!        StripedFile ─▶ StripeTranslator        DirectoryReader
//!            │           (RAID0 / EC + codec)        │
//!            ▼                                       ▼
//!        ObjectStore (OSDs)                      Volume (MRC)
//! ```
//!
//! # Modules
//!
//! - [`policy`] - Striping policy model
//! - [`translator`] - Byte-range to per-object operation translation
//! - [`ec`] - Erasure codecs (Reed-Solomon-Vandermonde, XOR)
//! - [`osd`] - Object store port and adapters
//! - [`striped_io`] - Translate, dispatch and repair pipeline
//! - [`dir`] - Chunked readdir with per-handle caching
//! - [`config`] - Client options
//! - [`metrics`] - Prometheus counters
//! - [`error`] - Error types

pub mod config;
pub mod dir;
pub mod ec;
pub mod error;
pub mod metrics;
pub mod osd;
pub mod policy;
pub mod striped_io;
pub mod translator;

// Re-export commonly used types
pub use config::ClientOptions;
pub use dir::{CachedDirectoryEntries, DirectoryEntry, DirectoryReader, UserCredentials, Volume};
pub use ec::{ErasureCodec, ReedSolVanCodec, WordSize, XorCodec};
pub use error::{Error, Result};
pub use metrics::ClientMetrics;
pub use osd::ObjectStore;
pub use policy::{PolicyContainer, StripingPolicy, StripingPolicyType};
pub use striped_io::StripedFile;
pub use translator::{
    ErasureCodedTranslator, Raid0Translator, ReadOperation, ReedSolVanTranslator, StripeTranslator,
    TranslatorRegistry, WriteOperation,
};
