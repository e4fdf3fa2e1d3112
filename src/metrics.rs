//! Client Metrics
//!
//! Prometheus counters for the striping pipeline and the readdir cache.
//! Each [`ClientMetrics`] owns its registry so several clients (or tests)
//! can coexist in one process.

use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

use crate::error::{Error, Result};

/// Counters exported by the client core.
#[derive(Clone)]
pub struct ClientMetrics {
    registry: Registry,
    /// Object reads dispatched to OSDs (data and parity)
    pub object_reads: IntCounter,
    /// Object writes dispatched to OSDs (data and parity)
    pub object_writes: IntCounter,
    /// Object reads that failed and were handed to decoding
    pub failed_object_reads: IntCounter,
    /// Reads that needed erasure decoding and succeeded
    pub degraded_reads: IntCounter,
    /// Reads that lost more objects than parity could repair
    pub unrecoverable_reads: IntCounter,
    /// ReadDir RPCs issued to the metadata server
    pub readdir_rpcs: IntCounter,
    /// readdir calls answered from the cached batch
    pub readdir_cache_hits: IntCounter,
}

impl std::fmt::Debug for ClientMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientMetrics")
            .field("object_reads", &self.object_reads.get())
            .field("object_writes", &self.object_writes.get())
            .field("degraded_reads", &self.degraded_reads.get())
            .field("readdir_rpcs", &self.readdir_rpcs.get())
            .finish()
    }
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter> {
    let counter = IntCounter::new(name, help)
        .map_err(|e| Error::Internal(format!("Failed to create metric {}: {}", name, e)))?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(|e| Error::Internal(format!("Failed to register metric {}: {}", name, e)))?;
    Ok(counter)
}

impl ClientMetrics {
    /// Create the counters in a fresh registry.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        Ok(Self {
            object_reads: counter(&registry, "xtfs_object_reads_total", "Object reads dispatched to OSDs")?,
            object_writes: counter(&registry, "xtfs_object_writes_total", "Object writes dispatched to OSDs")?,
            failed_object_reads: counter(
                &registry,
                "xtfs_failed_object_reads_total",
                "Object reads that failed",
            )?,
            degraded_reads: counter(
                &registry,
                "xtfs_degraded_reads_total",
                "Reads repaired by erasure decoding",
            )?,
            unrecoverable_reads: counter(
                &registry,
                "xtfs_unrecoverable_reads_total",
                "Reads with more lost objects than parity",
            )?,
            readdir_rpcs: counter(&registry, "xtfs_readdir_rpcs_total", "ReadDir RPCs issued")?,
            readdir_cache_hits: counter(
                &registry,
                "xtfs_readdir_cache_hits_total",
                "readdir calls served from the cached batch",
            )?,
            registry,
        })
    }

    /// Render all counters in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| Error::Internal(format!("Failed to encode metrics: {}", e)))?;
        String::from_utf8(buffer).map_err(|e| Error::Internal(format!("Metrics are not UTF-8: {}", e)))
    }
}
