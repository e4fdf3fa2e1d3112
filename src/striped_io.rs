//! Striped File I/O
//!
//! Drives one request through the full pipeline:
//!
//! ```text
//!  buffer ──▶ translate ──▶ ObjectStore (all objects concurrently) ──▶ process_reads
//! ```
//!
//! Reads fetch every operation the translator emits, parity included, and
//! record failures in a per-operation success bitset instead of aborting.
//! The translator decides whether the lost objects can be repaired.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::metrics::ClientMetrics;
use crate::osd::ObjectStore;
use crate::policy::{primary_policy, PolicyContainer, StripingPolicy, StripingPolicyType};
use crate::translator::{StripeTranslator, TranslatedRead, TranslatorRegistry};

/// A file striped over the OSDs of an [`ObjectStore`].
pub struct StripedFile {
    store: Arc<dyn ObjectStore>,
    translator: Arc<dyn StripeTranslator>,
    policies: Vec<StripingPolicy>,
    metrics: Option<ClientMetrics>,
}

impl std::fmt::Debug for StripedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripedFile")
            .field("policies", &self.policies)
            .finish_non_exhaustive()
    }
}

impl StripedFile {
    /// Bind a file's policies to the translator registered for their type.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        registry: &TranslatorRegistry,
        policies: Vec<StripingPolicy>,
    ) -> Result<Self> {
        let translator = registry.for_policies(&policies)?;
        Ok(Self {
            store,
            translator,
            policies,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: ClientMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn policies(&self) -> &PolicyContainer {
        &self.policies
    }

    /// Smallest read length covering `size` bytes that the layout accepts.
    ///
    /// Erasure-coded reads cover whole lines; RAID0 reads are unconstrained.
    pub fn aligned_read_len(&self, size: usize) -> Result<usize> {
        let policy = primary_policy(&self.policies)?;
        Ok(match policy.policy_type {
            StripingPolicyType::Raid0 => size,
            StripingPolicyType::ErasureCode => size.next_multiple_of(policy.line_size()),
        })
    }

    /// Write `buf` at `offset`. Every object write must succeed.
    #[instrument(skip(self, buf), fields(size = buf.len()))]
    pub async fn write(&self, buf: &[u8], offset: u64) -> Result<usize> {
        let operations = self
            .translator
            .translate_write_request(buf, offset, &self.policies)?;

        let writes = operations.iter().map(|op| {
            self.store
                .write_object(op.osd_offset(), op.object_number, op.req_offset, op.to_bytes())
        });
        let results = join_all(writes).await;

        if let Some(metrics) = &self.metrics {
            metrics.object_writes.inc_by(operations.len() as u64);
        }
        debug!(objects = operations.len(), "Dispatched object writes");

        results.into_iter().collect::<Result<Vec<_>>>()?;
        Ok(buf.len())
    }

    /// Read into `buf` from `offset`, repairing lost objects when the layout
    /// has parity. Returns the number of valid bytes in `buf`.
    #[instrument(skip(self, buf), fields(size = buf.len()))]
    pub async fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let TranslatedRead {
            mut operations,
            required_reads,
        } = self
            .translator
            .translate_read_request(buf, offset, &self.policies)?;

        let reads = operations.iter().map(|op| {
            self.store
                .read_object(op.osd_offset(), op.object_number, op.req_offset, op.req_size)
        });
        let results = join_all(reads).await;

        let mut successful_reads = Vec::with_capacity(operations.len());
        for (op, result) in operations.iter_mut().zip(results) {
            match result {
                Ok(data) => {
                    // Objects shorter than requested are holes; fill() zero-pads.
                    op.fill(&data);
                    successful_reads.push(true);
                }
                Err(e) => {
                    warn!(
                        object_number = op.object_number,
                        osd = op.osd_offset(),
                        error = %e,
                        "Object read failed"
                    );
                    successful_reads.push(false);
                }
            }
        }

        let lost_data = successful_reads[..required_reads]
            .iter()
            .filter(|ok| !**ok)
            .count();
        let lost_total = successful_reads.iter().filter(|ok| !**ok).count();
        debug!(
            objects = operations.len(),
            required_reads, lost_data, "Collected object reads"
        );

        let result = self
            .translator
            .process_reads(operations, &successful_reads, &self.policies);

        if let Some(metrics) = &self.metrics {
            metrics.object_reads.inc_by(successful_reads.len() as u64);
            metrics.failed_object_reads.inc_by(lost_total as u64);
            match &result {
                Ok(_) if lost_data > 0 => metrics.degraded_reads.inc(),
                Err(Error::TooManyErasures { .. }) | Err(Error::ObjectUnavailable { .. }) => {
                    metrics.unrecoverable_reads.inc()
                }
                _ => {}
            }
        }
        result
    }
}
