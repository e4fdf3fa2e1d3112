//! Erasure-coded striping
//!
//! A line is k data stripes on OSD slots `0..k` followed by m parity stripes
//! on slots `k..k+m`, all `stripe_size` bytes. Requests start on a line
//! boundary. Reads cover whole lines; a write may end inside its last line,
//! in which case the missing tail of that line is encoded as zeros.
//!
//! ```text
//!            slot 0    slot 1   ...  slot k-1 │ slot k  ...  slot k+m-1
//! line 0   │ obj 0   │ obj 1   │ ... │ obj k-1 │ P0(0)  │ ... │ Pm-1(0) │
//! line 1   │ obj k   │ obj k+1 │ ... │ obj 2k-1│ P0(k)  │ ... │ Pm-1(k) │
//! ```
//!
//! Parity objects carry the object number of the first data object of
//! their line.
//!
//! Reads always fetch parity as well so a failed data object can be rebuilt
//! without a second round trip.

use bytes::BytesMut;
use tracing::{debug, error, instrument, warn};

use super::{ReadOperation, StripeTranslator, TranslatedRead, WriteOperation};
use crate::ec::{ErasureCodec, ReedSolVanCodec, WordSize};
use crate::error::{Error, Result};
use crate::policy::{primary_policy, PolicyContainer, StripingPolicy};

/// Erasure-coded translator backed by Reed-Solomon-Vandermonde.
pub type ReedSolVanTranslator = ErasureCodedTranslator<ReedSolVanCodec>;

/// Striping translator with systematic parity, generic over the codec.
#[derive(Debug)]
pub struct ErasureCodedTranslator<C> {
    codec: C,
    word_size: WordSize,
}

/// Line layout derived from a policy.
#[derive(Debug, Clone, Copy)]
struct Layout {
    k: usize,
    m: usize,
    stripe_size: usize,
}

impl Layout {
    fn of(policy: &StripingPolicy) -> Self {
        Self {
            k: policy.data_width(),
            m: policy.parity_width(),
            stripe_size: policy.stripe_size_bytes(),
        }
    }

    fn line_size(&self) -> usize {
        self.k * self.stripe_size
    }

    /// Object number of the first object at a line-aligned offset.
    fn first_object(&self, offset: u64) -> Result<u64> {
        if offset % self.line_size() as u64 != 0 {
            return Err(Error::InvalidArgument(format!(
                "offset {} is not aligned to the line size {}",
                offset,
                self.line_size()
            )));
        }
        Ok(offset / self.stripe_size as u64)
    }
}

impl<C: ErasureCodec> ErasureCodedTranslator<C> {
    pub fn new(codec: C, word_size: WordSize) -> Self {
        Self { codec, word_size }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn word_size(&self) -> WordSize {
        self.word_size
    }

    fn layout(&self, policies: &PolicyContainer) -> Result<Layout> {
        let policy = primary_policy(policies)?;
        if policy.parity_width() == 0 {
            return Err(Error::InvalidPolicy(
                "erasure-coded striping needs at least one parity OSD".to_string(),
            ));
        }
        Ok(Layout::of(policy))
    }

    /// Encode one (possibly short) line into its parity stripes.
    fn encode_line(&self, layout: Layout, line: &[u8], parity: &mut [u8]) -> Result<()> {
        let mut coding: Vec<&mut [u8]> = parity.chunks_mut(layout.stripe_size).collect();

        if line.len() == layout.line_size() {
            let data: Vec<&[u8]> = line.chunks(layout.stripe_size).collect();
            return self
                .codec
                .encode(layout.k, layout.m, self.word_size, &data, &mut coding);
        }

        // Objects past the end of the write are encoded as zeros.
        let mut padded = vec![0u8; layout.line_size()];
        padded[..line.len()].copy_from_slice(line);
        let data: Vec<&[u8]> = padded.chunks(layout.stripe_size).collect();
        self.codec
            .encode(layout.k, layout.m, self.word_size, &data, &mut coding)
    }
}

impl<C: ErasureCodec> StripeTranslator for ErasureCodedTranslator<C> {
    #[instrument(skip(self, buf, policies), fields(size = buf.len(), codec = self.codec.name()))]
    fn translate_write_request<'a>(
        &self,
        buf: &'a [u8],
        offset: u64,
        policies: &PolicyContainer,
    ) -> Result<Vec<WriteOperation<'a>>> {
        let layout = self.layout(policies)?;
        let first_object = layout.first_object(offset)?;
        if buf.is_empty() {
            return Ok(Vec::new());
        }

        let Layout { k, m, stripe_size } = layout;
        let line_size = layout.line_size();
        let lines = buf.len().div_ceil(line_size);
        debug!(lines, first_object, "Translating write");

        let mut arena = BytesMut::zeroed(lines * m * stripe_size);
        for (line, parity) in buf.chunks(line_size).zip(arena.chunks_mut(m * stripe_size)) {
            self.encode_line(layout, line, parity)?;
        }
        let parity = arena.freeze();

        let mut operations = Vec::with_capacity(lines * (k + m));
        for (l, line) in buf.chunks(line_size).enumerate() {
            let line_object = first_object + (l * k) as u64;

            for (i, object) in line.chunks(stripe_size).enumerate() {
                operations.push(WriteOperation::data(line_object + i as u64, i, 0, object));
            }

            // A line holding a single short object gets equally short parity,
            // so the file size can be derived from any object of the line.
            let coding_size = line.len().min(stripe_size);
            for i in 0..m {
                let start = (l * m + i) * stripe_size;
                operations.push(WriteOperation::parity(
                    line_object,
                    k + i,
                    parity.slice(start..start + coding_size),
                ));
            }
        }

        Ok(operations)
    }

    #[instrument(skip(self, buf, policies), fields(size = buf.len(), codec = self.codec.name()))]
    fn translate_read_request<'a>(
        &self,
        buf: &'a mut [u8],
        offset: u64,
        policies: &PolicyContainer,
    ) -> Result<TranslatedRead<'a>> {
        let layout = self.layout(policies)?;
        let first_object = layout.first_object(offset)?;
        let Layout { k, m, stripe_size } = layout;

        if buf.len() % layout.line_size() != 0 {
            return Err(Error::InvalidArgument(format!(
                "read size {} is not a multiple of the line size {}",
                buf.len(),
                layout.line_size()
            )));
        }
        let lines = buf.len() / layout.line_size();
        debug!(lines, first_object, "Translating read");

        let mut operations = Vec::with_capacity(lines * (k + m));
        for (i, object) in buf.chunks_mut(stripe_size).enumerate() {
            operations.push(ReadOperation::data(first_object + i as u64, i % k, 0, object));
        }

        // One staging allocation for every parity stripe of the request.
        let mut arena = BytesMut::zeroed(lines * m * stripe_size);
        for l in 0..lines {
            let line_object = first_object + (l * k) as u64;
            for i in 0..m {
                let staging = arena.split_to(stripe_size);
                operations.push(ReadOperation::parity(line_object, k + i, staging));
            }
        }

        Ok(TranslatedRead {
            operations,
            required_reads: lines * k,
        })
    }

    #[instrument(skip_all, fields(operations = operations.len()))]
    fn process_reads(
        &self,
        mut operations: Vec<ReadOperation<'_>>,
        successful_reads: &[bool],
        policies: &PolicyContainer,
    ) -> Result<usize> {
        let layout = self.layout(policies)?;
        let Layout { k, m, stripe_size } = layout;

        if successful_reads.len() != operations.len() {
            return Err(Error::InvalidArgument(format!(
                "{} read results for {} operations",
                successful_reads.len(),
                operations.len()
            )));
        }
        if operations.len() % (k + m) != 0 {
            return Err(Error::InvalidArgument(format!(
                "{} operations do not form whole lines of {} objects",
                operations.len(),
                k + m
            )));
        }

        let lines = operations.len() / (k + m);
        let data_count = lines * k;
        let well_formed = operations
            .iter()
            .enumerate()
            .all(|(i, op)| op.is_parity() == (i >= data_count) && op.req_size == stripe_size);
        if !well_formed {
            return Err(Error::InvalidArgument(
                "operations were not produced by an erasure-coded read translation".to_string(),
            ));
        }

        let (data_ok, parity_ok) = successful_reads.split_at(data_count);
        if data_ok.iter().all(|&ok| ok) {
            // Parity staging is dropped with the operations.
            debug!("All data objects read, no decoding needed");
            return Ok(data_count * stripe_size);
        }

        let (data_ops, parity_ops) = operations.split_at_mut(data_count);

        // Check every line before touching any buffer.
        let mut degraded = Vec::new();
        for l in 0..lines {
            let erasures: Vec<usize> = data_ok[l * k..(l + 1) * k]
                .iter()
                .enumerate()
                .filter(|(_, ok)| !**ok)
                .map(|(i, _)| i)
                .chain(
                    parity_ok[l * m..(l + 1) * m]
                        .iter()
                        .enumerate()
                        .filter(|(_, ok)| !**ok)
                        .map(|(i, _)| k + i),
                )
                .collect();

            if !erasures.iter().any(|&slot| slot < k) {
                continue;
            }

            let line_number = data_ops[l * k].object_number / k as u64;
            if erasures.len() > m {
                error!(
                    line = line_number,
                    ?erasures,
                    "Line lost more stripes than it has parity"
                );
                return Err(Error::TooManyErasures {
                    line: line_number,
                    erasures: erasures.len(),
                    parity_width: m,
                });
            }
            degraded.push((l, line_number, erasures));
        }

        for (l, line_number, erasures) in degraded {
            warn!(line = line_number, ?erasures, "Degraded read, decoding line");
            let mut data: Vec<&mut [u8]> = data_ops[l * k..(l + 1) * k]
                .iter_mut()
                .map(|op| op.buffer_mut())
                .collect();
            let mut coding: Vec<&mut [u8]> = parity_ops[l * m..(l + 1) * m]
                .iter_mut()
                .map(|op| op.buffer_mut())
                .collect();
            self.codec
                .decode(k, m, self.word_size, &mut data, &mut coding, &erasures)?;
        }

        Ok(data_count * stripe_size)
    }
}

// =============================================================================
// Tests
// =============================================================================
