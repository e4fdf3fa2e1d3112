//! RAID0 translator: plain striping over `width` OSDs.
//!
//! Object `o` lives on OSD slot `o % width`. Requests may start and end
//! anywhere inside an object.

use tracing::{debug, instrument};

use super::{ReadOperation, StripeTranslator, TranslatedRead, WriteOperation};
use crate::error::{Error, Result};
use crate::policy::{primary_policy, PolicyContainer};

#[derive(Debug, Default, Clone, Copy)]
pub struct Raid0Translator;

impl Raid0Translator {
    pub fn new() -> Self {
        Self
    }
}

/// `(object_number, osd_slot, req_offset, len)` for each object a range touches.
fn object_ranges(offset: u64, size: usize, stripe_size: usize, width: usize) -> Vec<(u64, usize, usize, usize)> {
    let stripe = stripe_size as u64;
    let mut ranges = Vec::new();
    let mut object_number = offset / stripe;
    let mut req_offset = (offset % stripe) as usize;
    let mut remaining = size;

    while remaining > 0 {
        let len = (stripe_size - req_offset).min(remaining);
        let osd = (object_number % width as u64) as usize;
        ranges.push((object_number, osd, req_offset, len));
        remaining -= len;
        object_number += 1;
        req_offset = 0;
    }
    ranges
}

impl StripeTranslator for Raid0Translator {
    #[instrument(skip(self, buf, policies), fields(size = buf.len()))]
    fn translate_write_request<'a>(
        &self,
        buf: &'a [u8],
        offset: u64,
        policies: &PolicyContainer,
    ) -> Result<Vec<WriteOperation<'a>>> {
        let policy = primary_policy(policies)?;
        let mut rest = buf;
        let operations = object_ranges(offset, buf.len(), policy.stripe_size_bytes(), policy.width())
            .into_iter()
            .map(|(object_number, osd, req_offset, len)| {
                let (head, tail) = rest.split_at(len);
                rest = tail;
                WriteOperation::data(object_number, osd, req_offset, head)
            })
            .collect::<Vec<_>>();

        debug!("Write covers {} objects", operations.len());
        Ok(operations)
    }

    #[instrument(skip(self, buf, policies), fields(size = buf.len()))]
    fn translate_read_request<'a>(
        &self,
        buf: &'a mut [u8],
        offset: u64,
        policies: &PolicyContainer,
    ) -> Result<TranslatedRead<'a>> {
        let policy = primary_policy(policies)?;
        let ranges = object_ranges(offset, buf.len(), policy.stripe_size_bytes(), policy.width());
        let mut operations = Vec::with_capacity(ranges.len());
        let mut rest = buf;

        for (object_number, osd, req_offset, len) in ranges {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(len);
            rest = tail;
            operations.push(ReadOperation::data(object_number, osd, req_offset, head));
        }

        debug!("Read covers {} objects", operations.len());
        let required_reads = operations.len();
        Ok(TranslatedRead {
            operations,
            required_reads,
        })
    }

    fn process_reads(
        &self,
        operations: Vec<ReadOperation<'_>>,
        successful_reads: &[bool],
        _policies: &PolicyContainer,
    ) -> Result<usize> {
        if successful_reads.len() != operations.len() {
            return Err(Error::InvalidArgument(format!(
                "{} read results for {} operations",
                successful_reads.len(),
                operations.len()
            )));
        }

        // Without parity any lost object is lost data.
        if let Some(failed) = operations
            .iter()
            .zip(successful_reads)
            .find_map(|(op, ok)| (!ok).then_some(op))
        {
            return Err(Error::ObjectUnavailable {
                object_number: failed.object_number,
                osd_offset: failed.osd_offset(),
            });
        }

        Ok(operations.iter().map(|op| op.req_size).sum())
    }
}
