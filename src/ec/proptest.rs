//! Property-Based Tests for Erasure Coding
//!
//! # Test Properties
//!
//! 1. **Recovery**: any set of at most m lost slots is rebuilt exactly
//! 2. **Determinism**: same line, same parity
//! 3. **Translator shape**: aligned writes emit k+m operations per line and
//!    degraded reads return the written bytes

#![cfg(test)]

use proptest::prelude::*;

use super::{ErasureCodec, ReedSolVanCodec, WordSize, XorCodec};
use crate::policy::StripingPolicy;
use crate::translator::{ReedSolVanTranslator, StripeTranslator};

// =============================================================================
// Property Strategies
// =============================================================================

/// k: 1-6 data stripes, m: 1-3 parity stripes
fn geometry_strategy() -> impl Strategy<Value = (usize, usize)> {
    (1usize..=6, 1usize..=3)
}

/// One line of k random stripes of equal, even length.
fn line_strategy() -> impl Strategy<Value = (usize, usize, Vec<Vec<u8>>)> {
    (geometry_strategy(), 1usize..=64).prop_flat_map(|((k, m), half_len)| {
        let stripe = prop::collection::vec(any::<u8>(), half_len * 2);
        (Just(k), Just(m), prop::collection::vec(stripe, k))
    })
}

/// Distinct slot indices, at most `max` of them.
fn erasure_strategy(slots: usize, max: usize) -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0..slots, 0..=max).prop_map(|mut v| {
        v.sort_unstable();
        v.dedup();
        v
    })
}

fn encode_line(
    codec: &dyn ErasureCodec,
    k: usize,
    m: usize,
    w: WordSize,
    data: &[Vec<u8>],
) -> Result<Vec<Vec<u8>>, crate::error::Error> {
    let refs: Vec<&[u8]> = data.iter().map(|d| d.as_slice()).collect();
    let mut coding = vec![vec![0u8; data[0].len()]; m];
    let mut coding_refs: Vec<&mut [u8]> = coding.iter_mut().map(|c| c.as_mut_slice()).collect();
    codec.encode(k, m, w, &refs, &mut coding_refs)?;
    Ok(coding)
}

// =============================================================================
// Codec Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any erasure pattern within the parity budget is recoverable.
    #[test]
    fn prop_reed_solomon_recovers_erasures(
        (k, m, data) in line_strategy(),
        raw in prop::collection::vec(0usize..9, 0..=3),
        wide in any::<bool>(),
    ) {
        let w = if wide { WordSize::W16 } else { WordSize::W8 };
        let codec = ReedSolVanCodec::new();
        let coding = encode_line(&codec, k, m, w, &data)?;

        let mut erasures: Vec<usize> = raw.into_iter().filter(|&e| e < k + m).collect();
        erasures.sort_unstable();
        erasures.dedup();
        erasures.truncate(m);

        let mut damaged_data = data.clone();
        let mut damaged_coding = coding.clone();
        for &e in &erasures {
            if e < k {
                damaged_data[e].fill(0x5a);
            } else {
                damaged_coding[e - k].fill(0x5a);
            }
        }

        {
            let mut d: Vec<&mut [u8]> = damaged_data.iter_mut().map(|v| v.as_mut_slice()).collect();
            let mut c: Vec<&mut [u8]> = damaged_coding.iter_mut().map(|v| v.as_mut_slice()).collect();
            codec.decode(k, m, w, &mut d, &mut c, &erasures)?;
        }

        prop_assert_eq!(damaged_data, data, "k={} m={} erasures={:?}", k, m, erasures);
        prop_assert_eq!(damaged_coding, coding);
    }

    /// Encoding is a pure function of the line.
    #[test]
    fn prop_encoding_deterministic((k, m, data) in line_strategy()) {
        let first = encode_line(&ReedSolVanCodec::new(), k, m, WordSize::W8, &data)?;
        let second = encode_line(&ReedSolVanCodec::new(), k, m, WordSize::W8, &data)?;
        prop_assert_eq!(first, second);
    }

    /// XOR parity rebuilds any single slot.
    #[test]
    fn prop_xor_recovers_single_slot(
        (k, _m, data) in line_strategy(),
        lost in 0usize..7,
    ) {
        let lost = lost % (k + 1);
        let codec = XorCodec::new();
        let coding = encode_line(&codec, k, 1, WordSize::W8, &data)?;

        let mut damaged_data = data.clone();
        let mut damaged_coding = coding.clone();
        if lost < k {
            damaged_data[lost].fill(0);
        } else {
            damaged_coding[0].fill(0);
        }
        {
            let mut d: Vec<&mut [u8]> = damaged_data.iter_mut().map(|v| v.as_mut_slice()).collect();
            let mut c: Vec<&mut [u8]> = damaged_coding.iter_mut().map(|v| v.as_mut_slice()).collect();
            codec.decode(k, 1, WordSize::W8, &mut d, &mut c, &[lost])?;
        }
        prop_assert_eq!(damaged_data, data);
        prop_assert_eq!(damaged_coding, coding);
    }
}

// =============================================================================
// Translator Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Line-aligned writes produce k+m operations per line and a degraded
    /// read of the same lines returns the written bytes.
    #[test]
    fn prop_translator_degraded_read(
        (k, m) in geometry_strategy(),
        lines in 1usize..=3,
        first_line in 0u64..4,
        seed in any::<u8>(),
        failed in erasure_strategy(9, 3),
    ) {
        let policies = [StripingPolicy::erasure_coded(1, (k + m) as u32, m as u32)];
        let line_size = k * 1024;
        let offset = first_line * line_size as u64;
        let content: Vec<u8> = (0..lines * line_size)
            .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
            .collect();

        let translator = ReedSolVanTranslator::new(ReedSolVanCodec::new(), WordSize::W8);
        let writes = translator.translate_write_request(&content, offset, &policies)?;
        prop_assert_eq!(writes.len(), lines * (k + m));
        prop_assert_eq!(writes.iter().filter(|op| op.is_parity()).count(), lines * m);

        let failed: Vec<usize> = failed.into_iter().filter(|&s| s < k + m).take(m).collect();
        let mut buf = vec![0u8; content.len()];
        let mut read = translator.translate_read_request(&mut buf, offset, &policies)?;
        prop_assert_eq!(read.required_reads, lines * k);

        let ok: Vec<bool> = read
            .operations
            .iter_mut()
            .map(|op| {
                if failed.contains(&op.osd_offset()) {
                    return false;
                }
                let stored = writes
                    .iter()
                    .find(|w| w.object_number == op.object_number && w.osd_offset() == op.osd_offset())
                    .map(|w| w.payload().to_vec())
                    .unwrap_or_default();
                op.fill(&stored);
                true
            })
            .collect();

        let n = translator.process_reads(read.operations, &ok, &policies)?;
        prop_assert_eq!(n, content.len());
        prop_assert_eq!(&buf, &content, "k={} m={} failed={:?}", k, m, failed);
    }
}
