//! Reed-Solomon-Vandermonde Codec
//!
//! Implements [`ErasureCodec`] using the `reed-solomon-erasure` crate, whose
//! systematic generator matrix is derived from a Vandermonde matrix.
//! Building a codec for a geometry inverts that matrix, so codecs are built
//! once per `(k, m)` and word size and shared afterwards.

use std::sync::Arc;

use dashmap::DashMap;
use reed_solomon_erasure::{galois_16, galois_8};
use tracing::{debug, instrument};

use super::{check_erasures, check_line, ErasureCodec, WordSize};
use crate::error::{Error, Result};

// =============================================================================
// Codec
// =============================================================================

/// Reed-Solomon-Vandermonde erasure codec with memoized generator matrices.
#[derive(Default)]
pub struct ReedSolVanCodec {
    /// GF(2^8) codecs keyed by (k, m)
    gf8: DashMap<(usize, usize), Arc<galois_8::ReedSolomon>>,
    /// GF(2^16) codecs keyed by (k, m)
    gf16: DashMap<(usize, usize), Arc<galois_16::ReedSolomon>>,
}

impl std::fmt::Debug for ReedSolVanCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReedSolVanCodec")
            .field("cached_gf8", &self.gf8.len())
            .field("cached_gf16", &self.gf16.len())
            .finish()
    }
}

impl ReedSolVanCodec {
    /// Create a codec with an empty matrix cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of geometries with a memoized generator matrix.
    pub fn cached_geometries(&self) -> usize {
        self.gf8.len() + self.gf16.len()
    }

    fn gf8(&self, k: usize, m: usize) -> Result<Arc<galois_8::ReedSolomon>> {
        if let Some(rs) = self.gf8.get(&(k, m)) {
            return Ok(Arc::clone(rs.value()));
        }
        let rs = galois_8::ReedSolomon::new(k, m).map_err(|e| {
            Error::InvalidEcConfig(format!("Failed to create Reed-Solomon codec: {}", e))
        })?;
        debug!(k, m, "Built GF(2^8) generator matrix");
        let rs = Arc::new(rs);
        self.gf8.insert((k, m), Arc::clone(&rs));
        Ok(rs)
    }

    fn gf16(&self, k: usize, m: usize) -> Result<Arc<galois_16::ReedSolomon>> {
        if let Some(rs) = self.gf16.get(&(k, m)) {
            return Ok(Arc::clone(rs.value()));
        }
        let rs = galois_16::ReedSolomon::new(k, m).map_err(|e| {
            Error::InvalidEcConfig(format!("Failed to create Reed-Solomon codec: {}", e))
        })?;
        debug!(k, m, "Built GF(2^16) generator matrix");
        let rs = Arc::new(rs);
        self.gf16.insert((k, m), Arc::clone(&rs));
        Ok(rs)
    }
}

/// Reinterpret a byte stripe as GF(2^16) words.
fn to_words(bytes: &[u8]) -> Vec<[u8; 2]> {
    bytes.chunks_exact(2).map(|w| [w[0], w[1]]).collect()
}

fn from_words(words: &[[u8; 2]], out: &mut [u8]) {
    for (dst, word) in out.chunks_exact_mut(2).zip(words) {
        dst.copy_from_slice(word);
    }
}

fn check_word_alignment(w: WordSize, stripe_len: usize) -> Result<()> {
    if w == WordSize::W16 && stripe_len % 2 != 0 {
        return Err(Error::InvalidEcConfig(format!(
            "stripe length {} is not a multiple of the 16 bit word size",
            stripe_len
        )));
    }
    Ok(())
}

impl ErasureCodec for ReedSolVanCodec {
    fn name(&self) -> &'static str {
        "reed-sol-van"
    }

    #[instrument(skip(self, data, coding))]
    fn encode(
        &self,
        k: usize,
        m: usize,
        w: WordSize,
        data: &[&[u8]],
        coding: &mut [&mut [u8]],
    ) -> Result<()> {
        let stripe_len = check_line(k, m, data, coding)?;
        check_word_alignment(w, stripe_len)?;

        match w {
            WordSize::W8 => {
                self.gf8(k, m)?.encode_sep(data, coding).map_err(|e| {
                    Error::EcEncodingFailed(format!("Reed-Solomon encoding failed: {}", e))
                })?;
            }
            WordSize::W16 => {
                let words: Vec<Vec<[u8; 2]>> = data.iter().map(|d| to_words(d)).collect();
                let mut parity = vec![vec![[0u8; 2]; stripe_len / 2]; m];
                self.gf16(k, m)?
                    .encode_sep(&words, &mut parity)
                    .map_err(|e| {
                        Error::EcEncodingFailed(format!("Reed-Solomon encoding failed: {}", e))
                    })?;
                for (out, words) in coding.iter_mut().zip(&parity) {
                    from_words(words, out);
                }
            }
        }

        Ok(())
    }

    #[instrument(skip(self, data, coding))]
    fn decode(
        &self,
        k: usize,
        m: usize,
        w: WordSize,
        data: &mut [&mut [u8]],
        coding: &mut [&mut [u8]],
        erasures: &[usize],
    ) -> Result<()> {
        let stripe_len = check_line(k, m, data, coding)?;
        check_word_alignment(w, stripe_len)?;
        check_erasures(k, m, erasures)?;
        if erasures.is_empty() {
            return Ok(());
        }

        let is_erased = |slot: usize| erasures.contains(&slot);

        match w {
            WordSize::W8 => {
                let mut shards: Vec<Option<Vec<u8>>> = data
                    .iter()
                    .map(|d| &**d)
                    .chain(coding.iter().map(|c| &**c))
                    .enumerate()
                    .map(|(slot, s)| (!is_erased(slot)).then(|| s.to_vec()))
                    .collect();

                self.gf8(k, m)?.reconstruct(&mut shards).map_err(|e| {
                    Error::EcReconstructionFailed(format!(
                        "Reed-Solomon reconstruction failed: {}",
                        e
                    ))
                })?;

                for (slot, out) in data
                    .iter_mut()
                    .map(|d| &mut **d)
                    .chain(coding.iter_mut().map(|c| &mut **c))
                    .enumerate() {
                    if let (true, Some(shard)) = (is_erased(slot), &shards[slot]) {
                        out.copy_from_slice(shard);
                    }
                }
            }
            WordSize::W16 => {
                let mut shards: Vec<Option<Vec<[u8; 2]>>> = data
                    .iter()
                    .map(|d| &**d)
                    .chain(coding.iter().map(|c| &**c))
                    .enumerate()
                    .map(|(slot, s)| (!is_erased(slot)).then(|| to_words(s)))
                    .collect();

                self.gf16(k, m)?.reconstruct(&mut shards).map_err(|e| {
                    Error::EcReconstructionFailed(format!(
                        "Reed-Solomon reconstruction failed: {}",
                        e
                    ))
                })?;

                for (slot, out) in data
                    .iter_mut()
                    .map(|d| &mut **d)
                    .chain(coding.iter_mut().map(|c| &mut **c))
                    .enumerate() {
                    if let (true, Some(words)) = (is_erased(slot), &shards[slot]) {
                        from_words(words, out);
                    }
                }
            }
        }

        debug!(
            "Reconstructed {} of {} stripes",
            erasures.len(),
            k + m
        );

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
