//! Erasure Coding Module
//!
//! Stateless transforms between k data stripes and m parity stripes of one
//! line. Translators hand a codec borrowed stripe buffers; nothing is
//! retained past a call.
//!
//! # Slot numbering
//!
//! ```text
//!   data slots            parity slots
//! ┌─────┬─────┬─────┐   ┌─────┬─────┐
//! │  0  │ ... │ k-1 │   │  k  │k+m-1│
//! └─────┴─────┴─────┘   └─────┴─────┘
//! ```
//!
//! Erasure lists passed to [`ErasureCodec::decode`] use this numbering.
//!
//! # Components
//!
//! - **Reed-Solomon-Vandermonde** (`reed_solomon.rs`): the production codec,
//!   backed by the `reed-solomon-erasure` crate, with generator matrices
//!   memoized per geometry.
//! - **XOR parity** (`xor.rs`): single-parity codec, m = 1.

pub mod reed_solomon;
pub mod xor;

#[cfg(test)]
mod proptest;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use reed_solomon::ReedSolVanCodec;
pub use xor::XorCodec;

// =============================================================================
// Word Size
// =============================================================================

/// Galois field word size used by a codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordSize {
    /// GF(2^8), byte-wise
    #[default]
    W8,
    /// GF(2^16), stripes must have an even length
    W16,
}

impl WordSize {
    /// Width of one word in bits.
    pub fn bits(self) -> u32 {
        match self {
            WordSize::W8 => 8,
            WordSize::W16 => 16,
        }
    }

    /// Parse a bit width.
    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            8 => Ok(WordSize::W8),
            16 => Ok(WordSize::W16),
            other => Err(Error::InvalidEcConfig(format!(
                "unsupported word size {}, expected 8 or 16",
                other
            ))),
        }
    }
}

// =============================================================================
// Codec Port
// =============================================================================

/// Encode/decode primitives over one line of stripes.
pub trait ErasureCodec: Send + Sync {
    /// Short codec name for logs.
    fn name(&self) -> &'static str;

    /// Fill `coding[0..m)` from `data[0..k)`.
    ///
    /// All buffers must have the same length. Deterministic for a given
    /// `(k, m, w)`.
    fn encode(
        &self,
        k: usize,
        m: usize,
        w: WordSize,
        data: &[&[u8]],
        coding: &mut [&mut [u8]],
    ) -> Result<()>;

    /// Reconstruct the erased slots in place.
    ///
    /// `erasures` holds slot indices (`0..k` data, `k..k+m` parity). The
    /// contents of erased buffers are ignored and overwritten.
    fn decode(
        &self,
        k: usize,
        m: usize,
        w: WordSize,
        data: &mut [&mut [u8]],
        coding: &mut [&mut [u8]],
        erasures: &[usize],
    ) -> Result<()>;
}

/// Validate buffer counts and lengths of one line, returning the stripe length.
pub(crate) fn check_line<D: AsRef<[u8]>, C: AsRef<[u8]>>(
    k: usize,
    m: usize,
    data: &[D],
    coding: &[C],
) -> Result<usize> {
    if k == 0 || m == 0 {
        return Err(Error::InvalidEcConfig(format!(
            "k and m must be greater than 0 (k={}, m={})",
            k, m
        )));
    }
    if data.len() != k || coding.len() != m {
        return Err(Error::InvalidEcConfig(format!(
            "Expected {}+{} stripes, got {}+{}",
            k,
            m,
            data.len(),
            coding.len()
        )));
    }

    let stripe_len = data[0].as_ref().len();
    let uneven = data
        .iter()
        .map(|d| d.as_ref().len())
        .chain(coding.iter().map(|c| c.as_ref().len()))
        .any(|len| len != stripe_len);
    if uneven {
        return Err(Error::InvalidEcConfig(
            "all stripes of a line must have the same length".to_string(),
        ));
    }
    if stripe_len == 0 {
        return Err(Error::InvalidEcConfig("stripes must not be empty".to_string()));
    }
    Ok(stripe_len)
}

/// Validate an erasure list against the line geometry.
pub(crate) fn check_erasures(k: usize, m: usize, erasures: &[usize]) -> Result<()> {
    if let Some(bad) = erasures.iter().find(|&&e| e >= k + m) {
        return Err(Error::InvalidArgument(format!(
            "erasure index {} outside of line with {} slots",
            bad,
            k + m
        )));
    }
    let mut distinct = erasures.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() > m {
        return Err(Error::InsufficientShards {
            available: k + m - distinct.len(),
            required: k,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_word_size_bits() {
        assert_eq!(WordSize::from_bits(8).unwrap(), WordSize::W8);
        assert_eq!(WordSize::from_bits(16).unwrap().bits(), 16);
        assert_matches!(WordSize::from_bits(32), Err(Error::InvalidEcConfig(_)));
        assert_eq!(WordSize::default(), WordSize::W8);
    }

    #[test]
    fn test_check_line() {
        let a = [1u8; 4];
        let b = [2u8; 4];
        let p = [0u8; 4];
        assert_eq!(check_line(2, 1, &[&a[..], &b[..]], &[&p[..]]).unwrap(), 4);
        assert!(check_line(3, 1, &[&a[..], &b[..]], &[&p[..]]).is_err());
        let short = [0u8; 3];
        assert!(check_line(2, 1, &[&a[..], &b[..]], &[&short[..]]).is_err());
    }

    #[test]
    fn test_check_erasures() {
        assert!(check_erasures(4, 2, &[0, 5]).is_ok());
        assert_matches!(
            check_erasures(4, 2, &[0, 1, 2]),
            Err(Error::InsufficientShards {
                available: 3,
                required: 4
            })
        );
        assert_matches!(check_erasures(4, 2, &[6]), Err(Error::InvalidArgument(_)));
    }
}
